//! Snippet transpiler: JSX/ES module source to the executable [`Module`] form.
//!
//! Parsing is done by oxc. The lowering pass then walks the AST once and
//! rewrites JSX into `React.createElement` calls, the same shape the classic
//! JSX runtime produces. Imports from `react` become bindings to the runtime
//! object. Syntax the interpreter does not run is lowered to a node that
//! throws a `SyntaxError` when reached, so a helper nobody calls does not
//! keep the rest of the snippet from loading.
//!
//! Sources larger than [`MAX_SOURCE_BYTES`] or nested deeper than
//! [`MAX_NESTING`] are rejected before any recursive work.

use std::cell::Cell;
use std::rc::Rc;

use oxc_allocator::Allocator;
use oxc_ast::ast;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::ir::{
    ArrayItem, AssignOp, AssignTarget, BinaryOp, ClassDef, ClassMember, ClassMemberKind,
    DeclKind, Declarator, Expr, FunctionBody, FunctionDef, LogicalOp, MemberProp, Module,
    Pattern, PropItem, PropKey, Stmt, SwitchCase, UnaryOp,
};

/// Largest snippet accepted, in bytes.
pub const MAX_SOURCE_BYTES: usize = 64 * 1024;

/// Deepest bracket or syntax tree nesting accepted.
pub const MAX_NESTING: usize = 200;

/// Module specifier whose imports resolve to the JSX runtime object.
const RUNTIME_MODULE: &str = "react";

/// Options for a transpile run.
#[derive(Debug, Clone)]
pub struct TranspileOptions {
    /// Accept TypeScript syntax (TSX) in addition to JSX
    pub typescript: bool,

    /// Identifier the JSX factory is looked up on (`React.createElement`)
    pub jsx_runtime: String,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            typescript: false,
            jsx_runtime: "React".to_string(),
        }
    }
}

/// Errors raised while transpiling a snippet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranspileError {
    #[error("{0}")]
    Syntax(String),

    #[error("Unsupported syntax at line {line}: {what}")]
    Unsupported { line: usize, what: String },

    #[error("Snippet is too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("Snippet nests too deeply at line {line} (limit {limit} levels)")]
    TooDeep { line: usize, limit: usize },
}

/// Transpile a snippet into its executable form.
pub fn transpile(source: &str, options: &TranspileOptions) -> Result<Module, TranspileError> {
    if source.len() > MAX_SOURCE_BYTES {
        return Err(TranspileError::TooLarge {
            size: source.len(),
            limit: MAX_SOURCE_BYTES,
        });
    }
    if let Some(offset) = too_deep_at(source) {
        return Err(TranspileError::TooDeep {
            line: line_at(source, offset),
            limit: MAX_NESTING,
        });
    }

    let allocator = Allocator::default();
    let source_type = if options.typescript {
        SourceType::tsx()
    } else {
        SourceType::mjs().with_jsx(true)
    };

    let ret = Parser::new(&allocator, source, source_type).parse();

    if let Some(diagnostic) = ret.errors.first() {
        return Err(TranspileError::Syntax(diagnostic.to_string()));
    }
    if ret.panicked {
        return Err(TranspileError::Syntax("Unexpected end of input".to_string()));
    }

    let lowering = Lowering {
        source,
        runtime: Rc::from(options.jsx_runtime.as_str()),
        depth: Cell::new(0),
    };
    let body = lowering.block(&ret.program.body)?;

    Ok(Module { body: body.into() })
}

/// Byte offset where bracket nesting first exceeds [`MAX_NESTING`].
fn too_deep_at(source: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in source.bytes().enumerate() {
        match byte {
            b'(' | b'[' | b'{' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Some(offset);
                }
            }
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

fn line_at(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    source.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count() + 1
}

struct Lowering<'s> {
    source: &'s str,
    runtime: Rc<str>,
    depth: Cell<usize>,
}

type Lowered<T> = Result<T, TranspileError>;

impl Lowering<'_> {
    fn unsupported<T>(&self, span: Span, what: &str) -> Lowered<T> {
        Err(TranspileError::Unsupported {
            line: line_at(self.source, span.start as usize),
            what: what.to_string(),
        })
    }

    /// A node that throws when evaluated.
    fn lazy(&self, span: Span, what: &str) -> Expr {
        Expr::Unsupported {
            line: line_at(self.source, span.start as usize),
            what: Rc::from(what),
        }
    }

    fn descend(&self, span: Span) -> Lowered<()> {
        let depth = self.depth.get() + 1;
        if depth > MAX_NESTING {
            return Err(TranspileError::TooDeep {
                line: line_at(self.source, span.start as usize),
                limit: MAX_NESTING,
            });
        }
        self.depth.set(depth);
        Ok(())
    }

    fn ascend(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    fn block(&self, statements: &[ast::Statement<'_>]) -> Lowered<Vec<Stmt>> {
        let mut out = Vec::with_capacity(statements.len());
        for statement in statements {
            match statement {
                ast::Statement::ImportDeclaration(decl) => out.extend(self.import(decl)),
                other => {
                    if let Some(stmt) = self.statement(other)? {
                        out.push(stmt);
                    }
                }
            }
        }
        Ok(out)
    }

    fn statement(&self, statement: &ast::Statement<'_>) -> Lowered<Option<Stmt>> {
        self.descend(statement.span())?;
        let lowered = self.lower_statement(statement);
        self.ascend();
        lowered
    }

    fn lower_statement(&self, statement: &ast::Statement<'_>) -> Lowered<Option<Stmt>> {
        use ast::Statement as S;

        let stmt = match statement {
            S::ExpressionStatement(s) => Stmt::Expr(self.expression(&s.expression)?),
            S::VariableDeclaration(decl) => self.variable_declaration(decl)?,
            S::FunctionDeclaration(func) => self.function_declaration(func)?,
            S::ClassDeclaration(class) => self.class_declaration(class)?,
            S::ReturnStatement(s) => Stmt::Return(
                s.argument
                    .as_ref()
                    .map(|arg| self.expression(arg))
                    .transpose()?,
            ),
            S::IfStatement(s) => Stmt::If {
                test: self.expression(&s.test)?,
                consequent: Box::new(self.nested(&s.consequent)?),
                alternate: match &s.alternate {
                    Some(alt) => Some(Box::new(self.nested(alt)?)),
                    None => None,
                },
            },
            S::BlockStatement(b) => Stmt::Block(self.block(&b.body)?),
            S::WhileStatement(s) => Stmt::While {
                test: self.expression(&s.test)?,
                body: Box::new(self.nested(&s.body)?),
            },
            S::DoWhileStatement(s) => Stmt::DoWhile {
                body: Box::new(self.nested(&s.body)?),
                test: self.expression(&s.test)?,
            },
            S::ForStatement(s) => {
                let init = match &s.init {
                    None => None,
                    Some(ast::ForStatementInit::VariableDeclaration(decl)) => {
                        Some(Box::new(self.variable_declaration(decl)?))
                    }
                    Some(other) => match other.as_expression() {
                        Some(expr) => Some(Box::new(Stmt::Expr(self.expression(expr)?))),
                        None => return self.unsupported(s.span, "for loop initializer"),
                    },
                };
                Stmt::For {
                    init,
                    test: s.test.as_ref().map(|t| self.expression(t)).transpose()?,
                    update: s.update.as_ref().map(|u| self.expression(u)).transpose()?,
                    body: Box::new(self.nested(&s.body)?),
                }
            }
            S::ForOfStatement(s) => {
                if s.r#await {
                    return Ok(Some(Stmt::Expr(self.lazy(s.span, "for await loops"))));
                }
                let (kind, pattern) = self.loop_binding(&s.left, s.span)?;
                Stmt::ForOf {
                    kind,
                    pattern,
                    iterable: self.expression(&s.right)?,
                    body: Box::new(self.nested(&s.body)?),
                }
            }
            S::ForInStatement(s) => {
                let (kind, pattern) = self.loop_binding(&s.left, s.span)?;
                Stmt::ForIn {
                    kind,
                    pattern,
                    object: self.expression(&s.right)?,
                    body: Box::new(self.nested(&s.body)?),
                }
            }
            S::SwitchStatement(s) => {
                let mut cases = Vec::with_capacity(s.cases.len());
                for case in &s.cases {
                    cases.push(SwitchCase {
                        test: case.test.as_ref().map(|t| self.expression(t)).transpose()?,
                        body: self.block(&case.consequent)?,
                    });
                }
                Stmt::Switch {
                    discriminant: self.expression(&s.discriminant)?,
                    cases,
                }
            }
            S::LabeledStatement(s) => Stmt::Labeled {
                label: Rc::from(s.label.name.as_str()),
                body: Box::new(self.nested(&s.body)?),
            },
            S::BreakStatement(s) => {
                Stmt::Break(s.label.as_ref().map(|label| Rc::from(label.name.as_str())))
            }
            S::ContinueStatement(s) => {
                Stmt::Continue(s.label.as_ref().map(|label| Rc::from(label.name.as_str())))
            }
            S::ThrowStatement(s) => Stmt::Throw(self.expression(&s.argument)?),
            S::TryStatement(s) => {
                let (param, handler) = match &s.handler {
                    Some(clause) => (
                        clause
                            .param
                            .as_ref()
                            .map(|p| self.binding_pattern(&p.pattern))
                            .transpose()?,
                        Some(self.block(&clause.body.body)?),
                    ),
                    None => (None, None),
                };
                Stmt::Try {
                    block: self.block(&s.block.body)?,
                    param,
                    handler,
                    finalizer: s
                        .finalizer
                        .as_ref()
                        .map(|f| self.block(&f.body))
                        .transpose()?,
                }
            }
            S::EmptyStatement(_) | S::DebuggerStatement(_) => return Ok(None),
            S::ExportDefaultDeclaration(decl) => self.export_default(decl)?,
            S::ExportNamedDeclaration(decl) => return self.export_named(decl),
            S::ExportAllDeclaration(decl) => Stmt::Expr(self.lazy(decl.span, "re-exports")),
            S::TSTypeAliasDeclaration(_) | S::TSInterfaceDeclaration(_) => return Ok(None),
            other => Stmt::Expr(self.lazy(other.span(), "statement")),
        };

        Ok(Some(stmt))
    }

    /// Lower a statement used as a loop or branch body.
    fn nested(&self, statement: &ast::Statement<'_>) -> Lowered<Stmt> {
        Ok(self
            .statement(statement)?
            .unwrap_or_else(|| Stmt::Block(Vec::new())))
    }

    /// `import ... from 'react'` binds names from the runtime object; any
    /// other module throws when the import is reached.
    fn import(&self, decl: &ast::ImportDeclaration<'_>) -> Option<Stmt> {
        if decl.import_kind.is_type() {
            return None;
        }
        if decl.source.value.as_str() != RUNTIME_MODULE {
            let what = format!("import from '{}' (no module resolution)", decl.source.value);
            return Some(Stmt::Expr(self.lazy(decl.span, &what)));
        }

        let runtime = || Expr::Ident(Rc::clone(&self.runtime));
        let mut declarators = Vec::new();
        for specifier in decl.specifiers.iter().flatten() {
            let (local, init) = match specifier {
                ast::ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (s.local.name.as_str(), runtime())
                }
                ast::ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.as_str(), runtime())
                }
                ast::ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    if s.import_kind.is_type() {
                        continue;
                    }
                    let imported = match &s.imported {
                        ast::ModuleExportName::IdentifierName(name) => name.name.as_str(),
                        ast::ModuleExportName::IdentifierReference(name) => name.name.as_str(),
                        ast::ModuleExportName::StringLiteral(lit) => lit.value.as_str(),
                    };
                    let init = match imported {
                        "default" => runtime(),
                        name => self.runtime_member(name),
                    };
                    (s.local.name.as_str(), init)
                }
            };
            // The runtime is already a global under its own name.
            if local == &*self.runtime {
                continue;
            }
            declarators.push(Declarator {
                pattern: Pattern::Ident(Rc::from(local)),
                init: Some(init),
            });
        }

        if declarators.is_empty() {
            return None;
        }
        Some(Stmt::Declare {
            kind: DeclKind::Const,
            declarators,
        })
    }

    fn export_default(&self, decl: &ast::ExportDefaultDeclaration<'_>) -> Lowered<Stmt> {
        use ast::ExportDefaultDeclarationKind as K;

        let value = match &decl.declaration {
            K::FunctionDeclaration(func) => Expr::Function(Rc::new(self.function(func)?)),
            K::ClassDeclaration(class) => Expr::Class(Rc::new(self.class(class)?)),
            other => match other.as_expression() {
                Some(expr) => self.expression(expr)?,
                None => return self.unsupported(decl.span, "default export"),
            },
        };

        Ok(Stmt::ExportDefault(value))
    }

    fn export_named(&self, decl: &ast::ExportNamedDeclaration<'_>) -> Lowered<Option<Stmt>> {
        if decl.source.is_some() {
            return Ok(Some(Stmt::Expr(self.lazy(decl.span, "re-exports"))));
        }
        let stmt = match &decl.declaration {
            Some(ast::Declaration::VariableDeclaration(var)) => self.variable_declaration(var)?,
            Some(ast::Declaration::FunctionDeclaration(func)) => self.function_declaration(func)?,
            Some(ast::Declaration::ClassDeclaration(class)) => self.class_declaration(class)?,
            Some(ast::Declaration::TSTypeAliasDeclaration(_))
            | Some(ast::Declaration::TSInterfaceDeclaration(_)) => return Ok(None),
            Some(other) => Stmt::Expr(self.lazy(other.span(), "exported declaration")),
            // `export { Card as default }` is the only list form with an effect.
            None => {
                let default = decl.specifiers.iter().find(|s| s.exported.name() == "default");
                match default {
                    Some(specifier) => Stmt::ExportDefault(Expr::Ident(Rc::from(
                        specifier.local.name().as_str(),
                    ))),
                    None => return Ok(None),
                }
            }
        };
        Ok(Some(stmt))
    }

    fn variable_declaration(&self, decl: &ast::VariableDeclaration<'_>) -> Lowered<Stmt> {
        let kind = match decl.kind {
            ast::VariableDeclarationKind::Var => DeclKind::Var,
            ast::VariableDeclarationKind::Let => DeclKind::Let,
            ast::VariableDeclarationKind::Const => DeclKind::Const,
            _ => return Ok(Stmt::Expr(self.lazy(decl.span, "using declarations"))),
        };

        let mut declarators = Vec::with_capacity(decl.declarations.len());
        for declarator in &decl.declarations {
            declarators.push(Declarator {
                pattern: self.binding_pattern(&declarator.id)?,
                init: declarator
                    .init
                    .as_ref()
                    .map(|init| self.expression(init))
                    .transpose()?,
            });
        }

        Ok(Stmt::Declare { kind, declarators })
    }

    fn function_declaration(&self, func: &ast::Function<'_>) -> Lowered<Stmt> {
        let def = self.function(func)?;
        match def.name.clone() {
            Some(name) => Ok(Stmt::Function {
                name,
                def: Rc::new(def),
            }),
            None => self.unsupported(func.span, "anonymous function declaration"),
        }
    }

    /// Classes bind like `let`: no hoisting.
    fn class_declaration(&self, class: &ast::Class<'_>) -> Lowered<Stmt> {
        let def = self.class(class)?;
        let Some(name) = def.name.clone() else {
            return self.unsupported(class.span, "anonymous class declaration");
        };
        Ok(Stmt::Declare {
            kind: DeclKind::Let,
            declarators: vec![Declarator {
                pattern: Pattern::Ident(name),
                init: Some(Expr::Class(Rc::new(def))),
            }],
        })
    }

    fn class(&self, class: &ast::Class<'_>) -> Lowered<ClassDef> {
        let mut constructor = None;
        let mut members = Vec::with_capacity(class.body.body.len());
        for element in &class.body.body {
            match element {
                ast::ClassElement::MethodDefinition(method) => {
                    if matches!(method.kind, ast::MethodDefinitionKind::Constructor) {
                        constructor = Some(Rc::new(self.function(&method.value)?));
                        continue;
                    }
                    let key = self.property_key(&method.key, method.computed)?;
                    let kind = match method.kind {
                        ast::MethodDefinitionKind::Method => {
                            ClassMemberKind::Method(Rc::new(self.function(&method.value)?))
                        }
                        _ => ClassMemberKind::Field(Some(
                            self.lazy(method.span, "getters and setters"),
                        )),
                    };
                    members.push(ClassMember {
                        key,
                        is_static: method.r#static,
                        kind,
                    });
                }
                ast::ClassElement::PropertyDefinition(prop) => members.push(ClassMember {
                    key: self.property_key(&prop.key, prop.computed)?,
                    is_static: prop.r#static,
                    kind: ClassMemberKind::Field(
                        prop.value.as_ref().map(|v| self.expression(v)).transpose()?,
                    ),
                }),
                ast::ClassElement::TSIndexSignature(_) => {}
                other => members.push(ClassMember {
                    key: PropKey::Computed(self.lazy(other.span(), "class element")),
                    is_static: true,
                    kind: ClassMemberKind::Field(None),
                }),
            }
        }

        Ok(ClassDef {
            name: class.id.as_ref().map(|id| Rc::from(id.name.as_str())),
            extends: class
                .super_class
                .as_ref()
                .map(|parent| self.expression(parent))
                .transpose()?,
            constructor,
            members,
        })
    }

    fn loop_binding(
        &self,
        left: &ast::ForStatementLeft<'_>,
        span: Span,
    ) -> Lowered<(DeclKind, Pattern)> {
        match left {
            ast::ForStatementLeft::VariableDeclaration(decl) => {
                let Stmt::Declare { kind, declarators } = self.variable_declaration(decl)? else {
                    return self.unsupported(span, "loop binding");
                };
                match declarators.into_iter().next() {
                    Some(declarator) => Ok((kind, declarator.pattern)),
                    None => self.unsupported(span, "loop binding"),
                }
            }
            ast::ForStatementLeft::AssignmentTargetIdentifier(ident) => {
                Ok((DeclKind::Var, Pattern::Ident(Rc::from(ident.name.as_str()))))
            }
            _ => self.unsupported(span, "loop assignment target"),
        }
    }

    fn function(&self, func: &ast::Function<'_>) -> Lowered<FunctionDef> {
        let name = func.id.as_ref().map(|id| Rc::from(id.name.as_str()));
        let body = match &func.body {
            _ if func.generator => FunctionBody::Expr(self.lazy(func.span, "generator functions")),
            Some(body) => FunctionBody::Block(self.block(&body.statements)?),
            None => FunctionBody::Expr(self.lazy(func.span, "function without body")),
        };

        let (params, rest) = self.params(&func.params)?;
        Ok(FunctionDef {
            name,
            params,
            rest,
            body,
            is_async: func.r#async,
            is_arrow: false,
        })
    }

    fn arrow(&self, arrow: &ast::ArrowFunctionExpression<'_>) -> Lowered<FunctionDef> {
        let (params, rest) = self.params(&arrow.params)?;
        let body = if arrow.expression {
            match arrow.body.statements.first() {
                Some(ast::Statement::ExpressionStatement(s)) => {
                    FunctionBody::Expr(self.expression(&s.expression)?)
                }
                _ => return self.unsupported(arrow.span, "arrow function body"),
            }
        } else {
            FunctionBody::Block(self.block(&arrow.body.statements)?)
        };

        Ok(FunctionDef {
            name: None,
            params,
            rest,
            body,
            is_async: arrow.r#async,
            is_arrow: true,
        })
    }

    fn params(
        &self,
        params: &ast::FormalParameters<'_>,
    ) -> Lowered<(Vec<Pattern>, Option<Pattern>)> {
        let mut out = Vec::with_capacity(params.items.len());
        for param in &params.items {
            out.push(self.binding_pattern(&param.pattern)?);
        }
        let rest = params
            .rest
            .as_ref()
            .map(|rest| self.binding_pattern(&rest.argument))
            .transpose()?;
        Ok((out, rest))
    }

    fn binding_pattern(&self, pattern: &ast::BindingPattern<'_>) -> Lowered<Pattern> {
        use ast::BindingPatternKind as K;

        match &pattern.kind {
            K::BindingIdentifier(ident) => Ok(Pattern::Ident(Rc::from(ident.name.as_str()))),
            K::ObjectPattern(obj) => {
                let mut props = Vec::with_capacity(obj.properties.len());
                for prop in &obj.properties {
                    props.push((
                        self.property_key(&prop.key, prop.computed)?,
                        self.binding_pattern(&prop.value)?,
                    ));
                }
                let rest = match &obj.rest {
                    Some(rest) => Some(Box::new(self.binding_pattern(&rest.argument)?)),
                    None => None,
                };
                Ok(Pattern::Object { props, rest })
            }
            K::ArrayPattern(arr) => {
                let mut elements = Vec::with_capacity(arr.elements.len());
                for element in &arr.elements {
                    elements.push(
                        element
                            .as_ref()
                            .map(|p| self.binding_pattern(p))
                            .transpose()?,
                    );
                }
                let rest = match &arr.rest {
                    Some(rest) => Some(Box::new(self.binding_pattern(&rest.argument)?)),
                    None => None,
                };
                Ok(Pattern::Array { elements, rest })
            }
            K::AssignmentPattern(assign) => Ok(Pattern::Default {
                target: Box::new(self.binding_pattern(&assign.left)?),
                default: self.expression(&assign.right)?,
            }),
        }
    }

    fn property_key(&self, key: &ast::PropertyKey<'_>, computed: bool) -> Lowered<PropKey> {
        match key {
            ast::PropertyKey::StaticIdentifier(ident) => {
                Ok(PropKey::Static(Rc::from(ident.name.as_str())))
            }
            ast::PropertyKey::PrivateIdentifier(ident) => {
                Ok(PropKey::Computed(self.lazy(ident.span, "private fields")))
            }
            other => match other.as_expression() {
                Some(ast::Expression::StringLiteral(lit)) if !computed => {
                    Ok(PropKey::Static(Rc::from(lit.value.as_str())))
                }
                Some(ast::Expression::NumericLiteral(lit)) if !computed => Ok(PropKey::Static(
                    Rc::from(crate::value::number_to_string(lit.value).as_str()),
                )),
                Some(expr) => Ok(PropKey::Computed(self.expression(expr)?)),
                None => self.unsupported(other.span(), "property key"),
            },
        }
    }

    fn expression(&self, expr: &ast::Expression<'_>) -> Lowered<Expr> {
        self.descend(expr.span())?;
        let lowered = self.lower_expression(expr);
        self.ascend();
        lowered
    }

    fn lower_expression(&self, expr: &ast::Expression<'_>) -> Lowered<Expr> {
        use ast::Expression as E;

        let lowered = match expr {
            E::BooleanLiteral(lit) => Expr::Bool(lit.value),
            E::NullLiteral(_) => Expr::Null,
            E::NumericLiteral(lit) => Expr::Number(lit.value),
            E::StringLiteral(lit) => Expr::String(Rc::from(lit.value.as_str())),
            E::TemplateLiteral(tpl) => self.template(tpl)?,
            E::Identifier(ident) => match ident.name.as_str() {
                "undefined" => Expr::Undefined,
                name => Expr::Ident(Rc::from(name)),
            },
            E::ArrayExpression(arr) => {
                let mut items = Vec::with_capacity(arr.elements.len());
                for element in &arr.elements {
                    items.push(match element {
                        ast::ArrayExpressionElement::SpreadElement(spread) => {
                            ArrayItem::Spread(self.expression(&spread.argument)?)
                        }
                        ast::ArrayExpressionElement::Elision(_) => ArrayItem::Hole,
                        other => match other.as_expression() {
                            Some(e) => ArrayItem::Expr(self.expression(e)?),
                            None => ArrayItem::Expr(self.lazy(arr.span, "array element")),
                        },
                    });
                }
                Expr::Array(items)
            }
            E::ObjectExpression(obj) => {
                let mut props = Vec::with_capacity(obj.properties.len());
                for prop in &obj.properties {
                    props.push(match prop {
                        ast::ObjectPropertyKind::ObjectProperty(p) => {
                            let key = self.property_key(&p.key, p.computed)?;
                            let value = if matches!(p.kind, ast::PropertyKind::Init) {
                                self.expression(&p.value)?
                            } else {
                                self.lazy(p.span, "getters and setters")
                            };
                            PropItem::Init(key, value)
                        }
                        ast::ObjectPropertyKind::SpreadProperty(spread) => {
                            PropItem::Spread(self.expression(&spread.argument)?)
                        }
                    });
                }
                Expr::Object(props)
            }
            E::ArrowFunctionExpression(arrow) => Expr::Function(Rc::new(self.arrow(arrow)?)),
            E::FunctionExpression(func) => Expr::Function(Rc::new(self.function(func)?)),
            E::ClassExpression(class) => Expr::Class(Rc::new(self.class(class)?)),
            E::UnaryExpression(unary) => {
                let op = match unary.operator {
                    ast::UnaryOperator::UnaryNegation => UnaryOp::Neg,
                    ast::UnaryOperator::UnaryPlus => UnaryOp::Plus,
                    ast::UnaryOperator::LogicalNot => UnaryOp::Not,
                    ast::UnaryOperator::BitwiseNot => UnaryOp::BitNot,
                    ast::UnaryOperator::Typeof => UnaryOp::Typeof,
                    ast::UnaryOperator::Void => UnaryOp::Void,
                    ast::UnaryOperator::Delete => return self.delete(unary),
                };
                Expr::Unary {
                    op,
                    arg: Box::new(self.expression(&unary.argument)?),
                }
            }
            E::BinaryExpression(binary) => match binary_operator(binary.operator) {
                Some(op) => Expr::Binary {
                    op,
                    left: Box::new(self.expression(&binary.left)?),
                    right: Box::new(self.expression(&binary.right)?),
                },
                None => self.lazy(binary.span, "instanceof operator"),
            },
            E::LogicalExpression(logical) => Expr::Logical {
                op: logical_operator(logical.operator),
                left: Box::new(self.expression(&logical.left)?),
                right: Box::new(self.expression(&logical.right)?),
            },
            E::ConditionalExpression(cond) => Expr::Conditional {
                test: Box::new(self.expression(&cond.test)?),
                consequent: Box::new(self.expression(&cond.consequent)?),
                alternate: Box::new(self.expression(&cond.alternate)?),
            },
            E::AssignmentExpression(assign) => {
                let op = assignment_operator(assign.operator);
                match (op, self.assignment_target(&assign.left)?) {
                    (Some(op), Some(target)) => Expr::Assign {
                        op,
                        target: Box::new(target),
                        value: Box::new(self.expression(&assign.right)?),
                    },
                    _ => self.lazy(assign.span, "destructuring assignment"),
                }
            }
            E::UpdateExpression(update) => {
                let target = match &update.argument {
                    ast::SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) => {
                        AssignTarget::Ident(Rc::from(ident.name.as_str()))
                    }
                    ast::SimpleAssignmentTarget::StaticMemberExpression(member) => {
                        AssignTarget::Member {
                            object: self.expression(&member.object)?,
                            property: MemberProp::Static(Rc::from(member.property.name.as_str())),
                        }
                    }
                    ast::SimpleAssignmentTarget::ComputedMemberExpression(member) => {
                        AssignTarget::Member {
                            object: self.expression(&member.object)?,
                            property: MemberProp::Computed(Box::new(
                                self.expression(&member.expression)?,
                            )),
                        }
                    }
                    _ => return Ok(self.lazy(update.span, "update target")),
                };
                Expr::Update {
                    increment: matches!(update.operator, ast::UpdateOperator::Increment),
                    prefix: update.prefix,
                    target: Box::new(target),
                }
            }
            E::CallExpression(call) => self.call(call)?,
            E::NewExpression(new) => Expr::New {
                callee: Box::new(self.expression(&new.callee)?),
                args: self.arguments(&new.arguments, new.span)?,
            },
            E::StaticMemberExpression(member) => Expr::Member {
                object: Box::new(self.expression(&member.object)?),
                property: MemberProp::Static(Rc::from(member.property.name.as_str())),
                optional: member.optional,
            },
            E::ComputedMemberExpression(member) => Expr::Member {
                object: Box::new(self.expression(&member.object)?),
                property: MemberProp::Computed(Box::new(self.expression(&member.expression)?)),
                optional: member.optional,
            },
            E::ChainExpression(chain) => match &chain.expression {
                ast::ChainElement::CallExpression(call) => self.call(call)?,
                ast::ChainElement::StaticMemberExpression(member) => Expr::Member {
                    object: Box::new(self.expression(&member.object)?),
                    property: MemberProp::Static(Rc::from(member.property.name.as_str())),
                    optional: member.optional,
                },
                ast::ChainElement::ComputedMemberExpression(member) => Expr::Member {
                    object: Box::new(self.expression(&member.object)?),
                    property: MemberProp::Computed(Box::new(
                        self.expression(&member.expression)?,
                    )),
                    optional: member.optional,
                },
                ast::ChainElement::TSNonNullExpression(e) => self.expression(&e.expression)?,
                _ => self.lazy(chain.span, "optional chain"),
            },
            E::ParenthesizedExpression(paren) => self.expression(&paren.expression)?,
            E::SequenceExpression(seq) => {
                let mut exprs = Vec::with_capacity(seq.expressions.len());
                for e in &seq.expressions {
                    exprs.push(self.expression(e)?);
                }
                Expr::Sequence(exprs)
            }
            E::JSXElement(element) => self.jsx_element(element)?,
            E::JSXFragment(fragment) => self.jsx_fragment(fragment)?,
            E::TSAsExpression(e) => self.expression(&e.expression)?,
            E::TSSatisfiesExpression(e) => self.expression(&e.expression)?,
            E::TSNonNullExpression(e) => self.expression(&e.expression)?,
            E::TSTypeAssertion(e) => self.expression(&e.expression)?,
            E::ThisExpression(_) => Expr::This,
            E::AwaitExpression(e) => Expr::Await(Box::new(self.expression(&e.argument)?)),
            E::ImportExpression(e) => self.lazy(e.span, "dynamic import"),
            E::RegExpLiteral(lit) => self.lazy(lit.span, "regular expressions"),
            E::TaggedTemplateExpression(e) => self.lazy(e.span, "tagged templates"),
            E::Super(e) => self.lazy(e.span, "super property access"),
            E::YieldExpression(e) => self.lazy(e.span, "yield"),
            other => self.lazy(other.span(), "expression"),
        };

        Ok(lowered)
    }

    fn delete(&self, unary: &ast::UnaryExpression<'_>) -> Lowered<Expr> {
        Ok(match &unary.argument {
            ast::Expression::StaticMemberExpression(member) => Expr::Delete {
                object: Box::new(self.expression(&member.object)?),
                property: MemberProp::Static(Rc::from(member.property.name.as_str())),
            },
            ast::Expression::ComputedMemberExpression(member) => Expr::Delete {
                object: Box::new(self.expression(&member.object)?),
                property: MemberProp::Computed(Box::new(self.expression(&member.expression)?)),
            },
            _ => self.lazy(unary.span, "delete of a non-member"),
        })
    }

    fn template(&self, tpl: &ast::TemplateLiteral<'_>) -> Lowered<Expr> {
        let quasis = tpl
            .quasis
            .iter()
            .map(|q| {
                let text = q.value.cooked.as_ref().unwrap_or(&q.value.raw);
                Rc::from(text.as_str())
            })
            .collect();

        let mut exprs = Vec::with_capacity(tpl.expressions.len());
        for e in &tpl.expressions {
            exprs.push(self.expression(e)?);
        }

        Ok(Expr::Template { quasis, exprs })
    }

    /// `None` for destructuring targets.
    fn assignment_target(&self, target: &ast::AssignmentTarget<'_>) -> Lowered<Option<AssignTarget>> {
        Ok(Some(match target {
            ast::AssignmentTarget::AssignmentTargetIdentifier(ident) => {
                AssignTarget::Ident(Rc::from(ident.name.as_str()))
            }
            ast::AssignmentTarget::StaticMemberExpression(member) => AssignTarget::Member {
                object: self.expression(&member.object)?,
                property: MemberProp::Static(Rc::from(member.property.name.as_str())),
            },
            ast::AssignmentTarget::ComputedMemberExpression(member) => AssignTarget::Member {
                object: self.expression(&member.object)?,
                property: MemberProp::Computed(Box::new(self.expression(&member.expression)?)),
            },
            _ => return Ok(None),
        }))
    }

    fn call(&self, call: &ast::CallExpression<'_>) -> Lowered<Expr> {
        if matches!(call.callee, ast::Expression::Super(_)) {
            return Ok(Expr::SuperCall(self.arguments(&call.arguments, call.span)?));
        }
        Ok(Expr::Call {
            callee: Box::new(self.expression(&call.callee)?),
            args: self.arguments(&call.arguments, call.span)?,
            optional: call.optional,
        })
    }

    fn arguments(&self, arguments: &[ast::Argument<'_>], span: Span) -> Lowered<Vec<ArrayItem>> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(match argument {
                ast::Argument::SpreadElement(spread) => {
                    ArrayItem::Spread(self.expression(&spread.argument)?)
                }
                other => match other.as_expression() {
                    Some(e) => ArrayItem::Expr(self.expression(e)?),
                    None => ArrayItem::Expr(self.lazy(span, "call argument")),
                },
            });
        }
        Ok(args)
    }

    // JSX

    fn runtime_member(&self, name: &str) -> Expr {
        Expr::Member {
            object: Box::new(Expr::Ident(Rc::clone(&self.runtime))),
            property: MemberProp::Static(Rc::from(name)),
            optional: false,
        }
    }

    fn create_element(&self, tag: Expr, props: Expr, children: Vec<Expr>) -> Expr {
        let mut args = Vec::with_capacity(children.len() + 2);
        args.push(ArrayItem::Expr(tag));
        args.push(ArrayItem::Expr(props));
        args.extend(children.into_iter().map(ArrayItem::Expr));

        Expr::Call {
            callee: Box::new(self.runtime_member("createElement")),
            args,
            optional: false,
        }
    }

    fn jsx_element(&self, element: &ast::JSXElement<'_>) -> Lowered<Expr> {
        self.descend(element.span)?;
        let lowered = self.lower_jsx_element(element);
        self.ascend();
        lowered
    }

    fn lower_jsx_element(&self, element: &ast::JSXElement<'_>) -> Lowered<Expr> {
        let opening = &element.opening_element;
        let tag = self.jsx_tag(&opening.name)?;
        let props = self.jsx_attributes(&opening.attributes)?;
        let children = self.jsx_children(&element.children)?;
        Ok(self.create_element(tag, props, children))
    }

    fn jsx_fragment(&self, fragment: &ast::JSXFragment<'_>) -> Lowered<Expr> {
        let children = self.jsx_children(&fragment.children)?;
        Ok(self.create_element(self.runtime_member("Fragment"), Expr::Null, children))
    }

    fn jsx_tag(&self, name: &ast::JSXElementName<'_>) -> Lowered<Expr> {
        match name {
            ast::JSXElementName::Identifier(ident) => Ok(tag_for_name(ident.name.as_str())),
            ast::JSXElementName::IdentifierReference(ident) => {
                Ok(tag_for_name(ident.name.as_str()))
            }
            ast::JSXElementName::NamespacedName(ns) => Ok(Expr::String(Rc::from(
                format!("{}:{}", ns.namespace.name, ns.name.name).as_str(),
            ))),
            ast::JSXElementName::MemberExpression(member) => self.jsx_member(member),
            other => Ok(self.lazy(other.span(), "element name")),
        }
    }

    fn jsx_member(&self, member: &ast::JSXMemberExpression<'_>) -> Lowered<Expr> {
        let object = match &member.object {
            ast::JSXMemberExpressionObject::IdentifierReference(ident) => {
                Expr::Ident(Rc::from(ident.name.as_str()))
            }
            ast::JSXMemberExpressionObject::MemberExpression(inner) => self.jsx_member(inner)?,
            ast::JSXMemberExpressionObject::ThisExpression(_) => Expr::This,
        };

        Ok(Expr::Member {
            object: Box::new(object),
            property: MemberProp::Static(Rc::from(member.property.name.as_str())),
            optional: false,
        })
    }

    fn jsx_attributes(&self, attributes: &[ast::JSXAttributeItem<'_>]) -> Lowered<Expr> {
        if attributes.is_empty() {
            return Ok(Expr::Null);
        }

        let mut props = Vec::with_capacity(attributes.len());
        for item in attributes {
            match item {
                ast::JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        ast::JSXAttributeName::Identifier(ident) => ident.name.to_string(),
                        ast::JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };
                    let value = match &attr.value {
                        None => Expr::Bool(true),
                        Some(ast::JSXAttributeValue::StringLiteral(lit)) => {
                            Expr::String(Rc::from(decode_entities(lit.value.as_str()).as_str()))
                        }
                        Some(ast::JSXAttributeValue::ExpressionContainer(container)) => {
                            match container.expression.as_expression() {
                                Some(e) => self.expression(e)?,
                                None => self.lazy(attr.span, "empty attribute expression"),
                            }
                        }
                        Some(ast::JSXAttributeValue::Element(el)) => self.jsx_element(el)?,
                        Some(ast::JSXAttributeValue::Fragment(frag)) => self.jsx_fragment(frag)?,
                    };
                    props.push(PropItem::Init(PropKey::Static(Rc::from(name.as_str())), value));
                }
                ast::JSXAttributeItem::SpreadAttribute(spread) => {
                    props.push(PropItem::Spread(self.expression(&spread.argument)?));
                }
            }
        }

        Ok(Expr::Object(props))
    }

    fn jsx_children(&self, children: &[ast::JSXChild<'_>]) -> Lowered<Vec<Expr>> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child {
                ast::JSXChild::Text(text) => {
                    if let Some(cleaned) = clean_jsx_text(text.value.as_str()) {
                        out.push(Expr::String(Rc::from(decode_entities(&cleaned).as_str())));
                    }
                }
                ast::JSXChild::Element(el) => out.push(self.jsx_element(el)?),
                ast::JSXChild::Fragment(frag) => out.push(self.jsx_fragment(frag)?),
                ast::JSXChild::ExpressionContainer(container) => {
                    if let Some(e) = container.expression.as_expression() {
                        out.push(self.expression(e)?);
                    }
                }
                ast::JSXChild::Spread(spread) => {
                    out.push(self.lazy(spread.span, "JSX spread children"))
                }
            }
        }
        Ok(out)
    }
}

/// Intrinsic tags (lowercase or dashed) become strings, others are references.
fn tag_for_name(name: &str) -> Expr {
    let intrinsic = name.starts_with(|c: char| c.is_ascii_lowercase()) || name.contains('-');
    if intrinsic {
        Expr::String(Rc::from(name))
    } else {
        Expr::Ident(Rc::from(name))
    }
}

fn binary_operator(op: ast::BinaryOperator) -> Option<BinaryOp> {
    use ast::BinaryOperator as B;

    Some(match op {
        B::Addition => BinaryOp::Add,
        B::Subtraction => BinaryOp::Sub,
        B::Multiplication => BinaryOp::Mul,
        B::Division => BinaryOp::Div,
        B::Remainder => BinaryOp::Rem,
        B::Exponential => BinaryOp::Exp,
        B::Equality => BinaryOp::Eq,
        B::Inequality => BinaryOp::NotEq,
        B::StrictEquality => BinaryOp::StrictEq,
        B::StrictInequality => BinaryOp::StrictNotEq,
        B::LessThan => BinaryOp::Lt,
        B::LessEqualThan => BinaryOp::LtEq,
        B::GreaterThan => BinaryOp::Gt,
        B::GreaterEqualThan => BinaryOp::GtEq,
        B::BitwiseAnd => BinaryOp::BitAnd,
        B::BitwiseOR => BinaryOp::BitOr,
        B::BitwiseXOR => BinaryOp::BitXor,
        B::ShiftLeft => BinaryOp::Shl,
        B::ShiftRight => BinaryOp::Shr,
        B::ShiftRightZeroFill => BinaryOp::UShr,
        B::In => BinaryOp::In,
        B::Instanceof => return None,
    })
}

fn logical_operator(op: ast::LogicalOperator) -> LogicalOp {
    match op {
        ast::LogicalOperator::And => LogicalOp::And,
        ast::LogicalOperator::Or => LogicalOp::Or,
        ast::LogicalOperator::Coalesce => LogicalOp::Nullish,
    }
}

fn assignment_operator(op: ast::AssignmentOperator) -> Option<AssignOp> {
    use ast::AssignmentOperator as A;

    Some(match op {
        A::Assign => AssignOp::Assign,
        A::Addition => AssignOp::Compound(BinaryOp::Add),
        A::Subtraction => AssignOp::Compound(BinaryOp::Sub),
        A::Multiplication => AssignOp::Compound(BinaryOp::Mul),
        A::Division => AssignOp::Compound(BinaryOp::Div),
        A::Remainder => AssignOp::Compound(BinaryOp::Rem),
        A::Exponential => AssignOp::Compound(BinaryOp::Exp),
        A::BitwiseAnd => AssignOp::Compound(BinaryOp::BitAnd),
        A::BitwiseOR => AssignOp::Compound(BinaryOp::BitOr),
        A::BitwiseXOR => AssignOp::Compound(BinaryOp::BitXor),
        A::ShiftLeft => AssignOp::Compound(BinaryOp::Shl),
        A::ShiftRight => AssignOp::Compound(BinaryOp::Shr),
        A::ShiftRightZeroFill => AssignOp::Compound(BinaryOp::UShr),
        A::LogicalAnd => AssignOp::Logical(LogicalOp::And),
        A::LogicalOr => AssignOp::Logical(LogicalOp::Or),
        A::LogicalNullish => AssignOp::Logical(LogicalOp::Nullish),
    })
}

/// Collapse JSX text the way the classic JSX transform does.
///
/// Lines are trimmed, whitespace-only lines disappear and the remaining lines
/// are joined with single spaces. Returns `None` when nothing is left.
pub fn clean_jsx_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let is_first = i == 0;
        let is_last = i == lines.len() - 1;

        let mut trimmed: &str = line;
        if !is_first {
            trimmed = trimmed.trim_start_matches([' ', '\t']);
        }
        if !is_last {
            trimmed = trimmed.trim_end_matches([' ', '\t']);
        }

        if !trimmed.is_empty() {
            out.push_str(&trimmed.replace('\t', " "));
            if Some(i) != last_non_empty {
                out.push(' ');
            }
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Decode the HTML entities JSX text and attribute strings may carry.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let decoded = after.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &after[..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "copy" => Some('\u{a9}'),
                "reg" => Some('\u{ae}'),
                "hellip" => Some('\u{2026}'),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> Module {
        transpile(source, &TranspileOptions::default()).unwrap()
    }

    #[test]
    fn lowers_jsx_to_create_element() {
        let module = lower("exports.default = () => <div className=\"p-4\">Hi</div>;");

        let Stmt::Expr(Expr::Assign { value, .. }) = &module.body[0] else {
            panic!("expected assignment");
        };
        let Expr::Function(def) = value.as_ref() else {
            panic!("expected arrow function");
        };
        let FunctionBody::Expr(Expr::Call { callee, args, .. }) = &def.body else {
            panic!("expected createElement call");
        };

        assert!(def.is_arrow);
        assert!(matches!(
            callee.as_ref(),
            Expr::Member { property: MemberProp::Static(name), .. } if &**name == "createElement"
        ));
        assert!(matches!(&args[0], ArrayItem::Expr(Expr::String(tag)) if &**tag == "div"));
        assert!(matches!(&args[2], ArrayItem::Expr(Expr::String(text)) if &**text == "Hi"));
    }

    #[test]
    fn capitalized_tags_are_references() {
        assert!(matches!(tag_for_name("Card"), Expr::Ident(_)));
        assert!(matches!(tag_for_name("section"), Expr::String(_)));
        assert!(matches!(tag_for_name("my-widget"), Expr::String(_)));
    }

    #[test]
    fn reports_syntax_errors() {
        let result = transpile(
            "exports.default = () => <div><span>Hi</div>;",
            &TranspileOptions::default(),
        );

        match result {
            Err(TranspileError::Syntax(message)) => assert!(!message.is_empty()),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn react_imports_bind_runtime_members() {
        let module = lower(
            "import React, { useState, useEffect as effect } from 'react';\nimport * as R from 'react';\n",
        );

        let names: Vec<String> = module
            .body
            .iter()
            .flat_map(|stmt| match stmt {
                Stmt::Declare { declarators, .. } => declarators
                    .iter()
                    .map(|d| match &d.pattern {
                        Pattern::Ident(name) => name.to_string(),
                        _ => String::new(),
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .collect();
        assert_eq!(names, ["useState", "effect", "R"]);
    }

    #[test]
    fn other_imports_throw_when_reached() {
        let module = lower("const a = 1;\nimport chart from 'chart.js';\n");

        assert!(matches!(
            &module.body[1],
            Stmt::Expr(Expr::Unsupported { line: 2, .. })
        ));
    }

    #[test]
    fn classes_bind_like_let() {
        let module = lower("const a = 1;\nclass Widget extends Base { count = 0; render() { return null; } }\n");

        let Stmt::Declare { kind, declarators } = &module.body[1] else {
            panic!("expected class binding");
        };
        assert_eq!(*kind, DeclKind::Let);
        let Some(Expr::Class(def)) = &declarators[0].init else {
            panic!("expected class expression");
        };
        assert_eq!(def.name.as_deref(), Some("Widget"));
        assert!(def.extends.is_some());
        assert_eq!(def.members.len(), 2);
    }

    #[test]
    fn async_functions_keep_their_flag() {
        let module = lower("const load = async () => { await fetchThing(); };\nasync function run() {}\n");

        let Stmt::Declare { declarators, .. } = &module.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expr::Function(def)) = &declarators[0].init else {
            panic!("expected arrow function");
        };
        assert!(def.is_async && def.is_arrow);
        assert!(matches!(&module.body[1], Stmt::Function { def, .. } if def.is_async && !def.is_arrow));
    }

    #[test]
    fn unsupported_syntax_is_deferred() {
        let module = lower("function* ids() { yield 1; }\nconst re = /x/;\n");

        let Stmt::Function { def, .. } = &module.body[0] else {
            panic!("expected generator declaration");
        };
        assert!(matches!(
            &def.body,
            FunctionBody::Expr(Expr::Unsupported { line: 1, what }) if &**what == "generator functions"
        ));
        let Stmt::Declare { declarators, .. } = &module.body[1] else {
            panic!("expected declaration");
        };
        assert!(matches!(&declarators[0].init, Some(Expr::Unsupported { line: 2, .. })));
    }

    #[test]
    fn labels_reach_break_and_continue() {
        let module = lower("outer: for (;;) { for (;;) { continue outer; } break outer; }");

        let Stmt::Labeled { label, body } = &module.body[0] else {
            panic!("expected labeled statement");
        };
        assert_eq!(&**label, "outer");
        assert!(matches!(body.as_ref(), Stmt::For { .. }));
    }

    #[test]
    fn export_list_can_name_the_default() {
        let module = lower("const Card = () => null;\nexport { Card as default };\n");
        assert!(matches!(&module.body[1], Stmt::ExportDefault(Expr::Ident(name)) if &**name == "Card"));
    }

    #[test]
    fn lowers_export_default_function() {
        let module = lower("export default function Card() { return null; }");
        assert!(matches!(&module.body[0], Stmt::ExportDefault(Expr::Function(_))));
    }

    #[test]
    fn rejects_oversized_sources() {
        let source = format!("const s = '{}';", "x".repeat(MAX_SOURCE_BYTES));
        assert!(matches!(
            transpile(&source, &TranspileOptions::default()),
            Err(TranspileError::TooLarge { limit: MAX_SOURCE_BYTES, .. })
        ));
    }

    #[test]
    fn rejects_deep_bracket_nesting_before_parsing() {
        let source = format!("exports.default = {}1{};", "(".repeat(5000), ")".repeat(5000));
        assert!(matches!(
            transpile(&source, &TranspileOptions::default()),
            Err(TranspileError::TooDeep { line: 1, limit: MAX_NESTING })
        ));
    }

    #[test]
    fn strips_typescript_when_enabled() {
        let options = TranspileOptions {
            typescript: true,
            ..Default::default()
        };
        let module = transpile(
            "interface Props { title: string }\nconst label = 'x' as string;\n",
            &options,
        )
        .unwrap();

        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn cleans_multiline_jsx_text() {
        assert_eq!(
            clean_jsx_text("\n    Hello\n    world  \n  "),
            Some("Hello world".to_string())
        );
        assert_eq!(clean_jsx_text("\n   \n"), None);
        assert_eq!(clean_jsx_text("a  b"), Some("a  b".to_string()));
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&#169; 2024"), "\u{a9} 2024");
        assert_eq!(decode_entities("&#x41;"), "A");
        assert_eq!(decode_entities("a & b"), "a & b");
    }
}
