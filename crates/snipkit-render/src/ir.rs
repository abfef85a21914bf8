//! Executable form of a transpiled snippet.
//!
//! The transpiler lowers the parsed JSX/ES module into these owned trees.
//! JSX is already gone at this point: every element is a plain
//! `React.createElement(...)` call.

use std::rc::Rc;

/// A transpiled snippet, ready for an executor.
#[derive(Debug, Clone)]
pub struct Module {
    /// Top-level statements in source order
    pub body: Rc<[Stmt]>,
}

/// Declaration keyword of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

impl DeclKind {
    /// Whether bindings of this kind may be reassigned.
    pub fn is_mutable(self) -> bool {
        !matches!(self, Self::Const)
    }
}

/// One `name = init` pair of a variable declaration.
#[derive(Debug, Clone)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Declare {
        kind: DeclKind,
        declarators: Vec<Declarator>,
    },
    /// Function declaration; hoisted to the top of its block.
    Function {
        name: Rc<str>,
        def: Rc<FunctionDef>,
    },
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: DeclKind,
        pattern: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
    },
    ForIn {
        kind: DeclKind,
        pattern: Pattern,
        object: Expr,
        body: Box<Stmt>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    /// Optional target label
    Break(Option<Rc<str>>),
    Continue(Option<Rc<str>>),
    Labeled {
        label: Rc<str>,
        body: Box<Stmt>,
    },
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    /// `export default <expr>`; writes the private export slot.
    ExportDefault(Expr),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Template {
        quasis: Vec<Rc<str>>,
        exprs: Vec<Expr>,
    },
    Ident(Rc<str>),
    Array(Vec<ArrayItem>),
    Object(Vec<PropItem>),
    Function(Rc<FunctionDef>),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<AssignTarget>,
        value: Box<Expr>,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Box<AssignTarget>,
    },
    Member {
        object: Box<Expr>,
        property: MemberProp,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ArrayItem>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<ArrayItem>,
    },
    Sequence(Vec<Expr>),
    This,
    Await(Box<Expr>),
    Class(Rc<ClassDef>),
    /// `super(...)` inside a derived class constructor
    SuperCall(Vec<ArrayItem>),
    Delete {
        object: Box<Expr>,
        property: MemberProp,
    },
    /// Syntax the interpreter does not run; throws a `SyntaxError` when
    /// evaluated so the rest of the snippet still loads.
    Unsupported {
        line: usize,
        what: Rc<str>,
    },
}

#[derive(Debug, Clone)]
pub enum ArrayItem {
    Expr(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone)]
pub enum PropItem {
    Init(PropKey, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum PropKey {
    Static(Rc<str>),
    Computed(Expr),
}

#[derive(Debug, Clone)]
pub enum MemberProp {
    Static(Rc<str>),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Ident(Rc<str>),
    Member { object: Expr, property: MemberProp },
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(Rc<str>),
    Object {
        props: Vec<(PropKey, Pattern)>,
        rest: Option<Box<Pattern>>,
    },
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    Default {
        target: Box<Pattern>,
        default: Expr,
    },
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<Rc<str>>,
    pub params: Vec<Pattern>,
    pub rest: Option<Pattern>,
    pub body: FunctionBody,
    pub is_async: bool,
    /// Arrow functions keep the enclosing `this`
    pub is_arrow: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Option<Rc<str>>,
    pub extends: Option<Expr>,
    pub constructor: Option<Rc<FunctionDef>>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub key: PropKey,
    pub is_static: bool,
    pub kind: ClassMemberKind,
}

#[derive(Debug, Clone)]
pub enum ClassMemberKind {
    Method(Rc<FunctionDef>),
    /// Field initializer, evaluated per instance with `this` bound
    Field(Option<Expr>),
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Concise arrow body
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    /// Compound assignment such as `+=`
    Compound(BinaryOp),
    /// `&&=`, `||=`, `??=`
    Logical(LogicalOp),
}
