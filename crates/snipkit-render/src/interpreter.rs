//! Tree-walking evaluator for transpiled snippets.
//!
//! Scopes live in an arena owned by the interpreter and closures refer to
//! them by [`ScopeId`], so function values never form `Rc` cycles with the
//! environments they capture. Every statement and loop iteration consumes
//! one step of fuel, and building large arrays or strings consumes fuel in
//! proportion to their size; the optional budgets in [`Limits`] turn
//! runaway snippets into [`Interrupt::Exhausted`], which `try`/`catch`
//! cannot intercept.
//!
//! `await` runs eagerly: a settled promise yields its value on the spot
//! and a pending one first drains the job queue. If it is still pending
//! the enclosing async function is parked as [`Interrupt::Suspended`] and
//! its promise never settles.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::builtins;
use crate::ir::{
    ArrayItem, AssignOp, AssignTarget, BinaryOp, ClassDef, ClassMemberKind, DeclKind, Expr,
    FunctionBody, FunctionDef, LogicalOp, MemberProp, Module, Pattern, PropItem, PropKey, Stmt,
    UnaryOp,
};
use crate::objects::{self, Job};
use crate::value::{
    Class, ElementKind, Function, HostObject, PromiseState, PropertyMap, Value, FRAGMENT_SYMBOL,
    MAX_ARRAY_LENGTH, MAX_STRING_BYTES,
};

/// Result of evaluating anything that may throw.
pub type Eval<T> = Result<T, Interrupt>;

/// Console lines kept per run.
const MAX_CONSOLE_LINES: usize = 500;

/// Longest console line kept, in bytes.
const MAX_CONSOLE_LINE_BYTES: usize = 8 * 1024;

/// Hidden binding in a class body scope that points at the class itself.
const HOME: &str = "%home";

/// Abrupt termination of evaluation.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A thrown value, catchable by `try`/`catch`.
    Throw(Value),
    /// A resource budget ran out. Not catchable.
    Exhausted(String),
    /// An `await` on a promise that is still pending once the job queue is
    /// empty. Async functions turn this into a promise that never settles.
    Suspended,
}

impl Interrupt {
    /// Throw a fresh error object of the given constructor name.
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Self::Throw(error_object(name, &message.into()))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error("TypeError", message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::error("ReferenceError", message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error("RangeError", message)
    }

    /// Human readable message, `err.message` for error objects.
    pub fn message(&self) -> String {
        match self {
            Self::Throw(Value::Object(map)) => {
                let map = map.borrow();
                match map.get("message") {
                    Some(message) => message.to_js_string(),
                    None => "[object Object]".to_string(),
                }
            }
            Self::Throw(value) => value.to_js_string(),
            Self::Exhausted(message) => message.clone(),
            Self::Suspended => "await is waiting on a promise that never settles".to_string(),
        }
    }
}

/// Build an error object shaped like `new <name>(message)`.
pub fn error_object(name: &str, message: &str) -> Value {
    let mut map = PropertyMap::new();
    map.set("name", Value::string(name));
    map.set("message", Value::string(message));
    Value::object(map)
}

/// Resource budgets enforced while a snippet runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_steps: Option<u64>,
    pub max_call_depth: usize,
    pub max_elements: Option<usize>,
    pub timeout: Option<Duration>,
}

impl Limits {
    /// Only the call-depth guard, which protects the host stack.
    pub fn unbounded() -> Self {
        Self {
            max_steps: None,
            max_call_depth: 128,
            max_elements: None,
            timeout: None,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: Some(1_000_000),
            max_call_depth: 64,
            max_elements: Some(10_000),
            timeout: Some(Duration::from_millis(2_000)),
        }
    }
}

/// Handle to a scope in the interpreter's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

struct Binding {
    value: Value,
    mutable: bool,
}

struct Scope {
    parent: Option<ScopeId>,
    /// Function and module scopes receive `var` declarations.
    function: bool,
    bindings: HashMap<Rc<str>, Binding>,
}

/// Per-render hook bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct RenderContext {
    /// Number of component functions currently on the stack
    pub rendering: usize,
    /// Effects registered but not run
    pub deferred_effects: usize,
    pub next_id: usize,
    pub elements: usize,
}

enum Flow {
    Normal,
    Return(Value),
    Break(Option<Rc<str>>),
    Continue(Option<Rc<str>>),
}

/// What a loop does with the flow its body produced.
enum Step {
    Next,
    Exit,
    Leave(Flow),
}

fn loop_step(flow: Flow, label: Option<&Rc<str>>) -> Step {
    match flow {
        Flow::Normal | Flow::Continue(None) => Step::Next,
        Flow::Break(None) => Step::Exit,
        Flow::Continue(Some(target)) if label == Some(&target) => Step::Next,
        Flow::Break(Some(target)) if label == Some(&target) => Step::Exit,
        other => Step::Leave(other),
    }
}

#[derive(Clone, Copy)]
enum Binder {
    Declare { mutable: bool, var: bool },
    Assign,
}

impl From<DeclKind> for Binder {
    fn from(kind: DeclKind) -> Self {
        Binder::Declare {
            mutable: kind.is_mutable(),
            var: kind == DeclKind::Var,
        }
    }
}

enum Place {
    Binding(Rc<str>),
    Property(Value, Rc<str>),
}

pub struct Interpreter {
    scopes: Vec<Scope>,
    global: ScopeId,
    module: ScopeId,
    exports: Rc<RefCell<PropertyMap>>,
    limits: Limits,
    steps: u64,
    depth: usize,
    started: Instant,
    console: Vec<String>,
    seed: u64,
    pub(crate) jobs: VecDeque<Job>,
    pub(crate) render: RenderContext,
}

impl Interpreter {
    /// Create an interpreter with the standard library installed and an
    /// empty `exports` object bound in module scope.
    pub fn new(limits: Limits) -> Self {
        let mut interp = Self {
            scopes: Vec::new(),
            global: ScopeId(0),
            module: ScopeId(0),
            exports: Rc::new(RefCell::new(PropertyMap::new())),
            limits,
            steps: 0,
            depth: 0,
            started: Instant::now(),
            console: Vec::new(),
            seed: 0x2545_f491_4f6c_dd1d,
            jobs: VecDeque::new(),
            render: RenderContext::default(),
        };
        interp.global = interp.push_scope(None, true);
        interp.module = interp.push_scope(Some(interp.global), true);

        let exports = Value::Object(Rc::clone(&interp.exports));
        let mut module = PropertyMap::new();
        module.set("exports", exports.clone());
        interp.declare(interp.module, "exports", exports, false);
        interp.declare(interp.module, "module", Value::object(module), false);

        builtins::install(&mut interp);
        objects::install(&mut interp);
        interp
    }

    /// Bind a name in the global scope, shadowing any builtin.
    pub fn define_global(&mut self, name: &str, value: Value) {
        let global = self.global;
        self.declare(global, name, value, false);
    }

    /// Evaluate every top-level statement of `module`, then run the
    /// promise jobs it queued.
    pub fn run(&mut self, module: &Module) -> Eval<()> {
        let scope = self.module;
        match self.exec_block(&module.body, scope)? {
            Flow::Return(_) => {
                return Err(Interrupt::error(
                    "SyntaxError",
                    "Illegal return statement",
                ))
            }
            Flow::Normal | Flow::Break(_) | Flow::Continue(_) => {}
        }
        self.drain_jobs()
    }

    /// The value stored in the export slot, `undefined` if nothing was exported.
    pub fn default_export(&self) -> Value {
        self.exports
            .borrow()
            .get("default")
            .cloned()
            .unwrap_or_default()
    }

    /// Lines written through `console.*` so far.
    pub fn console(&self) -> &[String] {
        &self.console
    }

    pub fn take_console(&mut self) -> Vec<String> {
        std::mem::take(&mut self.console)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn log(&mut self, mut line: String) {
        match self.console.len() {
            n if n > MAX_CONSOLE_LINES => return,
            n if n == MAX_CONSOLE_LINES => line = "[warn] further console output dropped".to_string(),
            _ => {}
        }
        if line.len() > MAX_CONSOLE_LINE_BYTES {
            let mut end = MAX_CONSOLE_LINE_BYTES;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
            line.push_str("...");
        }
        self.console.push(line);
    }

    /// Deterministic `Math.random`, so previews render the same way twice.
    pub(crate) fn next_random(&mut self) -> f64 {
        self.seed ^= self.seed >> 12;
        self.seed ^= self.seed << 25;
        self.seed ^= self.seed >> 27;
        let bits = self.seed.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }

    /// Account for one created element against the element budget.
    pub(crate) fn count_element(&mut self) -> Eval<()> {
        self.render.elements += 1;
        match self.limits.max_elements {
            Some(max) if self.render.elements > max => Err(Interrupt::Exhausted(format!(
                "Element limit exceeded ({max} elements)"
            ))),
            _ => Ok(()),
        }
    }

    /// Consume `units` steps of fuel.
    pub(crate) fn charge(&mut self, units: usize) -> Eval<()> {
        let before = self.steps;
        self.steps = self.steps.saturating_add(units as u64);
        if let Some(max) = self.limits.max_steps {
            if self.steps > max {
                return Err(Interrupt::Exhausted(format!(
                    "Execution exceeded the step budget ({max} steps)"
                )));
            }
        }
        if before / 1024 != self.steps / 1024 {
            if let Some(timeout) = self.limits.timeout {
                if self.started.elapsed() > timeout {
                    return Err(Interrupt::Exhausted(format!(
                        "Execution timed out after {} ms",
                        timeout.as_millis()
                    )));
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Eval<()> {
        self.charge(1)
    }

    /// Check an array about to reach `len` items after adding `added`.
    pub(crate) fn grow_array(&mut self, len: usize, added: usize) -> Eval<()> {
        if len > MAX_ARRAY_LENGTH {
            return Err(Interrupt::range_error("Invalid array length"));
        }
        self.charge(added / 16)
    }

    /// Check a string about to be built with `len` bytes.
    pub(crate) fn check_string(&mut self, len: usize) -> Eval<()> {
        if len > MAX_STRING_BYTES {
            return Err(Interrupt::range_error("Invalid string length"));
        }
        self.charge(len / 64)
    }

    /// Run queued promise reactions until none are left.
    pub(crate) fn drain_jobs(&mut self) -> Eval<()> {
        while let Some(job) = self.jobs.pop_front() {
            self.tick()?;
            objects::run_job(self, job)?;
        }
        Ok(())
    }

    // Scopes

    fn push_scope(&mut self, parent: Option<ScopeId>, function: bool) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            function,
            bindings: HashMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    fn child_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.push_scope(Some(parent), false)
    }

    fn declare(&mut self, scope: ScopeId, name: &str, value: Value, mutable: bool) {
        self.scopes[scope.0]
            .bindings
            .insert(Rc::from(name), Binding { value, mutable });
    }

    fn function_scope(&self, mut scope: ScopeId) -> ScopeId {
        loop {
            let current = &self.scopes[scope.0];
            match current.parent {
                Some(parent) if !current.function => scope = parent,
                _ => return scope,
            }
        }
    }

    fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<&Value> {
        loop {
            let current = &self.scopes[scope.0];
            if let Some(binding) = current.bindings.get(name) {
                return Some(&binding.value);
            }
            scope = current.parent?;
        }
    }

    fn assign(&mut self, mut scope: ScopeId, name: &str, value: Value) -> Eval<()> {
        loop {
            let current = &mut self.scopes[scope.0];
            if let Some(binding) = current.bindings.get_mut(name) {
                if !binding.mutable {
                    return Err(Interrupt::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
            match current.parent {
                Some(parent) => scope = parent,
                None => return Err(Interrupt::reference_error(format!("{name} is not defined"))),
            }
        }
    }

    // Statements

    fn exec_block(&mut self, stmts: &[Stmt], scope: ScopeId) -> Eval<Flow> {
        for stmt in stmts {
            if let Stmt::Function { name, def } = stmt {
                let func = self.closure(def, scope, Some(Rc::clone(name)));
                self.declare(scope, name, func, true);
            }
        }
        for stmt in stmts {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: ScopeId) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            Stmt::Declare { kind, declarators } => {
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => match &declarator.pattern {
                            Pattern::Ident(name) => self.eval_named(init, scope, name)?,
                            _ => self.eval(init, scope)?,
                        },
                        None => Value::Undefined,
                    };
                    self.bind(&declarator.pattern, value, scope, (*kind).into())?;
                }
            }
            Stmt::Function { .. } => {}
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    return self.exec(consequent, scope);
                } else if let Some(alternate) = alternate {
                    return self.exec(alternate, scope);
                }
            }
            Stmt::Block(stmts) => {
                let inner = self.child_scope(scope);
                return self.exec_block(stmts, inner);
            }
            Stmt::While { .. }
            | Stmt::DoWhile { .. }
            | Stmt::For { .. }
            | Stmt::ForOf { .. }
            | Stmt::ForIn { .. } => return self.exec_loop(stmt, scope, None),
            Stmt::Labeled { label, body } => {
                if is_loop(body) {
                    return self.exec_loop(body, scope, Some(label));
                }
                return match self.exec(body, scope)? {
                    Flow::Break(Some(target)) if target == *label => Ok(Flow::Normal),
                    other => Ok(other),
                };
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval(discriminant, scope)?;
                let inner = self.child_scope(scope);
                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if value.strict_equals(&self.eval(test, inner)?) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
                if let Some(start) = start {
                    for case in &cases[start..] {
                        for stmt in &case.body {
                            match self.exec(stmt, inner)? {
                                Flow::Normal => {}
                                Flow::Break(None) => return Ok(Flow::Normal),
                                other => return Ok(other),
                            }
                        }
                    }
                }
            }
            Stmt::Break(label) => return Ok(Flow::Break(label.clone())),
            Stmt::Continue(label) => return Ok(Flow::Continue(label.clone())),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                return Err(Interrupt::Throw(value));
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let inner = self.child_scope(scope);
                let mut result = self.exec_block(block, inner);
                if let (Err(Interrupt::Throw(thrown)), Some(handler)) = (&result, handler) {
                    let thrown = thrown.clone();
                    let catch_scope = self.child_scope(scope);
                    result = match param {
                        Some(param) => self
                            .bind(param, thrown, catch_scope, DeclKind::Let.into())
                            .and_then(|()| self.exec_block(handler, catch_scope)),
                        None => self.exec_block(handler, catch_scope),
                    };
                }
                if let Err(Interrupt::Exhausted(_) | Interrupt::Suspended) = result {
                    return result;
                }
                if let Some(finalizer) = finalizer {
                    let finally_scope = self.child_scope(scope);
                    match self.exec_block(finalizer, finally_scope)? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                return result;
            }
            Stmt::ExportDefault(expr) => {
                let value = self.eval_named(expr, scope, "default")?;
                self.exports.borrow_mut().set("default", value);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_loop(&mut self, stmt: &Stmt, scope: ScopeId, label: Option<&Rc<str>>) -> Eval<Flow> {
        match stmt {
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match loop_step(self.exec(body, scope)?, label) {
                        Step::Next => {}
                        Step::Exit => break,
                        Step::Leave(flow) => return Ok(flow),
                    }
                    self.tick()?;
                }
            }
            Stmt::DoWhile { body, test } => loop {
                match loop_step(self.exec(body, scope)?, label) {
                    Step::Next => {}
                    Step::Exit => break,
                    Step::Leave(flow) => return Ok(flow),
                }
                self.tick()?;
                if !self.eval(test, scope)?.truthy() {
                    break;
                }
            },
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let inner = self.child_scope(scope);
                if let Some(init) = init {
                    self.exec(init, inner)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, inner)?.truthy() {
                            break;
                        }
                    }
                    match loop_step(self.exec(body, inner)?, label) {
                        Step::Next => {}
                        Step::Exit => break,
                        Step::Leave(flow) => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval(update, inner)?;
                    }
                    self.tick()?;
                }
            }
            Stmt::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let items = self.iterate(&iterable)?;
                return self.exec_each(items, *kind, pattern, body, scope, label);
            }
            Stmt::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                let object = self.eval(object, scope)?;
                let keys = self
                    .enumerable_keys(&object)?
                    .into_iter()
                    .map(Value::String)
                    .collect();
                return self.exec_each(keys, *kind, pattern, body, scope, label);
            }
            other => return self.exec(other, scope),
        }
        Ok(Flow::Normal)
    }

    fn exec_each(
        &mut self,
        items: Vec<Value>,
        kind: DeclKind,
        pattern: &Pattern,
        body: &Stmt,
        scope: ScopeId,
        label: Option<&Rc<str>>,
    ) -> Eval<Flow> {
        for item in items {
            let inner = self.child_scope(scope);
            self.bind(pattern, item, inner, kind.into())?;
            match loop_step(self.exec(body, inner)?, label) {
                Step::Next => {}
                Step::Exit => break,
                Step::Leave(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    // Patterns

    fn bind(&mut self, pattern: &Pattern, value: Value, scope: ScopeId, binder: Binder) -> Eval<()> {
        match pattern {
            Pattern::Ident(name) => match binder {
                Binder::Declare { mutable, var } => {
                    let target = if var { self.function_scope(scope) } else { scope };
                    self.declare(target, name, value, mutable);
                    Ok(())
                }
                Binder::Assign => self.assign(scope, name, value),
            },
            Pattern::Default { target, default } => {
                let value = match value {
                    Value::Undefined => match &**target {
                        Pattern::Ident(name) => self.eval_named(default, scope, name)?,
                        _ => self.eval(default, scope)?,
                    },
                    other => other,
                };
                self.bind(target, value, scope, binder)
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(Interrupt::type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                let mut taken = Vec::with_capacity(props.len());
                for (key, target) in props {
                    let key = self.prop_key(key, scope)?;
                    let item = self.get_property(&value, &key)?;
                    taken.push(key);
                    self.bind(target, item, scope, binder)?;
                }
                if let Some(rest) = rest {
                    let mut remaining = PropertyMap::new();
                    if let Value::Object(map) = &value {
                        for (key, item) in map.borrow().iter() {
                            if !taken.contains(key) {
                                remaining.set(Rc::clone(key), item.clone());
                            }
                        }
                    }
                    self.bind(rest, Value::object(remaining), scope, binder)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    if let Some(element) = element {
                        let item = items.get(index).cloned().unwrap_or_default();
                        self.bind(element, item, scope, binder)?;
                    }
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elements.len()..).unwrap_or_default().to_vec();
                    self.bind(rest, Value::array(remaining), scope, binder)?;
                }
                Ok(())
            }
        }
    }

    // Expressions

    fn closure(&self, def: &Rc<FunctionDef>, scope: ScopeId, name: Option<Rc<str>>) -> Value {
        Value::Function(Rc::new(Function::Closure {
            def: Rc::clone(def),
            scope,
            name,
        }))
    }

    /// Evaluate with name inference for `const Name = () => ...` and
    /// `const Name = class { ... }`.
    fn eval_named(&mut self, expr: &Expr, scope: ScopeId, name: &str) -> Eval<Value> {
        match expr {
            Expr::Function(def) if def.name.is_none() => {
                Ok(self.closure(def, scope, Some(Rc::from(name))))
            }
            Expr::Class(def) if def.name.is_none() => self.class(def, scope, Some(Rc::from(name))),
            other => self.eval(other, scope),
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr, scope: ScopeId) -> Eval<Value> {
        match expr {
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(Rc::clone(s))),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(index) {
                        out.push_str(&self.eval(expr, scope)?.to_js_string());
                    }
                    if out.len() > MAX_STRING_BYTES {
                        return Err(Interrupt::range_error("Invalid string length"));
                    }
                }
                self.check_string(out.len())?;
                Ok(Value::string(&out))
            }
            Expr::Ident(name) => self
                .lookup(scope, name)
                .cloned()
                .ok_or_else(|| Interrupt::reference_error(format!("{name} is not defined"))),
            Expr::This => Ok(self.lookup(scope, "this").cloned().unwrap_or_default()),
            Expr::Array(items) => Ok(Value::array(self.eval_items(items, scope)?)),
            Expr::Object(props) => {
                let mut map = PropertyMap::new();
                for prop in props {
                    match prop {
                        PropItem::Init(key, value) => {
                            let key = self.prop_key(key, scope)?;
                            let value = self.eval_named(value, scope, &key)?;
                            map.set(key, value);
                        }
                        PropItem::Spread(expr) => {
                            let source = self.eval(expr, scope)?;
                            for key in self.enumerable_keys(&source)? {
                                let value = self.get_property(&source, &key)?;
                                map.set(key, value);
                            }
                        }
                    }
                }
                Ok(Value::object(map))
            }
            Expr::Function(def) => Ok(self.closure(def, scope, None)),
            Expr::Class(def) => self.class(def, scope, None),
            Expr::Unary { op, arg } => {
                if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, &**arg) {
                    let kind = self.lookup(scope, name).map_or("undefined", Value::type_of);
                    return Ok(Value::string(kind));
                }
                let value = self.eval(arg, scope)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
                    UnaryOp::Typeof => Value::string(value.type_of()),
                    UnaryOp::Void => Value::Undefined,
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                if short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let place = self.place(target, scope)?;
                let result = match op {
                    AssignOp::Assign => match &place {
                        Place::Binding(name) => self.eval_named(value, scope, &Rc::clone(name))?,
                        Place::Property(..) => self.eval(value, scope)?,
                    },
                    AssignOp::Compound(op) => {
                        let current = self.load(&place, scope)?;
                        let value = self.eval(value, scope)?;
                        self.binary(*op, &current, &value)?
                    }
                    AssignOp::Logical(op) => {
                        let current = self.load(&place, scope)?;
                        if short_circuits(*op, &current) {
                            return Ok(current);
                        }
                        self.eval(value, scope)?
                    }
                };
                self.store(place, result.clone(), scope)?;
                Ok(result)
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.place(target, scope)?;
                let old = self.load(&place, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.store(place, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object, scope)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.member_key(property, scope)?;
                self.get_property(&object, &key)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let (func, this) = match &**callee {
                    Expr::Member {
                        object,
                        property,
                        optional: member_optional,
                    } => {
                        let object = self.eval(object, scope)?;
                        if *member_optional && object.is_nullish() {
                            return Ok(Value::Undefined);
                        }
                        let key = self.member_key(property, scope)?;
                        (self.get_property(&object, &key)?, object)
                    }
                    other => (self.eval(other, scope)?, Value::Undefined),
                };
                if *optional && func.is_nullish() {
                    return Ok(Value::Undefined);
                }
                if !func.is_callable() {
                    return Err(Interrupt::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                }
                let args = self.eval_items(args, scope)?;
                self.call(&func, this, &args)
            }
            Expr::New { callee, args } => {
                let func = self.eval(callee, scope)?;
                match &func {
                    Value::Function(f) if is_constructor(f) => {
                        let args = self.eval_items(args, scope)?;
                        self.construct(&func, &args)
                    }
                    _ => Err(Interrupt::type_error(format!(
                        "{} is not a constructor",
                        describe(callee)
                    ))),
                }
            }
            Expr::SuperCall(args) => {
                let home = self.lookup(scope, HOME).cloned();
                let this = self.lookup(scope, "this").cloned().unwrap_or_default();
                let Some(Value::Function(class)) = home else {
                    return Err(Interrupt::error(
                        "SyntaxError",
                        "'super' keyword unexpected here",
                    ));
                };
                let args = self.eval_items(args, scope)?;
                self.super_construct(&class, &this, &args)?;
                Ok(Value::Undefined)
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
            Expr::Await(arg) => {
                let value = self.eval(arg, scope)?;
                self.await_value(value)
            }
            Expr::Delete { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                delete_property(&object, &key)?;
                Ok(Value::Bool(true))
            }
            Expr::Unsupported { line, what } => Err(Interrupt::error(
                "SyntaxError",
                format!("Unsupported syntax at line {line}: {what}"),
            )),
        }
    }

    fn eval_items(&mut self, items: &[ArrayItem], scope: ScopeId) -> Eval<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ArrayItem::Expr(expr) => out.push(self.eval(expr, scope)?),
                ArrayItem::Spread(expr) => {
                    let value = self.eval(expr, scope)?;
                    let spread = self.iterate(&value)?;
                    self.grow_array(out.len() + spread.len(), spread.len())?;
                    out.extend(spread);
                }
                ArrayItem::Hole => out.push(Value::Undefined),
            }
        }
        Ok(out)
    }

    fn prop_key(&mut self, key: &PropKey, scope: ScopeId) -> Eval<Rc<str>> {
        match key {
            PropKey::Static(name) => Ok(Rc::clone(name)),
            PropKey::Computed(expr) => Ok(self.eval(expr, scope)?.to_property_key()),
        }
    }

    fn member_key(&mut self, property: &MemberProp, scope: ScopeId) -> Eval<Rc<str>> {
        match property {
            MemberProp::Static(name) => Ok(Rc::clone(name)),
            MemberProp::Computed(expr) => Ok(self.eval(expr, scope)?.to_property_key()),
        }
    }

    fn place(&mut self, target: &AssignTarget, scope: ScopeId) -> Eval<Place> {
        match target {
            AssignTarget::Ident(name) => Ok(Place::Binding(Rc::clone(name))),
            AssignTarget::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                Ok(Place::Property(object, key))
            }
        }
    }

    fn load(&mut self, place: &Place, scope: ScopeId) -> Eval<Value> {
        match place {
            Place::Binding(name) => self
                .lookup(scope, name)
                .cloned()
                .ok_or_else(|| Interrupt::reference_error(format!("{name} is not defined"))),
            Place::Property(object, key) => self.get_property(object, key),
        }
    }

    fn store(&mut self, place: Place, value: Value, scope: ScopeId) -> Eval<()> {
        match place {
            Place::Binding(name) => self.assign(scope, &name, value),
            Place::Property(object, key) => self.set_property(&object, &key, value),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
        if op != BinaryOp::Add {
            return binary(op, left, right);
        }
        match (to_primitive(left), to_primitive(right)) {
            (a @ Value::String(_), b) | (a, b @ Value::String(_)) => {
                let (a, b) = (a.to_js_string(), b.to_js_string());
                self.check_string(a.len() + b.len())?;
                let mut out = String::with_capacity(a.len() + b.len());
                out.push_str(&a);
                out.push_str(&b);
                Ok(Value::string(&out))
            }
            (a, b) => Ok(Value::Number(a.to_number() + b.to_number())),
        }
    }

    fn await_value(&mut self, value: Value) -> Eval<Value> {
        let Value::Host(host) = value.clone() else {
            return Ok(value);
        };
        let HostObject::Promise(state) = &*host else {
            return Ok(value);
        };
        if matches!(*state.borrow(), PromiseState::Pending(_)) {
            self.drain_jobs()?;
        }
        let state = state.borrow();
        match &*state {
            PromiseState::Fulfilled(value) => Ok(value.clone()),
            PromiseState::Rejected(reason) => Err(Interrupt::Throw(reason.clone())),
            PromiseState::Pending(_) => Err(Interrupt::Suspended),
        }
    }

    /// Materialize an iterable into its items.
    pub(crate) fn iterate(&mut self, value: &Value) -> Eval<Vec<Value>> {
        match value {
            Value::Array(items) => {
                let items = items.borrow().clone();
                self.charge(items.len() / 16)?;
                Ok(items)
            }
            Value::String(s) => {
                let count = s.chars().count();
                self.grow_array(count, count)?;
                Ok(s.chars().map(|c| Value::string(c.encode_utf8(&mut [0; 4]))).collect())
            }
            Value::Host(host) => match &**host {
                HostObject::Map(entries) => Ok(entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                    .collect()),
                HostObject::Set(items) => Ok(items.borrow().clone()),
                other => Err(Interrupt::type_error(format!(
                    "{} is not iterable",
                    other.class_name()
                ))),
            },
            other => Err(Interrupt::type_error(format!(
                "{} is not iterable",
                match other {
                    Value::Undefined | Value::Null => other.to_js_string(),
                    _ => other.type_of().to_string(),
                }
            ))),
        }
    }

    /// Own enumerable keys, as seen by `for...in`, spread and `Object.keys`.
    pub(crate) fn enumerable_keys(&mut self, value: &Value) -> Eval<Vec<Rc<str>>> {
        let count = match value {
            Value::Object(map) => return Ok(map.borrow().keys().cloned().collect()),
            Value::Function(func) => {
                return Ok(match &**func {
                    Function::Class(class) => class.statics.borrow().keys().cloned().collect(),
                    _ => Vec::new(),
                })
            }
            Value::Array(items) => items.borrow().len(),
            Value::String(s) => s.chars().count(),
            _ => return Ok(Vec::new()),
        };
        self.grow_array(count, count)?;
        Ok((0..count).map(|i| Rc::from(i.to_string().as_str())).collect())
    }

    /// Read `object[key]`, including the builtin methods of primitives.
    pub(crate) fn get_property(&mut self, object: &Value, key: &str) -> Eval<Value> {
        Ok(match object {
            Value::Undefined | Value::Null => {
                return Err(Interrupt::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    object.to_js_string(),
                    key
                )))
            }
            Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                match index_of(key) {
                    Some(index) => items.borrow().get(index).cloned().unwrap_or_default(),
                    None => builtins::array_method(key)
                        .map(|(name, call)| Value::method(name, call, object.clone()))
                        .unwrap_or_default(),
                }
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                match index_of(key) {
                    Some(index) => s
                        .chars()
                        .nth(index)
                        .map(|c| Value::string(c.encode_utf8(&mut [0; 4])))
                        .unwrap_or_default(),
                    None => builtins::string_method(key)
                        .map(|(name, call)| Value::method(name, call, object.clone()))
                        .unwrap_or_default(),
                }
            }
            Value::Number(_) => builtins::number_method(key)
                .map(|(name, call)| Value::method(name, call, object.clone()))
                .unwrap_or_default(),
            Value::Bool(_) if key == "toString" => {
                Value::method("toString", builtins::to_string_method, object.clone())
            }
            Value::Function(func) => static_property(func, key),
            Value::Element(element) => match key {
                "props" => Value::object(element.props.clone()),
                "key" => element
                    .key
                    .as_ref()
                    .map(|k| Value::String(Rc::clone(k)))
                    .unwrap_or(Value::Null),
                "type" => match &element.kind {
                    ElementKind::Host(tag) => Value::String(Rc::clone(tag)),
                    ElementKind::Fragment => Value::Symbol(FRAGMENT_SYMBOL),
                    ElementKind::Component(func) => Value::Function(Rc::clone(func)),
                },
                _ => Value::Undefined,
            },
            Value::Host(host) => objects::host_member(object, host, key),
            Value::Bool(_) | Value::Symbol(_) => Value::Undefined,
        })
    }

    /// Write `object[key] = value`.
    pub(crate) fn set_property(&mut self, object: &Value, key: &str, value: Value) -> Eval<()> {
        match object {
            Value::Undefined | Value::Null => Err(Interrupt::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                object.to_js_string(),
                key
            ))),
            Value::Object(map) => {
                map.borrow_mut().set(key, value);
                Ok(())
            }
            Value::Array(items) => {
                let len = items.borrow().len();
                if key == "length" {
                    let new_len = value
                        .as_index()
                        .ok_or_else(|| Interrupt::range_error("Invalid array length"))?;
                    if new_len > len {
                        self.grow_array(new_len, new_len - len)?;
                    }
                    items.borrow_mut().resize(new_len, Value::Undefined);
                } else if let Some(index) = index_of(key) {
                    if index >= len {
                        self.grow_array(index + 1, index + 1 - len)?;
                        items.borrow_mut().resize(index + 1, Value::Undefined);
                    }
                    items.borrow_mut()[index] = value;
                }
                Ok(())
            }
            Value::Function(func) => {
                if let Function::Class(class) = &**func {
                    class.statics.borrow_mut().set(key, value);
                }
                Ok(())
            }
            // Writes to primitives, elements and host objects are dropped.
            _ => Ok(()),
        }
    }

    /// Call any callable value.
    pub fn call(&mut self, callee: &Value, this: Value, args: &[Value]) -> Eval<Value> {
        let Value::Function(func) = callee else {
            return Err(Interrupt::type_error(format!(
                "{} is not a function",
                callee.to_js_string()
            )));
        };
        self.enter()?;
        let result = match &**func {
            Function::Native { call, receiver, .. } => {
                let this = if receiver.is_nullish() { this } else { receiver.clone() };
                call(self, &this, args)
            }
            Function::Closure { def, scope, .. } => self.invoke(def, *scope, this, args, Some(func)),
            Function::Class(_) => Err(Interrupt::type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                func.name()
            ))),
        };
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Eval<()> {
        if self.depth >= self.limits.max_call_depth {
            return Err(Interrupt::Exhausted(format!(
                "Maximum call depth exceeded ({} frames)",
                self.limits.max_call_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn invoke(
        &mut self,
        def: &Rc<FunctionDef>,
        captured: ScopeId,
        this: Value,
        args: &[Value],
        itself: Option<&Rc<Function>>,
    ) -> Eval<Value> {
        self.tick()?;
        let scope = self.push_scope(Some(captured), true);
        if let (Some(name), Some(func)) = (&def.name, itself) {
            self.declare(scope, name, Value::Function(Rc::clone(func)), true);
        }
        if !def.is_arrow {
            self.declare(scope, "this", this, false);
        }
        let result = self.run_body(def, scope, args);
        if !def.is_async {
            return result;
        }
        let promise = objects::new_promise();
        match result {
            Ok(value) => objects::resolve_promise(self, &promise, value),
            Err(Interrupt::Throw(reason)) => objects::reject_promise(self, &promise, reason),
            Err(Interrupt::Suspended) => {}
            Err(exhausted) => return Err(exhausted),
        }
        Ok(promise)
    }

    fn run_body(&mut self, def: &FunctionDef, scope: ScopeId, args: &[Value]) -> Eval<Value> {
        for (index, param) in def.params.iter().enumerate() {
            let arg = args.get(index).cloned().unwrap_or_default();
            self.bind(param, arg, scope, DeclKind::Let.into())?;
        }
        if let Some(rest) = &def.rest {
            let extra = args.get(def.params.len()..).unwrap_or_default().to_vec();
            self.bind(rest, Value::array(extra), scope, DeclKind::Let.into())?;
        }
        match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr, scope),
            FunctionBody::Block(stmts) => match self.exec_block(stmts, scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    // Classes

    fn class(&mut self, def: &Rc<ClassDef>, scope: ScopeId, name: Option<Rc<str>>) -> Eval<Value> {
        let parent = match &def.extends {
            None => None,
            Some(expr) => match self.eval(expr, scope)? {
                Value::Null => None,
                Value::Function(parent) if is_constructor(&parent) => Some(parent),
                other => {
                    return Err(Interrupt::type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        other.to_js_string()
                    )))
                }
            },
        };
        let class_scope = self.child_scope(scope);
        let value = Value::Function(Rc::new(Function::Class(Class {
            def: Rc::clone(def),
            scope: class_scope,
            parent,
            name,
            statics: RefCell::new(PropertyMap::new()),
        })));
        if let Some(own) = &def.name {
            self.declare(class_scope, own, value.clone(), false);
        }
        self.declare(class_scope, HOME, value.clone(), false);

        for member in def.members.iter().filter(|member| member.is_static) {
            let key = self.prop_key(&member.key, class_scope)?;
            let item = match &member.kind {
                ClassMemberKind::Method(method) => {
                    self.closure(method, class_scope, Some(Rc::clone(&key)))
                }
                ClassMemberKind::Field(init) => {
                    self.field_value(init.as_ref(), class_scope, &value, &key)?
                }
            };
            self.set_property(&value, &key, item)?;
        }
        Ok(value)
    }

    fn field_value(
        &mut self,
        init: Option<&Expr>,
        class_scope: ScopeId,
        this: &Value,
        key: &str,
    ) -> Eval<Value> {
        let Some(init) = init else {
            return Ok(Value::Undefined);
        };
        let scope = self.push_scope(Some(class_scope), true);
        self.declare(scope, "this", this.clone(), false);
        self.eval_named(init, scope, key)
    }

    /// `new callee(...args)`.
    pub(crate) fn construct(&mut self, callee: &Value, args: &[Value]) -> Eval<Value> {
        let Value::Function(func) = callee else {
            return Err(Interrupt::type_error(format!(
                "{} is not a constructor",
                callee.to_js_string()
            )));
        };
        match &**func {
            Function::Native { .. } => self.call(callee, Value::Undefined, args),
            Function::Closure { .. } => {
                let instance = Value::object(PropertyMap::new());
                let result = self.call(callee, instance.clone(), args)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) | Value::Function(_) | Value::Host(_) => {
                        result
                    }
                    _ => instance,
                })
            }
            Function::Class(_) => {
                self.enter()?;
                let instance = Value::object(PropertyMap::new());
                let result = self
                    .install_methods(func, &instance)
                    .and_then(|()| self.construct_into(func, &instance, args));
                self.depth -= 1;
                result.map(|()| instance)
            }
        }
    }

    /// Copy the instance methods of `class` and its ancestors onto `instance`,
    /// root class first so overrides win.
    fn install_methods(&mut self, class: &Rc<Function>, instance: &Value) -> Eval<()> {
        let Function::Class(class) = &**class else {
            return Ok(());
        };
        if let Some(parent) = &class.parent {
            self.install_methods(parent, instance)?;
        }
        for member in class.def.members.iter().filter(|member| !member.is_static) {
            if let ClassMemberKind::Method(method) = &member.kind {
                let key = self.prop_key(&member.key, class.scope)?;
                let func = self.closure(method, class.scope, Some(Rc::clone(&key)));
                self.set_property(instance, &key, func)?;
            }
        }
        Ok(())
    }

    fn construct_into(&mut self, class_fn: &Rc<Function>, instance: &Value, args: &[Value]) -> Eval<()> {
        let Function::Class(class) = &**class_fn else {
            return Ok(());
        };
        match &class.def.constructor {
            Some(constructor) => {
                if class.parent.is_none() {
                    self.init_fields(class, instance)?;
                }
                self.invoke(constructor, class.scope, instance.clone(), args, None)?;
                Ok(())
            }
            None => self.super_construct(class_fn, instance, args),
        }
    }

    /// Run the parent constructor against `instance`, then the field
    /// initializers of `class_fn`.
    fn super_construct(&mut self, class_fn: &Rc<Function>, instance: &Value, args: &[Value]) -> Eval<()> {
        let Function::Class(class) = &**class_fn else {
            return Ok(());
        };
        if let Some(parent) = &class.parent {
            match &**parent {
                Function::Class(_) => self.construct_into(parent, instance, args)?,
                _ => {
                    let result = self.call(&Value::Function(Rc::clone(parent)), instance.clone(), args)?;
                    if let (Value::Object(source), Value::Object(target)) = (&result, instance) {
                        if !Rc::ptr_eq(source, target) {
                            for (key, value) in source.borrow().iter() {
                                target.borrow_mut().set(Rc::clone(key), value.clone());
                            }
                        }
                    }
                }
            }
        }
        self.init_fields(class, instance)
    }

    fn init_fields(&mut self, class: &Class, instance: &Value) -> Eval<()> {
        for member in class.def.members.iter().filter(|member| !member.is_static) {
            if let ClassMemberKind::Field(init) = &member.kind {
                let key = self.prop_key(&member.key, class.scope)?;
                let value = self.field_value(init.as_ref(), class.scope, instance, &key)?;
                self.set_property(instance, &key, value)?;
            }
        }
        Ok(())
    }
}

fn is_loop(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::While { .. }
            | Stmt::DoWhile { .. }
            | Stmt::For { .. }
            | Stmt::ForOf { .. }
            | Stmt::ForIn { .. }
    )
}

/// Whether `new` may be applied to `func`.
pub(crate) fn is_constructor(func: &Function) -> bool {
    match func {
        Function::Native { .. } | Function::Class(_) => true,
        Function::Closure { def, .. } => !def.is_arrow && !def.is_async,
    }
}

/// Properties of function values: `name`, class statics and the static
/// members of builtin constructors.
fn static_property(func: &Rc<Function>, key: &str) -> Value {
    if key == "name" {
        return Value::string(func.name());
    }
    match &**func {
        Function::Class(class) => match class.statics.borrow().get(key) {
            Some(value) => value.clone(),
            None => class
                .parent
                .as_ref()
                .map(|parent| static_property(parent, key))
                .unwrap_or_default(),
        },
        Function::Native { .. } => builtins::static_member(func, key).unwrap_or_default(),
        Function::Closure { .. } => Value::Undefined,
    }
}

/// `delete object[key]`.
fn delete_property(object: &Value, key: &str) -> Eval<()> {
    match object {
        Value::Undefined | Value::Null => Err(Interrupt::type_error(format!(
            "Cannot convert undefined or null to object (deleting '{key}')"
        ))),
        Value::Object(map) => {
            map.borrow_mut().remove(key);
            Ok(())
        }
        Value::Array(items) => {
            if let Some(index) = index_of(key) {
                if let Some(slot) = items.borrow_mut().get_mut(index) {
                    *slot = Value::Undefined;
                }
            }
            Ok(())
        }
        Value::Function(func) => {
            if let Function::Class(class) = &**func {
                class.statics.borrow_mut().remove(key);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Canonical array index form of a property key.
fn index_of(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key.len() == 1 || !key.starts_with('0'));
    if canonical {
        key.parse().ok()
    } else {
        None
    }
}

fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() % 4_294_967_296.0) as i64 as u32 as i32
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Element(_) | Value::Host(_) => {
            Value::string(&value.to_js_string())
        }
        other => other.clone(),
    }
}

/// Relational comparison; dates compare by their time value.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let primitive = |value: &Value| match value {
        Value::Host(host) if matches!(**host, HostObject::Date(_)) => Value::Number(value.to_number()),
        other => to_primitive(other),
    };
    match (primitive(left), primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// Every binary operator except string-producing `+`.
fn binary(op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    let int = |f: fn(i32, i32) -> i32| {
        Value::Number(f64::from(f(
            to_int32(left.to_number()),
            to_int32(right.to_number()),
        )))
    };
    Ok(match op {
        BinaryOp::Add => num(|a, b| a + b),
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Exp => num(f64::powf),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::BitAnd => int(|a, b| a & b),
        BinaryOp::BitOr => int(|a, b| a | b),
        BinaryOp::BitXor => int(|a, b| a ^ b),
        BinaryOp::Shl => int(|a, b| a.wrapping_shl(b as u32 & 31)),
        BinaryOp::Shr => int(|a, b| a.wrapping_shr(b as u32 & 31)),
        BinaryOp::UShr => {
            let a = to_int32(left.to_number()) as u32;
            let b = to_int32(right.to_number()) as u32 & 31;
            Value::Number(f64::from(a >> b))
        }
        BinaryOp::In => {
            let key = left.to_property_key();
            match right {
                Value::Object(map) => Value::Bool(map.borrow().contains(&key)),
                Value::Array(items) => Value::Bool(
                    &*key == "length" || index_of(&key).is_some_and(|i| i < items.borrow().len()),
                ),
                Value::Function(func) => Value::Bool(!static_property(func, &key).is_nullish()),
                other => {
                    return Err(Interrupt::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        other.to_js_string()
                    )))
                }
            }
        }
    })
}

/// Short source-like description of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.to_string(),
        Expr::This => "this".to_string(),
        Expr::Member {
            object,
            property: MemberProp::Static(name),
            ..
        } => format!("{}.{}", describe(object), name),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpile::{transpile, TranspileOptions};

    fn run(source: &str) -> Interpreter {
        let module = transpile(source, &TranspileOptions::default()).unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.run(&module).unwrap();
        interp
    }

    fn export(source: &str) -> Value {
        run(source).default_export()
    }

    fn run_err(source: &str, limits: Limits) -> Interrupt {
        let module = transpile(source, &TranspileOptions::default()).unwrap();
        let mut interp = Interpreter::new(limits);
        interp.run(&module).unwrap_err()
    }

    #[test]
    fn arithmetic_and_strings() {
        let value = export("exports.default = 1 + 2 * 3 + '!' + (7 % 4);");
        assert_eq!(value.to_js_string(), "7!3");
    }

    #[test]
    fn closures_capture_their_scope() {
        let value = export(
            r#"
            function counter() {
                let n = 0;
                return () => { n += 1; return n; };
            }
            const next = counter();
            next(); next();
            exports.default = next();
            "#,
        );
        assert_eq!(value.to_number(), 3.0);
    }

    #[test]
    fn export_default_statement_fills_export_slot() {
        let value = export("export default function Card() { return null; }");
        match value {
            Value::Function(func) => assert_eq!(func.name(), "Card"),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn arrow_functions_take_binding_name() {
        let value = export("const Badge = () => null; exports.default = Badge;");
        match value {
            Value::Function(func) => assert_eq!(func.name(), "Badge"),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn destructuring_with_defaults_and_rest() {
        let value = export(
            r#"
            const { a, b = 5, ...others } = { a: 1, c: 3, d: 4 };
            const [first, , third = 9, ...tail] = [10, 20, undefined, 40, 50];
            exports.default = [a, b, Object.keys(others).join(''), first, third, tail.length].join(',');
            "#,
        );
        assert_eq!(value.to_js_string(), "1,5,cd,10,9,2");
    }

    #[test]
    fn loops_and_switch() {
        let value = export(
            r#"
            let total = 0;
            for (let i = 0; i < 10; i++) {
                if (i % 2) continue;
                total += i;
            }
            for (const x of [1, 2, 3]) { total += x; }
            let label;
            switch (total) {
                case 1: label = 'one'; break;
                case 26: label = 'twenty-six';
                default: label = label + '!';
            }
            exports.default = label;
            "#,
        );
        assert_eq!(value.to_js_string(), "twenty-six!");
    }

    #[test]
    fn labeled_break_and_continue() {
        let value = export(
            r#"
            const hits = [];
            outer: for (let i = 0; i < 3; i++) {
                for (let j = 0; j < 3; j++) {
                    if (j === 1) continue outer;
                    if (i === 2) break outer;
                    hits.push(`${i}${j}`);
                }
            }
            block: {
                hits.push('in');
                break block;
            }
            exports.default = hits.join(',');
            "#,
        );
        assert_eq!(value.to_js_string(), "00,10,in");
    }

    #[test]
    fn try_catch_receives_thrown_errors() {
        let value = export(
            r#"
            let message;
            try {
                null.foo;
            } catch (err) {
                message = err.message;
            } finally {
                message += '.';
            }
            exports.default = message;
            "#,
        );
        assert_eq!(
            value.to_js_string(),
            "Cannot read properties of null (reading 'foo')."
        );
    }

    #[test]
    fn methods_see_their_receiver() {
        let value = export(
            r#"
            const counter = {
                count: 2,
                double() { return this.count * 2; },
                later() { return [1].map(() => this.count)[0]; },
            };
            exports.default = `${counter.double()}/${counter.later()}`;
            "#,
        );
        assert_eq!(value.to_js_string(), "4/2");
    }

    #[test]
    fn classes_with_fields_statics_and_inheritance() {
        let value = export(
            r#"
            class Shape {
                static count = 0;
                sides = 0;
                constructor(name) { this.name = name; Shape.count += 1; }
                describe() { return `${this.name}:${this.sides}`; }
            }
            class Square extends Shape {
                sides = 4;
                constructor() { super('square'); }
                area(size) { return size * size; }
            }
            const sq = new Square();
            new Shape('blob');
            exports.default = [sq.describe(), sq.area(3), Shape.count, Square.count].join(',');
            "#,
        );
        assert_eq!(value.to_js_string(), "square:4,9,2,2");
    }

    #[test]
    fn calling_a_class_without_new_throws() {
        let err = run_err("class A {} A();", Limits::default());
        assert_eq!(err.message(), "Class constructor A cannot be invoked without 'new'");
    }

    #[test]
    fn arrow_functions_are_not_constructors() {
        let err = run_err("const f = () => {}; new f();", Limits::default());
        assert_eq!(err.message(), "f is not a constructor");
    }

    #[test]
    fn async_functions_settle_after_the_job_queue_drains() {
        let interp = run(
            r#"
            const order = [];
            async function load(n) {
                order.push('start');
                const value = await Promise.resolve(n);
                order.push('resumed');
                return value * 3;
            }
            load(2).then(v => { order.push(`then ${v}`); exports.default = order.join(','); });
            order.push('sync');
            "#,
        );
        assert_eq!(
            interp.default_export().to_js_string(),
            "start,resumed,sync,then 6"
        );
    }

    #[test]
    fn rejected_awaits_are_catchable() {
        let interp = run(
            r#"
            async function fail() { throw new Error('nope'); }
            async function run() {
                try { await fail(); } catch (err) { return 'caught ' + err.message; }
            }
            run().then(v => { exports.default = v; });
            "#,
        );
        assert_eq!(interp.default_export().to_js_string(), "caught nope");
    }

    #[test]
    fn awaiting_a_pending_promise_parks_the_function() {
        let interp = run(
            r#"
            const never = new Promise(() => {});
            async function wait() { await never; console.log('unreachable'); }
            const result = wait();
            exports.default = typeof result.then;
            "#,
        );
        assert_eq!(interp.default_export().to_js_string(), "function");
        assert!(interp.console().is_empty());
    }

    #[test]
    fn delete_removes_object_keys() {
        let value = export(
            "const o = { a: 1, b: 2, c: 3 }; delete o.a; delete o['c']; exports.default = Object.keys(o).join() + o.b;",
        );
        assert_eq!(value.to_js_string(), "b2");
    }

    #[test]
    fn const_reassignment_throws() {
        let err = run_err("const a = 1; a = 2;", Limits::default());
        assert_eq!(err.message(), "Assignment to constant variable.");
    }

    #[test]
    fn undefined_identifier_throws_reference_error() {
        let err = run_err("exports.default = missing + 1;", Limits::default());
        assert_eq!(err.message(), "missing is not defined");
    }

    #[test]
    fn calling_non_function_names_the_callee() {
        let err = run_err("const obj = {}; obj.render();", Limits::default());
        assert_eq!(err.message(), "obj.render is not a function");
    }

    #[test]
    fn step_budget_stops_infinite_loops() {
        let limits = Limits {
            max_steps: Some(10_000),
            ..Limits::default()
        };
        let err = run_err("while (true) {}", limits);
        assert!(matches!(err, Interrupt::Exhausted(_)));
    }

    #[test]
    fn exhaustion_is_not_catchable() {
        let limits = Limits {
            max_steps: Some(10_000),
            ..Limits::default()
        };
        let err = run_err("try { for (;;) {} } catch (e) {}", limits);
        assert!(matches!(err, Interrupt::Exhausted(_)));
    }

    #[test]
    fn call_depth_is_bounded() {
        let err = run_err("function f() { return f(); } f();", Limits::default());
        match err {
            Interrupt::Exhausted(message) => assert!(message.contains("call depth")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn far_array_index_is_a_range_error() {
        let err = run_err("const a = []; a[4000000000] = 1;", Limits::default());
        assert_eq!(err.message(), "Invalid array length");
    }

    #[test]
    fn huge_array_length_is_a_range_error() {
        let err = run_err("const a = []; a.length = 4294967294;", Limits::default());
        assert_eq!(err.message(), "Invalid array length");
    }

    #[test]
    fn doubling_a_string_stops_at_the_length_cap() {
        let err = run_err(
            "let s = 'x'; for (;;) s = s + s;",
            Limits::unbounded(),
        );
        assert_eq!(err.message(), "Invalid string length");
    }

    #[test]
    fn template_literals_respect_the_length_cap() {
        let err = run_err("let s = 'ab'; for (;;) s = `${s}${s}`;", Limits::unbounded());
        assert_eq!(err.message(), "Invalid string length");
    }

    #[test]
    fn cyclic_arrays_convert_to_strings() {
        let value = export("const a = [1, 2]; a.push(a); exports.default = String(a) + '|' + `${a}`;");
        assert_eq!(value.to_js_string(), "1,2,|1,2,");
    }

    #[test]
    fn console_output_is_bounded() {
        let interp = run("for (let i = 0; i < 600; i++) console.log('x'.repeat(20000));");
        assert_eq!(interp.console().len(), MAX_CONSOLE_LINES + 1);
        assert!(interp.console()[0].len() <= MAX_CONSOLE_LINE_BYTES + 3);
        assert_eq!(
            interp.console().last().map(String::as_str),
            Some("[warn] further console output dropped")
        );
    }

    #[test]
    fn optional_chaining_and_nullish() {
        let value = export(
            "const o = { a: null }; exports.default = (o.a?.b ?? 'fallback') + (o.missing?.() ?? '');",
        );
        assert_eq!(value.to_js_string(), "fallback");
    }

    #[test]
    fn typeof_undeclared_is_undefined() {
        let value = export("exports.default = typeof window;");
        assert_eq!(value.to_js_string(), "undefined");
    }

    #[test]
    fn index_keys_must_be_canonical() {
        assert_eq!(index_of("0"), Some(0));
        assert_eq!(index_of("12"), Some(12));
        assert_eq!(index_of("01"), None);
        assert_eq!(index_of("-1"), None);
        assert_eq!(index_of("length"), None);
    }
}
