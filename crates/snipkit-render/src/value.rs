//! Runtime values of the snippet interpreter.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::{Eval, Interpreter, ScopeId};
use crate::ir::{ClassDef, FunctionDef};
use crate::objects;

/// Marker carried by `React.Fragment`.
pub const FRAGMENT_SYMBOL: &str = "react.fragment";

/// Largest string a snippet may build, in bytes.
pub const MAX_STRING_BYTES: usize = 1 << 24;

/// Longest array a snippet may build.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Array nesting followed by string conversion before giving up.
const MAX_JOIN_DEPTH: usize = 32;

/// A value produced while evaluating a snippet.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(&'static str),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<PropertyMap>>),
    Function(Rc<Function>),
    Element(Rc<Element>),
    /// Builtin objects with internal state: promises, maps, sets, dates
    Host(Rc<HostObject>),
}

/// Signature of host-provided functions.
///
/// Receives the interpreter, the `this` receiver and the call arguments.
pub type NativeFn = fn(&mut Interpreter, &Value, &[Value]) -> Eval<Value>;

/// A callable value.
pub enum Function {
    /// A function defined by the snippet, closing over a scope. `name` is
    /// the inferred binding name for anonymous functions.
    Closure {
        def: Rc<FunctionDef>,
        scope: ScopeId,
        name: Option<Rc<str>>,
    },

    /// A host function. `receiver` is pre-bound for methods looked up on
    /// strings, arrays and numbers.
    Native {
        name: &'static str,
        call: NativeFn,
        receiver: Value,
    },

    /// A class; only callable through `new`.
    Class(Class),
}

/// Runtime form of a class declaration or expression.
pub struct Class {
    pub def: Rc<ClassDef>,
    /// Scope the class body closes over; binds the class's own name
    pub scope: ScopeId,
    pub parent: Option<Rc<Function>>,
    /// Inferred binding name for anonymous class expressions
    pub name: Option<Rc<str>>,
    /// Static methods and fields
    pub statics: RefCell<PropertyMap>,
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Self::Closure { def, name, .. } => def
                .name
                .as_deref()
                .or(name.as_deref())
                .unwrap_or("anonymous"),
            Self::Native { name, .. } => name,
            Self::Class(class) => class
                .def
                .name
                .as_deref()
                .or(class.name.as_deref())
                .unwrap_or("anonymous"),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure { .. } => write!(f, "[Function: {}]", self.name()),
            Self::Native { name, .. } => write!(f, "[native {}]", name),
            Self::Class(_) => write!(f, "[class {}]", self.name()),
        }
    }
}

/// State of a promise.
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Reactions wait here until the promise settles
    Pending(Vec<Reaction>),
    Fulfilled(Value),
    Rejected(Value),
}

/// A `then` registration on a pending promise.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub on_fulfilled: Value,
    pub on_rejected: Value,
    /// Promise returned by the `then` call
    pub derived: Value,
}

/// Builtin objects whose state lives outside a [`PropertyMap`].
pub enum HostObject {
    Promise(RefCell<PromiseState>),
    /// Entries in insertion order, keys compared with SameValueZero
    Map(RefCell<Vec<(Value, Value)>>),
    Set(RefCell<Vec<Value>>),
    /// Milliseconds since the epoch, NaN for an invalid date
    Date(Cell<f64>),
}

impl HostObject {
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Promise(_) => "Promise",
            Self::Map(_) => "Map",
            Self::Set(_) => "Set",
            Self::Date(_) => "Date",
        }
    }
}

/// A UI element produced by `React.createElement`.
#[derive(Debug)]
pub struct Element {
    pub kind: ElementKind,
    /// Props including `children`; `key` and `ref` are stripped.
    pub props: PropertyMap,
    pub key: Option<Rc<str>>,
}

#[derive(Debug)]
pub enum ElementKind {
    Host(Rc<str>),
    Fragment,
    Component(Rc<Function>),
}

/// Insertion-ordered property storage for plain objects.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(Rc<str>, Value)>,
    index: HashMap<Rc<str>, usize>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<Rc<str>>, value: Value) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(Rc::clone(&key), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.index.remove(key)?;
        let (_, value) = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Value {
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: PropertyMap) -> Self {
        Self::Object(Rc::new(RefCell::new(map)))
    }

    pub fn host(object: HostObject) -> Self {
        Self::Host(Rc::new(object))
    }

    pub fn native(name: &'static str, call: NativeFn) -> Self {
        Self::Function(Rc::new(Function::Native {
            name,
            call,
            receiver: Value::Undefined,
        }))
    }

    /// A native function with `receiver` bound as `this`.
    pub fn method(name: &'static str, call: NativeFn, receiver: Value) -> Self {
        Self::Function(Rc::new(Function::Native {
            name,
            call,
            receiver,
        }))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Function(_) => "function",
            Self::Array(_) | Self::Object(_) | Self::Element(_) | Self::Host(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Array(items) => {
                let items = items.borrow();
                match items.len() {
                    0 => 0.0,
                    1 => items[0].to_number(),
                    _ => f64::NAN,
                }
            }
            Self::Host(host) => match &**host {
                HostObject::Date(time) => time.get(),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// String conversion as performed by `String(value)` and template literals.
    ///
    /// Arrays are joined with cycles printed as empty strings; output past
    /// [`MAX_STRING_BYTES`] is cut off.
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Symbol(name) => format!("Symbol({name})"),
            Self::Array(items) => {
                let mut out = String::new();
                let mut seen = Vec::new();
                join_into(items, &mut out, &mut seen);
                out
            }
            Self::Object(map) => {
                let map = map.borrow();
                match (map.get("name"), map.get("message")) {
                    (Some(Value::String(name)), Some(message)) => {
                        format!("{}: {}", name, message.to_js_string())
                    }
                    _ => "[object Object]".to_string(),
                }
            }
            Self::Function(func) => match &**func {
                Function::Class(_) => format!("class {} {{ [code] }}", func.name()),
                _ => format!("function {}() {{ [code] }}", func.name()),
            },
            Self::Element(_) => "[object Object]".to_string(),
            Self::Host(host) => match &**host {
                HostObject::Date(time) => objects::date_to_string(time.get()),
                other => format!("[object {}]", other.class_name()),
            },
        }
    }

    /// Property key form of a value (`obj[value]`).
    pub fn to_property_key(&self) -> Rc<str> {
        match self {
            Self::String(s) => Rc::clone(s),
            other => Rc::from(other.to_js_string().as_str()),
        }
    }

    /// Array index if the value is a non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        let n = match self {
            Self::Number(n) => *n,
            Self::String(s) => s.parse::<f64>().ok()?,
            _ => return None,
        };
        if n >= 0.0 && n.fract() == 0.0 && n < (u32::MAX as f64) {
            Some(n as usize)
        } else {
            None
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Host(a), Self::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_), Self::String(_))
            | (Self::String(_), Self::Number(_))
            | (Self::Bool(_), _)
            | (_, Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// `SameValueZero`, used by `includes`, `Map` and `Set`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

/// `Array.prototype.join(",")` over nested arrays.
fn join_into(
    items: &Rc<RefCell<Vec<Value>>>,
    out: &mut String,
    seen: &mut Vec<*const RefCell<Vec<Value>>>,
) {
    let ptr = Rc::as_ptr(items);
    if seen.contains(&ptr) || seen.len() >= MAX_JOIN_DEPTH {
        return;
    }
    seen.push(ptr);
    for (index, item) in items.borrow().iter().enumerate() {
        if out.len() > MAX_STRING_BYTES {
            break;
        }
        if index > 0 {
            out.push(',');
        }
        match item {
            Value::Undefined | Value::Null => {}
            Value::Array(inner) => join_into(inner, out, seen),
            other => out.push_str(&other.to_js_string()),
        }
    }
    seen.pop();
    if out.len() > MAX_STRING_BYTES {
        let mut end = MAX_STRING_BYTES;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Self::Object(map) => {
                let map = map.borrow();
                f.debug_map().entries(map.iter()).finish()
            }
            Self::Function(func) => write!(f, "{:?}", func),
            Self::Element(el) => write!(f, "<{:?}>", el.kind),
            Self::Host(host) => write!(f, "[{}]", host.class_name()),
            other => f.write_str(&other.to_js_string()),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf" and "nan", JavaScript does not
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse().unwrap_or(f64::NAN),
    }
}

/// Format a number the way JavaScript prints it.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{:.0}", n);
    }
    let abs = n.abs();
    if !(1e-7..1e21).contains(&abs) {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    format!("{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_like_javascript() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(1e21), "1e+21");
    }

    #[test]
    fn coerces_strings_to_numbers() {
        assert_eq!(Value::string(" 42 ").to_number(), 42.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert!(Value::string("abc").to_number().is_nan());
        assert!(Value::string("inf").to_number().is_nan());
        assert_eq!(Value::string("0x10").to_number(), 16.0);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::string("").truthy());
        assert!(Value::string("0").truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::array(vec![]).truthy());
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
    }

    #[test]
    fn property_map_keeps_insertion_order() {
        let mut map = PropertyMap::new();
        map.set("b", Value::Number(1.0));
        map.set("a", Value::Number(2.0));
        map.set("b", Value::Number(3.0));

        let keys: Vec<&str> = map.keys().map(|k| &**k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map.get("b").map(Value::to_number), Some(3.0));
    }

    #[test]
    fn property_map_remove_keeps_lookups_in_sync() {
        let mut map = PropertyMap::new();
        map.set("a", Value::Number(1.0));
        map.set("b", Value::Number(2.0));
        map.set("c", Value::Number(3.0));

        assert_eq!(map.remove("a").map(|v| v.to_number()), Some(1.0));
        assert_eq!(map.get("c").map(Value::to_number), Some(3.0));
        assert!(!map.contains("a"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn cyclic_arrays_join_without_recursing_forever() {
        let items = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(inner) = &items {
            inner.borrow_mut().push(items.clone());
        }
        assert_eq!(items.to_js_string(), "1,");
        if let Value::Array(inner) = &items {
            inner.borrow_mut().clear();
        }
    }
}
