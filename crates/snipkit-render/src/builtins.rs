//! The small pure standard library visible to snippets.
//!
//! Globals: `Math`, `JSON`, `Object`, `Array`, `String`, `Number`,
//! `Boolean`, `parseInt`, `parseFloat`, `isNaN`, `isFinite`, `console` and
//! the error constructors. `Promise`, `Map`, `Set` and `Date` live in
//! `objects`. Nothing here reaches the network, the file system or timers.
//!
//! Natives that build arrays or strings check the interpreter's length caps
//! before allocating, and charge fuel in proportion to the work.

use std::cell::RefCell;
use std::rc::Rc;

use crate::interpreter::{error_object, to_int32, Eval, Interpreter, Interrupt};
use crate::objects;
use crate::value::{
    number_to_string, Function, HostObject, NativeFn, PromiseState, PropertyMap, Value,
    MAX_ARRAY_LENGTH, MAX_STRING_BYTES,
};

/// Nesting limit for `JSON.stringify` and console formatting.
const MAX_FORMAT_DEPTH: usize = 32;

/// Console formatting stops after this many bytes.
const MAX_INSPECT_BYTES: usize = 8 * 1024;

/// Items shown per array, object, map or set in console output.
const MAX_INSPECT_ITEMS: usize = 100;

pub(crate) fn install(interp: &mut Interpreter) {
    interp.define_global("undefined", Value::Undefined);
    interp.define_global("NaN", Value::Number(f64::NAN));
    interp.define_global("Infinity", Value::Number(f64::INFINITY));

    interp.define_global("Math", math());
    interp.define_global("JSON", json());
    interp.define_global("console", console());

    interp.define_global("Object", Value::native("Object", object_ctor));
    interp.define_global("Array", Value::native("Array", array_ctor));
    interp.define_global("String", Value::native("String", string_ctor));
    interp.define_global("Number", Value::native("Number", number_ctor));
    interp.define_global("Boolean", Value::native("Boolean", boolean_ctor));

    interp.define_global("parseInt", Value::native("parseInt", parse_int));
    interp.define_global("parseFloat", Value::native("parseFloat", parse_float));
    interp.define_global("isNaN", Value::native("isNaN", is_nan));
    interp.define_global("isFinite", Value::native("isFinite", is_finite));

    interp.define_global("Error", Value::native("Error", error_ctor));
    interp.define_global("TypeError", Value::native("TypeError", type_error_ctor));
    interp.define_global("RangeError", Value::native("RangeError", range_error_ctor));
    interp.define_global("SyntaxError", Value::native("SyntaxError", syntax_error_ctor));
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn object_of(entries: &[(&'static str, Value)]) -> Value {
    let mut map = PropertyMap::new();
    for (key, value) in entries {
        map.set(*key, value.clone());
    }
    Value::object(map)
}

fn this_array(this: &Value) -> Eval<Rc<RefCell<Vec<Value>>>> {
    match this {
        Value::Array(items) => Ok(Rc::clone(items)),
        other => Err(Interrupt::type_error(format!(
            "{} is not an array",
            other.to_js_string()
        ))),
    }
}

fn this_string(this: &Value) -> Rc<str> {
    match this {
        Value::String(s) => Rc::clone(s),
        other => Rc::from(other.to_js_string().as_str()),
    }
}

fn callback(args: &[Value], method: &str) -> Eval<Value> {
    let f = arg(args, 0);
    if f.is_callable() {
        Ok(f)
    } else {
        Err(Interrupt::type_error(format!(
            "{} is not a function (in Array.prototype.{method})",
            f.to_js_string()
        )))
    }
}

/// Resolve a relative index argument (`slice`, `at`, ...) against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n.trunc()).max(0.0) as usize
    } else {
        n.trunc().min(len as f64) as usize
    }
}

// Math

fn math() -> Value {
    object_of(&[
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("abs", Value::native("abs", |_, _, a| unary_math(a, f64::abs))),
        ("floor", Value::native("floor", |_, _, a| unary_math(a, f64::floor))),
        ("ceil", Value::native("ceil", |_, _, a| unary_math(a, f64::ceil))),
        ("round", Value::native("round", |_, _, a| unary_math(a, |n| (n + 0.5).floor()))),
        ("trunc", Value::native("trunc", |_, _, a| unary_math(a, f64::trunc))),
        ("sign", Value::native("sign", |_, _, a| unary_math(a, sign))),
        ("sqrt", Value::native("sqrt", |_, _, a| unary_math(a, f64::sqrt))),
        ("log", Value::native("log", |_, _, a| unary_math(a, f64::ln))),
        ("log10", Value::native("log10", |_, _, a| unary_math(a, f64::log10))),
        ("exp", Value::native("exp", |_, _, a| unary_math(a, f64::exp))),
        ("sin", Value::native("sin", |_, _, a| unary_math(a, f64::sin))),
        ("cos", Value::native("cos", |_, _, a| unary_math(a, f64::cos))),
        ("tan", Value::native("tan", |_, _, a| unary_math(a, f64::tan))),
        ("pow", Value::native("pow", math_pow)),
        ("atan2", Value::native("atan2", math_atan2)),
        ("min", Value::native("min", math_min)),
        ("max", Value::native("max", math_max)),
        ("random", Value::native("random", math_random)),
    ])
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

fn unary_math(args: &[Value], f: fn(f64) -> f64) -> Eval<Value> {
    Ok(Value::Number(f(arg(args, 0).to_number())))
}

fn math_pow(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Number(
        arg(args, 0).to_number().powf(arg(args, 1).to_number()),
    ))
}

fn math_atan2(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Number(
        arg(args, 0).to_number().atan2(arg(args, 1).to_number()),
    ))
}

fn math_min(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let mut result = f64::INFINITY;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(Value::Number(result))
}

fn math_max(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(Value::Number(result))
}

fn math_random(interp: &mut Interpreter, _: &Value, _: &[Value]) -> Eval<Value> {
    Ok(Value::Number(interp.next_random()))
}

// JSON

fn json() -> Value {
    object_of(&[
        ("stringify", Value::native("stringify", json_stringify)),
        ("parse", Value::native("parse", json_parse)),
    ])
}

fn json_stringify(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let indent = match arg(args, 2) {
        Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    Ok(match stringify(&arg(args, 0), &indent, 0)? {
        Some(text) => Value::string(&text),
        None => Value::Undefined,
    })
}

/// `JSON.stringify` for one value; `None` when the value is skipped.
pub(crate) fn stringify(value: &Value, indent: &str, depth: usize) -> Eval<Option<String>> {
    if depth > MAX_FORMAT_DEPTH {
        return Err(Interrupt::type_error("Converting circular structure to JSON"));
    }
    let (open, sep, close) = if indent.is_empty() {
        (String::new(), ",".to_string(), String::new())
    } else {
        let inner = indent.repeat(depth + 1);
        (
            format!("\n{inner}"),
            format!(",\n{inner}"),
            format!("\n{}", indent.repeat(depth)),
        )
    };
    Ok(Some(match value {
        Value::Undefined | Value::Function(_) | Value::Symbol(_) => return Ok(None),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if n.is_finite() => number_to_string(*n),
        Value::Number(_) => "null".to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items = items.borrow().clone();
            if items.is_empty() {
                return Ok(Some("[]".to_string()));
            }
            let mut parts = Vec::with_capacity(items.len());
            let mut total = 0usize;
            for item in &items {
                let part = stringify(item, indent, depth + 1)?.unwrap_or_else(|| "null".to_string());
                total = fits(total, part.len() + sep.len())?;
                parts.push(part);
            }
            format!("[{open}{}{close}]", parts.join(&sep))
        }
        Value::Object(map) => {
            let entries: Vec<(Rc<str>, Value)> = map
                .borrow()
                .iter()
                .map(|(k, v)| (Rc::clone(k), v.clone()))
                .collect();
            let colon = if indent.is_empty() { ":" } else { ": " };
            let mut parts = Vec::new();
            let mut total = 0usize;
            for (key, item) in &entries {
                if let Some(text) = stringify(item, indent, depth + 1)? {
                    let part = format!("{}{colon}{text}", quote(key));
                    total = fits(total, part.len() + sep.len())?;
                    parts.push(part);
                }
            }
            if parts.is_empty() {
                return Ok(Some("{}".to_string()));
            }
            format!("{{{open}{}{close}}}", parts.join(&sep))
        }
        Value::Element(_) => "{}".to_string(),
        Value::Host(host) => match &**host {
            HostObject::Date(time) => match objects::date_to_iso(time.get()) {
                Some(iso) => quote(&iso),
                None => "null".to_string(),
            },
            _ => "{}".to_string(),
        },
    }))
}

/// Length of output under construction, failing past the string cap.
fn fits(total: usize, added: usize) -> Eval<usize> {
    let total = total.saturating_add(added);
    if total > MAX_STRING_BYTES {
        return Err(Interrupt::range_error("Invalid string length"));
    }
    Ok(total)
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

fn json_parse(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let text = arg(args, 0).to_js_string();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(from_json(&json)),
        Err(err) => Err(Interrupt::error(
            "SyntaxError",
            format!("JSON.parse: {err}"),
        )),
    }
}

/// Convert host JSON into an interpreter value.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(entries) => {
            let mut map = PropertyMap::new();
            for (key, value) in entries {
                map.set(key.as_str(), from_json(value));
            }
            Value::object(map)
        }
    }
}

// console

fn console() -> Value {
    object_of(&[
        ("log", Value::native("log", |i, _, a| console_write(i, "log", a))),
        ("info", Value::native("info", |i, _, a| console_write(i, "info", a))),
        ("debug", Value::native("debug", |i, _, a| console_write(i, "debug", a))),
        ("warn", Value::native("warn", |i, _, a| console_write(i, "warn", a))),
        ("error", Value::native("error", |i, _, a| console_write(i, "error", a))),
    ])
}

fn console_write(interp: &mut Interpreter, level: &str, args: &[Value]) -> Eval<Value> {
    let mut line = String::new();
    for (index, value) in args.iter().enumerate() {
        if index > 0 {
            push_capped(&mut line, " ");
        }
        inspect_into(&mut line, value, 0);
    }
    interp.log(format!("[{level}] {line}"));
    Ok(Value::Undefined)
}

/// Developer-facing rendering of a value, as console output shows it.
pub(crate) fn inspect(value: &Value, depth: usize) -> String {
    let mut out = String::new();
    inspect_into(&mut out, value, depth);
    out
}

fn push_capped(out: &mut String, text: &str) {
    let room = MAX_INSPECT_BYTES.saturating_sub(out.len());
    if text.len() <= room {
        out.push_str(text);
        return;
    }
    let mut end = room;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    out.push_str(&text[..end]);
}

fn inspect_into(out: &mut String, value: &Value, depth: usize) {
    if out.len() >= MAX_INSPECT_BYTES {
        return;
    }
    if depth > 4 {
        push_capped(out, "...");
        return;
    }
    match value {
        Value::String(s) if depth > 0 => {
            let end = s.len().min(MAX_INSPECT_BYTES);
            let end = (0..=end).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
            push_capped(out, &quote(&s[..end]));
        }
        Value::String(s) => push_capped(out, s),
        Value::Array(items) => {
            let items = items.borrow().clone();
            push_capped(out, "[");
            inspect_items(out, &items, |out, item| inspect_into(out, item, depth + 1));
            push_capped(out, "]");
        }
        Value::Object(map) => {
            let entries: Vec<(Rc<str>, Value)> = map
                .borrow()
                .iter()
                .map(|(k, v)| (Rc::clone(k), v.clone()))
                .collect();
            if entries.is_empty() {
                push_capped(out, "{}");
                return;
            }
            push_capped(out, "{ ");
            inspect_items(out, &entries, |out, (key, item)| {
                push_capped(out, key);
                push_capped(out, ": ");
                inspect_into(out, item, depth + 1);
            });
            push_capped(out, " }");
        }
        Value::Function(func) => push_capped(out, &format!("[Function: {}]", func.name())),
        Value::Element(_) => push_capped(out, "[React element]"),
        Value::Host(host) => match &**host {
            HostObject::Map(entries) => {
                let entries = entries.borrow().clone();
                push_capped(out, &format!("Map({}) {{", entries.len()));
                inspect_items(out, &entries, |out, (key, item)| {
                    inspect_into(out, key, depth + 1);
                    push_capped(out, " => ");
                    inspect_into(out, item, depth + 1);
                });
                push_capped(out, "}");
            }
            HostObject::Set(items) => {
                let items = items.borrow().clone();
                push_capped(out, &format!("Set({}) {{", items.len()));
                inspect_items(out, &items, |out, item| inspect_into(out, item, depth + 1));
                push_capped(out, "}");
            }
            HostObject::Date(time) => push_capped(
                out,
                &objects::date_to_iso(time.get()).unwrap_or_else(|| "Invalid Date".to_string()),
            ),
            HostObject::Promise(state) => {
                let state = state.borrow().clone();
                match state {
                    PromiseState::Pending(_) => push_capped(out, "Promise { <pending> }"),
                    PromiseState::Fulfilled(value) => {
                        push_capped(out, "Promise { ");
                        inspect_into(out, &value, depth + 1);
                        push_capped(out, " }");
                    }
                    PromiseState::Rejected(reason) => {
                        push_capped(out, "Promise { <rejected> ");
                        inspect_into(out, &reason, depth + 1);
                        push_capped(out, " }");
                    }
                }
            }
        },
        other => push_capped(out, &other.to_js_string()),
    }
}

/// Comma-separated items, cut off after [`MAX_INSPECT_ITEMS`].
fn inspect_items<T>(out: &mut String, items: &[T], mut write: impl FnMut(&mut String, &T)) {
    for (index, item) in items.iter().take(MAX_INSPECT_ITEMS).enumerate() {
        if out.len() >= MAX_INSPECT_BYTES {
            return;
        }
        if index > 0 {
            push_capped(out, ", ");
        }
        write(out, item);
    }
    if items.len() > MAX_INSPECT_ITEMS {
        push_capped(out, &format!(", ... {} more items", items.len() - MAX_INSPECT_ITEMS));
    }
}

// Global functions

fn parse_int(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let text = arg(args, 0).to_js_string();
    let mut text = text.trim_start();
    let negative = text.starts_with('-');
    if negative || text.starts_with('+') {
        text = &text[1..];
    }
    let mut radix = match arg(args, 1) {
        Value::Undefined => 10,
        other => to_int32(other.to_number()) as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if radix == 16 || (radix == 10 && matches!(arg(args, 1), Value::Undefined)) {
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            text = hex;
            radix = 16;
        }
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: String = text.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let mut result = 0.0;
    for c in digits.chars() {
        result = result * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
    }
    Ok(Value::Number(if negative { -result } else { result }))
}

fn parse_float(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let text = arg(args, 0).to_js_string();
    let text = text.trim_start();
    if text.starts_with("Infinity") || text.starts_with("+Infinity") {
        return Ok(Value::Number(f64::INFINITY));
    }
    if text.starts_with("-Infinity") {
        return Ok(Value::Number(f64::NEG_INFINITY));
    }
    // Longest prefix that parses as a float.
    let candidate: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .collect();
    let value = (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN);
    Ok(Value::Number(value))
}

fn is_nan(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
}

fn is_finite(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
}

fn error_with(name: &str, args: &[Value]) -> Eval<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        other => other.to_js_string(),
    };
    Ok(error_object(name, &message))
}

fn error_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    error_with("Error", args)
}

fn type_error_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    error_with("TypeError", args)
}

fn range_error_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    error_with("RangeError", args)
}

fn syntax_error_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    error_with("SyntaxError", args)
}

// Constructors and their static members

fn object_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(match arg(args, 0) {
        value @ (Value::Object(_) | Value::Array(_)) => value,
        _ => Value::object(PropertyMap::new()),
    })
}

fn array_ctor(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    match args {
        [Value::Number(n)] => {
            let len = Value::Number(*n)
                .as_index()
                .ok_or_else(|| Interrupt::range_error("Invalid array length"))?;
            interp.grow_array(len, len)?;
            Ok(Value::array(vec![Value::Undefined; len]))
        }
        _ => Ok(Value::array(args.to_vec())),
    }
}

fn string_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(match args.first() {
        Some(value) => Value::string(&value.to_js_string()),
        None => Value::string(""),
    })
}

fn number_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn boolean_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(arg(args, 0).truthy()))
}

/// Static members of builtin constructors, such as `Object.keys`.
pub(crate) fn static_member(func: &Function, key: &str) -> Option<Value> {
    let Function::Native { name, .. } = func else {
        return None;
    };
    let (name, call): (&'static str, NativeFn) = match (*name, key) {
        ("Object", "keys") => ("keys", object_keys),
        ("Object", "values") => ("values", object_values),
        ("Object", "entries") => ("entries", object_entries),
        ("Object", "assign") => ("assign", object_assign),
        ("Object", "fromEntries") => ("fromEntries", object_from_entries),
        ("Object", "freeze") => ("freeze", identity),
        ("Array", "isArray") => ("isArray", array_is_array),
        ("Array", "from") => ("from", array_from),
        ("Array", "of") => ("of", array_of),
        ("String", "fromCharCode") => ("fromCharCode", string_from_char_code),
        ("Number", "isInteger") => ("isInteger", number_is_integer),
        ("Number", "isFinite") => ("isFinite", number_is_finite),
        ("Number", "isNaN") => ("isNaN", number_is_nan),
        ("Number", "parseInt") => ("parseInt", parse_int),
        ("Number", "parseFloat") => ("parseFloat", parse_float),
        ("Number", "MAX_SAFE_INTEGER") => return Some(Value::Number(9_007_199_254_740_991.0)),
        ("Number", "MIN_SAFE_INTEGER") => return Some(Value::Number(-9_007_199_254_740_991.0)),
        ("Number", "EPSILON") => return Some(Value::Number(f64::EPSILON)),
        (ctor, key) => return objects::static_member(ctor, key),
    };
    Some(Value::native(name, call))
}

fn identity(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(arg(args, 0))
}

fn object_keys(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let source = arg(args, 0);
    if source.is_nullish() {
        return Err(Interrupt::type_error("Cannot convert undefined or null to object"));
    }
    Ok(Value::array(
        interp.enumerable_keys(&source)?.into_iter().map(Value::String).collect(),
    ))
}

fn object_values(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let source = arg(args, 0);
    let mut values = Vec::new();
    for key in interp.enumerable_keys(&source)? {
        values.push(interp.get_property(&source, &key)?);
    }
    Ok(Value::array(values))
}

fn object_entries(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let source = arg(args, 0);
    let mut entries = Vec::new();
    for key in interp.enumerable_keys(&source)? {
        let value = interp.get_property(&source, &key)?;
        entries.push(Value::array(vec![Value::String(key), value]));
    }
    Ok(Value::array(entries))
}

fn object_assign(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let target = arg(args, 0);
    let Value::Object(map) = &target else {
        return Err(Interrupt::type_error("Object.assign target must be an object"));
    };
    for source in args.iter().skip(1) {
        for key in interp.enumerable_keys(source)? {
            let value = interp.get_property(source, &key)?;
            map.borrow_mut().set(key, value);
        }
    }
    Ok(target)
}

fn object_from_entries(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let mut map = PropertyMap::new();
    for entry in interp.iterate(&arg(args, 0))? {
        let key = interp.get_property(&entry, "0")?.to_property_key();
        let value = interp.get_property(&entry, "1")?;
        map.set(key, value);
    }
    Ok(Value::object(map))
}

fn array_is_array(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
}

fn array_from(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let source = arg(args, 0);
    let items = match &source {
        Value::Object(map) => {
            let len = map
                .borrow()
                .get("length")
                .and_then(Value::as_index)
                .unwrap_or(0);
            interp.grow_array(len, 0)?;
            let mut items = Vec::with_capacity(len);
            for index in 0..len {
                interp.charge(1)?;
                items.push(interp.get_property(&source, &index.to_string())?);
            }
            items
        }
        other => interp.iterate(other)?,
    };
    let mapper = arg(args, 1);
    if !mapper.is_callable() {
        return Ok(Value::array(items));
    }
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        mapped.push(interp.call(&mapper, Value::Undefined, &[item, Value::Number(index as f64)])?);
    }
    Ok(Value::array(mapped))
}

fn array_of(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::array(args.to_vec()))
}

fn string_from_char_code(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let units: Vec<u16> = args
        .iter()
        .map(|v| to_int32(v.to_number()) as u16)
        .collect();
    Ok(Value::string(&String::from_utf16_lossy(&units)))
}

fn number_is_integer(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(
        matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0),
    ))
}

fn number_is_finite(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
}

fn number_is_nan(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
}

// Array methods

pub(crate) fn array_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "push" => ("push", array_push),
        "pop" => ("pop", array_pop),
        "shift" => ("shift", array_shift),
        "unshift" => ("unshift", array_unshift),
        "slice" => ("slice", array_slice),
        "splice" => ("splice", array_splice),
        "concat" => ("concat", array_concat),
        "join" => ("join", array_join),
        "reverse" => ("reverse", array_reverse),
        "indexOf" => ("indexOf", array_index_of),
        "lastIndexOf" => ("lastIndexOf", array_last_index_of),
        "includes" => ("includes", array_includes),
        "at" => ("at", array_at),
        "fill" => ("fill", array_fill),
        "flat" => ("flat", array_flat),
        "map" => ("map", array_map),
        "flatMap" => ("flatMap", array_flat_map),
        "filter" => ("filter", array_filter),
        "forEach" => ("forEach", array_for_each),
        "find" => ("find", array_find),
        "findIndex" => ("findIndex", array_find_index),
        "some" => ("some", array_some),
        "every" => ("every", array_every),
        "reduce" => ("reduce", array_reduce),
        "sort" => ("sort", array_sort),
        "toString" => ("toString", to_string_method),
        _ => return None,
    };
    Some(entry)
}

fn array_push(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let len = items.borrow().len();
    interp.grow_array(len.saturating_add(args.len()), args.len())?;
    let mut items = items.borrow_mut();
    items.extend_from_slice(args);
    Ok(Value::Number(items.len() as f64))
}

fn array_pop(_: &mut Interpreter, this: &Value, _: &[Value]) -> Eval<Value> {
    Ok(this_array(this)?.borrow_mut().pop().unwrap_or_default())
}

fn array_shift(_: &mut Interpreter, this: &Value, _: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let mut items = items.borrow_mut();
    if items.is_empty() {
        Ok(Value::Undefined)
    } else {
        Ok(items.remove(0))
    }
}

fn array_unshift(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let len = items.borrow().len();
    interp.grow_array(len.saturating_add(args.len()), len)?;
    let mut items = items.borrow_mut();
    items.splice(0..0, args.iter().cloned());
    Ok(Value::Number(items.len() as f64))
}

fn array_slice(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let items = items.borrow();
    let start = relative_index(&arg(args, 0), items.len(), 0);
    let end = relative_index(&arg(args, 1), items.len(), items.len());
    Ok(Value::array(
        items.get(start..end.max(start)).unwrap_or_default().to_vec(),
    ))
}

fn array_splice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let len = items.borrow().len();
    let inserted = args.len().saturating_sub(2);
    interp.grow_array(len.saturating_add(inserted), len)?;
    let mut items = items.borrow_mut();
    let start = relative_index(&arg(args, 0), len, 0);
    let count = match args.get(1) {
        None => len - start,
        Some(n) => (n.to_number().max(0.0) as usize).min(len - start),
    };
    let removed: Vec<Value> = items
        .splice(start..start + count, args.iter().skip(2).cloned())
        .collect();
    Ok(Value::array(removed))
}

fn array_concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let base = this_array(this)?;
    let total = args.iter().fold(base.borrow().len(), |total, value| {
        total.saturating_add(match value {
            Value::Array(items) => items.borrow().len(),
            _ => 1,
        })
    });
    interp.grow_array(total, total)?;
    let mut out = base.borrow().clone();
    for value in args {
        match value {
            Value::Array(items) => out.extend(items.borrow().iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::array(out))
}

fn array_join(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => other.to_js_string(),
    };
    let items = this_array(this)?.borrow().clone();
    let mut joined = String::new();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            fits(joined.len(), separator.len())?;
            joined.push_str(&separator);
        }
        if !item.is_nullish() {
            let text = item.to_js_string();
            fits(joined.len(), text.len())?;
            joined.push_str(&text);
        }
    }
    interp.check_string(joined.len())?;
    Ok(Value::string(&joined))
}

fn array_reverse(_: &mut Interpreter, this: &Value, _: &[Value]) -> Eval<Value> {
    this_array(this)?.borrow_mut().reverse();
    Ok(this.clone())
}

fn array_index_of(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let needle = arg(args, 0);
    let position = this_array(this)?
        .borrow()
        .iter()
        .position(|v| v.strict_equals(&needle));
    Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
}

fn array_last_index_of(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let needle = arg(args, 0);
    let position = this_array(this)?
        .borrow()
        .iter()
        .rposition(|v| v.strict_equals(&needle));
    Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
}

fn array_includes(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let needle = arg(args, 0);
    let found = this_array(this)?
        .borrow()
        .iter()
        .any(|v| v.same_value_zero(&needle));
    Ok(Value::Bool(found))
}

fn array_at(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let items = items.borrow();
    let n = arg(args, 0).to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let index = if n < 0.0 { items.len() as f64 + n } else { n };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(items.get(index as usize).cloned().unwrap_or_default())
}

fn array_fill(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let mut items = items.borrow_mut();
    let len = items.len();
    let start = relative_index(&arg(args, 1), len, 0);
    let end = relative_index(&arg(args, 2), len, len);
    for slot in items.iter_mut().take(end).skip(start) {
        *slot = arg(args, 0);
    }
    Ok(this.clone())
}

fn flatten_into(interp: &mut Interpreter, out: &mut Vec<Value>, items: &[Value], depth: usize) -> Eval<()> {
    interp.charge(items.len() / 16)?;
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => {
                let inner = inner.borrow().clone();
                flatten_into(interp, out, &inner, depth - 1)?;
            }
            other => {
                if out.len() >= MAX_ARRAY_LENGTH {
                    return Err(Interrupt::range_error("Invalid array length"));
                }
                out.push(other.clone());
            }
        }
    }
    Ok(())
}

fn array_flat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let depth = match arg(args, 0) {
        Value::Undefined => 1,
        other => other.to_number().clamp(0.0, MAX_FORMAT_DEPTH as f64) as usize,
    };
    let items = this_array(this)?.borrow().clone();
    let mut out = Vec::new();
    flatten_into(interp, &mut out, &items, depth)?;
    Ok(Value::array(out))
}

/// Run `f(item, index, array)` for every item, stopping when `visit`
/// returns `false`.
fn each(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    method: &str,
    mut visit: impl FnMut(usize, Value, Value) -> bool,
) -> Eval<()> {
    let f = callback(args, method)?;
    let items = this_array(this)?.borrow().clone();
    for (index, item) in items.into_iter().enumerate() {
        let result = interp.call(
            &f,
            Value::Undefined,
            &[item.clone(), Value::Number(index as f64), this.clone()],
        )?;
        if !visit(index, item, result) {
            break;
        }
    }
    Ok(())
}

fn array_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut out = Vec::new();
    each(interp, this, args, "map", |_, _, result| {
        out.push(result);
        true
    })?;
    Ok(Value::array(out))
}

fn array_flat_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut results = Vec::new();
    each(interp, this, args, "flatMap", |_, _, result| {
        results.push(result);
        true
    })?;
    let mut out = Vec::new();
    flatten_into(interp, &mut out, &results, 1)?;
    Ok(Value::array(out))
}

fn array_filter(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut out = Vec::new();
    each(interp, this, args, "filter", |_, item, result| {
        if result.truthy() {
            out.push(item);
        }
        true
    })?;
    Ok(Value::array(out))
}

fn array_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    each(interp, this, args, "forEach", |_, _, _| true)?;
    Ok(Value::Undefined)
}

fn array_find(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut found = Value::Undefined;
    each(interp, this, args, "find", |_, item, result| {
        if result.truthy() {
            found = item;
            return false;
        }
        true
    })?;
    Ok(found)
}

fn array_find_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut found = -1.0;
    each(interp, this, args, "findIndex", |index, _, result| {
        if result.truthy() {
            found = index as f64;
            return false;
        }
        true
    })?;
    Ok(Value::Number(found))
}

fn array_some(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut any = false;
    each(interp, this, args, "some", |_, _, result| {
        any = result.truthy();
        !any
    })?;
    Ok(Value::Bool(any))
}

fn array_every(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let mut all = true;
    each(interp, this, args, "every", |_, _, result| {
        all = result.truthy();
        all
    })?;
    Ok(Value::Bool(all))
}

fn array_reduce(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let f = callback(args, "reduce")?;
    let items = this_array(this)?.borrow().clone();
    let mut iter = items.into_iter().enumerate();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match iter.next() {
            Some((_, first)) => first,
            None => {
                return Err(Interrupt::type_error(
                    "Reduce of empty array with no initial value",
                ))
            }
        },
    };
    for (index, item) in iter {
        acc = interp.call(
            &f,
            Value::Undefined,
            &[acc, item, Value::Number(index as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn array_sort(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_array(this)?;
    let snapshot = items.borrow().clone();
    let sorted = merge_sort(interp, snapshot, &arg(args, 0))?;
    *items.borrow_mut() = sorted;
    Ok(this.clone())
}

/// Stable sort with a comparator that may throw.
fn merge_sort(interp: &mut Interpreter, mut items: Vec<Value>, compare: &Value) -> Eval<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, compare)?;
    let right = merge_sort(interp, right, compare)?;

    interp.charge((left.len() + right.len()) / 16)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        let take_right = if compare.is_callable() {
            interp
                .call(compare, Value::Undefined, &[a.clone(), b.clone()])?
                .to_number()
                > 0.0
        } else {
            default_order(a, b) == std::cmp::Ordering::Greater
        };
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

/// Default sort order: by string form, `undefined` last.
fn default_order(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => std::cmp::Ordering::Equal,
        (Value::Undefined, _) => std::cmp::Ordering::Greater,
        (_, Value::Undefined) => std::cmp::Ordering::Less,
        _ => a.to_js_string().cmp(&b.to_js_string()),
    }
}

pub(crate) fn to_string_method(_: &mut Interpreter, this: &Value, _: &[Value]) -> Eval<Value> {
    Ok(Value::string(&this.to_js_string()))
}

// String methods

pub(crate) fn string_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "toUpperCase" => ("toUpperCase", |_, this, _| {
            Ok(Value::string(&this_string(this).to_uppercase()))
        }),
        "toLowerCase" => ("toLowerCase", |_, this, _| {
            Ok(Value::string(&this_string(this).to_lowercase()))
        }),
        "trim" => ("trim", |_, this, _| Ok(Value::string(this_string(this).trim()))),
        "trimStart" => ("trimStart", |_, this, _| {
            Ok(Value::string(this_string(this).trim_start()))
        }),
        "trimEnd" => ("trimEnd", |_, this, _| {
            Ok(Value::string(this_string(this).trim_end()))
        }),
        "split" => ("split", string_split),
        "slice" => ("slice", string_slice),
        "substring" => ("substring", string_substring),
        "indexOf" => ("indexOf", string_index_of),
        "includes" => ("includes", |_, this, args| {
            Ok(Value::Bool(
                this_string(this).contains(arg(args, 0).to_js_string().as_str()),
            ))
        }),
        "startsWith" => ("startsWith", |_, this, args| {
            Ok(Value::Bool(
                this_string(this).starts_with(arg(args, 0).to_js_string().as_str()),
            ))
        }),
        "endsWith" => ("endsWith", |_, this, args| {
            Ok(Value::Bool(
                this_string(this).ends_with(arg(args, 0).to_js_string().as_str()),
            ))
        }),
        "replace" => ("replace", |i, this, args| string_replace(i, this, args, 1)),
        "replaceAll" => ("replaceAll", |i, this, args| {
            string_replace(i, this, args, usize::MAX)
        }),
        "repeat" => ("repeat", string_repeat),
        "padStart" => ("padStart", |i, this, args| string_pad(i, this, args, true)),
        "padEnd" => ("padEnd", |i, this, args| string_pad(i, this, args, false)),
        "charAt" => ("charAt", |_, this, args| {
            let index = arg(args, 0).to_number();
            let c = if index >= 0.0 {
                this_string(this).chars().nth(index as usize)
            } else {
                None
            };
            Ok(Value::string(&c.map(String::from).unwrap_or_default()))
        }),
        "charCodeAt" => ("charCodeAt", |_, this, args| {
            let index = arg(args, 0).to_number();
            let unit = if index >= 0.0 {
                this_string(this).encode_utf16().nth(index as usize)
            } else {
                None
            };
            Ok(Value::Number(unit.map_or(f64::NAN, f64::from)))
        }),
        "concat" => ("concat", |interp, this, args| {
            let mut out = this_string(this).to_string();
            for value in args {
                let text = value.to_js_string();
                fits(out.len(), text.len())?;
                out.push_str(&text);
            }
            interp.check_string(out.len())?;
            Ok(Value::string(&out))
        }),
        "localeCompare" => ("localeCompare", |_, this, args| {
            let this = this_string(this);
            let other = arg(args, 0).to_js_string();
            let ordering = (*this).cmp(other.as_str());
            Ok(Value::Number(f64::from(ordering as i8)))
        }),
        "toString" => ("toString", to_string_method),
        _ => return None,
    };
    Some(entry)
}

fn string_split(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let s = this_string(this);
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => other.to_number().max(0.0) as usize,
    };
    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::String(s)],
        separator => {
            let separator = separator.to_js_string();
            if separator.is_empty() {
                let count = s.chars().count().min(limit);
                interp.grow_array(count, count)?;
                s.chars()
                    .take(limit)
                    .map(|c| Value::string(c.encode_utf8(&mut [0; 4])))
                    .collect()
            } else {
                let count = s.matches(separator.as_str()).count().saturating_add(1).min(limit);
                interp.grow_array(count, count)?;
                s.split(separator.as_str()).take(limit).map(Value::string).collect()
            }
        }
    };
    Ok(Value::array(parts.into_iter().take(limit).collect()))
}

fn char_range(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn string_slice(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let s = this_string(this);
    let len = s.chars().count();
    let start = relative_index(&arg(args, 0), len, 0);
    let end = relative_index(&arg(args, 1), len, len);
    Ok(Value::string(&char_range(&s, start, end)))
}

fn string_substring(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let s = this_string(this);
    let len = s.chars().count();
    let clamp = |value: Value, default: usize| match value {
        Value::Undefined => default,
        other => {
            let n = other.to_number();
            if n.is_nan() {
                0
            } else {
                n.clamp(0.0, len as f64) as usize
            }
        }
    };
    let a = clamp(arg(args, 0), 0);
    let b = clamp(arg(args, 1), len);
    Ok(Value::string(&char_range(&s, a.min(b), a.max(b))))
}

fn string_index_of(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let s = this_string(this);
    let needle = arg(args, 0).to_js_string();
    let index = s
        .find(needle.as_str())
        .map(|byte| s[..byte].chars().count() as f64);
    Ok(Value::Number(index.unwrap_or(-1.0)))
}

fn string_replace(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    limit: usize,
) -> Eval<Value> {
    let s = this_string(this);
    let pattern = arg(args, 0).to_js_string();
    let replacement = arg(args, 1);
    let mut out = String::new();
    let mut rest: &str = &s;
    let mut count = 0;
    while count < limit {
        let Some(index) = rest.find(pattern.as_str()) else {
            break;
        };
        out.push_str(&rest[..index]);
        let text = if replacement.is_callable() {
            interp
                .call(&replacement, Value::Undefined, &[Value::string(&pattern)])?
                .to_js_string()
        } else {
            replacement.to_js_string()
        };
        fits(out.len(), text.len())?;
        out.push_str(&text);
        count += 1;
        if pattern.is_empty() {
            // An empty pattern matches once before the first character.
            break;
        }
        rest = &rest[index + pattern.len()..];
    }
    interp.check_string(out.len().saturating_add(rest.len()))?;
    out.push_str(rest);
    Ok(Value::string(&out))
}

fn string_repeat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let count = arg(args, 0).to_number();
    if count < 0.0 || count.is_infinite() {
        return Err(Interrupt::range_error("Invalid count value"));
    }
    let s = this_string(this);
    interp.check_string(s.len().saturating_mul(count as usize))?;
    Ok(Value::string(&s.repeat(count as usize)))
}

fn string_pad(interp: &mut Interpreter, this: &Value, args: &[Value], start: bool) -> Eval<Value> {
    let s = this_string(this);
    let target = arg(args, 0).to_number().max(0.0) as usize;
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => other.to_js_string(),
    };
    let len = s.chars().count();
    if target <= len || filler.is_empty() {
        return Ok(Value::String(s));
    }
    interp.check_string(s.len().saturating_add(target - len))?;
    let padding: String = filler.chars().cycle().take(target - len).collect();
    Ok(Value::string(&if start {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    }))
}

// Number methods

pub(crate) fn number_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "toFixed" => ("toFixed", number_to_fixed),
        "toString" => ("toString", number_to_string_radix),
        "toLocaleString" => ("toLocaleString", number_to_locale_string),
        _ => return None,
    };
    Some(entry)
}

fn number_to_fixed(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let digits = arg(args, 0).to_number();
    let digits = if digits.is_nan() { 0.0 } else { digits };
    if !(0.0..=100.0).contains(&digits) {
        return Err(Interrupt::error(
            "RangeError",
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Value::string(&number_to_string(n)));
    }
    Ok(Value::string(&format!("{:.*}", digits as usize, n)))
}

fn number_to_string_radix(_: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let n = this.to_number();
    let radix = match arg(args, 0) {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    if !(2..=36).contains(&radix) {
        return Err(Interrupt::error(
            "RangeError",
            "toString() radix must be between 2 and 36",
        ));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(Value::string(&number_to_string(n)));
    }
    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (value % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        value /= u64::from(radix);
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::string(&digits.into_iter().rev().collect::<String>()))
}

/// `en-US` style grouping with at most three fraction digits.
fn number_to_locale_string(_: &mut Interpreter, this: &Value, _: &[Value]) -> Eval<Value> {
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Value::string(&number_to_string(n)));
    }
    let fixed = format!("{:.3}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (index, c) in int_part.chars().enumerate() {
        if index > 0 && (int_part.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if !frac_part.is_empty() {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    if n < 0.0 {
        grouped.insert(0, '-');
    }
    Ok(Value::string(&grouped))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{Interpreter, Limits};
    use crate::transpile::{transpile, TranspileOptions};

    fn eval(source: &str) -> String {
        let module = transpile(
            &format!("exports.default = {source};"),
            &TranspileOptions::default(),
        )
        .unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.run(&module).unwrap();
        interp.default_export().to_js_string()
    }

    #[test]
    fn array_pipeline() {
        assert_eq!(
            eval("[3, 1, 2].map(n => n * 2).filter(n => n > 2).sort((a, b) => a - b).join('-')"),
            "4-6"
        );
        assert_eq!(eval("[1, 2, 3, 4].reduce((acc, n) => acc + n, 0)"), "10");
        assert_eq!(eval("[[1, 2], [3]].flat().length"), "3");
        assert_eq!(eval("['b', 'a', 'c'].sort().join('')"), "abc");
        assert_eq!(eval("[1, 2, 3].slice(-2).join()"), "2,3");
        assert_eq!(eval("[NaN].includes(NaN)"), "true");
    }

    #[test]
    fn string_helpers() {
        assert_eq!(eval("'  Hi  '.trim().toUpperCase()"), "HI");
        assert_eq!(eval("'a,b,c'.split(',').length"), "3");
        assert_eq!(eval("'hello'.slice(1, -1)"), "ell");
        assert_eq!(eval("'5'.padStart(3, '0')"), "005");
        assert_eq!(eval("'a-b-c'.replaceAll('-', '+')"), "a+b+c");
        assert_eq!(eval("'a-b-c'.replace('-', '+')"), "a+b-c");
        assert_eq!(eval("`${'x'.repeat(3)}!`"), "xxx!");
    }

    #[test]
    fn number_helpers() {
        assert_eq!(eval("(1.005).toFixed(1)"), "1.0");
        assert_eq!(eval("(255).toString(16)"), "ff");
        assert_eq!(eval("(1234567.5).toLocaleString()"), "1,234,567.5");
        assert_eq!(eval("parseInt('42px')"), "42");
        assert_eq!(eval("parseFloat('3.5rem')"), "3.5");
        assert_eq!(eval("Number('12') + 1"), "13");
        assert_eq!(eval("Math.max(1, 5, 3)"), "5");
        assert_eq!(eval("Math.round(2.5)"), "3");
    }

    #[test]
    fn json_round_trip_keeps_key_order() {
        assert_eq!(
            eval("JSON.stringify({ b: 1, a: [true, null, 'x'], skip: undefined })"),
            r#"{"b":1,"a":[true,null,"x"]}"#
        );
        assert_eq!(eval("JSON.parse('{\"n\": 2}').n + 1"), "3");
        assert_eq!(eval("JSON.stringify([1], null, 2)"), "[\n  1\n]");
    }

    #[test]
    fn object_helpers() {
        assert_eq!(eval("Object.keys({ a: 1, b: 2 }).join()"), "a,b");
        assert_eq!(
            eval("Object.entries({ a: 1 }).map(([k, v]) => k + v).join()"),
            "a1"
        );
        assert_eq!(eval("Object.assign({}, { a: 1 }, { b: 2 }).b"), "2");
        assert_eq!(eval("Array.isArray([])"), "true");
        assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i).join('')"), "012");
    }

    #[test]
    fn console_output_is_captured() {
        let module = transpile(
            "console.log('count', 3, { a: [1] }); console.warn('careful');",
            &TranspileOptions::default(),
        )
        .unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.run(&module).unwrap();
        assert_eq!(
            interp.console(),
            ["[log] count 3 { a: [1] }", "[warn] careful"]
        );
    }

    fn eval_err(source: &str) -> String {
        let module = transpile(
            &format!("exports.default = {source};"),
            &TranspileOptions::default(),
        )
        .unwrap();
        let mut interp = Interpreter::new(Limits::unbounded());
        interp.run(&module).unwrap_err().message()
    }

    #[test]
    fn oversized_arrays_are_range_errors() {
        assert_eq!(eval_err("new Array(4294967294)"), "Invalid array length");
        assert_eq!(
            eval_err("Array.from({ length: 4e9 })"),
            "Invalid array length"
        );
        assert_eq!(
            eval_err("(() => { const a = new Array(1 << 20); return a.concat(a); })()"),
            "Invalid array length"
        );
    }

    #[test]
    fn oversized_strings_are_range_errors() {
        assert_eq!(eval_err("'ab'.repeat(1 << 24)"), "Invalid string length");
        assert_eq!(eval_err("'x'.padStart(1e9)"), "Invalid string length");
        assert_eq!(
            eval_err("new Array(1 << 20).fill('x'.repeat(64)).join('')"),
            "Invalid string length"
        );
    }

    #[test]
    fn json_serializes_dates_and_collections() {
        assert_eq!(
            eval("JSON.stringify({ at: new Date(0), tags: new Set(['a']) })"),
            r#"{"at":"1970-01-01T00:00:00.000Z","tags":{}}"#
        );
    }

    #[test]
    fn console_formatting_is_bounded() {
        let module = transpile(
            "console.log(new Array(500).fill(1)); console.log(new Map([['k', 1]]), new Set([2]));",
            &TranspileOptions::default(),
        )
        .unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.run(&module).unwrap();
        let console = interp.console();
        assert!(console[0].ends_with(", ... 400 more items]"));
        assert_eq!(console[1], "[log] Map(1) {\"k\" => 1} Set(1) {2}");
    }

    #[test]
    fn random_is_deterministic() {
        assert_eq!(eval("Math.random()"), eval("Math.random()"));
    }
}
