//! Builtin objects with internal state: `Promise`, `Map`, `Set` and `Date`.
//!
//! Promise reactions go through the interpreter's job queue, which is
//! drained after the module body and after mounting. There are no timers,
//! so a promise nobody settles stays pending.
//!
//! Dates read a fixed preview clock and use UTC as the local time zone,
//! so a snippet renders the same markup every time.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};

use crate::interpreter::{Eval, Interpreter, Interrupt};
use crate::value::{HostObject, NativeFn, PromiseState, PropertyMap, Reaction, Value};

/// `Date.now()` inside a preview: 2024-01-01T00:00:00Z.
pub const PREVIEW_NOW_MS: f64 = 1_704_067_200_000.0;

/// Largest time value a date may hold.
const MAX_TIME_MS: f64 = 8.64e15;

const MS_PER_DAY: f64 = 86_400_000.0;

pub(crate) fn install(interp: &mut Interpreter) {
    interp.define_global("Promise", Value::native("Promise", promise_ctor));
    interp.define_global("Map", Value::native("Map", map_ctor));
    interp.define_global("Set", Value::native("Set", set_ctor));
    interp.define_global("Date", Value::native("Date", date_ctor));
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Static members of the constructors installed here.
pub(crate) fn static_member(ctor: &str, key: &str) -> Option<Value> {
    let (name, call): (&'static str, NativeFn) = match (ctor, key) {
        ("Promise", "resolve") => ("resolve", promise_resolve_static),
        ("Promise", "reject") => ("reject", promise_reject_static),
        ("Promise", "all") => ("all", promise_all),
        ("Promise", "allSettled") => ("allSettled", promise_all_settled),
        ("Promise", "race") => ("race", promise_race),
        ("Date", "now") => ("now", |_, _, _| Ok(Value::Number(PREVIEW_NOW_MS))),
        ("Date", "parse") => ("parse", |_, _, args| {
            Ok(Value::Number(parse_date(&arg(args, 0).to_js_string())))
        }),
        ("Date", "UTC") => ("UTC", |_, _, args| Ok(Value::Number(time_from_args(args)))),
        _ => return None,
    };
    Some(Value::native(name, call))
}

/// Members of a host object, with methods bound to `object`.
pub(crate) fn host_member(object: &Value, host: &HostObject, key: &str) -> Value {
    let entry = match host {
        HostObject::Map(entries) if key == "size" => {
            return Value::Number(entries.borrow().len() as f64)
        }
        HostObject::Set(items) if key == "size" => return Value::Number(items.borrow().len() as f64),
        HostObject::Promise(_) => promise_method(key),
        HostObject::Map(_) => map_method(key),
        HostObject::Set(_) => set_method(key),
        HostObject::Date(_) => date_method(key),
    };
    entry
        .map(|(name, call)| Value::method(name, call, object.clone()))
        .unwrap_or_default()
}

// Promises

/// A queued promise reaction together with the outcome it reacts to.
#[derive(Debug)]
pub(crate) struct Job {
    reaction: Reaction,
    outcome: Result<Value, Value>,
}

pub(crate) fn new_promise() -> Value {
    Value::host(HostObject::Promise(RefCell::new(PromiseState::Pending(Vec::new()))))
}

fn promise_state(value: &Value) -> Option<&RefCell<PromiseState>> {
    match value {
        Value::Host(host) => match &**host {
            HostObject::Promise(state) => Some(state),
            _ => None,
        },
        _ => None,
    }
}

/// Resolve `promise` with `value`, adopting the state of `value` when it
/// is itself a promise.
pub(crate) fn resolve_promise(interp: &mut Interpreter, promise: &Value, value: Value) {
    if promise_state(&value).is_some() {
        if value.strict_equals(promise) {
            let cycle = crate::interpreter::error_object(
                "TypeError",
                "Chaining cycle detected for promise",
            );
            settle(interp, promise, Err(cycle));
            return;
        }
        subscribe(
            interp,
            &value,
            Reaction {
                on_fulfilled: Value::Undefined,
                on_rejected: Value::Undefined,
                derived: promise.clone(),
            },
        );
        return;
    }
    settle(interp, promise, Ok(value));
}

pub(crate) fn reject_promise(interp: &mut Interpreter, promise: &Value, reason: Value) {
    settle(interp, promise, Err(reason));
}

fn settle(interp: &mut Interpreter, promise: &Value, outcome: Result<Value, Value>) {
    let Some(state) = promise_state(promise) else {
        return;
    };
    let reactions = {
        let mut state = state.borrow_mut();
        let PromiseState::Pending(reactions) = &mut *state else {
            return;
        };
        let reactions = std::mem::take(reactions);
        *state = match &outcome {
            Ok(value) => PromiseState::Fulfilled(value.clone()),
            Err(reason) => PromiseState::Rejected(reason.clone()),
        };
        reactions
    };
    for reaction in reactions {
        interp.jobs.push_back(Job {
            reaction,
            outcome: outcome.clone(),
        });
    }
}

fn subscribe(interp: &mut Interpreter, promise: &Value, reaction: Reaction) {
    let Some(state) = promise_state(promise) else {
        return;
    };
    let outcome = match &mut *state.borrow_mut() {
        PromiseState::Pending(reactions) => {
            reactions.push(reaction);
            return;
        }
        PromiseState::Fulfilled(value) => Ok(value.clone()),
        PromiseState::Rejected(reason) => Err(reason.clone()),
    };
    interp.jobs.push_back(Job { reaction, outcome });
}

/// `promise.then(on_fulfilled, on_rejected)`; returns the derived promise.
fn then(interp: &mut Interpreter, promise: &Value, on_fulfilled: Value, on_rejected: Value) -> Value {
    let derived = new_promise();
    subscribe(
        interp,
        promise,
        Reaction {
            on_fulfilled,
            on_rejected,
            derived: derived.clone(),
        },
    );
    derived
}

pub(crate) fn run_job(interp: &mut Interpreter, job: Job) -> Eval<()> {
    let Job { reaction, outcome } = job;
    let handler = match &outcome {
        Ok(_) => &reaction.on_fulfilled,
        Err(_) => &reaction.on_rejected,
    };
    if !handler.is_callable() {
        match outcome {
            Ok(value) => resolve_promise(interp, &reaction.derived, value),
            Err(reason) => reject_promise(interp, &reaction.derived, reason),
        }
        return Ok(());
    }
    let argument = match &outcome {
        Ok(value) | Err(value) => value.clone(),
    };
    match interp.call(handler, Value::Undefined, &[argument]) {
        Ok(value) => resolve_promise(interp, &reaction.derived, value),
        Err(Interrupt::Throw(reason)) => reject_promise(interp, &reaction.derived, reason),
        Err(Interrupt::Suspended) => {}
        Err(exhausted) => return Err(exhausted),
    }
    Ok(())
}

/// `value` if it is a promise, otherwise a promise fulfilled with it.
fn to_promise(interp: &mut Interpreter, value: Value) -> Value {
    if promise_state(&value).is_some() {
        return value;
    }
    let promise = new_promise();
    resolve_promise(interp, &promise, value);
    promise
}

fn promise_ctor(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(Interrupt::type_error(format!(
            "Promise resolver {} is not a function",
            executor.to_js_string()
        )));
    }
    let promise = new_promise();
    let resolve = Value::method("resolve", resolve_bound, promise.clone());
    let reject = Value::method("reject", reject_bound, promise.clone());
    match interp.call(&executor, Value::Undefined, &[resolve, reject]) {
        Ok(_) => {}
        Err(Interrupt::Throw(reason)) => reject_promise(interp, &promise, reason),
        Err(other) => return Err(other),
    }
    Ok(promise)
}

fn resolve_bound(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    resolve_promise(interp, this, arg(args, 0));
    Ok(Value::Undefined)
}

fn reject_bound(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    reject_promise(interp, this, arg(args, 0));
    Ok(Value::Undefined)
}

fn promise_resolve_static(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(to_promise(interp, arg(args, 0)))
}

fn promise_reject_static(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let promise = new_promise();
    reject_promise(interp, &promise, arg(args, 0));
    Ok(promise)
}

fn promise_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "then" => ("then", |interp, this, args| {
            let on_fulfilled = callable_or_undefined(arg(args, 0));
            let on_rejected = callable_or_undefined(arg(args, 1));
            Ok(then(interp, this, on_fulfilled, on_rejected))
        }),
        "catch" => ("catch", |interp, this, args| {
            let on_rejected = callable_or_undefined(arg(args, 0));
            Ok(then(interp, this, Value::Undefined, on_rejected))
        }),
        "finally" => ("finally", promise_finally),
        "toString" => ("toString", |_, _, _| Ok(Value::string("[object Promise]"))),
        _ => return None,
    };
    Some(entry)
}

fn callable_or_undefined(value: Value) -> Value {
    if value.is_callable() {
        value
    } else {
        Value::Undefined
    }
}

fn promise_finally(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Ok(then(interp, this, Value::Undefined, Value::Undefined));
    }
    let on_fulfilled = Value::method("finally", finally_fulfilled, callback.clone());
    let on_rejected = Value::method("finally", finally_rejected, callback);
    Ok(then(interp, this, on_fulfilled, on_rejected))
}

fn finally_fulfilled(interp: &mut Interpreter, callback: &Value, args: &[Value]) -> Eval<Value> {
    interp.call(callback, Value::Undefined, &[])?;
    Ok(arg(args, 0))
}

fn finally_rejected(interp: &mut Interpreter, callback: &Value, args: &[Value]) -> Eval<Value> {
    interp.call(callback, Value::Undefined, &[])?;
    Err(Interrupt::Throw(arg(args, 0)))
}

/// Shared state of a `Promise.all` / `Promise.allSettled` call.
fn aggregate(result: &Value, count: usize) -> Value {
    let mut map = PropertyMap::new();
    map.set("promise", result.clone());
    map.set("results", Value::array(vec![Value::Undefined; count]));
    map.set("remaining", Value::Number(count as f64));
    Value::object(map)
}

fn promise_all(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    combine(interp, args, all_fulfilled, all_rejected)
}

fn promise_all_settled(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    combine(interp, args, settled_fulfilled, settled_rejected)
}

fn combine(interp: &mut Interpreter, args: &[Value], fulfilled: NativeFn, rejected: NativeFn) -> Eval<Value> {
    let items = interp.iterate(&arg(args, 0))?;
    let result = new_promise();
    if items.is_empty() {
        resolve_promise(interp, &result, Value::array(Vec::new()));
        return Ok(result);
    }
    let state = aggregate(&result, items.len());
    for (index, item) in items.into_iter().enumerate() {
        let promise = to_promise(interp, item);
        let slot = Value::array(vec![state.clone(), Value::Number(index as f64)]);
        let on_fulfilled = Value::method("all", fulfilled, slot.clone());
        let on_rejected = Value::method("all", rejected, slot);
        then(interp, &promise, on_fulfilled, on_rejected);
    }
    Ok(result)
}

/// Store `value` in the slot described by `slot` (`[state, index]`) and
/// resolve the combined promise once every slot is filled.
fn fill_slot(interp: &mut Interpreter, slot: &Value, value: Value) -> Eval<Value> {
    let state = interp.get_property(slot, "0")?;
    let index = interp.get_property(slot, "1")?.to_property_key();
    let results = interp.get_property(&state, "results")?;
    interp.set_property(&results, &index, value)?;
    let remaining = interp.get_property(&state, "remaining")?.to_number() - 1.0;
    interp.set_property(&state, "remaining", Value::Number(remaining))?;
    if remaining <= 0.0 {
        let promise = interp.get_property(&state, "promise")?;
        resolve_promise(interp, &promise, results);
    }
    Ok(Value::Undefined)
}

fn all_fulfilled(interp: &mut Interpreter, slot: &Value, args: &[Value]) -> Eval<Value> {
    fill_slot(interp, slot, arg(args, 0))
}

fn all_rejected(interp: &mut Interpreter, slot: &Value, args: &[Value]) -> Eval<Value> {
    let state = interp.get_property(slot, "0")?;
    let promise = interp.get_property(&state, "promise")?;
    reject_promise(interp, &promise, arg(args, 0));
    Ok(Value::Undefined)
}

fn settled_fulfilled(interp: &mut Interpreter, slot: &Value, args: &[Value]) -> Eval<Value> {
    let mut outcome = PropertyMap::new();
    outcome.set("status", Value::string("fulfilled"));
    outcome.set("value", arg(args, 0));
    fill_slot(interp, slot, Value::object(outcome))
}

fn settled_rejected(interp: &mut Interpreter, slot: &Value, args: &[Value]) -> Eval<Value> {
    let mut outcome = PropertyMap::new();
    outcome.set("status", Value::string("rejected"));
    outcome.set("reason", arg(args, 0));
    fill_slot(interp, slot, Value::object(outcome))
}

fn promise_race(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let items = interp.iterate(&arg(args, 0))?;
    let result = new_promise();
    for item in items {
        let promise = to_promise(interp, item);
        let resolve = Value::method("resolve", resolve_bound, result.clone());
        let reject = Value::method("reject", reject_bound, result.clone());
        then(interp, &promise, resolve, reject);
    }
    Ok(result)
}

// Map and Set

fn this_map(this: &Value) -> Eval<&RefCell<Vec<(Value, Value)>>> {
    match this {
        Value::Host(host) => match &**host {
            HostObject::Map(entries) => Ok(entries),
            _ => Err(incompatible("Map")),
        },
        _ => Err(incompatible("Map")),
    }
}

fn this_set(this: &Value) -> Eval<&RefCell<Vec<Value>>> {
    match this {
        Value::Host(host) => match &**host {
            HostObject::Set(items) => Ok(items),
            _ => Err(incompatible("Set")),
        },
        _ => Err(incompatible("Set")),
    }
}

fn incompatible(class: &str) -> Interrupt {
    Interrupt::type_error(format!("Method {class}.prototype called on incompatible receiver"))
}

fn map_ctor(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let mut entries: Vec<(Value, Value)> = Vec::new();
    let source = arg(args, 0);
    if !source.is_nullish() {
        for entry in interp.iterate(&source)? {
            let key = interp.get_property(&entry, "0")?;
            let value = interp.get_property(&entry, "1")?;
            interp.charge(entries.len() / 32)?;
            match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
    }
    Ok(Value::host(HostObject::Map(RefCell::new(entries))))
}

fn map_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "get" => ("get", |interp, this, args| {
            let entries = this_map(this)?;
            interp.charge(entries.borrow().len() / 32)?;
            let key = arg(args, 0);
            Ok(entries
                .borrow()
                .iter()
                .find(|(k, _)| k.same_value_zero(&key))
                .map(|(_, v)| v.clone())
                .unwrap_or_default())
        }),
        "has" => ("has", |interp, this, args| {
            let entries = this_map(this)?;
            interp.charge(entries.borrow().len() / 32)?;
            let key = arg(args, 0);
            Ok(Value::Bool(entries.borrow().iter().any(|(k, _)| k.same_value_zero(&key))))
        }),
        "set" => ("set", map_set),
        "delete" => ("delete", |_, this, args| {
            let key = arg(args, 0);
            let mut entries = this_map(this)?.borrow_mut();
            let before = entries.len();
            entries.retain(|(k, _)| !k.same_value_zero(&key));
            Ok(Value::Bool(entries.len() != before))
        }),
        "clear" => ("clear", |_, this, _| {
            this_map(this)?.borrow_mut().clear();
            Ok(Value::Undefined)
        }),
        "forEach" => ("forEach", |interp, this, args| {
            let callback = arg(args, 0);
            let entries = this_map(this)?.borrow().clone();
            for (key, value) in entries {
                interp.call(&callback, Value::Undefined, &[value, key, this.clone()])?;
            }
            Ok(Value::Undefined)
        }),
        "keys" => ("keys", |_, this, _| {
            Ok(Value::array(this_map(this)?.borrow().iter().map(|(k, _)| k.clone()).collect()))
        }),
        "values" => ("values", |_, this, _| {
            Ok(Value::array(this_map(this)?.borrow().iter().map(|(_, v)| v.clone()).collect()))
        }),
        "entries" => ("entries", |_, this, _| {
            Ok(Value::array(
                this_map(this)?
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }),
        "toString" => ("toString", |_, _, _| Ok(Value::string("[object Map]"))),
        _ => return None,
    };
    Some(entry)
}

fn map_set(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let entries = this_map(this)?;
    let len = entries.borrow().len();
    interp.grow_array(len + 1, len / 32)?;
    let key = arg(args, 0);
    let value = arg(args, 1);
    let mut entries = entries.borrow_mut();
    match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
    Ok(this.clone())
}

fn set_ctor(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let mut items: Vec<Value> = Vec::new();
    let source = arg(args, 0);
    if !source.is_nullish() {
        for item in interp.iterate(&source)? {
            interp.charge(items.len() / 32)?;
            if !items.iter().any(|v| v.same_value_zero(&item)) {
                items.push(item);
            }
        }
    }
    Ok(Value::host(HostObject::Set(RefCell::new(items))))
}

fn set_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "add" => ("add", set_add),
        "has" => ("has", |interp, this, args| {
            let items = this_set(this)?;
            interp.charge(items.borrow().len() / 32)?;
            let needle = arg(args, 0);
            Ok(Value::Bool(items.borrow().iter().any(|v| v.same_value_zero(&needle))))
        }),
        "delete" => ("delete", |_, this, args| {
            let needle = arg(args, 0);
            let mut items = this_set(this)?.borrow_mut();
            let before = items.len();
            items.retain(|v| !v.same_value_zero(&needle));
            Ok(Value::Bool(items.len() != before))
        }),
        "clear" => ("clear", |_, this, _| {
            this_set(this)?.borrow_mut().clear();
            Ok(Value::Undefined)
        }),
        "forEach" => ("forEach", |interp, this, args| {
            let callback = arg(args, 0);
            let items = this_set(this)?.borrow().clone();
            for item in items {
                interp.call(&callback, Value::Undefined, &[item.clone(), item, this.clone()])?;
            }
            Ok(Value::Undefined)
        }),
        "values" | "keys" => ("values", |_, this, _| Ok(Value::array(this_set(this)?.borrow().clone()))),
        "entries" => ("entries", |_, this, _| {
            Ok(Value::array(
                this_set(this)?
                    .borrow()
                    .iter()
                    .map(|v| Value::array(vec![v.clone(), v.clone()]))
                    .collect(),
            ))
        }),
        "toString" => ("toString", |_, _, _| Ok(Value::string("[object Set]"))),
        _ => return None,
    };
    Some(entry)
}

fn set_add(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let items = this_set(this)?;
    let len = items.borrow().len();
    interp.grow_array(len + 1, len / 32)?;
    let item = arg(args, 0);
    let mut items = items.borrow_mut();
    if !items.iter().any(|v| v.same_value_zero(&item)) {
        items.push(item);
    }
    Ok(this.clone())
}

// Dates

fn this_date(this: &Value) -> Eval<&Cell<f64>> {
    match this {
        Value::Host(host) => match &**host {
            HostObject::Date(time) => Ok(time),
            _ => Err(Interrupt::type_error("this is not a Date object.")),
        },
        _ => Err(Interrupt::type_error("this is not a Date object.")),
    }
}

fn time_clip(time: f64) -> f64 {
    if !time.is_finite() || time.abs() > MAX_TIME_MS {
        f64::NAN
    } else {
        time.trunc() + 0.0
    }
}

fn datetime(time: f64) -> Option<DateTime<Utc>> {
    if !time.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(time as i64).single()
}

/// Time value from calendar fields, normalizing overflowing months and days.
fn make_time(fields: [f64; 7]) -> f64 {
    if fields.iter().any(|f| !f.is_finite()) {
        return f64::NAN;
    }
    let [year, month, day, hours, minutes, seconds, millis] = fields.map(f64::trunc);
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0);
    if year.abs() > 400_000.0 {
        return f64::NAN;
    }
    let month_start = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|start| Utc.from_utc_datetime(&start).timestamp_millis() as f64);
    let Some(month_start) = month_start else {
        return f64::NAN;
    };
    time_clip(
        month_start
            + (day - 1.0) * MS_PER_DAY
            + hours * 3_600_000.0
            + minutes * 60_000.0
            + seconds * 1_000.0
            + millis,
    )
}

/// Calendar fields of a valid time value: year, month (0-based), day,
/// hours, minutes, seconds, milliseconds.
fn fields(time: f64) -> Option<[f64; 7]> {
    let dt = datetime(time)?;
    Some([
        f64::from(dt.year()),
        f64::from(dt.month0()),
        f64::from(dt.day()),
        f64::from(dt.hour()),
        f64::from(dt.minute()),
        f64::from(dt.second()),
        f64::from(dt.timestamp_subsec_millis()),
    ])
}

/// `Date.UTC(...)` and the multi-argument constructor.
fn time_from_args(args: &[Value]) -> f64 {
    let mut fields = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (slot, value) in fields.iter_mut().zip(args) {
        *slot = value.to_number();
    }
    // Two-digit years count from 1900.
    if (0.0..=99.0).contains(&fields[0].trunc()) {
        fields[0] = 1900.0 + fields[0].trunc();
    }
    make_time(fields)
}

/// Parse the formats snippets use: ISO 8601 (dates without an offset are
/// UTC) and RFC 2822.
fn parse_date(text: &str) -> f64 {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return time_clip(Utc.from_utc_datetime(&naive).timestamp_millis() as f64);
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return time_clip(Utc.from_utc_datetime(&naive).timestamp_millis() as f64);
            }
        }
    }
    f64::NAN
}

fn date_ctor(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let time = match args {
        [] => PREVIEW_NOW_MS,
        [Value::String(text)] => parse_date(text),
        [Value::Host(host)] => match &**host {
            HostObject::Date(time) => time.get(),
            _ => f64::NAN,
        },
        [value] => time_clip(value.to_number()),
        _ => time_from_args(args),
    };
    Ok(Value::host(HostObject::Date(Cell::new(time))))
}

/// `Date.prototype.toString`, also used for string conversion.
pub(crate) fn date_to_string(time: f64) -> String {
    match datetime(time) {
        Some(dt) => dt
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// `Date.prototype.toISOString`; `None` for an invalid date.
pub(crate) fn date_to_iso(time: f64) -> Option<String> {
    datetime(time).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn date_method(key: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match key {
        "getTime" | "valueOf" => ("getTime", |_, this, _| Ok(Value::Number(this_date(this)?.get()))),
        "getFullYear" | "getUTCFullYear" => ("getFullYear", |_, this, _| date_field(this, 0)),
        "getMonth" | "getUTCMonth" => ("getMonth", |_, this, _| date_field(this, 1)),
        "getDate" | "getUTCDate" => ("getDate", |_, this, _| date_field(this, 2)),
        "getHours" | "getUTCHours" => ("getHours", |_, this, _| date_field(this, 3)),
        "getMinutes" | "getUTCMinutes" => ("getMinutes", |_, this, _| date_field(this, 4)),
        "getSeconds" | "getUTCSeconds" => ("getSeconds", |_, this, _| date_field(this, 5)),
        "getMilliseconds" | "getUTCMilliseconds" => {
            ("getMilliseconds", |_, this, _| date_field(this, 6))
        }
        "getDay" | "getUTCDay" => ("getDay", |_, this, _| {
            let day = datetime(this_date(this)?.get())
                .map_or(f64::NAN, |dt| f64::from(dt.weekday().num_days_from_sunday()));
            Ok(Value::Number(day))
        }),
        "getTimezoneOffset" => ("getTimezoneOffset", |_, this, _| {
            let time = this_date(this)?.get();
            Ok(Value::Number(if time.is_nan() { f64::NAN } else { 0.0 }))
        }),
        "setTime" => ("setTime", |_, this, args| {
            let time = time_clip(arg(args, 0).to_number());
            this_date(this)?.set(time);
            Ok(Value::Number(time))
        }),
        "setFullYear" | "setUTCFullYear" => ("setFullYear", |_, this, args| date_set(this, args, 0)),
        "setMonth" | "setUTCMonth" => ("setMonth", |_, this, args| date_set(this, args, 1)),
        "setDate" | "setUTCDate" => ("setDate", |_, this, args| date_set(this, args, 2)),
        "setHours" | "setUTCHours" => ("setHours", |_, this, args| date_set(this, args, 3)),
        "setMinutes" | "setUTCMinutes" => ("setMinutes", |_, this, args| date_set(this, args, 4)),
        "setSeconds" | "setUTCSeconds" => ("setSeconds", |_, this, args| date_set(this, args, 5)),
        "setMilliseconds" | "setUTCMilliseconds" => {
            ("setMilliseconds", |_, this, args| date_set(this, args, 6))
        }
        "toISOString" => ("toISOString", |_, this, _| match date_to_iso(this_date(this)?.get()) {
            Some(iso) => Ok(Value::string(&iso)),
            None => Err(Interrupt::range_error("Invalid time value")),
        }),
        "toJSON" => ("toJSON", |_, this, _| {
            Ok(date_to_iso(this_date(this)?.get())
                .map(|iso| Value::string(&iso))
                .unwrap_or(Value::Null))
        }),
        "toString" => ("toString", |_, this, _| {
            Ok(Value::string(&date_to_string(this_date(this)?.get())))
        }),
        "toDateString" => ("toDateString", |_, this, _| date_format(this, "%a %b %d %Y")),
        "toTimeString" => ("toTimeString", |_, this, _| {
            date_format(this, "%H:%M:%S GMT+0000 (Coordinated Universal Time)")
        }),
        "toUTCString" | "toGMTString" => {
            ("toUTCString", |_, this, _| date_format(this, "%a, %d %b %Y %H:%M:%S GMT"))
        }
        "toLocaleDateString" => ("toLocaleDateString", |interp, this, args| {
            locale_date(interp, this, &arg(args, 1))
        }),
        "toLocaleTimeString" => ("toLocaleTimeString", |_, this, _| date_format(this, "%-I:%M:%S %p")),
        "toLocaleString" => ("toLocaleString", |_, this, _| {
            date_format(this, "%-m/%-d/%Y, %-I:%M:%S %p")
        }),
        _ => return None,
    };
    Some(entry)
}

fn date_field(this: &Value, index: usize) -> Eval<Value> {
    let time = this_date(this)?.get();
    Ok(Value::Number(fields(time).map_or(f64::NAN, |fields| fields[index])))
}

/// Setters overwrite consecutive calendar fields starting at `start`:
/// `setFullYear(y, m, d)` reaches up to the day, `setHours(h, m, s, ms)`
/// up to the milliseconds.
fn date_set(this: &Value, args: &[Value], start: usize) -> Eval<Value> {
    let cell = this_date(this)?;
    let current = fields(cell.get());
    let mut fields = match current {
        Some(fields) => fields,
        // Only setFullYear revives an invalid date.
        None if start == 0 => [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        None => return Ok(Value::Number(f64::NAN)),
    };
    let end = if start < 3 { 3 } else { 7 };
    for (slot, value) in fields[start..end].iter_mut().zip(args) {
        *slot = value.to_number();
    }
    if args.is_empty() {
        fields[start] = f64::NAN;
    }
    let time = make_time(fields);
    cell.set(time);
    Ok(Value::Number(time))
}

fn date_format(this: &Value, format: &str) -> Eval<Value> {
    Ok(Value::string(&match datetime(this_date(this)?.get()) {
        Some(dt) => dt.format(format).to_string(),
        None => "Invalid Date".to_string(),
    }))
}

/// `en-US` date formatting with the common `Intl` options: `weekday`,
/// `year`, `month` and `day`.
fn locale_date(interp: &mut Interpreter, this: &Value, options: &Value) -> Eval<Value> {
    let Some(dt) = datetime(this_date(this)?.get()) else {
        return Ok(Value::string("Invalid Date"));
    };
    let mut option = |name: &str| -> Eval<Option<String>> {
        if !matches!(options, Value::Object(_)) {
            return Ok(None);
        }
        let value = interp.get_property(options, name)?;
        Ok((!value.is_nullish()).then(|| value.to_js_string()))
    };
    let weekday = option("weekday")?;
    let year = option("year")?;
    let month = option("month")?;
    let day = option("day")?;
    if weekday.is_none() && year.is_none() && month.is_none() && day.is_none() {
        return Ok(Value::string(&dt.format("%-m/%-d/%Y").to_string()));
    }

    let year_text = year.map(|style| match style.as_str() {
        "2-digit" => dt.format("%y").to_string(),
        _ => dt.year().to_string(),
    });
    let day_text = day.map(|style| match style.as_str() {
        "2-digit" => dt.format("%d").to_string(),
        _ => dt.day().to_string(),
    });
    let weekday_text = weekday.map(|style| match style.as_str() {
        "long" => dt.format("%A").to_string(),
        _ => dt.format("%a").to_string(),
    });
    let text = match month.as_deref() {
        Some(style @ ("long" | "short" | "narrow")) => {
            let mut name = match style {
                "long" => dt.format("%B").to_string(),
                _ => dt.format("%b").to_string(),
            };
            if style == "narrow" {
                name.truncate(1);
            }
            let mut text = name;
            if let Some(day) = &day_text {
                text = format!("{text} {day}");
            }
            if let Some(year) = &year_text {
                text = if day_text.is_some() {
                    format!("{text}, {year}")
                } else {
                    format!("{text} {year}")
                };
            }
            text
        }
        Some(style) => {
            let month_text = match style {
                "2-digit" => dt.format("%m").to_string(),
                _ => dt.month().to_string(),
            };
            [Some(month_text), day_text, year_text]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("/")
        }
        None => [day_text, year_text]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
    };
    Ok(Value::string(&match weekday_text {
        Some(weekday) if text.is_empty() => weekday,
        Some(weekday) => format!("{weekday}, {text}"),
        None => text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Limits;
    use crate::transpile::{transpile, TranspileOptions};
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> String {
        let module = transpile(source, &TranspileOptions::default()).unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.run(&module).unwrap();
        interp.default_export().to_js_string()
    }

    #[test]
    fn dates_read_the_preview_clock() {
        assert_eq!(eval("exports.default = new Date().toISOString();"), "2024-01-01T00:00:00.000Z");
        assert_eq!(eval("exports.default = Date.now();"), "1704067200000");
        assert_eq!(eval("exports.default = new Date().getFullYear();"), "2024");
    }

    #[test]
    fn date_fields_and_setters() {
        assert_eq!(
            eval(
                r#"
                const d = new Date(2024, 0, 31);
                d.setMonth(1);
                exports.default = [d.getMonth(), d.getDate(), d.getDay()].join();
                "#
            ),
            "2,2,6"
        );
        assert_eq!(
            eval("exports.default = new Date('2024-03-05T10:20:30Z').getHours();"),
            "10"
        );
        assert_eq!(eval("exports.default = String(new Date('nope'));"), "Invalid Date");
        assert_eq!(
            eval("exports.default = new Date('2024-01-02') - new Date('2024-01-01');"),
            "86400000"
        );
    }

    #[test]
    fn locale_date_formatting() {
        assert_eq!(
            eval("exports.default = new Date(2024, 2, 5).toLocaleDateString();"),
            "3/5/2024"
        );
        assert_eq!(
            eval(
                "exports.default = new Date(2024, 2, 5).toLocaleDateString('en-US', { year: 'numeric', month: 'long', day: 'numeric' });"
            ),
            "March 5, 2024"
        );
        assert_eq!(
            eval(
                "exports.default = new Date(2024, 2, 5).toLocaleDateString('en-US', { weekday: 'short', month: 'short', day: 'numeric' });"
            ),
            "Tue, Mar 5"
        );
    }

    #[test]
    fn maps_keep_insertion_order() {
        assert_eq!(
            eval(
                r#"
                const m = new Map([['b', 1]]);
                m.set('a', 2).set('b', 3);
                m.delete('missing');
                exports.default = [...m].map(([k, v]) => k + v).join() + '|' + m.size + m.has('a') + m.get('b');
                "#
            ),
            "b3,a2|2true3"
        );
    }

    #[test]
    fn sets_drop_duplicates() {
        assert_eq!(
            eval("const s = new Set([1, 2, 2, NaN, NaN]); s.add(1); exports.default = [...s].join() + '|' + s.size;"),
            "1,2,NaN|3"
        );
    }

    #[test]
    fn promise_combinators() {
        assert_eq!(
            eval(
                r#"
                const log = [];
                Promise.all([1, Promise.resolve(2)]).then(v => log.push('all ' + v.join('+')));
                Promise.allSettled([Promise.reject('no'), 3]).then(v => log.push(v.map(r => r.status).join('/')));
                Promise.race([new Promise(() => {}), Promise.resolve('fast')]).then(v => log.push(v));
                Promise.reject(new Error('bad')).catch(e => e.message).finally(() => log.push('done')).then(v => log.push(v));
                exports.default = log;
                "#
            ),
            "all 1+2,rejected/fulfilled,fast,done,bad"
        );
    }

    #[test]
    fn executor_errors_reject_the_promise() {
        assert_eq!(
            eval(
                r#"
                const seen = [];
                new Promise(() => { throw new Error('boom'); }).catch(e => seen.push(e.message));
                exports.default = seen;
                "#
            ),
            "boom"
        );
    }
}
