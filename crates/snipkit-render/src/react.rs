//! The `React` capability handed to snippets.
//!
//! Rendering is a single server-style pass: state setters and dispatchers
//! are accepted and ignored, effects are counted but never run. Class
//! components extend `React.Component`; `componentDidMount` counts as a
//! deferred effect.

use std::rc::Rc;

use crate::interpreter::{Eval, Interpreter, Interrupt};
use crate::value::{Element, ElementKind, Function, PropertyMap, Value, FRAGMENT_SYMBOL};

const INVALID_HOOK_CALL: &str = "Invalid hook call. Hooks can only be called inside of the body of a function component.";

/// Build the object bound to the runtime name (normally `React`).
pub fn runtime() -> Value {
    let mut map = PropertyMap::new();
    map.set("Fragment", Value::Symbol(FRAGMENT_SYMBOL));
    let functions: [(&'static str, crate::value::NativeFn); 18] = [
        ("Component", component),
        ("PureComponent", component),
        ("createElement", create_element),
        ("isValidElement", is_valid_element),
        ("memo", identity),
        ("forwardRef", identity),
        ("createContext", create_context),
        ("useContext", use_context),
        ("useState", use_state),
        ("useReducer", use_reducer),
        ("useEffect", use_effect),
        ("useLayoutEffect", use_effect),
        ("useInsertionEffect", use_effect),
        ("useMemo", use_memo),
        ("useCallback", use_callback),
        ("useRef", use_ref),
        ("useId", use_id),
        ("useTransition", use_transition),
    ];
    for (name, call) in functions {
        map.set(name, Value::native(name, call));
    }
    Value::object(map)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn hook_guard(interp: &Interpreter) -> Eval<()> {
    if interp.render.rendering == 0 {
        return Err(Interrupt::error("Error", INVALID_HOOK_CALL));
    }
    Ok(())
}

fn describe_type(value: &Value) -> String {
    match value {
        Value::Undefined | Value::Null => value.to_js_string(),
        Value::Object(_) | Value::Array(_) | Value::Host(_) => "object".to_string(),
        other => other.type_of().to_string(),
    }
}

fn create_element(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let kind = match arg(args, 0) {
        Value::String(tag) => ElementKind::Host(tag),
        Value::Symbol(FRAGMENT_SYMBOL) => ElementKind::Fragment,
        Value::Function(func) => ElementKind::Component(func),
        other => {
            return Err(Interrupt::error(
                "Error",
                format!(
                    "Element type is invalid: expected a string (for built-in components) or a function (for composite components) but got: {}.",
                    describe_type(&other)
                ),
            ))
        }
    };
    interp.count_element()?;

    let mut props = PropertyMap::new();
    let mut key = None;
    if let Value::Object(source) = arg(args, 1) {
        for (name, value) in source.borrow().iter() {
            match &**name {
                "key" => {
                    if !value.is_nullish() {
                        key = Some(value.to_property_key());
                    }
                }
                "ref" => {}
                _ => props.set(Rc::clone(name), value.clone()),
            }
        }
    }
    match args.get(2..) {
        Some([]) | None => {}
        Some([child]) => props.set("children", child.clone()),
        Some(children) => props.set("children", Value::array(children.to_vec())),
    }

    Ok(Value::Element(Rc::new(Element { kind, props, key })))
}

fn is_valid_element(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Element(_))))
}

fn identity(_: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    Ok(arg(args, 0))
}

/// Contexts are plain objects; `Provider` is a component bound to its
/// context that publishes `value` for the components rendered after it.
fn create_context(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    let mut map = PropertyMap::new();
    map.set("currentValue", arg(args, 0));
    let context = Value::object(map);
    interp.set_property(
        &context,
        "Provider",
        Value::method("Provider", context_provider, context.clone()),
    )?;
    interp.set_property(
        &context,
        "Consumer",
        Value::method("Consumer", context_consumer, context.clone()),
    )?;
    Ok(context)
}

fn context_provider(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let props = arg(args, 0);
    let value = interp.get_property(&props, "value")?;
    interp.set_property(this, "currentValue", value)?;
    interp.get_property(&props, "children")
}

fn context_consumer(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    let render = interp.get_property(&arg(args, 0), "children")?;
    let value = interp.get_property(this, "currentValue")?;
    interp.call(&render, Value::Undefined, &[value])
}

fn use_context(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    interp.get_property(&arg(args, 0), "currentValue")
}

fn ignored_update(_: &mut Interpreter, _: &Value, _: &[Value]) -> Eval<Value> {
    Ok(Value::Undefined)
}

/// `React.Component` and `React.PureComponent`, run as the parent
/// constructor of a class component.
fn component(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Eval<Value> {
    if !matches!(this, Value::Object(_)) {
        return Err(Interrupt::type_error(
            "Class constructor Component cannot be invoked without 'new'",
        ));
    }
    interp.set_property(this, "props", arg(args, 0))?;
    for name in ["setState", "forceUpdate"] {
        if interp.get_property(this, name)?.is_nullish() {
            interp.set_property(this, name, Value::native(name, ignored_update))?;
        }
    }
    Ok(Value::Undefined)
}

fn use_state(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    let initial = match arg(args, 0) {
        init @ Value::Function(_) => interp.call(&init, Value::Undefined, &[])?,
        value => value,
    };
    Ok(Value::array(vec![
        initial,
        Value::native("setState", ignored_update),
    ]))
}

fn use_reducer(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    let initial = match args.get(2) {
        Some(init) if init.is_callable() => interp.call(init, Value::Undefined, &[arg(args, 1)])?,
        _ => arg(args, 1),
    };
    Ok(Value::array(vec![
        initial,
        Value::native("dispatch", ignored_update),
    ]))
}

fn use_effect(interp: &mut Interpreter, _: &Value, _: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    interp.render.deferred_effects += 1;
    Ok(Value::Undefined)
}

fn use_memo(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    interp.call(&arg(args, 0), Value::Undefined, &[])
}

fn use_callback(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    Ok(arg(args, 0))
}

fn use_ref(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    let mut map = PropertyMap::new();
    map.set("current", arg(args, 0));
    Ok(Value::object(map))
}

fn use_id(interp: &mut Interpreter, _: &Value, _: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    interp.render.next_id += 1;
    Ok(Value::string(&format!(":r{}:", interp.render.next_id)))
}

fn use_transition(interp: &mut Interpreter, _: &Value, _: &[Value]) -> Eval<Value> {
    hook_guard(interp)?;
    Ok(Value::array(vec![
        Value::Bool(false),
        Value::native("startTransition", start_transition),
    ]))
}

fn start_transition(interp: &mut Interpreter, _: &Value, args: &[Value]) -> Eval<Value> {
    interp.call(&arg(args, 0), Value::Undefined, &[])
}

/// Call a component function with `props` while hooks are allowed.
pub(crate) fn render_component(
    interp: &mut Interpreter,
    component: &Rc<Function>,
    props: Value,
) -> Eval<Value> {
    interp.render.rendering += 1;
    let callee = Value::Function(Rc::clone(component));
    let result = match &**component {
        Function::Class(_) => render_class(interp, &callee, props),
        _ => interp.call(&callee, Value::Undefined, &[props]),
    };
    interp.render.rendering -= 1;
    result
}

fn render_class(interp: &mut Interpreter, class: &Value, props: Value) -> Eval<Value> {
    let instance = interp.construct(class, &[props.clone()])?;
    if interp.get_property(&instance, "props")?.is_nullish() {
        interp.set_property(&instance, "props", props)?;
    }
    if interp.get_property(&instance, "componentDidMount")?.is_callable() {
        interp.render.deferred_effects += 1;
    }
    let render = interp.get_property(&instance, "render")?;
    if !render.is_callable() {
        return Err(Interrupt::type_error(format!(
            "{}(...): No `render` method found on the returned component instance",
            interp.get_property(class, "name")?.to_js_string()
        )));
    }
    interp.call(&render, instance, &[])
}
