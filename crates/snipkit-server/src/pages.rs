//! HTML pages.

use minijinja::{context, Environment};
use serde::Serialize;
use snipkit_render::RenderState;

/// What the preview page shows about a component.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewPage {
    pub title: String,
    pub framework: String,
    pub state: String,
    pub body: String,
}

impl PreviewPage {
    pub fn new(title: impl Into<String>, framework: impl Into<String>, state: &RenderState) -> Self {
        Self {
            title: title.into(),
            framework: framework.into(),
            state: state.label().to_string(),
            body: state.to_html(),
        }
    }
}

/// minijinja environment holding the page templates.
pub struct PageRenderer {
    env: Environment<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("base.html", BASE_TEMPLATE)?;
        env.add_template("preview.html", PREVIEW_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn preview(&self, page: &PreviewPage) -> Result<String, minijinja::Error> {
        self.env.get_template("preview.html")?.render(context! {
            title => &page.title,
            framework => &page.framework,
            state => &page.state,
            body => &page.body,
        })
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }} - snipkit</title>
  <script src="https://cdn.tailwindcss.com"></script>
  <style>
    .snipkit-error { color: #b91c1c; background: #fef2f2; border: 1px solid #fecaca; padding: 0.75rem 1rem; border-radius: 0.5rem; font-family: ui-monospace, monospace; white-space: pre-wrap; }
    .snipkit-loading { color: #6b7280; }
  </style>
</head>
<body class="min-h-screen bg-white">
  {% block content %}{% endblock %}
</body>
</html>"##;

const PREVIEW_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<main class="p-6" data-framework="{{ framework }}" data-state="{{ state }}">
  {{ body | safe }}
</main>
{% endblock %}"##;

#[cfg(test)]
mod tests {
    use super::*;
    use snipkit_render::{FailureKind, RenderFailure};

    #[test]
    fn escapes_title_and_embeds_body() {
        let pages = PageRenderer::new().unwrap();
        let state = RenderState::Failed(RenderFailure {
            kind: FailureKind::Evaluation,
            message: "<boom>".to_string(),
        });
        let html = pages
            .preview(&PreviewPage::new("<Card>", "react", &state))
            .unwrap();

        assert!(html.contains("<title>&lt;Card&gt; - snipkit</title>"));
        assert!(html.contains(r#"data-state="failed""#));
        assert!(html.contains(r#"<div class="snipkit-error" role="alert">Error: &lt;boom&gt;</div>"#));
    }
}
