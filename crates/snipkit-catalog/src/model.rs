//! Catalog records and the inputs that create or patch them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frameworks a component can be written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    Vue,
    Angular,
    Svelte,
    Html,
    Nextjs,
}

impl Framework {
    pub const ALL: [Framework; 6] = [
        Self::React,
        Self::Vue,
        Self::Angular,
        Self::Svelte,
        Self::Html,
        Self::Nextjs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::React => "react",
            Self::Vue => "vue",
            Self::Angular => "angular",
            Self::Svelte => "svelte",
            Self::Html => "html",
            Self::Nextjs => "nextjs",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown framework: {0}")]
pub struct UnknownFramework(pub String);

impl FromStr for Framework {
    type Err = UnknownFramework;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|framework| framework.as_str() == tag)
            .ok_or_else(|| UnknownFramework(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub banner_url: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub component_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub framework: Framework,

    /// Source as uploaded
    pub code: String,

    /// Sanitizer output for `code`; this is what previews render
    pub edited_code: String,

    pub screenshot_url: Option<String>,
    pub is_public: bool,
    pub is_for_sale: bool,
    pub price: Option<f64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    /// Key assigned by the identity provider
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub is_premium: bool,
    pub followers: Vec<String>,
    pub following: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub banner_url: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDraft {
    pub project_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub framework: Framework,
    pub code: String,
    #[serde(default)]
    pub screenshot_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_for_sale: bool,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Metadata changes to a component. Source code is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub framework: Option<Framework>,
    pub screenshot_url: Option<String>,
    pub is_public: Option<bool>,
    pub is_for_sale: Option<bool>,
    pub price: Option<f64>,
    pub tags: Option<Vec<String>>,
}

/// Gallery query over public components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentFilter {
    pub framework: Option<Framework>,
    pub for_sale: Option<bool>,
    pub limit: Option<usize>,
}

impl ComponentFilter {
    pub fn matches(&self, component: &Component) -> bool {
        self.framework.is_none_or(|f| component.framework == f)
            && self.for_sale.is_none_or(|s| component.is_for_sale == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
}

/// Trim tags, drop empty ones and remove duplicates, keeping first-seen order.
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn framework_parses_known_tags() {
        assert_eq!("react".parse::<Framework>(), Ok(Framework::React));
        assert_eq!(" NextJS ".parse::<Framework>(), Ok(Framework::Nextjs));
        assert_eq!(
            "solid".parse::<Framework>(),
            Err(UnknownFramework("solid".to_string()))
        );
    }

    #[test]
    fn framework_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Framework::Svelte).unwrap(), json!("svelte"));
        assert!(serde_json::from_value::<Framework>(json!("jquery")).is_err());
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags(
            [" card ", "ui", "", "card", "  ", "Card"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(tags, vec!["card", "ui", "Card"]);
    }

    #[test]
    fn component_draft_uses_camel_case() {
        let draft: ComponentDraft = serde_json::from_value(json!({
            "projectId": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
            "name": "Button",
            "framework": "react",
            "code": "<button/>",
            "isForSale": true,
            "price": 5.0
        }))
        .unwrap();
        assert!(draft.is_for_sale);
        assert_eq!(draft.price, Some(5.0));
        assert!(draft.tags.is_empty());
        assert!(!draft.is_public);
    }

    #[test]
    fn filter_matches_framework_and_sale_flag() {
        let filter = ComponentFilter {
            framework: Some(Framework::Vue),
            for_sale: Some(false),
            limit: None,
        };
        let now = Utc::now();
        let mut component = Component {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            user_id: "u".to_string(),
            name: "n".to_string(),
            description: None,
            framework: Framework::Vue,
            code: String::new(),
            edited_code: String::new(),
            screenshot_url: None,
            is_public: true,
            is_for_sale: false,
            price: None,
            tags: vec![],
            created_at: now,
            updated_at: now,
        };
        assert!(filter.matches(&component));
        component.is_for_sale = true;
        assert!(!filter.matches(&component));
        assert!(ComponentFilter::default().matches(&component));
    }
}
