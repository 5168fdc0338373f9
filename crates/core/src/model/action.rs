//! Action descriptors (buttons and other user-triggered operations).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::condition::VisibilityRule;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Submit,
    Reset,
    Button,
    Link,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVariant {
    Primary,
    Secondary,
    Danger,
    Warning,
    Success,
    Outline,
    Ghost,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSize {
    Small,
    Medium,
    Large,
}

/// What happens when the action fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBehavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Identifier of a host-side handler, required for custom actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Confirmation dialog shown before the action runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfirm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<ActionVariant>,
}

/// Permissions gating an action: `view` hides it, `execute` disables it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPermissions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub view: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execute: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<ActionVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ActionSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<ActionBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ActionConfirm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ActionPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<VisibilityRule>,
    /// Per-locale text overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub i18n: BTreeMap<String, String>,
}

impl Action {
    pub fn new(id: impl Into<String>, action_type: ActionType, text: impl Into<String>) -> Self {
        Action {
            id: id.into(),
            action_type,
            text: text.into(),
            variant: None,
            size: None,
            icon: None,
            disabled: false,
            hidden: false,
            loading: false,
            behavior: None,
            confirm: None,
            permissions: None,
            conditional: None,
            i18n: BTreeMap::new(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.behavior
            .as_ref()
            .and_then(|b| b.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }

    pub fn handler(&self) -> Option<&str> {
        self.behavior
            .as_ref()
            .and_then(|b| b.handler.as_deref())
            .filter(|h| !h.trim().is_empty())
    }
}
