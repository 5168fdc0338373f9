//! Visual arrangement of fields.

use serde::{Deserialize, Serialize};

use crate::model::condition::VisibilityRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    Grid,
    Flex,
    Tabs,
    Steps,
    Sections,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Row,
    Column,
}

/// Which composite list a child belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Section,
    Group,
    Tab,
    Step,
}

impl ChildKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Section => "section",
            ChildKind::Group => "group",
            ChildKind::Tab => "tab",
            ChildKind::Step => "step",
        }
    }
}

/// A section, group, tab or step: an ordered bundle of field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutChild {
    pub id: String,
    #[serde(default, alias = "label", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collapsible: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<VisibilityRule>,
}

pub type Section = LayoutChild;
pub type Group = LayoutChild;
pub type Tab = LayoutChild;
pub type Step = LayoutChild;

impl LayoutChild {
    pub fn new<I, S>(id: impl Into<String>, title: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LayoutChild {
            id: id.into(),
            title: Some(title.into()),
            fields: fields.into_iter().map(Into::into).collect(),
            ..LayoutChild::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrap: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<Tab>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl Layout {
    pub fn new(layout_type: LayoutType) -> Self {
        Layout {
            layout_type,
            columns: None,
            gap: None,
            direction: None,
            wrap: false,
            sections: Vec::new(),
            groups: Vec::new(),
            tabs: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Every child across sections, groups, tabs and steps, in that order.
    pub fn children(&self) -> impl Iterator<Item = (ChildKind, &LayoutChild)> {
        self.sections
            .iter()
            .map(|c| (ChildKind::Section, c))
            .chain(self.groups.iter().map(|c| (ChildKind::Group, c)))
            .chain(self.tabs.iter().map(|c| (ChildKind::Tab, c)))
            .chain(self.steps.iter().map(|c| (ChildKind::Step, c)))
    }

    /// Every field name referenced by any child.
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.children()
            .flat_map(|(_, c)| c.fields.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.children().next().is_none()
    }

    /// Steps sorted by their declared order.
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }
}
