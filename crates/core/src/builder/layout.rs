use std::collections::BTreeSet;

use crate::error::{SchemaError, SchemaErrors};
use crate::model::{ConditionGroup, Direction, Layout, LayoutChild, LayoutType, VisibilityRule};
use crate::validate::{unresolved_layout_refs, Validate};

/// Fluent constructor for [`Layout`].
///
/// Field references are checked against the owning schema when the layout
/// is handed to a [`SchemaBuilder`](crate::builder::SchemaBuilder), or
/// against [`known_fields`](Self::known_fields) when given.
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    layout: Layout,
    known: Option<BTreeSet<String>>,
    errors: Vec<SchemaError>,
}

impl LayoutBuilder {
    pub fn new(layout_type: LayoutType) -> Self {
        LayoutBuilder {
            layout: Layout::new(layout_type),
            known: None,
            errors: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: u32) -> Self {
        self.layout.columns = Some(columns);
        self
    }

    pub fn gap(mut self, gap: impl Into<String>) -> Self {
        self.layout.gap = Some(gap.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.layout.direction = Some(direction);
        self
    }

    pub fn wrap(mut self) -> Self {
        self.layout.wrap = true;
        self
    }

    fn child<I, S>(id: impl Into<String>, title: impl Into<String>, fields: I, order: i32) -> LayoutChild
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LayoutChild {
            order,
            ..LayoutChild::new(id, title, fields)
        }
    }

    pub fn section<I, S>(mut self, id: impl Into<String>, title: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = self.layout.sections.len() as i32;
        self.layout.sections.push(Self::child(id, title, fields, order));
        self
    }

    pub fn group<I, S>(mut self, id: impl Into<String>, label: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = self.layout.groups.len() as i32;
        self.layout.groups.push(Self::child(id, label, fields, order));
        self
    }

    pub fn tab<I, S>(mut self, id: impl Into<String>, label: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = self.layout.tabs.len() as i32;
        self.layout.tabs.push(Self::child(id, label, fields, order));
        self
    }

    pub fn step<I, S>(mut self, id: impl Into<String>, title: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = self.layout.steps.len() as i32;
        self.layout.steps.push(Self::child(id, title, fields, order));
        self
    }

    /// Attach a show clause to the most recently added child with `id`.
    pub fn show_child_when(mut self, id: &str, group: ConditionGroup) -> Self {
        let target = self
            .layout
            .sections
            .iter_mut()
            .chain(self.layout.groups.iter_mut())
            .chain(self.layout.tabs.iter_mut())
            .chain(self.layout.steps.iter_mut())
            .rev()
            .find(|c| c.id == id);
        match target {
            Some(child) => {
                child
                    .conditional
                    .get_or_insert_with(VisibilityRule::default)
                    .show = Some(group);
            }
            None => self.errors.push(SchemaError::validation(format!(
                "no layout child '{}' to attach a condition to",
                id
            ))),
        }
        self
    }

    /// Check field references against `names` at build time.
    pub fn known_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<Layout, SchemaErrors> {
        let mut errors = self.errors;
        errors.extend(self.layout.validate());
        if let Some(known) = &self.known {
            let known: BTreeSet<&str> = known.iter().map(String::as_str).collect();
            errors.extend(unresolved_layout_refs(&self.layout, &known));
        }
        if errors.is_empty() {
            Ok(self.layout)
        } else {
            Err(SchemaErrors(errors))
        }
    }

    /// # Panics
    ///
    /// Panics with the combined error when the layout is invalid.
    #[track_caller]
    pub fn must_build(self) -> Layout {
        match self.build() {
            Ok(layout) => layout,
            Err(errors) => panic!("invalid layout: {}", errors),
        }
    }
}
