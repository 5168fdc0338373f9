use crate::builder::{ActionBuilder, FieldBuilder, LayoutBuilder};
use crate::error::{SchemaError, SchemaErrors};
use crate::model::{
    Action, Field, Layout, Schema, SchemaI18n, SchemaType, SecurityConfig, TenantConfig, Workflow,
};
use crate::validate::Validate;

/// Fluent constructor for [`Schema`].
///
/// Nested builders are materialized as they are added; their defects join
/// this builder's error list and the nested value is dropped, so `build`
/// reports everything at once and never returns a partial schema.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
    errors: Vec<SchemaError>,
}

impl SchemaBuilder {
    pub fn new(id: impl Into<String>, schema_type: SchemaType) -> Self {
        SchemaBuilder {
            schema: Schema::new(id, schema_type, ""),
            errors: Vec::new(),
        }
    }

    pub fn form(id: impl Into<String>) -> Self {
        SchemaBuilder::new(id, SchemaType::Form)
    }

    pub fn wizard(id: impl Into<String>) -> Self {
        SchemaBuilder::new(id, SchemaType::Wizard)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.schema.title = title.into();
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.schema.description = Some(text.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.schema.version = version.into();
        self
    }

    pub fn field(mut self, builder: FieldBuilder) -> Self {
        match builder.build() {
            Ok(field) => self.schema.fields.push(field),
            Err(errors) => self.errors.extend(errors),
        }
        self
    }

    /// Add an already-materialized field; it is validated at `build`.
    pub fn add_field(mut self, field: Field) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn action(mut self, builder: ActionBuilder) -> Self {
        match builder.build() {
            Ok(action) => self.schema.actions.push(action),
            Err(errors) => self.errors.extend(errors),
        }
        self
    }

    pub fn add_action(mut self, action: Action) -> Self {
        self.schema.actions.push(action);
        self
    }

    pub fn layout(mut self, builder: LayoutBuilder) -> Self {
        match builder.build() {
            Ok(layout) => self.schema.layout = Some(layout),
            Err(errors) => self.errors.extend(errors),
        }
        self
    }

    pub fn set_layout(mut self, layout: Layout) -> Self {
        self.schema.layout = Some(layout);
        self
    }

    pub fn workflow(mut self, workflow: Workflow) -> Self {
        self.schema.workflow = Some(workflow);
        self
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.schema.security = Some(security);
        self
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>, isolation: bool) -> Self {
        self.schema.tenant = Some(TenantConfig {
            tenant_id: Some(tenant_id.into()),
            isolation,
        });
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.schema.tags.contains(&tag) {
            self.schema.tags.push(tag);
        }
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.schema.category = Some(category.into());
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.schema.module = Some(module.into());
        self
    }

    fn i18n(&mut self) -> &mut SchemaI18n {
        self.schema.i18n.get_or_insert_with(SchemaI18n::default)
    }

    pub fn i18n_title(mut self, locale: impl Into<String>, title: impl Into<String>) -> Self {
        self.i18n().title.insert(locale.into(), title.into());
        self
    }

    /// Declare the text direction (`rtl` or `ltr`) for a locale.
    pub fn direction(mut self, locale: impl Into<String>, direction: impl Into<String>) -> Self {
        let direction = direction.into();
        if direction != "rtl" && direction != "ltr" {
            self.errors.push(SchemaError::validation(format!(
                "text direction must be 'rtl' or 'ltr', got '{}'",
                direction
            )));
            return self;
        }
        self.i18n().direction.insert(locale.into(), direction);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaErrors> {
        let mut errors = self.errors;
        errors.extend(self.schema.validate());
        if errors.is_empty() {
            Ok(self.schema)
        } else {
            Err(SchemaErrors(errors))
        }
    }

    /// # Panics
    ///
    /// Panics with the combined error when the schema is invalid.
    #[track_caller]
    pub fn must_build(self) -> Schema {
        match self.build() {
            Ok(schema) => schema,
            Err(errors) => panic!("invalid schema: {}", errors),
        }
    }
}
