//! Per-user schema enrichment.
//!
//! [`Enricher::enrich`] produces a copy of a schema decorated for one user:
//! tenant overrides applied, dynamic defaults filled from the user's
//! identity, text localized, and a side table recording whether each field,
//! layout child and action is visible and editable for the given data. The
//! source schema is never modified, and enriching an already enriched copy
//! yields the same result.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use formweave_core::{DataMap, ErrorKind, Field, Schema, SchemaError, Value};
use formweave_i18n::LocalizationResolver;

use crate::condition::{ConditionEvaluator, EvalContext, EvalOptions};
use crate::localize::localize_schema;
use crate::visibility::{FieldConditions, Visibility};

// ──────────────────────────────────────────────
// Users and tenants
// ──────────────────────────────────────────────

/// The caller a schema is enriched for.
pub trait User: Send + Sync {
    fn id(&self) -> &str;
    fn tenant_id(&self) -> Option<&str>;
    fn permissions(&self) -> &[String];
    fn roles(&self) -> &[String];

    fn preferred_locale(&self) -> Option<&str> {
        None
    }

    /// `*` grants every permission.
    fn has_permission(&self, permission: &str) -> bool {
        self.permissions().iter().any(|p| p == permission || p == "*")
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }
}

/// A plain [`User`] value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicUser {
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl BasicUser {
    pub fn new(id: impl Into<String>) -> Self {
        BasicUser {
            id: id.into(),
            ..BasicUser::default()
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

impl User for BasicUser {
    fn id(&self) -> &str {
        &self.id
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn permissions(&self) -> &[String] {
        &self.permissions
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }

    fn preferred_locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}

/// Tenant-specific changes to one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl FieldOverride {
    fn apply(&self, field: &mut Field) {
        if let Some(label) = &self.label {
            field.label.clone_from(label);
        }
        if let Some(required) = self.required {
            field.required = required;
        }
        if let Some(hidden) = self.hidden {
            field.hidden = hidden;
        }
        if let Some(default) = &self.default {
            field.default = Some(default.clone());
        }
        if let Some(placeholder) = &self.placeholder {
            field.placeholder = Some(placeholder.clone());
        }
        if let Some(help) = &self.help {
            field.help = Some(help.clone());
        }
    }
}

/// Everything a tenant changes about one schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldOverride>,
}

/// Source of tenant customizations.
#[async_trait]
pub trait TenantProvider: Send + Sync {
    async fn get_customization(
        &self,
        schema_id: &str,
        tenant_id: &str,
    ) -> Result<Option<TenantCustomization>, SchemaError>;
}

/// Customizations held in memory.
#[derive(Debug, Default)]
pub struct StaticTenantProvider {
    entries: RwLock<HashMap<(String, String), TenantCustomization>>,
}

impl StaticTenantProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, schema_id: &str, tenant_id: &str, customization: TenantCustomization) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((schema_id.to_string(), tenant_id.to_string()), customization);
    }
}

#[async_trait]
impl TenantProvider for StaticTenantProvider {
    async fn get_customization(
        &self,
        schema_id: &str,
        tenant_id: &str,
    ) -> Result<Option<TenantCustomization>, SchemaError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(schema_id.to_string(), tenant_id.to_string()))
            .cloned())
    }
}

// ──────────────────────────────────────────────
// Output
// ──────────────────────────────────────────────

/// Why a field is hidden or not editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Hidden,
    PermissionRequired,
    RoleRequired,
    Condition,
    Disabled,
    Readonly,
}

/// Per-user state of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRuntime {
    pub visible: bool,
    pub editable: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

/// Per-user state of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRuntime {
    pub visible: bool,
    pub enabled: bool,
}

/// A schema copy decorated for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSchema {
    pub schema: Schema,
    pub fields: BTreeMap<String, FieldRuntime>,
    /// Layout child id to visibility.
    pub layout: BTreeMap<String, bool>,
    pub actions: BTreeMap<String, ActionRuntime>,
    pub locale: String,
    /// `ltr` or `rtl`.
    pub direction: String,
}

impl EnrichedSchema {
    pub fn field(&self, name: &str) -> Option<&FieldRuntime> {
        self.fields.get(name)
    }

    /// Names of the fields the user can see, in schema order.
    pub fn visible_fields(&self) -> Vec<&str> {
        self.schema
            .fields
            .iter()
            .filter(|f| self.fields.get(&f.name).is_some_and(|r| r.visible))
            .map(|f| f.name.as_str())
            .collect()
    }
}

// ──────────────────────────────────────────────
// Enricher
// ──────────────────────────────────────────────

const USER_FIELDS: &[&str] = &["created_by", "user_id", "author_id"];
const TENANT_FIELDS: &[&str] = &["tenant_id", "organization_id"];

/// Decorates schemas for individual users.
#[derive(Clone)]
pub struct Enricher {
    evaluator: Arc<ConditionEvaluator>,
    resolver: Option<Arc<LocalizationResolver>>,
    tenants: Option<Arc<dyn TenantProvider>>,
    options: EvalOptions,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher {
    pub fn new() -> Self {
        Enricher {
            evaluator: Arc::new(ConditionEvaluator::new()),
            resolver: None,
            tenants: None,
            options: EvalOptions::default(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Localize enriched copies through `resolver`.
    pub fn with_resolver(mut self, resolver: Arc<LocalizationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_tenant_provider(mut self, provider: Arc<dyn TenantProvider>) -> Self {
        self.tenants = Some(provider);
        self
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Decorate `schema` for `user` against `data`.
    ///
    /// Fails with `permission` when the schema's security settings exclude
    /// the user, and with `tenant` when an isolated schema belongs to a
    /// different tenant.
    pub async fn enrich(
        &self,
        schema: &Schema,
        user: &dyn User,
        data: &DataMap,
    ) -> Result<EnrichedSchema, SchemaError> {
        check_access(schema, user)?;

        let mut copy = schema.clone();
        if let Some(tenant) = user.tenant_id() {
            self.apply_tenant(&mut copy, tenant).await;
        }
        apply_dynamic_defaults(&mut copy, user);

        let locale = user
            .preferred_locale()
            .map(str::to_string)
            .or_else(|| self.resolver.as_ref().map(|r| r.current_locale()))
            .unwrap_or_else(|| "en".to_string());
        let directions = copy.i18n.as_ref().map(|i| &i.direction);
        let direction = match &self.resolver {
            Some(r) => r.direction(&locale, directions),
            None if formweave_i18n::is_rtl(&locale, directions) => "rtl",
            None => "ltr",
        }
        .to_string();
        if let Some(resolver) = &self.resolver {
            localize_schema(&mut copy, &locale, resolver);
        }

        let mut snapshot: DataMap = copy
            .fields
            .iter()
            .filter_map(|f| f.initial_value().map(|v| (f.name.clone(), v.clone())))
            .collect();
        snapshot.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        let ctx = EvalContext::with_options(&snapshot, self.options.clone());

        let fields = copy
            .fields
            .iter()
            .map(|f| (f.name.clone(), self.field_runtime(f, user, &ctx)))
            .collect();
        let layout = copy
            .layout
            .iter()
            .flat_map(|l| l.children())
            .map(|(_, child)| (child.id.clone(), child.is_visible(&self.evaluator, &ctx)))
            .collect();
        let actions = copy
            .actions
            .iter()
            .map(|a| {
                let perms = a.permissions.as_ref();
                let may_view = perms.map_or(true, |p| p.view.iter().all(|x| user.has_permission(x)));
                let may_run = perms.map_or(true, |p| p.execute.iter().all(|x| user.has_permission(x)));
                let visible = may_view && a.is_visible(&self.evaluator, &ctx);
                let enabled = visible && may_run && a.is_enabled(&self.evaluator, &ctx);
                (a.id.clone(), ActionRuntime { visible, enabled })
            })
            .collect();

        log::debug!("enriched schema '{}' for user '{}'", copy.id, user.id());
        Ok(EnrichedSchema {
            schema: copy,
            fields,
            layout,
            actions,
            locale,
            direction,
        })
    }

    /// Enrich the copy inside an earlier result again.
    pub async fn re_enrich(
        &self,
        enriched: &EnrichedSchema,
        user: &dyn User,
        data: &DataMap,
    ) -> Result<EnrichedSchema, SchemaError> {
        self.enrich(&enriched.schema, user, data).await
    }

    async fn apply_tenant(&self, schema: &mut Schema, tenant: &str) {
        let Some(provider) = &self.tenants else {
            return;
        };
        match provider.get_customization(&schema.id, tenant).await {
            Ok(Some(custom)) => {
                if let Some(title) = &custom.title {
                    schema.title.clone_from(title);
                }
                for (name, over) in &custom.fields {
                    match schema.field_mut(name) {
                        Some(field) => over.apply(field),
                        None => log::debug!("tenant '{}' overrides unknown field '{}'", tenant, name),
                    }
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!(
                "tenant customization for '{}' ({}) unavailable: {}",
                schema.id,
                tenant,
                e
            ),
        }
    }

    fn field_runtime(&self, field: &Field, user: &dyn User, ctx: &EvalContext<'_>) -> FieldRuntime {
        let hidden_by = if field.hidden {
            Some(Reason::Hidden)
        } else if field
            .require_permission
            .as_deref()
            .is_some_and(|p| !user.has_permission(p))
        {
            Some(Reason::PermissionRequired)
        } else if !field.require_roles.is_empty()
            && !field.require_roles.iter().any(|r| user.has_role(r))
        {
            Some(Reason::RoleRequired)
        } else if !field.is_visible(&self.evaluator, ctx) {
            Some(Reason::Condition)
        } else {
            None
        };
        if hidden_by.is_some() {
            return FieldRuntime {
                visible: false,
                editable: false,
                required: false,
                reason: hidden_by,
            };
        }

        let locked_by = if !field.is_enabled(&self.evaluator, ctx) {
            Some(Reason::Disabled)
        } else if field.is_readonly(&self.evaluator, ctx) {
            Some(Reason::Readonly)
        } else {
            None
        };
        FieldRuntime {
            visible: true,
            editable: locked_by.is_none(),
            required: field.is_required(&self.evaluator, ctx),
            reason: locked_by,
        }
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("localizes", &self.resolver.is_some())
            .field("tenants", &self.tenants.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Whether `user` may see `schema` at all: security settings, then tenant
/// isolation.
pub fn check_access(schema: &Schema, user: &dyn User) -> Result<(), SchemaError> {
    if let Some(security) = &schema.security {
        if let Some(p) = &security.required_permission {
            if !user.has_permission(p) {
                return Err(SchemaError::permission(format!(
                    "permission '{}' required for schema '{}'",
                    p, schema.id
                )));
            }
        }
        if !security.allowed_roles.is_empty()
            && !security.allowed_roles.iter().any(|r| user.has_role(r))
        {
            return Err(SchemaError::permission(format!(
                "no allowed role for schema '{}'",
                schema.id
            )));
        }
    }
    if let (Some(owner), true) = (
        schema.tenant_id(),
        schema.tenant.as_ref().is_some_and(|t| t.isolation),
    ) {
        if user.tenant_id() != Some(owner) {
            return Err(SchemaError::new(
                ErrorKind::Tenant,
                format!("schema '{}' belongs to another tenant", schema.id),
            )
            .with_code("tenant_mismatch"));
        }
    }
    Ok(())
}

/// Fill identity fields that have neither a value nor a default.
fn apply_dynamic_defaults(schema: &mut Schema, user: &dyn User) {
    for field in &mut schema.fields {
        let name = field.name.as_str();
        let fill = if USER_FIELDS.contains(&name) {
            Some(user.id().to_string())
        } else if TENANT_FIELDS.contains(&name) {
            user.tenant_id().map(str::to_string)
        } else {
            None
        };
        if let Some(v) = fill.filter(|_| field.initial_value().is_none()) {
            field.default = Some(Value::String(v));
        }
        if name == "tenant_id" {
            field.hidden = true;
            field.readonly = true;
        }
    }
}
