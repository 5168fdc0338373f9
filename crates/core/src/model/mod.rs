//! Typed descriptors for schemas, fields, actions and layouts.

pub mod action;
pub mod condition;
pub mod field;
pub mod layout;
pub mod schema;

pub use action::{
    Action, ActionBehavior, ActionConfirm, ActionPermissions, ActionSize, ActionType,
    ActionVariant,
};
pub use condition::{
    CompareOp, Condition, ConditionGroup, ConditionNode, Conditional, LogicOp, VisibilityRule,
};
pub use field::{
    DataSource, DataSourceKind, Field, FieldI18n, FieldLayout, FieldOption, FieldType,
    FieldValidation, FileRules, StringFormat, Style, Transform,
};
pub use layout::{ChildKind, Direction, Group, Layout, LayoutChild, LayoutType, Section, Step, Tab};
pub use schema::{
    Schema, SchemaI18n, SchemaMeta, SchemaType, SecurityConfig, TenantConfig, Workflow,
    WorkflowStage,
};
