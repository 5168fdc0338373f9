use crate::error::{SchemaError, SchemaErrors};
use crate::model::{
    Action, ActionBehavior, ActionConfirm, ActionPermissions, ActionSize, ActionType,
    ActionVariant, ConditionGroup, VisibilityRule,
};
use crate::validate::Validate;
use crate::value::Value;

/// Fluent constructor for [`Action`].
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    action: Action,
    errors: Vec<SchemaError>,
}

impl ActionBuilder {
    pub fn new(id: impl Into<String>, action_type: ActionType, text: impl Into<String>) -> Self {
        ActionBuilder {
            action: Action::new(id, action_type, text),
            errors: Vec::new(),
        }
    }

    pub fn submit(id: impl Into<String>, text: impl Into<String>) -> Self {
        ActionBuilder::new(id, ActionType::Submit, text).variant(ActionVariant::Primary)
    }

    pub fn reset(id: impl Into<String>, text: impl Into<String>) -> Self {
        ActionBuilder::new(id, ActionType::Reset, text)
    }

    pub fn link(id: impl Into<String>, text: impl Into<String>, url: impl Into<String>) -> Self {
        ActionBuilder::new(id, ActionType::Link, text).url(url)
    }

    fn behavior(&mut self) -> &mut ActionBehavior {
        self.action.behavior.get_or_insert_with(ActionBehavior::default)
    }

    fn permissions(&mut self) -> &mut ActionPermissions {
        self.action
            .permissions
            .get_or_insert_with(ActionPermissions::default)
    }

    pub fn variant(mut self, variant: ActionVariant) -> Self {
        self.action.variant = Some(variant);
        self
    }

    pub fn size(mut self, size: ActionSize) -> Self {
        self.action.size = Some(size);
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.action.icon = Some(icon.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.action.disabled = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.action.hidden = true;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.behavior().url = Some(url.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.behavior().target = Some(target.into());
        self
    }

    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.behavior().handler = Some(handler.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        let method = method.into().to_ascii_uppercase();
        if !matches!(method.as_str(), "GET" | "POST" | "PUT" | "PATCH" | "DELETE") {
            self.errors.push(
                SchemaError::validation(format!("unsupported HTTP method '{}'", method))
                    .with_detail("action", self.action.id.clone()),
            );
            return self;
        }
        self.behavior().method = Some(method);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.behavior().params.insert(key.into(), value.into());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.behavior().debounce_ms = Some(ms);
        self
    }

    pub fn success_message(mut self, text: impl Into<String>) -> Self {
        self.behavior().success_message = Some(text.into());
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.behavior().redirect_url = Some(url.into());
        self
    }

    /// Ask for confirmation with `message` before running.
    pub fn confirm(mut self, message: impl Into<String>) -> Self {
        self.action.confirm = Some(ActionConfirm {
            message: message.into(),
            ..ActionConfirm::default()
        });
        self
    }

    pub fn confirm_with(mut self, confirm: ActionConfirm) -> Self {
        self.action.confirm = Some(confirm);
        self
    }

    pub fn require_view(mut self, permission: impl Into<String>) -> Self {
        self.permissions().view.push(permission.into());
        self
    }

    pub fn require_execute(mut self, permission: impl Into<String>) -> Self {
        self.permissions().execute.push(permission.into());
        self
    }

    pub fn show_when(mut self, group: ConditionGroup) -> Self {
        self.action
            .conditional
            .get_or_insert_with(VisibilityRule::default)
            .show = Some(group);
        self
    }

    pub fn hide_when(mut self, group: ConditionGroup) -> Self {
        self.action
            .conditional
            .get_or_insert_with(VisibilityRule::default)
            .hide = Some(group);
        self
    }

    pub fn i18n_text(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.action.i18n.insert(locale.into(), text.into());
        self
    }

    pub fn build(self) -> Result<Action, SchemaErrors> {
        let mut errors = self.errors;
        errors.extend(self.action.validate());
        if errors.is_empty() {
            Ok(self.action)
        } else {
            Err(SchemaErrors(errors))
        }
    }

    /// # Panics
    ///
    /// Panics with the combined error when the action is invalid.
    #[track_caller]
    pub fn must_build(self) -> Action {
        match self.build() {
            Ok(action) => action,
            Err(errors) => panic!("invalid action: {}", errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_carries_url() {
        let a = ActionBuilder::link("docs", "Docs", "https://example.com")
            .target("_blank")
            .build()
            .unwrap();
        assert_eq!(a.url(), Some("https://example.com"));
    }

    #[test]
    fn custom_without_handler_and_bad_method_fail_together() {
        let errs = ActionBuilder::new("run", ActionType::Custom, "Run")
            .method("teleport")
            .build()
            .unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs.mentions("unsupported HTTP method 'TELEPORT'"));
        assert!(errs.mentions("custom action requires a handler"));
    }

    #[test]
    fn confirm_requires_message() {
        let errs = ActionBuilder::submit("del", "Delete")
            .confirm("")
            .build()
            .unwrap_err();
        assert!(errs.mentions("confirmation requires a message"));
    }
}
