//! Visibility and enablement of fields, layout children and actions.

use serde::{Deserialize, Serialize};

use formweave_core::{Action, ConditionGroup, Conditional, Field, LayoutChild, VisibilityRule};

use crate::condition::{ConditionEvaluator, EvalContext};

/// Capability shared by everything a renderer may show or grey out.
pub trait Visibility {
    fn is_visible(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool;
    fn is_enabled(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool;
}

/// Field-only conditional state.
pub trait FieldConditions: Visibility {
    fn is_required(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool;
    fn is_readonly(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool;
}

/// `(no show ∨ show) ∧ ¬(hide present ∧ hide)`.
fn shown(
    show: Option<&ConditionGroup>,
    hide: Option<&ConditionGroup>,
    evaluator: &ConditionEvaluator,
    ctx: &EvalContext<'_>,
) -> bool {
    evaluator.holds(show, ctx, true) && !evaluator.holds(hide, ctx, false)
}

impl Visibility for Field {
    fn is_visible(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
        if self.hidden {
            return false;
        }
        let c = self.conditional.as_ref();
        shown(
            c.and_then(|c| c.show.as_ref()),
            c.and_then(|c| c.hide.as_ref()),
            evaluator,
            ctx,
        )
    }

    fn is_enabled(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
        !self.disabled
            && !evaluator.holds(
                self.conditional.as_ref().and_then(|c| c.disabled.as_ref()),
                ctx,
                false,
            )
    }
}

impl FieldConditions for Field {
    fn is_required(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
        self.required || clause(&self.conditional, |c| c.required.as_ref(), evaluator, ctx)
    }

    fn is_readonly(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
        self.readonly || clause(&self.conditional, |c| c.readonly.as_ref(), evaluator, ctx)
    }
}

fn clause<F>(
    conditional: &Option<Conditional>,
    pick: F,
    evaluator: &ConditionEvaluator,
    ctx: &EvalContext<'_>,
) -> bool
where
    F: Fn(&Conditional) -> Option<&ConditionGroup>,
{
    evaluator.holds(conditional.as_ref().and_then(pick), ctx, false)
}

fn rule_shown(rule: Option<&VisibilityRule>, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
    shown(
        rule.and_then(|r| r.show.as_ref()),
        rule.and_then(|r| r.hide.as_ref()),
        evaluator,
        ctx,
    )
}

impl Visibility for LayoutChild {
    fn is_visible(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
        rule_shown(self.conditional.as_ref(), evaluator, ctx)
    }

    /// Layout children have no disable source.
    fn is_enabled(&self, _: &ConditionEvaluator, _: &EvalContext<'_>) -> bool {
        true
    }
}

impl Visibility for Action {
    fn is_visible(&self, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> bool {
        !self.hidden && rule_shown(self.conditional.as_ref(), evaluator, ctx)
    }

    fn is_enabled(&self, _: &ConditionEvaluator, _: &EvalContext<'_>) -> bool {
        !self.disabled && !self.loading
    }
}

/// Conditional state of one field for one data snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    pub visible: bool,
    pub enabled: bool,
    pub required: bool,
    pub readonly: bool,
}

impl Default for FieldState {
    fn default() -> Self {
        FieldState {
            visible: true,
            enabled: true,
            required: false,
            readonly: false,
        }
    }
}

impl FieldState {
    pub fn of(field: &Field, evaluator: &ConditionEvaluator, ctx: &EvalContext<'_>) -> Self {
        FieldState {
            visible: field.is_visible(evaluator, ctx),
            enabled: field.is_enabled(evaluator, ctx),
            required: field.is_required(evaluator, ctx),
            readonly: field.is_readonly(evaluator, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formweave_core::{CompareOp, DataMap, FieldType, Value};

    fn with_conditional(conditional: Conditional) -> Field {
        let mut f = Field::new("spouse_name", FieldType::Text, "Spouse name");
        f.conditional = Some(conditional);
        f
    }

    fn data(marital: &str) -> DataMap {
        let mut d = DataMap::new();
        d.insert("marital".into(), Value::from(marital));
        d
    }

    #[test]
    fn show_clause_drives_visibility() {
        let f = with_conditional(Conditional {
            show: Some(ConditionGroup::when("marital", CompareOp::Eq, "married")),
            ..Conditional::default()
        });
        let ev = ConditionEvaluator::new();
        assert!(!f.is_visible(&ev, &EvalContext::new(&data("single"))));
        assert!(f.is_visible(&ev, &EvalContext::new(&data("married"))));
    }

    #[test]
    fn hide_wins_over_show() {
        let f = with_conditional(Conditional {
            show: Some(ConditionGroup::when("marital", CompareOp::NotEmpty, Value::Null)),
            hide: Some(ConditionGroup::when("marital", CompareOp::Eq, "single")),
            ..Conditional::default()
        });
        let ev = ConditionEvaluator::new();
        assert!(!f.is_visible(&ev, &EvalContext::new(&data("single"))));
        assert!(f.is_visible(&ev, &EvalContext::new(&data("married"))));
    }

    #[test]
    fn broken_clause_reads_as_false() {
        let f = with_conditional(Conditional {
            hide: Some(ConditionGroup::when("marital", CompareOp::Unknown("~~".into()), 1)),
            required: Some(ConditionGroup::when("marital", CompareOp::Eq, "single")),
            ..Conditional::default()
        });
        let ev = ConditionEvaluator::new();
        let ctx_data = data("single");
        let ctx = EvalContext::new(&ctx_data);
        let state = FieldState::of(&f, &ev, &ctx);
        assert!(state.visible);
        assert!(state.enabled);
        assert!(state.required);
        assert!(!state.readonly);
    }

    #[test]
    fn actions_respect_flags_and_rules() {
        let mut a = Action::new("save", formweave_core::ActionType::Submit, "Save");
        let ev = ConditionEvaluator::new();
        let d = DataMap::new();
        let ctx = EvalContext::new(&d);
        assert!(a.is_visible(&ev, &ctx) && a.is_enabled(&ev, &ctx));
        a.conditional = Some(VisibilityRule {
            show: Some(ConditionGroup::when("ready", CompareOp::Eq, true)),
            hide: None,
        });
        a.loading = true;
        assert!(!a.is_visible(&ev, &ctx));
        assert!(!a.is_enabled(&ev, &ctx));
    }
}
