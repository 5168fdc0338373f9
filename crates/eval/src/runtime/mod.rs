//! Live form sessions.
//!
//! A [`Runtime`] owns the mutable state of one form session: values, dirty
//! and touched sets, per-field errors, submission status and the current
//! wizard step or tab. The schema itself is shared and never modified.
//!
//! Field validation after a change is debounced per field. Every change
//! bumps the field's generation; a scheduled validation whose generation is
//! no longer current is dropped before it runs, and a result that arrives
//! after a newer change is discarded. Validations of the same field are
//! serialized and each one sees a consistent snapshot of all values.

mod state;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::Notify;

use formweave_core::graph::dependents_map;
use formweave_core::{
    cancellable, CancellationToken, DataMap, ErrorKind, Event, EventBus, EventKind, Field,
    Schema, SchemaError, Value,
};

use crate::condition::EvalContext;
use crate::validation::{FieldReport, FieldValidator, ValidationResult};
use crate::visibility::{FieldState, Visibility};

pub use state::{RuntimeConfig, RuntimeState, RuntimeStats, SubmissionStatus, ValidationMode};

/// Handle to a form session. Clones share the same session.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

struct Inner {
    schema: Arc<Schema>,
    config: RuntimeConfig,
    validator: FieldValidator,
    bus: Arc<EventBus>,
    state: RwLock<RuntimeState>,
    field_locks: HashMap<String, tokio::sync::Mutex<()>>,
    debounces: Mutex<HashMap<String, CancellationToken>>,
    shutdown: CancellationToken,
    idle: Notify,
    /// Field name to the fields whose state or validity depend on it.
    watchers: BTreeMap<String, BTreeSet<String>>,
    changes: AtomicU64,
    validations: AtomicU64,
    discarded: AtomicU64,
    submissions: AtomicU64,
}

impl Inner {
    fn all_field_names(&self) -> Vec<String> {
        self.schema.fields.iter().map(|f| f.name.clone()).collect()
    }
}

// ──────────────────────────────────────────────
// Construction
// ──────────────────────────────────────────────

/// Assembles a [`Runtime`].
pub struct RuntimeBuilder {
    schema: Arc<Schema>,
    config: RuntimeConfig,
    validator: Option<FieldValidator>,
    bus: Option<Arc<EventBus>>,
    initial: DataMap,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn validator(mut self, validator: FieldValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Values that override field defaults and count as the initial state.
    pub fn initial_data(mut self, data: DataMap) -> Self {
        self.initial = data;
        self
    }

    pub fn build(self) -> Runtime {
        let schema = self.schema;
        let mut validator = self.validator.unwrap_or_default();
        if let Some(locale) = &self.config.locale {
            validator = validator.with_locale(locale.clone());
        }

        let mut initial: DataMap = schema
            .fields
            .iter()
            .filter_map(|f| f.initial_value().map(|v| (f.name.clone(), v.clone())))
            .collect();
        initial.extend(self.initial);

        let mut watchers: BTreeMap<String, BTreeSet<String>> = dependents_map(&schema.fields)
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();
        for field in &schema.fields {
            for name in condition_refs(field) {
                watchers
                    .entry(name)
                    .or_default()
                    .insert(field.name.clone());
            }
        }

        let state = RuntimeState {
            values: initial.clone(),
            initial,
            current_tab: schema
                .layout
                .as_ref()
                .and_then(|l| l.tabs.first())
                .map(|t| t.id.clone()),
            ..RuntimeState::default()
        };

        let runtime = Runtime {
            inner: Arc::new(Inner {
                field_locks: schema
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), tokio::sync::Mutex::new(())))
                    .collect(),
                schema,
                config: self.config,
                validator,
                bus: self.bus.unwrap_or_else(|| Arc::new(EventBus::default())),
                state: RwLock::new(state),
                debounces: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                idle: Notify::new(),
                watchers,
                changes: AtomicU64::new(0),
                validations: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                submissions: AtomicU64::new(0),
            }),
        };
        {
            let mut state = runtime.write();
            runtime.refresh_states(&mut state, runtime.inner.all_field_names());
        }
        runtime
    }
}

fn condition_refs(field: &Field) -> Vec<String> {
    let Some(c) = &field.conditional else {
        return Vec::new();
    };
    [&c.show, &c.hide, &c.required, &c.disabled, &c.readonly]
        .into_iter()
        .flatten()
        .flat_map(|g| g.referenced_fields())
        .filter(|name| *name != field.name)
        .map(|name| name.split('.').next().unwrap_or(name).to_string())
        .collect()
}

// ──────────────────────────────────────────────
// Events from the form
// ──────────────────────────────────────────────

impl Runtime {
    pub fn builder(schema: impl Into<Arc<Schema>>) -> RuntimeBuilder {
        RuntimeBuilder {
            schema: schema.into(),
            config: RuntimeConfig::default(),
            validator: None,
            bus: None,
            initial: DataMap::new(),
        }
    }

    pub fn new(schema: impl Into<Arc<Schema>>, config: RuntimeConfig) -> Self {
        Runtime::builder(schema).config(config).build()
    }

    /// Store a new value for `name` and react according to the validation mode.
    pub async fn handle_change(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), SchemaError> {
        let field = self.field(name)?;
        let value = field.transform_value(value.into());
        let validate = self.inner.config.mode == ValidationMode::OnChange;

        let gen = {
            let mut state = self.write();
            state.values.insert(name.to_string(), value.clone());
            state.refresh_dirty(name);
            let gen = state.bump(name);
            let affected = self.affected_by(name);
            self.refresh_states(&mut state, affected);
            if validate {
                state.pending.insert(name.to_string());
            } else {
                // A blur validation still running for the old value is now stale.
                state.pending.remove(name);
            }
            gen
        };
        self.inner.changes.fetch_add(1, Ordering::Relaxed);
        if !validate {
            self.inner.idle.notify_waiters();
        }
        self.emit(EventKind::FieldChange, Some(name), value);

        if validate {
            let delay = field
                .debounce_ms
                .unwrap_or(self.inner.config.default_debounce_ms);
            if delay == 0 {
                self.cancel_debounce(name);
                self.validate_generation(name, gen).await;
            } else {
                self.schedule(name, gen, Duration::from_millis(delay));
            }
        }
        Ok(())
    }

    /// Mark `name` touched and validate it now unless the mode is on-submit.
    ///
    /// A debounced validation still waiting for `name` is replaced by this one.
    pub async fn handle_blur(&self, name: &str) -> Result<(), SchemaError> {
        self.field(name)?;
        let validate = self.inner.config.mode != ValidationMode::OnSubmit;
        let gen = {
            let mut state = self.write();
            state.touched.insert(name.to_string());
            if validate {
                state.pending.insert(name.to_string());
            }
            state.generation(name)
        };
        self.emit(EventKind::FieldBlur, Some(name), Value::Null);
        if validate {
            self.cancel_debounce(name);
            self.validate_generation(name, gen).await;
        }
        Ok(())
    }

    pub fn handle_focus(&self, name: &str) -> Result<(), SchemaError> {
        self.field(name)?;
        self.emit(EventKind::FieldFocus, Some(name), Value::Null);
        Ok(())
    }

    /// Merge `data` into the current values and validate the whole form.
    pub async fn handle_submit(&self, data: &DataMap) -> Result<ValidationResult, SchemaError> {
        self.handle_submit_with(data, &CancellationToken::new()).await
    }

    /// [`handle_submit`](Self::handle_submit) that gives up when `token` fires.
    ///
    /// Nothing is committed until validation completes; a cancelled submit
    /// leaves values and errors untouched and restores the previous status.
    pub async fn handle_submit_with(
        &self,
        data: &DataMap,
        token: &CancellationToken,
    ) -> Result<ValidationResult, SchemaError> {
        let schema = Arc::clone(&self.inner.schema);
        let (previous, merged) = {
            let mut state = self.write();
            let previous = state.status;
            state.status = SubmissionStatus::Submitting;
            let mut merged = state.values.clone();
            for (name, value) in data {
                match schema.field(name) {
                    Some(field) => {
                        merged.insert(name.clone(), field.transform_value(value.clone()));
                    }
                    None => log::debug!("ignoring submitted key '{}'", name),
                }
            }
            (previous, merged)
        };

        let validator = &self.inner.validator;
        let outcome = cancellable(token, async {
            Ok(validator.validate_data(&schema, &merged).await)
        })
        .await;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.write().status = previous;
                log::debug!("submit of '{}' abandoned: {}", schema.id, e);
                return Err(e);
            }
        };

        self.cancel_all_debounces();
        {
            let mut state = self.write();
            state.values = merged;
            let names = self.inner.all_field_names();
            for name in &names {
                state.bump(name);
                state.refresh_dirty(name);
            }
            state.touched = schema
                .fields
                .iter()
                .filter(|f| !f.field_type.is_decorative())
                .map(|f| f.name.clone())
                .collect();
            state.errors = result.errors.clone();
            state.warnings = result.warnings.clone();
            state.pending.clear();
            state.status = if result.valid {
                SubmissionStatus::Submitted
            } else {
                SubmissionStatus::Failed
            };
            state.submit_count += 1;
            self.refresh_states(&mut state, names);
        }
        self.inner.submissions.fetch_add(1, Ordering::Relaxed);
        self.inner.idle.notify_waiters();

        let mut payload = BTreeMap::new();
        payload.insert("valid".to_string(), Value::Bool(result.valid));
        payload.insert("errors".to_string(), Value::Int(result.error_count() as i64));
        self.emit(EventKind::FormSubmit, None, Value::Map(payload));
        Ok(result)
    }

    /// Return to the initial values with no errors, dirty or touched fields.
    pub fn reset(&self) {
        self.cancel_all_debounces();
        {
            let mut state = self.write();
            state.values = state.initial.clone();
            state.dirty.clear();
            state.touched.clear();
            state.errors.clear();
            state.warnings.clear();
            state.pending.clear();
            state.status = SubmissionStatus::Idle;
            state.current_step = 0;
            state.current_tab = self
                .inner
                .schema
                .layout
                .as_ref()
                .and_then(|l| l.tabs.first())
                .map(|t| t.id.clone());
            let names = self.inner.all_field_names();
            for name in &names {
                state.bump(name);
            }
            self.refresh_states(&mut state, names);
        }
        self.inner.idle.notify_waiters();
        self.emit(EventKind::FormReset, None, Value::Null);
    }

    /// Move a wizard to step `index` (zero-based, in step order).
    pub fn set_step(&self, index: usize) -> Result<(), SchemaError> {
        let count = self
            .inner
            .schema
            .layout
            .as_ref()
            .map_or(0, |l| l.ordered_steps().len());
        if index >= count {
            return Err(SchemaError::new(
                ErrorKind::Workflow,
                format!("step {} out of range ({} steps)", index, count),
            )
            .with_code("step_out_of_range"));
        }
        self.write().current_step = index;
        Ok(())
    }

    pub fn set_tab(&self, id: &str) -> Result<(), SchemaError> {
        let exists = self
            .inner
            .schema
            .layout
            .as_ref()
            .is_some_and(|l| l.tabs.iter().any(|t| t.id == id));
        if !exists {
            return Err(
                SchemaError::not_found(format!("tab '{}' not found", id)).with_code("tab_not_found")
            );
        }
        self.write().current_tab = Some(id.to_string());
        Ok(())
    }

    /// Resolve once no validation is scheduled or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.read().pending.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Abandon every scheduled validation. The session stays usable.
    pub fn cancel_pending(&self) {
        self.cancel_all_debounces();
        self.write().pending.clear();
        self.inner.idle.notify_waiters();
    }

    /// Cancel scheduled validations for good; later changes validate
    /// immediately or not at all.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.cancel_pending();
    }
}

// ──────────────────────────────────────────────
// Accessors
// ──────────────────────────────────────────────

impl Runtime {
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn values(&self) -> DataMap {
        self.read().values.clone()
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.read().values.get(name).cloned()
    }

    pub fn errors(&self) -> BTreeMap<String, Vec<String>> {
        self.read().errors.clone()
    }

    pub fn field_errors(&self, name: &str) -> Vec<String> {
        self.read().errors.get(name).cloned().unwrap_or_default()
    }

    pub fn warnings(&self) -> BTreeMap<String, Vec<String>> {
        self.read().warnings.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.read().is_dirty()
    }

    pub fn is_field_dirty(&self, name: &str) -> bool {
        self.read().dirty.contains(name)
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.read().touched.contains(name)
    }

    pub fn is_valid(&self) -> bool {
        self.read().is_valid()
    }

    pub fn status(&self) -> SubmissionStatus {
        self.read().status
    }

    pub fn current_step(&self) -> usize {
        self.read().current_step
    }

    pub fn current_tab(&self) -> Option<String> {
        self.read().current_tab.clone()
    }

    pub fn field_state(&self, name: &str) -> Option<FieldState> {
        self.read().field_states.get(name).copied()
    }

    pub fn snapshot(&self) -> RuntimeState {
        self.read().clone()
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            changes: self.inner.changes.load(Ordering::Relaxed),
            validations: self.inner.validations.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
            submissions: self.inner.submissions.load(Ordering::Relaxed),
        }
    }
}

// ──────────────────────────────────────────────
// Internals
// ──────────────────────────────────────────────

impl Runtime {
    fn read(&self) -> RwLockReadGuard<'_, RuntimeState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RuntimeState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn field(&self, name: &str) -> Result<&Field, SchemaError> {
        self.inner.schema.field(name).ok_or_else(|| {
            SchemaError::not_found(format!("field '{}' not found", name))
                .with_code("field_not_found")
                .with_field(name)
        })
    }

    fn affected_by(&self, name: &str) -> Vec<String> {
        let mut names = vec![name.to_string()];
        if let Some(watchers) = self.inner.watchers.get(name) {
            names.extend(watchers.iter().cloned());
        }
        names
    }

    /// Recompute conditional state for `names`; hidden fields lose their errors.
    fn refresh_states(&self, state: &mut RuntimeState, names: Vec<String>) {
        let evaluator = self.inner.validator.evaluator();
        let computed: Vec<(String, FieldState)> = {
            let options = self.inner.validator.options().clone();
            let ctx = EvalContext::with_options(&state.values, options);
            names
                .into_iter()
                .filter_map(|n| {
                    let field = self.inner.schema.field(&n)?;
                    Some((n, FieldState::of(field, evaluator, &ctx)))
                })
                .collect()
        };
        for (name, fs) in computed {
            if !fs.visible {
                state.errors.remove(&name);
                state.warnings.remove(&name);
            }
            state.field_states.insert(name, fs);
        }
    }

    fn emit(&self, kind: EventKind, field: Option<&str>, payload: Value) {
        let mut event = Event::new(kind, self.inner.schema.id.clone()).with_payload(payload);
        if let Some(name) = field {
            event = event.with_field(name);
        }
        self.inner.bus.dispatch(event);
    }

    fn cancel_debounce(&self, name: &str) {
        let previous = self
            .inner
            .debounces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if let Some(token) = previous {
            token.cancel();
        }
    }

    fn cancel_all_debounces(&self) {
        let tokens: Vec<CancellationToken> = self
            .inner
            .debounces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, t)| t)
            .collect();
        for token in tokens {
            token.cancel();
        }
    }

    /// Validate `name` after `delay` unless a newer change supersedes it.
    fn schedule(&self, name: &str, gen: u64, delay: Duration) {
        let token = self.inner.shutdown.child_token();
        let previous = self
            .inner
            .debounces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), token.clone());
        if let Some(old) = previous {
            old.cancel();
        }

        let runtime = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    runtime.inner.discarded.fetch_add(1, Ordering::Relaxed);
                    log::debug!("debounced validation of '{}' superseded", name);
                    if runtime.inner.shutdown.is_cancelled() {
                        runtime.write().pending.remove(&name);
                        runtime.inner.idle.notify_waiters();
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    runtime.validate_generation(&name, gen).await;
                }
            }
        });
    }

    /// Validate `name` if `gen` is still its current generation.
    async fn validate_generation(&self, name: &str, gen: u64) {
        let Ok(field) = self.field(name) else {
            return;
        };
        let Some(lock) = self.inner.field_locks.get(name) else {
            return;
        };
        let _serial = lock.lock().await;

        let validator = &self.inner.validator;
        let snapshot = {
            let state = self.read();
            if state.generation(name) != gen {
                self.inner.discarded.fetch_add(1, Ordering::Relaxed);
                return;
            }
            validator.clean_data(&self.inner.schema, &state.values)
        };

        let ctx = EvalContext::with_options(&snapshot, validator.options().clone());
        let report = if field.is_visible(validator.evaluator(), &ctx) {
            validator.validate_field(field, snapshot.get(name), &snapshot).await
        } else {
            FieldReport::default()
        };
        let valid = report.is_valid();

        {
            let mut state = self.write();
            if state.generation(name) != gen {
                self.inner.discarded.fetch_add(1, Ordering::Relaxed);
                return;
            }
            state.set_errors(name, report.errors, report.warnings);
            state.pending.remove(name);
        }
        self.inner.validations.fetch_add(1, Ordering::Relaxed);
        self.inner.idle.notify_waiters();
        self.emit(EventKind::FormValidate, Some(name), Value::Bool(valid));
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("schema", &self.inner.schema.id)
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formweave_core::{
        CompareOp, ConditionGroup, FieldBuilder, LayoutBuilder, LayoutType, SchemaBuilder,
    };

    fn schema() -> Schema {
        SchemaBuilder::form("profile")
            .field(FieldBuilder::text("name").label("Name").required().default_value("Ada"))
            .field(
                FieldBuilder::select("marital")
                    .label("Marital")
                    .option("single", "Single")
                    .option("married", "Married"),
            )
            .field(
                FieldBuilder::text("spouse")
                    .label("Spouse")
                    .required()
                    .show_when(ConditionGroup::when("marital", CompareOp::Eq, "married")),
            )
            .layout(
                LayoutBuilder::new(LayoutType::Tabs)
                    .tab("main", "Main", ["name", "marital"])
                    .tab("family", "Family", ["spouse"]),
            )
            .must_build()
    }

    #[tokio::test]
    async fn change_tracks_dirty_and_validates() {
        let rt = Runtime::new(schema(), RuntimeConfig::default());
        assert_eq!(rt.value("name"), Some(Value::from("Ada")));
        rt.handle_change("name", "").await.unwrap();
        assert!(rt.is_field_dirty("name"));
        assert_eq!(rt.field_errors("name"), vec!["Name is required"]);
        rt.handle_change("name", "Ada").await.unwrap();
        assert!(!rt.is_dirty());
        assert!(rt.is_valid());
        assert!(rt.handle_change("nope", 1).await.is_err());
    }

    #[tokio::test]
    async fn dependency_hides_field_and_clears_errors() {
        let rt = Runtime::new(schema(), RuntimeConfig::default());
        rt.handle_change("marital", "married").await.unwrap();
        assert!(rt.field_state("spouse").unwrap().visible);
        rt.handle_blur("spouse").await.unwrap();
        assert_eq!(rt.field_errors("spouse"), vec!["Spouse is required"]);
        rt.handle_change("marital", "single").await.unwrap();
        assert!(!rt.field_state("spouse").unwrap().visible);
        assert!(rt.field_errors("spouse").is_empty());
    }

    #[tokio::test]
    async fn on_submit_mode_defers_validation() {
        let config = RuntimeConfig {
            mode: ValidationMode::OnSubmit,
            ..RuntimeConfig::default()
        };
        let rt = Runtime::new(schema(), config);
        rt.handle_change("name", "").await.unwrap();
        rt.handle_blur("name").await.unwrap();
        assert!(rt.is_valid());
        assert!(rt.is_touched("name"));
        let result = rt.handle_submit(&DataMap::new()).await.unwrap();
        assert!(!result.valid);
        assert_eq!(rt.status(), SubmissionStatus::Failed);
    }

    #[tokio::test]
    async fn reset_restores_initial_state() {
        let rt = Runtime::new(schema(), RuntimeConfig::default());
        rt.handle_change("name", "Grace").await.unwrap();
        rt.set_tab("family").unwrap();
        rt.reset();
        assert_eq!(rt.value("name"), Some(Value::from("Ada")));
        assert!(!rt.is_dirty());
        assert_eq!(rt.status(), SubmissionStatus::Idle);
        assert_eq!(rt.current_tab().as_deref(), Some("main"));
        assert!(rt.set_tab("missing").is_err());
        assert!(rt.set_step(0).is_err());
    }

    #[tokio::test]
    async fn cancelled_submit_commits_nothing() {
        let rt = Runtime::new(schema(), RuntimeConfig::default());
        let token = CancellationToken::new();
        token.cancel();
        let mut data = DataMap::new();
        data.insert("name".into(), Value::from(""));
        let err = rt.handle_submit_with(&data, &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(rt.status(), SubmissionStatus::Idle);
        assert_eq!(rt.value("name"), Some(Value::from("Ada")));
        assert_eq!(rt.stats().submissions, 0);
    }
}
