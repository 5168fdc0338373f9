//! In-process event bus.
//!
//! Subscribers register a handler for one event kind (or all kinds).
//! Dispatch snapshots the subscriber list under a read lock and then runs
//! each handler on its own blocking task when a tokio runtime is available,
//! so a slow handler never stalls the publisher. Without a runtime, or in
//! [`DispatchMode::Inline`], handlers run on the caller's thread in
//! subscription order. A handler that errors or panics is logged and
//! counted; the remaining handlers still run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::value::Value;

// ──────────────────────────────────────────────
// Events
// ──────────────────────────────────────────────

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    SchemaRegistered,
    SchemaUpdated,
    SchemaDeleted,
    SchemaAccessed,
    FieldChange,
    FieldFocus,
    FieldBlur,
    FormSubmit,
    FormReset,
    FormValidate,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::SchemaRegistered => "schema.registered",
            EventKind::SchemaUpdated => "schema.updated",
            EventKind::SchemaDeleted => "schema.deleted",
            EventKind::SchemaAccessed => "schema.accessed",
            EventKind::FieldChange => "field:change",
            EventKind::FieldFocus => "field:focus",
            EventKind::FieldBlur => "field:blur",
            EventKind::FormSubmit => "form:submit",
            EventKind::FormReset => "form:reset",
            EventKind::FormValidate => "form:validate",
            EventKind::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> EventKind {
        match s {
            "schema.registered" => EventKind::SchemaRegistered,
            "schema.updated" => EventKind::SchemaUpdated,
            "schema.deleted" => EventKind::SchemaDeleted,
            "schema.accessed" => EventKind::SchemaAccessed,
            "field:change" => EventKind::FieldChange,
            "field:focus" => EventKind::FieldFocus,
            "field:blur" => EventKind::FieldBlur,
            "form:submit" => EventKind::FormSubmit,
            "form:reset" => EventKind::FormReset,
            "form:validate" => EventKind::FormValidate,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        EventKind::parse(&s)
    }
}

impl From<EventKind> for String {
    fn from(k: EventKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub kind: EventKind,
    /// Schema id (or other origin) the event concerns.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub payload: Value,
    /// RFC 3339 emission time.
    pub timestamp: String,
}

impl Event {
    pub fn new(kind: EventKind, source: impl Into<String>) -> Self {
        Event {
            id: Uuid::new_v4(),
            kind,
            source: source.into(),
            field: None,
            payload: Value::Null,
            timestamp: now_rfc3339(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// Current UTC time as RFC 3339, empty if formatting fails.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

// ──────────────────────────────────────────────
// Bus
// ──────────────────────────────────────────────

/// A subscriber callback. Returning `Err` marks the delivery as failed.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One blocking task per handler when a tokio runtime is present.
    #[default]
    Spawned,
    /// Handlers run on the dispatching thread.
    Inline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default)]
    pub dispatch: DispatchMode,
}

struct Subscriber {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: EventHandler,
}

pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    failures: Arc<AtomicU64>,
    config: EventBusConfig,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(EventBusConfig::default())
    }
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        EventBus {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failures: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// A bus that runs handlers on the dispatching thread.
    pub fn inline() -> Self {
        EventBus::new(EventBusConfig {
            dispatch: DispatchMode::Inline,
        })
    }

    /// Subscribe to one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), String> + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(handler))
    }

    /// Subscribe to every event.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), String> + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    fn add(&self, kind: Option<EventKind>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, kind, handler });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliveries that returned an error or panicked.
    pub fn handler_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver `event` to every matching subscriber.
    pub fn dispatch(&self, event: Event) {
        let handlers: Vec<EventHandler> = {
            let subs = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            subs.iter()
                .filter(|s| s.kind.as_ref().map_or(true, |k| *k == event.kind))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        if handlers.is_empty() {
            return;
        }
        log::debug!("dispatching {} to {} handler(s)", event.kind, handlers.len());

        let event = Arc::new(event);
        let runtime = match self.config.dispatch {
            DispatchMode::Spawned => tokio::runtime::Handle::try_current().ok(),
            DispatchMode::Inline => None,
        };
        for handler in handlers {
            let event = Arc::clone(&event);
            let failures = Arc::clone(&self.failures);
            match &runtime {
                Some(handle) => {
                    handle.spawn_blocking(move || deliver(&handler, &event, &failures));
                }
                None => deliver(&handler, &event, &failures),
            }
        }
    }
}

fn deliver(handler: &EventHandler, event: &Event, failures: &AtomicU64) {
    match catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(Ok(())) => {}
        Ok(Err(msg)) => {
            failures.fetch_add(1, Ordering::Relaxed);
            log::warn!("event handler for {} failed: {}", event.kind, msg);
        }
        Err(_) => {
            failures.fetch_add(1, Ordering::Relaxed);
            log::warn!("event handler for {} panicked", event.kind);
        }
    }
}
