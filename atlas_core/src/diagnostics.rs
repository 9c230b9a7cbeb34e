//! In-process capture of engine diagnostics.
//!
//! [`DiagnosticsLayer`] turns each `tracing` event into a [`DiagnosticRecord`]
//! and forwards it to a [`DiagnosticsCapture`]. Hosts use it to surface
//! rejected gestures; tests use it to assert that no-op transitions were
//! logged.

use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRecord {
    pub timestamp_ms: u64,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl DiagnosticRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Clone)]
pub struct DiagnosticsLayer {
    sender: Sender<DiagnosticRecord>,
    target_prefix: &'static str,
}

impl DiagnosticsLayer {
    /// Only events whose target starts with `prefix` are forwarded.
    pub fn with_target_prefix(mut self, prefix: &'static str) -> Self {
        self.target_prefix = prefix;
        self
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(self.target_prefix) {
            return;
        }
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);
        let record = DiagnosticRecord {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as u64)
                .unwrap_or(0),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };
        // A dropped capture just means nobody is listening any more.
        let _ = self.sender.send(record);
    }
}

/// Receiving half of a [`DiagnosticsLayer`].
pub struct DiagnosticsCapture {
    receiver: Receiver<DiagnosticRecord>,
}

impl DiagnosticsCapture {
    pub fn new() -> (Self, DiagnosticsLayer) {
        let (sender, receiver) = unbounded();
        (
            Self { receiver },
            DiagnosticsLayer {
                sender,
                target_prefix: "atlas::",
            },
        )
    }

    /// Everything recorded since the previous drain.
    pub fn drain(&self) -> Vec<DiagnosticRecord> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.put(field, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn captures_atlas_events_with_fields() {
        let (capture, layer) = DiagnosticsCapture::new();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "atlas::selection", size = 3usize, additive = true, "selection.changed=group_click");
            tracing::info!(target: "other", "ignored");
        });
        let records = capture.drain();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.target, "atlas::selection");
        assert_eq!(record.level, "DEBUG");
        assert_eq!(record.message, "selection.changed=group_click");
        assert_eq!(record.field("size"), Some(&Value::from(3u64)));
        assert_eq!(record.field("additive"), Some(&Value::Bool(true)));
        assert!(capture.drain().is_empty());
    }
}
