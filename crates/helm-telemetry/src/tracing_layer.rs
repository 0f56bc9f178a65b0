//! Tracing layer that forwards warnings and errors to an in-app diagnostics panel.
//!
//! Events at or above the configured level are captured with their structured
//! fields plus the fields of every enclosing span, and pushed on an unbounded
//! channel that the shell drains.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// One captured log event.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    /// Event target (e.g., "helm_application::session::pending")
    pub target: String,
    /// WARN or ERROR unless the layer was built with a lower threshold
    pub level: String,
    pub message: String,
    /// Structured fields of the event, excluding `message`
    pub fields: HashMap<String, Value>,
    /// Fields of the enclosing spans; inner spans win on name clashes
    pub span: HashMap<String, Value>,
    /// RFC 3339
    pub timestamp: String,
}

/// Span fields recorded at span creation.
#[derive(Default)]
struct SpanFields(HashMap<String, Value>);

pub struct DiagnosticLayer {
    sender: mpsc::UnboundedSender<DiagnosticEvent>,
    threshold: Level,
}

impl DiagnosticLayer {
    /// Forwards WARN and ERROR events to `sender`.
    pub fn new(sender: mpsc::UnboundedSender<DiagnosticEvent>) -> Self {
        Self::with_threshold(sender, Level::WARN)
    }

    /// Forwards events at `threshold` or more severe.
    pub fn with_threshold(sender: mpsc::UnboundedSender<DiagnosticEvent>, threshold: Level) -> Self {
        Self { sender, threshold }
    }
}

impl<S> Layer<S> for DiagnosticLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut FieldVisitor(&mut fields.0));
        span.extensions_mut().insert(fields);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // tracing orders levels by verbosity: ERROR < WARN < ... < TRACE
        if *event.metadata().level() > self.threshold {
            return;
        }

        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let mut span_fields = HashMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(stored) = span.extensions().get::<SpanFields>() {
                    span_fields.extend(stored.0.clone());
                }
            }
        }

        let message = match fields.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let diagnostic = DiagnosticEvent {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message,
            fields,
            span: span_fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // A closed receiver only means nobody is watching.
        let _ = self.sender.send(diagnostic);
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(
            field.name().to_string(),
            serde_json::json!(format!("{:?}", value)),
        );
    }
}
