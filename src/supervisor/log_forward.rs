//! The supervisor's own logger: a `tracing` layer that turns every event into a `LogRecord`
//! and writes it, length-framed, to the process's stderr — the log queue's wire (spec §4.3,
//! §10). The supervisor never formats logs for a human directly; that's the front's job once
//! it reads them back off the pipe.

use std::io::{self, Write};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::ipc::LogRecord;

struct ForwardingLayer;

impl<S: Subscriber> Layer<S> for ForwardingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: chrono::Utc::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.into_message(),
        };

        if let Ok(bytes) = serde_json::to_vec(&record) {
            write_frame(&bytes);
        }
    }
}

fn write_frame(payload: &[u8]) {
    let mut stderr = io::stderr();
    let len = (payload.len() as u32).to_be_bytes();
    if stderr.write_all(&len).and_then(|_| stderr.write_all(payload)).is_ok() {
        let _ = stderr.flush();
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    extra: Vec<(String, String)>,
}

impl MessageVisitor {
    fn into_message(self) -> String {
        if self.extra.is_empty() {
            self.message
        } else {
            let fields = self
                .extra
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} ({fields})", self.message)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.extra.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

/// Install the forwarding layer as the supervisor process's global subscriber. Must be called
/// exactly once, before anything else logs.
pub fn init_logging() {
    tracing_subscriber::registry().with(ForwardingLayer).init();
}
