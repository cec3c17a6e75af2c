//! Operator-visible error log.
//!
//! [`ErrorLogLayer`] picks WARN and ERROR events emitted by the `asa_*`
//! crates and forwards them over an unbounded channel. A background writer
//! appends them to `error.log` as `[YYYY-MM-DD HH:MM:SS] message` lines.
//! Emitting never waits on the file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const TARGET_PREFIX: &str = "asa";

/// One captured event, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogRecord {
    pub timestamp: String,
    pub level: Level,
    pub message: String,
}

impl ErrorLogRecord {
    pub fn to_line(&self) -> String {
        format!("[{}] {}\n", self.timestamp, self.message)
    }
}

/// Tracing layer feeding the error log writer.
pub struct ErrorLogLayer {
    sender: mpsc::UnboundedSender<ErrorLogRecord>,
}

impl ErrorLogLayer {
    pub fn new(sender: mpsc::UnboundedSender<ErrorLogRecord>) -> Self {
        Self { sender }
    }

    /// Creates a layer and the receiving end for [`spawn_writer`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ErrorLogRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl<S> Layer<S> for ErrorLogLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if level != Level::WARN && level != Level::ERROR {
            return;
        }
        if !metadata.target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = ErrorLogRecord {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level,
            message: visitor.into_message(),
        };

        // Receiver gone means logging is shutting down.
        let _ = self.sender.send(record);
    }
}

/// Collects the `message` field and renders the rest as `key=value`.
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn into_message(self) -> String {
        let mut line = self.message;
        for (name, value) in self.fields {
            let _ = write!(line, " {name}={value}");
        }
        line
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

/// Appends every received record to `path` until all senders are dropped.
///
/// Write failures are reported on stderr and the record is skipped.
pub fn spawn_writer(path: PathBuf, mut receiver: mpsc::UnboundedReceiver<ErrorLogRecord>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = receiver.recv().await {
            if let Err(err) = append_line(&path, &record.to_line()).await {
                eprintln!("[ErrorLog] Failed to write {}: {}", path.display(), err);
            }
        }
    })
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
