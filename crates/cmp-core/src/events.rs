//! Consent change notifications (CloudEvents-style envelopes).
//!
//! | Type | Emitted by |
//! |------|------------|
//! | `cmp.consent.changed` | accept/reject operations |
//! | `cmp.consent.reset` | reset |
//! | `cmp.consent.imported` | import |
//! | `cmp.att.changed` | ATT status update |
//! | `cmp.config.changed` | URL / web view configuration (the first one also carries the restored record and any resolved defaults) |

use crate::model::UserStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

pub const EVENT_TYPE_CONSENT_CHANGED: &str = "cmp.consent.changed";
pub const EVENT_TYPE_CONSENT_RESET: &str = "cmp.consent.reset";
pub const EVENT_TYPE_CONSENT_IMPORTED: &str = "cmp.consent.imported";
pub const EVENT_TYPE_ATT_CHANGED: &str = "cmp.att.changed";
pub const EVENT_TYPE_CONFIG_CHANGED: &str = "cmp.config.changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ConsentChanged,
    ConsentReset,
    ConsentImported,
    AttChanged,
    ConfigChanged,
}

impl EventKind {
    pub fn event_type(self) -> &'static str {
        match self {
            EventKind::ConsentChanged => EVENT_TYPE_CONSENT_CHANGED,
            EventKind::ConsentReset => EVENT_TYPE_CONSENT_RESET,
            EventKind::ConsentImported => EVENT_TYPE_CONSENT_IMPORTED,
            EventKind::AttChanged => EVENT_TYPE_ATT_CHANGED,
            EventKind::ConfigChanged => EVENT_TYPE_CONFIG_CHANGED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentEvent {
    /// CloudEvents spec version (always "1.0")
    pub specversion: String,

    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub source: String,

    pub time: DateTime<Utc>,

    /// Always "application/json"
    pub datacontenttype: String,

    pub data: ConsentEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentEventData {
    /// Facade operation that produced the change (e.g. `accept_purposes`).
    pub operation: String,

    /// Whether the record was saved by this call: `Some(false)` if the
    /// persistence hook failed, `None` if the call saved nothing.
    pub persisted: Option<bool>,

    pub status: UserStatus,
}

impl ConsentEvent {
    pub fn new(
        kind: EventKind,
        source: impl Into<String>,
        operation: impl Into<String>,
        persisted: Option<bool>,
        status: UserStatus,
    ) -> Self {
        Self {
            specversion: "1.0".to_string(),
            id: format!("evt_{}", uuid::Uuid::new_v4()),
            event_type: kind.event_type().to_string(),
            source: source.into(),
            time: Utc::now(),
            datacontenttype: "application/json".to_string(),
            data: ConsentEventData {
                operation: operation.into(),
                persisted,
                status,
            },
        }
    }
}

/// Receives one event per committed mutation.
pub trait ConsentEventSink: Send + Sync {
    fn emit(&self, event: &ConsentEvent);
}

/// Discards every event.
pub struct NullEventSink;

impl ConsentEventSink for NullEventSink {
    fn emit(&self, _event: &ConsentEvent) {}
}

/// Fans events out to in-process subscribers.
///
/// Slow subscribers lag rather than block the engine; see
/// [`broadcast::error::RecvError::Lagged`].
pub struct BroadcastEventSink {
    tx: broadcast::Sender<ConsentEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsentEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ConsentEventSink for BroadcastEventSink {
    fn emit(&self, event: &ConsentEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}

/// Appends events as NDJSON.
pub struct FileEventSink {
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    pub fn new(path: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ConsentEventSink for FileEventSink {
    fn emit(&self, event: &ConsentEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize consent event");
                return;
            }
        };
        let mut f = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(f, "{}", json) {
            tracing::warn!(error = %e, "failed to append consent event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConsentRecord;

    fn status() -> UserStatus {
        let purposes = vec!["analytics".to_string()];
        ConsentRecord::undecided(&purposes, &Vec::new(), Utc::now()).user_status()
    }

    #[test]
    fn test_event_envelope() {
        let event = ConsentEvent::new(
            EventKind::ConsentReset,
            "cmp://test",
            "reset_consent_management_data",
            Some(true),
            status(),
        );
        assert!(event.id.starts_with("evt_"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cmp.consent.reset");
        assert_eq!(json["specversion"], "1.0");
        assert_eq!(json["data"]["operation"], "reset_consent_management_data");
        assert_eq!(json["data"]["status"]["purposes"]["analytics"], "undecided");
    }

    #[test]
    fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastEventSink::default();
        sink.emit(&ConsentEvent::new(
            EventKind::AttChanged,
            "cmp://test",
            "set_att_status",
            Some(true),
            status(),
        ));

        let mut rx = sink.subscribe();
        let event = ConsentEvent::new(
            EventKind::ConsentChanged,
            "cmp://test",
            "accept_all",
            None,
            status(),
        );
        sink.emit(&event);
        assert_eq!(rx.try_recv().unwrap(), event);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_file_sink_appends_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let sink = FileEventSink::new(&path).unwrap();
        for op in ["accept_all", "reject_all"] {
            sink.emit(&ConsentEvent::new(
                EventKind::ConsentChanged,
                "cmp://test",
                op,
                Some(true),
                status(),
            ));
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let ops: Vec<String> = content
            .lines()
            .map(|l| {
                let event: ConsentEvent = serde_json::from_str(l).unwrap();
                event.data.operation
            })
            .collect();
        assert_eq!(ops, vec!["accept_all", "reject_all"]);
    }

    #[test]
    fn test_file_sink_writes_after_poisoned_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let sink = FileEventSink::new(&path).unwrap();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = sink.file.lock().unwrap();
            panic!("sink writer died mid-write");
        }));
        assert!(sink.file.is_poisoned());

        sink.emit(&ConsentEvent::new(
            EventKind::ConsentReset,
            "cmp://test",
            "reset_consent_management_data",
            Some(true),
            status(),
        ));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
