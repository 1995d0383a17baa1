//! Fire-and-forget visit records
//!
//! The resolver reports every lookup to a [`VisitSink`]. Recording must never
//! slow down or fail a lookup, so sinks take ownership of the record and do
//! their work off the request path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::{DateTime, Utc};
use fjall::Keyspace;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, warn};

use crate::models::Coordinate;
use crate::providers::ProviderKind;

/// How a lookup ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitOutcome {
    Resolved,
    MissingCoordinate,
    InvalidCoordinate,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub timestamp: DateTime<Utc>,
    /// Absent when the caller's coordinate could not be parsed
    pub coordinate: Option<Coordinate>,
    pub device: Option<String>,
    /// Provider that answered, for resolved lookups
    pub provider: Option<ProviderKind>,
    pub outcome: VisitOutcome,
}

impl Visit {
    pub fn new(coordinate: Option<Coordinate>, device: Option<String>, outcome: VisitOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            coordinate,
            device,
            provider: None,
            outcome,
        }
    }

    #[must_use]
    pub fn answered_by(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }
}

pub trait VisitSink: Send + Sync {
    /// Hand a record to the sink. Must return promptly and never fail.
    fn record(&self, visit: Visit);
}

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVisitSink;

impl VisitSink for NoopVisitSink {
    fn record(&self, _visit: Visit) {}
}

/// Append-only visit store on a fjall keyspace, postcard-encoded
#[derive(Clone)]
pub struct VisitLog {
    store: Keyspace,
    sequence: Arc<AtomicU64>,
}

fn get_from_store(store: &Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl VisitLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace("visits", fjall::KeyspaceCreateOptions::default)?;
        Ok(VisitLog {
            store: items,
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Keys sort by time; the sequence number separates same-instant visits.
    fn key_for(&self, visit: &Visit) -> String {
        let nanos = visit.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:020}-{sequence:010}")
    }

    /// Store a visit synchronously and return its key
    #[tracing::instrument(name = "append_visit", level = "debug", skip(self))]
    pub fn append(&self, visit: &Visit) -> Result<String> {
        let key = self.key_for(visit);
        let bytes = postcard::to_stdvec(visit)?;
        self.store.insert(key.as_bytes().to_vec(), bytes)?;
        Ok(key)
    }

    pub fn get(&self, key: &str) -> Result<Option<Visit>> {
        match get_from_store(&self.store, key.as_bytes())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => {
                debug!("Visit {} not found", key);
                Ok(None)
            }
        }
    }
}

impl VisitSink for VisitLog {
    fn record(&self, visit: Visit) {
        let log = self.clone();
        let write = move || {
            if let Err(e) = log.append(&visit) {
                warn!("Failed to record visit: {}", e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(_) => {
                task::spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<Visit>>);

    impl VisitSink for MemorySink {
        fn record(&self, visit: Visit) {
            self.0.lock().unwrap().push(visit);
        }
    }

    fn visit() -> Visit {
        Visit::new(
            Some(Coordinate::new(46.8, 8.2).unwrap()),
            Some("device-1".into()),
            VisitOutcome::Resolved,
        )
        .answered_by(ProviderKind::PurpleAir)
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = VisitLog::open(dir.path().join("visits")).unwrap();

        let original = visit();
        let key = log.append(&original).unwrap();
        let stored = log.get(&key).unwrap().unwrap();
        assert_eq!(stored, original);
        assert!(log.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_same_instant_visits_get_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let log = VisitLog::open(dir.path().join("visits")).unwrap();

        let visit = visit();
        let first = log.append(&visit).unwrap();
        let second = log.append(&visit).unwrap();
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_record_without_runtime_writes_inline() {
        let dir = tempfile::tempdir().unwrap();
        let log = VisitLog::open(dir.path().join("visits")).unwrap();
        log.record(visit());
        // the inline write used sequence 0
        assert_eq!(log.sequence.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::default();
        sink.record(visit());
        NoopVisitSink.record(visit());
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }
}
