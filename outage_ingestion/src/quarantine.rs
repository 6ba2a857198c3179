use chrono::{DateTime, Utc};
use entities::outage_schedules::{AdapterName, RegionId, ScheduleEntry};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum QuarantineReason {
    LowConfidence { confidence: f32, threshold: f32 },
    ConflictingSource { kept: AdapterName },
}

/// An entry held back from commit pending manual review or a re-parse of its
/// cached payload.
#[derive(Debug, Clone)]
pub struct QuarantinedEntry {
    pub entry: ScheduleEntry,
    pub adapter: AdapterName,
    pub reason: QuarantineReason,
    pub payload_ref: String,
    pub quarantined_at: DateTime<Utc>,
}

/// Per-region holding area for entries that must not be auto-committed.
/// In-memory; the payload reference points back into the payload cache for
/// re-parsing.
#[derive(Default)]
pub struct QuarantineStore {
    inner: RwLock<HashMap<RegionId, Vec<QuarantinedEntry>>>,
}

impl QuarantineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_all(&self, region: &RegionId, entries: Vec<QuarantinedEntry>) {
        if entries.is_empty() {
            return;
        }
        warn!(%region, count = entries.len(), "quarantining entries");
        let mut inner = self.inner.write().expect("quarantine lock poisoned");
        inner.entry(region.clone()).or_default().extend(entries);
    }

    pub fn entries(&self, region: &RegionId) -> Vec<QuarantinedEntry> {
        let inner = self.inner.read().expect("quarantine lock poisoned");
        inner.get(region).cloned().unwrap_or_default()
    }

    /// Removes and returns the region's held entries, e.g. after review.
    pub fn drain(&self, region: &RegionId) -> Vec<QuarantinedEntry> {
        let mut inner = self.inner.write().expect("quarantine lock poisoned");
        inner.remove(region).unwrap_or_default()
    }
}
