mod time_slot;

pub use time_slot::{normalize_slots, InvalidTimeSlot, TimeSlot};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared_kernel::string_key;

string_key!(RegionId);
string_key!(QueueId);
string_key!(AdapterName);

/// Planned schedules come from the published hourly timetable, emergency ones
/// from the operators' incident feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageKind {
    Planned,
    Emergency,
}

/// Markup sources carry structured data and win conflicts against recognized
/// image sources, whose accuracy depends on OCR quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdapterPriority {
    Markup,
    DocumentImage,
}

/// One committed timetable for a queue on a calendar day.
///
/// Invariant: `slots` are sorted ascending and non-overlapping, and never
/// cross midnight. A cycle spanning midnight is split into two entries by the
/// adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub region: RegionId,
    pub queue: QueueId,
    pub date: NaiveDate,
    pub kind: OutageKind,
    pub slots: Vec<TimeSlot>,
    pub source_fetched_at: DateTime<Utc>,
    /// Recognition confidence in `[0.0, 1.0]`. `None` for structured sources.
    pub confidence: Option<f32>,
}

impl ScheduleEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey {
            queue: self.queue.clone(),
            date: self.date,
            kind: self.kind,
        }
    }
}

/// The identity under which at most one committed entry may exist per region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub queue: QueueId,
    pub date: NaiveDate,
    pub kind: OutageKind,
}

/// The minimal diff between a freshly normalized schedule and the previously
/// committed one. Produced only when the two differ; the unit that drives
/// notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub region: RegionId,
    pub queue: QueueId,
    pub date: NaiveDate,
    pub kind: OutageKind,
    pub added: Vec<TimeSlot>,
    pub removed: Vec<TimeSlot>,
    pub previous_fetched_at: Option<DateTime<Utc>>,
    pub new_fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    ParseError,
    TransportError,
}

/// Transient record of one adapter run. Surfaced through tracing and region
/// health, never persisted.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub region: RegionId,
    pub adapter: AdapterName,
    pub started_at: DateTime<Utc>,
    pub outcome: FetchOutcome,
    pub raw_payload_ref: Option<String>,
}
