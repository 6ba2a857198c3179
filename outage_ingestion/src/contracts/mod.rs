use crate::errors::IngestError;
use async_trait::async_trait;
use chrono::NaiveDate;
use entities::addresses::AddressRecord;
use entities::outage_schedules::{ChangeSet, QueueId, RegionId, ScheduleEntry};

/// The sole long-lived owner of committed schedule and address state. The
/// ingestion core consumes it; the concrete engine lives elsewhere.
///
/// `version` and `commit` implement optimistic concurrency per region: a
/// commit carries the version observed at read time and fails with
/// [`IngestError::VersionConflict`] when the stored version moved on.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn version(&self, region: &RegionId) -> anyhow::Result<u64>;

    async fn get_committed_entries(
        &self,
        region: &RegionId,
        queue: Option<&QueueId>,
        date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<ScheduleEntry>>;

    async fn commit(
        &self,
        region: &RegionId,
        entries: Vec<ScheduleEntry>,
        expected_version: u64,
    ) -> Result<(), IngestError>;

    async fn get_address_records(&self, region: &RegionId) -> anyhow::Result<Vec<AddressRecord>>;

    /// Replaces the full per-region address set. All-or-nothing: a failed
    /// import must leave the prior set intact.
    async fn replace_address_records(
        &self,
        region: &RegionId,
        records: Vec<AddressRecord>,
    ) -> anyhow::Result<()>;
}

/// Downstream notification intent sink. Fire-and-forget from the pipeline's
/// perspective; delivery retry is the implementor's concern.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, change_set: ChangeSet) -> anyhow::Result<()>;
}
