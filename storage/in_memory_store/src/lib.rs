use async_trait::async_trait;
use chrono::NaiveDate;
use entities::addresses::AddressRecord;
use entities::outage_schedules::{EntryKey, QueueId, RegionId, ScheduleEntry};
use outage_ingestion::contracts::PersistenceStore;
use outage_ingestion::errors::IngestError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process [`PersistenceStore`] backed by a hash map, used by tests and
/// local runs. Implements the same optimistic per-region versioning contract
/// a real storage engine has to provide.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<HashMap<RegionId, RegionState>>,
}

#[derive(Default)]
struct RegionState {
    version: u64,
    entries: HashMap<EntryKey, ScheduleEntry>,
    addresses: Vec<AddressRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn version(&self, region: &RegionId) -> anyhow::Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.get(region).map(|state| state.version).unwrap_or(0))
    }

    async fn get_committed_entries(
        &self,
        region: &RegionId,
        queue: Option<&QueueId>,
        date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<ScheduleEntry>> {
        let inner = self.inner.read().await;
        let Some(state) = inner.get(region) else {
            return Ok(vec![]);
        };
        Ok(state
            .entries
            .values()
            .filter(|entry| queue.map_or(true, |queue| entry.queue == *queue))
            .filter(|entry| date.map_or(true, |date| entry.date == date))
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        region: &RegionId,
        entries: Vec<ScheduleEntry>,
        expected_version: u64,
    ) -> Result<(), IngestError> {
        let mut inner = self.inner.write().await;
        let state = inner.entry(region.clone()).or_default();
        if state.version != expected_version {
            return Err(IngestError::VersionConflict {
                expected: expected_version,
                actual: state.version,
            });
        }
        for entry in entries {
            state.entries.insert(entry.key(), entry);
        }
        state.version += 1;
        Ok(())
    }

    async fn get_address_records(&self, region: &RegionId) -> anyhow::Result<Vec<AddressRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .get(region)
            .map(|state| state.addresses.clone())
            .unwrap_or_default())
    }

    async fn replace_address_records(
        &self,
        region: &RegionId,
        records: Vec<AddressRecord>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner.entry(region.clone()).or_default().addresses = records;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use entities::outage_schedules::{OutageKind, TimeSlot};

    fn entry(queue: &str, slots: Vec<TimeSlot>) -> ScheduleEntry {
        ScheduleEntry {
            region: RegionId::from("khm"),
            queue: QueueId::from(queue),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            kind: OutageKind::Planned,
            slots,
            source_fetched_at: Utc::now(),
            confidence: None,
        }
    }

    fn slot(start: u32, end: u32) -> TimeSlot {
        TimeSlot {
            start: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn commit_with_stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let region = RegionId::from("khm");

        store.commit(&region, vec![entry("1", vec![slot(6, 10)])], 0)
            .await
            .unwrap();

        let err = store
            .commit(&region, vec![entry("1", vec![slot(8, 12)])], 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::VersionConflict { expected: 0, actual: 1 }
        ));
        assert_eq!(store.version(&region).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn commit_upserts_one_entry_per_key() {
        let store = InMemoryStore::new();
        let region = RegionId::from("khm");

        store.commit(&region, vec![entry("1", vec![slot(6, 10)])], 0)
            .await
            .unwrap();
        store.commit(&region, vec![entry("1", vec![slot(8, 12)])], 1)
            .await
            .unwrap();

        let committed = store
            .get_committed_entries(&region, None, None)
            .await
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].slots, vec![slot(8, 12)]);
    }

    #[tokio::test]
    async fn committed_entries_can_be_filtered_by_queue_and_date() {
        let store = InMemoryStore::new();
        let region = RegionId::from("khm");
        store
            .commit(
                &region,
                vec![entry("1", vec![slot(6, 10)]), entry("2", vec![slot(8, 12)])],
                0,
            )
            .await
            .unwrap();

        let queue = QueueId::from("2");
        let filtered = store
            .get_committed_entries(&region, Some(&queue), None)
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].queue, queue);

        let none = store
            .get_committed_entries(&region, None, NaiveDate::from_ymd_opt(2030, 1, 1))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
