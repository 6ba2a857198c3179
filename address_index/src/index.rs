use entities::addresses::{AddressKey, AddressRecord};
use entities::outage_schedules::{QueueId, RegionId};
use outage_ingestion::contracts::PersistenceStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Exact-match address to queue lookup over the persisted per-region address
/// sets, with an in-process cache rebuilt on import and filled lazily on the
/// first lookup of a region.
pub struct AddressIndex {
    store: Arc<dyn PersistenceStore>,
    cache: RwLock<HashMap<RegionId, HashMap<AddressKey, QueueId>>>,
}

impl AddressIndex {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up the queue serving one address. The inputs are normalized the
    /// same way imported records are, so cosmetic case and whitespace
    /// differences never cause a miss. `None` means the address is not in the
    /// region's imported set.
    pub async fn resolve(
        &self,
        region: &RegionId,
        city: &str,
        street: &str,
        house_number: &str,
    ) -> anyhow::Result<Option<QueueId>> {
        let key = AddressKey::new(city, street, house_number);
        {
            let cache = self.cache.read().await;
            if let Some(by_key) = cache.get(region) {
                return Ok(by_key.get(&key).cloned());
            }
        }

        let by_key = self.load_region(region).await?;
        let queue = by_key.get(&key).cloned();
        self.cache.write().await.insert(region.clone(), by_key);
        Ok(queue)
    }

    /// Replaces the region's whole address set. The store swap is
    /// all-or-nothing; the cache is rebuilt only after it succeeds, so a
    /// failed import keeps serving the previous set.
    #[tracing::instrument(err, skip(self, records), fields(region = %region, records = records.len()))]
    pub async fn bulk_load(
        &self,
        region: &RegionId,
        records: Vec<AddressRecord>,
    ) -> anyhow::Result<usize> {
        let count = records.len();
        let by_key: HashMap<AddressKey, QueueId> = records
            .iter()
            .map(|record| (record.key(), record.queue.clone()))
            .collect();
        self.store.replace_address_records(region, records).await?;
        self.cache.write().await.insert(region.clone(), by_key);
        info!("address set replaced");
        Ok(count)
    }

    pub async fn export(&self, region: &RegionId) -> anyhow::Result<Vec<AddressRecord>> {
        self.store.get_address_records(region).await
    }

    async fn load_region(&self, region: &RegionId) -> anyhow::Result<HashMap<AddressKey, QueueId>> {
        let records = self.store.get_address_records(region).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let key = record.key();
                (key, record.queue)
            })
            .collect())
    }
}
