use async_trait::async_trait;
use entities::outage_schedules::{ChangeSet, RegionId};
use in_memory_store::InMemoryStore;
use outage_ingestion::adapters::{PayloadCache, TesseractCli};
use outage_ingestion::contracts::Notifier;
use outage_ingestion::quarantine::QuarantineStore;
use region_scheduler::config::Settings;
use region_scheduler::contracts::Alerts;
use region_scheduler::{RegionRunner, SchedulerRegistry};
use std::sync::Arc;
use tracing::{error, info};

/// Stand-in notifier until a delivery channel is wired up. Change sets are
/// already committed by the time they arrive here, so logging them is enough
/// to observe the pipeline end to end.
struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, change_set: ChangeSet) -> anyhow::Result<()> {
        info!(
            region = %change_set.region,
            queue = %change_set.queue,
            date = %change_set.date,
            added = change_set.added.len(),
            removed = change_set.removed.len(),
            "schedule changed"
        );
        Ok(())
    }
}

struct LoggingAlerts;

#[async_trait]
impl Alerts for LoggingAlerts {
    async fn raise(&self, region: &RegionId, message: String) -> anyhow::Result<()> {
        error!(%region, message, "operator alert");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared_kernel::telemetry::init_telemetry("region_scheduler");

    let settings = Settings::parse()?;
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(PayloadCache::new());
    let quarantine = Arc::new(QuarantineStore::new());
    let recognizer = Arc::new(TesseractCli::new(settings.recognizer_languages.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LoggingNotifier);
    let alerts: Arc<dyn Alerts> = Arc::new(LoggingAlerts);

    let runners = settings
        .regions
        .iter()
        .map(|region| {
            let adapters = region
                .adapters
                .iter()
                .map(|adapter| adapter.build(&region.id, cache.clone(), recognizer.clone()))
                .collect();
            Arc::new(RegionRunner::new(
                region.clone(),
                adapters,
                store.clone(),
                notifier.clone(),
                alerts.clone(),
                quarantine.clone(),
            ))
        })
        .collect();

    let registry = SchedulerRegistry::new(runners);
    for region in &settings.regions {
        if region.enabled {
            registry.enable(&region.id)?;
            info!(region = %region.id, interval_minutes = region.poll_interval_minutes, "region polling enabled");
        } else {
            info!(region = %region.id, "region configured but disabled");
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
