use crate::config::RegionConfig;
use crate::contracts::Alerts;
use crate::cycle::{self, CycleContext, CycleReport};
use crate::health::RegionHealth;
use crate::state::{CycleState, StateCell};
use entities::outage_schedules::RegionId;
use outage_ingestion::adapters::ProviderAdapter;
use outage_ingestion::contracts::{Notifier, PersistenceStore};
use outage_ingestion::quarantine::QuarantineStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How many consecutive cycle failures it takes before operators are paged.
const ALERT_AFTER_FAILURES: u32 = 3;

#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(CycleReport),
    /// The region is disabled or a cycle is already in flight. Triggers are
    /// never queued.
    Skipped,
    Failed,
}

/// Everything one region needs to run its ingestion cycle, plus the health
/// and in-flight bookkeeping around it.
pub struct RegionRunner {
    config: RegionConfig,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    store: Arc<dyn PersistenceStore>,
    notifier: Arc<dyn Notifier>,
    alerts: Arc<dyn Alerts>,
    quarantine: Arc<QuarantineStore>,
    state: StateCell,
    health: Mutex<RegionHealth>,
    disabled: AtomicBool,
}

impl RegionRunner {
    pub fn new(
        config: RegionConfig,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        store: Arc<dyn PersistenceStore>,
        notifier: Arc<dyn Notifier>,
        alerts: Arc<dyn Alerts>,
        quarantine: Arc<QuarantineStore>,
    ) -> Self {
        let disabled = AtomicBool::new(!config.enabled);
        Self {
            config,
            adapters,
            store,
            notifier,
            alerts,
            quarantine,
            state: StateCell::new(),
            health: Mutex::new(RegionHealth::default()),
            disabled,
        }
    }

    pub fn region(&self) -> &RegionId {
        &self.config.id
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_minutes * 60)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn health(&self) -> RegionHealth {
        self.health.lock().expect("health lock poisoned").clone()
    }

    pub fn cycle_state(&self) -> CycleState {
        self.state.snapshot()
    }

    /// Runs one cycle now unless the region is disabled or a cycle is already
    /// in flight.
    pub async fn try_run(&self) -> TriggerOutcome {
        if self.is_disabled() {
            return TriggerOutcome::Skipped;
        }
        if !self.state.try_begin() {
            info!(region = %self.config.id, "cycle already in flight, skipping trigger");
            return TriggerOutcome::Skipped;
        }

        // An unchanged-source shortcut is only safe when the previous cycle
        // committed; after a failure the fetched content may never have
        // reached the store.
        let skip_unchanged = {
            let health = self.health.lock().expect("health lock poisoned");
            health.consecutive_failures == 0 && health.last_success.is_some()
        };

        let result = cycle::run(CycleContext {
            region: &self.config.id,
            adapters: &self.adapters,
            store: &self.store,
            notifier: &self.notifier,
            quarantine: &self.quarantine,
            normalizer_config: &self.config.normalizer,
            state: &self.state,
            skip_unchanged,
        })
        .await;

        match result {
            Ok(report) => {
                self.health
                    .lock()
                    .expect("health lock poisoned")
                    .record_success();
                self.state.finish();
                TriggerOutcome::Completed(report)
            }
            Err(error) => {
                self.state.advance(CycleState::Failed);
                let failures = self
                    .health
                    .lock()
                    .expect("health lock poisoned")
                    .record_failure(error.to_string());
                if failures == ALERT_AFTER_FAILURES {
                    let message = format!(
                        "region {} failed {failures} consecutive ingestion cycles, last error: {error}",
                        self.config.id
                    );
                    if let Err(alert_error) = self.alerts.raise(&self.config.id, message).await {
                        error!(?alert_error, "failed to raise operator alert");
                    }
                }
                self.state.finish();
                TriggerOutcome::Failed
            }
        }
    }
}

/// Owns one polling task per enabled region and the manual trigger surface.
pub struct SchedulerRegistry {
    runners: HashMap<RegionId, Arc<RegionRunner>>,
    tasks: Mutex<HashMap<RegionId, JoinHandle<()>>>,
}

impl SchedulerRegistry {
    pub fn new(runners: Vec<Arc<RegionRunner>>) -> Self {
        let runners = runners
            .into_iter()
            .map(|runner| (runner.region().clone(), runner))
            .collect();
        Self {
            runners,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn regions(&self) -> Vec<RegionId> {
        self.runners.keys().cloned().collect()
    }

    /// Starts (or resumes) periodic ingestion for a region. The first cycle
    /// runs immediately, subsequent ones at the configured interval.
    pub fn enable(&self, region: &RegionId) -> anyhow::Result<()> {
        let runner = self.runner(region)?.clone();
        runner.set_disabled(false);
        let mut tasks = self.tasks.lock().expect("tasks lock poisoned");
        if let Some(task) = tasks.get(region) {
            if !task.is_finished() {
                return Ok(());
            }
        }
        let handle = tokio::spawn(poll_loop(runner));
        tasks.insert(region.clone(), handle);
        Ok(())
    }

    /// Stops periodic ingestion for a region. A cycle already in flight runs
    /// to completion; the flag takes effect at the next tick.
    pub fn disable(&self, region: &RegionId) -> anyhow::Result<()> {
        self.runner(region)?.set_disabled(true);
        Ok(())
    }

    pub async fn trigger_now(&self, region: &RegionId) -> anyhow::Result<TriggerOutcome> {
        Ok(self.runner(region)?.try_run().await)
    }

    pub fn health(&self, region: &RegionId) -> anyhow::Result<RegionHealth> {
        Ok(self.runner(region)?.health())
    }

    fn runner(&self, region: &RegionId) -> anyhow::Result<&Arc<RegionRunner>> {
        self.runners
            .get(region)
            .ok_or_else(|| anyhow::anyhow!("region {region} is not registered"))
    }
}

async fn poll_loop(runner: Arc<RegionRunner>) {
    let mut interval = tokio::time::interval(runner.poll_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if runner.is_disabled() {
            info!(region = %runner.region(), "region disabled, stopping poll loop");
            return;
        }
        match runner.try_run().await {
            TriggerOutcome::Completed(report) => {
                info!(region = %runner.region(), ?report, "ingestion cycle finished");
            }
            TriggerOutcome::Skipped => {
                warn!(region = %runner.region(), "scheduled cycle skipped");
            }
            TriggerOutcome::Failed => {}
        }
    }
}
