use crate::state::{CycleState, StateCell};
use chrono::Utc;
use entities::outage_schedules::{ChangeSet, FetchAttempt, FetchOutcome, RegionId, ScheduleEntry};
use outage_ingestion::adapters::{AdapterBatch, ProviderAdapter};
use outage_ingestion::change_detector;
use outage_ingestion::contracts::{Notifier, PersistenceStore};
use outage_ingestion::errors::IngestError;
use outage_ingestion::normalizer::{self, NormalizerConfig};
use outage_ingestion::quarantine::QuarantineStore;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleReport {
    pub entries_committed: usize,
    pub change_sets_emitted: usize,
    pub entries_quarantined: usize,
}

pub(crate) struct CycleContext<'a> {
    pub region: &'a RegionId,
    pub adapters: &'a [Arc<dyn ProviderAdapter>],
    pub store: &'a Arc<dyn PersistenceStore>,
    pub notifier: &'a Arc<dyn Notifier>,
    pub quarantine: &'a Arc<QuarantineStore>,
    pub normalizer_config: &'a NormalizerConfig,
    pub state: &'a StateCell,
    /// Whether a cycle may stop after fetching when no source content
    /// changed. Off while the region is recovering from a failure, since the
    /// previous cycle may have fetched without committing.
    pub skip_unchanged: bool,
}

/// Runs one fetch -> parse -> normalize -> diff -> commit pass for a region.
/// Any failure aborts the whole cycle with nothing committed; the caller
/// records it and the next scheduled tick retries.
#[tracing::instrument(err, skip_all, fields(region = %ctx.region))]
pub(crate) async fn run(ctx: CycleContext<'_>) -> Result<CycleReport, IngestError> {
    let mut payloads = Vec::with_capacity(ctx.adapters.len());
    let mut any_changed = false;
    for adapter in ctx.adapters {
        let started_at = Utc::now();
        let fetched = adapter.fetch().await;
        let attempt = FetchAttempt {
            region: ctx.region.clone(),
            adapter: adapter.name(),
            started_at,
            outcome: match &fetched {
                Ok(_) => FetchOutcome::Success,
                Err(_) => FetchOutcome::TransportError,
            },
            raw_payload_ref: fetched
                .as_ref()
                .ok()
                .map(|fetched| fetched.payload.content_hash.clone()),
        };
        info!(?attempt, "fetch attempt finished");
        let fetched = fetched?;
        any_changed |= fetched.changed;
        payloads.push((adapter, fetched.payload));
    }

    if ctx.skip_unchanged && !any_changed {
        info!("no source content changed since the last poll, skipping parse");
        return Ok(CycleReport::default());
    }

    ctx.state.advance(CycleState::Parsing);
    let mut batches = Vec::with_capacity(payloads.len());
    for (adapter, payload) in payloads {
        let entries = adapter.parse(&payload).await?;
        batches.push(AdapterBatch {
            adapter: adapter.name(),
            priority: adapter.priority(),
            payload_ref: payload.content_hash.clone(),
            entries,
        });
    }

    ctx.state.advance(CycleState::Normalizing);
    let normalized = normalizer::normalize(ctx.region, batches, ctx.normalizer_config)?;
    let entries_quarantined = normalized.quarantined.len();
    ctx.quarantine.push_all(ctx.region, normalized.quarantined);

    ctx.state.advance(CycleState::Diffing);
    let (change_sets, version) = diff_against_committed(&ctx, &normalized.entries).await?;
    if change_sets.is_empty() {
        info!("schedule unchanged, nothing to commit");
        return Ok(CycleReport {
            entries_quarantined,
            ..Default::default()
        });
    }

    ctx.state.advance(CycleState::Committing);
    let (change_sets, entries_committed) = match ctx
        .store
        .commit(ctx.region, normalized.entries.clone(), version)
        .await
    {
        Ok(()) => (change_sets, normalized.entries.len()),
        Err(IngestError::VersionConflict { expected, actual }) => {
            // Another writer got in between our read and our write. One
            // re-read and re-commit within the tick; a second conflict defers
            // to the next tick.
            warn!(expected, actual, "version conflict, retrying commit once");
            ctx.state.advance(CycleState::Diffing);
            let (change_sets, version) = diff_against_committed(&ctx, &normalized.entries).await?;
            if change_sets.is_empty() {
                info!("conflicting writer already committed this schedule");
                return Ok(CycleReport {
                    entries_quarantined,
                    ..Default::default()
                });
            }
            ctx.state.advance(CycleState::Committing);
            ctx.store
                .commit(ctx.region, normalized.entries.clone(), version)
                .await?;
            let committed = normalized.entries.len();
            (change_sets, committed)
        }
        Err(other) => return Err(other),
    };

    // Committed first, notified second: change sets leave in commit order.
    for change_set in &change_sets {
        if let Err(error) = ctx.notifier.notify(change_set.clone()).await {
            warn!(?error, "failed to hand change set to notifier");
        }
    }

    Ok(CycleReport {
        entries_committed,
        change_sets_emitted: change_sets.len(),
        entries_quarantined,
    })
}

async fn diff_against_committed(
    ctx: &CycleContext<'_>,
    normalized: &[ScheduleEntry],
) -> Result<(Vec<ChangeSet>, u64), IngestError> {
    let version = ctx
        .store
        .version(ctx.region)
        .await
        .map_err(IngestError::Transport)?;
    let committed = ctx
        .store
        .get_committed_entries(ctx.region, None, None)
        .await
        .map_err(IngestError::Transport)?;
    Ok((change_detector::diff(normalized, &committed), version))
}
