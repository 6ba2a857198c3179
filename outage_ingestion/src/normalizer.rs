use crate::adapters::AdapterBatch;
use crate::errors::IngestError;
use crate::quarantine::{QuarantineReason, QuarantinedEntry};
use chrono::Utc;
use entities::outage_schedules::{
    normalize_slots, AdapterName, AdapterPriority, EntryKey, RegionId, ScheduleEntry,
};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{error, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    /// Entries recognized below this confidence are quarantined.
    pub confidence_threshold: f32,
    /// The whole batch is rejected when more than this fraction of entries
    /// had to be discarded or quarantined.
    pub discard_fraction_threshold: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            discard_fraction_threshold: 0.5,
        }
    }
}

#[derive(Debug)]
pub struct NormalizedBatch {
    pub entries: Vec<ScheduleEntry>,
    pub quarantined: Vec<QuarantinedEntry>,
}

struct Candidate {
    entry: ScheduleEntry,
    adapter: AdapterName,
    priority: AdapterPriority,
    payload_ref: String,
}

/// Merges adapter output into the canonical per-queue timetable for one
/// region: validates interval invariants, collapses slots to minimal
/// non-overlapping form, quarantines low-confidence recognition, and resolves
/// cross-adapter conflicts by adapter priority.
pub fn normalize(
    region: &RegionId,
    batches: Vec<AdapterBatch>,
    config: &NormalizerConfig,
) -> Result<NormalizedBatch, IngestError> {
    let total: usize = batches.iter().map(|batch| batch.entries.len()).sum();
    let mut discarded = 0usize;
    let mut quarantined = Vec::new();
    let mut by_key: BTreeMap<EntryKey, Vec<Candidate>> = BTreeMap::new();

    for batch in batches {
        for mut entry in batch.entries {
            // One bad interval taints the whole entry. Partially salvaging
            // it would mask how garbled the batch is and let the fraction
            // guard below pass a parse that should be rejected.
            if entry.slots.iter().any(|slot| slot.start >= slot.end) {
                warn!(
                    %region,
                    queue = %entry.queue,
                    "discarding entry with inverted interval"
                );
                discarded += 1;
                continue;
            }
            entry.slots = normalize_slots(entry.slots);
            if entry.slots.is_empty() {
                discarded += 1;
                continue;
            }

            if let Some(confidence) = entry.confidence {
                if confidence < config.confidence_threshold {
                    quarantined.push(QuarantinedEntry {
                        entry,
                        adapter: batch.adapter.clone(),
                        reason: QuarantineReason::LowConfidence {
                            confidence,
                            threshold: config.confidence_threshold,
                        },
                        payload_ref: batch.payload_ref.clone(),
                        quarantined_at: Utc::now(),
                    });
                    continue;
                }
            }

            by_key.entry(entry.key()).or_default().push(Candidate {
                entry,
                adapter: batch.adapter.clone(),
                priority: batch.priority,
                payload_ref: batch.payload_ref.clone(),
            });
        }
    }

    let mut entries = Vec::with_capacity(by_key.len());
    for (key, candidates) in by_key {
        let (winner, losers) = pick_winner(candidates);
        for loser in losers {
            if loser.entry.slots == winner.entry.slots {
                // Same data from two sources; nothing to resolve.
                continue;
            }
            // Both sources are confident yet disagree. The upstream behavior
            // here is unspecified, so surface the anomaly for manual
            // resolution instead of silently dropping the loser.
            error!(
                %region,
                queue = %key.queue,
                date = %key.date,
                winner = %winner.adapter,
                loser = %loser.adapter,
                "conflicting high-confidence schedules for the same queue"
            );
            quarantined.push(QuarantinedEntry {
                entry: loser.entry,
                adapter: loser.adapter,
                reason: QuarantineReason::ConflictingSource {
                    kept: winner.adapter.clone(),
                },
                payload_ref: loser.payload_ref,
                quarantined_at: Utc::now(),
            });
        }
        entries.push(winner.entry);
    }

    let held_back = discarded + quarantined.len();
    if total > 0 && held_back as f32 / total as f32 > config.discard_fraction_threshold {
        return Err(IngestError::Validation {
            discarded: held_back,
            total,
        });
    }

    entries.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(NormalizedBatch {
        entries,
        quarantined,
    })
}

/// Adapter priority decides; within one adapter duplicate entries for the
/// same key are merged rather than treated as a conflict.
fn pick_winner(candidates: Vec<Candidate>) -> (Candidate, Vec<Candidate>) {
    let mut sorted = candidates
        .into_iter()
        .sorted_by_key(|candidate| candidate.priority)
        .collect::<Vec<_>>();
    let mut winner = sorted.remove(0);

    let mut losers = Vec::new();
    for candidate in sorted {
        if candidate.adapter == winner.adapter {
            let mut slots = winner.entry.slots.clone();
            slots.extend(candidate.entry.slots.iter().copied());
            winner.entry.slots = normalize_slots(slots);
        } else {
            losers.push(candidate);
        }
    }
    (winner, losers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use entities::outage_schedules::{AdapterName, OutageKind, QueueId, TimeSlot};

    fn region() -> RegionId {
        RegionId::from("khm")
    }

    fn slot(start: (u32, u32), end: (u32, u32)) -> TimeSlot {
        TimeSlot {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn entry(queue: &str, slots: Vec<TimeSlot>, confidence: Option<f32>) -> ScheduleEntry {
        ScheduleEntry {
            region: region(),
            queue: QueueId::from(queue),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            kind: OutageKind::Planned,
            slots,
            source_fetched_at: Utc::now(),
            confidence,
        }
    }

    fn markup_batch(entries: Vec<ScheduleEntry>) -> AdapterBatch {
        AdapterBatch {
            adapter: AdapterName::from("markup"),
            priority: AdapterPriority::Markup,
            payload_ref: "markup-hash".to_owned(),
            entries,
        }
    }

    fn image_batch(entries: Vec<ScheduleEntry>) -> AdapterBatch {
        AdapterBatch {
            adapter: AdapterName::from("document-image"),
            priority: AdapterPriority::DocumentImage,
            payload_ref: "image-hash".to_owned(),
            entries,
        }
    }

    #[test]
    fn output_slots_are_sorted_and_non_overlapping() {
        let batch = markup_batch(vec![entry(
            "1",
            vec![slot((12, 0), (14, 0)), slot((8, 0), (13, 0)), slot((16, 0), (18, 0))],
            None,
        )]);
        let normalized = normalize(&region(), vec![batch], &NormalizerConfig::default()).unwrap();
        assert_eq!(
            normalized.entries[0].slots,
            vec![slot((8, 0), (14, 0)), slot((16, 0), (18, 0))]
        );
    }

    #[test]
    fn inverted_intervals_are_discarded_not_committed() {
        let mut bad = entry("1", vec![], None);
        bad.slots = vec![TimeSlot {
            start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        }];
        let good = entry("2", vec![slot((6, 0), (10, 0))], None);
        let normalized = normalize(
            &region(),
            vec![markup_batch(vec![bad, good])],
            &NormalizerConfig {
                discard_fraction_threshold: 0.9,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(normalized.entries.len(), 1);
        assert_eq!(normalized.entries[0].queue, QueueId::from("2"));
    }

    #[test]
    fn batch_of_entries_each_carrying_a_bad_interval_is_rejected() {
        let inverted = TimeSlot {
            start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        };
        let entries = vec![
            entry("1", vec![inverted, slot((6, 0), (10, 0))], None),
            entry("2", vec![inverted, slot((6, 0), (10, 0))], None),
            entry("3", vec![inverted, slot((6, 0), (10, 0))], None),
        ];
        let err = normalize(
            &region(),
            vec![markup_batch(entries)],
            &NormalizerConfig {
                discard_fraction_threshold: 0.5,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Validation { discarded: 3, total: 3 }
        ));
    }

    #[test]
    fn low_confidence_image_entry_never_overrides_markup() {
        let markup = entry("1", vec![slot((8, 0), (12, 0))], None);
        let image = entry("1", vec![slot((9, 0), (11, 0))], Some(0.4));
        let normalized = normalize(
            &region(),
            vec![markup_batch(vec![markup.clone()]), image_batch(vec![image])],
            &NormalizerConfig {
                confidence_threshold: 0.6,
                discard_fraction_threshold: 0.9,
            },
        )
        .unwrap();

        assert_eq!(normalized.entries, vec![markup]);
        assert_eq!(normalized.quarantined.len(), 1);
        assert!(matches!(
            normalized.quarantined[0].reason,
            QuarantineReason::LowConfidence { confidence, .. } if (confidence - 0.4).abs() < 1e-6
        ));
    }

    #[test]
    fn high_confidence_disagreement_is_surfaced_not_silently_dropped() {
        let markup = entry("1", vec![slot((8, 0), (12, 0))], None);
        let image = entry("1", vec![slot((9, 0), (11, 0))], Some(0.95));
        let normalized = normalize(
            &region(),
            vec![markup_batch(vec![markup.clone()]), image_batch(vec![image])],
            &NormalizerConfig {
                confidence_threshold: 0.6,
                discard_fraction_threshold: 0.9,
            },
        )
        .unwrap();

        assert_eq!(normalized.entries, vec![markup]);
        assert!(matches!(
            normalized.quarantined[0].reason,
            QuarantineReason::ConflictingSource { ref kept } if *kept == *"markup"
        ));
    }

    #[test]
    fn agreeing_sources_produce_no_quarantine() {
        let markup = entry("1", vec![slot((8, 0), (12, 0))], None);
        let image = entry("1", vec![slot((8, 0), (12, 0))], Some(0.9));
        let normalized = normalize(
            &region(),
            vec![markup_batch(vec![markup.clone()]), image_batch(vec![image])],
            &NormalizerConfig::default(),
        )
        .unwrap();
        assert_eq!(normalized.entries, vec![markup]);
        assert!(normalized.quarantined.is_empty());
    }

    #[test]
    fn mostly_garbled_batch_is_rejected() {
        let entries = vec![
            entry("1", vec![slot((8, 0), (10, 0))], Some(0.1)),
            entry("2", vec![slot((8, 0), (10, 0))], Some(0.2)),
            entry("3", vec![slot((8, 0), (10, 0))], None),
        ];
        let err = normalize(
            &region(),
            vec![image_batch(entries)],
            &NormalizerConfig {
                confidence_threshold: 0.6,
                discard_fraction_threshold: 0.5,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Validation { discarded: 2, total: 3 }
        ));
    }
}
