use entities::outage_schedules::{ChangeSet, EntryKey, ScheduleEntry, TimeSlot};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};

/// Diffs a freshly normalized schedule against the committed entries for the
/// same (queue, date, kind) set.
///
/// Interval order is not semantically significant, so both sides are compared
/// as sets; identical sets produce nothing, which keeps the poll loop
/// idempotent when upstream data has not moved. Output is sorted by key so
/// change sets are emitted deterministically.
pub fn diff(normalized: &[ScheduleEntry], committed: &[ScheduleEntry]) -> Vec<ChangeSet> {
    let committed_by_key: HashMap<EntryKey, &ScheduleEntry> = committed
        .iter()
        .map(|entry| (entry.key(), entry))
        .collect();

    normalized
        .iter()
        .filter_map(|entry| {
            let previous = committed_by_key.get(&entry.key()).copied();
            let new_slots: BTreeSet<TimeSlot> = entry.slots.iter().copied().collect();
            let old_slots: BTreeSet<TimeSlot> = previous
                .map(|prev| prev.slots.iter().copied().collect())
                .unwrap_or_default();

            let added: Vec<TimeSlot> = new_slots.difference(&old_slots).copied().collect();
            let removed: Vec<TimeSlot> = old_slots.difference(&new_slots).copied().collect();
            if added.is_empty() && removed.is_empty() {
                return None;
            }

            Some(ChangeSet {
                region: entry.region.clone(),
                queue: entry.queue.clone(),
                date: entry.date,
                kind: entry.kind,
                added,
                removed,
                previous_fetched_at: previous.map(|prev| prev.source_fetched_at),
                new_fetched_at: entry.source_fetched_at,
            })
        })
        .sorted_by(|a, b| {
            (&a.queue, a.date, a.kind).cmp(&(&b.queue, b.date, b.kind))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use entities::outage_schedules::{OutageKind, QueueId, RegionId};

    fn slot(start: u32, end: u32) -> TimeSlot {
        TimeSlot {
            start: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        }
    }

    fn entry(queue: &str, date: (i32, u32, u32), slots: Vec<TimeSlot>) -> ScheduleEntry {
        ScheduleEntry {
            region: RegionId::from("khm"),
            queue: QueueId::from(queue),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            kind: OutageKind::Planned,
            slots,
            source_fetched_at: Utc::now(),
            confidence: None,
        }
    }

    #[test]
    fn identical_state_produces_no_change_sets() {
        let committed = vec![entry("2", (2024, 3, 1), vec![slot(6, 10)])];
        let normalized = vec![entry("2", (2024, 3, 1), vec![slot(6, 10)])];
        assert!(diff(&normalized, &committed).is_empty());
    }

    #[test]
    fn diff_is_idempotent() {
        let committed = vec![entry("1", (2024, 3, 1), vec![slot(8, 12)])];
        let normalized = vec![entry("1", (2024, 3, 1), vec![slot(8, 12), slot(14, 16)])];

        let first = diff(&normalized, &committed);
        assert_eq!(first.len(), 1);

        // After the first commit the normalized batch matches stored state.
        let second = diff(&normalized, &normalized);
        assert!(second.is_empty());
    }

    #[test]
    fn permuting_interval_order_never_changes_the_diff() {
        let committed = vec![entry("1", (2024, 3, 1), vec![slot(6, 8), slot(12, 14)])];
        let forward = vec![entry(
            "1",
            (2024, 3, 1),
            vec![slot(6, 8), slot(12, 14), slot(18, 20)],
        )];
        let mut reversed = forward.clone();
        reversed[0].slots.reverse();

        assert_eq!(diff(&forward, &committed), diff(&reversed, &committed));
    }

    #[test]
    fn new_date_alongside_unchanged_date_emits_exactly_one_change_set() {
        let committed = vec![entry("2", (2024, 3, 1), vec![slot(6, 10)])];
        let normalized = vec![
            entry("2", (2024, 3, 1), vec![slot(6, 10)]),
            entry("2", (2024, 3, 2), vec![slot(14, 18)]),
        ];

        let change_sets = diff(&normalized, &committed);
        assert_eq!(change_sets.len(), 1);
        let change = &change_sets[0];
        assert_eq!(change.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(change.added, vec![slot(14, 18)]);
        assert!(change.removed.is_empty());
        assert!(change.previous_fetched_at.is_none());
    }

    #[test]
    fn shrunk_schedule_reports_removed_intervals() {
        let committed = vec![entry("1", (2024, 3, 1), vec![slot(6, 10), slot(14, 18)])];
        let normalized = vec![entry("1", (2024, 3, 1), vec![slot(6, 10)])];

        let change_sets = diff(&normalized, &committed);
        assert_eq!(change_sets.len(), 1);
        assert!(change_sets[0].added.is_empty());
        assert_eq!(change_sets[0].removed, vec![slot(14, 18)]);
        assert!(change_sets[0].previous_fetched_at.is_some());
    }
}
