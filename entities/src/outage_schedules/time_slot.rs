use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A half-open interval `[start, end)` within a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time slot: start {start} is not before end {end}")]
pub struct InvalidTimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, InvalidTimeSlot> {
        if start >= end {
            return Err(InvalidTimeSlot { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether two slots can be merged into one, i.e. they overlap or touch.
    pub fn touches(&self, other: &TimeSlot) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Sorts slots ascending and merges overlapping or adjacent ones into the
/// minimal non-overlapping form. Slots with `start >= end` are dropped by the
/// callers before reaching this point.
pub fn normalize_slots(mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
    slots.sort();
    let mut merged: Vec<TimeSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if last.touches(&slot) => {
                last.end = last.end.max(slot.end);
            }
            _ => merged.push(slot),
        }
    }
    merged
}
