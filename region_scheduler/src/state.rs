use std::fmt;
use std::sync::Mutex;

/// Step of the per-region ingestion cycle. `Failed` is reachable from every
/// step and transitions back to `Idle` once the failure is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Parsing,
    Normalizing,
    Diffing,
    Committing,
    Failed,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Parsing => "parsing",
            CycleState::Normalizing => "normalizing",
            CycleState::Diffing => "diffing",
            CycleState::Committing => "committing",
            CycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Holds the current cycle state of one region. Beginning a cycle is the only
/// guarded transition: it succeeds exactly when the region is idle, which is
/// what keeps cycles from overlapping.
pub(crate) struct StateCell {
    current: Mutex<CycleState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            current: Mutex::new(CycleState::Idle),
        }
    }

    /// Moves `Idle -> Fetching`. Returns false when a cycle is already in
    /// flight, in which case the trigger must be skipped, not queued.
    pub(crate) fn try_begin(&self) -> bool {
        let mut current = self.current.lock().expect("state lock poisoned");
        if *current != CycleState::Idle {
            return false;
        }
        *current = CycleState::Fetching;
        true
    }

    pub(crate) fn advance(&self, state: CycleState) {
        *self.current.lock().expect("state lock poisoned") = state;
    }

    pub(crate) fn finish(&self) {
        self.advance(CycleState::Idle);
    }

    pub(crate) fn snapshot(&self) -> CycleState {
        *self.current.lock().expect("state lock poisoned")
    }
}
