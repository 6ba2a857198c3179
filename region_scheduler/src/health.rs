use chrono::{DateTime, Utc};

/// The externally observable trace of a region's ingestion outcomes.
#[derive(Debug, Clone, Default)]
pub struct RegionHealth {
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl RegionHealth {
    pub(crate) fn record_success(&mut self) {
        self.last_success = Some(Utc::now());
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Returns the updated consecutive failure count.
    pub(crate) fn record_failure(&mut self, error: String) -> u32 {
        self.last_failure = Some(Utc::now());
        self.consecutive_failures += 1;
        self.last_error = Some(error);
        self.consecutive_failures
    }
}
