use thiserror::Error;

/// Failure taxonomy of one ingestion cycle. Adapter and normalizer failures
/// are contained per cycle; none of these crash the scheduler process.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Network or file access failure. Retried on the next scheduled tick,
    /// never immediately.
    #[error("transport failure")]
    Transport(#[source] anyhow::Error),

    /// Structural mismatch in the upstream source. The batch is discarded and
    /// the payload reference is kept so the raw content can be inspected
    /// offline through the payload cache.
    #[error("parse failure: missing {missing_field} (payload {payload_ref})")]
    Parse {
        missing_field: String,
        payload_ref: String,
    },

    /// The normalized batch failed sanity thresholds, e.g. a mostly-garbled
    /// recognition run.
    #[error("validation failure: {discarded} of {total} entries discarded")]
    Validation { discarded: usize, total: usize },

    /// Another cycle committed between our read and our write.
    #[error("version conflict: expected {expected}, stored {actual}")]
    VersionConflict { expected: u64, actual: u64 },
}

impl IngestError {
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        IngestError::Transport(err.into())
    }

    pub fn parse(missing_field: impl Into<String>, payload_ref: impl Into<String>) -> Self {
        IngestError::Parse {
            missing_field: missing_field.into(),
            payload_ref: payload_ref.into(),
        }
    }
}
