mod document_image;
mod markup;
mod payload_cache;
mod recognizer;

pub use document_image::DocumentImageAdapter;
pub use markup::MarkupScheduleAdapter;
pub use payload_cache::PayloadCache;
pub use recognizer::{RecognizedText, TesseractCli, TextRecognizer};

use crate::errors::IngestError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use entities::outage_schedules::{AdapterName, AdapterPriority, ScheduleEntry};
use sha2::{Digest, Sha256};
use url::Url;

/// Raw content fetched from one upstream source, content-addressed so it can
/// be re-parsed (quarantine review, retry) without re-fetching.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub source_url: Url,
    pub bytes: Bytes,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(source_url: Url, bytes: Bytes) -> Self {
        let digest = Sha256::digest(&bytes);
        let content_hash = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self {
            source_url,
            bytes,
            content_hash,
            fetched_at: Utc::now(),
        }
    }
}

/// A fetched payload together with whether its content differs from what the
/// same source served on the previous poll. A cycle where no source changed
/// can skip parsing entirely.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub payload: RawPayload,
    pub changed: bool,
}

/// One per-region, per-source unit of the ingestion pipeline. The two
/// variants (structured markup, document image with recognition) present the
/// same contract so the scheduler stays adapter-agnostic.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> AdapterName;

    fn priority(&self) -> AdapterPriority;

    async fn fetch(&self) -> Result<FetchedPayload, IngestError>;

    async fn parse(&self, payload: &RawPayload) -> Result<Vec<ScheduleEntry>, IngestError>;
}

/// Output of one adapter run, fed into the normalizer together with batches
/// from the region's other adapters.
#[derive(Debug, Clone)]
pub struct AdapterBatch {
    pub adapter: AdapterName,
    pub priority: AdapterPriority,
    pub payload_ref: String,
    pub entries: Vec<ScheduleEntry>,
}
