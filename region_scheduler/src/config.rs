use anyhow::Context;
use entities::outage_schedules::RegionId;
use outage_ingestion::adapters::{
    DocumentImageAdapter, MarkupScheduleAdapter, PayloadCache, ProviderAdapter, TextRecognizer,
};
use outage_ingestion::normalizer::NormalizerConfig;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Markup,
    DocumentImage,
}

/// One upstream source of a region, in the order adapters should run.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterRef {
    pub kind: AdapterKind,
    pub source_url: Url,
}

impl AdapterRef {
    pub fn build(
        &self,
        region: &RegionId,
        cache: Arc<PayloadCache>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Arc<dyn ProviderAdapter> {
        match self.kind {
            AdapterKind::Markup => Arc::new(MarkupScheduleAdapter::new(
                region.clone(),
                self.source_url.clone(),
                cache,
            )),
            AdapterKind::DocumentImage => Arc::new(DocumentImageAdapter::new(
                region.clone(),
                self.source_url.clone(),
                recognizer,
                cache,
            )),
        }
    }
}

/// Runtime configuration of one service area. The region set itself is fixed
/// at deployment; `enabled` and the thresholds are tunable without a redeploy.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub id: RegionId,
    pub enabled: bool,
    pub poll_interval_minutes: u64,
    pub adapters: Vec<AdapterRef>,
    #[serde(flatten)]
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub regions: Vec<RegionConfig>,
    /// Tesseract language spec for the document-image adapters, e.g. "ukr+eng".
    pub recognizer_languages: String,
}

impl Settings {
    pub fn parse() -> anyhow::Result<Settings> {
        shared_kernel::configuration::config::<Settings>()
            .context("Failed to deserialize settings to region scheduler settings")
    }
}
