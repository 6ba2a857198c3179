use crate::adapters::payload_cache::PayloadCache;
use crate::adapters::recognizer::TextRecognizer;
use crate::adapters::{FetchedPayload, ProviderAdapter, RawPayload};
use crate::errors::IngestError;
use async_trait::async_trait;
use chrono::NaiveDate;
use entities::outage_schedules::{
    normalize_slots, AdapterName, AdapterPriority, OutageKind, QueueId, RegionId, ScheduleEntry,
    TimeSlot,
};
use lazy_static::lazy_static;
use regex::Regex;
use shared_kernel::date_time::kyiv_today;
use shared_kernel::http_client::HttpClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;
use url::Url;

lazy_static! {
    static ref SCHEDULE_DATE: Regex =
        Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").expect("SCHEDULE_DATE regex to compile");
    static ref QUEUE_TOKEN: Regex =
        Regex::new(r"(?:Черга|черга|Підчерга|підчерга)\s*(\d+(?:\.\d+)?)|^(\d+(?:\.\d+)?)\b")
            .expect("QUEUE_TOKEN regex to compile");
    static ref TIME_TOKEN: Regex =
        Regex::new(r"(\d{1,2}):(\d{2})\s*[-–—]\s*(\d{1,2}):(\d{2})")
            .expect("TIME_TOKEN regex to compile");
}

const PDF_MAGIC: &[u8] = b"%PDF";

/// Adapter for operators publishing schedules as scanned PDFs or images.
///
/// PDFs with a text layer go through `pdf_extract`; everything else goes
/// through the [`TextRecognizer`] seam. Recognition accuracy varies, so each
/// reconstructed entry carries the run's confidence score and sub-threshold
/// entries end up in quarantine instead of being committed.
pub struct DocumentImageAdapter {
    region: RegionId,
    source_url: Url,
    recognizer: Arc<dyn TextRecognizer>,
    cache: Arc<PayloadCache>,
}

impl DocumentImageAdapter {
    pub fn new(
        region: RegionId,
        source_url: Url,
        recognizer: Arc<dyn TextRecognizer>,
        cache: Arc<PayloadCache>,
    ) -> Self {
        Self {
            region,
            source_url,
            recognizer,
            cache,
        }
    }
}

#[async_trait]
impl ProviderAdapter for DocumentImageAdapter {
    fn name(&self) -> AdapterName {
        AdapterName::from("document-image")
    }

    fn priority(&self) -> AdapterPriority {
        AdapterPriority::DocumentImage
    }

    #[tracing::instrument(err, skip(self), fields(region = %self.region))]
    async fn fetch(&self) -> Result<FetchedPayload, IngestError> {
        let bytes = HttpClient::get_bytes(self.source_url.clone())
            .await
            .map_err(IngestError::transport)?;
        let payload = RawPayload::new(self.source_url.clone(), bytes);
        let changed = self.cache.store(self.source_url.as_str(), payload.clone());
        Ok(FetchedPayload { payload, changed })
    }

    async fn parse(&self, payload: &RawPayload) -> Result<Vec<ScheduleEntry>, IngestError> {
        let (text, confidence) = if payload.bytes.starts_with(PDF_MAGIC) {
            let text = pdf_extract::extract_text_from_mem(&payload.bytes)
                .map_err(|_| IngestError::parse("pdf text layer", &payload.content_hash))?;
            // Embedded text carries no recognition uncertainty.
            (text, 1.0)
        } else {
            let recognized = self
                .recognizer
                .recognize(&payload.bytes)
                .await
                .map_err(IngestError::transport)?;
            (recognized.text, recognized.confidence)
        };
        reconstruct_entries(&self.region, &text, confidence, payload)
    }
}

/// Rebuilds schedule entries from recognized queue/interval tokens. Lines
/// carrying a queue token set the current queue; interval tokens attach to it.
fn reconstruct_entries(
    region: &RegionId,
    text: &str,
    confidence: f32,
    payload: &RawPayload,
) -> Result<Vec<ScheduleEntry>, IngestError> {
    // Operators publish these documents on the day they apply, so a date the
    // recognizer garbled falls back to the current Kyiv date.
    let date = schedule_date(text).unwrap_or_else(|| {
        warn!(%region, "no schedule date recognized, assuming today");
        kyiv_today()
    });

    let mut slots_by_queue: BTreeMap<QueueId, Vec<TimeSlot>> = BTreeMap::new();
    let mut current_queue: Option<QueueId> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(captures) = QUEUE_TOKEN.captures(line) {
            if let Some(label) = captures.get(1) {
                current_queue = Some(QueueId::from(label.as_str()));
            } else if let Some(label) = captures.get(2) {
                // A bare leading number followed by ':' is the start of an
                // interval token, not a queue label.
                if !line[label.end()..].starts_with(':') {
                    current_queue = Some(QueueId::from(label.as_str()));
                }
            }
        }
        let Some(queue) = current_queue.clone() else {
            continue;
        };
        for captures in TIME_TOKEN.captures_iter(line) {
            match parse_slot(&captures) {
                Some(slot) => slots_by_queue.entry(queue.clone()).or_default().push(slot),
                None => {
                    warn!(%queue, line, "discarding unparseable recognized interval");
                }
            }
        }
    }

    if slots_by_queue.is_empty() {
        return Err(IngestError::parse(
            "queue interval tokens",
            &payload.content_hash,
        ));
    }

    let entries = slots_by_queue
        .into_iter()
        .map(|(queue, slots)| ScheduleEntry {
            region: region.clone(),
            queue,
            date,
            kind: OutageKind::Planned,
            slots: normalize_slots(slots),
            source_fetched_at: payload.fetched_at,
            confidence: Some(confidence),
        })
        .collect();
    Ok(entries)
}

fn parse_slot(captures: &regex::Captures) -> Option<TimeSlot> {
    let start = chrono::NaiveTime::from_hms_opt(
        captures[1].parse().ok()?,
        captures[2].parse().ok()?,
        0,
    )?;
    let end_hour: u32 = captures[3].parse().ok()?;
    let end_minute: u32 = captures[4].parse().ok()?;
    // Documents write the last window of the day as ending at 24:00.
    // NaiveTime cannot represent 24:00, so clamp to the last representable
    // instant of the day.
    let end = if end_hour == 24 && end_minute == 0 {
        chrono::NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        chrono::NaiveTime::from_hms_opt(end_hour, end_minute, 0)?
    };
    TimeSlot::new(start, end).ok()
}

fn schedule_date(text: &str) -> Option<NaiveDate> {
    let captures = SCHEDULE_DATE.captures(text)?;
    NaiveDate::from_ymd_opt(
        captures[3].parse().ok()?,
        captures[2].parse().ok()?,
        captures[1].parse().ok()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::recognizer::RecognizedText;
    use bytes::Bytes;

    struct ScriptedRecognizer {
        text: &'static str,
        confidence: f32,
    }

    #[async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        async fn recognize(&self, _image: &[u8]) -> anyhow::Result<RecognizedText> {
            Ok(RecognizedText {
                text: self.text.to_owned(),
                confidence: self.confidence,
            })
        }
    }

    fn adapter(text: &'static str, confidence: f32) -> DocumentImageAdapter {
        DocumentImageAdapter::new(
            RegionId::from("vin"),
            Url::parse("https://voe.example.ua/schedule.png").unwrap(),
            Arc::new(ScriptedRecognizer { text, confidence }),
            Arc::new(PayloadCache::new()),
        )
    }

    fn image_payload() -> RawPayload {
        RawPayload::new(
            Url::parse("https://voe.example.ua/schedule.png").unwrap(),
            Bytes::from_static(b"\x89PNG fake image bytes"),
        )
    }

    #[tokio::test]
    async fn reconstructs_entries_from_recognized_tokens() {
        let adapter = adapter(
            "Графік на 10.01.2024\nЧерга 1.1\n08:00-12:00, 16:00-20:00\nЧерга 2.1 10:00-14:00",
            0.9,
        );
        let entries = adapter.parse(&image_payload()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].queue, QueueId::from("1.1"));
        assert_eq!(entries[0].slots.len(), 2);
        assert_eq!(entries[0].confidence, Some(0.9));
        assert_eq!(entries[1].queue, QueueId::from("2.1"));
    }

    #[tokio::test]
    async fn garbled_recognition_without_tokens_is_a_parse_error() {
        let adapter = adapter("10.01.2024 щось нерозбірливе без інтервалів", 0.2);
        let err = adapter.parse(&image_payload()).await.unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[tokio::test]
    async fn interval_ending_at_midnight_is_clamped_not_dropped() {
        let adapter = adapter("На 10.01.2024\nЧерга 1\n08:00-10:00\n20:00-24:00", 0.9);
        let entries = adapter.parse(&image_payload()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slots.len(), 2);
        assert_eq!(
            entries[0].slots[1].end,
            chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_date_falls_back_to_the_current_kyiv_day() {
        let adapter = adapter("Черга 1\n08:00-10:00", 0.9);
        let entries = adapter.parse(&image_payload()).await.unwrap();
        assert_eq!(entries[0].date, kyiv_today());
    }

    #[tokio::test]
    async fn inverted_recognized_intervals_are_dropped() {
        let adapter = adapter("На 10.01.2024\nЧерга 3.2\n18:00-06:00\n08:00-10:00", 0.8);
        let entries = adapter.parse(&image_payload()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slots.len(), 1);
    }
}
