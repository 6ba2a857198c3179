use crate::adapters::{FetchedPayload, ProviderAdapter, RawPayload};
use crate::adapters::payload_cache::PayloadCache;
use crate::errors::IngestError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use entities::outage_schedules::{
    normalize_slots, AdapterName, AdapterPriority, OutageKind, QueueId, RegionId, ScheduleEntry,
    TimeSlot,
};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use shared_kernel::http_client::HttpClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;
use url::Url;

lazy_static! {
    static ref SCHEDULE_DATE: Regex =
        Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").expect("SCHEDULE_DATE regex to compile");
    static ref TIME_RANGE: Regex =
        Regex::new(r"(\d{1,2}):(\d{2})\s*[-–—]\s*(\d{1,2}):(\d{2})")
            .expect("TIME_RANGE regex to compile");
    static ref QUEUE_LABEL: Regex =
        Regex::new(r"^\d+(?:\.\d+)?$").expect("QUEUE_LABEL regex to compile");
    static ref TABLE: Selector = Selector::parse("table").expect("table selector to parse");
    static ref ROW: Selector = Selector::parse("tr").expect("tr selector to parse");
    static ref CELL: Selector = Selector::parse("th, td").expect("cell selector to parse");
}

/// Adapter for operators publishing the hourly timetable as an HTML table
/// (queue rows against interval columns). Extraction keys on header labels,
/// not cell positions, so reordered rows or columns parse identically.
pub struct MarkupScheduleAdapter {
    region: RegionId,
    source_url: Url,
    cache: Arc<PayloadCache>,
}

impl MarkupScheduleAdapter {
    pub fn new(region: RegionId, source_url: Url, cache: Arc<PayloadCache>) -> Self {
        Self {
            region,
            source_url,
            cache,
        }
    }
}

#[async_trait]
impl ProviderAdapter for MarkupScheduleAdapter {
    fn name(&self) -> AdapterName {
        AdapterName::from("markup")
    }

    fn priority(&self) -> AdapterPriority {
        AdapterPriority::Markup
    }

    #[tracing::instrument(err, skip(self), fields(region = %self.region))]
    async fn fetch(&self) -> Result<FetchedPayload, IngestError> {
        let page = HttpClient::get_text(self.source_url.clone())
            .await
            .map_err(IngestError::transport)?;
        let payload = RawPayload::new(self.source_url.clone(), Bytes::from(page));
        let changed = self.cache.store(self.source_url.as_str(), payload.clone());
        Ok(FetchedPayload { payload, changed })
    }

    async fn parse(&self, payload: &RawPayload) -> Result<Vec<ScheduleEntry>, IngestError> {
        extract_timetable(&self.region, payload)
    }
}

fn extract_timetable(
    region: &RegionId,
    payload: &RawPayload,
) -> Result<Vec<ScheduleEntry>, IngestError> {
    let html = std::str::from_utf8(&payload.bytes)
        .map_err(|_| IngestError::parse("utf-8 page content", &payload.content_hash))?;

    let date = schedule_date(html)
        .ok_or_else(|| IngestError::parse("schedule date", &payload.content_hash))?;

    let document = Html::parse_document(html);

    let mut timetable = None;
    for table in document.select(&TABLE) {
        if let Some(found) = timetable_columns(&table) {
            timetable = Some((table, found));
            break;
        }
    }
    let (table, columns) =
        timetable.ok_or_else(|| IngestError::parse("queue timetable", &payload.content_hash))?;

    if columns.slots.is_empty() {
        return Err(IngestError::parse(
            "interval columns",
            &payload.content_hash,
        ));
    }

    let mut slots_by_queue: BTreeMap<QueueId, Vec<TimeSlot>> = BTreeMap::new();
    for row in table.select(&ROW).skip(1) {
        let cells: Vec<String> = row.select(&CELL).map(|cell| cell_text(&cell)).collect();
        let Some(queue_label) = cells.get(columns.queue) else {
            continue;
        };
        if !QUEUE_LABEL.is_match(queue_label) {
            continue;
        }
        let queue = QueueId::from(queue_label.as_str());
        for (column, slot) in &columns.slots {
            match cells.get(*column) {
                Some(text) if is_outage_marker(text) => {
                    slots_by_queue.entry(queue.clone()).or_default().push(*slot);
                }
                _ => {}
            }
        }
    }

    let entries = slots_by_queue
        .into_iter()
        .filter(|(_, slots)| !slots.is_empty())
        .map(|(queue, slots)| ScheduleEntry {
            region: region.clone(),
            queue,
            date,
            kind: OutageKind::Planned,
            slots: normalize_slots(slots),
            source_fetched_at: payload.fetched_at,
            confidence: None,
        })
        .collect();
    Ok(entries)
}

struct TimetableColumns {
    queue: usize,
    slots: Vec<(usize, TimeSlot)>,
}

/// Reads the header row and maps column indices to meaning by label. Returns
/// `None` when no queue column exists, which disqualifies the table.
fn timetable_columns(table: &ElementRef) -> Option<TimetableColumns> {
    let header = table.select(&ROW).next()?;
    let mut queue = None;
    let mut slots = Vec::new();
    for (index, cell) in header.select(&CELL).enumerate() {
        let text = cell_text(&cell);
        let lowered = text.to_lowercase();
        if lowered.contains("черга") || lowered.contains("queue") {
            queue = Some(index);
        } else if let Some(slot) = parse_time_range(&text) {
            slots.push((index, slot));
        }
    }
    queue.map(|queue| TimetableColumns { queue, slots })
}

fn parse_time_range(text: &str) -> Option<TimeSlot> {
    let captures = TIME_RANGE.captures(text)?;
    let start = chrono::NaiveTime::from_hms_opt(
        captures[1].parse().ok()?,
        captures[2].parse().ok()?,
        0,
    )?;
    let end_hour: u32 = captures[3].parse().ok()?;
    let end_minute: u32 = captures[4].parse().ok()?;
    // A column ending at 24:00 closes the day. NaiveTime cannot represent
    // 24:00, so clamp to the last representable instant of the day.
    let end = if end_hour == 24 && end_minute == 0 {
        chrono::NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        chrono::NaiveTime::from_hms_opt(end_hour, end_minute, 0)?
    };
    match TimeSlot::new(start, end) {
        Ok(slot) => Some(slot),
        Err(err) => {
            warn!(%err, "discarding inverted interval column");
            None
        }
    }
}

fn schedule_date(text: &str) -> Option<NaiveDate> {
    let captures = SCHEDULE_DATE.captures(text)?;
    NaiveDate::from_ymd_opt(
        captures[3].parse().ok()?,
        captures[2].parse().ok()?,
        captures[1].parse().ok()?,
    )
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_owned()
}

/// Operators mark outage cells with a cross or an explicit word; empty cells
/// and dashes mean power stays on.
fn is_outage_marker(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    matches!(lowered.as_str(), "✕" | "x" | "х" | "так")
        || lowered.contains("відключ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(html: &str) -> RawPayload {
        RawPayload::new(
            Url::parse("https://hoe.example.ua/schedule").unwrap(),
            Bytes::from(html.to_owned()),
        )
    }

    fn region() -> RegionId {
        RegionId::from("khm")
    }

    const PAGE: &str = r#"
        <html><body>
        <h2>Графік погодинних відключень на 10.01.2024</h2>
        <table>
          <tr><th>Черга</th><th>00:00-04:00</th><th>04:00-08:00</th><th>08:00-12:00</th></tr>
          <tr><td>1.1</td><td>✕</td><td></td><td>✕</td></tr>
          <tr><td>2.1</td><td></td><td>х</td><td></td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn extracts_queue_slots_from_labelled_table() {
        let entries = extract_timetable(&region(), &payload(PAGE)).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.queue, QueueId::from("1.1"));
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(first.kind, OutageKind::Planned);
        assert_eq!(
            first.slots,
            vec![
                TimeSlot::new(
                    chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
                    chrono::NaiveTime::from_hms_opt(4, 0, 0).unwrap()
                )
                .unwrap(),
                TimeSlot::new(
                    chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                    chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap()
                )
                .unwrap(),
            ]
        );
        assert!(first.confidence.is_none());
    }

    #[test]
    fn tolerates_reordered_columns() {
        let reordered = r#"
            <html><body>
            <p>Оновлено 10.01.2024</p>
            <table>
              <tr><th>08:00-12:00</th><th>Черга</th><th>00:00-04:00</th></tr>
              <tr><td>✕</td><td>1.1</td><td>✕</td></tr>
            </table>
            </body></html>"#;
        let baseline = extract_timetable(&region(), &payload(PAGE)).unwrap();
        let entries = extract_timetable(&region(), &payload(reordered)).unwrap();
        assert_eq!(entries[0].slots, baseline[0].slots);
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let page = "<html><body><p>Графіки на 10.01.2024 тимчасово недоступні</p></body></html>";
        let err = extract_timetable(&region(), &payload(page)).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Parse { missing_field, .. } if missing_field == "queue timetable"
        ));
    }

    #[test]
    fn missing_date_is_a_parse_error() {
        let page = "<html><body><table><tr><th>Черга</th></tr></table></body></html>";
        let err = extract_timetable(&region(), &payload(page)).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Parse { missing_field, .. } if missing_field == "schedule date"
        ));
    }
}
