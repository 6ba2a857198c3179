use anyhow::Context;
use entities::addresses::AddressRecord;
use entities::outage_schedules::{QueueId, RegionId};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// One line of the JSON-lines interchange format. Files are per region, so
/// lines carry no region field.
#[derive(Debug, Serialize, Deserialize)]
struct AddressLine {
    city: String,
    street: String,
    house_number: String,
    queue: QueueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone: Option<String>,
}

/// Parses a whole JSON-lines file into address records. Parsing happens
/// up front so a malformed line rejects the entire import instead of leaving
/// a partial set behind. Blank lines are ignored.
pub fn read_records(
    region: &RegionId,
    reader: impl BufRead,
) -> anyhow::Result<Vec<AddressRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_number}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: AddressLine = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse address record on line {line_number}"))?;
        records.push(AddressRecord {
            region: region.clone(),
            city: parsed.city,
            street: parsed.street,
            house_number: parsed.house_number,
            queue: parsed.queue,
            zone: parsed.zone,
        });
    }
    Ok(records)
}

pub fn write_records(records: &[AddressRecord], mut writer: impl Write) -> anyhow::Result<()> {
    for record in records {
        let line = AddressLine {
            city: record.city.clone(),
            street: record.street.clone(),
            house_number: record.house_number.clone(),
            queue: record.queue.clone(),
            zone: record.zone.clone(),
        };
        serde_json::to_writer(&mut writer, &line).context("Failed to serialize address record")?;
        writer.write_all(b"\n").context("Failed to write address record")?;
    }
    Ok(())
}
