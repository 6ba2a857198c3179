use crate::outage_schedules::{QueueId, RegionId};
use serde::{Deserialize, Serialize};

/// One street-address row of the per-region address database. Bulk-loaded and
/// replaced wholesale via import, never mutated by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub region: RegionId,
    pub city: String,
    pub street: String,
    pub house_number: String,
    pub queue: QueueId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl AddressRecord {
    pub fn key(&self) -> AddressKey {
        AddressKey::new(&self.city, &self.street, &self.house_number)
    }
}

/// Lookup key normalized for exact matching: case-folded, with runs of
/// whitespace collapsed to a single space. No fuzzy matching happens on top
/// of this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressKey {
    pub city: String,
    pub street: String,
    pub house_number: String,
}

impl AddressKey {
    pub fn new(city: &str, street: &str, house_number: &str) -> Self {
        Self {
            city: normalize_component(city),
            street: normalize_component(street),
            house_number: normalize_component(house_number),
        }
    }
}

fn normalize_component(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let key = AddressKey::new("  Київ ", "вул.  Шевченка", " 12А");
        assert_eq!(key.city, "київ");
        assert_eq!(key.street, "вул. шевченка");
        assert_eq!(key.house_number, "12а");
    }

    #[test]
    fn equal_keys_for_cosmetically_different_addresses() {
        let a = AddressKey::new("Kyiv", "Shevchenka", "12");
        let b = AddressKey::new("kyiv ", " shevchenka", "12 ");
        assert_eq!(a, b);
    }
}
