pub mod addresses;
pub mod outage_schedules;
