use chrono::{NaiveDate, Utc};
use chrono_tz::Europe::Kyiv;

/// The distribution operators publish schedules in local Kyiv time, so
/// "today" must follow their clock rather than UTC.
pub fn kyiv_today() -> NaiveDate {
    Utc::now().with_timezone(&Kyiv).date_naive()
}
