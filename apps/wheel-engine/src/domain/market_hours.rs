//! US equity regular session.
//!
//! 09:30 to 16:00 America/New_York, Monday through Friday, both ends inclusive.
//! Exchange holidays are not modelled; the broker rejects orders on those days.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::America::New_York;

const OPEN: (u32, u32) = (9, 30);
const CLOSE: (u32, u32) = (16, 0);

/// Whether `now` falls inside the regular session.
#[must_use]
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&New_York);
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let time = local.time();
    let (Some(open), Some(close)) = (
        NaiveTime::from_hms_opt(OPEN.0, OPEN.1, 0),
        NaiveTime::from_hms_opt(CLOSE.0, CLOSE.1, 0),
    ) else {
        return false;
    };

    time >= open && time <= close
}

/// Calendar date in New York for `now`.
#[must_use]
pub fn trading_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&New_York).date_naive()
}
