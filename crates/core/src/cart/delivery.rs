//! Standard delivery estimate shown at checkout.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

const EARLIEST_DAYS: u64 = 7;
const LATEST_DAYS: u64 = 14;

/// Earliest and latest expected delivery dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryWindow {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

impl DeliveryWindow {
    /// Window for an order placed on `ordered`: 7 to 14 days out, with any
    /// bound that lands on a weekend pushed to the following Monday.
    #[must_use]
    pub fn from_order_date(ordered: NaiveDate) -> Self {
        Self {
            earliest: next_weekday(add_days(ordered, EARLIEST_DAYS)),
            latest: next_weekday(add_days(ordered, LATEST_DAYS)),
        }
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

fn next_weekday(date: NaiveDate) -> NaiveDate {
    let shift = match date.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        _ => 0,
    };
    add_days(date, shift)
}
