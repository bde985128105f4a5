//! Sales-over-time reporting shared by every sink.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Length of the sales-over-time window, in seconds.
pub const SALES_WINDOW_SECS: i64 = 60;

/// Tickets sold during one wall-clock second.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesBucket {
    /// Start of the second
    pub second: DateTime<Utc>,
    /// `HH:MM:SS` label for charts
    pub label: String,
    /// Tickets sold during the second
    pub count: u32,
}

impl SalesBucket {
    /// Bucket for the second starting at `second`.
    #[must_use]
    pub fn new(second: DateTime<Utc>, count: u32) -> Self {
        Self {
            second,
            label: second.format("%H:%M:%S").to_string(),
            count,
        }
    }
}

/// Group sale timestamps into per-second buckets covering the minute before
/// `until` (exclusive start, inclusive end). Seconds without sales are
/// omitted; buckets are returned oldest first.
pub fn sales_per_second<I>(sold_at: I, until: DateTime<Utc>) -> Vec<SalesBucket>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let since = until - Duration::seconds(SALES_WINDOW_SECS);
    let mut counts: BTreeMap<i64, u32> = BTreeMap::new();
    for at in sold_at {
        if at > since && at <= until {
            *counts.entry(at.timestamp()).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .filter_map(|(secs, count)| {
            DateTime::from_timestamp(secs, 0).map(|second| SalesBucket::new(second, count))
        })
        .collect()
}
