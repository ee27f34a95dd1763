//! Object key layout: `[prefix]logs/YYYY/MM/DD/HH/[MM/]<name>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time-bucket granularity of the key path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    #[default]
    Hour,
    Minute,
}

/// Directory part of an object key, always ending in `/`.
pub fn log_prefix(prefix: Option<&str>, partition: Partition, now: DateTime<Utc>) -> String {
    let layout = match partition {
        Partition::Hour => "logs/%Y/%m/%d/%H/",
        Partition::Minute => "logs/%Y/%m/%d/%H/%M/",
    };
    format!("{}{}", prefix.unwrap_or_default(), now.format(layout))
}

fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%S").to_string()
}

/// `<stamp>_<window secs>_<seq:08>.json.gz`
pub fn padded_page_name(now: DateTime<Utc>, window: Duration, seq: u64) -> String {
    format!("{}_{}_{:08}.json.gz", stamp(now), window.as_secs(), seq)
}

/// `<stamp>_<window secs>_<seq>.json.gz`
pub fn page_name(now: DateTime<Utc>, window: Duration, seq: u64) -> String {
    format!("{}_{}_{}.json.gz", stamp(now), window.as_secs(), seq)
}
