//! Sampling-hint resolution.
//!
//! When plotting graphs, Prometheus or Grafana may suggest returning fewer
//! than all datapoints by hinting with `step_ms` and `range_ms`. Large enough
//! hints switch the query from raw timestamps to fixed-width time buckets.

use std::fmt;

use common::prompb::ReadHints;

/// Only consider sampling data when the step is larger than this
pub const MIN_STEP_HINT_MS: i64 = 2000;

pub const TIME_COLUMN: &str = "updated_at";

/// The time expression the query groups and orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Raw,
    Bucketed { interval_secs: i64 },
}

impl TimeField {
    /// Pick the time expression for a query.
    pub fn resolve(hints: Option<&ReadHints>, ignore_hints: bool) -> Self {
        if ignore_hints {
            return Self::Raw;
        }

        match hints.and_then(|h| bucket_interval_secs(h.step_ms, h.range_ms)) {
            Some(interval_secs) => Self::Bucketed { interval_secs },
            None => Self::Raw,
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str(TIME_COLUMN),
            Self::Bucketed { interval_secs } => write!(
                f,
                "toStartOfInterval({TIME_COLUMN}, INTERVAL {interval_secs} second)"
            ),
        }
    }
}

/// Bucket width in whole seconds, or `None` when raw timestamps should be used.
pub fn bucket_interval_secs(step_ms: i64, range_ms: i64) -> Option<i64> {
    if step_ms <= MIN_STEP_HINT_MS {
        return None;
    }

    let mut interval = step_ms;
    if range_ms > 0 && range_ms < step_ms {
        interval = range_ms;
    }

    // The hints seem optimistic, return more datapoints than asked for.
    interval /= 2;

    // DateTime columns have second resolution
    interval /= 1000;

    Some(interval.max(1))
}
