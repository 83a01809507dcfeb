//! Regroups the flat row stream into Prometheus time series.
//!
//! Rows arrive sorted by `(metric_name, labels, t)`, so every series is a
//! contiguous run. A new series starts whenever the identity changes; nothing
//! is buffered or re-sorted. Out-of-order input therefore yields fragmented
//! series rather than an error.

use common::prompb::{Label, METRIC_NAME_LABEL, QueryResult, Sample, TimeSeries};
use futures::{Stream, TryStreamExt, pin_mut};

use crate::error::ReadError;
use crate::executor::StorageRow;
use crate::matcher::decode_label;

/// Accumulates rows into series. Call [`SeriesAssembler::finish`] once the
/// row stream is exhausted to flush the last series.
#[derive(Debug, Default)]
pub struct SeriesAssembler {
    finished: Vec<TimeSeries>,
    current: Option<ActiveSeries>,
}

#[derive(Debug)]
struct ActiveSeries {
    metric_name: String,
    labels: Vec<String>,
    series: TimeSeries,
}

impl ActiveSeries {
    fn open(metric_name: String, labels: Vec<String>) -> Self {
        let mut prom_labels = Vec::with_capacity(labels.len() + 1);
        prom_labels.push(Label {
            name: METRIC_NAME_LABEL.to_string(),
            value: metric_name.clone(),
        });
        prom_labels.extend(labels.iter().map(|label| {
            let (name, value) = decode_label(label);
            Label {
                name: name.to_string(),
                value: value.to_string(),
            }
        }));

        Self {
            metric_name,
            labels,
            series: TimeSeries {
                labels: prom_labels,
                samples: Vec::new(),
            },
        }
    }

    fn is(&self, metric_name: &str, labels: &[String]) -> bool {
        self.metric_name == metric_name && self.labels == labels
    }
}

impl SeriesAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: StorageRow) {
        let sample = Sample {
            value: row.value,
            timestamp: row.timestamp.timestamp_millis(),
        };

        let same_series = self
            .current
            .as_ref()
            .is_some_and(|active| active.is(&row.metric_name, &row.labels));

        if !same_series {
            self.close_current();
            self.current = Some(ActiveSeries::open(row.metric_name, row.labels));
        }

        if let Some(active) = self.current.as_mut() {
            active.series.samples.push(sample);
        }
    }

    /// Terminal transition: flush the active series and hand out the result.
    pub fn finish(mut self) -> QueryResult {
        self.close_current();
        QueryResult {
            timeseries: self.finished,
        }
    }

    fn close_current(&mut self) {
        if let Some(active) = self.current.take() {
            self.finished.push(active.series);
        }
    }
}

/// Drain a row stream into a [`QueryResult`].
///
/// The first failing row aborts the whole result.
pub async fn assemble<S>(rows: S) -> Result<QueryResult, ReadError>
where
    S: Stream<Item = Result<StorageRow, ReadError>>,
{
    pin_mut!(rows);

    let mut assembler = SeriesAssembler::new();
    while let Some(row) = rows.try_next().await? {
        assembler.push(row);
    }

    Ok(assembler.finish())
}
