//! Protobuf wire format types for the Prometheus remote_read protocol
//!
//! These prost-derived types match the Prometheus `prompb` definitions for the
//! SAMPLES response type. Chunked (streamed XOR) responses are not produced.
//!
//! Reference:
//! - https://github.com/prometheus/prometheus/blob/main/prompb/remote.proto
//! - https://github.com/prometheus/prometheus/blob/main/prompb/types.proto

use prost::Message;

/// Content type for remote_read requests and responses
pub const CONTENT_TYPE: &str = "application/x-protobuf";

/// Content encoding for remote_read bodies (snappy block format, not framed)
pub const CONTENT_ENCODING: &str = "snappy";

/// Reserved label carrying the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Top-level remote_read request: a batch of independent queries
#[derive(Clone, PartialEq, Message)]
pub struct ReadRequest {
    #[prost(message, repeated, tag = "1")]
    pub queries: Vec<Query>,
    #[prost(enumeration = "read_request::ResponseType", repeated, tag = "2")]
    pub accepted_response_types: Vec<i32>,
}

pub mod read_request {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ResponseType {
        Samples = 0,
        StreamedXorChunks = 1,
    }
}

/// One result per query, in request order
#[derive(Clone, PartialEq, Message)]
pub struct ReadResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<QueryResult>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Query {
    #[prost(int64, tag = "1")]
    pub start_timestamp_ms: i64,
    #[prost(int64, tag = "2")]
    pub end_timestamp_ms: i64,
    #[prost(message, repeated, tag = "3")]
    pub matchers: Vec<LabelMatcher>,
    #[prost(message, optional, tag = "4")]
    pub hints: Option<ReadHints>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryResult {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

/// A single time series with labels and samples
#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

/// A label key-value pair
#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// A sample value with timestamp in milliseconds
#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// Label constraint of a query
#[derive(Clone, PartialEq, Message)]
pub struct LabelMatcher {
    #[prost(enumeration = "label_matcher::Type", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub value: String,
}

pub mod label_matcher {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        Eq = 0,
        Neq = 1,
        Re = 2,
        Nre = 3,
    }
}

impl LabelMatcher {
    pub fn new(r#type: label_matcher::Type, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            r#type: r#type as i32,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Optional plotting hints Prometheus attaches to a query
#[derive(Clone, PartialEq, Message)]
pub struct ReadHints {
    #[prost(int64, tag = "1")]
    pub step_ms: i64,
    #[prost(string, tag = "2")]
    pub func: String,
    #[prost(int64, tag = "3")]
    pub start_ms: i64,
    #[prost(int64, tag = "4")]
    pub end_ms: i64,
    #[prost(string, repeated, tag = "5")]
    pub grouping: Vec<String>,
    #[prost(bool, tag = "6")]
    pub by: bool,
    #[prost(int64, tag = "7")]
    pub range_ms: i64,
}

/// Decode a snappy-compressed protobuf ReadRequest from raw bytes.
pub fn decode_read_request(data: &[u8]) -> anyhow::Result<ReadRequest> {
    let decompressed = snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(|e| anyhow::anyhow!("Snappy decompression failed: {e}"))?;

    ReadRequest::decode(decompressed.as_slice())
        .map_err(|e| anyhow::anyhow!("Protobuf decode failed: {e}"))
}

/// Encode a ReadResponse as snappy-compressed protobuf.
pub fn encode_read_response(response: &ReadResponse) -> anyhow::Result<Vec<u8>> {
    snap::raw::Encoder::new()
        .compress_vec(&response.encode_to_vec())
        .map_err(|e| anyhow::anyhow!("Snappy compression failed: {e}"))
}
