//! ClickHouse execution surface.
//!
//! Statements go over the ClickHouse HTTP interface. The `clickhouse` client
//! substitutes `?` placeholders with escaped literals before sending, so bound
//! values never reach the server as raw SQL. Rows are streamed in RowBinary
//! format; dropping the stream cancels the HTTP request.

use async_trait::async_trait;
use chrono::DateTime;
use clickhouse::{Client, Compression, Row, error::Error as ClickHouseError};
use common::config::{ClickHouseConfig, is_table_identifier};
use serde::Deserialize;

use crate::clause::SqlArg;
use crate::error::ReadError;
use crate::executor::{RowStream, SqlExecutor, Statement, StorageRow};

/// Column layout produced by the grouped sample query.
#[derive(Debug, Row, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
struct SampleRow {
    metric_name: String,
    slb: Vec<String>,
    /// `DateTime`, seconds since the epoch
    t: u32,
    max_0: f64,
}

impl TryFrom<SampleRow> for StorageRow {
    type Error = ReadError;

    fn try_from(row: SampleRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp(i64::from(row.t), 0)
            .ok_or_else(|| ReadError::RowDecode(format!("timestamp {} out of range", row.t)))?;

        Ok(StorageRow {
            metric_name: row.metric_name,
            labels: row.slb,
            timestamp,
            value: row.max_0,
        })
    }
}

#[derive(Clone)]
pub struct ClickHouseExecutor {
    client: Client,
}

impl std::fmt::Debug for ClickHouseExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseExecutor")
            .field("client", &"Client")
            .finish()
    }
}

impl ClickHouseExecutor {
    /// Build a client from configuration without touching the network.
    pub fn new(config: &ClickHouseConfig) -> Result<Self, ReadError> {
        if !is_table_identifier(&config.table) {
            return Err(ReadError::InvalidTableName(config.table.clone()));
        }

        let compression = if config.compression {
            Compression::Lz4
        } else {
            Compression::None
        };

        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.username)
            .with_password(&config.password)
            .with_compression(compression);

        Ok(Self { client })
    }

    /// Build a client and immediately check the credentials, failing fast.
    ///
    /// The check gives up after `connect_timeout`; the HTTP client itself
    /// has no connect deadline.
    pub async fn connect(config: &ClickHouseConfig) -> Result<Self, ReadError> {
        let executor = Self::new(config)?;
        tokio::time::timeout(config.connect_timeout, executor.ping())
            .await
            .map_err(|_| ReadError::Unreachable(config.connect_timeout))??;
        Ok(executor)
    }

    pub async fn ping(&self) -> Result<(), ReadError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl SqlExecutor for ClickHouseExecutor {
    async fn query(&self, statement: Statement) -> Result<RowStream, ReadError> {
        let mut query = self.client.query(&statement.sql);
        for arg in &statement.args {
            query = match arg {
                SqlArg::String(s) => query.bind(s.as_str()),
                SqlArg::Int(i) => query.bind(*i),
            };
        }

        let mut cursor = query.fetch::<SampleRow>().map_err(classify)?;

        let rows = async_stream::try_stream! {
            while let Some(row) = cursor.next().await.map_err(classify)? {
                yield StorageRow::try_from(row)?;
            }
        };

        Ok(Box::pin(rows))
    }
}

/// Transport and server-side failures are execution errors; everything else
/// happened while decoding a row.
fn classify(err: ClickHouseError) -> ReadError {
    match err {
        ClickHouseError::Network(_)
        | ClickHouseError::BadResponse(_)
        | ClickHouseError::InvalidParams(_)
        | ClickHouseError::TimedOut
        | ClickHouseError::Other(_) => ReadError::Execution(err.to_string()),
        other => ReadError::RowDecode(other.to_string()),
    }
}
