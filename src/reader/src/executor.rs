//! Statement assembly and execution for remote_read queries.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::Configuration;
use common::prompb::{Query, QueryResult, ReadRequest, ReadResponse};
use futures::Stream;

use crate::assembler::assemble;
use crate::clause::{SqlArg, SqlBuilder};
use crate::error::ReadError;
use crate::hints::TimeField;
use crate::matcher::{LABELS_COLUMN, METRIC_NAME_COLUMN, add_matcher_clauses};

/// One row of the grouped sample query.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRow {
    pub metric_name: String,
    /// Sorted `name=value` strings
    pub labels: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

pub type RowStream = Pin<Box<dyn Stream<Item = Result<StorageRow, ReadError>> + Send>>;

/// A SQL statement with positional `?` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

/// Executes statements against the backing store.
///
/// Dropping the returned stream must abort the in-flight statement.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn query(&self, statement: Statement) -> Result<RowStream, ReadError>;
}

#[async_trait]
impl<E: SqlExecutor + ?Sized> SqlExecutor for Arc<E> {
    async fn query(&self, statement: Statement) -> Result<RowStream, ReadError> {
        (**self).query(statement).await
    }
}

/// Per-adapter read settings, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct ReadSettings {
    /// Pre-validated table identifier
    pub table: String,
    pub ignore_label: Option<String>,
    pub ignore_hints: bool,
}

impl From<&Configuration> for ReadSettings {
    fn from(config: &Configuration) -> Self {
        Self {
            table: config.clickhouse.table.clone(),
            ignore_label: config.read.ignore_label.clone(),
            ignore_hints: config.read.ignore_hints,
        }
    }
}

/// Translates remote_read queries to SQL and regroups the results.
pub struct RemoteReader<E> {
    executor: E,
    settings: ReadSettings,
}

impl<E: SqlExecutor> RemoteReader<E> {
    pub fn new(executor: E, settings: ReadSettings) -> Self {
        Self { executor, settings }
    }

    /// Build the grouped sample query for one remote_read query.
    pub fn build_statement(&self, query: &Query) -> Result<Statement, ReadError> {
        let mut sb = SqlBuilder::new();

        // `t` is the (possibly bucketed) time alias from the SELECT list
        sb.clause("t >= ?", [query.start_timestamp_ms / 1000]);

        if query.end_timestamp_ms > 0 {
            sb.clause("t <= ?", [query.end_timestamp_ms / 1000]);
        }

        add_matcher_clauses(
            &query.matchers,
            &mut sb,
            self.settings.ignore_label.as_deref(),
        )?;

        let time_field = TimeField::resolve(query.hints.as_ref(), self.settings.ignore_hints);

        let sql = format!(
            "SELECT {METRIC_NAME_COLUMN}, arraySort({LABELS_COLUMN}) AS slb, {time_field} AS t, max(value) AS max_0 \
             FROM {table} \
             WHERE {where_clause} \
             GROUP BY {METRIC_NAME_COLUMN}, slb, t \
             ORDER BY {METRIC_NAME_COLUMN}, slb, t",
            table = self.settings.table,
            where_clause = sb.where_expression(),
        );

        Ok(Statement {
            sql,
            args: sb.into_args(),
        })
    }

    /// Serve a whole remote_read request.
    ///
    /// Queries run one after another; results keep the request order. Any
    /// error fails the entire request.
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, ReadError> {
        // Translate everything up front so a bad matcher in a later query
        // fails the request before any statement reaches the store.
        let statements = request
            .queries
            .iter()
            .map(|query| self.build_statement(query))
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            results.push(self.run(statement).await?);
        }

        Ok(ReadResponse { results })
    }

    async fn run(&self, statement: Statement) -> Result<QueryResult, ReadError> {
        tracing::debug!(
            sql = %statement.sql,
            args = %display_args(&statement.args),
            "Executing remote_read statement"
        );

        let rows = self.executor.query(statement).await?;
        let result = assemble(rows).await?;

        tracing::debug!(
            timeseries = result.timeseries.len(),
            samples = result.timeseries.iter().map(|ts| ts.samples.len()).sum::<usize>(),
            "Assembled query result"
        );

        Ok(result)
    }
}

fn display_args(args: &[SqlArg]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingExecutor;
    use common::prompb::{LabelMatcher, ReadHints, label_matcher::Type};

    fn settings() -> ReadSettings {
        ReadSettings {
            table: "metrics.samples".to_string(),
            ignore_label: None,
            ignore_hints: false,
        }
    }

    fn query(start_ms: i64, end_ms: i64, matchers: Vec<LabelMatcher>) -> Query {
        Query {
            start_timestamp_ms: start_ms,
            end_timestamp_ms: end_ms,
            matchers,
            hints: None,
        }
    }

    fn where_fragments(sql: &str) -> usize {
        let where_clause = sql
            .split(" WHERE ")
            .nth(1)
            .and_then(|rest| rest.split(" GROUP BY ").next())
            .unwrap();
        where_clause.split(" AND ").count()
    }

    #[test]
    fn test_statement_shape() {
        let reader = RemoteReader::new(RecordingExecutor::default(), settings());
        let statement = reader
            .build_statement(&query(
                1_700_000_000_500,
                1_700_000_600_999,
                vec![LabelMatcher::new(Type::Eq, "__name__", "up")],
            ))
            .unwrap();

        assert_eq!(
            statement.sql,
            "SELECT metric_name, arraySort(labels) AS slb, updated_at AS t, max(value) AS max_0 \
             FROM metrics.samples \
             WHERE t >= ? AND t <= ? AND metric_name = ? \
             GROUP BY metric_name, slb, t \
             ORDER BY metric_name, slb, t"
        );
        assert_eq!(
            statement.args,
            vec![
                SqlArg::Int(1_700_000_000),
                SqlArg::Int(1_700_000_600),
                SqlArg::from("up"),
            ]
        );
    }

    #[test]
    fn test_missing_end_bound() {
        let reader = RemoteReader::new(RecordingExecutor::default(), settings());
        let statement = reader.build_statement(&query(5_000, 0, vec![])).unwrap();

        assert!(statement.sql.contains("WHERE t >= ? GROUP BY"));
        assert_eq!(statement.args, vec![SqlArg::Int(5)]);
    }

    #[test]
    fn test_fragment_count_is_matchers_plus_bounds() {
        let reader = RemoteReader::new(RecordingExecutor::default(), settings());
        let matchers = vec![
            LabelMatcher::new(Type::Eq, "job", "api"),
            LabelMatcher::new(Type::Neq, "env", "dev"),
            LabelMatcher::new(Type::Re, "instance", "10\\..*"),
        ];

        let start_only = reader
            .build_statement(&query(1_000, 0, matchers.clone()))
            .unwrap();
        assert_eq!(where_fragments(&start_only.sql), matchers.len() + 1);

        let both_bounds = reader
            .build_statement(&query(1_000, 2_000, matchers.clone()))
            .unwrap();
        assert_eq!(where_fragments(&both_bounds.sql), matchers.len() + 2);
        assert_eq!(
            both_bounds.sql.matches('?').count(),
            both_bounds.args.len()
        );
    }

    #[test]
    fn test_ignore_label_from_settings() {
        let reader = RemoteReader::new(
            RecordingExecutor::default(),
            ReadSettings {
                ignore_label: Some("replica=a".to_string()),
                ..settings()
            },
        );
        let statement = reader
            .build_statement(&query(
                1_000,
                2_000,
                vec![
                    LabelMatcher::new(Type::Eq, "replica", "a"),
                    LabelMatcher::new(Type::Eq, "job", "api"),
                ],
            ))
            .unwrap();

        assert_eq!(where_fragments(&statement.sql), 3);
        assert!(!statement.args.contains(&SqlArg::from("replica=a")));
    }

    #[test]
    fn test_hints_bucket_time_field() {
        let reader = RemoteReader::new(RecordingExecutor::default(), settings());
        let mut q = query(0, 60_000, vec![]);
        q.hints = Some(ReadHints {
            step_ms: 10_000,
            ..Default::default()
        });

        let statement = reader.build_statement(&q).unwrap();
        assert!(
            statement
                .sql
                .contains("toStartOfInterval(updated_at, INTERVAL 5 second) AS t")
        );
    }

    #[test]
    fn test_ignore_hints_setting() {
        let reader = RemoteReader::new(
            RecordingExecutor::default(),
            ReadSettings {
                ignore_hints: true,
                ..settings()
            },
        );
        let mut q = query(0, 60_000, vec![]);
        q.hints = Some(ReadHints {
            step_ms: 10_000,
            ..Default::default()
        });

        let statement = reader.build_statement(&q).unwrap();
        assert!(statement.sql.contains("updated_at AS t"));
        assert!(!statement.sql.contains("toStartOfInterval"));
    }

    #[tokio::test]
    async fn test_read_keeps_query_order() {
        let executor = RecordingExecutor::with_results(vec![
            vec![StorageRow {
                metric_name: "a".to_string(),
                labels: vec!["l=1".to_string()],
                timestamp: DateTime::from_timestamp(1, 0).unwrap(),
                value: 1.0,
            }],
            vec![],
        ]);
        let reader = RemoteReader::new(executor.clone(), settings());

        let request = ReadRequest {
            queries: vec![
                query(0, 0, vec![LabelMatcher::new(Type::Eq, "__name__", "a")]),
                query(0, 0, vec![LabelMatcher::new(Type::Eq, "__name__", "b")]),
            ],
            ..Default::default()
        };

        let response = reader.read(&request).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].timeseries.len(), 1);
        assert!(response.results[1].timeseries.is_empty());

        let statements = executor.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].args.last(), Some(&SqlArg::from("a")));
        assert_eq!(statements[1].args.last(), Some(&SqlArg::from("b")));
    }

    #[tokio::test]
    async fn test_unsupported_matcher_fails_whole_request() {
        let executor = RecordingExecutor::default();
        let reader = RemoteReader::new(executor.clone(), settings());

        let request = ReadRequest {
            queries: vec![
                query(0, 0, vec![LabelMatcher::new(Type::Eq, "__name__", "a")]),
                query(
                    0,
                    0,
                    vec![LabelMatcher {
                        r#type: 42,
                        name: "job".to_string(),
                        value: "api".to_string(),
                    }],
                ),
            ],
            ..Default::default()
        };

        let err = reader.read(&request).await.unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedMatcherType(42)));
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn test_execution_error_propagates() {
        let executor = RecordingExecutor::failing("Code: 60. Unknown table");
        let reader = RemoteReader::new(executor, settings());

        let request = ReadRequest {
            queries: vec![query(0, 0, vec![])],
            ..Default::default()
        };

        let err = reader.read(&request).await.unwrap_err();
        assert!(matches!(err, ReadError::Execution(msg) if msg.contains("Unknown table")));
    }

    #[test]
    fn test_settings_from_configuration() {
        let mut config = Configuration::default();
        config.clickhouse.table = "prom.samples".to_string();
        config.read.ignore_label = Some("replica=a".to_string());
        config.read.ignore_hints = true;

        let settings = ReadSettings::from(&config);
        assert_eq!(settings.table, "prom.samples");
        assert_eq!(settings.ignore_label.as_deref(), Some("replica=a"));
        assert!(settings.ignore_hints);
    }
}
