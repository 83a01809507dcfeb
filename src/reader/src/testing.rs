//! In-memory [`SqlExecutor`] for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream;

use crate::error::ReadError;
use crate::executor::{RowStream, SqlExecutor, Statement, StorageRow};

/// Records every statement and answers with canned row sets, one per call.
///
/// Calls beyond the canned results return no rows.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    statements: Vec<Statement>,
    results: VecDeque<Vec<StorageRow>>,
    failure: Option<String>,
}

impl RecordingExecutor {
    pub fn with_results(results: Vec<Vec<StorageRow>>) -> Self {
        let executor = Self::default();
        executor.state().results = results.into();
        executor
    }

    /// Every call fails with [`ReadError::Execution`].
    pub fn failing(message: impl Into<String>) -> Self {
        let executor = Self::default();
        executor.state().failure = Some(message.into());
        executor
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.state().statements.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn query(&self, statement: Statement) -> Result<RowStream, ReadError> {
        let mut state = self.state();
        state.statements.push(statement);

        if let Some(message) = &state.failure {
            return Err(ReadError::Execution(message.clone()));
        }

        let rows = state.results.pop_front().unwrap_or_default();
        Ok(Box::pin(stream::iter(rows.into_iter().map(Ok))))
    }
}
