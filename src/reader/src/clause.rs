//! Accumulates parameterized `WHERE` predicates.

use std::fmt;

/// A positional argument bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    String(String),
    Int(i64),
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for SqlArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl fmt::Display for SqlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

/// Ordered list of predicates that are ANDed together.
///
/// Each fragment must carry exactly as many arguments as it has `?`
/// placeholders. This is not checked at runtime.
#[derive(Debug, Default, Clone)]
pub struct SqlBuilder {
    clauses: Vec<String>,
    args: Vec<SqlArg>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clause<I, A>(&mut self, fragment: impl Into<String>, args: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<SqlArg>,
    {
        self.clauses.push(fragment.into());
        self.args.extend(args.into_iter().map(Into::into));
    }

    pub fn where_expression(&self) -> String {
        self.clauses.join(" AND ")
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    pub fn into_args(self) -> Vec<SqlArg> {
        self.args
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
