//! Label matcher to ClickHouse predicate translation
//!
//! The metric name lives in its own `metric_name` column. Every other label is
//! stored as a `name=value` string inside the `labels` array, so ordinary
//! matchers are translated against that encoding:
//!
//! | matcher            | `__name__`                                   | other labels                                               |
//! |--------------------|----------------------------------------------|------------------------------------------------------------|
//! | `=`                | `metric_name = ?`                            | `has(labels, ?)`                                           |
//! | `!=`               | `metric_name != ?`                           | `NOT has(labels, ?)`                                       |
//! | `=~`               | `match(metric_name, concat(?, ?, ?))`        | `arrayExists(x -> match(x, concat(?, ?, ?)), labels)`      |
//! | `!~`               | `NOT match(metric_name, concat(?, ?, ?))`    | `NOT arrayExists(x -> match(x, concat(?, ?, ?)), labels)`  |
//!
//! Regexes are anchored with `^` and `$` to match Prometheus's full-string
//! semantics. The anchors are bound as their own arguments and joined by
//! `concat()` on the server, never spliced into the pattern.

use common::prompb::{LabelMatcher, METRIC_NAME_LABEL, label_matcher::Type};

use crate::clause::SqlBuilder;
use crate::error::ReadError;

pub const METRIC_NAME_COLUMN: &str = "metric_name";
pub const LABELS_COLUMN: &str = "labels";

/// Append one predicate per matcher to `sb`, in the order supplied.
///
/// Equality matchers whose `name=value` encoding equals `ignore_label` are
/// skipped. If any matcher has an unknown type nothing is appended.
pub fn add_matcher_clauses(
    matchers: &[LabelMatcher],
    sb: &mut SqlBuilder,
    ignore_label: Option<&str>,
) -> Result<(), ReadError> {
    let typed = matchers
        .iter()
        .map(|m| {
            Type::try_from(m.r#type)
                .map(|t| (t, m))
                .map_err(|_| ReadError::UnsupportedMatcherType(m.r#type))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (matcher_type, m) in typed {
        if m.name == METRIC_NAME_LABEL {
            add_name_clause(sb, matcher_type, &m.value);
        } else {
            add_label_clause(sb, matcher_type, &encode_label(&m.name, &m.value), ignore_label);
        }
    }

    Ok(())
}

fn add_name_clause(sb: &mut SqlBuilder, matcher_type: Type, value: &str) {
    match matcher_type {
        Type::Eq => sb.clause(format!("{METRIC_NAME_COLUMN} = ?"), [value]),
        Type::Neq => sb.clause(format!("{METRIC_NAME_COLUMN} != ?"), [value]),
        Type::Re => sb.clause(
            format!("match({METRIC_NAME_COLUMN}, concat(?, ?, ?))"),
            anchored(value),
        ),
        Type::Nre => sb.clause(
            format!("NOT match({METRIC_NAME_COLUMN}, concat(?, ?, ?))"),
            anchored(value),
        ),
    }
}

fn add_label_clause(sb: &mut SqlBuilder, matcher_type: Type, label: &str, ignore_label: Option<&str>) {
    match matcher_type {
        Type::Eq => {
            if ignore_label == Some(label) {
                tracing::debug!(label, "Skipping ignored label matcher");
                return;
            }
            sb.clause(format!("has({LABELS_COLUMN}, ?)"), [label])
        }
        Type::Neq => sb.clause(format!("NOT has({LABELS_COLUMN}, ?)"), [label]),
        Type::Re => sb.clause(
            format!("arrayExists(x -> match(x, concat(?, ?, ?)), {LABELS_COLUMN})"),
            anchored(label),
        ),
        Type::Nre => sb.clause(
            format!("NOT arrayExists(x -> match(x, concat(?, ?, ?)), {LABELS_COLUMN})"),
            anchored(label),
        ),
    }
}

/// Stored label encoding
pub fn encode_label(name: &str, value: &str) -> String {
    format!("{name}={value}")
}

/// Inverse of [`encode_label`]; splits on the first `=` only.
///
/// A string without `=` decodes to a label with an empty value.
pub fn decode_label(encoded: &str) -> (&str, &str) {
    encoded.split_once('=').unwrap_or((encoded, ""))
}

fn anchored(pattern: &str) -> [&str; 3] {
    ["^", pattern, "$"]
}
