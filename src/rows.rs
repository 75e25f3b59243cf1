use serde::Serialize;
use std::collections::HashMap;

/// Tabular result of one statement. Every cell is kept as text because the
/// daemon answers status commands over the text protocol; `None` is SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Builds a two-column key/value result, the shape of every status command.
    pub fn key_values<K, V>(columns: [&str; 2], pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: pairs
                .into_iter()
                .map(|(k, v)| vec![Some(k.into()), Some(v.into())])
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of every row, skipping `NULL`s.
    pub fn first_column(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(|row| row.first().and_then(|cell| cell.as_deref()))
    }

    /// `(key, value)` from the first two columns. Rows that are too short or
    /// carry a `NULL` in either position are skipped.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().filter_map(|row| match row.as_slice() {
            [Some(key), Some(value), ..] => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }
}

/// Rows of one batch keyed by query name.
pub type RawData = HashMap<String, QueryRows>;
