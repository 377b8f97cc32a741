use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::types::RowValues;

/// Rows returned by the transport for one request.
///
/// Decoding the wire format into [`RowValues`] is the transport's job; the session only
/// reads scalar values out of the first row (bootstrap) or hands the set back to callers.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (written rows for inserts)
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create an empty result set with shared column names.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>) -> ResultSet {
        let index = Arc::new(index_columns(&column_names));
        ResultSet {
            results: Vec::new(),
            rows_affected: 0,
            column_names: Some(Arc::new(column_names)),
            column_index: Some(index),
        }
    }

    /// Result of a write request that returns no rows.
    #[must_use]
    pub fn affected(rows_affected: usize) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Rows are ignored until column names are known.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(index),
            });
            self.rows_affected += 1;
        }
    }

    #[must_use]
    pub fn first_row(&self) -> Option<&CustomDbRow> {
        self.results.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_index() {
        let mut rs = ResultSet::with_columns(vec!["a".into(), "b".into()]);
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("x".into())]);
        rs.add_row_values(vec![RowValues::Int(2), RowValues::Null]);

        assert_eq!(rs.rows_affected, 2);
        let first = rs.first_row().expect("first row");
        assert_eq!(first.get("b"), Some(&RowValues::Text("x".into())));
        assert_eq!(first.get("missing"), None);
        assert!(Arc::ptr_eq(
            &rs.results[0].column_index_cache,
            &rs.results[1].column_index_cache
        ));
    }

    #[test]
    fn rows_without_columns_are_dropped() {
        let mut rs = ResultSet::default();
        rs.add_row_values(vec![RowValues::Int(1)]);
        assert!(rs.results.is_empty());
    }
}
