use crate::error::{PersistenceError, Result};
use crate::types::SqlValue;

/// Driver-agnostic raw result from a database query.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQueryResult {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<SqlValue>>,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Converts every row into a field-name to value mapping.
    pub fn into_rows(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| Row::new(&columns, values))
            .collect()
    }
}

/// A single result row: field names mapped to values, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        let fields = columns.iter().cloned().zip(values).collect();
        Self { fields }
    }

    /// Gets a value by column name.
    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| PersistenceError::ColumnNotFound(column.to_string()))
    }

    /// Returns all column names in this row.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    #[test]
    fn test_row_get() {
        let row = Row::new(&columns(), vec![SqlValue::Int64(1), SqlValue::from("John")]);

        assert_eq!(row.get("id").unwrap(), &SqlValue::Int64(1));
        assert_eq!(row.get("name").unwrap(), &SqlValue::Text("John".to_string()));
        match row.get("missing").unwrap_err() {
            PersistenceError::ColumnNotFound(column) => assert_eq!(column, "missing"),
            other => panic!("Expected ColumnNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_row_keeps_column_order() {
        let row = Row::new(&columns(), vec![SqlValue::Int64(1), SqlValue::Null]);
        assert_eq!(row.columns(), vec!["id", "name"]);
        let fields: Vec<_> = row.iter().collect();
        assert_eq!(fields[1], ("name", &SqlValue::Null));
    }

    #[test]
    fn test_into_rows() {
        let raw = RawQueryResult::new(
            columns(),
            vec![
                vec![SqlValue::Int64(1), SqlValue::from("Alice")],
                vec![SqlValue::Int64(2), SqlValue::from("Bob")],
            ],
        );
        let rows = raw.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name").unwrap(), &SqlValue::from("Bob"));
    }

    #[test]
    fn test_empty_result_has_no_rows() {
        assert!(RawQueryResult::empty().into_rows().is_empty());
    }
}
