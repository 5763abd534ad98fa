//! In-memory tables
//!
//! A [`Table`] is an ordered list of unique field names plus an ordered list
//! of rows. Every row holds exactly one value per field; the field list is the
//! single source of truth for column order on write.

use crate::error::TableError;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};

/// Ordered fields and ordered rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    fields: IndexSet<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given header
    ///
    /// # Errors
    /// Returns [`TableError::DuplicateField`] if a name repeats
    pub fn new<I, S>(fields: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for field in fields {
            let field = field.into();
            if !set.insert(field.clone()) {
                return Err(TableError::DuplicateField(field));
            }
        }
        Ok(Self {
            fields: set,
            rows: Vec::new(),
        })
    }

    /// Field names in column order
    #[inline]
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.fields.iter().map(String::as_str)
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Column position of a field
    #[inline]
    #[must_use]
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.get_index_of(field)
    }

    /// Check whether a field is declared
    #[inline]
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a field, defaulting every existing row to empty
    ///
    /// Returns `false` and leaves the table untouched if the field exists.
    pub fn add_field(&mut self, field: impl Into<String>) -> bool {
        if !self.fields.insert(field.into()) {
            return false;
        }
        for row in &mut self.rows {
            row.push(Value::empty());
        }
        true
    }

    /// Append a row given in column order
    ///
    /// # Errors
    /// Returns [`TableError::RowLength`] if the row does not match the header
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), TableError> {
        if values.len() != self.fields.len() {
            return Err(TableError::RowLength {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }
        self.rows.push(values);
        Ok(())
    }

    /// Append a row given as field/value pairs
    ///
    /// Fields not mentioned default to empty.
    ///
    /// # Errors
    /// Returns [`TableError::UnknownField`] for a field not in the header
    pub fn push_record<I, K, V>(&mut self, record: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut row = vec![Value::empty(); self.fields.len()];
        for (field, value) in record {
            let field = field.as_ref();
            let idx = self
                .field_index(field)
                .ok_or_else(|| TableError::UnknownField(field.to_string()))?;
            row[idx] = value.into();
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell lookup by 0-based row and field name
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        let idx = self.field_index(field)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Overwrite a cell
    ///
    /// # Errors
    /// - [`TableError::UnknownField`] if the field is not declared
    /// - [`TableError::RowOutOfRange`] if the row does not exist
    pub fn set(&mut self, row: usize, field: &str, value: impl Into<Value>) -> Result<(), TableError> {
        let idx = self
            .field_index(field)
            .ok_or_else(|| TableError::UnknownField(field.to_string()))?;
        let len = self.rows.len();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(TableError::RowOutOfRange { row, len })?;
        cells[idx] = value.into();
        Ok(())
    }

    /// Borrow one row
    #[inline]
    #[must_use]
    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        (index < self.rows.len()).then_some(RowView { table: self, index })
    }

    /// Iterate rows in order
    pub fn rows(&self) -> impl ExactSizeIterator<Item = RowView<'_>> + '_ {
        (0..self.rows.len()).map(move |index| RowView { table: self, index })
    }

    /// First row whose `field` renders as `key`
    #[must_use]
    pub fn find_row(&self, field: &str, key: &str) -> Option<usize> {
        let idx = self.field_index(field)?;
        self.rows.iter().position(|row| row[idx].to_string() == key)
    }

    /// Rows as ordered field → value maps (for JSON output)
    #[must_use]
    pub fn to_records(&self) -> Vec<IndexMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.fields
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub(crate) fn from_parts(fields: IndexSet<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == fields.len()));
        Self { fields, rows }
    }
}

/// Borrowed view of a single row
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowView<'a> {
    /// 0-based position in the table
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cell by field name
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let idx = self.table.field_index(field)?;
        Some(&self.table.rows[self.index][idx])
    }

    /// Cells in column order
    #[inline]
    #[must_use]
    pub fn values(&self) -> &'a [Value] {
        &self.table.rows[self.index]
    }

    /// Field/value pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.table.fields.iter().map(String::as_str).zip(self.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        let mut t = Table::new(["Author", "TotalPosts"]).unwrap();
        t.push_record([("Author", Value::from("alice")), ("TotalPosts", Value::from(10_i64))])
            .unwrap();
        t.push_record([("Author", "bob")]).unwrap();
        t
    }

    #[test]
    fn rejects_duplicate_header() {
        let err = Table::new(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, TableError::DuplicateField(f) if f == "a"));
    }

    #[test]
    fn add_field_defaults_rows_to_empty() {
        let mut t = users();
        assert!(t.add_field("Notes_bob"));
        assert!(!t.add_field("Notes_bob"));
        assert_eq!(t.field_count(), 3);
        assert!(t.rows().all(|r| r.get("Notes_bob").is_some_and(Value::is_empty)));
    }

    #[test]
    fn push_record_fills_missing_fields() {
        let t = users();
        assert_eq!(t.get(1, "TotalPosts"), Some(&Value::empty()));
    }

    #[test]
    fn push_row_checks_length() {
        let mut t = users();
        let err = t.push_row(vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, TableError::RowLength { expected: 2, actual: 1 }));
    }

    #[test]
    fn set_reports_bad_coordinates() {
        let mut t = users();
        assert!(matches!(
            t.set(5, "Author", "x"),
            Err(TableError::RowOutOfRange { row: 5, len: 2 })
        ));
        assert!(matches!(t.set(0, "Nope", "x"), Err(TableError::UnknownField(_))));
        t.set(0, "Author", "carol").unwrap();
        assert_eq!(t.get(0, "Author"), Some(&Value::from("carol")));
    }

    #[test]
    fn find_row_matches_rendered_value() {
        let t = users();
        assert_eq!(t.find_row("Author", "bob"), Some(1));
        assert_eq!(t.find_row("TotalPosts", "10"), Some(0));
        assert_eq!(t.find_row("Author", "zed"), None);
    }

    #[test]
    fn records_keep_column_order() {
        let t = users();
        let records = t.to_records();
        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["Author", "TotalPosts"]);
    }
}
