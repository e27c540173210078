//! A minimal named-column table.
//!
//! This is the hand-off format between file adapters and the engine: every
//! field is kept as text and typed columns are parsed on demand by
//! [`crate::dataset::PsmDataset`] and [`crate::pairing`].
use crate::error::{ConfidenceError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, checking that every record has one field per header.
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        for (row, record) in records.iter().enumerate() {
            if record.len() != headers.len() {
                return Err(ConfidenceError::RaggedRow {
                    row,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
        }
        Ok(Self { headers, records })
    }

    /// Convenience constructor from string slices, mostly for tests.
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Result<Self> {
        Self::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a column, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    }

    /// Resolve all `names` at once. The error lists every missing column.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name.as_ref()) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.as_ref().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(ConfidenceError::MissingColumns(missing));
        }
        Ok(indices)
    }

    /// Values of a column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.column_index(name)?;
        Some(self.records.iter().map(move |record| record[idx].as_str()))
    }

    /// Append the records of `other`, which must have the same headers.
    pub fn extend(&mut self, other: Table) -> Result<()> {
        if self.headers.is_empty() && self.records.is_empty() {
            *self = other;
            return Ok(());
        }
        let indices = other.require_columns(&self.headers)?;
        for record in other.records {
            self.records
                .push(indices.iter().map(|&idx| record[idx].clone()).collect());
        }
        Ok(())
    }
}

/// Parse a numeric field, reporting the column and row on failure.
pub(crate) fn parse_number(value: &str, column: &str, row: usize) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfidenceError::InvalidNumber {
            column: column.to_string(),
            value: value.to_string(),
            row,
        })
}
