//! Row accumulation and columnar transposition.
//!
//! [`Batch`] buffers rows until a strategy's flush threshold is reached.
//! [`ColumnBlock`] holds a window of rows in parallel vectors (one per
//! column), the layout PostgreSQL's UNNEST expands back into rows.

use crate::error::LoadError;
use crate::schema::{ColumnType, Row, Schema, Value};
use chrono::{DateTime, Utc};
use std::ops::Range;

/// Bounded buffer of rows awaiting a flush.
#[derive(Debug)]
pub struct Batch {
    rows: Vec<Row>,
    threshold: usize,
}

impl Batch {
    pub fn new(threshold: usize) -> Self {
        Self {
            rows: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    /// Add a row; returns `true` once the batch has reached its threshold.
    pub fn push(&mut self, row: Row) -> bool {
        self.rows.push(row);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hand the buffered rows to a flush, leaving the batch empty.
    pub fn take(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }
}

/// Index ranges covering `0..total` in steps of `window`.
///
/// Every range ends at `min(start + window, total)`, so the final short window
/// needs no special case; iteration stops once `start >= total`.
pub fn windows(total: usize, window: usize) -> impl Iterator<Item = Range<usize>> {
    let window = window.max(1);
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= total {
            return None;
        }
        let end = (start + window).min(total);
        let range = start..end;
        start = end;
        Some(range)
    })
}

/// One homogeneously typed column of a [`ColumnBlock`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Timestamp(Vec<DateTime<Utc>>),
    Integer(Vec<i32>),
    Double(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    fn with_capacity(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::Timestamp => ColumnData::Timestamp(Vec::with_capacity(capacity)),
            ColumnType::Integer => ColumnData::Integer(Vec::with_capacity(capacity)),
            ColumnType::Double => ColumnData::Double(Vec::with_capacity(capacity)),
            ColumnType::Text => ColumnData::Text(Vec::with_capacity(capacity)),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Timestamp(_) => ColumnType::Timestamp,
            ColumnData::Integer(_) => ColumnType::Integer,
            ColumnData::Double(_) => ColumnType::Double,
            ColumnData::Text(_) => ColumnType::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Timestamp(v) => v.len(),
            ColumnData::Integer(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, value: &Value) -> Result<(), ColumnType> {
        match (self, value) {
            (ColumnData::Timestamp(v), Value::Timestamp(x)) => v.push(*x),
            (ColumnData::Integer(v), Value::Integer(x)) => v.push(*x),
            (ColumnData::Double(v), Value::Double(x)) => v.push(*x),
            (ColumnData::Text(v), Value::Text(x)) => v.push(x.clone()),
            (_, other) => return Err(other.column_type()),
        }
        Ok(())
    }
}

/// A window of rows transposed into parallel column vectors.
///
/// All vectors must have the same length. Each index represents one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBlock {
    columns: Vec<ColumnData>,
}

impl ColumnBlock {
    /// Wrap already-columnar data. Lengths are checked by [`ColumnBlock::validate`].
    pub fn new(columns: Vec<ColumnData>) -> Self {
        Self { columns }
    }

    /// Transpose `rows` into one vector per schema column.
    pub fn from_rows(schema: &Schema, rows: &[Row]) -> Result<Self, LoadError> {
        let mut columns: Vec<ColumnData> = schema
            .columns()
            .iter()
            .map(|c| ColumnData::with_capacity(c.ty, rows.len()))
            .collect();

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(LoadError::SchemaMismatch(format!(
                    "row {} has {} values, schema has {} columns",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
            for ((column, value), def) in columns.iter_mut().zip(row.values()).zip(schema.columns()) {
                column.push(value).map_err(|found| {
                    LoadError::SchemaMismatch(format!(
                        "row {} column {}: expected {}, found {}",
                        index, def.name, def.ty, found
                    ))
                })?;
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    /// Check the block against the schema and return its row count.
    ///
    /// Column count, column types, and column lengths must all agree;
    /// otherwise nothing may be written.
    pub fn validate(&self, schema: &Schema) -> Result<usize, LoadError> {
        if self.columns.len() != schema.arity() {
            return Err(LoadError::SchemaMismatch(format!(
                "block has {} columns, schema has {}",
                self.columns.len(),
                schema.arity()
            )));
        }

        for (column, def) in self.columns.iter().zip(schema.columns()) {
            if column.column_type() != def.ty {
                return Err(LoadError::SchemaMismatch(format!(
                    "column {} holds {}, schema expects {}",
                    def.name,
                    column.column_type(),
                    def.ty
                )));
            }
        }

        let expected = self.columns.first().map(ColumnData::len).unwrap_or(0);
        for (column, def) in self.columns.iter().zip(schema.columns()) {
            if column.len() != expected {
                return Err(LoadError::SchemaMismatch(format!(
                    "column {} has {} values, expected {}",
                    def.name,
                    column.len(),
                    expected
                )));
            }
        }

        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_schema() -> Schema {
        Schema::parse("id:int,label:text").unwrap()
    }

    fn int_row(i: i32) -> Row {
        Row::new(vec![Value::Integer(i), Value::Text(format!("row-{i}"))])
    }

    /// Count flushes the way every batching strategy does: on threshold, then
    /// once more for a non-empty trailing batch.
    fn flush_sizes(total: usize, threshold: usize) -> Vec<usize> {
        let mut batch = Batch::new(threshold);
        let mut flushes = Vec::new();
        for i in 0..total {
            if batch.push(int_row(i as i32)) {
                flushes.push(batch.take().len());
            }
        }
        if !batch.is_empty() {
            flushes.push(batch.take().len());
        }
        flushes
    }

    #[test]
    fn test_trailing_partial_batch_is_flushed() {
        assert_eq!(flush_sizes(12_345, 10_000), vec![10_000, 2_345]);
    }

    #[test]
    fn test_single_partial_batch() {
        assert_eq!(flush_sizes(42, 10_000), vec![42]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_flush() {
        assert_eq!(flush_sizes(20_000, 10_000), vec![10_000, 10_000]);
    }

    #[test]
    fn test_empty_source_never_flushes() {
        assert!(flush_sizes(0, 10_000).is_empty());
    }

    #[test]
    fn test_take_clears_batch() {
        let mut batch = Batch::new(2);
        assert!(!batch.push(int_row(1)));
        assert!(batch.push(int_row(2)));
        assert_eq!(batch.take().len(), 2);
        assert!(batch.is_empty());
        assert!(!batch.is_full());
    }

    #[test]
    fn test_windows() {
        let ranges: Vec<_> = windows(12_345, 10_000).collect();
        assert_eq!(ranges, vec![0..10_000, 10_000..12_345]);

        let ranges: Vec<_> = windows(20_000, 10_000).collect();
        assert_eq!(ranges, vec![0..10_000, 10_000..20_000]);

        assert_eq!(windows(0, 10_000).count(), 0);
        assert_eq!(windows(3, 10_000).collect::<Vec<_>>(), vec![0..3]);
    }

    #[test]
    fn test_transpose() {
        let rows: Vec<Row> = (0..3).map(int_row).collect();
        let block = ColumnBlock::from_rows(&int_schema(), &rows).unwrap();
        assert_eq!(block.validate(&int_schema()).unwrap(), 3);
        assert_eq!(block.columns()[0], ColumnData::Integer(vec![0, 1, 2]));
        assert_eq!(
            block.columns()[1],
            ColumnData::Text(vec!["row-0".into(), "row-1".into(), "row-2".into()])
        );
    }

    #[test]
    fn test_transpose_rejects_wrong_value_type() {
        let rows = vec![Row::new(vec![Value::Double(1.0), Value::Text("x".into())])];
        assert!(matches!(
            ColumnBlock::from_rows(&int_schema(), &rows),
            Err(LoadError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_column() {
        let block = ColumnBlock::new(vec![
            ColumnData::Integer(vec![1, 2, 3]),
            ColumnData::Text(vec!["a".into(), "b".into()]),
        ]);
        match block.validate(&int_schema()) {
            Err(LoadError::SchemaMismatch(msg)) => assert!(msg.contains("label")),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_column_type_mismatch() {
        let block = ColumnBlock::new(vec![
            ColumnData::Text(vec!["1".into()]),
            ColumnData::Text(vec!["a".into()]),
        ]);
        assert!(block.validate(&int_schema()).is_err());
    }
}
