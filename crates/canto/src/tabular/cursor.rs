use crate::collection::CollectionError;
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("column {ordinal} out of range (1..={columns})")]
    ColumnOutOfRange { ordinal: usize, columns: usize },
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,
    #[error("cursor source failed: {0}")]
    Source(String),
}

/// Forward-only cursor over rows with named columns.
pub trait Cursor: Send {
    fn columns(&self) -> &[String];

    /// Moves to the next row. `false` once the rows are exhausted.
    fn next_row(&mut self) -> Result<bool, CursorError>;

    /// Column value of the current row by 1-based ordinal.
    fn value(&self, ordinal: usize) -> Result<Value, CursorError>;

    /// Total number of rows, if the source knows it up front.
    fn row_count(&self) -> Option<usize> {
        None
    }
}

/// In-memory cursor, mostly for hosts without a real result set and for
/// tests. Counts how often it was advanced.
pub struct VecCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    current: Option<usize>,
    advanced: Arc<AtomicUsize>,
    report_count: bool,
}

impl VecCursor {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
            current: None,
            advanced: Arc::default(),
            report_count: false,
        }
    }

    /// Makes [`Cursor::row_count`] report the number of rows.
    pub fn with_known_count(mut self) -> Self {
        self.report_count = true;
        self
    }

    /// Shared counter of `next_row` calls.
    pub fn advance_counter(&self) -> Arc<AtomicUsize> {
        self.advanced.clone()
    }
}

impl Cursor for VecCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<bool, CursorError> {
        self.advanced.fetch_add(1, Ordering::Relaxed);
        let next = self.current.map_or(0, |current| current + 1);
        self.current = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        let row = self
            .current
            .and_then(|current| self.rows.get(current))
            .ok_or(CursorError::NoCurrentRow)?;
        ordinal
            .checked_sub(1)
            .and_then(|index| row.get(index))
            .cloned()
            .ok_or(CursorError::ColumnOutOfRange {
                ordinal,
                columns: self.columns.len(),
            })
    }

    fn row_count(&self) -> Option<usize> {
        self.report_count.then_some(self.rows.len())
    }
}

struct CursorState {
    cursor: Box<dyn Cursor>,
    /// 1-based number of the current row, 0 before the first.
    position: usize,
    exhausted: bool,
}

/// Cursor shared between a sequence and the live rows it hands out.
#[derive(Clone)]
pub struct SharedCursor {
    state: Arc<Mutex<CursorState>>,
    columns: Arc<[String]>,
}

impl SharedCursor {
    pub fn new(cursor: impl Cursor + 'static) -> Self {
        let columns = cursor.columns().into();
        Self {
            state: Arc::new(Mutex::new(CursorState {
                cursor: Box::new(cursor),
                position: 0,
                exhausted: false,
            })),
            columns,
        }
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn row_count(&self) -> Option<usize> {
        self.state.lock().cursor.row_count()
    }

    /// Moves to the next row and returns its number.
    pub fn advance(&self) -> Result<Option<usize>, CollectionError> {
        let mut state = self.state.lock();
        if state.exhausted {
            return Ok(None);
        }
        if state.cursor.next_row()? {
            state.position += 1;
            Ok(Some(state.position))
        } else {
            state.exhausted = true;
            Ok(None)
        }
    }

    /// Reads a column of `row`, which must still be the current row.
    pub fn read(&self, row: usize, ordinal: usize) -> Result<Value, CollectionError> {
        let state = self.state.lock();
        if state.position != row || state.exhausted {
            return Err(CollectionError::StaleRow { row });
        }
        Ok(state.cursor.value(ordinal)?)
    }

    /// Copies every column of `row`.
    pub fn capture(&self, row: usize) -> Result<Vec<Value>, CollectionError> {
        (1..=self.columns.len())
            .map(|ordinal| self.read(row, ordinal))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> VecCursor {
        VecCursor::new(
            ["id", "name"],
            vec![
                vec![Value::Int(1), Value::text("ada")],
                vec![Value::Int(2), Value::text("bob")],
            ],
        )
    }

    #[test]
    fn test_vec_cursor_walks_rows() {
        let mut cursor = cursor();
        assert_eq!(cursor.value(1), Err(CursorError::NoCurrentRow));
        assert!(cursor.next_row().unwrap());
        assert_eq!(cursor.value(2).unwrap(), Value::text("ada"));
        assert_eq!(
            cursor.value(3),
            Err(CursorError::ColumnOutOfRange { ordinal: 3, columns: 2 })
        );
        assert!(cursor.next_row().unwrap());
        assert!(!cursor.next_row().unwrap());
        assert_eq!(cursor.advance_counter().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_shared_cursor_detects_stale_rows() {
        let shared = SharedCursor::new(cursor());
        let first = shared.advance().unwrap().unwrap();
        assert_eq!(shared.read(first, 1).unwrap(), Value::Int(1));
        let second = shared.advance().unwrap().unwrap();
        assert_eq!(
            shared.read(first, 1),
            Err(CollectionError::StaleRow { row: first })
        );
        assert_eq!(shared.capture(second).unwrap(), vec![Value::Int(2), Value::text("bob")]);
        assert_eq!(shared.advance().unwrap(), None);
    }
}
