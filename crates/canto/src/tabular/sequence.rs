use super::{Cursor, Row, SharedCursor};
use crate::collection::{ArrayStore, CantoArray, CollectionError};
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
struct SequenceState {
    /// Every row, captured, once the cursor was read to the end.
    materialized: Option<Arc<[Value]>>,
    /// A streaming pass has moved the cursor.
    streamed: bool,
}

/// Read-only, lazily materialized sequence of rows over a forward-only
/// cursor.
///
/// Streaming with [`rows`](Self::rows) hands out live rows and can happen
/// once. Anything needing random access or the size reads the whole cursor
/// into captured rows first, once; after that every access is served from
/// memory. Mutations always fail with [`CollectionError::Immutable`].
#[derive(Clone)]
pub struct RowSequence {
    cursor: SharedCursor,
    state: Arc<Mutex<SequenceState>>,
}

impl RowSequence {
    pub fn new(cursor: impl Cursor + 'static) -> Self {
        Self {
            cursor: SharedCursor::new(cursor),
            state: Arc::default(),
        }
    }

    pub fn columns(&self) -> &[String] {
        self.cursor.columns()
    }

    pub fn is_materialized(&self) -> bool {
        self.state.lock().materialized.is_some()
    }

    /// Streams the rows. Live rows go stale as soon as the stream moves on.
    pub fn rows(&self) -> RowStream {
        let mut state = self.state.lock();
        if let Some(rows) = &state.materialized {
            return RowStream::Materialized {
                rows: rows.clone(),
                next: 0,
            };
        }
        if state.streamed {
            return RowStream::Consumed { reported: false };
        }
        state.streamed = true;
        RowStream::Live {
            cursor: self.cursor.clone(),
        }
    }

    /// Reads every remaining row into memory, unless already done.
    pub fn materialize(&self) -> Result<Arc<[Value]>, CollectionError> {
        let mut state = self.state.lock();
        if let Some(rows) = &state.materialized {
            return Ok(rows.clone());
        }
        if state.streamed {
            return Err(CollectionError::Consumed);
        }
        let mut rows = Vec::new();
        while let Some(row) = self.cursor.advance()? {
            let values = self.cursor.capture(row)?;
            rows.push(Value::Table(
                Row::captured(self.cursor.columns().clone(), values).into_table(),
            ));
        }
        tracing::debug!(rows = rows.len(), "row sequence materialized");
        let rows: Arc<[Value]> = rows.into();
        state.materialized = Some(rows.clone());
        Ok(rows)
    }

    pub fn into_array(self) -> CantoArray {
        CantoArray::from_store(Arc::new(self))
    }
}

impl From<RowSequence> for Value {
    fn from(sequence: RowSequence) -> Self {
        Value::Array(sequence.into_array())
    }
}

impl ArrayStore for RowSequence {
    fn len(&self) -> Result<usize, CollectionError> {
        if let Some(rows) = &self.state.lock().materialized {
            return Ok(rows.len());
        }
        match self.cursor.row_count() {
            Some(count) => Ok(count),
            None => Ok(self.materialize()?.len()),
        }
    }

    fn get(&self, index: usize) -> Result<Value, CollectionError> {
        let rows = self.materialize()?;
        rows.get(index).cloned().ok_or(CollectionError::OutOfBounds {
            index,
            size: rows.len(),
        })
    }

    fn set(&self, _index: usize, _value: Value) -> Result<(), CollectionError> {
        Err(CollectionError::Immutable { what: "row sequence" })
    }

    fn push(&self, _value: Value) -> Result<(), CollectionError> {
        Err(CollectionError::Immutable { what: "row sequence" })
    }

    fn remove(&self, _index: usize) -> Result<Value, CollectionError> {
        Err(CollectionError::Immutable { what: "row sequence" })
    }

    fn is_growable(&self) -> bool {
        false
    }

    fn to_vec(&self) -> Result<Vec<Value>, CollectionError> {
        Ok(self.materialize()?.to_vec())
    }
}

impl fmt::Debug for RowSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RowSequence")
            .field("columns", &self.cursor.columns())
            .field("materialized", &state.materialized.as_ref().map(|rows| rows.len()))
            .field("streamed", &state.streamed)
            .finish()
    }
}

/// Iterator returned by [`RowSequence::rows`].
pub enum RowStream {
    Live { cursor: SharedCursor },
    Materialized { rows: Arc<[Value]>, next: usize },
    /// A second streaming pass; yields one [`CollectionError::Consumed`].
    Consumed { reported: bool },
}

impl Iterator for RowStream {
    type Item = Result<Value, CollectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RowStream::Live { cursor } => match cursor.advance() {
                Ok(Some(row)) => Some(Ok(Value::Table(Row::live(cursor.clone(), row).into_table()))),
                Ok(None) => None,
                Err(error) => Some(Err(error)),
            },
            RowStream::Materialized { rows, next } => {
                let row = rows.get(*next).cloned()?;
                *next += 1;
                Some(Ok(row))
            }
            RowStream::Consumed { reported } => {
                if *reported {
                    return None;
                }
                *reported = true;
                Some(Err(CollectionError::Consumed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::VecCursor;
    use std::sync::atomic::Ordering;

    fn cursor() -> VecCursor {
        VecCursor::new(
            ["id"],
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
        )
    }

    #[test]
    fn test_known_count_does_not_scan() {
        let cursor = cursor().with_known_count();
        let advanced = cursor.advance_counter();
        let sequence = RowSequence::new(cursor);
        assert_eq!(sequence.len().unwrap(), 3);
        assert_eq!(advanced.load(Ordering::Relaxed), 0);
        assert!(!sequence.is_materialized());
    }

    #[test]
    fn test_streaming_is_single_pass() {
        let sequence = RowSequence::new(cursor());
        let ids = sequence
            .rows()
            .map(|row| row.unwrap().as_table().unwrap().get("id").unwrap().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

        let mut again = sequence.rows();
        assert_eq!(again.next().unwrap(), Err(CollectionError::Consumed));
        assert!(again.next().is_none());
        assert_eq!(sequence.materialize(), Err(CollectionError::Consumed));
    }

    #[test]
    fn test_materialized_rows_can_be_streamed_repeatedly() {
        let sequence = RowSequence::new(cursor());
        sequence.materialize().unwrap();
        assert_eq!(sequence.rows().count(), 3);
        assert_eq!(sequence.rows().count(), 3);
    }
}
