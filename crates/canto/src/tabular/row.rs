use super::SharedCursor;
use crate::collection::{CantoTable, CollectionError, TableStore};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

enum RowSource {
    /// Reads through to the cursor while it still stands on `row`.
    Live { cursor: SharedCursor, row: usize },
    Captured(Vec<Value>),
}

/// Immutable column-name → value map of one result row.
pub struct Row {
    columns: Arc<[String]>,
    source: RowSource,
}

impl Row {
    pub fn live(cursor: SharedCursor, row: usize) -> Self {
        Self {
            columns: cursor.columns().clone(),
            source: RowSource::Live { cursor, row },
        }
    }

    pub fn captured(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            columns,
            source: RowSource::Captured(values),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.source, RowSource::Live { .. })
    }

    /// Column value by 1-based ordinal.
    pub fn get_ordinal(&self, ordinal: usize) -> Result<Value, CollectionError> {
        match &self.source {
            RowSource::Live { cursor, row } => cursor.read(*row, ordinal),
            RowSource::Captured(values) => ordinal
                .checked_sub(1)
                .and_then(|index| values.get(index))
                .cloned()
                .ok_or(CollectionError::OutOfBounds {
                    index: ordinal,
                    size: values.len(),
                }),
        }
    }

    pub fn into_table(self) -> CantoTable {
        CantoTable::from_store(Arc::new(self))
    }
}

impl TableStore for Row {
    fn len(&self) -> Result<usize, CollectionError> {
        Ok(self.columns.len())
    }

    fn keys(&self) -> Result<Vec<String>, CollectionError> {
        Ok(self.columns.to_vec())
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CollectionError> {
        match self.columns.iter().position(|column| column == key) {
            Some(index) => self.get_ordinal(index + 1).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, _key: &str, _value: Value) -> Result<Option<Value>, CollectionError> {
        Err(CollectionError::Immutable { what: "row" })
    }

    fn contains_key(&self, key: &str) -> Result<bool, CollectionError> {
        Ok(self.columns.iter().any(|column| column == key))
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Row");
        debug.field("columns", &self.columns);
        match &self.source {
            RowSource::Live { row, .. } => debug.field("live", row),
            RowSource::Captured(values) => debug.field("values", values),
        };
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::VecCursor;

    fn shared() -> SharedCursor {
        SharedCursor::new(VecCursor::new(
            ["id", "name"],
            vec![
                vec![Value::Int(1), Value::text("ada")],
                vec![Value::Int(2), Value::text("bob")],
            ],
        ))
    }

    #[test]
    fn test_size_does_not_read_values() {
        let cursor = shared();
        let row = cursor.advance().unwrap().unwrap();
        let table = Row::live(cursor.clone(), row).into_table();
        cursor.advance().unwrap();
        // The row is stale now, but its shape is still known.
        assert_eq!(table.size().unwrap(), 2);
        assert_eq!(table.keys().unwrap(), vec!["id", "name"]);
        assert_eq!(table.get("id"), Err(CollectionError::StaleRow { row }));
    }

    #[test]
    fn test_rows_are_immutable() {
        let table = Row::captured(
            vec!["id".to_string()].into(),
            vec![Value::Int(7)],
        )
        .into_table();
        assert_eq!(table.get("id").unwrap(), Some(Value::Int(7)));
        assert_eq!(table.get("missing").unwrap(), None);
        assert_eq!(
            table.put("id", Value::Int(8)),
            Err(CollectionError::Immutable { what: "row" })
        );
        assert_eq!(
            table.set("other", Value::Int(8)),
            Err(CollectionError::Immutable { what: "row" })
        );
        assert_eq!(table.get("id").unwrap(), Some(Value::Int(7)));
    }
}
