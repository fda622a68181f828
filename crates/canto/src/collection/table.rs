use super::CollectionError;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Storage behind a [`CantoTable`]. Keys keep insertion order.
pub trait TableStore: fmt::Debug + Send + Sync {
    /// Number of entries. Must not force values to be read.
    fn len(&self) -> Result<usize, CollectionError>;

    fn keys(&self) -> Result<Vec<String>, CollectionError>;

    fn get(&self, key: &str) -> Result<Option<Value>, CollectionError>;

    /// Returns the previous value for `key`.
    fn put(&self, key: &str, value: Value) -> Result<Option<Value>, CollectionError>;

    fn contains_key(&self, key: &str) -> Result<bool, CollectionError> {
        Ok(self.keys()?.iter().any(|candidate| candidate == key))
    }

    fn entries(&self) -> Result<Vec<(String, Value)>, CollectionError> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let value = self.get(&key)?.unwrap_or(Value::Null);
                Ok((key, value))
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MapStore {
    entries: RwLock<IndexMap<String, Value>>,
}

impl MapStore {
    pub fn new(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl TableStore for MapStore {
    fn len(&self) -> Result<usize, CollectionError> {
        Ok(self.entries.read().len())
    }

    fn keys(&self) -> Result<Vec<String>, CollectionError> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CollectionError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<Option<Value>, CollectionError> {
        Ok(self.entries.write().insert(key.to_string(), value))
    }

    fn contains_key(&self, key: &str) -> Result<bool, CollectionError> {
        Ok(self.entries.read().contains_key(key))
    }

    fn entries(&self) -> Result<Vec<(String, Value)>, CollectionError> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

/// Name-keyed mapping handle. Clones share the store.
#[derive(Clone)]
pub struct CantoTable {
    store: Arc<dyn TableStore>,
}

impl CantoTable {
    pub fn from_store(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect::<IndexMap<_, _>>();
        Self::from_store(Arc::new(MapStore::new(entries)))
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, CollectionError> {
        self.store.get(key)
    }

    pub fn put(&self, key: &str, value: Value) -> Result<Option<Value>, CollectionError> {
        self.store.put(key, value)
    }

    /// Like [`put`](Self::put) without the previous value.
    pub fn set(&self, key: &str, value: Value) -> Result<(), CollectionError> {
        self.store.put(key, value).map(drop)
    }

    pub fn size(&self) -> Result<usize, CollectionError> {
        self.store.len()
    }

    pub fn keys(&self) -> Result<Vec<String>, CollectionError> {
        self.store.keys()
    }

    pub fn contains(&self, key: &str) -> Result<bool, CollectionError> {
        self.store.contains_key(key)
    }

    /// Independent in-memory copy; reads every value once.
    pub fn copy(&self) -> Result<CantoTable, CollectionError> {
        Ok(Self::from_entries(self.store.entries()?))
    }

    pub fn entries(&self) -> Result<Vec<(String, Value)>, CollectionError> {
        self.store.entries()
    }

    pub fn ptr_eq(&self, other: &CantoTable) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.store) as *const () as usize
    }
}

impl fmt::Debug for CantoTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CantoTable").field(&self.store).finish()
    }
}

impl fmt::Display for CantoTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(entries) = self.store.entries() else {
            return write!(f, "{{...}}");
        };
        write!(f, "{{")?;
        for (index, (key, value)) in entries.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key} = {value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keeps_insertion_order() {
        let table = CantoTable::from_entries([("b", Value::Int(2)), ("a", Value::Int(1))]);
        assert_eq!(table.keys().unwrap(), vec!["b", "a"]);
        assert_eq!(table.to_string(), "{b = 2, a = 1}");
    }

    #[test]
    fn test_put_returns_previous() {
        let table = CantoTable::from_entries([("a", Value::Int(1))]);
        assert_eq!(table.put("a", Value::Int(9)).unwrap(), Some(Value::Int(1)));
        assert_eq!(table.get("a").unwrap(), Some(Value::Int(9)));
        assert!(table.contains("a").unwrap());
        assert!(!table.contains("z").unwrap());
    }

    #[test]
    fn test_copy_is_independent() {
        let table = CantoTable::from_entries([("a", Value::Int(1))]);
        let copy = table.copy().unwrap();
        copy.set("b", Value::Int(2)).unwrap();
        assert_eq!(table.size().unwrap(), 1);
        assert_eq!(copy.size().unwrap(), 2);
    }
}
