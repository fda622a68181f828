use super::CollectionError;
use crate::value::Value;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Storage behind a [`CantoArray`].
pub trait ArrayStore: fmt::Debug + Send + Sync {
    /// Number of elements. Lazy stores may have to read their source first.
    fn len(&self) -> Result<usize, CollectionError>;

    fn get(&self, index: usize) -> Result<Value, CollectionError>;

    fn set(&self, index: usize, value: Value) -> Result<(), CollectionError>;

    fn push(&self, value: Value) -> Result<(), CollectionError>;

    fn remove(&self, index: usize) -> Result<Value, CollectionError>;

    fn is_growable(&self) -> bool;

    fn to_vec(&self) -> Result<Vec<Value>, CollectionError>;
}

/// In-memory sequence. Growable lists accept `add`/`remove`, fixed ones only
/// `set`.
#[derive(Debug, Default)]
pub struct ListStore {
    items: RwLock<Vec<Value>>,
    growable: bool,
}

impl ListStore {
    pub fn growable(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
            growable: true,
        }
    }

    pub fn fixed(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
            growable: false,
        }
    }
}

impl ArrayStore for ListStore {
    fn len(&self) -> Result<usize, CollectionError> {
        Ok(self.items.read().len())
    }

    fn get(&self, index: usize) -> Result<Value, CollectionError> {
        let items = self.items.read();
        items.get(index).cloned().ok_or(CollectionError::OutOfBounds {
            index,
            size: items.len(),
        })
    }

    fn set(&self, index: usize, value: Value) -> Result<(), CollectionError> {
        let mut items = self.items.write();
        let size = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(CollectionError::OutOfBounds { index, size })?;
        *slot = value;
        Ok(())
    }

    fn push(&self, value: Value) -> Result<(), CollectionError> {
        if !self.growable {
            return Err(CollectionError::FixedSize { what: "array" });
        }
        self.items.write().push(value);
        Ok(())
    }

    fn remove(&self, index: usize) -> Result<Value, CollectionError> {
        if !self.growable {
            return Err(CollectionError::FixedSize { what: "array" });
        }
        let mut items = self.items.write();
        if index >= items.len() {
            return Err(CollectionError::OutOfBounds {
                index,
                size: items.len(),
            });
        }
        Ok(items.remove(index))
    }

    fn is_growable(&self) -> bool {
        self.growable
    }

    fn to_vec(&self) -> Result<Vec<Value>, CollectionError> {
        Ok(self.items.read().clone())
    }
}

/// Sequence handle. Clones share the store.
#[derive(Clone)]
pub struct CantoArray {
    store: Arc<dyn ArrayStore>,
}

impl CantoArray {
    pub fn from_store(store: Arc<dyn ArrayStore>) -> Self {
        Self { store }
    }

    /// Growable in-memory array.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self::from_store(Arc::new(ListStore::growable(items)))
    }

    pub fn fixed(items: Vec<Value>) -> Self {
        Self::from_store(Arc::new(ListStore::fixed(items)))
    }

    pub fn get(&self, index: usize) -> Result<Value, CollectionError> {
        self.store.get(index)
    }

    pub fn set(&self, index: usize, value: Value) -> Result<(), CollectionError> {
        self.store.set(index, value)
    }

    pub fn size(&self) -> Result<usize, CollectionError> {
        self.store.len()
    }

    pub fn add(&self, value: Value) -> Result<(), CollectionError> {
        self.store.push(value)
    }

    pub fn remove(&self, index: usize) -> Result<Value, CollectionError> {
        self.store.remove(index)
    }

    pub fn contains(&self, value: &Value) -> Result<bool, CollectionError> {
        Ok(self.store.to_vec()?.iter().any(|item| item == value))
    }

    pub fn is_growable(&self) -> bool {
        self.store.is_growable()
    }

    /// Independent, growable in-memory copy.
    pub fn copy(&self) -> Result<CantoArray, CollectionError> {
        Ok(Self::from_vec(self.store.to_vec()?))
    }

    pub fn to_vec(&self) -> Result<Vec<Value>, CollectionError> {
        self.store.to_vec()
    }

    pub fn ptr_eq(&self, other: &CantoArray) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.store) as *const () as usize
    }
}

impl fmt::Debug for CantoArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CantoArray").field(&self.store).finish()
    }
}

impl fmt::Display for CantoArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(items) = self.store.to_vec() else {
            return write!(f, "[...]");
        };
        write!(f, "[")?;
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growable_array() {
        let array = CantoArray::from_vec(vec![Value::Int(1)]);
        array.add(Value::Int(2)).unwrap();
        assert_eq!(array.size().unwrap(), 2);
        assert_eq!(array.remove(0).unwrap(), Value::Int(1));
        assert!(array.contains(&Value::Int(2)).unwrap());
        assert_eq!(array.to_string(), "[2]");
    }

    #[test]
    fn test_fixed_array_rejects_growth() {
        let array = CantoArray::fixed(vec![Value::Int(1)]);
        array.set(0, Value::Int(5)).unwrap();
        assert_eq!(array.get(0).unwrap(), Value::Int(5));
        assert_eq!(
            array.add(Value::Int(2)),
            Err(CollectionError::FixedSize { what: "array" })
        );
        assert!(array.remove(0).is_err());
    }

    #[test]
    fn test_copy_is_independent() {
        let array = CantoArray::fixed(vec![Value::Int(1)]);
        let copy = array.copy().unwrap();
        copy.add(Value::Int(2)).unwrap();
        assert!(!copy.ptr_eq(&array));
        assert_eq!(array.size().unwrap(), 1);
        assert_eq!(copy.size().unwrap(), 2);
    }
}
