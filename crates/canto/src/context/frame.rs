use crate::definition::DefId;
use crate::value::{ArgKey, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Cache key: name of the definition that was actually evaluated, as seen
/// from the instance it belongs to, plus the fingerprints of its arguments
/// and of that instance's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: Arc<str>,
    arguments: SmallVec<[ArgKey; 2]>,
    instance: SmallVec<[ArgKey; 2]>,
}

impl CacheKey {
    pub fn new(name: &str, arguments: &[Value]) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.iter().map(Value::fingerprint).collect(),
            instance: SmallVec::new(),
        }
    }

    /// Same key for a member of the instance constructed with `arguments`.
    pub fn within(mut self, arguments: &[Value]) -> Self {
        self.instance = arguments.iter().map(Value::fingerprint).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({} arguments)", self.name, self.arguments.len())
        }
    }
}

/// One scope of a construction context: the definition being constructed,
/// its arguments and everything cached while it was on top.
pub struct Frame {
    definition: DefId,
    arguments: Arc<[Value]>,
    cache: Mutex<FxHashMap<CacheKey, Value>>,
}

impl Frame {
    pub fn new(definition: DefId, arguments: &[Value]) -> Self {
        Self {
            definition,
            arguments: arguments.into(),
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn definition(&self) -> DefId {
        self.definition
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub(crate) fn shared_arguments(&self) -> Arc<[Value]> {
        self.arguments.clone()
    }

    pub fn cached(&self, key: &CacheKey) -> Option<Value> {
        self.cache.lock().get(key).cloned()
    }

    pub fn store(&self, key: CacheKey, value: Value) {
        self.cache.lock().insert(key, value);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Copy with its own cache storage.
    pub(crate) fn deep_copy(&self) -> Frame {
        Frame {
            definition: self.definition,
            arguments: self.arguments.clone(),
            cache: Mutex::new(self.cache.lock().clone()),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("definition", &self.definition)
            .field("arguments", &self.arguments.len())
            .field("cached", &self.cache_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_arguments() {
        let plain = CacheKey::new("main.f", &[]);
        let one = CacheKey::new("main.f", &[Value::Int(1)]);
        let two = CacheKey::new("main.f", &[Value::Int(2)]);
        assert_ne!(plain, one);
        assert_ne!(one, two);
        assert_eq!(one, CacheKey::new("main.f", &[Value::Int(1)]));
        assert_eq!(one.to_string(), "main.f(1 arguments)");
    }

    #[test]
    fn test_key_includes_instance_arguments() {
        let a = CacheKey::new("main.greeter.message", &[]).within(&[Value::text("a")]);
        let b = CacheKey::new("main.greeter.message", &[]).within(&[Value::text("b")]);
        assert_ne!(a, b);
        assert_eq!(a, CacheKey::new("main.greeter.message", &[]).within(&[Value::text("a")]));
        assert_eq!(CacheKey::new("main.a", &[]).within(&[]), CacheKey::new("main.a", &[]));
    }

    #[test]
    fn test_deep_copy_has_own_cache() {
        let frame = Frame::new(DefId::CORE, &[]);
        frame.store(CacheKey::new("a", &[]), Value::Int(1));
        let copy = frame.deep_copy();
        copy.store(CacheKey::new("a", &[]), Value::Int(2));
        assert_eq!(frame.cached(&CacheKey::new("a", &[])), Some(Value::Int(1)));
        assert_eq!(copy.cached(&CacheKey::new("a", &[])), Some(Value::Int(2)));
    }
}
