//! Runtime values produced by construction.

use crate::collection::{CantoArray, CantoTable};
use crate::parser::Literal;
use crate::redirect::Redirection;
use crate::wrapper::ObjectWrapper;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

/// Collections and objects are shared handles: cloning a value never copies
/// the underlying store.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
    Array(CantoArray),
    Table(CantoTable),
    Object(ObjectWrapper),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into().into())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(CantoArray::from_vec(items.into_iter().collect()))
    }

    pub fn table(entries: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        Value::Table(CantoTable::from_entries(entries))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&CantoArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&CantoTable> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectWrapper> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Truth value used by boolean coercion.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(number) => *number != 0,
            Value::Float(number) => *number != 0.0,
            Value::Text(text) => !text.is_empty() && !text.eq_ignore_ascii_case("false"),
            Value::Array(array) => array.size().map(|size| size > 0).unwrap_or(false),
            Value::Table(table) => table.size().map(|size| size > 0).unwrap_or(false),
            Value::Object(_) => true,
        }
    }

    /// Text rendering; `None` for null.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(text.to_string()),
            value => Some(value.to_string()),
        }
    }

    /// Applies one `[index]` operation.
    pub fn index(&self, index: &Value) -> Result<Value, Redirection> {
        match (self, index) {
            (Value::Array(array), Value::Int(position)) => {
                let position = usize::try_from(*position).map_err(|_| {
                    Redirection::standard(format!("negative array index {position}"))
                })?;
                Ok(array.get(position)?)
            }
            (Value::Table(table), key) => {
                let key = key.to_text().unwrap_or_default();
                Ok(table.get(&key)?.unwrap_or(Value::Null))
            }
            (Value::Array(_), index) => Err(Redirection::standard(format!(
                "array index must be an integer, got {index}"
            ))),
            (value, _) => Err(Redirection::standard(format!(
                "{} cannot be indexed",
                value.type_name()
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Table(_) => "table",
            Value::Object(_) => "object",
        }
    }

    /// Hashable identity used in cache keys. Scalars key by value, with
    /// integral floats keyed as the equal integer. Collections and objects
    /// key by handle identity and the key holds the handle, so the address
    /// cannot be reused while the key lives.
    pub fn fingerprint(&self) -> ArgKey {
        match self {
            Value::Null => ArgKey::Null,
            Value::Bool(value) => ArgKey::Bool(*value),
            Value::Int(number) => ArgKey::Int(*number),
            Value::Float(number) => match integral(*number) {
                Some(number) => ArgKey::Int(number),
                None => ArgKey::Float(number.to_bits()),
            },
            Value::Text(text) => ArgKey::Text(text.clone()),
            Value::Array(array) => ArgKey::Array(array.clone()),
            Value::Table(table) => ArgKey::Table(table.clone()),
            Value::Object(object) => ArgKey::Object(object.clone()),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(value) => Value::Bool(*value),
            Literal::Int(number) => Value::Int(*number),
            Literal::Float(number) => Value::Float(*number),
            Literal::Text(text) => Value::text(text.as_str()),
        }
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Int(number)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::text(text)
    }
}

/// Scalars compare by value; collections and objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => integral(*b) == Some(*a),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(number) => write!(f, "{number}"),
            Value::Float(number) => write!(f, "{number}"),
            Value::Text(text) => write!(f, "{text}"),
            Value::Array(array) => write!(f, "{array}"),
            Value::Table(table) => write!(f, "{table}"),
            Value::Object(object) => write!(f, "{object:?}"),
        }
    }
}

/// The integer equal to `number`, if there is one.
fn integral(number: f64) -> Option<i64> {
    // i64::MAX rounds up to 2^63, which is already out of range.
    let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
    (number.fract() == 0.0 && in_range).then_some(number as i64)
}

#[derive(Debug, Clone)]
pub enum ArgKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(Arc<str>),
    Array(CantoArray),
    Table(CantoTable),
    Object(ObjectWrapper),
}

impl ArgKey {
    fn identity(&self) -> Option<usize> {
        match self {
            ArgKey::Array(array) => Some(array.identity()),
            ArgKey::Table(table) => Some(table.identity()),
            ArgKey::Object(object) => Some(object.identity()),
            _ => None,
        }
    }
}

impl PartialEq for ArgKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgKey::Null, ArgKey::Null) => true,
            (ArgKey::Bool(a), ArgKey::Bool(b)) => a == b,
            (ArgKey::Int(a), ArgKey::Int(b)) => a == b,
            (ArgKey::Float(a), ArgKey::Float(b)) => a == b,
            (ArgKey::Text(a), ArgKey::Text(b)) => a == b,
            (ArgKey::Array(a), ArgKey::Array(b)) => a.ptr_eq(b),
            (ArgKey::Table(a), ArgKey::Table(b)) => a.ptr_eq(b),
            (ArgKey::Object(a), ArgKey::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ArgKey {}

impl Hash for ArgKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            ArgKey::Null => {}
            ArgKey::Bool(value) => value.hash(state),
            ArgKey::Int(number) => number.hash(state),
            ArgKey::Float(bits) => bits.hash(state),
            ArgKey::Text(text) => text.hash(state),
            ArgKey::Array(_) | ArgKey::Table(_) | ArgKey::Object(_) => self.identity().hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(!Value::text("false").is_truthy());
        assert!(Value::text("yes").is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::array([]).is_truthy());
    }

    #[test]
    fn test_index_into_collections() {
        let array = Value::array([Value::Int(10), Value::Int(20)]);
        assert_eq!(array.index(&Value::Int(1)).unwrap(), Value::Int(20));
        assert!(array.index(&Value::Int(5)).is_err());

        let table = Value::table([("a", Value::Int(1))]);
        assert_eq!(table.index(&Value::text("a")).unwrap(), Value::Int(1));
        assert_eq!(table.index(&Value::text("b")).unwrap(), Value::Null);

        assert!(Value::Int(1).index(&Value::Int(0)).is_err());
    }

    #[test]
    fn test_fingerprint_keys_collections_by_identity() {
        let array = Value::array([Value::Int(1)]);
        let same = array.clone();
        let other = Value::array([Value::Int(1)]);
        assert_eq!(array.fingerprint(), same.fingerprint());
        assert_ne!(array.fingerprint(), other.fingerprint());
        assert_eq!(Value::Int(2).fingerprint(), ArgKey::Int(2));
    }

    #[test]
    fn test_fingerprint_keeps_collections_alive() {
        let array = Value::array([Value::Int(1)]);
        let key = array.fingerprint();
        let address = match &array {
            Value::Array(handle) => handle.identity(),
            _ => unreachable!(),
        };
        drop(array);
        // The key still owns the store, so a fresh array cannot take its
        // address and collide with it.
        let fresh = Value::array([Value::Int(2)]);
        assert_ne!(key, fresh.fingerprint());
        assert_eq!(key.identity(), Some(address));
    }

    #[test]
    fn test_integral_floats_key_as_integers() {
        assert_eq!(Value::Float(1.0), Value::Int(1));
        assert_eq!(Value::Float(1.0).fingerprint(), Value::Int(1).fingerprint());
        assert_eq!(Value::Float(-0.0).fingerprint(), ArgKey::Int(0));
        assert_ne!(Value::Float(1.5).fingerprint(), Value::Int(1).fingerprint());
        assert_ne!(Value::Float(1.5), Value::Int(1));
        assert_ne!(Value::Float(f64::MAX).fingerprint(), ArgKey::Int(i64::MAX));
    }
}
