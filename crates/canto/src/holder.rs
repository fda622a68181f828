//! Deferred name bindings.

use crate::definition::DefId;
use crate::value::Value;
use crate::wrapper::ObjectWrapper;
use std::sync::Arc;

/// A definition together with the arguments it is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub definition: DefId,
    pub arguments: Arc<[Value]>,
}

impl Binding {
    pub fn new(definition: DefId, arguments: &[Value]) -> Self {
        Self {
            definition,
            arguments: arguments.into(),
        }
    }
}

/// What a lookup asked for (`nominal`) next to what will be constructed for
/// it once overrides are applied (`actual`). Once `data` is set it is the
/// value of the holder and nothing is constructed again.
///
/// Holders are plain data; [`Context::force`](crate::Context::force) decides
/// when to construct.
#[derive(Debug, Clone, PartialEq)]
pub struct Holder {
    nominal: Binding,
    actual: Binding,
    data: Option<Value>,
    instance: Option<ObjectWrapper>,
}

impl Holder {
    pub fn new(nominal: Binding, actual: Binding) -> Self {
        Self {
            nominal,
            actual,
            data: None,
            instance: None,
        }
    }

    pub fn nominal(&self) -> &Binding {
        &self.nominal
    }

    pub fn actual(&self) -> &Binding {
        &self.actual
    }

    /// Whether an override replaced the nominal definition.
    pub fn is_overridden(&self) -> bool {
        self.nominal.definition != self.actual.definition
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Resolved object, if the data is one.
    pub fn instance(&self) -> Option<&ObjectWrapper> {
        self.instance.as_ref()
    }

    pub fn set_data(&mut self, data: Value) {
        self.instance = data.as_object().cloned();
        self.data = Some(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_is_kept() {
        let binding = Binding::new(DefId::CORE, &[Value::Int(1)]);
        let mut holder = Holder::new(binding.clone(), binding);
        assert!(holder.data().is_none());
        assert!(!holder.is_overridden());
        holder.set_data(Value::text("done"));
        assert_eq!(holder.data(), Some(&Value::text("done")));
        assert!(holder.instance().is_none());
    }
}
