//! Uniform facade over constructed objects.
//!
//! An [`ObjectWrapper`] pairs something evaluable with a snapshot of the
//! context it resolves in. Every call evaluates in its own fork of that
//! snapshot, so callers never see or disturb its stack. Values are memoized
//! by the context caches, not by the wrapper.

use crate::context::Context;
use crate::definition::{Construction, DefId, DefinitionGraph};
use crate::error::ObjectError;
use crate::pipeline::resolve_construction;
use crate::redirect::Redirection;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct ObjectWrapper {
    state: Arc<WrapperState>,
}

enum WrapperState {
    /// Constructed complex definition; its frame is the top of `context`.
    Instance {
        definition: DefId,
        arguments: Arc<[Value]>,
        context: Context,
    },
    /// Raw construction evaluated in a site.
    Construction {
        construction: Construction,
        context: Context,
    },
}

impl ObjectWrapper {
    pub(crate) fn instance(definition: DefId, arguments: &[Value], context: Context) -> Self {
        Self {
            state: Arc::new(WrapperState::Instance {
                definition,
                arguments: arguments.into(),
                context,
            }),
        }
    }

    /// Wraps `construction`, resolving its names from `site`.
    pub fn from_construction(mut construction: Construction, graph: Arc<DefinitionGraph>, site: DefId) -> Self {
        resolve_construction(&graph, &mut construction, site);
        Self {
            state: Arc::new(WrapperState::Construction {
                construction,
                context: Context::new(graph, site),
            }),
        }
    }

    /// Definition of a wrapped instance.
    pub fn definition(&self) -> Option<DefId> {
        match &*self.state {
            WrapperState::Instance { definition, .. } => Some(*definition),
            WrapperState::Construction { construction, .. } => {
                construction.as_reference().and_then(|reference| reference.definition())
            }
        }
    }

    pub fn arguments(&self) -> &[Value] {
        match &*self.state {
            WrapperState::Instance { arguments, .. } => arguments,
            WrapperState::Construction { .. } => &[],
        }
    }

    /// Fresh fork of the wrapped context.
    pub fn context(&self) -> Context {
        self.snapshot().fork(false)
    }

    fn snapshot(&self) -> &Context {
        match &*self.state {
            WrapperState::Instance { context, .. } | WrapperState::Construction { context, .. } => context,
        }
    }

    fn context_for(&self, caller: Option<&Context>) -> Context {
        let mut context = self.context();
        if let Some(caller) = caller {
            context.inherit_resolving(caller);
        }
        context
    }

    /// The wrapped value. An instance is its own value.
    pub fn data(&self) -> Result<Value, Redirection> {
        self.data_in(None)
    }

    fn data_in(&self, caller: Option<&Context>) -> Result<Value, Redirection> {
        match &*self.state {
            WrapperState::Instance { .. } => Ok(Value::Object(self.clone())),
            WrapperState::Construction { construction, .. } => {
                self.context_for(caller).evaluate(construction)
            }
        }
    }

    /// Value of the member `name`, which may be dotted: each segment is
    /// looked up on the value of the segments before it. `arguments` go to
    /// the last segment.
    pub fn child_data(&self, name: &str, arguments: &[Value]) -> Result<Value, Redirection> {
        descend(Value::Object(self.clone()), name, arguments)
    }

    /// Truth value of a child; `false` if it cannot be constructed.
    pub fn child_boolean(&self, name: &str) -> bool {
        self.child_data(name, &[])
            .map(|value| value.is_truthy())
            .unwrap_or(false)
    }

    /// Text of a child; `None` if it cannot be constructed or is null.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child_data(name, &[]).ok().and_then(|value| value.to_text())
    }

    /// Integer value of a child. Unlike the other accessors there is no
    /// default: any failure is a [`ObjectError::NumberFormat`].
    pub fn child_int(&self, name: &str) -> Result<i64, ObjectError> {
        let number_format = |text: Option<String>| ObjectError::NumberFormat {
            name: name.to_string(),
            text,
        };
        match self.child_data(name, &[]) {
            Ok(Value::Int(number)) => Ok(number),
            Ok(Value::Float(number)) if number.fract() == 0.0 && number.abs() < i64::MAX as f64 => {
                Ok(number as i64)
            }
            Ok(Value::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| number_format(Some(text.to_string()))),
            Ok(value) => Err(number_format(value.to_text())),
            Err(redirection) => {
                tracing::debug!(name, %redirection, "integer child not constructed");
                Err(number_format(None))
            }
        }
    }

    /// Whether `name` names a member, checked on the definitions only.
    pub fn is_child_defined(&self, name: &str) -> bool {
        let Some(mut current) = self.definition() else {
            return false;
        };
        let graph = self.snapshot().graph();
        for segment in name.split('.') {
            match graph.child(current, segment) {
                Some(child) => current = child,
                None => return false,
            }
        }
        true
    }

    /// Member `name` of the wrapped value.
    pub(crate) fn member(
        &self,
        caller: Option<&Context>,
        name: &str,
        arguments: &[Value],
    ) -> Result<Value, Redirection> {
        match &*self.state {
            WrapperState::Instance { definition, context, .. } => {
                let child = context
                    .graph()
                    .child(*definition, name)
                    .ok_or_else(|| Redirection::undefined_name(name))?;
                self.construct_member(caller, child, arguments)
            }
            WrapperState::Construction { .. } => match self.data_in(caller)? {
                Value::Object(object) => object.member(caller, name, arguments),
                value => member_of_value(value, name, arguments),
            },
        }
    }

    /// Constructs the member definition `member` inside this object.
    pub(crate) fn construct_member(
        &self,
        caller: Option<&Context>,
        member: DefId,
        arguments: &[Value],
    ) -> Result<Value, Redirection> {
        match &*self.state {
            WrapperState::Instance { .. } => {
                let mut context = self.context_for(caller);
                let actual = context.select_override(member);
                context.get_data(actual, arguments, &[])
            }
            WrapperState::Construction { .. } => match self.data_in(caller)? {
                Value::Object(object) => object.construct_member(caller, member, arguments),
                value => Err(Redirection::standard(format!(
                    "{} has no members",
                    value.type_name()
                ))),
            },
        }
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.state) as *const () as usize
    }
}

/// Follows a dotted path from `value`.
fn descend(value: Value, path: &str, arguments: &[Value]) -> Result<Value, Redirection> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let head_arguments = if rest.is_none() { arguments } else { &[] };
    let next = member_of_value(value, head, head_arguments)?;
    match rest {
        Some(rest) => descend(next, rest, arguments),
        None => Ok(next),
    }
}

fn member_of_value(value: Value, name: &str, arguments: &[Value]) -> Result<Value, Redirection> {
    match value {
        Value::Object(object) => object.member(None, name, arguments),
        Value::Table(table) => table.get(name)?.ok_or_else(|| Redirection::undefined_name(name)),
        value => Err(Redirection::standard(format!(
            "{} has no member '{name}'",
            value.type_name()
        ))),
    }
}

impl PartialEq for ObjectWrapper {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for ObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state {
            WrapperState::Instance { definition, context, .. } => {
                write!(f, "object {}", context.graph().get(*definition).full_name)
            }
            WrapperState::Construction { construction, .. } => match construction.as_reference() {
                Some(reference) => write!(f, "object {reference}"),
                None => write!(f, "object <construction>"),
            },
        }
    }
}
