//! Construction context.
//!
//! A [`Context`] is a stack of [`Frame`]s over a shared, linked
//! [`DefinitionGraph`]. Evaluating a definition pushes a frame for it,
//! evaluates its body with that frame on top and pops it again on every
//! exit path. Values are cached per frame under the definition that was
//! actually evaluated, so repeated lookups inside one frame never construct
//! twice.
//!
//! Forks share ancestor frames by reference; pushes and pops on a fork never
//! show up in the original. A deep fork also copies every frame cache.

mod frame;

pub use frame::{CacheKey, Frame};

use crate::config::Options;
use crate::definition::{Construction, DefId, Definition, DefinitionGraph, DefinitionKind, Instantiation, Target};
use crate::holder::{Binding, Holder};
use crate::parser::Shape;
use crate::redirect::Redirection;
use crate::tabular::ExternalSource;
use crate::value::Value;
use crate::wrapper::ObjectWrapper;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

type RetainedValues = Arc<Mutex<FxHashMap<Arc<str>, Value>>>;

#[derive(Clone)]
pub struct Context {
    graph: Arc<DefinitionGraph>,
    frames: Vec<Arc<Frame>>,
    /// Frames taken off by `unpush`, with the depth they were taken at.
    unpushed: Vec<(Arc<Frame>, usize)>,
    /// Keys currently being constructed, outermost first.
    resolving: Vec<CacheKey>,
    retained: RetainedValues,
    external_source: Option<Arc<dyn ExternalSource>>,
    options: Arc<Options>,
}

impl Context {
    /// Context whose root frame is `site`.
    pub fn new(graph: Arc<DefinitionGraph>, site: DefId) -> Self {
        Self {
            graph,
            frames: vec![Arc::new(Frame::new(site, &[]))],
            unpushed: Vec::new(),
            resolving: Vec::new(),
            retained: Arc::default(),
            external_source: None,
            options: Arc::default(),
        }
    }

    pub fn for_site(graph: Arc<DefinitionGraph>, site: &str) -> Result<Self, Redirection> {
        let site_id = graph
            .site(site)
            .ok_or_else(|| Redirection::standard(format!("undefined site '{site}'")))?;
        Ok(Self::new(graph, site_id))
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn with_external_source(mut self, source: Arc<dyn ExternalSource>) -> Self {
        self.external_source = Some(source);
        self
    }

    /// Shallow fork evaluating against `graph`, which must contain every
    /// definition of the current graph under the same handle.
    pub fn with_graph(&self, graph: Arc<DefinitionGraph>) -> Self {
        let mut fork = self.clone();
        fork.graph = graph;
        fork
    }

    pub fn graph(&self) -> &Arc<DefinitionGraph> {
        &self.graph
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Definition of the innermost frame.
    pub fn peek(&self) -> DefId {
        self.top().definition()
    }

    pub fn top(&self) -> &Arc<Frame> {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn push(&mut self, frame: Frame) {
        tracing::trace!(definition = ?frame.definition(), depth = self.frames.len(), "push");
        self.frames.push(Arc::new(frame));
    }

    /// Pops the innermost frame. Panics on the root frame and on a frame
    /// below an outstanding `unpush`.
    pub fn pop(&mut self) -> Arc<Frame> {
        assert!(self.frames.len() > 1, "cannot pop the root frame");
        if let Some((_, depth)) = self.unpushed.last() {
            assert!(
                self.frames.len() > *depth,
                "pop below an unpushed frame; repush first"
            );
        }
        let frame = self.frames.pop().unwrap_or_else(|| unreachable!());
        tracing::trace!(definition = ?frame.definition(), depth = self.frames.len(), "pop");
        frame
    }

    /// Takes the innermost frame off until the matching [`repush`](Self::repush).
    pub fn unpush(&mut self) {
        assert!(self.frames.len() > 1, "cannot unpush the root frame");
        let frame = self.frames.pop().unwrap_or_else(|| unreachable!());
        self.unpushed.push((frame, self.frames.len()));
    }

    /// Restores the frame taken by the last `unpush`. Panics without one or
    /// when the stack is not back at the depth of that `unpush`.
    pub fn repush(&mut self) {
        let Some((frame, depth)) = self.unpushed.pop() else {
            panic!("repush without matching unpush");
        };
        assert_eq!(
            self.frames.len(),
            depth,
            "repush at a different depth than its unpush"
        );
        self.frames.push(frame);
    }

    /// Runs `f` as seen `levels` scopes further out.
    pub fn in_container<T>(&mut self, levels: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        for _ in 0..levels {
            self.unpush();
        }
        let result = f(self);
        for _ in 0..levels {
            self.repush();
        }
        result
    }

    /// Independent copy. Without `deep` the existing frames, and the values
    /// they cache, stay shared with `self`.
    pub fn fork(&self, deep: bool) -> Self {
        let mut fork = self.clone();
        if deep {
            fork.frames = self
                .frames
                .iter()
                .map(|frame| Arc::new(frame.deep_copy()))
                .collect();
            fork.unpushed = self
                .unpushed
                .iter()
                .map(|(frame, depth)| (Arc::new(frame.deep_copy()), *depth))
                .collect();
            fork.retained = Arc::new(Mutex::new(self.retained.lock().clone()));
        }
        fork
    }

    /// Continues the cycle detection of `caller` in this context.
    pub(crate) fn inherit_resolving(&mut self, caller: &Context) {
        self.resolving = caller.resolving.clone();
    }

    /// Cached value for `key` in the innermost frame holding one.
    pub fn cached(&self, key: &CacheKey) -> Option<Value> {
        self.frames.iter().rev().find_map(|frame| frame.cached(key))
    }

    /// Value of `definition` for `arguments`, constructed and cached in the
    /// current frame unless a visible frame already holds it. `indexes` are
    /// applied to the cached value.
    pub fn get_data(
        &mut self,
        definition: DefId,
        arguments: &[Value],
        indexes: &[Value],
    ) -> Result<Value, Redirection> {
        let key = self.key(definition, arguments);
        let value = match self.cached(&key) {
            Some(value) => {
                tracing::trace!(%key, "cache hit");
                value
            }
            None => {
                if self.resolving.contains(&key) {
                    return Err(Redirection::standard(format!(
                        "recursive definition '{}'",
                        key.name()
                    )));
                }
                self.resolving.push(key.clone());
                let result = self.evaluate_definition(definition, arguments);
                self.resolving.pop();
                let value = result?;
                self.top().store(key, value.clone());
                value
            }
        };
        apply_indexes(value, indexes)
    }

    /// Stores `data` for `definition` in the current frame without
    /// evaluating anything.
    pub fn put_data(&mut self, definition: DefId, arguments: &[Value], data: Value) {
        let key = self.key(definition, arguments);
        self.top().store(key, data);
    }

    /// Key for `definition` as evaluated from the current stack. A member
    /// is keyed under the instance it is evaluated for: an inherited member
    /// takes the name of the derived scope, and the instance's arguments are
    /// part of the key.
    fn key(&self, definition: DefId, arguments: &[Value]) -> CacheKey {
        let target = self.graph.get(definition);
        let Some((owner, frame)) = self.instance_frame(definition) else {
            return CacheKey::new(&target.full_name, arguments);
        };
        let scope = frame.definition();
        let key = if scope == owner {
            CacheKey::new(&target.full_name, arguments)
        } else {
            let name = format!("{}.{}", self.graph.get(scope).full_name, target.name);
            CacheKey::new(&name, arguments)
        };
        key.within(frame.arguments())
    }

    /// Owner of `definition` and the innermost frame constructing that owner
    /// or a definition extending it.
    fn instance_frame(&self, definition: DefId) -> Option<(DefId, &Arc<Frame>)> {
        let target = self.graph.get(definition);
        let owner = target.owner.filter(|_| !target.is_anonymous)?;
        self.frames
            .iter()
            .rev()
            .find(|frame| self.graph.extends(frame.definition(), owner))
            .map(|frame| (owner, frame))
    }

    /// Key for a host-supplied name: the definition it denotes or the bare
    /// name.
    fn name_key(&self, name: &str) -> CacheKey {
        match self.graph.find(self.peek(), name) {
            Some(definition) => self.key(definition, &[]),
            None => CacheKey::new(name, &[]),
        }
    }

    /// Retained values are stored under the full name of the definition
    /// `name` denotes from the current frame, or the bare name.
    fn retained_name(&self, name: &str) -> Arc<str> {
        match self.graph.find(self.peek(), name) {
            Some(definition) => self.graph.get(definition).full_name.as_str().into(),
            None => name.into(),
        }
    }

    /// Cached value for `name`. A trailing retention marker reads the
    /// request-retained values instead of the frames.
    pub fn get(&self, name: &str) -> Option<Value> {
        let (name, retained) = self.options.strip_retain_marker(name);
        if retained {
            return self.retained.lock().get(&*self.retained_name(name)).cloned();
        }
        self.cached(&self.name_key(name))
    }

    /// Binds `value` to `name` in the current frame, or beyond every frame
    /// if the name carries the retention marker. A retained value feeds only
    /// the external definition `name` resolves to from the current frame.
    pub fn put(&mut self, name: &str, value: Value) {
        let (name, retained) = self.options.strip_retain_marker(name);
        if retained {
            let name = self.retained_name(name);
            self.retained.lock().insert(name, value);
            return;
        }
        let key = self.name_key(name);
        self.top().store(key, value);
    }

    /// Resolves a dotted `name` from the current frame and constructs it.
    #[tracing::instrument(level = "debug", skip(self, arguments), fields(arguments = arguments.len()))]
    pub fn construct(&mut self, name: &str, arguments: &[Value]) -> Result<Value, Redirection> {
        let path = self.graph.lookup_path(self.peek(), name);
        let last = path.len().saturating_sub(1);
        let mut value = None;
        for (position, (segment, target)) in path.iter().enumerate() {
            let part_arguments: &[Value] = if position == last { arguments } else { &[] };
            value = Some(self.step(value.take(), segment, *target, part_arguments, &[])?);
        }
        value.ok_or_else(|| Redirection::undefined_name(name))
    }

    /// Binding for `name` without constructing it.
    pub fn holder(&self, name: &str, arguments: &[Value]) -> Result<Holder, Redirection> {
        let nominal = self
            .graph
            .find(self.peek(), name)
            .ok_or_else(|| Redirection::undefined_name(name))?;
        let actual = self.select_override(nominal);
        let mut holder = Holder::new(
            Binding::new(nominal, arguments),
            Binding::new(actual, arguments),
        );
        if let Some(data) = self.cached(&self.key(actual, arguments)) {
            holder.set_data(data);
        }
        Ok(holder)
    }

    /// Value of `holder`, constructing its actual binding only if the holder
    /// has no data yet.
    pub fn force(&mut self, holder: &mut Holder) -> Result<Value, Redirection> {
        if let Some(data) = holder.data() {
            return Ok(data.clone());
        }
        let actual = holder.actual().clone();
        let value = self.get_data(actual.definition, &actual.arguments, &[])?;
        holder.set_data(value.clone());
        Ok(value)
    }

    /// Most derived definition to construct for `definition` as seen from
    /// the current stack: the innermost frame whose definition extends the
    /// owner of `definition` picks its own child of the same name.
    pub fn select_override(&self, definition: DefId) -> DefId {
        match self.instance_frame(definition) {
            Some((owner, frame)) if frame.definition() != owner => self
                .graph
                .child(frame.definition(), &self.graph.get(definition).name)
                .unwrap_or(definition),
            _ => definition,
        }
    }

    pub fn evaluate(&mut self, construction: &Construction) -> Result<Value, Redirection> {
        match construction {
            Construction::Literal(literal) => Ok(Value::from(literal)),
            Construction::Reference(instantiation) => self.instantiate(instantiation),
            Construction::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(items))
            }
            Construction::Table(entries) => {
                let entries = entries
                    .iter()
                    .map(|(key, value)| Ok((key.as_str(), self.evaluate(value)?)))
                    .collect::<Result<Vec<_>, Redirection>>()?;
                Ok(Value::table(entries))
            }
        }
    }

    fn evaluate_all(&mut self, constructions: &[Construction]) -> Result<Vec<Value>, Redirection> {
        constructions
            .iter()
            .map(|construction| self.evaluate(construction))
            .collect()
    }

    fn instantiate(&mut self, instantiation: &Instantiation) -> Result<Value, Redirection> {
        let mut value = None;
        for part in &instantiation.parts {
            let arguments = match &part.arguments {
                Some(arguments) => self.evaluate_all(arguments)?,
                None => Vec::new(),
            };
            let indexes = self.evaluate_all(&part.indexes)?;
            value = Some(self.step(value.take(), &part.name, part.target, &arguments, &indexes)?);
        }
        value.ok_or_else(|| Redirection::standard("empty reference"))
    }

    /// Evaluates one part of a dotted reference on the value of the parts
    /// before it.
    fn step(
        &mut self,
        previous: Option<Value>,
        name: &str,
        target: Option<Target>,
        arguments: &[Value],
        indexes: &[Value],
    ) -> Result<Value, Redirection> {
        let Some(target) = target else {
            return Err(Redirection::undefined_name(name));
        };
        let value = match (previous, target) {
            (None, Target::Definition(definition)) => {
                let actual = self.select_override(definition);
                return self.get_data(actual, arguments, indexes);
            }
            (None, Target::Parameter { owner, index }) => self.parameter(owner, index)?,
            (None, Target::Member) => return Err(Redirection::undefined_name(name)),
            (Some(Value::Object(object)), Target::Definition(definition)) => {
                object.construct_member(Some(&*self), definition, arguments)?
            }
            (Some(Value::Object(object)), Target::Member) => object.member(Some(&*self), name, arguments)?,
            (Some(Value::Table(table)), Target::Member) => table.get(name)?.unwrap_or(Value::Null),
            (Some(previous), _) => {
                return Err(Redirection::standard(format!(
                    "{} has no member '{name}'",
                    previous.type_name()
                )));
            }
        };
        apply_indexes(value, indexes)
    }

    /// Value of the `index`-th parameter of `owner` for the innermost frame
    /// constructing `owner` or a definition extending it.
    fn parameter(&mut self, owner: DefId, index: usize) -> Result<Value, Redirection> {
        let found = self
            .frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, frame)| self.graph.extends(frame.definition(), owner))
            .map(|(position, frame)| (position, frame.definition(), frame.shared_arguments()));
        let Some((position, scope, arguments)) = found else {
            return Err(Redirection::standard(format!(
                "parameter '{}' of '{}' is not bound",
                self.parameter_name(owner, index),
                self.graph.get(owner).full_name
            )));
        };
        if scope == owner {
            return Ok(arguments.get(index).cloned().unwrap_or(Value::Null));
        }
        // Supplied by a supertype instantiation, written inside `scope`.
        let Some(argument) = self.supertype_argument(scope, owner, index) else {
            return Ok(Value::Null);
        };
        let levels = self.frames.len() - 1 - position;
        self.in_container(levels, |context| context.evaluate(&argument))
    }

    fn parameter_name(&self, owner: DefId, index: usize) -> &str {
        self.graph
            .get(owner)
            .parameters
            .get(index)
            .map_or("?", |parameter| parameter.name.as_str())
    }

    fn supertype_argument(&self, scope: DefId, owner: DefId, index: usize) -> Option<Construction> {
        let derived = self
            .graph
            .supertype_chain(scope)
            .into_iter()
            .find(|id| self.graph.supertype(*id) == Some(owner))?;
        let instantiation = self.graph.get(derived).supertype.as_ref()?;
        instantiation.parts.last()?.arguments.as_ref()?.get(index).cloned()
    }

    /// Constructs `definition` without consulting or filling any cache.
    pub(crate) fn evaluate_definition(
        &mut self,
        definition: DefId,
        arguments: &[Value],
    ) -> Result<Value, Redirection> {
        let graph = self.graph.clone();
        let target = graph.get(definition);
        tracing::trace!(definition = %target.full_name, kind = target.kind.describe(), "construct");
        match &target.kind {
            DefinitionKind::Core | DefinitionKind::Site | DefinitionKind::Complex => {
                self.enter(definition, arguments, |context| {
                    let mut snapshot = context.clone();
                    snapshot.resolving.clear();
                    Ok(Value::Object(ObjectWrapper::instance(definition, arguments, snapshot)))
                })
            }
            DefinitionKind::Named { body } => {
                self.enter(definition, arguments, |context| context.evaluate(body))
            }
            DefinitionKind::Collection { body } => {
                let value = self.enter(definition, arguments, |context| context.evaluate(body))?;
                check_shape(target, value)
            }
            DefinitionKind::External => self.external(target, arguments),
        }
    }

    /// Runs `f` with a frame for `definition` on top; the frame is popped
    /// again whatever `f` returns.
    fn enter(
        &mut self,
        definition: DefId,
        arguments: &[Value],
        f: impl FnOnce(&mut Self) -> Result<Value, Redirection>,
    ) -> Result<Value, Redirection> {
        if self.frames.len() >= self.options.max_depth {
            return Err(Redirection::standard(format!(
                "maximum construction depth {} exceeded at '{}'",
                self.options.max_depth,
                self.graph.get(definition).full_name
            )));
        }
        self.push(Frame::new(definition, arguments));
        let result = f(self);
        self.pop();
        result
    }

    fn external(&self, definition: &Definition, arguments: &[Value]) -> Result<Value, Redirection> {
        if let Some(value) = self.retained.lock().get(definition.full_name.as_str()) {
            return Ok(value.clone());
        }
        let fetched = self
            .external_source
            .as_ref()
            .and_then(|source| source.fetch(&definition.full_name, arguments));
        fetched.unwrap_or_else(|| {
            Err(Redirection::standard(format!(
                "no value supplied for external definition '{}'",
                definition.full_name
            )))
        })
    }

    /// Ends the request: drops every cached value, which also releases
    /// objects whose snapshots point back at these frames.
    pub fn discard(self) {
        for frame in &self.frames {
            frame.clear();
        }
        for (frame, _) in &self.unpushed {
            frame.clear();
        }
        self.retained.lock().clear();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field(
                "frames",
                &self
                    .frames
                    .iter()
                    .map(|frame| self.graph.get(frame.definition()).full_name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("unpushed", &self.unpushed.len())
            .field("resolving", &self.resolving)
            .finish_non_exhaustive()
    }
}

fn apply_indexes(value: Value, indexes: &[Value]) -> Result<Value, Redirection> {
    indexes.iter().try_fold(value, |value, index| value.index(index))
}

fn check_shape(definition: &Definition, value: Value) -> Result<Value, Redirection> {
    match (definition.shape, &value) {
        (Shape::Array, Value::Array(_)) | (Shape::Table, Value::Table(_)) | (Shape::Scalar, _) => Ok(value),
        (Shape::Array, _) | (Shape::Table, _) => Err(Redirection::standard(format!(
            "'{}' is declared as {} but evaluated to {}",
            definition.full_name,
            if definition.is_table() { "a table" } else { "an array" },
            value.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BuildPipeline;

    fn context(source: &str) -> Context {
        let mut graph = DefinitionGraph::new();
        let site = graph.add_site("main");
        BuildPipeline::new(&mut graph).build_source(source, site).unwrap();
        Context::new(Arc::new(graph), site)
    }

    #[test]
    fn test_construct_named_and_parameters() {
        let mut context = context("greeting = \"hi\" echo(x) = x pick(x, y) = y");
        assert_eq!(context.construct("greeting", &[]).unwrap(), Value::text("hi"));
        assert_eq!(context.construct("echo", &[Value::Int(4)]).unwrap(), Value::Int(4));
        assert_eq!(
            context
                .construct("pick", &[Value::Int(1), Value::Int(2)])
                .unwrap(),
            Value::Int(2)
        );
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn test_undefined_name_redirects() {
        let mut context = context("a = 1");
        let redirection = context.construct("nope", &[]).unwrap_err();
        assert!(redirection.is_standard_error());
        assert_eq!(redirection.message(), "undefined name 'nope'");
    }

    #[test]
    fn test_recursion_is_redirected() {
        let mut context = context("a = b b = a");
        let redirection = context.construct("a", &[]).unwrap_err();
        assert_eq!(redirection.message(), "recursive definition 'main.a'");
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut context = context("down(n) = down([n])").with_options(Options {
            max_depth: 8,
            ..Options::default()
        });
        let redirection = context.construct("down", &[Value::Int(0)]).unwrap_err();
        assert!(redirection.message().starts_with("maximum construction depth 8"));
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn test_in_container_sees_outer_scope() {
        let mut context = context("outer { inner = 1 }");
        let outer = context.graph().find(context.peek(), "outer").unwrap();
        context.push(Frame::new(outer, &[]));
        let seen = context.in_container(1, |context| context.peek());
        assert_eq!(seen, context.graph().site("main").unwrap());
        assert_eq!(context.peek(), outer);
        context.pop();
    }

    #[test]
    #[should_panic(expected = "cannot pop the root frame")]
    fn test_pop_root_panics() {
        context("a = 1").pop();
    }

    #[test]
    #[should_panic(expected = "pop below an unpushed frame")]
    fn test_pop_below_unpush_panics() {
        let mut context = context("a = 1");
        let site = context.peek();
        context.push(Frame::new(site, &[]));
        context.push(Frame::new(site, &[]));
        context.unpush();
        context.pop();
    }
}
