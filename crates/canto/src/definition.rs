//! Definition arena.
//!
//! Definitions live in a [`DefinitionGraph`] and are addressed by [`DefId`]
//! handles. Index 0 is always the core. Sites are children of the core and
//! user definitions are planted under a site, then linked by the build
//! pipeline. A graph can be layered over a shared parent graph: the layer
//! sees every parent definition under the same handle and adds its own after
//! them, without touching the parent.

mod construction;

pub use construction::{Construction, Instantiation, NamePart, Target};

use crate::parser::{ParsedBody, ParsedDefinition, ParsedItem, Shape};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;
use std::sync::Arc;

pub const CORE_NAME: &str = "core";
pub const ANONYMOUS_NAME: &str = "<anon>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u32);

impl DefId {
    pub const CORE: DefId = DefId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Closed set of definition kinds; evaluation dispatches on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionKind {
    Core,
    Site,
    /// Block definition whose children are its members.
    Complex,
    Named { body: Construction },
    Collection { body: Construction },
    /// Value supplied by the host.
    External,
}

impl DefinitionKind {
    pub fn describe(&self) -> &'static str {
        match self {
            DefinitionKind::Core => "core",
            DefinitionKind::Site => "site",
            DefinitionKind::Complex => "complex definition",
            DefinitionKind::Named { .. } => "named definition",
            DefinitionKind::Collection { .. } => "collection definition",
            DefinitionKind::External => "external definition",
        }
    }

    pub fn body(&self) -> Option<&Construction> {
        match self {
            DefinitionKind::Named { body } | DefinitionKind::Collection { body } => Some(body),
            _ => None,
        }
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut Construction> {
        match self {
            DefinitionKind::Named { body } | DefinitionKind::Collection { body } => Some(body),
            _ => None,
        }
    }

    /// Kinds whose members are known statically.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            DefinitionKind::Core | DefinitionKind::Site | DefinitionKind::Complex
        )
    }
}

/// Linking progress of one definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkState {
    Parsed,
    Initialized,
    Resolved,
    Validated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    /// Dot-qualified name, set by the initialize pass.
    pub full_name: String,
    pub kind: DefinitionKind,
    pub parameters: Vec<Parameter>,
    pub shape: Shape,
    pub is_external: bool,
    pub is_anonymous: bool,
    pub supertype: Option<Instantiation>,
    /// Scope the definition was planted in.
    pub declared_in: Option<DefId>,
    pub owner: Option<DefId>,
    pub site: Option<DefId>,
    /// Nested definitions in source order.
    pub members: Vec<DefId>,
    /// Name-addressable children, registered by the initialize pass.
    pub children: IndexMap<String, DefId>,
    pub state: LinkState,
    /// Another definition of the same name already exists in the scope.
    pub is_duplicate: bool,
    pub span: Range<usize>,
}

impl Definition {
    fn new(name: impl Into<String>, kind: DefinitionKind) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            kind,
            parameters: Vec::new(),
            shape: Shape::Scalar,
            is_external: false,
            is_anonymous: false,
            supertype: None,
            declared_in: None,
            owner: None,
            site: None,
            members: Vec::new(),
            children: IndexMap::new(),
            state: LinkState::Parsed,
            is_duplicate: false,
            span: 0..0,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.shape != Shape::Scalar
    }

    pub fn is_table(&self) -> bool {
        self.shape == Shape::Table
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|parameter| parameter.name == name)
    }
}

/// Definitions planted together and linked as one unit by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unit {
    /// Every planted definition, owners before their members.
    pub definitions: Vec<DefId>,
}

impl Unit {
    pub fn new(definitions: Vec<DefId>) -> Self {
        Self { definitions }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn roots<'a>(&'a self, graph: &'a DefinitionGraph) -> impl Iterator<Item = DefId> + 'a {
        self.definitions.iter().copied().filter(move |id| {
            graph
                .get(*id)
                .declared_in
                .is_none_or(|owner| !self.definitions.contains(&owner))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    definitions: usize,
    journal: usize,
}

#[derive(Debug, Clone)]
enum JournalEntry {
    ChildRegistered { owner: DefId, name: String },
}

#[derive(Debug, Clone)]
pub struct DefinitionGraph {
    parent: Option<Arc<DefinitionGraph>>,
    base: usize,
    definitions: Vec<Definition>,
    /// Children registered into definitions owned by the parent graph.
    overlay: FxHashMap<DefId, IndexMap<String, DefId>>,
    journal: Vec<JournalEntry>,
}

impl Default for DefinitionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionGraph {
    /// Empty graph holding only the core.
    pub fn new() -> Self {
        let mut core = Definition::new(CORE_NAME, DefinitionKind::Core);
        core.full_name = String::new();
        core.state = LinkState::Validated;
        Self {
            parent: None,
            base: 0,
            definitions: vec![core],
            overlay: FxHashMap::default(),
            journal: Vec::new(),
        }
    }

    /// New layer over `parent`.
    pub fn layered(parent: Arc<DefinitionGraph>) -> Self {
        Self {
            base: parent.len(),
            parent: Some(parent),
            definitions: Vec::new(),
            overlay: FxHashMap::default(),
            journal: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.base + self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn core(&self) -> DefId {
        DefId::CORE
    }

    /// Panics on a handle from another graph.
    pub fn get(&self, id: DefId) -> &Definition {
        match (&self.parent, id.index().checked_sub(self.base)) {
            (_, Some(local)) => &self.definitions[local],
            (Some(parent), None) => parent.get(id),
            (None, None) => unreachable!("layer without parent has base 0"),
        }
    }

    /// Mutable access; `None` for definitions owned by the parent graph.
    pub fn get_mut(&mut self, id: DefId) -> Option<&mut Definition> {
        let local = id.index().checked_sub(self.base)?;
        self.definitions.get_mut(local)
    }

    fn push(&mut self, definition: Definition) -> DefId {
        let id = DefId(self.len() as u32);
        self.definitions.push(definition);
        id
    }

    pub fn site(&self, name: &str) -> Option<DefId> {
        self.direct_child(DefId::CORE, name)
            .filter(|id| self.get(*id).kind == DefinitionKind::Site)
    }

    /// Returns the site named `name`, creating it if needed.
    pub fn add_site(&mut self, name: &str) -> DefId {
        if let Some(site) = self.site(name) {
            return site;
        }
        let mut definition = Definition::new(name, DefinitionKind::Site);
        definition.declared_in = Some(DefId::CORE);
        definition.owner = Some(DefId::CORE);
        definition.state = LinkState::Validated;
        let id = self.push(definition);
        if let Some(site) = self.get_mut(id) {
            site.site = Some(id);
        }
        self.register_child(DefId::CORE, name, id);
        tracing::debug!(site = name, "site added");
        id
    }

    /// Registers `child` under `owner` unless the name is taken there.
    /// Returns the definition already holding the name.
    pub(crate) fn register_child(&mut self, owner: DefId, name: &str, child: DefId) -> Option<DefId> {
        if let Some(existing) = self.direct_child(owner, name) {
            return Some(existing);
        }
        match self.get_mut(owner) {
            Some(definition) => {
                definition.children.insert(name.to_string(), child);
            }
            None => {
                self.overlay
                    .entry(owner)
                    .or_default()
                    .insert(name.to_string(), child);
            }
        }
        self.journal.push(JournalEntry::ChildRegistered {
            owner,
            name: name.to_string(),
        });
        None
    }

    /// Child registered directly under `owner`, ignoring supertypes.
    pub fn direct_child(&self, owner: DefId, name: &str) -> Option<DefId> {
        if let Some(child) = self.overlay.get(&owner).and_then(|children| children.get(name)) {
            return Some(*child);
        }
        match (&self.parent, owner.index() < self.base) {
            (Some(parent), true) => parent.direct_child(owner, name),
            _ => self.get(owner).children.get(name).copied(),
        }
    }

    /// Child named `name` of `owner` or, failing that, of its supertypes,
    /// most derived first.
    pub fn child(&self, owner: DefId, name: &str) -> Option<DefId> {
        self.supertype_chain(owner)
            .into_iter()
            .find_map(|scope| self.direct_child(scope, name))
    }

    /// Resolved supertype of `id`, if any.
    pub fn supertype(&self, id: DefId) -> Option<DefId> {
        self.get(id).supertype.as_ref()?.definition()
    }

    /// `id` followed by its supertypes. Stops at the first repeated
    /// definition.
    pub fn supertype_chain(&self, id: DefId) -> Vec<DefId> {
        let mut chain = vec![id];
        let mut seen = FxHashSet::default();
        seen.insert(id);
        let mut current = id;
        while let Some(supertype) = self.supertype(current) {
            if !seen.insert(supertype) {
                break;
            }
            chain.push(supertype);
            current = supertype;
        }
        chain
    }

    /// Whether `base` is `id` or one of its supertypes.
    pub fn extends(&self, id: DefId, base: DefId) -> bool {
        self.supertype_chain(id).contains(&base)
    }

    /// Enclosing scope of `id` for name lookup.
    pub fn scope_of(&self, id: DefId) -> Option<DefId> {
        let definition = self.get(id);
        definition.owner.or(definition.declared_in)
    }

    /// Looks `name` up from `from`: each scope checks its own parameters,
    /// then its children, then continues with its owner.
    pub fn lookup(&self, from: DefId, name: &str) -> Option<Target> {
        let mut scope = Some(from);
        while let Some(id) = scope {
            let definition = self.get(id);
            if let Some(index) = definition.parameter_index(name) {
                return Some(Target::Parameter { owner: id, index });
            }
            if let Some(child) = self.child(id, name) {
                return Some(Target::Definition(child));
            }
            scope = self.scope_of(id);
        }
        None
    }

    /// Binds the part following one bound to `previous`.
    pub fn lookup_member(&self, previous: Option<Target>, name: &str) -> Option<Target> {
        match previous? {
            Target::Definition(id) if self.get(id).kind.is_scope() => {
                self.child(id, name).map(Target::Definition)
            }
            _ => Some(Target::Member),
        }
    }

    /// Resolves every segment of a dotted name from `from`.
    pub fn lookup_path(&self, from: DefId, path: &str) -> Vec<(String, Option<Target>)> {
        let mut targets: Vec<(String, Option<Target>)> = Vec::new();
        for segment in path.split('.') {
            let target = match targets.last() {
                None => self.lookup(from, segment),
                Some((_, previous)) => self.lookup_member(*previous, segment),
            };
            targets.push((segment.to_string(), target));
        }
        targets
    }

    /// Definition a dotted name denotes, if it resolves statically.
    pub fn find(&self, from: DefId, path: &str) -> Option<DefId> {
        match self.lookup_path(from, path).pop()?.1? {
            Target::Definition(id) => Some(id),
            _ => None,
        }
    }

    /// Plants parsed items under `site`. Items declared inside
    /// `site name { ... }` go to that site instead, creating it if needed.
    pub fn plant(&mut self, items: &[ParsedItem], site: DefId) -> Unit {
        let mut unit = Unit::default();
        for item in items {
            match item {
                ParsedItem::Definition(definition) => {
                    self.plant_definition(definition, site, &mut unit);
                }
                ParsedItem::Site { name, definitions } => {
                    let site = self.add_site(&name.node);
                    for definition in definitions {
                        self.plant_definition(definition, site, &mut unit);
                    }
                }
            }
        }
        unit
    }

    /// Plants one anonymous definition scoped to `owner`.
    pub fn plant_anonymous(&mut self, parsed: &ParsedDefinition, owner: DefId) -> Unit {
        let mut unit = Unit::default();
        let id = self.plant_definition(parsed, owner, &mut unit);
        if let Some(definition) = self.get_mut(id) {
            definition.name = ANONYMOUS_NAME.to_string();
            definition.is_anonymous = true;
        }
        unit
    }

    fn plant_definition(&mut self, parsed: &ParsedDefinition, declared_in: DefId, unit: &mut Unit) -> DefId {
        let kind = match (&parsed.body, parsed.is_external, parsed.shape) {
            (_, true, _) => DefinitionKind::External,
            (ParsedBody::Block(_), _, _) => DefinitionKind::Complex,
            (ParsedBody::Expression(body), _, Shape::Scalar) => DefinitionKind::Named {
                body: Construction::from(body),
            },
            (ParsedBody::Expression(body), _, _) => DefinitionKind::Collection {
                body: Construction::from(body),
            },
            (ParsedBody::None, false, _) => DefinitionKind::External,
        };
        let mut definition = Definition::new(parsed.name.node.clone(), kind);
        definition.parameters = parsed
            .parameters
            .iter()
            .flatten()
            .map(|parameter| Parameter {
                name: parameter.node.clone(),
                span: parameter.span.into_range(),
            })
            .collect();
        definition.shape = parsed.shape;
        definition.is_external = parsed.is_external;
        definition.supertype = parsed.supertype.as_ref().and_then(|supertype| {
            Construction::from(supertype)
                .as_reference()
                .cloned()
        });
        definition.declared_in = Some(declared_in);
        definition.span = parsed.span.into_range();

        let id = self.push(definition);
        unit.definitions.push(id);

        if let ParsedBody::Block(members) = &parsed.body {
            let members = members
                .iter()
                .map(|member| self.plant_definition(member, id, unit))
                .collect::<Vec<_>>();
            if let Some(definition) = self.get_mut(id) {
                definition.members = members;
            }
        }
        id
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            definitions: self.len(),
            journal: self.journal.len(),
        }
    }

    /// Drops everything added since `checkpoint`, including children
    /// registered into older definitions.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.journal {
            let Some(JournalEntry::ChildRegistered { owner, name }) = self.journal.pop() else {
                break;
            };
            if owner.index() >= checkpoint.definitions {
                continue;
            }
            match self.get_mut(owner) {
                Some(definition) => {
                    definition.children.shift_remove(&name);
                }
                None => {
                    if let Some(children) = self.overlay.get_mut(&owner) {
                        children.shift_remove(&name);
                    }
                }
            }
        }
        self.definitions
            .truncate(checkpoint.definitions.saturating_sub(self.base));
        tracing::debug!(definitions = self.len(), "graph rolled back");
    }

    /// Forgets the undo journal once a unit is accepted.
    pub fn commit(&mut self) {
        self.journal.clear();
    }
}
