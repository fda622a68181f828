use super::require;
use crate::definition::{Construction, DefId, DefinitionGraph, Instantiation, LinkState, Unit};
use crate::error::BuildError;

/// Binds every name reference of the unit to its target. Supertypes are
/// bound before bodies so that member lookups can follow override chains.
///
/// Rejects the whole unit, without touching it, if any definition has not
/// been initialized.
#[tracing::instrument(skip_all, fields(definitions = unit.definitions.len()))]
pub fn resolve(graph: &mut DefinitionGraph, unit: &Unit) -> Result<(), BuildError> {
    require(graph, unit, "resolve", LinkState::Initialized)?;

    let pending = unit
        .definitions
        .iter()
        .copied()
        .filter(|id| graph.get(*id).state < LinkState::Resolved)
        .collect::<Vec<_>>();

    for &id in &pending {
        let Some(mut supertype) = graph.get(id).supertype.clone() else {
            continue;
        };
        // The supertype name is looked up around the definition, its
        // arguments inside it.
        let scope = graph.scope_of(id).unwrap_or(DefId::CORE);
        resolve_instantiation(graph, &mut supertype, scope, id);
        if let Some(definition) = graph.get_mut(id) {
            definition.supertype = Some(supertype);
        }
    }

    for &id in &pending {
        if let Some(mut body) = graph.get(id).kind.body().cloned() {
            resolve_construction(graph, &mut body, id);
            if let Some(slot) = graph.get_mut(id).and_then(|definition| definition.kind.body_mut()) {
                *slot = body;
            }
        }
        if let Some(definition) = graph.get_mut(id) {
            definition.state = LinkState::Resolved;
        }
    }
    tracing::debug!(resolved = pending.len(), "resolve pass finished");
    Ok(())
}

pub(crate) fn resolve_construction(graph: &DefinitionGraph, construction: &mut Construction, scope: DefId) {
    match construction {
        Construction::Literal(_) => {}
        Construction::Reference(instantiation) => {
            resolve_instantiation(graph, instantiation, scope, scope);
        }
        Construction::Array(items) => {
            for item in items {
                resolve_construction(graph, item, scope);
            }
        }
        Construction::Table(entries) => {
            for (_, value) in entries {
                resolve_construction(graph, value, scope);
            }
        }
    }
}

fn resolve_instantiation(
    graph: &DefinitionGraph,
    instantiation: &mut Instantiation,
    name_scope: DefId,
    argument_scope: DefId,
) {
    let mut previous = None;
    for (index, part) in instantiation.parts.iter_mut().enumerate() {
        part.target = if index == 0 {
            graph.lookup(name_scope, &part.name)
        } else {
            graph.lookup_member(previous, &part.name)
        };
        previous = part.target;
        for argument in part.arguments.iter_mut().flatten() {
            resolve_construction(graph, argument, argument_scope);
        }
        for subscript in &mut part.indexes {
            resolve_construction(graph, subscript, argument_scope);
        }
    }
}
