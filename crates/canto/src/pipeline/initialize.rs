use crate::definition::{ANONYMOUS_NAME, DefId, DefinitionGraph, DefinitionKind, LinkState, Unit};

/// Links each definition to its owner and site, assigns its full name and
/// registers it as a child of its owner. Definitions that are already
/// initialized are left alone, so running the pass twice is harmless.
#[tracing::instrument(skip_all, fields(definitions = unit.definitions.len()))]
pub fn initialize(graph: &mut DefinitionGraph, unit: &Unit) {
    let mut linked = 0usize;
    for &id in &unit.definitions {
        let definition = graph.get(id);
        if definition.state >= LinkState::Initialized {
            continue;
        }
        let name = definition.name.clone();
        let is_anonymous = definition.is_anonymous;
        let owner = definition.declared_in.unwrap_or(DefId::CORE);

        let owner_definition = graph.get(owner);
        let site = match owner_definition.kind {
            DefinitionKind::Site => Some(owner),
            _ => owner_definition.site,
        };
        let local_name = if is_anonymous {
            format!("{ANONYMOUS_NAME}#{}", id.index())
        } else {
            name.clone()
        };
        let full_name = match owner_definition.full_name.as_str() {
            "" => local_name,
            owner_name => format!("{owner_name}.{local_name}"),
        };

        let is_duplicate = !is_anonymous && graph.register_child(owner, &name, id).is_some();
        if let Some(definition) = graph.get_mut(id) {
            definition.owner = Some(owner);
            definition.site = site;
            definition.full_name = full_name;
            definition.is_duplicate = is_duplicate;
            definition.state = LinkState::Initialized;
            linked += 1;
        }
    }
    tracing::debug!(linked, "initialize pass finished");
}
