//! Build pipeline: initialize → resolve → validate.
//!
//! A unit of planted definitions is linked into the graph by three ordered
//! passes. Each pass checks that the previous one has run on every
//! definition of the unit and refuses to touch the graph otherwise. If
//! validation finds any problem, [`BuildPipeline::build`] rolls the graph
//! back so nothing of the failed unit stays reachable.

mod initialize;
mod problems;
mod resolve;
mod validate;

pub use initialize::initialize;
pub use problems::{Problem, ProblemReport};
pub use resolve::resolve;
pub(crate) use resolve::resolve_construction;
pub use validate::validate;

use crate::definition::{DefId, DefinitionGraph, LinkState, Unit};
use crate::error::BuildError;
use crate::parser::{ParsedItem, parse_source};

pub struct BuildPipeline<'graph> {
    graph: &'graph mut DefinitionGraph,
}

impl<'graph> BuildPipeline<'graph> {
    pub fn new(graph: &'graph mut DefinitionGraph) -> Self {
        Self { graph }
    }

    /// Plants `items` under `site` and links them.
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    pub fn build(&mut self, items: &[ParsedItem], site: DefId) -> Result<Unit, BuildError> {
        let checkpoint = self.graph.checkpoint();
        let unit = self.graph.plant(items, site);
        match self.link(&unit) {
            Ok(()) => {
                self.graph.commit();
                tracing::debug!(definitions = unit.definitions.len(), "unit linked");
                Ok(unit)
            }
            Err(error) => {
                self.graph.rollback(checkpoint);
                tracing::debug!(%error, "unit rejected");
                Err(error)
            }
        }
    }

    /// Parses `source_code` and builds it under `site`.
    pub fn build_source(&mut self, source_code: &str, site: DefId) -> Result<Unit, BuildError> {
        let items = parse_source(source_code).map_err(BuildError::Parse)?;
        self.build(&items, site)
    }

    /// Runs the three passes over an already planted unit. The graph is left
    /// as the passes leave it; rolling back is up to the caller.
    pub fn link(&mut self, unit: &Unit) -> Result<(), BuildError> {
        initialize(self.graph, unit);
        resolve(self.graph, unit)?;
        let report = validate(self.graph, unit)?;
        if report.is_empty() {
            Ok(())
        } else {
            Err(BuildError::Problems(report))
        }
    }
}

/// Fails unless every definition of `unit` reached `required`.
fn require(
    graph: &DefinitionGraph,
    unit: &Unit,
    pass: &'static str,
    required: LinkState,
) -> Result<(), BuildError> {
    for id in &unit.definitions {
        let definition = graph.get(*id);
        if definition.state < required {
            return Err(BuildError::OutOfOrder {
                pass,
                definition: definition.full_name.clone(),
                required,
                actual: definition.state,
            });
        }
    }
    Ok(())
}
