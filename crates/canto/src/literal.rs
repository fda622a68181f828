//! Run-time parsing of collection literals.
//!
//! A fragment such as `[1, 2, x]` or `{a = 1}` is wrapped into a one-line
//! collection definition, planted as an anonymous child of the definition
//! currently being constructed, linked by the usual three passes and
//! evaluated. The new definition lives in a layered graph over the
//! context's graph, so the shared graph is never touched.

use crate::collection::{CantoArray, CantoTable};
use crate::context::Context;
use crate::definition::DefinitionGraph;
use crate::error::BuildError;
use crate::parser::{ParsedItem, parse_source};
use crate::pipeline::BuildPipeline;
use crate::redirect::Redirection;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralKind {
    Array,
    Table,
}

impl LiteralKind {
    fn name(self) -> &'static str {
        match self {
            LiteralKind::Array => "array",
            LiteralKind::Table => "table",
        }
    }

    fn marker(self) -> &'static str {
        match self {
            LiteralKind::Array => "[]",
            LiteralKind::Table => "{}",
        }
    }
}

/// Parses and evaluates an array literal in the scope of `context`.
pub fn parse_array(context: &Context, text: &str) -> Result<CantoArray, Redirection> {
    match parse_literal(context, text, LiteralKind::Array)? {
        Value::Array(array) => Ok(array),
        other => Err(problems_parsing(LiteralKind::Array, other.type_name())),
    }
}

/// Parses and evaluates a table literal in the scope of `context`.
pub fn parse_table(context: &Context, text: &str) -> Result<CantoTable, Redirection> {
    match parse_literal(context, text, LiteralKind::Table)? {
        Value::Table(table) => Ok(table),
        other => Err(problems_parsing(LiteralKind::Table, other.type_name())),
    }
}

#[tracing::instrument(skip(context, kind), fields(kind = kind.name()))]
fn parse_literal(context: &Context, text: &str, kind: LiteralKind) -> Result<Value, Redirection> {
    let source_code = format!("literal{} = {}", kind.marker(), text.trim());
    let items = parse_source(&source_code).map_err(|report| problems_parsing(kind, report))?;
    let parsed = match items.as_slice() {
        [ParsedItem::Definition(parsed)] => parsed,
        _ => {
            return Err(problems_parsing(
                kind,
                format!("expected a single {} literal", kind.name()),
            ));
        }
    };

    let mut graph = DefinitionGraph::layered(context.graph().clone());
    let unit = graph.plant_anonymous(parsed, context.peek());
    BuildPipeline::new(&mut graph)
        .link(&unit)
        .map_err(|error| problems_parsing(kind, linking_message(error)))?;
    let Some(&literal) = unit.definitions.first() else {
        return Err(problems_parsing(kind, "empty literal"));
    };
    tracing::trace!(definition = %graph.get(literal).full_name, "literal linked");

    let mut fork = context.with_graph(Arc::new(graph));
    fork.evaluate_definition(literal, &[])
}

fn linking_message(error: BuildError) -> String {
    match error {
        BuildError::Problems(report) | BuildError::Parse(report) => report.to_string(),
        other => other.to_string(),
    }
}

fn problems_parsing(kind: LiteralKind, message: impl fmt::Display) -> Redirection {
    Redirection::standard(format!("Problems parsing {}: {message}", kind.name()))
}
