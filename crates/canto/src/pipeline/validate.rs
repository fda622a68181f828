use super::{Problem, ProblemReport, require};
use crate::definition::{
    Construction, DefId, Definition, DefinitionGraph, DefinitionKind, Instantiation, LinkState,
    Target, Unit,
};
use crate::error::BuildError;
use crate::parser::Shape;
use rustc_hash::FxHashSet;

/// Collects every semantic problem of the unit. Never stops at the first
/// one. Definitions are marked validated only when the whole unit is clean.
#[tracing::instrument(skip_all, fields(definitions = unit.definitions.len()))]
pub fn validate(graph: &mut DefinitionGraph, unit: &Unit) -> Result<ProblemReport, BuildError> {
    require(graph, unit, "validate", LinkState::Resolved)?;

    let mut report = ProblemReport::new();
    for &id in &unit.definitions {
        if graph.get(id).state < LinkState::Validated {
            validate_definition(graph, id, &mut report);
        }
    }

    if report.is_empty() {
        for &id in &unit.definitions {
            if let Some(definition) = graph.get_mut(id) {
                definition.state = LinkState::Validated;
            }
        }
    }
    tracing::debug!(problems = report.len(), "validate pass finished");
    Ok(report)
}

fn validate_definition(graph: &DefinitionGraph, id: DefId, report: &mut ProblemReport) {
    let definition = graph.get(id);

    if definition.is_duplicate {
        report.push(problem(
            definition,
            format!("duplicate definition '{}'", definition.name),
            definition.span.clone(),
        ));
    }

    let mut parameter_names = FxHashSet::default();
    for parameter in &definition.parameters {
        if !parameter_names.insert(parameter.name.as_str()) {
            report.push(problem(
                definition,
                format!("duplicate parameter '{}'", parameter.name),
                parameter.span.clone(),
            ));
        }
    }

    if let Some(supertype) = &definition.supertype {
        validate_supertype(graph, id, supertype, report);
    }

    if let Some(body) = definition.kind.body() {
        body.for_each_instantiation(&mut |instantiation| {
            validate_instantiation(graph, definition, instantiation, report);
        });
        if let DefinitionKind::Collection { body } = &definition.kind {
            validate_shape(graph, definition, body, report);
        }
    }
}

fn validate_supertype(
    graph: &DefinitionGraph,
    id: DefId,
    supertype: &Instantiation,
    report: &mut ProblemReport,
) {
    let definition = graph.get(id);
    let span = supertype.span.clone();
    match supertype.target() {
        None => {
            report.push(problem(
                definition,
                format!("undefined supertype '{supertype}'"),
                span,
            ));
            return;
        }
        Some(Target::Definition(base)) => {
            let base_definition = graph.get(base);
            if base_definition.kind != DefinitionKind::Complex {
                report.push(problem(
                    definition,
                    format!(
                        "'{supertype}' is a {} and cannot be a supertype",
                        base_definition.kind.describe()
                    ),
                    span.clone(),
                ));
            } else if is_circular(graph, id) {
                report.push(problem(
                    definition,
                    format!("circular supertype chain through '{supertype}'"),
                    span.clone(),
                ));
            }
            if let Some(last) = supertype.parts.last() {
                validate_arguments(definition, base_definition, last.argument_count(), span, report);
            }
        }
        Some(_) => {
            report.push(problem(
                definition,
                format!("supertype '{supertype}' is not a definition"),
                span,
            ));
        }
    }

    for part in &supertype.parts {
        for construction in part.arguments.iter().flatten().chain(&part.indexes) {
            construction.for_each_instantiation(&mut |instantiation| {
                validate_instantiation(graph, definition, instantiation, report);
            });
        }
    }
}

fn is_circular(graph: &DefinitionGraph, id: DefId) -> bool {
    let mut seen = FxHashSet::default();
    let mut current = id;
    while let Some(supertype) = graph.supertype(current) {
        if supertype == id {
            return true;
        }
        if !seen.insert(supertype) {
            return false;
        }
        current = supertype;
    }
    false
}

fn validate_instantiation(
    graph: &DefinitionGraph,
    definition: &Definition,
    instantiation: &Instantiation,
    report: &mut ProblemReport,
) {
    let mut path = String::new();
    for part in &instantiation.parts {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&part.name);
        let span = part.span.clone();

        match part.target {
            None => {
                report.push(problem(definition, format!("undefined name '{path}'"), span));
                return;
            }
            Some(Target::Definition(target)) => {
                let target_definition = graph.get(target);
                validate_arguments(definition, target_definition, part.argument_count(), span.clone(), report);
                if !part.indexes.is_empty() && target_definition.kind.is_scope() {
                    report.push(problem(
                        definition,
                        format!(
                            "'{path}' is a {} and cannot be indexed",
                            target_definition.kind.describe()
                        ),
                        span,
                    ));
                }
            }
            Some(Target::Parameter { .. }) => {
                if part.arguments.is_some() {
                    report.push(problem(
                        definition,
                        format!("parameter '{path}' takes no arguments"),
                        span,
                    ));
                }
            }
            Some(Target::Member) => {}
        }
    }
}

fn validate_arguments(
    definition: &Definition,
    target: &Definition,
    count: usize,
    span: std::ops::Range<usize>,
    report: &mut ProblemReport,
) {
    let expected = target.parameters.len();
    if count > expected {
        report.push(problem(
            definition,
            format!(
                "too many arguments for '{}': expected {expected}, got {count}",
                target.name
            ),
            span,
        ));
    }
}

fn validate_shape(
    graph: &DefinitionGraph,
    definition: &Definition,
    body: &Construction,
    report: &mut ProblemReport,
) {
    let bound = match body {
        Construction::Array(_) => Some(Shape::Array),
        Construction::Table(_) => Some(Shape::Table),
        Construction::Literal(_) => Some(Shape::Scalar),
        Construction::Reference(instantiation) => instantiation
            .definition()
            .map(|target| graph.get(target))
            .filter(|target| target.is_collection())
            .map(|target| target.shape),
    };
    if let Some(bound) = bound
        && bound != definition.shape
    {
        report.push(problem(
            definition,
            format!(
                "'{}' is declared as {} but bound to {}",
                definition.name,
                describe_shape(definition.shape),
                describe_shape(bound)
            ),
            definition.span.clone(),
        ));
    }
}

fn describe_shape(shape: Shape) -> &'static str {
    match shape {
        Shape::Scalar => "a scalar",
        Shape::Array => "an array",
        Shape::Table => "a table",
    }
}

fn problem(definition: &Definition, message: String, span: std::ops::Range<usize>) -> Problem {
    Problem::new(message)
        .with_span(span)
        .in_definition(definition.full_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::pipeline::{initialize, resolve};

    fn validated(source: &str) -> (DefinitionGraph, Unit, Result<ProblemReport, BuildError>) {
        let mut graph = DefinitionGraph::new();
        let site = graph.add_site("main");
        let unit = graph.plant(&parse_source(source).unwrap(), site);
        initialize(&mut graph, &unit);
        resolve(&mut graph, &unit).unwrap();
        let report = validate(&mut graph, &unit);
        (graph, unit, report)
    }

    fn messages(report: &ProblemReport) -> Vec<String> {
        report.problems().iter().map(|problem| problem.message.clone()).collect()
    }

    #[test]
    fn test_validate_before_resolve_is_rejected() {
        let mut graph = DefinitionGraph::new();
        let site = graph.add_site("main");
        let unit = graph.plant(&parse_source("a = 1").unwrap(), site);
        initialize(&mut graph, &unit);
        let error = validate(&mut graph, &unit).unwrap_err();
        assert!(matches!(error, BuildError::OutOfOrder { pass: "validate", .. }));
    }

    #[test]
    fn test_problems_are_collected() {
        let (_, _, report) = validated(
            "f(a, a) = a
             g = f(1, 2, 3)
             h = missing.deep
             page { }
             i = page[0]",
        );
        let report = report.unwrap();
        assert_eq!(
            messages(&report),
            vec![
                "duplicate parameter 'a'",
                "too many arguments for 'f': expected 2, got 3",
                "undefined name 'missing'",
                "'page' is a complex definition and cannot be indexed",
            ]
        );
    }

    #[test]
    fn test_supertype_problems() {
        let (_, _, report) = validated("a : nowhere { } b : c { } c : b { } n = 1 d : n { }");
        let report = report.unwrap();
        assert_eq!(
            messages(&report),
            vec![
                "undefined supertype 'nowhere'",
                "circular supertype chain through 'c'",
                "circular supertype chain through 'b'",
                "'n' is a named definition and cannot be a supertype",
            ]
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let (_, _, report) = validated("t{} = [1, 2] s[] = 3");
        let report = report.unwrap();
        assert_eq!(
            messages(&report),
            vec![
                "'t' is declared as a table but bound to an array",
                "'s' is declared as an array but bound to a scalar",
            ]
        );
    }

    #[test]
    fn test_clean_unit_is_marked_validated() {
        let (graph, unit, report) = validated("a = 1 b[] = [a, 2]");
        assert!(report.unwrap().is_empty());
        for id in &unit.definitions {
            assert_eq!(graph.get(*id).state, LinkState::Validated);
        }
    }
}
