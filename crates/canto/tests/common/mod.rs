#![allow(dead_code)]

use canto::{BuildPipeline, Context, DefId, DefinitionGraph};
use std::sync::Arc;

/// Builds `source_code` into a fresh graph under the site `main`.
pub fn build(source_code: &str) -> (Arc<DefinitionGraph>, DefId) {
    let mut graph = DefinitionGraph::new();
    let site = graph.add_site("main");
    if let Err(error) = BuildPipeline::new(&mut graph).build_source(source_code, site) {
        panic!("test source failed to build:\n{error}");
    }
    (Arc::new(graph), site)
}

/// Context rooted at `main` over `source_code`.
pub fn context(source_code: &str) -> Context {
    let (graph, site) = build(source_code);
    Context::new(graph, site)
}
