//! Canto execution core.
//!
//! Source units are parsed, planted into a [`DefinitionGraph`] and linked by
//! the [`BuildPipeline`]. A [`Context`] then constructs values from the
//! linked graph, caching per frame and signalling control transfer with
//! [`Redirection`].

pub mod collection;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod holder;
pub mod literal;
pub mod parser;
pub mod pipeline;
pub mod redirect;
pub mod tabular;
pub mod value;
pub mod wrapper;

pub use collection::{CantoArray, CantoTable, CollectionError};
pub use config::Options;
pub use context::Context;
pub use definition::{DefId, DefinitionGraph, DefinitionKind, LinkState, Unit};
pub use error::{BuildError, ObjectError};
pub use holder::{Binding, Holder};
pub use literal::{parse_array, parse_table};
pub use pipeline::{BuildPipeline, Problem, ProblemReport};
pub use redirect::{RedirectKind, Redirection};
pub use tabular::{Cursor, ExternalSource, Row, RowSequence, VecCursor};
pub use value::Value;
pub use wrapper::ObjectWrapper;
