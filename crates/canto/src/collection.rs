//! Runtime collection objects.
//!
//! [`CantoArray`] and [`CantoTable`] are handles over store trait objects.
//! Whether a collection can grow, shrink or be written at all is decided by
//! its store, never by the handle: in-memory stores built from literals are
//! writable, result-set adapters reject every mutation.

mod array;
mod table;

pub use array::{ArrayStore, CantoArray, ListStore};
pub use table::{CantoTable, MapStore, TableStore};

use crate::redirect::Redirection;
use crate::tabular::CursorError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("{what} is immutable")]
    Immutable { what: &'static str },
    #[error("{what} has a fixed size")]
    FixedSize { what: &'static str },
    #[error("index {index} out of bounds (size {size})")]
    OutOfBounds { index: usize, size: usize },
    #[error("row {row} is no longer under the cursor")]
    StaleRow { row: usize },
    #[error("the cursor was already consumed by a streaming pass")]
    Consumed,
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl From<CollectionError> for Redirection {
    fn from(error: CollectionError) -> Self {
        Redirection::standard(error.to_string())
    }
}
