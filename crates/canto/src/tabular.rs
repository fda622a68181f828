//! External tabular data.
//!
//! Result sets come in as forward-only [`Cursor`]s and are exposed through
//! the same collection handles the language uses: a [`RowSequence`] is an
//! [`ArrayStore`](crate::collection::ArrayStore), each [`Row`] a
//! [`TableStore`](crate::collection::TableStore). Both are read-only.

mod cursor;
mod row;
mod sequence;

pub use cursor::{Cursor, CursorError, SharedCursor, VecCursor};
pub use row::Row;
pub use sequence::{RowSequence, RowStream};

use crate::redirect::Redirection;
use crate::value::Value;

/// Host-side provider for external definitions.
pub trait ExternalSource: Send + Sync {
    /// Value of the external definition `full_name`, or `None` if this
    /// source does not provide it.
    fn fetch(&self, full_name: &str, arguments: &[Value]) -> Option<Result<Value, Redirection>>;
}

impl<F> ExternalSource for F
where
    F: Fn(&str, &[Value]) -> Option<Result<Value, Redirection>> + Send + Sync,
{
    fn fetch(&self, full_name: &str, arguments: &[Value]) -> Option<Result<Value, Redirection>> {
        self(full_name, arguments)
    }
}
