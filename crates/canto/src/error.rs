use crate::definition::LinkState;
use crate::pipeline::ProblemReport;
use thiserror::Error;

/// Failure of the build pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("{pass} pass needs '{definition}' to be {required:?}, but it is {actual:?}")]
    OutOfOrder {
        pass: &'static str,
        definition: String,
        required: LinkState,
        actual: LinkState,
    },
    #[error("{0}")]
    Problems(ProblemReport),
    #[error("{0}")]
    Parse(ProblemReport),
}

impl BuildError {
    /// Problems carried by this error, if it aggregates any.
    pub fn report(&self) -> Option<&ProblemReport> {
        match self {
            BuildError::Problems(report) | BuildError::Parse(report) => Some(report),
            BuildError::OutOfOrder { .. } => None,
        }
    }
}

/// Failure of a typed accessor on an object wrapper.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObjectError {
    /// `text` is the rendered value, `None` when the child could not be
    /// constructed at all.
    #[error("'{name}' is not an integer")]
    NumberFormat { name: String, text: Option<String> },
}
