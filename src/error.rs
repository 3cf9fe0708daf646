//! Error types for the hdbscan crate.

use thiserror::Error;

/// A convenient alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, HdbscanError>;

/// An error surfaced by the clustering pipeline.
///
/// Ties, empty clusters, and an entirely-noise outcome are normal results
/// reported through the label vector, never through this enum.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HdbscanError {
    /// The caller supplied parameters or data the pipeline cannot run on.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A cluster was asked to detach more points than it owned. This means
    /// the spanning tree and the label arrays disagree and the run cannot
    /// continue.
    #[error("cluster {label} lost more points than it owned")]
    LogicError { label: usize },
}

impl HdbscanError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        HdbscanError::InvalidInput {
            reason: reason.into(),
        }
    }
}
