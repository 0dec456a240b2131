//! Error types for pageable collections.

use pagewise_core::Veto;

use crate::query::CompareOp;

/// Error produced by a backing query service or store.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for backing service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while working with a pageable collection.
///
/// Three classes matter to callers:
///
/// - [`Error::Vetoed`] is an expected abort requested by a listener. The
///   state of the collection is exactly what it was before the call.
/// - [`Error::Service`] is a failure of the backing store. It is never
///   retried here and is passed on unchanged.
/// - Everything else reports a programming error in the calling code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A listener refused the change.
    #[error(transparent)]
    Vetoed(#[from] Veto),

    /// The backing service or store failed.
    #[error("Backing service failed: {0}")]
    Service(#[source] ServiceError),

    /// An argument violated the operation's contract.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A selection of the wrong kind was passed to a kind-specific operation.
    #[error("Expected {expected} selection, found {found} selection")]
    SelectionMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A page index outside `0..num_of_pages` was requested.
    #[error("Page index {requested} is out of range ({num_of_pages} pages)")]
    PageOutOfRange {
        requested: usize,
        num_of_pages: usize,
    },

    /// The collection does not support the requested operation.
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// A filter references an attribute or operator the query options do not allow.
    #[error("Attribute '{attribute}' cannot be filtered with {op:?}")]
    NotFilterable { attribute: String, op: CompareOp },

    /// A sort order references an attribute the query options do not allow.
    #[error("Attribute '{attribute}' is not sortable")]
    NotSortable { attribute: String },

    /// Invalid configuration input.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a backing service failure.
    pub fn service(err: impl Into<ServiceError>) -> Self {
        Self::Service(err.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns `true` if a listener vetoed the operation.
    ///
    /// UI layers use this to tell "action blocked" apart from "error occurred".
    pub fn is_veto(&self) -> bool {
        matches!(self, Self::Vetoed(_))
    }

    /// Returns `true` if the backing store failed.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veto_is_distinguishable() {
        let err: Error = Veto::new("pending edits").into();
        assert!(err.is_veto());
        assert!(!err.is_service_failure());
        assert_eq!(err.to_string(), "Change vetoed: pending edits");
    }

    #[test]
    fn test_service_error_keeps_source() {
        let err = Error::service("connection reset");
        assert!(err.is_service_failure());
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_page_out_of_range_message() {
        let err = Error::PageOutOfRange {
            requested: 7,
            num_of_pages: 3,
        };
        assert_eq!(err.to_string(), "Page index 7 is out of range (3 pages)");
    }
}
