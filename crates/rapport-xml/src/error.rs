//! Error types for XML parsing and tree surgery.

use thiserror::Error;

/// Errors that can occur while parsing XML or manipulating the tree.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying XML was malformed.
    #[error("XML syntax error: {message}")]
    Syntax { message: String },

    /// The document or tree violated a structural expectation
    /// (no root element, multiple roots, detached node, ...).
    #[error("XML structure error: {message}")]
    Structure { message: String },
}

impl Error {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Error::Syntax {
            message: message.into(),
        }
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Error::Structure {
            message: message.into(),
        }
    }
}

/// Result type for XML operations.
pub type Result<T> = std::result::Result<T, Error>;
