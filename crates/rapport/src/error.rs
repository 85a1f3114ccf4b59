//! Error type for report assembly.

use thiserror::Error;

/// Errors surfacing from container parsing or report generation.
#[derive(Debug, Error)]
pub enum Error {
    /// A required container part is missing.
    #[error("missing part: {path}")]
    MissingPart { path: String },

    /// The container's content-type index does not declare a main document.
    #[error("could not find main document (e.g. document.xml) in {path}")]
    MainDocumentNotFound { path: String },

    /// An XML part failed to parse or serialize.
    #[error(transparent)]
    Xml(#[from] rapport_xml::Error),

    /// The engine failed while producing the report.
    #[error(transparent)]
    Report(#[from] rapport_engine::ReportError),
}

/// Result type for report assembly.
pub type Result<T> = std::result::Result<T, Error>;
