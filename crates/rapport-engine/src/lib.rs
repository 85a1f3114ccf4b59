//! Template engine for word-processing documents.
//!
//! This crate interprets commands embedded in the visible text of a
//! word-processing template tree and produces a new tree with the commands
//! replaced by data-driven content. It supports:
//!
//! - Interpolation: `+++=customer.name+++` or bare `+++customer.name+++`
//! - Loops: `+++FOR item IN items+++` ... `+++END-FOR item+++`
//! - Conditionals: `+++IF n >= 3+++` ... `+++END-IF+++`
//! - Aliases: `+++ALIAS cn =customer.name+++` then `+++*cn+++`
//! - Artifacts: `+++IMAGE expr+++`, `+++LINK expr+++`, `+++HTML expr+++`
//! - Host functions with `len` and `join` built in
//!
//! # Architecture
//!
//! The engine is independent of container I/O and serialization: it takes an
//! already-parsed [`rapport_xml::Tree`] and emits a tree plus sidecar tables
//! of generated images, links and HTML chunks. A wrapping crate persists
//! those into the container. Processing happens in two passes:
//!
//! 1. [`preprocess_template`] rewrites the tree so each command sits whole
//!    inside one text node, however the editor fragmented it.
//! 2. [`produce_report`] walks the tree with a dual input/output cursor,
//!    dispatching commands and mirroring surviving nodes.
//!
//! # Example
//!
//! ```ignore
//! use rapport_engine::{
//!     preprocess_template, produce_report, Context, CreateReportOptions, ReportData,
//! };
//!
//! let mut template = rapport_xml::parse(template_xml)?;
//! let options = CreateReportOptions::default();
//! preprocess_template(&mut template, &options.cmd_delimiter)?;
//!
//! let mut data = ReportData::new();
//! data.insert("name", "World");
//!
//! let ctx = Context::new(options, 73_086_257);
//! let output = produce_report(&data, &mut template, ctx)?;
//! ```

pub mod context;
pub mod error;
pub mod options;
pub mod preprocess;
pub mod value;
pub mod walker;

mod artifacts;
mod commands;
mod eval;
mod functions;
mod loops;
mod tags;

// Re-export main types at crate root
pub use context::Context;
pub use error::{ReportError, Result};
pub use options::{
    CreateReportOptions, Delimiters, ErrorHandler, Function, Functions, DEFAULT_CMD_DELIMITER,
    DEFAULT_LITERAL_XML_DELIMITER,
};
pub use preprocess::preprocess_template;
pub use value::{
    Htmls, Image, ImagePars, Images, Link, LinkPars, Links, ReportData, Value, IMAGE_EXTENSIONS,
};
pub use walker::{produce_report, ReportOutput};

/// Id seed used by the wrapping tool when the caller does not supply one;
/// high enough to clear the ids already present in real-world templates.
pub const DEFAULT_ID_SEED: u64 = 73_086_257;
