//! Report generation for word-processing containers.
//!
//! This crate wires the [`rapport-engine`](rapport_engine) template engine
//! to a document container: it locates the main document (and any headers
//! and footers) through `[Content_Types].xml`, runs the engine over each
//! part, writes the results back, and persists the engine's sidecar tables
//! as media parts, relationship entries and content-type defaults.
//!
//! Container I/O itself stays behind the [`Container`] trait: callers
//! doing real zip archives implement it over their archive library, and
//! [`MemoryContainer`] covers tests and in-memory pipelines.
//!
//! # Example
//!
//! ```ignore
//! use rapport::{create_report, Container, MemoryContainer};
//! use rapport_engine::{CreateReportOptions, ReportData};
//!
//! let mut container = load_template_parts()?; // impl Container
//! let mut data = ReportData::new();
//! data.insert("name", "World");
//!
//! create_report(&mut container, &data, CreateReportOptions::default())?;
//! // container now holds the generated parts; persist it as you wish.
//! ```

pub mod container;
pub mod error;
pub mod template;

mod sidecars;

pub use container::{Container, MemoryContainer};
pub use error::{Error, Result};
pub use template::{parse_template, ParseTemplateResult, CONTENT_TYPES_PATH};

// The engine surface callers need alongside this crate.
pub use rapport_engine::{
    CreateReportOptions, Delimiters, ImagePars, LinkPars, ReportData, Value, DEFAULT_ID_SEED,
};

use rapport_engine::{preprocess_template, produce_report, Context, ReportError};
use rapport_xml::{build_xml, Tree, XmlOptions};
use tracing::debug;

use crate::sidecars::{ensure_content_type, process_htmls, process_images, process_links};
use crate::template::TEMPLATE_PATH;

/// Generate a report into the container: process the main document and all
/// headers/footers against `data`, then persist the generated sidecars.
///
/// In non-fail-fast mode the engine's collected errors are returned as one
/// aggregate after all parts have been processed best-effort.
pub fn create_report(
    container: &mut impl Container,
    data: &ReportData,
    options: CreateReportOptions,
) -> Result<()> {
    let xml_options = XmlOptions {
        literal_xml_delimiter: options.literal_xml_delimiter.clone(),
    };

    let parsed = parse_template(container)?;
    let mut collected: Vec<ReportError> = Vec::new();

    let mut num_images = 0;
    let mut num_htmls = 0;

    // Main document first, then each header/footer with a fresh context.
    let mut parts: Vec<(String, String, Tree)> = Vec::with_capacity(parsed.extras.len() + 1);
    parts.push((
        format!("{TEMPLATE_PATH}/{}", parsed.main_document),
        parsed.main_document.clone(),
        parsed.root,
    ));
    for (path, tree) in parsed.extras {
        let component = path
            .strip_prefix(&format!("{TEMPLATE_PATH}/"))
            .unwrap_or(&path)
            .to_string();
        parts.push((path, component, tree));
    }

    for (path, component, mut tree) in parts {
        debug!(part = %path, "generating report part");
        preprocess_template(&mut tree, &options.cmd_delimiter)?;
        let ctx = Context::new(options.clone(), DEFAULT_ID_SEED);
        let output = produce_report(data, &mut tree, ctx)?;
        collected.extend(output.errors);

        container.set_file(&path, build_xml(&output.report, &xml_options));

        num_images += output.images.len();
        num_htmls += output.htmls.len();
        process_images(&output.images, &component, container, &xml_options)?;
        process_links(&output.links, &component, container, &xml_options)?;
        process_htmls(&output.htmls, &component, container, &xml_options)?;
    }

    if num_images > 0 || num_htmls > 0 {
        debug!("completing content types");
        let mut content_types = parsed.content_types;
        if num_images > 0 {
            ensure_content_type(&mut content_types, "png", "image/png");
            ensure_content_type(&mut content_types, "jpg", "image/jpeg");
            ensure_content_type(&mut content_types, "jpeg", "image/jpeg");
            ensure_content_type(&mut content_types, "gif", "image/gif");
            ensure_content_type(&mut content_types, "bmp", "image/bmp");
            ensure_content_type(&mut content_types, "svg", "image/svg+xml");
        }
        if num_htmls > 0 {
            ensure_content_type(&mut content_types, "html", "text/html");
        }
        container.set_file(CONTENT_TYPES_PATH, build_xml(&content_types, &xml_options));
    }

    match collected.len() {
        0 => Ok(()),
        1 => Err(collected.remove(0).into()),
        _ => Err(ReportError::Multiple(collected).into()),
    }
}
