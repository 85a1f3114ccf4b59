//! Template discovery inside a container.

use rapport_xml::Tree;
use tracing::debug;

use crate::container::Container;
use crate::error::{Error, Result};

/// Directory holding the word-processing parts.
pub(crate) const TEMPLATE_PATH: &str = "word";

/// The container's content-type index part.
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

const MAIN_DOC_MIMES: [&str; 2] = [
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
    "application/vnd.ms-word.document.macroEnabled.main+xml",
];

/// The parsed parts a report run needs.
pub struct ParseTemplateResult {
    /// Parsed main document tree.
    pub root: Tree,
    /// Main document file name relative to `word/` (e.g. `document.xml`).
    pub main_document: String,
    /// Parsed `[Content_Types].xml`.
    pub content_types: Tree,
    /// Headers and footers: part path and parsed tree.
    pub extras: Vec<(String, Tree)>,
}

/// Locate and parse the main document plus any headers and footers.
pub fn parse_template(container: &impl Container) -> Result<ParseTemplateResult> {
    let content_types = parse_part(container, CONTENT_TYPES_PATH)?;
    let main_document = main_doc_name(&content_types)?;

    let main_path = format!("{TEMPLATE_PATH}/{main_document}");
    let root = parse_part(container, &main_path)?;

    let mut extras = Vec::new();
    for kind in ["header", "footer"] {
        for i in 1..1000 {
            let path = format!("{TEMPLATE_PATH}/{kind}{i}.xml");
            let Some(bytes) = container.get_file(&path) else {
                break;
            };
            debug!(path = %path, "parsing extra template part");
            let tree = rapport_xml::parse(&String::from_utf8_lossy(&bytes))?;
            extras.push((path, tree));
        }
    }

    Ok(ParseTemplateResult {
        root,
        main_document,
        content_types,
        extras,
    })
}

pub(crate) fn parse_part(container: &impl Container, path: &str) -> Result<Tree> {
    let bytes = container.get_file(path).ok_or_else(|| Error::MissingPart {
        path: path.to_string(),
    })?;
    Ok(rapport_xml::parse(&String::from_utf8_lossy(&bytes))?)
}

/// Find the main document part name in the content-type index, stripped of
/// its `/word/` prefix.
fn main_doc_name(content_types: &Tree) -> Result<String> {
    let root = content_types.root();
    for &child in content_types.children(root) {
        let is_main = content_types
            .attr(child, "ContentType")
            .is_some_and(|ct| MAIN_DOC_MIMES.contains(&ct));
        if is_main {
            if let Some(part) = content_types.attr(child, "PartName") {
                return Ok(part.replace("/word/", ""));
            }
        }
    }
    Err(Error::MainDocumentNotFound {
        path: CONTENT_TYPES_PATH.to_string(),
    })
}
