//! Sidecar persistence: generated images, links and HTML chunks become
//! media parts and relationship entries next to the document part that
//! produced them.

use rapport_engine::{Htmls, Images, Links};
use rapport_xml::{build_xml, Tree, XmlOptions};
use tracing::debug;

use crate::container::Container;
use crate::error::Result;
use crate::template::TEMPLATE_PATH;

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const AFCHUNK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/aFChunk";

const EMPTY_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

/// Write image bytes under `word/media/` and register a relationship per
/// image in the document's `.rels` part.
pub(crate) fn process_images(
    images: &Images,
    document_component: &str,
    container: &mut impl Container,
    xml_options: &XmlOptions,
) -> Result<()> {
    debug!(part = document_component, count = images.len(), "processing images");
    if images.is_empty() {
        return Ok(());
    }

    let rels_path = rels_path(document_component);
    let mut rels = get_rels(container, &rels_path)?;

    for (image_id, image) in images {
        let image_name = format!(
            "template_{document_component}_{image_id}{}",
            image.extension
        );
        debug!(id = %image_id, name = %image_name, "writing image");
        container.set_file(
            &format!("{TEMPLATE_PATH}/media/{image_name}"),
            image.data.clone(),
        );
        append_relationship(
            &mut rels,
            &[
                ("Id", image_id),
                ("Type", IMAGE_REL_TYPE),
                ("Target", &format!("media/{image_name}")),
            ],
        );
    }

    container.set_file(&rels_path, build_xml(&rels, xml_options));
    Ok(())
}

/// Register an external hyperlink relationship per link.
pub(crate) fn process_links(
    links: &Links,
    document_component: &str,
    container: &mut impl Container,
    xml_options: &XmlOptions,
) -> Result<()> {
    debug!(part = document_component, count = links.len(), "processing links");
    if links.is_empty() {
        return Ok(());
    }

    let rels_path = rels_path(document_component);
    let mut rels = get_rels(container, &rels_path)?;

    for (link_id, link) in links {
        append_relationship(
            &mut rels,
            &[
                ("Id", link_id),
                ("Type", HYPERLINK_REL_TYPE),
                ("Target", &link.url),
                ("TargetMode", "External"),
            ],
        );
    }

    container.set_file(&rels_path, build_xml(&rels, xml_options));
    Ok(())
}

/// Write each HTML chunk as its own part and register an aFChunk
/// relationship for it.
pub(crate) fn process_htmls(
    htmls: &Htmls,
    document_component: &str,
    container: &mut impl Container,
    xml_options: &XmlOptions,
) -> Result<()> {
    debug!(part = document_component, count = htmls.len(), "processing htmls");
    if htmls.is_empty() {
        return Ok(());
    }

    let rels_path = rels_path(document_component);
    let mut rels = get_rels(container, &rels_path)?;

    for (html_id, html) in htmls {
        // Periods in part names upset some downstream parsers.
        let html_name = format!(
            "template_{}_{html_id}.html",
            document_component.replace('.', "_")
        );
        debug!(id = %html_id, name = %html_name, "writing html");
        container.set_file(
            &format!("{TEMPLATE_PATH}/{html_name}"),
            html.clone().into_bytes(),
        );
        append_relationship(
            &mut rels,
            &[
                ("Id", html_id),
                ("Type", AFCHUNK_REL_TYPE),
                ("Target", &html_name),
            ],
        );
    }

    container.set_file(&rels_path, build_xml(&rels, xml_options));
    Ok(())
}

fn rels_path(document_component: &str) -> String {
    format!("{TEMPLATE_PATH}/_rels/{document_component}.rels")
}

/// Parse the existing `.rels` part, or start an empty one.
fn get_rels(container: &impl Container, rels_path: &str) -> Result<Tree> {
    let xml = match container.get_file(rels_path) {
        Some(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
        _ => EMPTY_RELS.to_string(),
    };
    Ok(rapport_xml::parse(&xml)?)
}

fn append_relationship(rels: &mut Tree, attrs: &[(&str, &str)]) {
    let root = rels.root();
    let relationship = rels.new_element_with("Relationship", attrs);
    rels.append_child(root, relationship);
}

/// Add a `Default` content-type entry unless the extension is already
/// declared.
pub(crate) fn ensure_content_type(content_types: &mut Tree, extension: &str, content_type: &str) {
    let root = content_types.root();
    let declared = content_types
        .children(root)
        .iter()
        .any(|&child| content_types.attr(child, "Extension") == Some(extension));
    if declared {
        return;
    }
    let entry = content_types.new_element_with(
        "Default",
        &[("Extension", extension), ("ContentType", content_type)],
    );
    content_types.append_child(root, entry);
}
