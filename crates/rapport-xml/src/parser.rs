//! XML parser building [`Tree`]s.
//!
//! A thin event loop over [`quick-xml`]. Tag and attribute names are kept
//! fully qualified (prefix included); character data becomes text nodes,
//! including whitespace-only runs, since `w:t` content is space-sensitive.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::tree::{Attrs, NodeId, NodeKind, Tree};

/// Parse an XML document into a [`Tree`].
///
/// The XML declaration, comments, processing instructions and DOCTYPE are
/// skipped. Text appearing before the root element is discarded.
///
/// # Errors
///
/// Returns [`Error::Syntax`] for malformed XML and [`Error::Structure`] for
/// an empty document, multiple roots, or an unclosed element.
pub fn parse(content: &str) -> Result<Tree> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut tree: Option<Tree> = None;
    // Open elements, innermost last.
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let kind = element_kind(&e)?;
                let id = attach(&mut tree, &stack, kind)?;
                stack.push(id);
            }
            Ok(Event::Empty(e)) => {
                let kind = element_kind(&e)?;
                attach(&mut tree, &stack, kind)?;
            }
            Ok(Event::End(_)) => {
                if stack.pop().is_none() {
                    return Err(Error::structure("closing tag without an open element"));
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| Error::syntax(format!("invalid text content: {err}")))?;
                if !text.is_empty() {
                    if let (Some(tree), Some(&parent)) = (tree.as_mut(), stack.last()) {
                        let id = tree.new_text(text.into_owned());
                        tree.append_child(parent, id);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                if let (Some(tree), Some(&parent)) = (tree.as_mut(), stack.last()) {
                    let id = tree.new_text(text);
                    tree.append_child(parent, id);
                }
            }
            Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::syntax(e.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(Error::structure("unexpected end of input inside an element"));
    }
    tree.ok_or_else(|| Error::structure("document has no root element"))
}

/// Attach a freshly parsed element to the current insertion point, creating
/// the tree when this is the root.
fn attach(tree: &mut Option<Tree>, stack: &[NodeId], kind: NodeKind) -> Result<NodeId> {
    match (tree.as_mut(), stack.last()) {
        (Some(tree), Some(&parent)) => {
            let id = tree.alloc(kind);
            tree.append_child(parent, id);
            Ok(id)
        }
        (Some(_), None) => Err(Error::structure("multiple root elements")),
        (None, _) => {
            let new_tree = Tree::new(kind);
            let root = new_tree.root();
            *tree = Some(new_tree);
            Ok(root)
        }
    }
}

fn element_kind(e: &BytesStart<'_>) -> Result<NodeKind> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Attrs::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::syntax(format!("invalid attribute: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::syntax(format!("invalid attribute value: {err}")))?;
        attrs.insert(key, value.into_owned());
    }
    Ok(NodeKind::Element { tag, attrs })
}
