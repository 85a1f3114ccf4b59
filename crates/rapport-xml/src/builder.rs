//! Tree serialization.
//!
//! Pre-order writer producing the part's bytes: XML declaration, elements
//! indented two spaces per level, childless elements self-closed, text
//! emitted inline. Text is entity-escaped except inside spans fenced by the
//! literal-XML delimiter, which pass through raw; that is how generated
//! markup like `<w:br/>` survives serialization.

use crate::tree::{NodeId, NodeKind, Tree};

/// Serialization options.
#[derive(Debug, Clone)]
pub struct XmlOptions {
    /// Token that toggles raw emission on and off inside text nodes.
    pub literal_xml_delimiter: String,
}

impl Default for XmlOptions {
    fn default() -> Self {
        XmlOptions {
            literal_xml_delimiter: "||".to_string(),
        }
    }
}

/// Serialize the tree to bytes, starting with the XML declaration.
pub fn build_xml(tree: &Tree, options: &XmlOptions) -> Vec<u8> {
    let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    write_node(tree, tree.root(), options, "", &mut out);
    out.into_bytes()
}

fn write_node(tree: &Tree, id: NodeId, options: &XmlOptions, indent: &str, out: &mut String) {
    match tree.kind(id) {
        NodeKind::Text(text) => out.push_str(&sanitize_text(text, options)),
        NodeKind::Element { tag, attrs } => {
            out.push('\n');
            out.push_str(indent);
            out.push('<');
            out.push_str(tag);
            for (key, value) in attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&sanitize_attr(value));
                out.push('"');
            }

            let children = tree.children(id);
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');

            let child_indent = format!("{indent}  ");
            let mut last_child_is_element = false;
            for &child in children {
                write_node(tree, child, options, &child_indent, out);
                last_child_is_element = tree.is_element(child);
            }

            // A trailing text child keeps the closing tag inline so no
            // whitespace is introduced into the text content.
            if last_child_is_element {
                out.push('\n');
                out.push_str(indent);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn sanitize_text(text: &str, options: &XmlOptions) -> String {
    let mut out = String::with_capacity(text.len());
    let mut literal = false;
    for segment in text.split(options.literal_xml_delimiter.as_str()) {
        if literal {
            out.push_str(segment);
        } else {
            out.push_str(&escape(segment, false));
        }
        literal = !literal;
    }
    out
}

fn sanitize_attr(value: &str) -> String {
    escape(value, true)
}

fn escape(text: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' if quotes => out.push_str("&apos;"),
            '"' if quotes => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn build_str(tree: &Tree) -> String {
        String::from_utf8(build_xml(tree, &XmlOptions::default())).unwrap()
    }

    #[test]
    fn test_self_closing_empty_element() {
        let tree = parse("<w:p></w:p>").unwrap();
        assert_eq!(
            build_str(&tree),
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:p/>"
        );
    }

    #[test]
    fn test_text_kept_inline() {
        let tree = parse("<w:t>hi there</w:t>").unwrap();
        assert!(build_str(&tree).ends_with("<w:t>hi there</w:t>"));
    }

    #[test]
    fn test_children_indented() {
        let tree = parse("<w:p><w:r><w:t>x</w:t></w:r></w:p>").unwrap();
        let xml = build_str(&tree);
        assert!(xml.contains("\n<w:p>\n  <w:r>\n    <w:t>x</w:t>"));
        assert!(xml.ends_with("</w:r>\n</w:p>"));
    }

    #[test]
    fn test_attr_escaping() {
        let mut tree = Tree::new(NodeKind::Element {
            tag: "Relationship".to_string(),
            attrs: Default::default(),
        });
        let root = tree.root();
        tree.set_attr(root, "Target", "https://x.test/?a=1&b=\"2\"");
        let xml = build_str(&tree);
        assert!(xml.contains(r#"Target="https://x.test/?a=1&amp;b=&quot;2&quot;""#));
    }

    #[test]
    fn test_text_escaping() {
        let tree = parse("<w:t>a &amp; b</w:t>").unwrap();
        assert!(build_str(&tree).contains("a &amp; b"));
    }

    #[test]
    fn test_literal_xml_passthrough() {
        let mut tree = parse("<w:t></w:t>").unwrap();
        let root = tree.root();
        let text = tree.new_text("a||<w:br/>||b");
        tree.append_child(root, text);
        let xml = build_str(&tree);
        assert!(xml.contains("a<w:br/>b"));
    }

    #[test]
    fn test_roundtrip_keeps_content() {
        let source = "<w:body><w:p><w:r><w:t>one &amp; two</w:t></w:r></w:p><w:sectPr/></w:body>";
        let tree = parse(source).unwrap();
        let reparsed = parse(&build_str(&tree)).unwrap();

        let body = reparsed.root();
        assert_eq!(reparsed.tag(body), Some("w:body"));
        let children: Vec<_> = reparsed
            .children(body)
            .iter()
            .filter_map(|&c| reparsed.tag(c))
            .collect();
        assert_eq!(children, vec!["w:p", "w:sectPr"]);
    }
}
