//! Template preprocessing.
//!
//! Word processors routinely fragment visible text across adjacent runs
//! (spell-check state, formatting history, ...), so one logical command can
//! arrive split over several `w:t` elements. This pass replays every
//! character through a delimiter state machine and re-homes text so that
//! after it runs, each command sits complete inside a single text node.

use rapport_xml::{NodeId, Tree};

use crate::error::{ReportError, Result};
use crate::options::Delimiters;
use crate::tags::{P_TAG, T_TAG};

/// Normalize delimiter-fragmented runs in place.
///
/// After this pass:
/// - every `w:t` carries `xml:space="preserve"`;
/// - each command, delimiters included, is contained in one text node;
/// - a text node fully consumed by command re-homing holds the
///   `CMD_NODE` placeholder, which later makes the walker elide the
///   enclosing paragraph or row if nothing else is produced.
pub fn preprocess_template(tree: &mut Tree, delimiters: &Delimiters) -> Result<()> {
    let placeholder = format!("{}CMD_NODE{}", delimiters.open, delimiters.close);
    let open: Vec<char> = delimiters.open.chars().collect();
    let close: Vec<char> = delimiters.close.chars().collect();
    if open.is_empty() || close.is_empty() {
        return Err(ReportError::template_syntax("empty command delimiter"));
    }

    let mut node = Some(tree.root());
    let mut f_cmd = false;
    // The text node currently receiving characters; survives across runs
    // while a command (or a partial delimiter match) is open.
    let mut open_node: Option<NodeId> = None;
    let mut idx_delimiter = 0usize;

    while let Some(current) = node {
        if tree.tag(current) == Some(T_TAG) {
            tree.set_attr(current, "xml:space", "preserve");
        }

        // A paragraph boundary inside an open command stands for a space the
        // fragmented runs would otherwise lose.
        if tree.tag(current) == Some(P_TAG) {
            if let Some(id) = open_node {
                tree.push_text(id, " ");
            }
        }

        // Traversal cursor for this node; sibling insertion may advance it.
        let mut trav = current;

        let in_w_t = tree.is_text(current)
            && tree
                .parent(current)
                .is_some_and(|p| tree.tag(p) == Some(T_TAG));
        if in_w_t {
            let text_node = current;
            let mut cursor = open_node.unwrap_or(text_node);
            let text_in: String = tree.text(text_node).unwrap_or_default().to_string();
            tree.set_text(text_node, "");
            let chars: Vec<char> = text_in.chars().collect();

            for (i, &c) in chars.iter().enumerate() {
                let current_delimiter = if f_cmd { &close } else { &open };

                if c == current_delimiter[idx_delimiter] {
                    idx_delimiter += 1;
                    if idx_delimiter == current_delimiter.len() {
                        f_cmd = !f_cmd;
                        let f_nodes_match = trav == cursor;

                        // Opening a command after literal text: the command
                        // gets its own `w:t` sibling.
                        if f_cmd && !tree.text(cursor).unwrap_or_default().is_empty() {
                            cursor = insert_text_sibling_after(tree, cursor)?;
                            if f_nodes_match {
                                trav = cursor;
                            }
                        }
                        let delimiter_str: String = current_delimiter.iter().collect();
                        tree.push_text(cursor, &delimiter_str);
                        // Closing a command with source text remaining: the
                        // trailing literal gets its own sibling too.
                        if !f_cmd && i < chars.len() - 1 {
                            cursor = insert_text_sibling_after(tree, cursor)?;
                            if f_nodes_match {
                                trav = cursor;
                            }
                        }
                        idx_delimiter = 0;
                        if !f_cmd {
                            cursor = trav;
                        }
                    }
                } else if idx_delimiter != 0 {
                    // Partial match failed: flush the matched prefix, then
                    // take the current character as ordinary text.
                    let prefix: String = current_delimiter[..idx_delimiter].iter().collect();
                    tree.push_text(cursor, &prefix);
                    idx_delimiter = 0;
                    if !f_cmd {
                        cursor = trav;
                    }
                    let mut buf = [0u8; 4];
                    tree.push_text(cursor, c.encode_utf8(&mut buf));
                } else {
                    let mut buf = [0u8; 4];
                    tree.push_text(cursor, c.encode_utf8(&mut buf));
                }
            }

            // Nothing pending: the cursor closes with the node.
            if !f_cmd && idx_delimiter == 0 {
                open_node = None;
            } else {
                open_node = Some(cursor);
            }

            // Text was present but got re-homed elsewhere entirely: leave
            // the purge marker.
            if !text_in.is_empty() && tree.text(text_node).unwrap_or_default().is_empty() {
                tree.set_text(text_node, placeholder.clone());
            }
        }

        node = next_node(tree, trav);
    }

    Ok(())
}

/// Clone the enclosing `w:t` (tag and attributes) and insert it as the next
/// sibling, with one empty text child; returns the new text node.
fn insert_text_sibling_after(tree: &mut Tree, text_node: NodeId) -> Result<NodeId> {
    let t_node = tree
        .parent(text_node)
        .filter(|&p| tree.tag(p) == Some(T_TAG))
        .ok_or_else(|| ReportError::template_syntax("text node not within w:t"))?;
    if tree.parent(t_node).is_none() {
        return Err(ReportError::template_syntax("w:t node has no parent"));
    }

    let kind = tree.kind(t_node).clone();
    let new_t = tree.alloc(kind);
    let new_text = tree.new_text("");
    tree.append_child(new_t, new_text);
    tree.insert_after(t_node, new_t)
        .map_err(|err| ReportError::template_syntax(err.to_string()))?;
    Ok(new_text)
}

/// Depth-first pre-order successor.
fn next_node(tree: &Tree, from: NodeId) -> Option<NodeId> {
    if let Some(child) = tree.first_child(from) {
        return Some(child);
    }
    let mut current = from;
    while let Some(parent) = tree.parent(current) {
        if let Some(sibling) = tree.next_sibling(current) {
            return Some(sibling);
        }
        current = parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapport_xml::parse;

    fn delims() -> Delimiters {
        Delimiters::default()
    }

    /// All text-node contents under `w:t` elements, in document order.
    fn texts(tree: &Tree) -> Vec<String> {
        let mut out = Vec::new();
        collect(tree, tree.root(), &mut out);
        fn collect(tree: &Tree, id: NodeId, out: &mut Vec<String>) {
            if tree.tag(id) == Some(T_TAG) {
                for &child in tree.children(id) {
                    if let Some(text) = tree.text(child) {
                        out.push(text.to_string());
                    }
                }
            }
            for &child in tree.children(id) {
                collect(tree, child, out);
            }
        }
        out
    }

    #[test]
    fn test_untouched_literal_text() {
        let mut tree = parse("<w:p><w:r><w:t>just words</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        assert_eq!(texts(&tree), vec!["just words"]);
    }

    #[test]
    fn test_space_preserve_added() {
        let mut tree = parse("<w:p><w:r><w:t>x</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        let run = tree.children(tree.root())[0];
        let wt = tree.children(run)[0];
        assert_eq!(tree.attr(wt, "xml:space"), Some("preserve"));
    }

    #[test]
    fn test_command_split_from_literals() {
        let mut tree = parse("<w:p><w:r><w:t>a+++cmd+++b</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        assert_eq!(texts(&tree), vec!["a", "+++cmd+++", "b"]);
    }

    #[test]
    fn test_fragmented_command_reassembled() {
        // One command fragmented over three runs.
        let mut tree = parse(
            "<w:p><w:r><w:t>a++</w:t></w:r><w:r><w:t>+cm</w:t></w:r>\
             <w:r><w:t>d+++b</w:t></w:r></w:p>",
        )
        .unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        let all = texts(&tree);
        assert!(all.contains(&"+++cmd+++".to_string()), "got {all:?}");
        // The surviving literal text is still a ... b in order.
        let joined: String = all
            .iter()
            .filter(|t| !t.contains("+++"))
            .cloned()
            .collect();
        assert_eq!(joined, "ab");
    }

    #[test]
    fn test_placeholder_left_in_consumed_node() {
        // The second run's text is entirely swallowed by the command.
        let mut tree =
            parse("<w:p><w:r><w:t>+++c</w:t></w:r><w:r><w:t>md+++</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        let all = texts(&tree);
        assert!(all.contains(&"+++cmd+++".to_string()), "got {all:?}");
        assert!(
            all.contains(&"+++CMD_NODE+++".to_string()),
            "expected placeholder, got {all:?}"
        );
    }

    #[test]
    fn test_paragraph_boundary_adds_space() {
        // A command spanning two paragraphs gains a space at the boundary.
        let mut tree = parse(
            "<w:body><w:p><w:r><w:t>+++INS</w:t></w:r></w:p>\
             <w:p><w:r><w:t>a+++</w:t></w:r></w:p></w:body>",
        )
        .unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        let all = texts(&tree);
        assert!(all.contains(&"+++INS a+++".to_string()), "got {all:?}");
    }

    #[test]
    fn test_adjacent_commands() {
        let mut tree = parse("<w:p><w:r><w:t>+++a++++++b+++</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        assert_eq!(texts(&tree), vec!["+++a+++", "+++b+++"]);
    }

    #[test]
    fn test_partial_delimiter_is_plain_text() {
        let mut tree = parse("<w:p><w:r><w:t>a+b++c</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        assert_eq!(texts(&tree), vec!["a+b++c"]);
    }

    #[test]
    fn test_idempotent_on_clean_input() {
        let mut tree =
            parse("<w:p><w:r><w:t>a++</w:t></w:r><w:r><w:t>+cmd+++b</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims()).unwrap();
        let once = texts(&tree);
        preprocess_template(&mut tree, &delims()).unwrap();
        assert_eq!(texts(&tree), once);
    }

    #[test]
    fn test_asymmetric_delimiters() {
        let delims = Delimiters {
            open: "{{".to_string(),
            close: "}}".to_string(),
        };
        let mut tree = parse("<w:p><w:r><w:t>x{{cmd}}y</w:t></w:r></w:p>").unwrap();
        preprocess_template(&mut tree, &delims).unwrap();
        assert_eq!(texts(&tree), vec!["x", "{{cmd}}", "y"]);
    }
}
