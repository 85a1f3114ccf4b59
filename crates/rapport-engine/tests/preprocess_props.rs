//! Property tests for the preprocessor: idempotence and single-node
//! containment of commands, over arbitrarily fragmented run layouts.

use proptest::prelude::*;

use rapport_engine::{preprocess_template, Delimiters};
use rapport_xml::{NodeId, Tree};

const DELIM: &str = "+++";

/// Literal fragments without delimiter characters.
fn literal() -> impl Strategy<Value = String> {
    "[a-z ]{0,8}"
}

/// Command bodies without delimiter characters.
fn command() -> impl Strategy<Value = String> {
    "[a-zA-Z.$= ]{1,12}"
}

/// A well-formed visible text: literals and delimited commands interleaved.
fn template_text() -> impl Strategy<Value = String> {
    prop::collection::vec((literal(), command()), 0..4).prop_flat_map(|pairs| {
        literal().prop_map(move |tail| {
            let mut text = String::new();
            for (lit, cmd) in &pairs {
                text.push_str(lit);
                text.push_str(DELIM);
                text.push_str(cmd);
                text.push_str(DELIM);
            }
            text.push_str(&tail);
            text
        })
    })
}

/// Split the text into 1..n runs at arbitrary char positions, mimicking an
/// editor fragmenting the paragraph.
fn fragmented(text: String) -> impl Strategy<Value = Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    prop::collection::vec(0..=len, 0..3).prop_map(move |mut cuts| {
        cuts.push(0);
        cuts.push(len);
        cuts.sort_unstable();
        cuts.dedup();
        cuts.windows(2)
            .map(|w| chars[w[0]..w[1]].iter().collect::<String>())
            .collect()
    })
}

fn paragraph_of_runs(runs: &[String]) -> Tree {
    let body: String = runs
        .iter()
        .map(|r| format!("<w:r><w:t>{}</w:t></w:r>", r))
        .collect();
    rapport_xml::parse(&format!("<w:p>{body}</w:p>")).expect("paragraph should parse")
}

fn text_nodes(tree: &Tree) -> Vec<String> {
    fn collect(tree: &Tree, id: NodeId, out: &mut Vec<String>) {
        if tree.tag(id) == Some("w:t") {
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
    let mut out = Vec::new();
    collect(tree, tree.root(), &mut out);
    out
}

proptest! {
    /// Running the preprocessor a second time must not change the tree.
    #[test]
    fn prop_preprocess_idempotent(
        runs in template_text().prop_flat_map(fragmented)
    ) {
        let delims = Delimiters::default();
        let mut tree = paragraph_of_runs(&runs);
        preprocess_template(&mut tree, &delims).unwrap();
        let once = text_nodes(&tree);
        preprocess_template(&mut tree, &delims).unwrap();
        prop_assert_eq!(text_nodes(&tree), once);
    }

    /// After preprocessing, no command spans text-node boundaries: every
    /// text node holds either no delimiter at all or one complete command.
    #[test]
    fn prop_commands_contained_in_single_nodes(
        runs in template_text().prop_flat_map(fragmented)
    ) {
        let delims = Delimiters::default();
        let mut tree = paragraph_of_runs(&runs);
        preprocess_template(&mut tree, &delims).unwrap();

        for text in text_nodes(&tree) {
            let occurrences = text.matches(DELIM).count();
            prop_assert!(
                occurrences == 0 || occurrences == 2,
                "unbalanced delimiters in node {:?}",
                text
            );
            if occurrences == 2 {
                prop_assert!(text.starts_with(DELIM), "node {:?}", text);
                prop_assert!(text.ends_with(DELIM), "node {:?}", text);
            }
        }
    }

    /// The visible character stream is preserved: concatenating all text
    /// nodes yields the original text.
    #[test]
    fn prop_text_stream_preserved(
        runs in template_text().prop_flat_map(fragmented)
    ) {
        let delims = Delimiters::default();
        let original: String = runs.concat();
        let mut tree = paragraph_of_runs(&runs);
        preprocess_template(&mut tree, &delims).unwrap();

        let stitched: String = text_nodes(&tree)
            .into_iter()
            .filter(|t| t != &format!("{DELIM}CMD_NODE{DELIM}"))
            .collect();
        prop_assert_eq!(stitched, original);
    }
}
