//! XML tree model for word-processing document parts.
//!
//! This crate provides the tree that the report engine walks: a flat arena of
//! nodes addressed by [`NodeId`], where each node is either an element (tag +
//! attributes) or a text run. Parent links are plain back-indices into the
//! arena, so the engine can move freely in all four directions (down, side,
//! up, jump) without fighting ownership.
//!
//! The main types are:
//! - [`Tree`]: the arena, rooted at [`Tree::root`]
//! - [`Node`] / [`NodeKind`]: one node, element or text
//! - [`XmlOptions`]: serialization options (literal-XML passthrough)
//!
//! # Example
//!
//! ```rust
//! use rapport_xml::{build_xml, parse, XmlOptions};
//!
//! let tree = parse("<w:p><w:r><w:t>hello</w:t></w:r></w:p>").unwrap();
//! assert_eq!(tree.tag(tree.root()), Some("w:p"));
//!
//! let xml = build_xml(&tree, &XmlOptions::default());
//! assert!(String::from_utf8(xml).unwrap().contains("hello"));
//! ```
//!
//! Tag and attribute names are kept fully qualified (`w:p`, `xml:space`);
//! the word-processing vocabulary is namespace-prefix-sensitive and nothing
//! in the engine ever needs the local name alone.

pub mod builder;
pub mod error;
pub mod parser;
pub mod tree;

pub use builder::{build_xml, XmlOptions};
pub use error::{Error, Result};
pub use parser::parse;
pub use tree::{Attrs, Node, NodeId, NodeKind, Tree};
