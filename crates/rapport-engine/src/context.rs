//! Walker-scoped mutable state.
//!
//! One [`Context`] drives one walk over one template part. Nothing here is
//! shared between walks: concurrent report generation needs one context (and
//! one template tree) per walker.

use std::collections::HashMap;

use rapport_xml::NodeId;

use crate::functions::built_ins;
use crate::options::CreateReportOptions;
use crate::tags::{P_TAG, TC_TAG, TR_TAG};
use crate::value::{Htmls, Images, Links, Value};

/// One tracked container tag's accumulation state, used to decide whether
/// the surrounding paragraph/row/cell should be elided from the output.
#[derive(Debug, Clone, Default)]
pub(crate) struct BufferStatus {
    /// Literal text seen inside the container.
    pub(crate) text: String,
    /// Command text seen inside the container.
    pub(crate) cmds: String,
    /// Whether a command inserted output into the container.
    pub(crate) f_inserted_text: bool,
}

/// Buffers for the three tracked container tags.
#[derive(Debug, Clone, Default)]
pub(crate) struct Buffers {
    p: BufferStatus,
    tr: BufferStatus,
    tc: BufferStatus,
}

impl Buffers {
    pub(crate) fn get(&self, tag: &str) -> Option<&BufferStatus> {
        match tag {
            P_TAG => Some(&self.p),
            TR_TAG => Some(&self.tr),
            TC_TAG => Some(&self.tc),
            _ => None,
        }
    }

    /// Reset the buffer for a container tag when a new one is entered.
    pub(crate) fn reset(&mut self, tag: &str) {
        match tag {
            P_TAG => self.p = BufferStatus::default(),
            TR_TAG => self.tr = BufferStatus::default(),
            TC_TAG => self.tc = BufferStatus::default(),
            _ => {}
        }
    }

    /// Append text to all three buffers, routing to `cmds` or `text`.
    pub(crate) fn append(&mut self, text: &str, f_cmd: bool, f_inserted_text: bool) {
        for buf in [&mut self.p, &mut self.tr, &mut self.tc] {
            if f_cmd {
                buf.cmds.push_str(text);
            } else {
                buf.text.push_str(text);
            }
            if f_inserted_text {
                buf.f_inserted_text = true;
            }
        }
    }

    /// Mark all three buffers as having received inserted content, keeping
    /// their containers from being elided.
    pub(crate) fn mark_inserted(&mut self) {
        self.p.f_inserted_text = true;
        self.tr.f_inserted_text = true;
        self.tc.f_inserted_text = true;
    }

    /// Mark a single container tag's buffer as holding inserted content.
    pub(crate) fn mark_inserted_for(&mut self, tag: &str) {
        match tag {
            P_TAG => self.p.f_inserted_text = true,
            TR_TAG => self.tr.f_inserted_text = true,
            TC_TAG => self.tc.f_inserted_text = true,
            _ => {}
        }
    }
}

/// One entry of the loop stack: a `FOR` iteration or an `IF` block.
#[derive(Debug, Clone)]
pub(crate) struct LoopStatus {
    /// The template node carrying the FOR/IF command; the walker jumps back
    /// here on each new iteration.
    pub(crate) ref_node: NodeId,
    /// Input-tree depth of `ref_node`.
    pub(crate) ref_node_level: usize,
    /// Loop variable (FOR) or anchor name (IF).
    pub(crate) var_name: String,
    /// The iteration set. `[1]` or `[]` for IF.
    pub(crate) loop_over: Vec<Value>,
    /// Current index; `None` is the exploration pass used to locate the END
    /// marker before the first (or only) real iteration.
    pub(crate) idx: Option<usize>,
    /// Whether this entry is an IF rather than a FOR.
    pub(crate) is_if: bool,
}

/// An image subtree awaiting splice, plus its optional caption nodes.
/// All ids refer to the output tree.
#[derive(Debug, Clone)]
pub(crate) struct PendingImage {
    pub(crate) image: NodeId,
    pub(crate) caption: Vec<NodeId>,
}

/// Mutable state for a single template walk.
pub struct Context {
    pub(crate) options: CreateReportOptions,

    /// Depth of the input cursor in the template tree.
    pub(crate) level: usize,
    /// Whether the lexer is currently inside a command segment.
    pub(crate) f_cmd: bool,
    /// Command text accumulating across fragment boundaries.
    pub(crate) cmd: String,
    pub(crate) buffers: Buffers,

    /// Loop stack, innermost last.
    pub(crate) loops: Vec<LoopStatus>,
    /// Signal to the walker that the input cursor must jump back to the
    /// innermost loop's reference node.
    pub(crate) f_jump: bool,
    /// Loop-introduced bindings (keys start with `$`) plus `$idx`.
    pub(crate) vars: HashMap<String, Value>,
    /// Alias name to full command.
    pub(crate) shorthands: HashMap<String, String>,

    /// Matched counters for detecting unbalanced conditionals.
    pub(crate) g_cnt_if: u32,
    pub(crate) g_cnt_end_if: u32,

    /// Monotonic id source for images and shape ids, seeded by the caller.
    pub(crate) image_and_shape_id_increment: u64,
    pub(crate) images: Images,
    pub(crate) link_id: u64,
    pub(crate) links: Links,
    pub(crate) html_id: u64,
    pub(crate) htmls: Htmls,

    /// Generated artifact subtrees awaiting splice on container exit.
    pub(crate) pending_image_node: Option<PendingImage>,
    pub(crate) pending_link_node: Option<NodeId>,
    pub(crate) pending_html_node: Option<NodeId>,

    /// Most recently exited `w:rPr` in the output tree; stylistic template
    /// for generated hyperlinks.
    pub(crate) text_run_props_node: Option<NodeId>,

    /// Per-paragraph / per-row conditional bookkeeping, cleared as END
    /// markers are processed.
    pub(crate) p_if_check: HashMap<NodeId, String>,
    pub(crate) tr_if_check: HashMap<NodeId, String>,
}

impl Context {
    /// Create the state for one walk. The caller-supplied function table is
    /// overlaid on the built-ins (`len`, `join`); `id_seed` seeds the
    /// image/shape id counter.
    pub fn new(options: CreateReportOptions, id_seed: u64) -> Self {
        let mut options = options;
        let mut functions = built_ins();
        for (name, f) in options.functions.drain() {
            functions.insert(name, f);
        }
        options.functions = functions;

        Context {
            options,
            level: 1,
            f_cmd: false,
            cmd: String::new(),
            buffers: Buffers::default(),
            loops: Vec::new(),
            f_jump: false,
            vars: HashMap::new(),
            shorthands: HashMap::new(),
            g_cnt_if: 0,
            g_cnt_end_if: 0,
            image_and_shape_id_increment: id_seed,
            images: Images::new(),
            link_id: 0,
            links: Links::new(),
            html_id: 0,
            htmls: Htmls::new(),
            pending_image_node: None,
            pending_link_node: None,
            pending_html_node: None,
            text_run_props_node: None,
            p_if_check: HashMap::new(),
            tr_if_check: HashMap::new(),
        }
    }

    /// The innermost loop, if any.
    pub(crate) fn cur_loop(&self) -> Option<&LoopStatus> {
        self.loops.last()
    }

    pub(crate) fn cur_loop_mut(&mut self) -> Option<&mut LoopStatus> {
        self.loops.last_mut()
    }

    /// Whether the innermost loop is in its exploration pass.
    pub(crate) fn is_exploring(&self) -> bool {
        self.cur_loop().is_some_and(|l| l.idx.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_ins_seeded() {
        let ctx = Context::new(CreateReportOptions::default(), 0);
        assert!(ctx.options.functions.contains_key("len"));
        assert!(ctx.options.functions.contains_key("join"));
    }

    #[test]
    fn test_caller_functions_shadow_built_ins() {
        let mut options = CreateReportOptions::default();
        options.functions.insert(
            "len".to_string(),
            std::sync::Arc::new(|_: &[Value]| Value::Int(42)),
        );
        let ctx = Context::new(options, 0);
        let f = &ctx.options.functions["len"];
        assert_eq!(f(&[Value::Str("abc".to_string())]), Value::Int(42));
    }

    #[test]
    fn test_exploration_flag() {
        let mut ctx = Context::new(CreateReportOptions::default(), 0);
        assert!(!ctx.is_exploring());
        ctx.loops.push(LoopStatus {
            ref_node: rapport_xml::Tree::new(rapport_xml::NodeKind::Text(String::new())).root(),
            ref_node_level: 1,
            var_name: "x".to_string(),
            loop_over: vec![],
            idx: None,
            is_if: false,
        });
        assert!(ctx.is_exploring());
        ctx.cur_loop_mut().unwrap().idx = Some(0);
        assert!(!ctx.is_exploring());
    }
}
