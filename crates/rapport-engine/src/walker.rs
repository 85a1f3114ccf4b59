//! The template walker.
//!
//! A dual-cursor state machine: one cursor traverses the (preprocessed)
//! template tree, the other builds the output tree in lockstep. Commands run
//! as text nodes are visited; loops rewind the input cursor via the jump
//! signal; generated artifact subtrees are spliced in as their enclosing
//! containers are exited.

use rapport_xml::{NodeId, Tree};
use tracing::debug;

use crate::commands::{process_cmd, CmdOutput};
use crate::context::Context;
use crate::error::{ReportError, Result};
use crate::tags::{
    ALTCHUNK_TAG, DOCPR_TAG, P_TAG, RPR_TAG, R_TAG, TBL_TAG, TC_TAG, TR_TAG, T_TAG, VSHAPE_TAG,
};
use crate::value::{Htmls, Images, Links, ReportData};

/// Everything a walk produces: the output tree plus the sidecar tables the
/// caller must persist into the container's auxiliary parts.
pub struct ReportOutput {
    /// The generated document tree.
    pub report: Tree,
    /// Generated images, keyed by relationship id.
    pub images: Images,
    /// Generated hyperlinks, keyed by relationship id.
    pub links: Links,
    /// Generated HTML chunks, keyed by relationship id.
    pub htmls: Htmls,
    /// Errors collected during a non-fail-fast walk; empty on clean runs.
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Down,
    Side,
    Up,
    Jump,
}

/// Produce a report from a preprocessed template.
///
/// The template tree is mutated (conditional anchors are named during the
/// walk), so it cannot be shared between concurrent walks. In fail-fast mode
/// the first error aborts; otherwise errors accumulate in
/// [`ReportOutput::errors`] alongside the best-effort output.
pub fn produce_report(
    data: &ReportData,
    template: &mut Tree,
    ctx: Context,
) -> Result<ReportOutput> {
    let mut ctx = ctx;
    walk_template(data, template, &mut ctx)
}

fn walk_template(data: &ReportData, tpl: &mut Tree, ctx: &mut Context) -> Result<ReportOutput> {
    let mut out = Tree::new(tpl.kind(tpl.root()).clone());

    let mut node_in = tpl.root();
    let mut node_out = out.root();
    let mut mv = Move::Side; // anything but Up, so the first move descends
    let mut delta_jump = 0usize;
    let mut errors: Vec<ReportError> = Vec::new();

    let fail_fast = ctx.options.fail_fast;
    let maximum_walking_depth = ctx.options.maximum_walking_depth;
    let mut loop_count = 0usize;

    loop {
        if loop_count > maximum_walking_depth {
            return Err(ReportError::template_syntax(
                "infinite loop or massive dataset detected, walker gave up",
            ));
        }
        loop_count += 1;

        // =============================================
        // Move the input cursor
        // =============================================
        if ctx.f_jump {
            let cur = ctx
                .cur_loop()
                .ok_or_else(|| ReportError::template_syntax("jump requested without a loop"))?;
            debug!(level = cur.ref_node_level, "jumping back to loop start");
            delta_jump = ctx.level.saturating_sub(cur.ref_node_level);
            node_in = cur.ref_node;
            ctx.level = cur.ref_node_level;
            ctx.f_jump = false;
            mv = Move::Jump;
        } else if mv != Move::Up && tpl.first_child(node_in).is_some() {
            node_in = tpl.first_child(node_in).unwrap_or(node_in);
            ctx.level += 1;
            mv = Move::Down;
        } else if let Some(sibling) = tpl.next_sibling(node_in) {
            node_in = sibling;
            mv = Move::Side;
        } else {
            match tpl.parent(node_in) {
                None => {
                    debug!(loop_count, "walk complete");
                    break;
                }
                Some(parent) => {
                    node_in = parent;
                    ctx.level -= 1;
                    mv = Move::Up;
                }
            }
        }

        // =============================================
        // Process the input node
        // =============================================

        // Elide the most recently created output node in two cases: we are
        // inside an exploration pass, or a paragraph/row/cell contained
        // nothing but commands.
        if mv != Move::Down {
            let tag = out.tag(node_out);
            let f_remove_node = match tag {
                Some(P_TAG | TBL_TAG | TR_TAG | TC_TAG) if ctx.is_exploring() => true,
                Some(tag @ (P_TAG | TR_TAG | TC_TAG)) => ctx
                    .buffers
                    .get(tag)
                    .is_some_and(|buf| {
                        buf.text.is_empty() && !buf.cmds.is_empty() && !buf.f_inserted_text
                    }),
                _ => false,
            };
            if f_remove_node {
                if let Some(parent) = out.parent(node_out) {
                    out.pop_child(parent);
                }
            }
        }

        if mv == Move::Up {
            // While exploring, the loop anchor climbs with us so the jump
            // back lands where the rewind started.
            if ctx.is_exploring() {
                let climbs = ctx
                    .cur_loop()
                    .is_some_and(|cur| tpl.parent(cur.ref_node) == Some(node_in));
                if climbs {
                    if let Some(cur) = ctx.cur_loop_mut() {
                        cur.ref_node = node_in;
                        cur.ref_node_level -= 1;
                    }
                }
            }

            node_out = out
                .parent(node_out)
                .ok_or_else(|| ReportError::template_syntax("output node has no parent"))?;
            let tag = out.tag(node_out).map(str::to_string);
            let tag = tag.as_deref();

            // Exiting the `w:t` that hosted an IMAGE command: swap the text
            // element for the drawing (and its caption, if any).
            if tag == Some(T_TAG) && ctx.pending_image_node.is_some() {
                if let (Some(pending), Some(parent)) =
                    (ctx.pending_image_node.take(), out.parent(node_out))
                {
                    out.pop_child(parent);
                    out.append_child(parent, pending.image);
                    for caption_node in pending.caption {
                        out.append_child(parent, caption_node);
                    }
                    ctx.buffers.mark_inserted();
                }
            }

            // Exiting the `w:r` that hosted a LINK command: swap the run for
            // the hyperlink.
            if tag == Some(R_TAG) && ctx.pending_link_node.is_some() {
                if let (Some(link), Some(parent)) =
                    (ctx.pending_link_node.take(), out.parent(node_out))
                {
                    out.pop_child(parent);
                    out.append_child(parent, link);
                    ctx.buffers.mark_inserted();
                }
            }

            // Exiting the `w:p` that hosted an HTML command: swap the
            // paragraph for the altChunk reference.
            if tag == Some(P_TAG) && ctx.pending_html_node.is_some() {
                if let (Some(chunk), Some(parent)) =
                    (ctx.pending_html_node.take(), out.parent(node_out))
                {
                    out.pop_child(parent);
                    out.append_child(parent, chunk);
                    ctx.buffers.mark_inserted();
                }
            }

            // Word processors reject a table cell with no paragraph. The
            // repaired cell counts as holding content, or the very next
            // move would elide it as command-only.
            if tag == Some(TC_TAG) {
                let has_block = out
                    .children(node_out)
                    .iter()
                    .any(|&c| matches!(out.tag(c), Some(P_TAG | ALTCHUNK_TAG)));
                if !has_block {
                    let empty_p = out.new_element(P_TAG);
                    out.append_child(node_out, empty_p);
                    ctx.buffers.mark_inserted_for(TC_TAG);
                }
            }

            // Track the latest run properties as the style template for
            // generated hyperlinks.
            if tag == Some(RPR_TAG) {
                ctx.text_run_props_node = Some(node_out);
            }
            if tag == Some(R_TAG) {
                ctx.text_run_props_node = None;
            }
        }

        // Node creation. Created nodes may still be elided later, e.g. a
        // paragraph that turns out to contain only a command.
        if mv == Move::Down || mv == Move::Side {
            if mv == Move::Side {
                node_out = out
                    .parent(node_out)
                    .ok_or_else(|| ReportError::template_syntax("output node has no parent"))?;
            }

            if let Some(tag) = tpl.tag(node_in) {
                ctx.buffers.reset(tag);
            }

            let new_node = out.import_shallow(tpl, node_in);
            out.append_child(node_out, new_node);

            // Fresh ids for drawing/shape anchors copied out of loops.
            if !ctx.is_exploring()
                && matches!(tpl.tag(node_in), Some(DOCPR_TAG | VSHAPE_TAG))
            {
                update_id(&mut out, new_node, ctx);
            }

            let in_w_t = tpl.is_text(node_in)
                && tpl
                    .parent(node_in)
                    .is_some_and(|p| tpl.tag(p) == Some(T_TAG));
            if in_w_t {
                match process_text(data, tpl, node_in, ctx, &mut out) {
                    Ok(result) => out.set_text(new_node, result),
                    Err(err) => {
                        if fail_fast {
                            return Err(err);
                        }
                        errors.push(err);
                    }
                }
            }

            node_out = new_node;
        }

        // Rewind the output cursor to the loop's level.
        if mv == Move::Jump {
            while delta_jump > 0 {
                node_out = out
                    .parent(node_out)
                    .ok_or_else(|| ReportError::template_syntax("output node has no parent"))?;
                delta_jump -= 1;
            }
        }
    }

    // Post-walk consistency.
    if ctx.g_cnt_if != ctx.g_cnt_end_if {
        if fail_fast {
            return Err(ReportError::IncompleteConditional);
        }
        errors.push(ReportError::IncompleteConditional);
    }
    if let Some(unterminated) = ctx.loops.iter().rev().find(|l| !l.is_if) {
        let err = ReportError::UnterminatedFor {
            var_name: unterminated.var_name.clone(),
        };
        if fail_fast {
            return Err(err);
        }
        errors.push(err);
    }

    Ok(ReportOutput {
        report: out,
        images: std::mem::take(&mut ctx.images),
        links: std::mem::take(&mut ctx.links),
        htmls: std::mem::take(&mut ctx.htmls),
        errors,
    })
}

/// Split a text node's content into alternating literal/command segments and
/// feed them through the dispatcher, returning the text to emit.
fn process_text(
    data: &ReportData,
    tpl: &mut Tree,
    node: NodeId,
    ctx: &mut Context,
    out: &mut Tree,
) -> Result<String> {
    let text = match tpl.text(node) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return Ok(String::new()),
    };
    let delimiters = ctx.options.cmd_delimiter.clone();
    let fail_fast = ctx.options.fail_fast;

    let segments: Vec<String> = text
        .split(delimiters.open.as_str())
        .flat_map(|seg| seg.split(delimiters.close.as_str()))
        .map(str::to_string)
        .collect();

    let mut out_text = String::new();
    let mut errors: Vec<ReportError> = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            // The delimiters themselves count as command text for the
            // container elision decision.
            ctx.buffers.append(&delimiters.open, true, false);
        }

        if ctx.f_cmd {
            ctx.cmd.push_str(segment);
            ctx.buffers.append(segment, true, false);
        } else if !ctx.is_exploring() {
            // Literal text suppressed by an exploration pass must not count
            // against container elision either, or a paragraph holding only
            // a falsy conditional would survive as an empty husk.
            out_text.push_str(segment);
            ctx.buffers.append(segment, false, false);
        }

        if idx < segments.len() - 1 {
            if ctx.f_cmd {
                match process_cmd(data, tpl, node, ctx, out) {
                    Ok(CmdOutput::Text(cmd_result)) => {
                        out_text.push_str(&cmd_result);
                        ctx.buffers.append(&cmd_result, false, true);
                    }
                    Ok(CmdOutput::Ignore) => {}
                    Err(err) => {
                        if fail_fast {
                            return Err(err);
                        }
                        errors.push(err);
                    }
                }
            }
            ctx.f_cmd = !ctx.f_cmd;
        }
    }

    match errors.len() {
        0 => Ok(out_text),
        1 => Err(errors.remove(0)),
        _ => Err(ReportError::Multiple(errors)),
    }
}

/// Overwrite the node's `id` attribute with a fresh unique value.
fn update_id(out: &mut Tree, node: NodeId, ctx: &mut Context) {
    ctx.image_and_shape_id_increment += 1;
    out.set_attr(node, "id", ctx.image_and_shape_id_increment.to_string());
}
