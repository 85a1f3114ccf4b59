//! Loop and conditional engine.
//!
//! `FOR` and `IF` share one stack: an `IF` is a loop whose iteration set is
//! `[1]` (truthy) or `[]` (falsy). Every loop body is first traversed in an
//! exploration pass (`idx = None`) that emits nothing, so the walker reaches
//! the matching `END` marker and balances state even for empty bodies.

use rapport_xml::{NodeId, Tree};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::context::{Context, LoopStatus};
use crate::error::{ReportError, Result};
use crate::eval::run_and_get_value;
use crate::tags::{P_TAG, TR_TAG};
use crate::value::{ReportData, Value};

static FOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(\S+)\s+IN\s+(.+)$").unwrap());

/// Handle a `FOR var IN expr` or `IF expr` command on `node`.
pub(crate) fn process_for_if(
    data: &ReportData,
    tpl: &mut Tree,
    node: NodeId,
    ctx: &mut Context,
    cmd: &str,
    cmd_name: &str,
    cmd_rest: &str,
) -> Result<()> {
    let is_if = cmd_name == "IF";

    let (var_name, for_expr) = if is_if {
        // Anonymous IF anchors get a stable generated name on first visit.
        if tpl.name(node).is_none() {
            tpl.set_name(node, format!("__if_{}", ctx.g_cnt_if));
            ctx.g_cnt_if += 1;
        }
        (tpl.name(node).unwrap_or_default().to_string(), None)
    } else {
        let caps = FOR_RE
            .captures(cmd_rest)
            .ok_or_else(|| ReportError::invalid_command("Invalid FOR command", cmd))?;
        (caps[1].to_string(), Some(caps[2].to_string()))
    };

    // Re-entering the same loop on a subsequent iteration is a no-op.
    let already_on_top = ctx
        .cur_loop()
        .is_some_and(|l| l.var_name == var_name);
    if already_on_top {
        log_loop(ctx);
        return Ok(());
    }

    if is_if
        && ctx
            .loops
            .iter()
            .any(|l| l.is_if && l.var_name == var_name)
    {
        return Err(ReportError::invalid_command("Duplicate IF statement", cmd));
    }

    let parent_is_exploring = ctx.cur_loop().is_some_and(|l| l.idx.is_none());
    let loop_over: Vec<Value> = if parent_is_exploring {
        // Never evaluate inside an exploration pass.
        Vec::new()
    } else if is_if {
        let condition = run_and_get_value(cmd_rest, ctx, data)?;
        if condition.is_truthy() {
            vec![Value::Int(1)]
        } else {
            Vec::new()
        }
    } else {
        let expr = for_expr.unwrap_or_default();
        let items = run_and_get_value(&expr, ctx, data).map_err(|err| {
            ReportError::invalid_command(
                format!("Invalid FOR command (can only iterate over Array) {expr}: {err}"),
                cmd,
            )
        })?;
        match items {
            Value::List(items) => items,
            other => {
                return Err(ReportError::invalid_command(
                    format!("Invalid FOR command (can only iterate over Array) {expr}: {other:?}"),
                    cmd,
                ))
            }
        }
    };

    ctx.loops.push(LoopStatus {
        ref_node: node,
        ref_node_level: ctx.level,
        var_name,
        loop_over,
        idx: None,
        is_if,
    });
    log_loop(ctx);
    Ok(())
}

/// Handle an `END-FOR var` or `END-IF` command on `node`.
pub(crate) fn process_end_for_if(
    tpl: &mut Tree,
    node: NodeId,
    ctx: &mut Context,
    cmd: &str,
    cmd_name: &str,
    cmd_rest: &str,
) -> Result<()> {
    let is_if = cmd_name == "END-IF";

    let Some(cur) = ctx.cur_loop() else {
        let context_type = if is_if { "IF statement" } else { "FOR loop" };
        return Err(ReportError::invalid_command(
            format!("Unexpected {cmd_name} outside of {context_type} context"),
            cmd,
        ));
    };
    if is_if && !cur.is_if {
        return Err(ReportError::invalid_command(
            "END-IF found in FOR loop context",
            cmd,
        ));
    }
    let cur_var_name = cur.var_name.clone();

    // Reset conditional bookkeeping for the enclosing paragraph or row.
    match find_parent_p_or_tr(tpl, node).and_then(|p| tpl.tag(p)) {
        Some(P_TAG) => {
            ctx.p_if_check.remove(&node);
        }
        Some(TR_TAG) => {
            ctx.tr_if_check.remove(&node);
        }
        _ => {}
    }

    // First visit of an END-IF: adopt the name its IF was given.
    if is_if && tpl.name(node).is_none() {
        tpl.set_name(node, cur_var_name.clone());
        ctx.g_cnt_end_if += 1;
    }

    // END-FOR must name the loop it closes; a name that sits deeper in the
    // stack is an over-closed inner scope and is tolerated, anything else
    // is an error.
    if !is_if && cur_var_name != cmd_rest {
        if ctx.loops.iter().any(|l| l.var_name == cmd_rest) {
            debug!(
                var = cmd_rest,
                expecting = %cur_var_name,
                "ignoring over-closed END-FOR"
            );
            return Ok(());
        }
        return Err(ReportError::invalid_command("Invalid command", cmd));
    }

    let cur = ctx
        .cur_loop_mut()
        .ok_or_else(|| ReportError::template_syntax("loop stack emptied unexpectedly"))?;
    let next_idx = cur.idx.map_or(0, |i| i + 1);
    if next_idx < cur.loop_over.len() {
        // Advance to the next iteration and ask the walker to jump back.
        let next_item = cur.loop_over[next_idx].clone();
        let var_name = cur.var_name.clone();
        let is_for = !cur.is_if;
        cur.idx = Some(next_idx);
        if is_for {
            ctx.vars.insert(format!("${var_name}"), next_item);
            ctx.vars
                .insert("$idx".to_string(), Value::Int(next_idx as i64));
        }
        ctx.f_jump = true;
    } else {
        ctx.loops.pop();
    }

    Ok(())
}

/// The nearest ancestor paragraph, or the row containing it when the
/// paragraph sits directly in a table row.
fn find_parent_p_or_tr(tpl: &Tree, node: NodeId) -> Option<NodeId> {
    let mut current = tpl.parent(node);
    while let Some(id) = current {
        if tpl.tag(id) == Some(P_TAG) {
            let grandparent = tpl.parent(id);
            if let Some(gp) = grandparent {
                if tpl.tag(gp) == Some(TR_TAG) {
                    return Some(gp);
                }
            }
            return Some(id);
        }
        current = tpl.parent(id);
    }
    None
}

fn log_loop(ctx: &Context) {
    let Some(cur) = ctx.cur_loop() else { return };
    let kind = if cur.is_if { "IF" } else { "FOR" };
    let idx = cur
        .idx
        .map_or("EXPLORATION".to_string(), |i| (i + 1).to_string());
    debug!(
        kind,
        depth = ctx.loops.len() - 1,
        var = %cur.var_name,
        idx = %idx,
        total = cur.loop_over.len(),
        "loop state"
    );
}
