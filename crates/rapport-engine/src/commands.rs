//! Command normalization and dispatch.
//!
//! `get_command` rewrites the raw text between delimiters into canonical
//! `NAME rest` form (alias expansion, `=` and `!` shorthands, bare-expression
//! fallback to `INS`); `process_cmd` then dispatches on the name.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rapport_xml::{NodeId, Tree};
use regex::Regex;
use tracing::debug;

use crate::artifacts::{process_html, process_image, process_link};
use crate::context::Context;
use crate::error::{ReportError, Result};
use crate::eval::run_and_get_value;
use crate::loops::{process_end_for_if, process_for_if};
use crate::value::{LinkPars, ReportData, Value};

/// Commands the dispatcher knows. Anything else is rewritten to `INS` by
/// `get_command` or rejected.
pub(crate) const BUILT_IN_COMMANDS: [&str; 10] = [
    "CMD_NODE", "ALIAS", "FOR", "END-FOR", "IF", "END-IF", "INS", "IMAGE", "LINK", "HTML",
];

static ALIAS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S+)\s*(.*)").unwrap());

/// The dispatcher's verdict on one command.
#[derive(Debug, PartialEq)]
pub(crate) enum CmdOutput {
    /// Append this text to the output.
    Text(String),
    /// The command produced no textual output.
    Ignore,
}

fn not_built_in(cmd: &str) -> bool {
    let upper = cmd.to_uppercase();
    !BUILT_IN_COMMANDS.iter().any(|b| upper.starts_with(b))
}

/// Normalize a raw command string.
pub(crate) fn get_command(
    command: &str,
    shorthands: &HashMap<String, String>,
    fix_smart_quotes: bool,
) -> Result<String> {
    get_command_at_depth(command, shorthands, fix_smart_quotes, 0)
}

const MAX_ALIAS_DEPTH: usize = 10;

fn get_command_at_depth(
    command: &str,
    shorthands: &HashMap<String, String>,
    fix_smart_quotes: bool,
    depth: usize,
) -> Result<String> {
    let mut cmd = command.trim().to_string();
    let Some(first) = cmd.chars().next() else {
        return Err(ReportError::invalid_command("Empty command", command));
    };

    if first == '*' {
        if depth >= MAX_ALIAS_DEPTH {
            return Err(ReportError::invalid_command("Alias cycle", command));
        }
        let alias = cmd[1..].to_string();
        let expanded = shorthands
            .get(&alias)
            .cloned()
            .ok_or_else(|| ReportError::invalid_command("Unknown alias", &alias))?;
        debug!(cmd = %expanded, "alias for command");
        // The alias body is itself a raw command; shorthands like a leading
        // `=` still apply to it.
        return get_command_at_depth(&expanded, shorthands, fix_smart_quotes, depth + 1);
    } else if first == '=' {
        cmd = format!("INS {}", &cmd[1..]);
    } else if first == '!' {
        cmd = format!("EXEC {}", &cmd[1..]);
    } else if not_built_in(&cmd) {
        cmd = format!("INS {cmd}");
    }

    if fix_smart_quotes {
        cmd = cmd
            .chars()
            .map(|c| match c {
                '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
                '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
                other => other,
            })
            .collect();
    }

    Ok(cmd.trim().to_string())
}

/// Split a normalized command into its uppercased name and the remainder.
pub(crate) fn split_command(cmd: &str) -> (String, String) {
    let cmd = cmd.trim();
    let mut parts = cmd.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_uppercase();
    let rest = parts.next().unwrap_or_default().trim().to_string();
    (name, rest)
}

/// Execute the command accumulated in `ctx.cmd` against `node`.
pub(crate) fn process_cmd(
    data: &ReportData,
    tpl: &mut Tree,
    node: NodeId,
    ctx: &mut Context,
    out: &mut Tree,
) -> Result<CmdOutput> {
    let raw = std::mem::take(&mut ctx.cmd);
    let cmd = get_command(&raw, &ctx.shorthands, ctx.options.fix_smart_quotes)?;
    let (cmd_name, rest) = split_command(&cmd);

    if cmd_name != "CMD_NODE" {
        debug!(cmd = %cmd, "processing command");
    }

    match cmd_name.as_str() {
        // Sentinel left by the preprocessor in place of consumed text.
        _ if cmd_name == "CMD_NODE" || rest == "CMD_NODE" => Ok(CmdOutput::Ignore),

        // ALIAS name rest-of-command
        "ALIAS" => {
            if let Some(caps) = ALIAS_RE.captures(&rest) {
                ctx.shorthands
                    .insert(caps[1].to_string(), caps[2].to_string());
                debug!(alias = &caps[1], command = &caps[2], "defined alias");
            }
            Ok(CmdOutput::Ignore)
        }

        // FOR var IN expr | IF expr
        "FOR" | "IF" => {
            process_for_if(data, tpl, node, ctx, &cmd, &cmd_name, &rest)?;
            Ok(CmdOutput::Ignore)
        }

        // END-FOR var | END-IF
        "END-FOR" | "END-IF" => {
            process_end_for_if(tpl, node, ctx, &cmd, &cmd_name, &rest)?;
            Ok(CmdOutput::Ignore)
        }

        // INS expr
        "INS" => {
            if ctx.is_exploring() {
                return Ok(CmdOutput::Ignore);
            }
            let value = run_and_get_value(&rest, ctx, data)?;
            let mut text = value.to_string();
            if ctx.options.process_line_breaks {
                let lit = &ctx.options.literal_xml_delimiter;
                let separator = if ctx.options.process_line_breaks_as_new_text {
                    format!("{lit}</w:t><w:br/><w:t xml:space=\"preserve\">{lit}")
                } else {
                    format!("{lit}<w:br/>{lit}")
                };
                text = text.split('\n').collect::<Vec<_>>().join(&separator);
            }
            Ok(CmdOutput::Text(text))
        }

        // IMAGE expr
        "IMAGE" => {
            if !ctx.is_exploring() {
                let value = run_and_get_value(&rest, ctx, data)?;
                match value {
                    Value::Image(pars) => process_image(ctx, out, &pars)?,
                    _ => {
                        return Err(ReportError::Image {
                            message: format!("not an image as result of {rest}"),
                        })
                    }
                }
            }
            Ok(CmdOutput::Ignore)
        }

        // LINK expr
        "LINK" => {
            if !ctx.is_exploring() {
                let value = run_and_get_value(&rest, ctx, data)?;
                let pars = as_link(&value).ok_or_else(|| ReportError::Link {
                    message: format!("not a link as result of {rest}"),
                })?;
                process_link(ctx, out, &pars)?;
            }
            Ok(CmdOutput::Ignore)
        }

        // HTML expr
        "HTML" => {
            if ctx.is_exploring() {
                return Ok(CmdOutput::Ignore);
            }
            let value = run_and_get_value(&rest, ctx, data)?;
            process_html(ctx, out, data, &value.to_string());
            // Empty output, but output nonetheless: the enclosing paragraph
            // must survive to be replaced by the altChunk.
            Ok(CmdOutput::Text(String::new()))
        }

        _ => Err(ReportError::CommandSyntax { command: cmd }),
    }
}

/// `LINK` accepts either a `LinkPars` value or a mapping with a `url` and
/// optional `label`.
fn as_link(value: &Value) -> Option<LinkPars> {
    match value {
        Value::Link(pars) => Some(pars.clone()),
        Value::Map(map) => {
            let url = match map.get("url") {
                Some(Value::Str(url)) => url.clone(),
                _ => return None,
            };
            let label = match map.get("label") {
                Some(Value::Str(label)) => label.clone(),
                _ => String::new(),
            };
            Some(LinkPars { url, label })
        }
        _ => None,
    }
}
