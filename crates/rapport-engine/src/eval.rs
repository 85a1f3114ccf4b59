//! Expression evaluation.
//!
//! `run_and_get_value` resolves an expression in three stages: comparison
//! operators first, then function calls, then atoms (variables, literals,
//! dotted paths). Comparison operands recurse; function arguments are atoms.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::error::{ReportError, Result};
use crate::value::{ReportData, Value};

/// Probed in this order, so two-character operators win over their
/// one-character prefixes.
const COMPARISON_OPS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

static FN_CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*\(([^)]*)\)").unwrap());

/// Evaluate an expression against the loop variables and report data.
pub(crate) fn run_and_get_value(text: &str, ctx: &Context, data: &ReportData) -> Result<Value> {
    // Comparison: split once on the first operator occurrence; chains like
    // `a==b==c` are never re-scanned.
    for op in COMPARISON_OPS {
        let Some(pos) = text.find(op) else { continue };
        let left = run_and_get_value(text[..pos].trim(), ctx, data)?;
        let right = run_and_get_value(text[pos + op.len()..].trim(), ctx, data)?;
        return compare(op, &left, &right, text);
    }

    if let Some((name, args)) = parse_function_call(text) {
        return run_function(&name, &args, ctx, data);
    }

    if let Some(value) = get_value(text, ctx, data) {
        return Ok(value);
    }

    let err = ReportError::KeyNotFound {
        key: text.to_string(),
    };
    match &ctx.options.error_handler {
        Some(handler) => Ok(handler(&err, text)),
        None => Err(err),
    }
}

#[allow(clippy::float_cmp)] // comparisons are the user's, not an epsilon test
fn compare(op: &str, left: &Value, right: &Value, text: &str) -> Result<Value> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => {
            let result = match op {
                "==" => l == r,
                "!=" => l != r,
                ">=" => l >= r,
                "<=" => l <= r,
                ">" => l > r,
                "<" => l < r,
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        _ => match op {
            "==" => Ok(Value::Bool(left == right)),
            "!=" => Ok(Value::Bool(left != right)),
            _ => Err(ReportError::invalid_command(
                "Cannot order non-numeric values",
                text,
            )),
        },
    }
}

/// Match `identifier(args)` and split the arguments on commas that are not
/// inside single or double quotes (smart quotes included, folded to `'`).
pub(crate) fn parse_function_call(text: &str) -> Option<(String, Vec<String>)> {
    let caps = FN_CALL_RE.captures(text)?;
    let name = caps[1].to_string();

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for c in caps[2].chars() {
        match c {
            '\'' | '"' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' => {
                current.push('\'');
                in_string = !in_string;
            }
            ',' if !in_string => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());

    Some((name, args))
}

fn run_function(name: &str, args: &[String], ctx: &Context, data: &ReportData) -> Result<Value> {
    let function = ctx
        .options
        .functions
        .get(name)
        .ok_or_else(|| ReportError::FunctionNotFound {
            name: name.to_string(),
        })?;

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match get_value(arg, ctx, data) {
            Some(value) => values.push(value),
            None => {
                let err = ReportError::KeyNotFound {
                    key: arg.to_string(),
                };
                match &ctx.options.error_handler {
                    Some(handler) => return Ok(handler(&err, arg)),
                    None => return Err(err),
                }
            }
        }
    }
    Ok(function(&values))
}

/// Resolve an atom: `$`-variable, quoted literal, numeric literal, or a
/// dotted path into the report data.
pub(crate) fn get_value(key: &str, ctx: &Context, data: &ReportData) -> Option<Value> {
    let key = key.trim();
    if key.starts_with('$') {
        return get_value_from(key, &ctx.vars);
    }
    if key.len() >= 2 {
        let quoted = (key.starts_with('\'') && key.ends_with('\''))
            || (key.starts_with('`') && key.ends_with('`'));
        if quoted {
            return Some(Value::Str(key[1..key.len() - 1].to_string()));
        }
    }
    if let Ok(i) = key.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(f) = key.parse::<f64>() {
        return Some(Value::Float(f));
    }
    get_value_from(key, &data.0)
}

/// Walk a dotted path through nested mappings. A `?` suffix on a segment
/// makes that lookup optional: a miss resolves to the empty string instead
/// of a failure.
pub(crate) fn get_value_from(key: &str, source: &HashMap<String, Value>) -> Option<Value> {
    let segments: Vec<&str> = key.split('.').collect();
    let mut map = source;
    for (i, segment) in segments.iter().enumerate() {
        let (name, optional) = match segment.strip_suffix('?') {
            Some(stripped) => (stripped, true),
            None => (*segment, false),
        };
        match map.get(name) {
            Some(value) if i == segments.len() - 1 => return Some(value.clone()),
            Some(Value::Map(inner)) => map = inner,
            Some(_) | None => {
                // Intermediate link missing or not a mapping.
                return optional.then(|| Value::Str(String::new()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CreateReportOptions;
    use std::sync::Arc;

    fn ctx() -> Context {
        Context::new(CreateReportOptions::default(), 0)
    }

    fn data() -> ReportData {
        let mut data = ReportData::new();
        data.insert("name", "World");
        data.insert("n", 3i64);
        data.insert(
            "customer",
            Value::Map(HashMap::from([(
                "addr".to_string(),
                Value::Map(HashMap::from([(
                    "city".to_string(),
                    Value::Str("Lyon".to_string()),
                )])),
            )])),
        );
        data
    }

    #[test]
    fn test_atom_lookup() {
        assert_eq!(
            run_and_get_value("name", &ctx(), &data()).unwrap(),
            Value::Str("World".to_string())
        );
    }

    #[test]
    fn test_dotted_path() {
        assert_eq!(
            run_and_get_value("customer.addr.city", &ctx(), &data()).unwrap(),
            Value::Str("Lyon".to_string())
        );
    }

    #[test]
    fn test_missing_key_fails() {
        assert!(matches!(
            run_and_get_value("missing", &ctx(), &data()),
            Err(ReportError::KeyNotFound { key }) if key == "missing"
        ));
    }

    #[test]
    fn test_optional_suffix_never_fails() {
        assert_eq!(
            run_and_get_value("missing?", &ctx(), &data()).unwrap(),
            Value::Str(String::new())
        );
        assert_eq!(
            run_and_get_value("customer.phone?.prefix", &ctx(), &data()).unwrap(),
            Value::Str(String::new())
        );
    }

    #[test]
    fn test_intermediate_non_map() {
        // `name` exists but is not a mapping; without `?` the path fails.
        assert!(run_and_get_value("name.inner", &ctx(), &data()).is_err());
        assert_eq!(
            run_and_get_value("name.inner?", &ctx(), &data()).unwrap(),
            Value::Str(String::new())
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            get_value("'quoted'", &ctx(), &data()),
            Some(Value::Str("quoted".to_string()))
        );
        assert_eq!(get_value("42", &ctx(), &data()), Some(Value::Int(42)));
        assert_eq!(get_value("2.5", &ctx(), &data()), Some(Value::Float(2.5)));
    }

    #[test]
    fn test_vars_lookup() {
        let mut ctx = ctx();
        ctx.vars
            .insert("$item".to_string(), Value::Str("x".to_string()));
        ctx.vars.insert("$idx".to_string(), Value::Int(2));
        assert_eq!(
            get_value("$item", &ctx, &data()),
            Some(Value::Str("x".to_string()))
        );
        assert_eq!(get_value("$idx", &ctx, &data()), Some(Value::Int(2)));
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = ctx();
        let data = data();
        assert_eq!(
            run_and_get_value("n >= 3", &ctx, &data).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            run_and_get_value("n > 3", &ctx, &data).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            run_and_get_value("n != 2", &ctx, &data).unwrap(),
            Value::Bool(true)
        );
        // String numbers coerce.
        assert_eq!(
            run_and_get_value("'10' > 9", &ctx, &data).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            run_and_get_value("name == 'World'", &ctx(), &data()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            run_and_get_value("name != 'World'", &ctx(), &data()).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_non_numeric_ordering_rejected() {
        assert!(run_and_get_value("name > 'Abc'", &ctx(), &data()).is_err());
    }

    #[test]
    fn test_function_call_parsing() {
        let (name, args) = parse_function_call("join(items, ', ')").unwrap();
        assert_eq!(name, "join");
        assert_eq!(args, vec!["items", "', '"]);

        // Comma inside quotes does not split.
        let (_, args) = parse_function_call("join(items, 'a,b')").unwrap();
        assert_eq!(args, vec!["items", "'a,b'"]);

        assert!(parse_function_call("no call here").is_none());
    }

    #[test]
    fn test_builtin_function_evaluation() {
        let mut data = data();
        data.insert(
            "items",
            Value::List(vec![
                Value::Str("a".to_string()),
                Value::Str("b".to_string()),
            ]),
        );
        assert_eq!(
            run_and_get_value("len(items)", &ctx(), &data).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            run_and_get_value("join(items, '-')", &ctx(), &data).unwrap(),
            Value::Str("a-b".to_string())
        );
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(
            run_and_get_value("nope(1)", &ctx(), &data()),
            Err(ReportError::FunctionNotFound { name }) if name == "nope"
        ));
    }

    #[test]
    fn test_error_handler_substitutes() {
        let mut options = CreateReportOptions::default();
        options.error_handler = Some(Arc::new(|_err, _raw| Value::Str("N/A".to_string())));
        let ctx = Context::new(options, 0);
        assert_eq!(
            run_and_get_value("missing", &ctx, &data()).unwrap(),
            Value::Str("N/A".to_string())
        );
    }
}
