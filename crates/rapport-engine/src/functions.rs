//! Built-in template functions.

use std::sync::Arc;

use crate::options::Functions;
use crate::value::Value;

/// `len(x)`: element count of a sequence, mapping or string; `-1` for
/// anything else.
fn length(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::List(items)) => Value::Int(items.len() as i64),
        Some(Value::Map(map)) => Value::Int(map.len() as i64),
        Some(Value::Str(s)) => Value::Int(s.chars().count() as i64),
        _ => Value::Int(-1),
    }
}

/// `join(seq, sep)`: concatenate a sequence of strings with a separator;
/// empty string on any type mismatch.
fn join(args: &[Value]) -> Value {
    let (Some(Value::List(items)), Some(Value::Str(sep))) = (args.first(), args.get(1)) else {
        return Value::Str(String::new());
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Str(s) => parts.push(s.as_str()),
            _ => return Value::Str(String::new()),
        }
    }
    Value::Str(parts.join(sep))
}

/// The built-in function table, later overlaid with the caller's functions.
pub(crate) fn built_ins() -> Functions {
    let mut table = Functions::new();
    table.insert(
        "len".to_string(),
        Arc::new(|args: &[Value]| length(args)) as crate::options::Function,
    );
    table.insert(
        "join".to_string(),
        Arc::new(|args: &[Value]| join(args)) as crate::options::Function,
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::Str(s.to_string())).collect())
    }

    #[test]
    fn test_len() {
        assert_eq!(length(&[strs(&["a", "b"])]), Value::Int(2));
        assert_eq!(length(&[Value::Str("abc".to_string())]), Value::Int(3));
        assert_eq!(length(&[Value::Map(Default::default())]), Value::Int(0));
        assert_eq!(length(&[Value::Int(5)]), Value::Int(-1));
        assert_eq!(length(&[]), Value::Int(-1));
    }

    #[test]
    fn test_join() {
        assert_eq!(
            join(&[strs(&["a", "b", "c"]), Value::Str(",".to_string())]),
            Value::Str("a,b,c".to_string())
        );
        assert_eq!(
            join(&[strs(&[]), Value::Str(",".to_string())]),
            Value::Str(String::new())
        );
        // Non-string element
        assert_eq!(
            join(&[
                Value::List(vec![Value::Int(1)]),
                Value::Str(",".to_string())
            ]),
            Value::Str(String::new())
        );
        // Missing separator
        assert_eq!(join(&[strs(&["a"])]), Value::Str(String::new()));
    }

    #[test]
    fn test_join_len_law() {
        // len(join(xs, ",")) == len(join(xs, "")) + max(0, len(xs) - 1)
        for xs in [vec![], vec!["a"], vec!["ab", "c"], vec!["x", "y", "z"]] {
            let with_sep = match join(&[strs(&xs), Value::Str(",".to_string())]) {
                Value::Str(s) => s.chars().count(),
                _ => unreachable!(),
            };
            let without = match join(&[strs(&xs), Value::Str(String::new())]) {
                Value::Str(s) => s.chars().count(),
                _ => unreachable!(),
            };
            assert_eq!(with_sep, without + xs.len().saturating_sub(1));
        }
    }
}
