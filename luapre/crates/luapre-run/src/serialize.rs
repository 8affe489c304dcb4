//! Lua value serialization.
//!
//! Renders a runtime value as Lua literal source text that evaluates back
//! to an equal value. Table output is deterministic: the array part comes
//! first, then the remaining entries sorted by their `tostring` key.

use mlua::{Table, Value};
use thiserror::Error;

use luapre_util::lua::{format_number, is_identifier, is_reserved, quote_bytes};

/// Recursion limit for nested tables. Cyclic tables hit this instead of
/// overflowing the stack.
const MAX_DEPTH: usize = 100;

/// A value shape the serializer cannot represent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    #[error("Table keys cannot be tables.")]
    TableKey,

    #[error("Cannot serialize value of type '{0}'.")]
    Unsupported(String),

    #[error("Cannot serialize value: table is too deep.")]
    TooDeep,

    #[error("Cannot serialize value: {0}.")]
    Internal(String),
}

/// Serialize `value` as Lua source text.
///
/// With `debug` set, newlines inside string values become the
/// two-character `\n` escape instead of a backslash-newline continuation.
pub fn serialize(value: &Value, debug: bool) -> Result<String, SerializeError> {
    let mut out = String::new();
    write_value(&mut out, value, debug, 0)?;
    Ok(out)
}

fn write_value(
    out: &mut String,
    value: &Value,
    debug: bool,
    depth: usize,
) -> Result<(), SerializeError> {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => write_integer(out, *i),
        Value::Number(n) => write_number(out, *n),
        Value::String(s) => out.push_str(&quote_bytes(s.as_bytes(), debug)),
        Value::Table(t) => write_table(out, t, debug, depth)?,
        other => return Err(SerializeError::Unsupported(other.type_name().to_string())),
    }
    Ok(())
}

/// Negative numbers get a leading space so the rendered form cannot fuse
/// with a preceding `-` into a comment.
fn write_integer(out: &mut String, i: i64) {
    if i < 0 {
        out.push(' ');
    }
    out.push_str(&i.to_string());
}

fn write_number(out: &mut String, n: f64) {
    if n.is_nan() {
        out.push_str("0/0");
    } else if n == f64::INFINITY {
        out.push_str("math.huge");
    } else if n == f64::NEG_INFINITY {
        out.push_str(" -math.huge");
    } else if n == 0.0 {
        // Erases the sign of -0.
        out.push('0');
    } else {
        if n < 0.0 {
            out.push(' ');
        }
        out.push_str(&format_number(n));
    }
}

fn write_table(
    out: &mut String,
    table: &Table,
    debug: bool,
    depth: usize,
) -> Result<(), SerializeError> {
    if depth >= MAX_DEPTH {
        return Err(SerializeError::TooDeep);
    }
    out.push('{');
    let mut first = true;

    // Array part: consecutive integer indices from 1.
    let mut len = 0i64;
    loop {
        let v: Value = table
            .raw_get(len + 1)
            .map_err(|e| SerializeError::Internal(e.to_string()))?;
        if matches!(v, Value::Nil) {
            break;
        }
        if !first {
            out.push(',');
        }
        first = false;
        write_value(out, &v, debug, depth + 1)?;
        len += 1;
    }

    // Remaining entries, sorted by the key's string form.
    let mut entries: Vec<(String, String)> = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair.map_err(|e| SerializeError::Internal(e.to_string()))?;
        if let Value::Integer(i) = key {
            if i >= 1 && i <= len {
                continue;
            }
        }
        if matches!(key, Value::Table(_)) {
            return Err(SerializeError::TableKey);
        }
        let sort_key = key_to_string(&key)?;
        let mut rendered = String::new();
        write_key(&mut rendered, &key, debug, depth)?;
        write_value(&mut rendered, &value, debug, depth + 1)?;
        entries.push((sort_key, rendered));
    }
    entries.sort();
    for (_, rendered) in entries {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&rendered);
    }

    out.push('}');
    Ok(())
}

/// Emit `k=` for keys usable as bare names, `[expr]=` for everything else.
fn write_key(
    out: &mut String,
    key: &Value,
    debug: bool,
    depth: usize,
) -> Result<(), SerializeError> {
    if let Value::String(s) = key {
        if let Ok(text) = s.to_str() {
            if is_identifier(text) && !is_reserved(text) {
                out.push_str(text);
                out.push('=');
                return Ok(());
            }
        }
    }
    out.push('[');
    write_value(out, key, debug, depth + 1)?;
    out.push_str("]=");
    Ok(())
}

/// The `tostring` form of a key, used for deterministic ordering.
fn key_to_string(key: &Value) -> Result<String, SerializeError> {
    match key {
        Value::String(s) => Ok(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::Boolean(b) => Ok(b.to_string()),
        other => Err(SerializeError::Unsupported(other.type_name().to_string())),
    }
}
