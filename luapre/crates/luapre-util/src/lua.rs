//! Lua text helpers.
//!
//! Small pure functions over Lua source text: the reserved-word table, the
//! bare-identifier test, string-literal quoting and number formatting.
//! The transpiler and the value serializer both quote through here, so a
//! verbatim chunk and a serialized string value use identical escape
//! conventions.

/// Lua's reserved words, sorted.
///
/// An identifier-shaped lexeme matching one of these is a keyword, and a
/// table key matching one of these cannot use the bare `k=v` form.
pub const RESERVED_WORDS: [&str; 21] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Whether `word` is a Lua reserved word.
pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.binary_search(&word).is_ok()
}

/// Whether `s` is shaped like a Lua identifier: `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Reserved words pass this test; callers that need a usable bare name must
/// also check [`is_reserved`].
pub fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Quote `s` as a double-quoted Lua string literal.
///
/// Escapes follow Lua conventions: `\a \b \f \n \r \t \v \\ \"` plus
/// `\ddd` for remaining control characters. Newlines are rendered as a
/// backslash followed by a real newline, which keeps a multi-line literal's
/// physical lines aligned with the text it encodes; with `escape_newlines`
/// they become the two-character `\n` escape instead.
///
/// # Examples
///
/// ```
/// use luapre_util::lua::quote_string;
///
/// assert_eq!(quote_string("a\"b", false), r#""a\"b""#);
/// assert_eq!(quote_string("a\nb", true), r#""a\nb""#);
/// assert_eq!(quote_string("a\nb", false), "\"a\\\nb\"");
/// ```
pub fn quote_string(s: &str, escape_newlines: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        quote_char_into(&mut out, c, escape_newlines);
    }
    out.push('"');
    out
}

/// Quote raw bytes as a double-quoted Lua string literal.
///
/// Like [`quote_string`], but bytes outside the ASCII range are written as
/// `\ddd` escapes so the result is always valid UTF-8 regardless of the
/// input encoding. Decoding the literal in Lua yields the original bytes.
pub fn quote_bytes(bytes: &[u8], escape_newlines: bool) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        if b < 0x80 {
            quote_char_into(&mut out, b as char, escape_newlines);
        } else {
            out.push_str(&format!("\\{:03}", b));
        }
    }
    out.push('"');
    out
}

fn quote_char_into(out: &mut String, c: char, escape_newlines: bool) {
    match c {
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        '\n' => {
            if escape_newlines {
                out.push_str("\\n");
            } else {
                out.push('\\');
                out.push('\n');
            }
        }
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{7}' => out.push_str("\\a"),
        '\u{8}' => out.push_str("\\b"),
        '\u{b}' => out.push_str("\\v"),
        '\u{c}' => out.push_str("\\f"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\{:03}", c as u32)),
        c => out.push(c),
    }
}

/// Format a finite number the way Lua's default `tostring` would read back.
///
/// Integral values print without a fractional part; very large or very
/// small magnitudes switch to exponent notation. The result always
/// evaluates back to a bitwise-equal number.
pub fn format_number(n: f64) -> String {
    debug_assert!(n.is_finite());
    let magnitude = n.abs();
    if n != 0.0 && (magnitude >= 1e21 || magnitude < 1e-4) {
        format!("{:e}", n)
    } else {
        format!("{}", n)
    }
}
