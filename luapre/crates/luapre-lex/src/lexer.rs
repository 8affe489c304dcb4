//! Main lexer implementation.
//!
//! The lexer dispatches on the first character of each token and hands off
//! to one method per token class. Dispatch order resolves every ambiguity:
//! `--` wins over `-`, a well-formed `[=*[` opener wins over `[`, and the
//! multi-character operators are tried longest-first. Numeric literals are
//! matched against a fixed pattern list where the first match wins; the
//! exponent forms accept a leading `-` but not `+`, and hex floats are not
//! recognized (`0xFFp2` lexes as `0xFF` followed by the identifier `p2`).

use thiserror::Error;

use luapre_util::lua::is_reserved;

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind};

/// A fatal lexer error.
///
/// Each variant carries the 1-based byte offset of the offending token so
/// the driver can point a caret at it. There is no recovery: the first
/// error aborts the scan.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Malformed number.")]
    MalformedNumber { position: usize },

    #[error("Unfinished string.")]
    UnfinishedString { position: usize },

    #[error("Unfinished long string.")]
    UnfinishedLongString { position: usize },

    #[error("Unfinished long comment.")]
    UnfinishedLongComment { position: usize },

    #[error("Unknown character.")]
    UnknownCharacter { position: usize, character: char },
}

impl LexError {
    /// 1-based byte offset the error points at.
    pub fn position(&self) -> usize {
        match *self {
            LexError::MalformedNumber { position }
            | LexError::UnfinishedString { position }
            | LexError::UnfinishedLongString { position }
            | LexError::UnfinishedLongComment { position }
            | LexError::UnknownCharacter { position, .. } => position,
        }
    }
}

/// Tokenize an entire source string.
///
/// # Example
///
/// ```
/// use luapre_lex::{tokenize, TokenKind};
///
/// let tokens = tokenize("x = 1").unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
/// assert!(matches!(kinds[2], TokenKind::Punctuation));
/// assert!(matches!(kinds[4], TokenKind::Number(n) if *n == 1.0));
/// ```
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// The lexer. Scans left to right, producing exactly one token per step.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, LexError> {
        if self.cursor.is_at_end() {
            return Ok(None);
        }
        let start = self.cursor.position();
        let line = self.cursor.line();
        let kind = self.dispatch(start)?;
        Ok(Some(Token {
            kind,
            repr: self.cursor.slice_from(start),
            line,
            position: start + 1,
        }))
    }

    fn dispatch(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let c = self.cursor.current_char();
        if c == '_' || c.is_ascii_alphabetic() {
            Ok(self.lex_word())
        } else if c.is_ascii_digit() {
            self.lex_number(start)
        } else if c == '-' && self.cursor.char_at(1) == '-' {
            self.lex_comment(start)
        } else if c == '"' || c == '\'' {
            self.lex_short_string(start)
        } else if c == '[' && long_bracket_level(self.cursor.remaining()).is_some() {
            self.lex_long_string(start)
        } else if is_lua_space(c) {
            Ok(self.lex_whitespace())
        } else if c == '!' {
            Ok(self.lex_pp_entry())
        } else {
            self.lex_punctuation(start)
        }
    }

    /// An identifier or reserved word.
    fn lex_word(&mut self) -> TokenKind {
        let start = self.cursor.position();
        while is_ident_continue(self.cursor.current_char()) {
            self.cursor.advance();
        }
        if is_reserved(self.cursor.slice_from(start)) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        }
    }

    /// A numeric literal.
    ///
    /// Patterns are tried in a fixed order; the first match wins:
    /// `d+.d+e-?d+`, `d+e-?d+`, `0x` hex, `d+.d+`, `d+`.
    fn lex_number(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let rest = self.cursor.remaining();
        let len = match_dec_dot_exp(rest)
            .or_else(|| match_dec_exp(rest))
            .or_else(|| match_hex(rest))
            .or_else(|| match_dec_dot(rest))
            .or_else(|| match_dec(rest))
            .ok_or(LexError::MalformedNumber {
                position: start + 1,
            })?;
        let text = &rest[..len];
        let value = if let Some(hex) = text.strip_prefix("0x") {
            hex.chars()
                .fold(0f64, |acc, c| acc * 16.0 + c.to_digit(16).unwrap_or(0) as f64)
        } else {
            text.parse::<f64>().map_err(|_| LexError::MalformedNumber {
                position: start + 1,
            })?
        };
        self.cursor.advance_bytes(len);
        Ok(TokenKind::Number(value))
    }

    /// A comment: `--` then a string-like body.
    fn lex_comment(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.cursor.advance_bytes(2);
        match self.lex_stringlike() {
            Some((value, long)) => Ok(TokenKind::Comment { value, long }),
            None => Err(LexError::UnfinishedLongComment {
                position: start + 1,
            }),
        }
    }

    /// A long-bracket string: `[=*[ … ]=*]`.
    fn lex_long_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        match self.lex_stringlike() {
            Some((value, _)) => Ok(TokenKind::Str { value, long: true }),
            None => Err(LexError::UnfinishedLongString {
                position: start + 1,
            }),
        }
    }

    /// The string-like body shared by comments and long strings.
    ///
    /// On entry the cursor sits after the `--` (comments) or on the
    /// opening `[` (long strings). A well-formed long bracket reads to the
    /// matching closer with the same equal-sign count (`None` if the
    /// closer is missing). Anything else reads to end of line, leaving the
    /// `\r?\n` for the next token.
    fn lex_stringlike(&mut self) -> Option<(String, bool)> {
        let rest = self.cursor.remaining();
        if let Some(level) = long_bracket_level(rest) {
            let open_len = level + 2;
            let closing = format!("]{}]", "=".repeat(level));
            let idx = rest[open_len..].find(&closing)?;
            let interior = &rest[open_len..open_len + idx];
            let value = strip_leading_newline(interior).to_string();
            self.cursor.advance_bytes(open_len + idx + closing.len());
            Some((value, true))
        } else {
            let mut end = rest.find('\n').unwrap_or(rest.len());
            if rest[..end].ends_with('\r') {
                end -= 1;
            }
            let value = rest[..end].to_string();
            self.cursor.advance_bytes(end);
            Some((value, false))
        }
    }

    /// A short string delimited by `"` or `'`.
    ///
    /// A backslash always consumes the following character, whatever it
    /// is. Raw newlines are allowed in the representation; whether they
    /// survive to valid Lua is the output's problem, not the lexer's.
    fn lex_short_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let quote = self.cursor.current_char();
        self.cursor.advance();
        loop {
            if self.cursor.is_at_end() {
                return Err(LexError::UnfinishedString {
                    position: start + 1,
                });
            }
            let c = self.cursor.current_char();
            if c == quote {
                self.cursor.advance();
                break;
            }
            if c == '\\' {
                self.cursor.advance();
                if self.cursor.is_at_end() {
                    return Err(LexError::UnfinishedString {
                        position: start + 1,
                    });
                }
            }
            self.cursor.advance();
        }
        let repr = self.cursor.slice_from(start);
        let interior = &repr[1..repr.len() - 1];
        Ok(TokenKind::Str {
            value: decode_short_string(interior),
            long: false,
        })
    }

    fn lex_whitespace(&mut self) -> TokenKind {
        while is_lua_space(self.cursor.current_char()) && !self.cursor.is_at_end() {
            self.cursor.advance();
        }
        TokenKind::Whitespace
    }

    /// The preprocessor entry sigil: `!` or `!!`.
    fn lex_pp_entry(&mut self) -> TokenKind {
        self.cursor.advance();
        let double = self.cursor.current_char() == '!';
        if double {
            self.cursor.advance();
        }
        TokenKind::PpEntry { double }
    }

    /// An operator or delimiter, longest first.
    fn lex_punctuation(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let rest = self.cursor.remaining();
        for p in ["...", "..", "==", "~=", "<=", ">="] {
            if rest.starts_with(p) {
                self.cursor.advance_bytes(p.len());
                return Ok(TokenKind::Punctuation);
            }
        }
        let c = self.cursor.current_char();
        if "+-*/%^#<>=(){}[];:,.".contains(c) {
            self.cursor.advance();
            return Ok(TokenKind::Punctuation);
        }
        Err(LexError::UnknownCharacter {
            position: start + 1,
            character: c,
        })
    }
}

/// Whether `s` opens a long bracket; returns the equal-sign count.
fn long_bracket_level(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'[') {
        return None;
    }
    let level = bytes[1..].iter().take_while(|&&b| b == b'=').count();
    if bytes.get(1 + level) == Some(&b'[') {
        Some(level)
    } else {
        None
    }
}

/// Lua skips one newline directly after a long bracket's opener.
fn strip_leading_newline(s: &str) -> &str {
    if let Some(rest) = s.strip_prefix("\r\n") {
        rest
    } else if let Some(rest) = s.strip_prefix('\n') {
        rest
    } else {
        s
    }
}

/// Decode the escapes of a short-string interior.
///
/// Known escapes map to their characters, `\ddd` (up to three decimal
/// digits) to the byte value, a backslash before a newline to a newline,
/// and any other escaped character to itself.
fn decode_short_string(interior: &str) -> String {
    let mut out = String::with_capacity(interior.len());
    let mut chars = interior.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => {}
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{b}'),
            Some(d) if d.is_ascii_digit() => {
                let mut value = d.to_digit(10).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&p) if p.is_ascii_digit() => {
                            value = value * 10 + p.to_digit(10).unwrap_or(0);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push(char::from_u32(value.min(255)).unwrap_or('\u{fffd}'));
            }
            Some(other) => out.push(other),
        }
    }
    out
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Lua's whitespace class.
fn is_lua_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{b}' | '\u{c}')
}

fn match_dec(s: &str) -> Option<usize> {
    let n = digits(s);
    (n > 0).then_some(n)
}

fn match_hex(s: &str) -> Option<usize> {
    let hex = s.strip_prefix("0x")?;
    let n = hex.bytes().take_while(u8::is_ascii_hexdigit).count();
    (n > 0).then_some(2 + n)
}

fn match_dec_dot(s: &str) -> Option<usize> {
    let i = digits(s);
    if i == 0 || !s[i..].starts_with('.') {
        return None;
    }
    let j = digits(&s[i + 1..]);
    (j > 0).then_some(i + 1 + j)
}

fn match_dec_exp(s: &str) -> Option<usize> {
    let i = digits(s);
    if i == 0 {
        return None;
    }
    Some(i + match_exp_suffix(&s[i..])?)
}

fn match_dec_dot_exp(s: &str) -> Option<usize> {
    let d = match_dec_dot(s)?;
    Some(d + match_exp_suffix(&s[d..])?)
}

/// Matches `e-?d+` exactly; a `+` sign is not accepted.
fn match_exp_suffix(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('e')?;
    let (sign, rest) = match rest.strip_prefix('-') {
        Some(r) => (1, r),
        None => (0, rest),
    };
    let n = digits(rest);
    (n > 0).then_some(1 + sign + n)
}

fn digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}
