//! luapre-lex - Lexer for hybrid Lua/metacode source.
//!
//! This crate turns a source file that mixes ordinary Lua with `!`-sigil
//! preprocessor constructs into a flat token vector. It is the first phase
//! of the pipeline and the only one that looks at raw text.
//!
//! Two properties drive the design:
//!
//! - **Losslessness.** Every token carries its exact source slice
//!   (`repr`), so concatenating the representations of an unmodified token
//!   vector reproduces the input byte-for-byte. The transpiler relies on
//!   this to pass untouched code through to the output unchanged.
//! - **Lua token boundaries.** The lexer reproduces Lua's token shapes —
//!   long-bracket strings and comments with matching equal-sign runs,
//!   escape handling in short strings, multi-character operators — so that
//!   parenthesis balance and line tracking in later phases agree with what
//!   the Lua runtime will eventually see.
//!
//! On top of plain Lua, the lexer knows one extra token class: the
//! preprocessor entry sigil `!` (or `!!`), emitted as
//! [`TokenKind::PpEntry`].
//!
//! Errors are fatal and structured ([`LexError`]); the lexer never prints
//! or exits. There is no recovery mode: the first error wins.
//!
//! # Example
//!
//! ```
//! use luapre_lex::{tokenize, TokenKind};
//!
//! let tokens = tokenize("local n = !(1+2)").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Keyword);
//! assert_eq!(tokens[0].repr, "local");
//! assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::PpEntry { double: false })));
//! ```

pub mod cursor;
mod lexer;
mod token;

pub use lexer::{tokenize, LexError, Lexer};
pub use token::{Token, TokenKind};
