//! The token-walk state machine.

use thiserror::Error;

use luapre_lex::{Token, TokenKind};
use luapre_util::lua::quote_string;

/// Host compile-probe used to classify `!( … )` blocks.
///
/// Implementations answer whether `return(<body>)` compiles as a Lua
/// chunk. The probe must not execute anything.
pub trait ExprChecker {
    fn is_expression(&self, body: &str) -> bool;
}

/// Transpiler options.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Interleave `--[[@N]]` line annotations into verbatim chunks.
    pub add_line_numbers: bool,
    /// Emit `outputLua(…)` with `\n` escapes instead of the compact
    /// `outputLua"…"` form with backslash-newline continuations.
    pub debug: bool,
}

/// A fatal transpiler error. The position is the 1-based byte offset of
/// the offending token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranspileError {
    #[error("Preprocessor token inside metaprogram.")]
    PpTokenInMeta { position: usize },

    #[error("Unexpected preprocessor token.")]
    UnexpectedPpToken { position: usize },

    #[error("Missing end of meta block.")]
    UnbalancedMetaBlock { position: usize },

    #[error("Meta block variant '!!( )' does not contain a valid expression.")]
    InvalidExpression { position: usize },
}

impl TranspileError {
    /// 1-based byte offset the error points at.
    pub fn position(&self) -> usize {
        match *self {
            TranspileError::PpTokenInMeta { position }
            | TranspileError::UnexpectedPpToken { position }
            | TranspileError::UnbalancedMetaBlock { position }
            | TranspileError::InvalidExpression { position } => position,
        }
    }
}

/// Transpile a token vector into metaprogram source.
pub fn transpile<C: ExprChecker + ?Sized>(
    tokens: &[Token<'_>],
    options: Options,
    checker: &C,
) -> Result<String, TranspileError> {
    Transpiler::new(tokens, options, checker).run()
}

/// A piece of pending verbatim output.
///
/// `annotatable` marks tokens that count for `--[[@N]]` line annotations;
/// whitespace and comments never trigger one.
struct Chunk<'a> {
    text: &'a str,
    line: u32,
    annotatable: bool,
}

struct Transpiler<'t, 'c, C: ?Sized> {
    tokens: &'t [Token<'t>],
    options: Options,
    checker: &'c C,

    /// Metaprogram fragments; concatenation in order is the result.
    parts: Vec<String>,
    /// Tokens awaiting emission as a single verbatim chunk.
    pending: Vec<Chunk<'t>>,
    /// Inside a single-line meta statement.
    in_meta: bool,
    /// No code token seen since the last newline.
    start_of_line: bool,
    /// Last annotated source line.
    last_emitted_line: u32,
}

impl<'t, 'c, C: ExprChecker + ?Sized> Transpiler<'t, 'c, C> {
    fn new(tokens: &'t [Token<'t>], options: Options, checker: &'c C) -> Self {
        Self {
            tokens,
            options,
            checker,
            parts: Vec::new(),
            pending: Vec::new(),
            in_meta: false,
            start_of_line: true,
            last_emitted_line: 0,
        }
    }

    fn run(mut self) -> Result<String, TranspileError> {
        let mut i = 0;
        while i < self.tokens.len() {
            if self.in_meta {
                self.meta_line_token(i)?;
                i += 1;
            } else if let TokenKind::PpEntry { double } = self.tokens[i].kind {
                i = self.pp_entry(i, double)?;
            } else {
                self.ordinary_token(i);
                i += 1;
            }
        }
        self.flush_pending();
        Ok(self.parts.concat())
    }

    /// A token inside a meta line.
    fn meta_line_token(&mut self, i: usize) -> Result<(), TranspileError> {
        let tok = &self.tokens[i];
        match tok.kind {
            // A newline ends the meta statement. The tail of the
            // whitespace token belongs to the next source line and goes
            // back into the verbatim stream.
            TokenKind::Whitespace if tok.repr.contains('\n') => {
                self.parts.push("\n".to_string());
                if let Some(nl) = tok.repr.find('\n') {
                    let tail = &tok.repr[nl + 1..];
                    if !tail.is_empty() {
                        self.pending.push(Chunk {
                            text: tail,
                            line: tok.line + 1,
                            annotatable: false,
                        });
                    }
                }
                self.in_meta = false;
                self.start_of_line = true;
            }
            // A line comment also ends the statement; the added newline
            // terminates it inside the metaprogram.
            TokenKind::Comment { long: false, .. } => {
                self.parts.push(format!("{}\n", tok.repr));
                self.in_meta = false;
                self.start_of_line = true;
            }
            TokenKind::PpEntry { .. } => {
                return Err(TranspileError::PpTokenInMeta {
                    position: tok.position,
                })
            }
            _ => self.parts.push(tok.repr.to_string()),
        }
        Ok(())
    }

    /// A `!` or `!!` outside any metaprogram context.
    fn pp_entry(&mut self, i: usize, double: bool) -> Result<usize, TranspileError> {
        let tok = &self.tokens[i];
        let next_is_paren = self
            .tokens
            .get(i + 1)
            .map_or(false, |t| t.is_punct("("));
        if next_is_paren {
            self.flush_pending();
            let next = self.meta_block(i, double)?;
            self.start_of_line = false;
            Ok(next)
        } else if !double && self.start_of_line {
            self.flush_pending();
            self.in_meta = true;
            Ok(i + 1)
        } else {
            Err(TranspileError::UnexpectedPpToken {
                position: tok.position,
            })
        }
    }

    /// Collect a `!( … )` / `!!( … )` block and classify it.
    ///
    /// `i` indexes the entry sigil; the following token is the opening
    /// parenthesis. Returns the index after the closing parenthesis.
    fn meta_block(&mut self, i: usize, double: bool) -> Result<usize, TranspileError> {
        let entry = &self.tokens[i];
        let mut body = String::new();
        let mut depth = 1usize;
        let mut j = i + 2;
        loop {
            let tok = self
                .tokens
                .get(j)
                .ok_or(TranspileError::UnbalancedMetaBlock {
                    position: entry.position,
                })?;
            if tok.is_pp_entry() {
                return Err(TranspileError::PpTokenInMeta {
                    position: tok.position,
                });
            }
            if tok.is_punct("(") {
                depth += 1;
            } else if tok.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    j += 1;
                    break;
                }
            }
            body.push_str(tok.repr);
            j += 1;
        }

        if double {
            // `!!( … )` must hold an expression yielding code text.
            if !self.checker.is_expression(&body) {
                return Err(TranspileError::InvalidExpression {
                    position: entry.position,
                });
            }
            self.parts.push(format!("outputLua({})\n", body));
        } else if self.checker.is_expression(&body) {
            // Inline expression: the serialized value replaces the block.
            self.parts.push(format!("outputValue({})\n", body));
        } else {
            // Statement block: metaprogram code with no implicit output.
            self.parts.push(format!("{}\n", body));
        }
        Ok(j)
    }

    /// An ordinary token outside meta context.
    fn ordinary_token(&mut self, i: usize) {
        let tok = &self.tokens[i];
        match tok.kind {
            TokenKind::Whitespace => {
                self.pending.push(Chunk {
                    text: tok.repr,
                    line: tok.line,
                    annotatable: false,
                });
                if tok.repr.contains('\n') {
                    self.start_of_line = true;
                }
            }
            TokenKind::Comment { long: false, .. } => {
                self.pending.push(Chunk {
                    text: tok.repr,
                    line: tok.line,
                    annotatable: false,
                });
                self.start_of_line = true;
            }
            TokenKind::Comment { long: true, .. } => {
                self.pending.push(Chunk {
                    text: tok.repr,
                    line: tok.line,
                    annotatable: false,
                });
                self.start_of_line = false;
            }
            _ => {
                self.pending.push(Chunk {
                    text: tok.repr,
                    line: tok.line,
                    annotatable: true,
                });
                self.start_of_line = false;
            }
        }
    }

    /// Emit the pending tokens as one `outputLua` call.
    fn emit_verbatim(&mut self, chunks: Vec<Chunk<'t>>) {
        let mut lua = String::new();
        for chunk in chunks {
            if self.options.add_line_numbers
                && chunk.annotatable
                && chunk.line != self.last_emitted_line
            {
                lua.push_str(&format!("--[[@{}]]", chunk.line));
                self.last_emitted_line = chunk.line;
            }
            lua.push_str(chunk.text);
        }
        if lua.is_empty() {
            return;
        }
        if self.options.debug {
            self.parts
                .push(format!("outputLua({})\n", quote_string(&lua, true)));
        } else {
            self.parts.push(format!("outputLua{}", quote_string(&lua, false)));
        }
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let chunks = std::mem::take(&mut self.pending);
        self.emit_verbatim(chunks);
    }
}

