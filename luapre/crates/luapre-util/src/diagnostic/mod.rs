//! Diagnostic module - fatal error reporting infrastructure.
//!
//! Every failure in the pipeline is eventually rendered as a single line
//!
//! ```text
//! Error @ file:line:col: [Agent] message
//! ```
//!
//! optionally followed by a two-line source excerpt with a caret under the
//! offending column. The phases themselves only produce structured error
//! values; the driver converts them into [`Diagnostic`]s and the binary
//! prints them at its single exit point.

mod snippet;

pub use snippet::SourceSnippet;

use std::fmt;
use std::path::{Path, PathBuf};

/// The pipeline stage a diagnostic originates from.
///
/// The agent name is printed in square brackets and tells the user which
/// part of the tool rejected the input: `Tokenizer` for lexical errors,
/// `Parser` for structural and expression errors, `Meta` for failures while
/// the metaprogram runs, `Output` for final output that does not compile,
/// `Loader` for file I/O, `Serializer` for unrepresentable values, and
/// `CommandLine` for usage errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Agent {
    Loader,
    Tokenizer,
    Parser,
    Meta,
    Output,
    Serializer,
    CommandLine,
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Agent::Loader => "Loader",
            Agent::Tokenizer => "Tokenizer",
            Agent::Parser => "Parser",
            Agent::Meta => "Meta",
            Agent::Output => "Output",
            Agent::Serializer => "Serializer",
            Agent::CommandLine => "CommandLine",
        };
        f.write_str(name)
    }
}

/// A 1-based line/column pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A fully formed, user-facing fatal error.
///
/// # Examples
///
/// ```
/// use luapre_util::{Agent, Diagnostic};
///
/// let diag = Diagnostic::new(Agent::Parser, "test.lua2p", "Unexpected preprocessor token.")
///     .with_location(3, 7);
/// assert_eq!(
///     diag.to_string(),
///     "Error @ test.lua2p:3:7: [Parser] Unexpected preprocessor token."
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Which stage produced the error.
    pub agent: Agent,
    /// Main message, a complete sentence.
    pub message: String,
    /// File the error is reported against (input, metaprogram or output).
    pub path: PathBuf,
    /// Line/column when a source position is known.
    pub location: Option<Location>,
    /// Caret-underlined excerpt of the offending line.
    pub snippet: Option<SourceSnippet>,
}

impl Diagnostic {
    pub fn new(agent: Agent, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            agent,
            message: message.into(),
            path: path.into(),
            location: None,
            snippet: None,
        }
    }

    /// Attach a 1-based line/column location.
    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.location = Some(Location { line, column });
        self
    }

    /// Attach only a line (used when the column is not meaningful, e.g.
    /// errors relayed from the Lua runtime).
    pub fn with_line(mut self, line: u32) -> Self {
        self.location = Some(Location { line, column: 0 });
        self
    }

    pub fn with_snippet(mut self, snippet: SourceSnippet) -> Self {
        self.snippet = Some(snippet);
        self
    }

    /// Build a diagnostic for a known byte offset into `source`.
    ///
    /// The line, column and excerpt are all derived from the offset, which
    /// is 1-based to match the position recorded on tokens.
    pub fn at_offset(
        agent: Agent,
        path: impl Into<PathBuf>,
        source: &str,
        position: usize,
        message: impl Into<String>,
    ) -> Self {
        let (line, column, line_text) = locate(source, position);
        Self::new(agent, path, message)
            .with_location(line, column)
            .with_snippet(SourceSnippet::new(line_text, line, column))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error @ {}", self.path.display())?;
        if let Some(loc) = self.location {
            write!(f, ":{}", loc.line)?;
            if loc.column > 0 {
                write!(f, ":{}", loc.column)?;
            }
        }
        write!(f, ": [{}] {}", self.agent, self.message)?;
        if let Some(ref snippet) = self.snippet {
            write!(f, "\n{}", snippet.format())?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Map a 1-based byte offset to (line, column, line text).
///
/// The column is a byte column within the line, 1-based. Offsets past the
/// end of the source point just after the last character.
pub fn locate(source: &str, position: usize) -> (u32, u32, &str) {
    let index = position.saturating_sub(1).min(source.len());
    let before = &source[..index];
    let line = before.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[index..]
        .find('\n')
        .map_or(source.len(), |i| index + i);
    let column = (index - line_start) as u32 + 1;
    (line, column, &source[line_start..line_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_display() {
        assert_eq!(Agent::Tokenizer.to_string(), "Tokenizer");
        assert_eq!(Agent::CommandLine.to_string(), "CommandLine");
    }

    #[test]
    fn locate_first_byte() {
        assert_eq!(locate("abc\ndef", 1), (1, 1, "abc"));
    }

    #[test]
    fn locate_second_line() {
        let (line, column, text) = locate("abc\ndef\n", 6);
        assert_eq!((line, column, text), (2, 2, "def"));
    }

    #[test]
    fn locate_past_end() {
        let (line, _, text) = locate("abc", 99);
        assert_eq!(line, 1);
        assert_eq!(text, "abc");
    }

    #[test]
    fn display_without_location() {
        let diag = Diagnostic::new(Agent::Loader, "x.lua2p", "Could not read file.");
        assert_eq!(
            diag.to_string(),
            "Error @ x.lua2p: [Loader] Could not read file."
        );
    }

    #[test]
    fn display_with_line_only() {
        let diag = Diagnostic::new(Agent::Meta, "x.meta.lua", "boom").with_line(12);
        assert_eq!(diag.to_string(), "Error @ x.meta.lua:12: [Meta] boom");
    }

    #[test]
    fn display_with_snippet() {
        let diag = Diagnostic::at_offset(Agent::Tokenizer, "t.lua2p", "local $x", 7, "Unknown character.");
        let rendered = diag.to_string();
        assert!(rendered.starts_with("Error @ t.lua2p:1:7: [Tokenizer] Unknown character.\n"));
        assert!(rendered.contains("local $x"));
        assert!(rendered.contains('^'));
    }
}
