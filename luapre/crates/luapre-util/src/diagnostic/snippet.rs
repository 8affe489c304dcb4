//! Source excerpt rendering.

/// A source line with a caret pointing at one column.
///
/// Rendered as two lines: the source line behind a line-number gutter, and
/// a caret line underneath.
///
/// # Examples
///
/// ```
/// use luapre_util::SourceSnippet;
///
/// let snippet = SourceSnippet::new("local x = !!", 1, 11);
/// assert_eq!(snippet.format(), "  1 | local x = !!\n    |           ^");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSnippet {
    /// The source line content, without its terminating newline.
    pub line: String,
    /// Line number (1-based).
    pub line_number: u32,
    /// Column the caret points at (1-based).
    pub column: u32,
}

impl SourceSnippet {
    pub fn new(line: impl Into<String>, line_number: u32, column: u32) -> Self {
        Self {
            line: line.into(),
            line_number,
            column,
        }
    }

    /// Format the excerpt with a line-number gutter and a caret line.
    pub fn format(&self) -> String {
        let gutter = self.line_number.to_string().len().max(3);
        let mut out = String::new();
        out.push_str(&format!(
            "{:>width$} | {}\n",
            self.line_number,
            self.line,
            width = gutter
        ));
        out.push_str(&format!("{:>width$} | ", "", width = gutter));
        for _ in 0..self.column.saturating_sub(1) {
            out.push(' ');
        }
        out.push('^');
        out
    }
}
