use serde::Serialize;
use tracing::warn;

/// A recoverable problem found while reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based input line.
    pub line: usize,
    pub message: String,
}

/// Explicit reader position over the input lines, plus accumulated warnings.
///
/// Every reader and handler takes the cursor by `&mut`, so there is no
/// ambient parse position anywhere else.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    lines: Vec<&'a str>,
    index: usize,
    warnings: Vec<ParseWarning>,
}

impl<'a> Cursor<'a> {
    /// Cursor over the lines of `text`; a leading byte-order mark is dropped.
    pub fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self::from_lines(text.lines().collect())
    }

    pub fn from_lines(lines: Vec<&'a str>) -> Self {
        Self {
            lines,
            index: 0,
            warnings: Vec::new(),
        }
    }

    /// Index of the next unread line.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Move to an absolute line index.
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.lines.len());
    }

    pub fn is_eof(&self) -> bool {
        self.index >= self.lines.len()
    }

    /// Next unread line without consuming it.
    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.index).copied()
    }

    /// Line at an absolute index.
    pub fn line_at(&self, index: usize) -> Option<&'a str> {
        self.lines.get(index).copied()
    }

    /// Consume the next line, returning its 1-based number and text.
    pub fn advance(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.index).copied()?;
        self.index += 1;
        Some((self.index, line))
    }

    /// Record a warning against a 1-based line number.
    pub fn warn(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        warn!(line, "{message}");
        self.warnings.push(ParseWarning { line, message });
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ParseWarning> {
        self.warnings
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn advance_reports_one_based_lines() {
        let mut cursor = Cursor::new("\u{feff}config a\nend\n");
        assert_eq!(cursor.advance(), Some((1, "config a")));
        assert_eq!(cursor.peek(), Some("end"));
        assert_eq!(cursor.advance(), Some((2, "end")));
        assert!(cursor.is_eof());
        cursor.seek(0);
        assert_eq!(cursor.position(), 0);
    }
}
