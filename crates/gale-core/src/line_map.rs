use std::sync::Arc;

/// A 1-based line/column pair, as surfaced in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets in a source file to 1-based line/column positions.
///
/// The map keeps a handle to the source text so diagnostics can render the
/// offending line with a caret underneath.
#[derive(Debug, Clone)]
pub struct LineMap {
    text: Arc<str>,
    line_starts: Vec<u32>,
}

impl LineMap {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text: Arc<str> = text.into();
        let mut line_starts = vec![0u32];
        for (idx, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(idx as u32 + 1);
            }
        }
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The 1-based line/column of a byte offset.
    ///
    /// Offsets past the end of the text clamp to the last position.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let offset = offset.min(self.text.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        LineCol {
            line: line_idx as u32 + 1,
            column: offset - line_start + 1,
        }
    }

    /// The text of a 1-based line, without its trailing newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)? as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|s| *s as usize)
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line() {
        let map = LineMap::new("abc\ndef\n");
        assert_eq!(map.line_col(0), LineCol { line: 1, column: 1 });
        assert_eq!(map.line_col(2), LineCol { line: 1, column: 3 });
    }

    #[test]
    fn later_lines() {
        let map = LineMap::new("abc\ndef\nghi");
        assert_eq!(map.line_col(4), LineCol { line: 2, column: 1 });
        assert_eq!(map.line_col(8), LineCol { line: 3, column: 1 });
        assert_eq!(map.line_text(2), Some("def"));
        assert_eq!(map.line_text(3), Some("ghi"));
        assert_eq!(map.line_text(4), None);
    }

    #[test]
    fn offset_past_end_clamps() {
        let map = LineMap::new("x");
        assert_eq!(map.line_col(100), LineCol { line: 1, column: 2 });
    }
}
