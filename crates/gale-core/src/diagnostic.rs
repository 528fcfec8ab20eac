//! Diagnostics primitives shared across Gale.

use std::fmt;
use std::path::PathBuf;

use crate::line_map::LineMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DiagnosticKind {
    /// Malformed source text.
    Syntax,
    /// A name did not resolve against the source set or the classpath.
    SymbolNotFound,
    /// A back-edge in the superclass/interface relation.
    CyclicHierarchy,
    /// The same top-level name declared twice in the source set.
    DuplicateDeclaration,
    /// Anything else the binder rejects (bad modifiers, bad annotation use).
    Invalid,
}

/// A user-facing compilation error tied to a source position.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Diagnostic {
    pub path: PathBuf,
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
    pub kind: DiagnosticKind,
    pub message: String,
    /// The offending source line, used to render a caret underline.
    pub snippet: Option<String>,
}

impl Diagnostic {
    pub fn new(
        path: impl Into<PathBuf>,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            line: 1,
            column: 1,
            kind,
            message: message.into(),
            snippet: None,
        }
    }

    /// Attach a position (and snippet) computed from a byte offset.
    pub fn at(mut self, map: &LineMap, offset: u32) -> Self {
        let pos = map.line_col(offset);
        self.line = pos.line;
        self.column = pos.column;
        self.snippet = map.line_text(pos.line).map(str::to_owned);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: error: {}",
            self.path.display(),
            self.line,
            self.message
        )?;
        if let Some(snippet) = &self.snippet {
            write!(f, "\n{snippet}\n{}^", " ".repeat(self.column.saturating_sub(1) as usize))?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics accrued during a compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn has_kind(&self, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.kind == kind)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_with_caret() {
        let map = LineMap::new("package a;\nclass A extends B {}\n");
        let d = Diagnostic::new("a/A.java", DiagnosticKind::SymbolNotFound, "could not resolve B")
            .at(&map, 27);
        assert_eq!(d.line, 2);
        assert_eq!(d.column, 17);
        let rendered = d.to_string();
        assert!(rendered.starts_with("a/A.java:2: error: could not resolve B"));
        assert!(rendered.ends_with("class A extends B {}\n                ^"));
    }
}
