//! Java source parsing, at header fidelity.
//!
//! Gale only needs declarations: package and imports, type declarations with
//! their signatures, field initializers (for constant evaluation), and
//! annotation arguments. Method bodies, initializer blocks, and enum constant
//! bodies are skipped by brace matching and never materialize as trees.

mod lexer;
mod parser;
pub mod tree;

use std::path::{Path, PathBuf};

use gale_core::{Diagnostic, DiagnosticKind, LineMap};

pub use crate::parser::parse_compilation_unit;

/// A parsed source file: the unit plus what diagnostics need to render
/// positions in it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub line_map: LineMap,
    pub unit: tree::CompUnit,
}

/// Parse one source file, turning lex/parse failures into a positioned
/// diagnostic.
pub fn parse_source(path: impl Into<PathBuf>, text: &str) -> Result<SourceFile, Diagnostic> {
    let path = path.into();
    let line_map = LineMap::new(text);
    match parse_compilation_unit(text) {
        Ok(unit) => Ok(SourceFile {
            path,
            line_map,
            unit,
        }),
        Err(err) => Err(
            Diagnostic::new(path, DiagnosticKind::Syntax, err.message).at(&line_map, err.offset)
        ),
    }
}

/// A lex or parse failure, positioned by byte offset.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub offset: u32,
    pub message: String,
}

impl ParseError {
    fn new(offset: u32, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// True if `path` names a Java source file we should compile.
pub fn is_java_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "java")
}
