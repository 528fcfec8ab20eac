//! The gale driver: option handling and whole-compilation orchestration,
//! including speculative compilation against a reduced classpath.

pub mod driver;
pub mod options;

use gale_core::Diagnostics;

/// The three failure classes of the tool. All of them exit 1; they differ
/// in how they print.
#[derive(Debug)]
pub enum GaleError {
    /// Misconfigured invocation; no outputs are produced.
    Usage(String),
    /// Source-level problems, one positioned diagnostic each.
    Compile(Diagnostics),
    /// I/O failures, corrupt inputs, violated invariants.
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for GaleError {
    fn from(err: anyhow::Error) -> Self {
        GaleError::Fatal(err)
    }
}

pub type Result<T> = std::result::Result<T, GaleError>;
