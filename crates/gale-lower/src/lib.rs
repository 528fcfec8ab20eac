//! Lowering: bound classes to class-file structures, plus the trimming step
//! that turns transitive classpath supertypes into minimal headers.

mod lower;
mod sig;
mod trim;

pub use crate::lower::{lower_class, lower_module};
pub use crate::trim::{transitive_headers, trim_class, TRANSITIVE_PREFIX};
