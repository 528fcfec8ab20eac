//! Dependency records: which classpath archives contributed to the
//! compilation, serialized as protobuf for build-system consumption, plus
//! the classpath-reduction helper that projects a transitive classpath down
//! to the subset prior compilations actually used.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use prost::Message;
use thiserror::Error;

use gale_binder::{supertype_closure, BindingEnv, ClassSymbol};

#[derive(Debug, Error)]
pub enum DepsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed dependency record {path}: {source}")]
    Decode {
        path: PathBuf,
        source: prost::DecodeError,
    },
}

pub type Result<T> = std::result::Result<T, DepsError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
pub enum Kind {
    Explicit = 0,
    Implicit = 1,
    Unused = 2,
    Incomplete = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct Dependency {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(enumeration = "Kind", tag = "2")]
    pub kind: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Dependencies {
    #[prost(message, repeated, tag = "1")]
    pub dependency: Vec<Dependency>,
    #[prost(string, tag = "2")]
    pub rule_label: String,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(bool, tag = "5")]
    pub requires_reduced_classpath_fallback: bool,
}

impl Dependencies {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.encode_to_vec()).map_err(|source| DepsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| DepsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(bytes.as_slice()).map_err(|source| DepsError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The archives contributing a class to the supertype closure of the
/// compiled classes, tagged `EXPLICIT`, in first-encounter order.
/// Bootclasspath archives are never listed.
pub fn collect_dependencies(env: &BindingEnv<'_>, roots: &[ClassSymbol]) -> Vec<Dependency> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut out = Vec::new();
    for sym in supertype_closure(env, roots) {
        let Some(origin) = env.classpath.origin(&sym) else {
            continue;
        };
        if seen.insert(origin.to_path_buf()) {
            out.push(Dependency {
                path: origin.to_string_lossy().into_owned(),
                kind: Kind::Explicit as i32,
            });
        }
    }
    out
}

/// Project the transitive classpath down to direct dependencies plus
/// whatever the direct dependencies' own records say they need.
///
/// The result preserves the order of `full` and is a subset of it.
pub fn reduce_classpath(
    full: &[PathBuf],
    direct: &[PathBuf],
    deps_artifacts: &[Dependencies],
) -> Vec<PathBuf> {
    let mut keep: HashSet<&Path> = direct.iter().map(PathBuf::as_path).collect();
    let mut required: HashSet<PathBuf> = HashSet::new();
    for artifact in deps_artifacts {
        for dep in &artifact.dependency {
            if dep.kind == Kind::Unused as i32 {
                continue;
            }
            required.insert(PathBuf::from(&dep.path));
        }
    }
    for path in &required {
        keep.insert(path.as_path());
    }
    full.iter()
        .filter(|path| keep.contains(path.as_path()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deps(paths: &[&str]) -> Dependencies {
        Dependencies {
            dependency: paths
                .iter()
                .map(|p| Dependency {
                    path: p.to_string(),
                    kind: Kind::Explicit as i32,
                })
                .collect(),
            rule_label: String::new(),
            success: true,
            requires_reduced_classpath_fallback: false,
        }
    }

    #[test]
    fn record_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jdeps");
        let mut record = deps(&["a.jar", "b.jar"]);
        record.rule_label = "//java:lib".to_string();
        record.write_to(&path).unwrap();
        let read = Dependencies::read_from(&path).unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn reduction_preserves_order_and_subsets() {
        let full: Vec<PathBuf> = ["a.jar", "b.jar", "c.jar", "d.jar"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let direct = vec![PathBuf::from("c.jar")];
        let artifacts = vec![deps(&["a.jar"]), deps(&["x.jar"])];

        let reduced = reduce_classpath(&full, &direct, &artifacts);
        assert_eq!(reduced, vec![PathBuf::from("a.jar"), PathBuf::from("c.jar")]);
    }

    #[test]
    fn unused_entries_do_not_pin_archives() {
        let full: Vec<PathBuf> = vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")];
        let mut artifact = deps(&["b.jar"]);
        artifact.dependency[0].kind = Kind::Unused as i32;
        let reduced = reduce_classpath(&full, &[], &[artifact]);
        assert!(reduced.is_empty());
    }

    #[test]
    fn empty_record_has_compact_encoding() {
        let record = Dependencies::default();
        assert!(record.encode_to_vec().is_empty());
    }
}
