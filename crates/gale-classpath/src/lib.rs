//! Classpath loading: an ordered list of archives becomes a lazy mapping
//! from binary class names to byte sources, plus the archive each name came
//! from.
//!
//! Class bytes are read on demand (binding rarely touches more than the
//! supertype closure), and every byte source is independently retriable.

mod jimage;
mod platform;

pub use crate::platform::{platform_from_release, platform_from_system};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error(transparent)]
    Archive(#[from] gale_archive::ArchiveError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt platform image {path}: {message}")]
    Image { path: PathBuf, message: String },
    #[error("no such platform release: {0}")]
    UnknownRelease(u32),
}

pub type Result<T> = std::result::Result<T, ClasspathError>;

/// Where class bytes for one binary name live.
#[derive(Clone, Debug)]
enum Provider {
    /// An entry inside a jar (or ct.sym-style signature archive).
    Jar {
        archive: gale_archive::Archive,
        entry: String,
    },
    /// A resource in a jimage container.
    Image {
        image: Arc<jimage::JImage>,
        resource: String,
    },
    /// A loose file (exploded platform image).
    File(PathBuf),
}

/// A lazy, retriable handle to one class file's bytes.
#[derive(Clone, Debug)]
pub struct ByteSource {
    provider: Provider,
}

impl ByteSource {
    pub fn read(&self) -> Result<Vec<u8>> {
        match &self.provider {
            Provider::Jar { archive, entry } => {
                let bytes = archive.read(entry)?;
                // The index only hands out names it enumerated, so a missing
                // entry means the archive changed under us.
                bytes.ok_or_else(|| ClasspathError::Image {
                    path: archive.path().to_path_buf(),
                    message: format!("entry {entry} disappeared"),
                })
            }
            Provider::Image { image, resource } => image.read(resource),
            Provider::File(path) => Ok(std::fs::read(path)?),
        }
    }
}

#[derive(Clone, Debug)]
struct IndexedClass {
    provider: Provider,
    /// Index into `origins`; identifies the archive for dependency output.
    origin: usize,
}

/// An ordered, first-writer-wins index over class archives.
#[derive(Clone, Debug, Default)]
pub struct ClassPathIndex {
    classes: HashMap<String, IndexedClass>,
    names_sorted: Vec<String>,
    origins: Vec<PathBuf>,
}

impl ClassPathIndex {
    /// Index jars in classpath order. Earlier archives shadow later ones.
    pub fn from_jars(paths: &[PathBuf]) -> Result<Self> {
        let mut builder = IndexBuilder::default();
        for path in paths {
            let archive = gale_archive::Archive::new(path);
            let origin = builder.origin(path);
            for entry in archive.entry_names()? {
                let Some(binary_name) = binary_name_of_entry(&entry) else {
                    continue;
                };
                builder.insert(
                    binary_name,
                    IndexedClass {
                        provider: Provider::Jar {
                            archive: archive.clone(),
                            entry,
                        },
                        origin,
                    },
                );
            }
            tracing::debug!(path = %path.display(), "indexed classpath archive");
        }
        Ok(builder.finish())
    }

    pub fn lookup(&self, binary_name: &str) -> Option<ByteSource> {
        self.classes.get(binary_name).map(|c| ByteSource {
            provider: c.provider.clone(),
        })
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        self.classes.contains_key(binary_name)
    }

    /// The archive a class came from.
    pub fn origin(&self, binary_name: &str) -> Option<&Path> {
        let class = self.classes.get(binary_name)?;
        self.origins.get(class.origin).map(PathBuf::as_path)
    }

    /// All indexed binary names in sorted order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names_sorted.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Default)]
struct IndexBuilder {
    classes: HashMap<String, IndexedClass>,
    origins: Vec<PathBuf>,
}

impl IndexBuilder {
    fn origin(&mut self, path: &Path) -> usize {
        self.origins.push(path.to_path_buf());
        self.origins.len() - 1
    }

    fn insert(&mut self, binary_name: String, class: IndexedClass) {
        // First writer wins, matching classpath search order.
        self.classes.entry(binary_name).or_insert(class);
    }

    fn finish(self) -> ClassPathIndex {
        let mut names_sorted: Vec<String> = self.classes.keys().cloned().collect();
        names_sorted.sort();
        ClassPathIndex {
            classes: self.classes,
            names_sorted,
            origins: self.origins,
        }
    }
}

/// The binary name for a jar entry, or `None` for entries that are not class
/// files. `module-info.class` is kept; metadata and resources are not.
fn binary_name_of_entry(entry: &str) -> Option<String> {
    let name = entry.strip_suffix(".class")?;
    if name.is_empty() {
        return None;
    }
    // Multi-release variants would shadow base classes nondeterministically.
    if name.starts_with("META-INF/") {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn first_archive_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jar");
        let b = dir.path().join("b.jar");
        write_jar(&a, &[("p/C.class", b"from-a"), ("only/A.class", b"a")]);
        write_jar(&b, &[("p/C.class", b"from-b"), ("only/B.class", b"b")]);

        let index = ClassPathIndex::from_jars(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(index.lookup("p/C").unwrap().read().unwrap(), b"from-a");
        assert_eq!(index.origin("p/C").unwrap(), a.as_path());
        assert_eq!(index.origin("only/B").unwrap(), b.as_path());
        assert_eq!(
            index.class_names().collect::<Vec<_>>(),
            vec!["only/A", "only/B", "p/C"]
        );
    }

    #[test]
    fn non_class_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("c.jar");
        write_jar(
            &jar,
            &[
                ("p/C.class", b"c"),
                ("module-info.class", b"m"),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
                ("p/data.properties", b"k=v"),
                ("META-INF/versions/11/p/C.class", b"mr"),
            ],
        );
        let index = ClassPathIndex::from_jars(&[jar]).unwrap();
        assert!(index.contains("p/C"));
        assert!(index.contains("module-info"));
        assert!(!index.contains("p/data.properties"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("p/C").unwrap().read().unwrap(), b"c");
    }

    #[test]
    fn byte_sources_are_retriable() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("r.jar");
        write_jar(&jar, &[("p/C.class", b"c")]);
        let index = ClassPathIndex::from_jars(&[jar]).unwrap();
        let source = index.lookup("p/C").unwrap();
        assert_eq!(source.read().unwrap(), b"c");
        assert_eq!(source.read().unwrap(), b"c");
    }
}
