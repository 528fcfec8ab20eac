//! Jar reading and writing.
//!
//! Reading wraps the `zip` crate (which copes with zip64 archives, the
//! extensible-data-sector end-of-central-directory variant, and archive
//! comments). Writing produces deterministic jars: every entry STORED, with
//! a CRC-32 and a fixed normalized timestamp, so identical inputs yield
//! byte-identical outputs.

mod jar;

pub use crate::jar::{JarBuilder, Manifest};

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt archive {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("failed to read {name} from {path}: {source}")]
    Entry {
        path: PathBuf,
        name: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// A zip archive identified by path.
///
/// Reads open the file fresh each time, so an `Archive` value is cheap to
/// clone, safe to share across threads, and every read is independently
/// retriable.
#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<zip::ZipArchive<File>> {
        let file = File::open(&self.path).map_err(|source| ArchiveError::Open {
            path: self.path.clone(),
            source,
        })?;
        zip::ZipArchive::new(file).map_err(|source| ArchiveError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Entry names in central-directory order.
    pub fn entry_names(&self) -> Result<Vec<String>> {
        let archive = self.open()?;
        // `file_names()` iterates a map in no particular order; indexing
        // preserves the central directory.
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            if let Some(name) = archive.name_for_index(index) {
                names.push(name.to_owned());
            }
        }
        Ok(names)
    }

    /// Read a single entry.
    ///
    /// Returns `Ok(None)` when the entry isn't present.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = self.open()?;
        let result = match archive.by_name(name) {
            Ok(mut entry) => {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut buf)
                    .map_err(|source| ArchiveError::Entry {
                        path: self.path.clone(),
                        name: name.to_string(),
                        source,
                    })?;
                Ok(Some(buf))
            }
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(source) => Err(ArchiveError::Corrupt {
                path: self.path.clone(),
                source,
            }),
        };
        result
    }

    /// Visit every file entry in central-directory order.
    pub fn for_each_entry(
        &self,
        mut f: impl FnMut(&str, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut archive = self.open()?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|source| ArchiveError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
            if !entry.is_file() {
                continue;
            }
            let name = entry.name().to_owned();
            f(&name, &mut entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn reads_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jar");
        write_test_zip(&path, &[("b/B.class", b"bb"), ("a/A.class", b"aa")]);

        let archive = Archive::new(&path);
        assert_eq!(archive.entry_names().unwrap(), vec!["b/B.class", "a/A.class"]);
        assert_eq!(archive.read("a/A.class").unwrap().unwrap(), b"aa");
        assert_eq!(archive.read("missing").unwrap(), None);
    }

    #[test]
    fn missing_archive_is_an_open_error() {
        let archive = Archive::new("/no/such/archive.jar");
        match archive.read("x") {
            Err(ArchiveError::Open { path, .. }) => {
                assert_eq!(path, PathBuf::from("/no/such/archive.jar"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn corrupt_archive_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jar");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        let err = Archive::new(&path).entry_names().unwrap_err();
        assert!(err.to_string().contains("bad.jar"));
    }
}
