//! Bootclasspath variants: a signature archive selected by release number,
//! or a platform module image (`--system`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::jimage::JImage;
use crate::{ClassPathIndex, ClasspathError, IndexBuilder, IndexedClass, Provider, Result};

/// Load the platform classes for `--release` from the JDK's signature
/// archive (`$JAVA_HOME/lib/ct.sym`).
///
/// ct.sym entries look like `87A/java.base/java/lang/Object.sig`: the first
/// segment is a run of base-36 release codes the entry applies to, and on
/// JDK 12+ layouts the second segment is the owning module.
pub fn platform_from_release(java_home: &Path, release: u32) -> Result<ClassPathIndex> {
    let ct_sym = java_home.join("lib").join("ct.sym");
    let archive = gale_archive::Archive::new(&ct_sym);
    let code = release_code(release).ok_or(ClasspathError::UnknownRelease(release))?;

    let mut builder = IndexBuilder::default();
    let origin = builder.origin(&ct_sym);
    let mut matched = false;
    for entry in archive.entry_names()? {
        let Some((codes, rest)) = entry.split_once('/') else {
            continue;
        };
        if !codes.contains(code) {
            continue;
        }
        matched = true;
        let Some(rest) = rest.strip_suffix(".sig") else {
            continue;
        };
        // Module names contain dots; package directories never do.
        let binary_name = match rest.split_once('/') {
            Some((first, tail)) if first.contains('.') => tail.to_string(),
            _ => rest.to_string(),
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

    if !matched {
        return Err(ClasspathError::UnknownRelease(release));
    }
    tracing::debug!(release, path = %ct_sym.display(), "indexed signature archive");
    Ok(builder.finish())
}

/// Releases 5–9 use their digit; 10 and up continue through the base-36
/// alphabet (10 = A, 17 = H, ...).
fn release_code(release: u32) -> Option<char> {
    char::from_digit(release, 36).map(|c| c.to_ascii_uppercase())
}

/// Load the platform classes from a `--system` image root: either a jimage
/// container at `<root>/lib/modules`, or an exploded `<root>/modules/` tree.
pub fn platform_from_system(root: &Path) -> Result<ClassPathIndex> {
    let modules_file = root.join("lib").join("modules");
    if modules_file.is_file() {
        return platform_from_jimage(&modules_file);
    }

    let exploded = root.join("modules");
    if exploded.is_dir() {
        return platform_from_exploded(&exploded);
    }

    Err(ClasspathError::Image {
        path: root.to_path_buf(),
        message: "neither lib/modules nor modules/ present".to_string(),
    })
}

fn platform_from_jimage(path: &Path) -> Result<ClassPathIndex> {
    let image = Arc::new(JImage::open(path)?);
    let mut builder = IndexBuilder::default();
    let origin = builder.origin(path);
    for resource in image.resource_names() {
        // Resources are `/<module>/<path>`; only class files matter here.
        let Some(rest) = resource
            .strip_prefix('/')
            .and_then(|r| r.split_once('/'))
            .map(|(_module, rest)| rest)
        else {
            continue;
        };
        let Some(binary_name) = rest.strip_suffix(".class") else {
            continue;
        };
        if binary_name == "module-info" {
            continue;
        }
        builder.insert(
            binary_name.to_string(),
            IndexedClass {
                provider: Provider::Image {
                    image: Arc::clone(&image),
                    resource: resource.clone(),
                },
                origin,
            },
        );
    }
    tracing::debug!(path = %path.display(), "indexed platform image");
    Ok(builder.finish())
}

fn platform_from_exploded(modules_dir: &Path) -> Result<ClassPathIndex> {
    let mut builder = IndexBuilder::default();
    let origin = builder.origin(modules_dir);

    // Walk deterministically; the walker does not guarantee an order.
    let mut class_files: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(modules_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() != Some(std::ffi::OsStr::new("class")) {
            continue;
        }
        class_files.push(entry.into_path());
    }
    class_files.sort();

    let mut seen: HashMap<String, ()> = HashMap::new();
    for path in class_files {
        let rel = path.strip_prefix(modules_dir).unwrap_or(&path);
        // `<module>/<binary name>.class`
        let rel = rel.to_string_lossy().replace('\\', "/");
        let Some((_module, rest)) = rel.split_once('/') else {
            continue;
        };
        let Some(binary_name) = rest.strip_suffix(".class") else {
            continue;
        };
        if binary_name == "module-info" || seen.contains_key(binary_name) {
            continue;
        }
        seen.insert(binary_name.to_string(), ());
        builder.insert(
            binary_name.to_string(),
            IndexedClass {
                provider: Provider::File(path.clone()),
                origin,
            },
        );
    }
    Ok(builder.finish())
}
