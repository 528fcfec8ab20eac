//! Whole-compilation driver, including the reduced-classpath state machine:
//! compile speculatively against a subset of the classpath, and fall back to
//! the full classpath (internally or by signaling the caller) when a symbol
//! fails to resolve.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;

use gale_archive::{JarBuilder, Manifest};
use gale_binder::{bind, BoundResult, ClassSymbol};
use gale_classpath::{platform_from_release, platform_from_system, ClassPathIndex};
use gale_core::{DiagnosticKind, Diagnostics};
use gale_deps::{collect_dependencies, reduce_classpath, Dependencies};
use gale_lower::{lower_class, lower_module, transitive_headers, TRANSITIVE_PREFIX};
use gale_syntax::{is_java_source, parse_source, SourceFile};

use crate::options::{GaleOptions, ReduceClasspathMode};
use crate::{GaleError, Result};

/// What a compilation did, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSummary {
    /// Whether the reduced-classpath attempt had to be redone in full.
    pub fell_back: bool,
    /// Entries in the classpath the successful attempt used.
    pub reduced_classpath: usize,
    /// Entries in the transitive classpath.
    pub transitive_classpath: usize,
}

pub fn run(options: &GaleOptions) -> Result<CompileSummary> {
    let units = load_sources(options)?;
    let boot = bootclasspath(options)?;

    let transitive = options.classpath.clone();

    match options.reduce_classpath_mode {
        ReduceClasspathMode::None | ReduceClasspathMode::BazelFallback => {
            let bound = attempt(&units, &boot, &transitive)?;
            check_diagnostics(bound.diagnostics.clone())?;
            emit(options, &bound, false)?;
            Ok(CompileSummary {
                fell_back: options.reduce_classpath_mode == ReduceClasspathMode::BazelFallback,
                reduced_classpath: transitive.len(),
                transitive_classpath: transitive.len(),
            })
        }
        ReduceClasspathMode::JavabuilderReduced => {
            let reduced = reduced_classpath(options)?;
            tracing::debug!(
                reduced = reduced.len(),
                transitive = transitive.len(),
                "attempting reduced classpath"
            );
            let bound = attempt(&units, &boot, &reduced)?;
            if !bound.diagnostics.has_kind(DiagnosticKind::SymbolNotFound) {
                check_diagnostics(bound.diagnostics.clone())?;
                emit(options, &bound, false)?;
                return Ok(CompileSummary {
                    fell_back: false,
                    reduced_classpath: reduced.len(),
                    transitive_classpath: transitive.len(),
                });
            }
            // A missing symbol may live in the part of the classpath the
            // reduction dropped; retry with everything.
            tracing::debug!("reduced classpath attempt failed, retrying in full");
            let bound = attempt(&units, &boot, &transitive)?;
            check_diagnostics(bound.diagnostics.clone())?;
            emit(options, &bound, true)?;
            Ok(CompileSummary {
                fell_back: true,
                reduced_classpath: reduced.len(),
                transitive_classpath: transitive.len(),
            })
        }
        ReduceClasspathMode::BazelReduced => {
            // The classpath we were handed is already reduced; on failure we
            // only signal the caller to rerun us with the full classpath.
            let bound = attempt(&units, &boot, &transitive)?;
            if bound.diagnostics.has_kind(DiagnosticKind::SymbolNotFound) {
                tracing::debug!("requesting external reduced-classpath fallback");
                write_fallback_marker(options)?;
                return Ok(CompileSummary {
                    fell_back: true,
                    reduced_classpath: transitive.len(),
                    transitive_classpath: transitive.len(),
                });
            }
            check_diagnostics(bound.diagnostics.clone())?;
            emit(options, &bound, false)?;
            Ok(CompileSummary {
                fell_back: false,
                reduced_classpath: transitive.len(),
                transitive_classpath: transitive.len(),
            })
        }
    }
}

fn load_sources(options: &GaleOptions) -> Result<Vec<Rc<SourceFile>>> {
    let mut units = Vec::new();
    let mut diagnostics = Diagnostics::default();

    let mut paths = options.sources.clone();
    paths.sort();
    for path in &paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source {}", path.display()))?;
        match parse_source(path.clone(), &text) {
            Ok(unit) => units.push(Rc::new(unit)),
            // A malformed file aborts that file only; the rest still parse
            // so one run reports as much as possible.
            Err(diagnostic) => diagnostics.push(diagnostic),
        }
    }

    let mut jars = options.source_jars.clone();
    jars.sort();
    for jar in &jars {
        let archive = gale_archive::Archive::new(jar);
        let mut entries = archive.entry_names().map_err(fatal)?;
        entries.sort();
        for entry in entries {
            if !is_java_source(std::path::Path::new(&entry)) {
                continue;
            }
            let bytes = archive
                .read(&entry)
                .map_err(fatal)?
                .unwrap_or_default();
            let text = String::from_utf8_lossy(&bytes);
            let virtual_path = format!("{}!/{}", jar.display(), entry);
            match parse_source(virtual_path, &text) {
                Ok(unit) => units.push(Rc::new(unit)),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }
    }

    if !diagnostics.is_empty() {
        return Err(GaleError::Compile(diagnostics));
    }
    Ok(units)
}

fn bootclasspath(options: &GaleOptions) -> Result<ClassPathIndex> {
    if let Some(release) = options.effective_release() {
        let java_home = std::env::var_os("JAVA_HOME").ok_or_else(|| {
            GaleError::Usage("--release requires JAVA_HOME to locate the signature archive".into())
        })?;
        return platform_from_release(std::path::Path::new(&java_home), release)
            .map_err(classpath_error);
    }
    if let Some(system) = &options.system {
        return platform_from_system(system).map_err(classpath_error);
    }
    ClassPathIndex::from_jars(&options.bootclasspath).map_err(classpath_error)
}

/// A classpath archive that cannot be opened is a misconfigured invocation;
/// a corrupt one is a fatal error.
fn classpath_error(err: gale_classpath::ClasspathError) -> GaleError {
    match &err {
        gale_classpath::ClasspathError::Archive(gale_archive::ArchiveError::Open {
            path, ..
        }) => GaleError::Usage(format!("missing classpath entry: {}", path.display())),
        _ => GaleError::Fatal(anyhow::Error::new(err)),
    }
}

fn reduced_classpath(options: &GaleOptions) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for path in &options.deps_artifacts {
        artifacts.push(Dependencies::read_from(path).map_err(fatal)?);
    }
    Ok(reduce_classpath(
        &options.classpath,
        &options.direct_dependencies,
        &artifacts,
    ))
}

fn attempt(
    units: &[Rc<SourceFile>],
    boot: &ClassPathIndex,
    classpath: &[PathBuf],
) -> Result<BoundResult> {
    let classpath = ClassPathIndex::from_jars(classpath).map_err(classpath_error)?;
    Ok(bind(units, boot.clone(), classpath))
}

fn check_diagnostics(diagnostics: Diagnostics) -> Result<()> {
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(GaleError::Compile(diagnostics))
    }
}

fn emit(options: &GaleOptions, bound: &BoundResult, fell_back: bool) -> Result<()> {
    let env = bound.env();

    let manifest = Manifest {
        target_label: options.target_label.clone(),
        injecting_rule_kind: options.injecting_rule_kind.clone(),
    };
    let mut jar = JarBuilder::create(&options.output, &manifest).map_err(fatal)?;

    // Classes are keyed by binary name, so iteration order is the canonical
    // output order.
    for (sym, class) in &bound.classes {
        let lowered = lower_class(&env, class);
        let bytes = lowered
            .to_bytes()
            .with_context(|| format!("failed to serialize {sym}"))?;
        jar.add_entry(&format!("{}.class", sym.binary_name()), &bytes)
            .map_err(fatal)?;
    }
    for module in &bound.modules {
        let lowered = lower_module(module);
        let bytes = lowered.to_bytes().context("failed to serialize module-info")?;
        jar.add_entry("module-info.class", &bytes).map_err(fatal)?;
    }

    let roots: Vec<ClassSymbol> = bound.classes.keys().cloned().collect();
    let mut transitive = transitive_headers(&env, &roots);
    transitive.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (sym, classfile) in &transitive {
        let bytes = classfile
            .to_bytes()
            .with_context(|| format!("failed to serialize trimmed {sym}"))?;
        jar.add_entry(
            &format!("{TRANSITIVE_PREFIX}{}.class", sym.binary_name()),
            &bytes,
        )
        .map_err(fatal)?;
    }

    jar.finish().map_err(fatal)?;

    if let Some(output_deps) = &options.output_deps {
        let record = Dependencies {
            dependency: collect_dependencies(&env, &roots),
            rule_label: options.target_label.clone().unwrap_or_default(),
            success: true,
            requires_reduced_classpath_fallback: fell_back,
        };
        record.write_to(output_deps).map_err(fatal)?;
    }

    Ok(())
}

/// The external-fallback marker: a dependency record telling the caller to
/// rerun with the full transitive classpath. No jar is produced.
fn write_fallback_marker(options: &GaleOptions) -> Result<()> {
    if let Some(output_deps) = &options.output_deps {
        let record = Dependencies {
            dependency: Vec::new(),
            rule_label: options.target_label.clone().unwrap_or_default(),
            success: false,
            requires_reduced_classpath_fallback: true,
        };
        record.write_to(output_deps).map_err(fatal)?;
    }
    Ok(())
}

fn fatal(err: impl std::error::Error + Send + Sync + 'static) -> GaleError {
    GaleError::Fatal(anyhow::Error::new(err))
}
