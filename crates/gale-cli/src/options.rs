//! The command-line surface. Flag names are part of the build-tool
//! interface and spelled exactly as build systems pass them.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::GaleError;

#[derive(Debug, Clone, Parser)]
#[command(name = "gale", disable_help_flag = false)]
pub struct GaleOptions {
    /// Path of the header jar to emit.
    #[arg(long)]
    pub output: PathBuf,

    /// Source files to compile.
    #[arg(long, num_args(0..))]
    pub sources: Vec<PathBuf>,

    /// Source archives whose `.java` entries are compiled in.
    #[arg(long = "source_jars", num_args(0..))]
    pub source_jars: Vec<PathBuf>,

    /// The transitive classpath, in order.
    #[arg(long, num_args(0..))]
    pub classpath: Vec<PathBuf>,

    /// The subset of the classpath that is a direct dependency.
    #[arg(long = "direct_dependencies", num_args(0..))]
    pub direct_dependencies: Vec<PathBuf>,

    /// Boot classpath archives.
    #[arg(long, num_args(0..))]
    pub bootclasspath: Vec<PathBuf>,

    /// Platform image root.
    #[arg(long, conflicts_with = "release")]
    pub system: Option<PathBuf>,

    /// Platform release number.
    #[arg(long)]
    pub release: Option<u32>,

    /// Path of the dependency record to emit.
    #[arg(long = "output_deps")]
    pub output_deps: Option<PathBuf>,

    /// Dependency records of direct dependencies.
    #[arg(long = "deps_artifacts", num_args(0..))]
    pub deps_artifacts: Vec<PathBuf>,

    /// Stamped into the manifest and the dependency record.
    #[arg(long = "target_label")]
    pub target_label: Option<String>,

    #[arg(long = "injecting_rule_kind")]
    pub injecting_rule_kind: Option<String>,

    /// Opaque compiler options; `-source`, `-target`, and `--release` are
    /// extracted, the rest ignored.
    #[arg(long, num_args(0..), allow_hyphen_values = true, value_terminator = "--")]
    pub javacopts: Vec<String>,

    #[arg(long = "reduce_classpath_mode", value_enum, default_value = "NONE")]
    pub reduce_classpath_mode: ReduceClasspathMode,

    /// Annotation processors. Accepted for build-tool compatibility and
    /// ignored: gale drops processing entirely.
    #[arg(long, num_args(0..))]
    pub processors: Vec<String>,

    #[arg(long, num_args(0..))]
    pub processorpath: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReduceClasspathMode {
    #[value(name = "BAZEL_REDUCED")]
    BazelReduced,
    #[value(name = "BAZEL_FALLBACK")]
    BazelFallback,
    #[value(name = "JAVABUILDER_REDUCED")]
    JavabuilderReduced,
    #[value(name = "NONE")]
    None,
}

impl GaleOptions {
    /// Parse an argument list, `@file` expansion included.
    pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, GaleError> {
        let expanded = expand_params(args.into_iter())?;
        let mut with_argv0 = vec!["gale".to_string()];
        with_argv0.extend(expanded);
        GaleOptions::try_parse_from(with_argv0).map_err(|err| GaleError::Usage(err.to_string()))
    }

    /// The `--release` value from `--javacopts`, when the flag itself was
    /// not passed.
    pub fn effective_release(&self) -> Option<u32> {
        if self.release.is_some() {
            return self.release;
        }
        let mut iter = self.javacopts.iter();
        while let Some(opt) = iter.next() {
            if opt == "--release" {
                return iter.next().and_then(|v| v.parse().ok());
            }
        }
        None
    }
}

/// Expand `@file` arguments: the file is read as whitespace-separated
/// arguments, recursively. `@@foo` escapes a literal `@foo` argument.
fn expand_params(args: impl Iterator<Item = String>) -> Result<Vec<String>, GaleError> {
    let mut out = Vec::new();
    for arg in args {
        expand_one(&arg, &mut out, 0)?;
    }
    Ok(out)
}

fn expand_one(arg: &str, out: &mut Vec<String>, depth: u32) -> Result<(), GaleError> {
    if depth > 8 {
        return Err(GaleError::Usage("params files nested too deeply".to_string()));
    }
    if let Some(escaped) = arg.strip_prefix("@@") {
        out.push(format!("@{escaped}"));
        return Ok(());
    }
    if let Some(path) = arg.strip_prefix('@') {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| GaleError::Usage(format!("failed to read params file {path}: {err}")))?;
        for token in contents.split_whitespace() {
            expand_one(token, out, depth + 1)?;
        }
        return Ok(());
    }
    out.push(arg.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<GaleOptions, GaleError> {
        GaleOptions::parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn basic_flags() {
        let options = parse(&[
            "--output",
            "out.jar",
            "--sources",
            "A.java",
            "B.java",
            "--classpath",
            "x.jar",
            "y.jar",
            "--reduce_classpath_mode",
            "JAVABUILDER_REDUCED",
        ])
        .unwrap();
        assert_eq!(options.output, PathBuf::from("out.jar"));
        assert_eq!(options.sources.len(), 2);
        assert_eq!(options.classpath.len(), 2);
        assert_eq!(
            options.reduce_classpath_mode,
            ReduceClasspathMode::JavabuilderReduced
        );
    }

    #[test]
    fn missing_output_is_a_usage_error() {
        assert!(matches!(
            parse(&["--sources", "A.java"]),
            Err(GaleError::Usage(_))
        ));
    }

    #[test]
    fn release_and_system_conflict() {
        assert!(matches!(
            parse(&["--output", "o.jar", "--release", "11", "--system", "jdk"]),
            Err(GaleError::Usage(_))
        ));
    }

    #[test]
    fn javacopts_terminate_at_double_dash() {
        let options = parse(&[
            "--output",
            "o.jar",
            "--javacopts",
            "-source",
            "8",
            "--release",
            "11",
            "--",
            "--sources",
            "A.java",
        ])
        .unwrap();
        assert_eq!(options.javacopts, vec!["-source", "8", "--release", "11"]);
        assert_eq!(options.sources, vec![PathBuf::from("A.java")]);
        assert_eq!(options.effective_release(), Some(11));
    }

    #[test]
    fn params_file_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner.params");
        std::fs::write(&inner, "--sources A.java B.java").unwrap();
        let outer = dir.path().join("outer.params");
        std::fs::write(
            &outer,
            format!("--output o.jar @{}", inner.display()),
        )
        .unwrap();

        let options = parse(&[&format!("@{}", outer.display())]).unwrap();
        assert_eq!(options.output, PathBuf::from("o.jar"));
        assert_eq!(options.sources.len(), 2);
    }

    #[test]
    fn double_at_escapes() {
        let mut out = Vec::new();
        expand_one("@@literal", &mut out, 0).unwrap();
        assert_eq!(out, vec!["@literal".to_string()]);
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        assert!(matches!(
            parse(&["--output", "o.jar", "--no_such_flag"]),
            Err(GaleError::Usage(_))
        ));
    }
}
