use std::io::Read;
use std::path::{Path, PathBuf};

use gale_classfile::{access, ClassFile};
use gale_cli::driver::{self, CompileSummary};
use gale_cli::options::GaleOptions;
use gale_cli::GaleError;
use gale_deps::Dependencies;
use pretty_assertions::assert_eq;

fn write_class_jar(path: &Path, classes: &[ClassFile]) {
    use std::io::Write;
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for cf in classes {
        zip.start_file(format!("{}.class", cf.this_class), options)
            .unwrap();
        zip.write_all(&cf.to_bytes().unwrap()).unwrap();
    }
    zip.finish().unwrap();
}

fn simple_class(name: &str, superclass: Option<&str>) -> ClassFile {
    let mut cf = ClassFile::new(name);
    cf.access_flags = access::ACC_PUBLIC | access::ACC_SUPER;
    cf.super_class = superclass.map(str::to_owned);
    cf
}

fn boot_jar(dir: &Path) -> PathBuf {
    let path = dir.join("boot.jar");
    write_class_jar(
        &path,
        &[
            simple_class("java/lang/Object", None),
            simple_class("java/lang/String", Some("java/lang/Object")),
            simple_class("java/lang/Enum", Some("java/lang/Object")),
        ],
    );
    path
}

fn parse_options(args: &[String]) -> GaleOptions {
    GaleOptions::parse_args(args.iter().cloned()).unwrap()
}

struct Fixture {
    dir: tempfile::TempDir,
    boot: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let boot = boot_jar(dir.path());
        Self { dir, boot }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_source(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    fn base_args(&self, output: &str) -> Vec<String> {
        vec![
            "--output".to_string(),
            self.path().join(output).display().to_string(),
            "--bootclasspath".to_string(),
            self.boot.display().to_string(),
        ]
    }
}

fn jar_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(str::to_owned).collect()
}

#[test]
fn compiles_a_header_jar() {
    let fixture = Fixture::new();
    let source = fixture.write_source(
        "src/a/Hello.java",
        "package a; public class Hello { public static final int VERSION = 3; }",
    );

    let mut args = fixture.base_args("out.jar");
    args.extend(["--sources".to_string(), source.display().to_string()]);
    let summary = driver::run(&parse_options(&args)).unwrap();
    assert_eq!(
        summary,
        CompileSummary {
            fell_back: false,
            reduced_classpath: 0,
            transitive_classpath: 0,
        }
    );

    let out = fixture.path().join("out.jar");
    assert_eq!(
        jar_entries(&out),
        vec!["META-INF/", "META-INF/MANIFEST.MF", "a/Hello.class"]
    );

    let file = std::fs::File::open(&out).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut bytes = Vec::new();
    archive
        .by_name("a/Hello.class")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    let parsed = ClassFile::parse(&bytes).unwrap();
    assert_eq!(parsed.this_class, "a/Hello");
    let version = parsed.fields.iter().find(|f| f.name == "VERSION").unwrap();
    assert_eq!(
        version.constant_value,
        Some(gale_classfile::ConstantValue::Int(3))
    );
}

#[test]
fn manifest_stamping() {
    let fixture = Fixture::new();
    let source = fixture.write_source("src/a/A.java", "package a; public class A {}");

    let mut args = fixture.base_args("out.jar");
    args.extend([
        "--sources".to_string(),
        source.display().to_string(),
        "--target_label".to_string(),
        "//java/com/example:lib".to_string(),
        "--injecting_rule_kind".to_string(),
        "java_library".to_string(),
    ]);
    driver::run(&parse_options(&args)).unwrap();

    let file = std::fs::File::open(fixture.path().join("out.jar")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut manifest = String::new();
    let mut entry = archive.by_name("META-INF/MANIFEST.MF").unwrap();
    let dt = entry.last_modified().unwrap();
    assert_eq!(
        (dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), dt.second()),
        (2010, 1, 1, 0, 0, 0)
    );
    entry.read_to_string(&mut manifest).unwrap();
    assert!(manifest.contains("Manifest-Version: 1.0"));
    assert!(manifest.contains("Created-By: gale"));
    assert!(manifest.contains("Target-Label: //java/com/example:lib"));
    assert!(manifest.contains("Injecting-Rule-Kind: java_library"));
}

#[test]
fn output_is_deterministic() {
    let fixture = Fixture::new();
    let a = fixture.write_source(
        "src/a/A.java",
        "package a; public class A { public static final String S = \"x\" + 1; }",
    );
    let b = fixture.write_source("src/b/B.java", "package b; public class B extends a.A {}");

    let compile = |output: &str| {
        let mut args = fixture.base_args(output);
        args.extend([
            "--sources".to_string(),
            a.display().to_string(),
            b.display().to_string(),
        ]);
        driver::run(&parse_options(&args)).unwrap();
        std::fs::read(fixture.path().join(output)).unwrap()
    };

    assert_eq!(compile("one.jar"), compile("two.jar"));
}

#[test]
fn reduced_classpath_fallback_matches_full_compilation() {
    let fixture = Fixture::new();

    // Three classpath jars; the needed one is not in the reduced set.
    let a_jar = fixture.path().join("a.jar");
    write_class_jar(&a_jar, &[simple_class("liba/A", Some("java/lang/Object"))]);
    let b_jar = fixture.path().join("b.jar");
    write_class_jar(&b_jar, &[simple_class("libb/B", Some("java/lang/Object"))]);
    let c_jar = fixture.path().join("c.jar");
    write_class_jar(&c_jar, &[simple_class("libc/C", Some("java/lang/Object"))]);

    // a.jar's own record pins b.jar, so the reduced set is {a, b}.
    let a_deps = fixture.path().join("a.jdeps");
    Dependencies {
        dependency: vec![gale_deps::Dependency {
            path: b_jar.display().to_string(),
            kind: gale_deps::Kind::Explicit as i32,
        }],
        rule_label: String::new(),
        success: true,
        requires_reduced_classpath_fallback: false,
    }
    .write_to(&a_deps)
    .unwrap();

    let source = fixture.write_source(
        "src/u/Use.java",
        "package u; public class Use extends libc.C {}",
    );

    let classpath_args = |args: &mut Vec<String>| {
        args.push("--classpath".to_string());
        args.push(a_jar.display().to_string());
        args.push(b_jar.display().to_string());
        args.push(c_jar.display().to_string());
    };

    // Reference run with no reduction.
    let mut full_args = fixture.base_args("full.jar");
    classpath_args(&mut full_args);
    full_args.extend(["--sources".to_string(), source.display().to_string()]);
    let full_summary = driver::run(&parse_options(&full_args)).unwrap();
    assert!(!full_summary.fell_back);

    // Speculative run; libc.C is missing from the reduced set, so the
    // driver falls back and must produce a bit-identical jar.
    let mut reduced_args = fixture.base_args("reduced.jar");
    classpath_args(&mut reduced_args);
    reduced_args.extend([
        "--sources".to_string(),
        source.display().to_string(),
        "--direct_dependencies".to_string(),
        a_jar.display().to_string(),
        "--deps_artifacts".to_string(),
        a_deps.display().to_string(),
        "--reduce_classpath_mode".to_string(),
        "JAVABUILDER_REDUCED".to_string(),
        "--output_deps".to_string(),
        fixture.path().join("out.jdeps").display().to_string(),
    ]);
    let summary = driver::run(&parse_options(&reduced_args)).unwrap();
    assert_eq!(
        summary,
        CompileSummary {
            fell_back: true,
            reduced_classpath: 2,
            transitive_classpath: 3,
        }
    );

    assert_eq!(
        std::fs::read(fixture.path().join("full.jar")).unwrap(),
        std::fs::read(fixture.path().join("reduced.jar")).unwrap()
    );

    let record =
        Dependencies::read_from(&fixture.path().join("out.jdeps")).unwrap();
    assert!(record.success);
    assert!(record.requires_reduced_classpath_fallback);
    assert_eq!(record.dependency.len(), 1);
    assert!(record.dependency[0].path.ends_with("c.jar"));
}

#[test]
fn bazel_reduced_mode_requests_external_fallback() {
    let fixture = Fixture::new();
    let source = fixture.write_source(
        "src/u/Use.java",
        "package u; public class Use extends missing.M {}",
    );

    let mut args = fixture.base_args("out.jar");
    args.extend([
        "--sources".to_string(),
        source.display().to_string(),
        "--reduce_classpath_mode".to_string(),
        "BAZEL_REDUCED".to_string(),
        "--output_deps".to_string(),
        fixture.path().join("out.jdeps").display().to_string(),
    ]);

    // Exits successfully with a marker instead of failing.
    let summary = driver::run(&parse_options(&args)).unwrap();
    assert!(summary.fell_back);
    let record = Dependencies::read_from(&fixture.path().join("out.jdeps")).unwrap();
    assert!(!record.success);
    assert!(record.requires_reduced_classpath_fallback);
    assert!(!fixture.path().join("out.jar").exists());
}

#[test]
fn transitive_supertypes_are_emitted_and_recorded() {
    let fixture = Fixture::new();
    let dep_jar = fixture.path().join("dep.jar");
    write_class_jar(
        &dep_jar,
        &[
            simple_class("dep/Base", Some("dep/Root")),
            simple_class("dep/Root", Some("java/lang/Object")),
        ],
    );
    let source = fixture.write_source(
        "src/u/Sub.java",
        "package u; public class Sub extends dep.Base {}",
    );

    let mut args = fixture.base_args("out.jar");
    args.extend([
        "--classpath".to_string(),
        dep_jar.display().to_string(),
        "--sources".to_string(),
        source.display().to_string(),
        "--output_deps".to_string(),
        fixture.path().join("out.jdeps").display().to_string(),
    ]);
    driver::run(&parse_options(&args)).unwrap();

    let entries = jar_entries(&fixture.path().join("out.jar"));
    assert!(entries.contains(&"u/Sub.class".to_string()));
    assert!(entries.contains(&"META-INF/TRANSITIVE/dep/Base.class".to_string()));
    assert!(entries.contains(&"META-INF/TRANSITIVE/dep/Root.class".to_string()));

    let record = Dependencies::read_from(&fixture.path().join("out.jdeps")).unwrap();
    assert_eq!(record.dependency.len(), 1);
    assert!(record.dependency[0].path.ends_with("dep.jar"));
    assert_eq!(record.dependency[0].kind, gale_deps::Kind::Explicit as i32);
}

#[test]
fn duplicate_declarations_across_source_jars_fail() {
    let fixture = Fixture::new();
    use std::io::Write;
    let make_source_jar = |name: &str| {
        let path = fixture.path().join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("Test.java", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"class Test {}").unwrap();
        zip.finish().unwrap();
        path
    };
    let one = make_source_jar("one-src.jar");
    let two = make_source_jar("two-src.jar");

    let mut args = fixture.base_args("out.jar");
    args.extend([
        "--source_jars".to_string(),
        one.display().to_string(),
        two.display().to_string(),
    ]);

    match driver::run(&parse_options(&args)) {
        Err(GaleError::Compile(diagnostics)) => {
            assert!(diagnostics
                .iter()
                .any(|d| d.message.contains("duplicate declaration of Test")));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn module_info_is_lowered() {
    let fixture = Fixture::new();
    let source = fixture.write_source(
        "src/module-info.java",
        "module com.example { exports com.example.api; }",
    );

    let mut args = fixture.base_args("out.jar");
    args.extend(["--sources".to_string(), source.display().to_string()]);
    driver::run(&parse_options(&args)).unwrap();

    let file = std::fs::File::open(fixture.path().join("out.jar")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut bytes = Vec::new();
    archive
        .by_name("module-info.class")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    let parsed = ClassFile::parse(&bytes).unwrap();
    let module = parsed.module.unwrap();
    assert_eq!(module.name, "com.example");
    assert!(module.requires.iter().any(|r| r.module == "java.base"));
    assert_eq!(module.exports[0].package, "com/example/api");
}
