use std::path::{Path, PathBuf};
use std::rc::Rc;

use gale_binder::{bind, BoundResult, ClassSymbol};
use gale_classfile::{access, ClassFile, ConstantValue};
use gale_classpath::ClassPathIndex;
use gale_lower::{lower_class, transitive_headers, trim_class};
use gale_syntax::parse_source;

fn boot_jar(dir: &Path) -> PathBuf {
    use std::io::Write;

    fn class(name: &str, superclass: Option<&str>) -> ClassFile {
        let mut cf = ClassFile::new(name);
        cf.access_flags = access::ACC_PUBLIC | access::ACC_SUPER;
        cf.super_class = superclass.map(str::to_owned);
        cf
    }

    let mut comparable = class("java/lang/Comparable", Some("java/lang/Object"));
    comparable.access_flags =
        access::ACC_PUBLIC | access::ACC_INTERFACE | access::ACC_ABSTRACT;

    let classes = vec![
        class("java/lang/Object", None),
        class("java/lang/String", Some("java/lang/Object")),
        class("java/lang/Enum", Some("java/lang/Object")),
        class("java/lang/Exception", Some("java/lang/Object")),
        comparable,
    ];

    let path = dir.join("boot.jar");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for cf in &classes {
        zip.start_file(format!("{}.class", cf.this_class), options)
            .unwrap();
        zip.write_all(&cf.to_bytes().unwrap()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn dep_jar(dir: &Path) -> PathBuf {
    use std::io::Write;

    let mut base = ClassFile::new("dep/Base");
    base.access_flags = access::ACC_PUBLIC | access::ACC_SUPER;
    base.super_class = Some("dep/Root".to_string());
    base.fields.push(gale_classfile::FieldInfo {
        access_flags: access::ACC_PUBLIC | access::ACC_STATIC | access::ACC_FINAL,
        name: "K".to_string(),
        descriptor: "I".to_string(),
        signature: None,
        constant_value: Some(ConstantValue::Int(9)),
        visible_annotations: Vec::new(),
        invisible_annotations: Vec::new(),
        visible_type_annotations: Vec::new(),
        invisible_type_annotations: Vec::new(),
    });
    base.methods.push(gale_classfile::MethodInfo {
        access_flags: access::ACC_PUBLIC,
        name: "helper".to_string(),
        descriptor: "()V".to_string(),
        signature: None,
        exceptions: Vec::new(),
        annotation_default: None,
        visible_annotations: Vec::new(),
        invisible_annotations: Vec::new(),
        visible_parameter_annotations: Vec::new(),
        invisible_parameter_annotations: Vec::new(),
        visible_type_annotations: Vec::new(),
        invisible_type_annotations: Vec::new(),
    });

    let mut root = ClassFile::new("dep/Root");
    root.access_flags = access::ACC_PUBLIC | access::ACC_SUPER;
    root.super_class = Some("java/lang/Object".to_string());

    let mut unrelated = ClassFile::new("dep/Unrelated");
    unrelated.access_flags = access::ACC_PUBLIC | access::ACC_SUPER;
    unrelated.super_class = Some("java/lang/Object".to_string());

    let path = dir.join("dep.jar");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for cf in [&base, &root, &unrelated] {
        zip.start_file(format!("{}.class", cf.this_class), options)
            .unwrap();
        zip.write_all(&cf.to_bytes().unwrap()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn bind_with_dep(sources: &[(&str, &str)]) -> BoundResult {
    let dir = tempfile::tempdir().unwrap();
    let boot = ClassPathIndex::from_jars(&[boot_jar(dir.path())]).unwrap();
    let classpath = ClassPathIndex::from_jars(&[dep_jar(dir.path())]).unwrap();
    let units: Vec<_> = sources
        .iter()
        .map(|(path, text)| Rc::new(parse_source(*path, text).unwrap()))
        .collect();
    bind(&units, boot, classpath)
}

fn sym(name: &str) -> ClassSymbol {
    ClassSymbol::new(name)
}

#[test]
fn lowered_class_reparses_equivalently() {
    let result = bind_with_dep(&[(
        "a/Box.java",
        r#"package a;
public class Box<T extends Comparable> {
    public static final long LIMIT = 1L << 32;
    private T contents;
    public T get() throws Exception { return contents; }
    public void put(T value, int count) {}
}"#,
    )]);
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );

    let env = result.env();
    let lowered = lower_class(&env, &result.classes[&sym("a/Box")]);
    assert_eq!(lowered.this_class, "a/Box");
    assert_eq!(
        lowered.signature.as_deref(),
        Some("<T::Ljava/lang/Comparable;>Ljava/lang/Object;")
    );

    let limit = lowered.fields.iter().find(|f| f.name == "LIMIT").unwrap();
    assert_eq!(limit.constant_value, Some(ConstantValue::Long(1 << 32)));

    let contents = lowered.fields.iter().find(|f| f.name == "contents").unwrap();
    // T erases to its bound.
    assert_eq!(contents.descriptor, "Ljava/lang/Comparable;");
    assert_eq!(contents.signature.as_deref(), Some("TT;"));

    let get = lowered.methods.iter().find(|m| m.name == "get").unwrap();
    assert_eq!(get.descriptor, "()Ljava/lang/Comparable;");
    assert_eq!(get.signature.as_deref(), Some("()TT;"));
    assert_eq!(get.exceptions, vec!["java/lang/Exception".to_string()]);

    let put = lowered.methods.iter().find(|m| m.name == "put").unwrap();
    assert_eq!(put.descriptor, "(Ljava/lang/Comparable;I)V");

    // Property: emitted bytes parse back to an equivalent structure.
    let reparsed = ClassFile::parse(&lowered.to_bytes().unwrap()).unwrap();
    assert_eq!(reparsed, lowered);
}

#[test]
fn nested_classes_get_inner_class_entries() {
    let result = bind_with_dep(&[(
        "a/Outer.java",
        "package a; public class Outer { protected class Inner {} }",
    )]);
    assert!(result.diagnostics.is_empty());
    let env = result.env();

    let outer = lower_class(&env, &result.classes[&sym("a/Outer")]);
    let entries: Vec<_> = outer
        .inner_classes
        .iter()
        .map(|i| i.inner_class.as_str())
        .collect();
    assert_eq!(entries, vec!["a/Outer$Inner"]);

    let inner = lower_class(&env, &result.classes[&sym("a/Outer$Inner")]);
    // Protected member classes surface as public at the class level; the
    // InnerClasses entry keeps the real access.
    assert_ne!(inner.access_flags & access::ACC_PUBLIC, 0);
    assert_eq!(inner.access_flags & access::ACC_PROTECTED, 0);
    let self_entry = inner
        .inner_classes
        .iter()
        .find(|i| i.inner_class == "a/Outer$Inner")
        .unwrap();
    assert_ne!(self_entry.access_flags & access::ACC_PROTECTED, 0);
    assert_eq!(self_entry.inner_name.as_deref(), Some("Inner"));
    assert_eq!(self_entry.outer_class.as_deref(), Some("a/Outer"));
}

#[test]
fn enum_lowering() {
    let result = bind_with_dep(&[("a/E.java", "package a; public enum E { ONE, TWO }")]);
    assert!(result.diagnostics.is_empty());
    let lowered = lower_class(&result.env(), &result.classes[&sym("a/E")]);

    assert_ne!(lowered.access_flags & access::ACC_ENUM, 0);
    assert_eq!(lowered.super_class.as_deref(), Some("java/lang/Enum"));
    assert_eq!(
        lowered.signature.as_deref(),
        Some("Ljava/lang/Enum<La/E;>;")
    );

    let one = lowered.fields.iter().find(|f| f.name == "ONE").unwrap();
    assert_eq!(one.descriptor, "La/E;");
    assert_ne!(one.access_flags & access::ACC_ENUM, 0);

    let values = lowered.methods.iter().find(|m| m.name == "values").unwrap();
    assert_eq!(values.descriptor, "()[La/E;");
    let value_of = lowered.methods.iter().find(|m| m.name == "valueOf").unwrap();
    assert_eq!(value_of.descriptor, "(Ljava/lang/String;)La/E;");
}

#[test]
fn annotation_arguments_survive_into_type_annotations() {
    use gale_classfile::{ElementValue, PrimValue, TargetInfo};

    let result = bind_with_dep(&[
        (
            "a/Tag.java",
            "package a; public @interface Tag { int value(); }",
        ),
        (
            "a/C.java",
            "package a; public class C<T extends @Tag(5) Comparable> { void f() throws @Tag(7) Exception {} }",
        ),
    ]);
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
    let lowered = lower_class(&result.env(), &result.classes[&sym("a/C")]);

    // Tag has default (class) retention, so its uses land in the invisible
    // type-annotation tables, arguments included.
    let on_bound = lowered
        .invisible_type_annotations
        .iter()
        .find(|t| matches!(t.target, TargetInfo::ClassTypeParameterBound { .. }))
        .unwrap();
    assert_eq!(on_bound.annotation.type_descriptor, "La/Tag;");
    assert_eq!(
        on_bound.annotation.elements,
        vec![("value".to_string(), ElementValue::Prim(PrimValue::Int(5)))]
    );

    let f = lowered.methods.iter().find(|m| m.name == "f").unwrap();
    let on_throws = f
        .invisible_type_annotations
        .iter()
        .find(|t| matches!(t.target, TargetInfo::Throws(0)))
        .unwrap();
    assert_eq!(
        on_throws.annotation.elements,
        vec![("value".to_string(), ElementValue::Prim(PrimValue::Int(7)))]
    );
}

#[test]
fn no_method_bodies_anywhere() {
    let result = bind_with_dep(&[(
        "a/C.java",
        "package a; public class C { public int f() { return 1 + 2 + 3; } }",
    )]);
    let lowered = lower_class(&result.env(), &result.classes[&sym("a/C")]);
    let bytes = lowered.to_bytes().unwrap();
    // A `Code` attribute name would have to be in the constant pool.
    let reparsed = ClassFile::parse(&bytes).unwrap();
    assert_eq!(reparsed.methods.len(), 2); // f and the default constructor
    assert!(!bytes.windows(4).any(|w| w == &b"Code"[..]));
}

#[test]
fn annotation_metadata_survives_reingestion() {
    use std::io::Write;

    // Compile an annotation declaration with meta-annotations...
    let dir = tempfile::tempdir().unwrap();
    let boot_path = boot_jar(dir.path());
    let meta_jar = dir.path().join("meta.jar");
    {
        // Meta-annotation interfaces and their element-type enum.
        let mut classes = Vec::new();
        for name in [
            "java/lang/annotation/Annotation",
            "java/lang/annotation/Retention",
            "java/lang/annotation/Target",
        ] {
            let mut cf = ClassFile::new(name);
            cf.access_flags = access::ACC_PUBLIC | access::ACC_INTERFACE | access::ACC_ABSTRACT;
            if name != "java/lang/annotation/Annotation" {
                cf.access_flags |= access::ACC_ANNOTATION;
                cf.interfaces = vec!["java/lang/annotation/Annotation".to_string()];
            }
            cf.super_class = Some("java/lang/Object".to_string());
            classes.push(cf);
        }
        for name in [
            "java/lang/annotation/RetentionPolicy",
            "java/lang/annotation/ElementType",
        ] {
            let mut cf = ClassFile::new(name);
            cf.access_flags =
                access::ACC_PUBLIC | access::ACC_SUPER | access::ACC_ENUM | access::ACC_FINAL;
            cf.super_class = Some("java/lang/Enum".to_string());
            let constants: &[&str] = if name.ends_with("RetentionPolicy") {
                &["SOURCE", "CLASS", "RUNTIME"]
            } else {
                &["TYPE", "TYPE_USE"]
            };
            for constant in constants {
                cf.fields.push(gale_classfile::FieldInfo {
                    access_flags: access::ACC_PUBLIC
                        | access::ACC_STATIC
                        | access::ACC_FINAL
                        | access::ACC_ENUM,
                    name: constant.to_string(),
                    descriptor: format!("L{name};"),
                    signature: None,
                    constant_value: None,
                    visible_annotations: Vec::new(),
                    invisible_annotations: Vec::new(),
                    visible_type_annotations: Vec::new(),
                    invisible_type_annotations: Vec::new(),
                });
            }
            classes.push(cf);
        }
        let file = std::fs::File::create(&meta_jar).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for cf in &classes {
            zip.start_file(format!("{}.class", cf.this_class), options)
                .unwrap();
            zip.write_all(&cf.to_bytes().unwrap()).unwrap();
        }
        zip.finish().unwrap();
    }

    let boot = ClassPathIndex::from_jars(&[boot_path.clone(), meta_jar.clone()]).unwrap();
    let units = vec![Rc::new(
        parse_source(
            "a/Marker.java",
            r#"package a;
import java.lang.annotation.*;
@Retention(RetentionPolicy.RUNTIME)
@Target({ElementType.TYPE, ElementType.TYPE_USE})
public @interface Marker {}"#,
        )
        .unwrap(),
    )];
    let result = bind(&units, boot, ClassPathIndex::default());
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
    let lowered = lower_class(&result.env(), &result.classes[&sym("a/Marker")]);

    // ...put the emitted class on a classpath and re-ingest it.
    let out_jar = dir.path().join("out.jar");
    {
        let file = std::fs::File::create(&out_jar).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(
            "a/Marker.class",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(&lowered.to_bytes().unwrap()).unwrap();
        zip.finish().unwrap();
    }

    let env = gale_binder::ClasspathEnv::new(
        ClassPathIndex::from_jars(&[boot_path, meta_jar]).unwrap(),
        ClassPathIndex::from_jars(&[out_jar]).unwrap(),
    );
    let marker = env.get(&sym("a/Marker")).unwrap();
    let metadata = marker.annotation_metadata();
    assert_eq!(metadata.retention, gale_binder::Retention::Runtime);
    assert!(metadata.target().contains(&"TYPE_USE".to_string()));
    assert!(metadata.target().contains(&"TYPE".to_string()));
}

#[test]
fn transitive_closure_is_collected_and_trimmed() {
    let result = bind_with_dep(&[(
        "a/Sub.java",
        "package a; public class Sub extends dep.Base {}",
    )]);
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
    let env = result.env();
    let roots: Vec<_> = result.classes.keys().cloned().collect();
    let headers = transitive_headers(&env, &roots);

    let names: Vec<_> = headers
        .iter()
        .map(|(sym, _)| sym.binary_name().to_string())
        .collect();
    // dep/Base then its super dep/Root; bootclasspath classes are excluded,
    // as is the unreferenced dep/Unrelated.
    assert_eq!(names, vec!["dep/Base", "dep/Root"]);

    let base = &headers[0].1;
    assert!(base.methods.is_empty());
    assert_eq!(base.fields.len(), 1);
    assert_eq!(base.fields[0].name, "K");
    assert_eq!(trim_class(base), *base);
}
