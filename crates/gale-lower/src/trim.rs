//! The transitive-header trimming step.
//!
//! Downstream consumers of a header jar also need the classpath supertypes
//! of the compiled classes, but only a sliver of each: signatures, constant
//! fields, and meta-annotations. Everything else is dropped, and the result
//! is emitted under a reserved prefix.

use gale_binder::{supertype_closure, BindingEnv, ClassSymbol};
use gale_classfile::access::*;
use gale_classfile::ClassFile;

/// Reserved output prefix for trimmed transitive supertypes.
pub const TRANSITIVE_PREFIX: &str = "META-INF/TRANSITIVE/";

const META_ANNOTATIONS: &[&str] = &[
    "Ljava/lang/annotation/Retention;",
    "Ljava/lang/annotation/Target;",
    "Ljava/lang/annotation/Repeatable;",
    "Ljava/lang/annotation/Documented;",
    "Ljava/lang/annotation/Inherited;",
];

/// Trim a class file down to what transitive consumers need. Idempotent:
/// trimming a trimmed class is the identity.
pub fn trim_class(class: &ClassFile) -> ClassFile {
    let mut out = class.clone();

    // Methods carry no header value on ordinary classes; annotation
    // declarations keep theirs (elements and defaults are the API).
    if out.access_flags & ACC_ANNOTATION == 0 {
        out.methods.clear();
    } else {
        for method in &mut out.methods {
            method.visible_annotations.retain(is_meta_annotation);
            method.invisible_annotations.retain(is_meta_annotation);
            method.visible_parameter_annotations.clear();
            method.invisible_parameter_annotations.clear();
            method.visible_type_annotations.clear();
            method.invisible_type_annotations.clear();
        }
    }

    // Only constant fields survive.
    out.fields.retain(|field| field.constant_value.is_some());
    for field in &mut out.fields {
        field.visible_annotations.retain(is_meta_annotation);
        field.invisible_annotations.retain(is_meta_annotation);
        field.visible_type_annotations.clear();
        field.invisible_type_annotations.clear();
    }

    out.visible_annotations.retain(is_meta_annotation);
    out.invisible_annotations.retain(is_meta_annotation);
    out.visible_type_annotations.clear();
    out.invisible_type_annotations.clear();

    let this = out.this_class.clone();
    let parent = this.rsplit_once('$').map(|(outer, _)| outer.to_string());
    out.inner_classes.retain(|inner| {
        inner.inner_class == this || Some(&inner.inner_class) == parent.as_ref()
    });

    out.record_components = None;
    out
}

fn is_meta_annotation(anno: &gale_classfile::Annotation) -> bool {
    META_ANNOTATIONS.contains(&anno.type_descriptor.as_str())
}

/// The trimmed transitive supertypes of the compiled classes: every closure
/// member that lives on the classpath (not the bootclasspath), as
/// `(binary name, trimmed class)` pairs in closure order.
pub fn transitive_headers(
    env: &BindingEnv<'_>,
    roots: &[ClassSymbol],
) -> Vec<(ClassSymbol, ClassFile)> {
    let mut out = Vec::new();
    for sym in supertype_closure(env, roots) {
        if env.classpath.origin(&sym).is_none() {
            continue;
        }
        let Some(bytecode) = env.classpath.get(&sym) else {
            continue;
        };
        let Some(classfile) = bytecode.classfile() else {
            continue;
        };
        tracing::debug!(sym = %sym, "collecting transitive supertype");
        out.push((sym, trim_class(&classfile)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_classfile::{ConstantValue, FieldInfo, InnerClassInfo, MethodInfo};
    use pretty_assertions::assert_eq;

    fn sample() -> ClassFile {
        let mut cf = ClassFile::new("a/Outer$Mid");
        cf.access_flags = ACC_PUBLIC | ACC_SUPER;
        cf.super_class = Some("java/lang/Object".to_string());
        cf.visible_annotations
            .push(gale_classfile::Annotation::new("La/Custom;"));
        cf.visible_annotations
            .push(gale_classfile::Annotation::new(
                "Ljava/lang/annotation/Retention;",
            ));
        cf.fields.push(FieldInfo {
            access_flags: ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
            name: "K".to_string(),
            descriptor: "I".to_string(),
            signature: None,
            constant_value: Some(ConstantValue::Int(1)),
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            visible_type_annotations: Vec::new(),
            invisible_type_annotations: Vec::new(),
        });
        cf.fields.push(FieldInfo {
            access_flags: ACC_PUBLIC,
            name: "plain".to_string(),
            descriptor: "I".to_string(),
            signature: None,
            constant_value: None,
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            visible_type_annotations: Vec::new(),
            invisible_type_annotations: Vec::new(),
        });
        cf.methods.push(MethodInfo {
            access_flags: ACC_PUBLIC,
            name: "m".to_string(),
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
        for inner in ["a/Outer$Mid", "a/Outer", "a/Outer$Mid$Leaf", "a/Unrelated$X"] {
            cf.inner_classes.push(InnerClassInfo {
                inner_class: inner.to_string(),
                outer_class: None,
                inner_name: None,
                access_flags: 0,
            });
        }
        cf
    }

    #[test]
    fn drops_methods_and_plain_fields() {
        let trimmed = trim_class(&sample());
        assert!(trimmed.methods.is_empty());
        assert_eq!(trimmed.fields.len(), 1);
        assert_eq!(trimmed.fields[0].name, "K");
    }

    #[test]
    fn keeps_only_meta_annotations() {
        let trimmed = trim_class(&sample());
        assert_eq!(trimmed.visible_annotations.len(), 1);
        assert_eq!(
            trimmed.visible_annotations[0].type_descriptor,
            "Ljava/lang/annotation/Retention;"
        );
    }

    #[test]
    fn keeps_self_and_parent_inner_entries() {
        let trimmed = trim_class(&sample());
        let names: Vec<_> = trimmed
            .inner_classes
            .iter()
            .map(|i| i.inner_class.as_str())
            .collect();
        assert_eq!(names, vec!["a/Outer$Mid", "a/Outer"]);
    }

    #[test]
    fn annotation_declarations_keep_methods() {
        let mut cf = sample();
        cf.access_flags |= ACC_ANNOTATION | ACC_INTERFACE;
        let trimmed = trim_class(&cf);
        assert_eq!(trimmed.methods.len(), 1);
    }

    #[test]
    fn trimming_is_idempotent() {
        let once = trim_class(&sample());
        let twice = trim_class(&once);
        assert_eq!(once, twice);
    }
}
