//! Phase E: enumerate declared types, assign binary names, build the
//! nesting forest.

use std::collections::BTreeMap;
use std::rc::Rc;

use gale_core::{Diagnostic, DiagnosticKind, Diagnostics};
use gale_syntax::tree::{Member, Modifiers, TyDecl, TyKind};
use gale_syntax::SourceFile;

use gale_classfile::access::*;

use crate::model::SourceBoundClass;
use crate::sym::ClassSymbol;

pub(crate) struct EnterResult {
    pub classes: BTreeMap<ClassSymbol, SourceBoundClass>,
    pub diagnostics: Diagnostics,
}

pub(crate) fn enter(units: &[Rc<SourceFile>]) -> EnterResult {
    let mut classes: BTreeMap<ClassSymbol, SourceBoundClass> = BTreeMap::new();
    let mut diagnostics = Diagnostics::default();

    for unit in units {
        let package = unit
            .unit
            .package
            .as_ref()
            .map(|p| p.name.join("/"))
            .unwrap_or_default();
        for (idx, decl) in unit.unit.types.iter().enumerate() {
            let binary_name = if package.is_empty() {
                decl.name.clone()
            } else {
                format!("{package}/{}", decl.name)
            };
            let sym = ClassSymbol::new(&binary_name);
            enter_decl(
                unit,
                decl,
                sym,
                None,
                vec![idx],
                &mut classes,
                &mut diagnostics,
            );
        }
    }

    EnterResult {
        classes,
        diagnostics,
    }
}

fn enter_decl(
    unit: &Rc<SourceFile>,
    decl: &TyDecl,
    sym: ClassSymbol,
    owner: Option<ClassSymbol>,
    decl_path: Vec<usize>,
    classes: &mut BTreeMap<ClassSymbol, SourceBoundClass>,
    diagnostics: &mut Diagnostics,
) {
    if classes.contains_key(&sym) {
        diagnostics.push(
            Diagnostic::new(
                &unit.path,
                DiagnosticKind::DuplicateDeclaration,
                format!("duplicate declaration of {}", decl.name),
            )
            .at(&unit.line_map, decl.pos),
        );
        return;
    }

    let owner_kind = owner
        .as_ref()
        .and_then(|o| classes.get(o))
        .map(|c| c.kind);
    let access = class_access(decl, owner.is_some(), owner_kind);

    let mut bound = SourceBoundClass {
        sym: sym.clone(),
        owner,
        kind: decl.kind,
        access,
        children: BTreeMap::new(),
        source: Rc::clone(unit),
        decl_path: decl_path.clone(),
    };
    classes.insert(sym.clone(), bound.clone());

    for (idx, member) in decl.members.iter().enumerate() {
        let Member::Type(nested) = member else { continue };
        let nested_sym = sym.nested(&nested.name);
        if bound.children.contains_key(&nested.name) {
            diagnostics.push(
                Diagnostic::new(
                    &unit.path,
                    DiagnosticKind::DuplicateDeclaration,
                    format!("duplicate declaration of {}", nested.name),
                )
                .at(&unit.line_map, nested.pos),
            );
            continue;
        }
        bound.children.insert(nested.name.clone(), nested_sym.clone());

        let mut nested_path = decl_path.clone();
        nested_path.push(idx);
        enter_decl(
            unit,
            nested,
            nested_sym,
            Some(sym.clone()),
            nested_path,
            classes,
            diagnostics,
        );
    }

    // The children map was filled after insertion; store the final version.
    classes.insert(sym, bound);
}

/// Classfile access flags for a type declaration. The model keeps the true
/// source access (protected/private included); lowering maps nested-class
/// visibility to what the classfile format can express.
fn class_access(decl: &TyDecl, nested: bool, owner_kind: Option<TyKind>) -> u16 {
    let mods = decl.mods;
    let mut access = 0u16;
    if mods.contains(Modifiers::PUBLIC) {
        access |= ACC_PUBLIC;
    }
    if mods.contains(Modifiers::PROTECTED) {
        access |= ACC_PROTECTED;
    }
    if mods.contains(Modifiers::PRIVATE) {
        access |= ACC_PRIVATE;
    }
    if mods.contains(Modifiers::STATIC) {
        access |= ACC_STATIC;
    }
    if mods.contains(Modifiers::FINAL) {
        access |= ACC_FINAL;
    }
    if mods.contains(Modifiers::ABSTRACT) {
        access |= ACC_ABSTRACT;
    }
    if mods.contains(Modifiers::STRICTFP) {
        access |= ACC_STRICT;
    }

    // Member types of interfaces and annotations are implicitly public and
    // static.
    if matches!(owner_kind, Some(TyKind::Interface) | Some(TyKind::Annotation)) {
        access = (access & !(ACC_PROTECTED | ACC_PRIVATE)) | ACC_PUBLIC | ACC_STATIC;
    }

    match decl.kind {
        TyKind::Class => {}
        TyKind::Interface => access |= ACC_INTERFACE | ACC_ABSTRACT,
        TyKind::Annotation => access |= ACC_ANNOTATION | ACC_INTERFACE | ACC_ABSTRACT,
        TyKind::Enum => {
            access |= ACC_ENUM;
            if decl.enum_constants.iter().all(|c| !c.has_body) {
                access |= ACC_FINAL;
            }
            if nested {
                access |= ACC_STATIC;
            }
        }
        TyKind::Record => {
            access |= ACC_FINAL;
            if nested {
                access |= ACC_STATIC;
            }
        }
    }
    if matches!(decl.kind, TyKind::Interface | TyKind::Annotation) && nested {
        access |= ACC_STATIC;
    }

    access
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_syntax::parse_source;

    fn enter_src(sources: &[(&str, &str)]) -> EnterResult {
        let units: Vec<_> = sources
            .iter()
            .map(|(path, text)| Rc::new(parse_source(*path, text).unwrap()))
            .collect();
        enter(&units)
    }

    #[test]
    fn nested_symbols() {
        let result = enter_src(&[(
            "a/A.java",
            "package a; public class A { public class Inner1 {} public class Inner2 { class Deep {} } }",
        )]);
        assert!(result.diagnostics.is_empty());
        let names: Vec<_> = result
            .classes
            .keys()
            .map(|s| s.binary_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["a/A", "a/A$Inner1", "a/A$Inner2", "a/A$Inner2$Deep"]
        );
        let a = &result.classes[&ClassSymbol::new("a/A")];
        assert_eq!(a.children.len(), 2);
        let deep = &result.classes[&ClassSymbol::new("a/A$Inner2$Deep")];
        assert_eq!(deep.owner, Some(ClassSymbol::new("a/A$Inner2")));
    }

    #[test]
    fn duplicate_toplevel_declaration() {
        let result = enter_src(&[
            ("x/Test.java", "class Test {}"),
            ("y/Test.java", "class Test {}"),
        ]);
        assert_eq!(result.diagnostics.len(), 1);
        let diag = result.diagnostics.iter().next().unwrap();
        assert!(diag.message.contains("duplicate declaration of Test"));
        assert_eq!(diag.kind, DiagnosticKind::DuplicateDeclaration);
    }

    #[test]
    fn interface_member_flags() {
        let result = enter_src(&[(
            "a/I.java",
            "package a; public interface I { class C {} }",
        )]);
        let i = &result.classes[&ClassSymbol::new("a/I")];
        assert_ne!(i.access & ACC_INTERFACE, 0);
        assert_ne!(i.access & ACC_ABSTRACT, 0);
        let c = &result.classes[&ClassSymbol::new("a/I$C")];
        assert_ne!(c.access & ACC_PUBLIC, 0);
        assert_ne!(c.access & ACC_STATIC, 0);
    }

    #[test]
    fn enum_with_constant_body_is_not_final() {
        let result = enter_src(&[
            ("a/E.java", "package a; enum E { A, B { } }"),
            ("a/F.java", "package a; enum F { A }"),
        ]);
        let e = &result.classes[&ClassSymbol::new("a/E")];
        assert_eq!(e.access & ACC_FINAL, 0);
        let f = &result.classes[&ClassSymbol::new("a/F")];
        assert_ne!(f.access & ACC_FINAL, 0);
    }
}
