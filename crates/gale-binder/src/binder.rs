//! Phase orchestration: Enter, Header, Type, Constant, in that order, each
//! a total function over the previous phase's (frozen) output.

use std::collections::BTreeMap;
use std::rc::Rc;

use gale_classfile::access::*;
use gale_classpath::ClassPathIndex;
use gale_core::Diagnostics;
use gale_syntax::tree::{ModDecl, TyKind};
use gale_syntax::SourceFile;

use crate::bytecode::ClasspathEnv;
use crate::consteval::{coerce_assignment, ConstEvaluator};
use crate::enter::enter;
use crate::hier::HierarchyBinder;
use crate::model::{
    AnnoInfo, AnnotationMetadata, ClassView, Retention, TypeBoundClass,
};
use crate::sym::ClassSymbol;
use crate::tli::TopLevelIndex;
use crate::ty::{ClassTy, Ty, WildTy};
use crate::typebind::TypeBinder;
use crate::value::Const;

/// Read access to every bound class, source or classpath.
#[derive(Clone, Copy)]
pub struct BindingEnv<'a> {
    pub source: &'a BTreeMap<ClassSymbol, TypeBoundClass>,
    pub classpath: &'a ClasspathEnv,
}

impl<'a> BindingEnv<'a> {
    pub fn view(&self, sym: &ClassSymbol) -> Option<ClassView<'a>> {
        if let Some(class) = self.source.get(sym) {
            return Some(ClassView::Source(class));
        }
        self.classpath.get(sym).map(ClassView::Bytecode)
    }
}

/// A bound `module-info.java`.
#[derive(Debug, Clone)]
pub struct BoundModule {
    pub decl: ModDecl,
    pub source: Rc<SourceFile>,
}

pub struct BoundResult {
    /// All source classes, keyed (and therefore ordered) by binary name.
    pub classes: BTreeMap<ClassSymbol, TypeBoundClass>,
    pub modules: Vec<BoundModule>,
    pub diagnostics: Diagnostics,
    pub classpath: ClasspathEnv,
    pub tli: TopLevelIndex,
}

impl BoundResult {
    pub fn env(&self) -> BindingEnv<'_> {
        BindingEnv {
            source: &self.classes,
            classpath: &self.classpath,
        }
    }
}

/// Bind a source set against a bootclasspath and classpath.
pub fn bind(
    units: &[Rc<SourceFile>],
    boot: ClassPathIndex,
    classpath: ClassPathIndex,
) -> BoundResult {
    let mut diagnostics = Diagnostics::default();

    // Phase E.
    let entered = enter(units);
    diagnostics.extend(entered.diagnostics);
    tracing::debug!(classes = entered.classes.len(), "entered source classes");

    // The top-level index spans sources and the classpath; sources first, so
    // a source declaration shadows a same-named classpath class.
    let mut tli = TopLevelIndex::builder();
    for (sym, class) in &entered.classes {
        if class.owner.is_none() {
            tli.insert_class(sym.clone());
        }
    }
    for name in boot.class_names() {
        tli.insert_class(ClassSymbol::new(name));
    }
    for name in classpath.class_names() {
        tli.insert_class(ClassSymbol::new(name));
    }
    let tli = tli.finish();

    let classpath_env = ClasspathEnv::new(boot, classpath);

    // Phase H.
    let (headers, hier_diags) =
        HierarchyBinder::new(&entered.classes, &tli, &classpath_env).bind_all();
    diagnostics.extend(hier_diags);

    // Phase T.
    let (mut classes, type_diags) = TypeBinder::new(&headers, &tli, &classpath_env).bind_all();
    diagnostics.extend(type_diags);

    // Phase C reads a frozen copy of the phase T output and writes values
    // back into the live one.
    let frozen = classes.clone();
    {
        let evaluator = ConstEvaluator::new(
            BindingEnv {
                source: &frozen,
                classpath: &classpath_env,
            },
            &headers,
            &tli,
        );

        for (sym, class) in classes.iter_mut() {
            let context = &headers[sym].base;

            for field in &mut class.fields {
                const CONSTANT_MASK: u16 = ACC_STATIC | ACC_FINAL;
                if field.access & CONSTANT_MASK == CONSTANT_MASK && field.init.is_some() {
                    field.value = evaluator.field_value(&field.sym);
                }
                for anno in &mut field.annotations {
                    evaluator.eval_anno_info(context, anno);
                }
                for_each_anno_in_ty(&mut field.ty, &mut |anno| {
                    evaluator.eval_anno_info(context, anno)
                });
            }

            for method in &mut class.methods {
                if let Some(default_expr) = &method.default_expr {
                    method.default_value = evaluator
                        .eval(context, default_expr)
                        .and_then(|value| coerce_element(value, &method.return_ty));
                }
                for anno in &mut method.annotations {
                    evaluator.eval_anno_info(context, anno);
                }
                for_each_anno_in_ty(&mut method.return_ty, &mut |anno| {
                    evaluator.eval_anno_info(context, anno)
                });
                for param in &mut method.params {
                    for anno in &mut param.annotations {
                        evaluator.eval_anno_info(context, anno);
                    }
                    for_each_anno_in_ty(&mut param.ty, &mut |anno| {
                        evaluator.eval_anno_info(context, anno)
                    });
                }
                for thrown in &mut method.throws {
                    for_each_anno_in_ty(thrown, &mut |anno| {
                        evaluator.eval_anno_info(context, anno)
                    });
                }
                for tp in &mut method.type_params {
                    for anno in &mut tp.annotations {
                        evaluator.eval_anno_info(context, anno);
                    }
                    for bound in &mut tp.bounds {
                        for_each_anno_in_ty(bound, &mut |anno| {
                            evaluator.eval_anno_info(context, anno)
                        });
                    }
                }
            }

            for anno in &mut class.annotations {
                evaluator.eval_anno_info(context, anno);
            }
            for tp in &mut class.type_params {
                for anno in &mut tp.annotations {
                    evaluator.eval_anno_info(context, anno);
                }
                for bound in &mut tp.bounds {
                    for_each_anno_in_ty(bound, &mut |anno| evaluator.eval_anno_info(context, anno));
                }
            }
            if let Some(superclass) = &mut class.superclass {
                for_each_anno_in_ty(superclass, &mut |anno| {
                    evaluator.eval_anno_info(context, anno)
                });
            }
            for iface in &mut class.interfaces {
                for_each_anno_in_ty(iface, &mut |anno| evaluator.eval_anno_info(context, anno));
            }
            for component in &mut class.record_components {
                for anno in &mut component.annotations {
                    evaluator.eval_anno_info(context, anno);
                }
            }
        }
    }

    // Annotation metadata wants evaluated meta-annotation arguments.
    for class in classes.values_mut() {
        if class.kind == TyKind::Annotation {
            class.anno_metadata = Some(metadata_from_annotations(&class.annotations));
        }
    }

    let modules = units
        .iter()
        .filter_map(|unit| {
            unit.unit.module.as_ref().map(|decl| BoundModule {
                decl: decl.clone(),
                source: Rc::clone(unit),
            })
        })
        .collect();

    BoundResult {
        classes,
        modules,
        diagnostics,
        classpath: classpath_env,
        tli,
    }
}

/// Annotation element defaults on array-typed elements accept the
/// single-value shorthand; normalize it to an array.
fn coerce_element(value: Const, element_ty: &Ty) -> Option<Const> {
    match (element_ty, value) {
        (Ty::Array { .. }, Const::Array(values)) => Some(Const::Array(values)),
        (Ty::Array { elem, .. }, single) => {
            Some(Const::Array(vec![coerce_element(single, elem)?]))
        }
        (Ty::Prim { .. }, value) => coerce_assignment(value, element_ty),
        (_, value) => Some(value),
    }
}

fn metadata_from_annotations(annotations: &[AnnoInfo]) -> AnnotationMetadata {
    let mut meta = AnnotationMetadata::default();
    for anno in annotations {
        let Some(sym) = &anno.sym else { continue };
        match sym.binary_name() {
            "java/lang/annotation/Retention" => {
                if let Some((_, Const::EnumConst(field))) = anno.values.first() {
                    meta.retention = match &*field.name {
                        "SOURCE" => Retention::Source,
                        "RUNTIME" => Retention::Runtime,
                        _ => Retention::Class,
                    };
                }
            }
            "java/lang/annotation/Target" => {
                let mut targets = Vec::new();
                match anno.values.first() {
                    Some((_, Const::Array(elements))) => {
                        for element in elements {
                            if let Const::EnumConst(field) = element {
                                targets.push(field.name.to_string());
                            }
                        }
                    }
                    Some((_, Const::EnumConst(field))) => {
                        targets.push(field.name.to_string());
                    }
                    _ => {}
                }
                meta.targets = Some(targets);
            }
            "java/lang/annotation/Repeatable" => {
                if let Some((_, Const::ClassLit(Ty::Class(class)))) = anno.values.first() {
                    meta.repeatable = Some(class.sym().clone());
                }
            }
            _ => {}
        }
    }
    meta
}

/// Visit every annotation embedded in a type, wildcards and nested type
/// arguments included.
fn for_each_anno_in_ty(ty: &mut Ty, f: &mut impl FnMut(&mut AnnoInfo)) {
    match ty {
        Ty::Prim { annos, .. } | Ty::TyVar { annos, .. } => {
            annos.iter_mut().for_each(&mut *f);
        }
        Ty::Array { elem, annos } => {
            annos.iter_mut().for_each(&mut *f);
            for_each_anno_in_ty(elem, f);
        }
        Ty::Class(ClassTy { segments }) => {
            for segment in segments {
                segment.annos.iter_mut().for_each(&mut *f);
                for targ in &mut segment.targs {
                    for_each_anno_in_ty(targ, f);
                }
            }
        }
        Ty::Wild(wild) => match wild {
            WildTy::None { annos } => annos.iter_mut().for_each(&mut *f),
            WildTy::Upper { bound, annos } | WildTy::Lower { bound, annos } => {
                annos.iter_mut().for_each(&mut *f);
                for_each_anno_in_ty(bound, f);
            }
        },
        Ty::Intersection(tys) => {
            for ty in tys {
                for_each_anno_in_ty(ty, f);
            }
        }
        Ty::Void | Ty::Error => {}
    }
}
