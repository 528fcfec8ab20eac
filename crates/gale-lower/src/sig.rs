//! Generic-signature construction from bound types.
//!
//! Lowering builds the classfile crate's signature AST and lets its writer
//! produce the string, so the encoding logic lives in exactly one place.

use gale_binder::{BindingEnv, SimpleClassTy, Ty, TyParamInfo, TypeBoundClass, WildTy};
use gale_classfile::{
    write_class_signature, write_field_signature, write_method_signature, BaseType, ClassSig,
    ClassTySig, MethodSig, SigTy, TyArgSig, TyParamSig, TySegment,
};
use gale_syntax::tree::{PrimKind, TyKind};

/// The `Signature` attribute for a class, when it needs one.
pub(crate) fn class_signature(env: &BindingEnv<'_>, class: &TypeBoundClass) -> Option<String> {
    let superclass = class.superclass.as_ref();
    let needs_signature = !class.type_params.is_empty()
        || superclass.is_some_and(Ty::is_generic)
        || class.interfaces.iter().any(Ty::is_generic);
    if !needs_signature {
        return None;
    }

    let super_sig = match superclass {
        Some(ty) => class_ty_sig(ty)?,
        None => object_sig(),
    };
    let sig = ClassSig {
        type_parameters: type_param_sigs(env, &class.type_params),
        super_class: super_sig,
        interfaces: class
            .interfaces
            .iter()
            .map(class_ty_sig)
            .collect::<Option<Vec<_>>>()?,
    };
    Some(write_class_signature(&sig))
}

pub(crate) fn field_signature(field_ty: &Ty) -> Option<String> {
    if !field_ty.is_generic() {
        return None;
    }
    Some(write_field_signature(&ty_sig(field_ty)?))
}

pub(crate) fn method_signature(
    env: &BindingEnv<'_>,
    method: &gale_binder::MethodInfo,
) -> Option<String> {
    let throws_generic = method
        .throws
        .iter()
        .any(|ty| matches!(ty, Ty::TyVar { .. }));
    let needs_signature = !method.type_params.is_empty()
        || method.return_ty.is_generic()
        || method.params.iter().any(|p| p.ty.is_generic())
        || throws_generic;
    if !needs_signature {
        return None;
    }

    let sig = MethodSig {
        type_parameters: type_param_sigs(env, &method.type_params),
        params: method
            .params
            .iter()
            .map(|p| ty_sig(&p.ty))
            .collect::<Option<Vec<_>>>()?,
        return_type: match &method.return_ty {
            Ty::Void => None,
            ty => Some(ty_sig(ty)?),
        },
        // Throws clauses appear in the signature only when a type variable
        // forces them to.
        throws: if throws_generic {
            method
                .throws
                .iter()
                .map(ty_sig)
                .collect::<Option<Vec<_>>>()?
        } else {
            Vec::new()
        },
    };
    Some(write_method_signature(&sig))
}

fn type_param_sigs(env: &BindingEnv<'_>, params: &[TyParamInfo]) -> Vec<TyParamSig> {
    params
        .iter()
        .map(|param| {
            let mut bounds = param.bounds.iter();
            let first = bounds.next();
            // An interface first bound leaves the class-bound slot empty.
            let first_is_interface = first.is_some_and(|ty| match ty {
                Ty::Class(class) => env.view(class.sym()).is_some_and(|view| {
                    matches!(view.kind(), TyKind::Interface | TyKind::Annotation)
                }),
                _ => false,
            });
            let (class_bound, mut interface_bounds): (Option<SigTy>, Vec<SigTy>) =
                match (first, first_is_interface) {
                    (None, _) => (Some(object_sig_ty()), Vec::new()),
                    (Some(ty), true) => (None, ty_sig(ty).into_iter().collect()),
                    (Some(ty), false) => (ty_sig(ty), Vec::new()),
                };
            interface_bounds.extend(bounds.filter_map(ty_sig));
            TyParamSig {
                name: param.sym.name.to_string(),
                class_bound,
                interface_bounds,
            }
        })
        .collect()
}

/// `Ty` to signature form; `None` for error types (callers fall back to a
/// signature-free emission).
fn ty_sig(ty: &Ty) -> Option<SigTy> {
    match ty {
        Ty::Prim { kind, .. } => Some(SigTy::Base(base_type(*kind))),
        Ty::Class(_) => class_ty_sig(ty).map(SigTy::Class),
        Ty::TyVar { sym, .. } => Some(SigTy::TypeVariable(sym.name.to_string())),
        Ty::Array { elem, .. } => Some(SigTy::Array(Box::new(ty_sig(elem)?))),
        Ty::Intersection(tys) => ty_sig(tys.first()?),
        Ty::Void | Ty::Wild(_) | Ty::Error => None,
    }
}

fn class_ty_sig(ty: &Ty) -> Option<ClassTySig> {
    let Ty::Class(class) = ty else { return None };

    // Leading segments without type arguments collapse into the `$`-joined
    // base name; later segments use the `.` inner-class form, which is the
    // shape javac emits.
    let mut split = class.segments.len() - 1;
    for (idx, segment) in class.segments.iter().enumerate() {
        if !segment.targs.is_empty() {
            split = idx;
            break;
        }
    }

    let base: &SimpleClassTy = &class.segments[split];
    let binary_name = base.sym.binary_name();
    let (package, base_name) = match binary_name.rsplit_once('/') {
        Some((pkg, name)) => (pkg.split('/').map(str::to_owned).collect(), name),
        None => (Vec::new(), binary_name),
    };

    let mut segments = vec![TySegment {
        name: base_name.to_string(),
        type_arguments: type_arg_sigs(&base.targs)?,
    }];
    for segment in &class.segments[split + 1..] {
        segments.push(TySegment {
            name: segment.sym.simple_name().to_string(),
            type_arguments: type_arg_sigs(&segment.targs)?,
        });
    }

    Some(ClassTySig { package, segments })
}

fn type_arg_sigs(targs: &[Ty]) -> Option<Vec<TyArgSig>> {
    targs
        .iter()
        .map(|targ| {
            Some(match targ {
                Ty::Wild(WildTy::None { .. }) => TyArgSig::Unbounded,
                Ty::Wild(WildTy::Upper { bound, .. }) => {
                    TyArgSig::Extends(Box::new(ty_sig(bound)?))
                }
                Ty::Wild(WildTy::Lower { bound, .. }) => TyArgSig::Super(Box::new(ty_sig(bound)?)),
                ty => TyArgSig::Exact(Box::new(ty_sig(ty)?)),
            })
        })
        .collect()
}

fn base_type(kind: PrimKind) -> BaseType {
    match kind {
        PrimKind::Boolean => BaseType::Boolean,
        PrimKind::Byte => BaseType::Byte,
        PrimKind::Short => BaseType::Short,
        PrimKind::Int => BaseType::Int,
        PrimKind::Long => BaseType::Long,
        PrimKind::Char => BaseType::Char,
        PrimKind::Float => BaseType::Float,
        PrimKind::Double => BaseType::Double,
    }
}

fn object_sig() -> ClassTySig {
    ClassTySig {
        package: vec!["java".to_string(), "lang".to_string()],
        segments: vec![TySegment {
            name: "Object".to_string(),
            type_arguments: Vec::new(),
        }],
    }
}

fn object_sig_ty() -> SigTy {
    SigTy::Class(object_sig())
}
