//! Bound classes to [`gale_classfile::ClassFile`] values.

use gale_binder::{
    erased_descriptor, AnnoInfo, BindingEnv, BoundModule, ClassSymbol, Const, MethodInfo,
    Retention, Ty, TyParamInfo, TypeBoundClass, TyVarSymbol, WildTy,
};
use gale_classfile::access::*;
use gale_classfile::{
    Annotation, ClassFile, ConstantValue, ElementValue, ModuleAttribute, ModuleExport,
    ModuleProvide, ModuleRequire, PrimValue, TargetInfo, TypeAnnotation, TypePathStep,
};
use gale_syntax::tree::{ModDirective, TyKind};

use crate::sig;

/// Lower one bound source class to class-file form.
pub fn lower_class(env: &BindingEnv<'_>, class: &TypeBoundClass) -> ClassFile {
    let mut out = ClassFile::new(class.sym.binary_name());
    out.access_flags = classfile_access(class.access, class.kind);
    out.super_class = match &class.superclass_sym {
        Some(sym) => Some(sym.binary_name().to_string()),
        None if class.sym.binary_name() == "java/lang/Object" => None,
        None => Some("java/lang/Object".to_string()),
    };
    out.interfaces = class
        .interface_syms
        .iter()
        .map(|sym| sym.binary_name().to_string())
        .collect();

    out.signature = sig::class_signature(env, class);

    let (visible, invisible) = partition_annotations(env, &class.annotations);
    out.visible_annotations = visible;
    out.invisible_annotations = invisible;

    let mut type_annos = TypeAnnos::default();
    for (idx, param) in class.type_params.iter().enumerate() {
        type_annos.collect_type_param(env, param, idx, false);
    }
    if let Some(superclass) = &class.superclass {
        type_annos.collect(env, superclass, TargetInfo::Supertype(0xFFFF));
    }
    for (idx, iface) in class.interfaces.iter().enumerate() {
        type_annos.collect(env, iface, TargetInfo::Supertype(idx as u16));
    }
    out.visible_type_annotations = type_annos.visible;
    out.invisible_type_annotations = type_annos.invisible;

    let class_bounds = bounds_of(&class.type_params);

    for field in &class.fields {
        let mut info = gale_classfile::FieldInfo {
            access_flags: field.access,
            name: field.sym.name.to_string(),
            descriptor: erased_descriptor(&field.ty, &|v| class_bounds(v)),
            signature: sig::field_signature(&field.ty),
            constant_value: field.value.as_ref().and_then(constant_value),
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            visible_type_annotations: Vec::new(),
            invisible_type_annotations: Vec::new(),
        };
        let (visible, invisible) = partition_annotations(env, &field.annotations);
        info.visible_annotations = visible;
        info.invisible_annotations = invisible;
        let mut type_annos = TypeAnnos::default();
        type_annos.collect(env, &field.ty, TargetInfo::Field);
        info.visible_type_annotations = type_annos.visible;
        info.invisible_type_annotations = type_annos.invisible;
        out.fields.push(info);
    }

    for method in &class.methods {
        out.methods.push(lower_method(env, class, method));
    }

    if class.kind == TyKind::Record {
        out.record_components = Some(
            class
                .record_components
                .iter()
                .map(|component| {
                    let (visible, invisible) = partition_annotations(env, &component.annotations);
                    gale_classfile::RecordComponentInfo {
                        name: component.name.clone(),
                        descriptor: erased_descriptor(&component.ty, &|v| class_bounds(v)),
                        signature: sig::field_signature(&component.ty),
                        visible_annotations: visible,
                        invisible_annotations: invisible,
                    }
                })
                .collect(),
        );
    }

    out.inner_classes = inner_classes(env, class);
    out
}

fn lower_method(
    env: &BindingEnv<'_>,
    class: &TypeBoundClass,
    method: &MethodInfo,
) -> gale_classfile::MethodInfo {
    let class_bounds = bounds_of(&class.type_params);
    let method_bounds = bounds_of(&method.type_params);
    let bounds = |var: &TyVarSymbol| method_bounds(var).or_else(|| class_bounds(var));

    let mut descriptor = String::from("(");
    for param in &method.params {
        descriptor.push_str(&erased_descriptor(&param.ty, &bounds));
    }
    descriptor.push(')');
    descriptor.push_str(&erased_descriptor(&method.return_ty, &bounds));

    let exceptions = method
        .throws
        .iter()
        .filter_map(|thrown| {
            let desc = erased_descriptor(thrown, &bounds);
            desc.strip_prefix('L')
                .and_then(|rest| rest.strip_suffix(';'))
                .map(str::to_owned)
        })
        .collect();

    let (visible, invisible) = partition_annotations(env, &method.annotations);

    let mut visible_params = Vec::new();
    let mut invisible_params = Vec::new();
    for param in &method.params {
        let (v, i) = partition_annotations(env, &param.annotations);
        visible_params.push(v);
        invisible_params.push(i);
    }
    if visible_params.iter().all(Vec::is_empty) {
        visible_params.clear();
    }
    if invisible_params.iter().all(Vec::is_empty) {
        invisible_params.clear();
    }

    let mut type_annos = TypeAnnos::default();
    for (idx, param) in method.type_params.iter().enumerate() {
        type_annos.collect_type_param(env, param, idx, true);
    }
    type_annos.collect(env, &method.return_ty, TargetInfo::MethodReturn);
    for (idx, param) in method.params.iter().enumerate() {
        type_annos.collect(env, &param.ty, TargetInfo::MethodFormalParameter(idx as u8));
    }
    for (idx, thrown) in method.throws.iter().enumerate() {
        type_annos.collect(env, thrown, TargetInfo::Throws(idx as u16));
    }

    gale_classfile::MethodInfo {
        access_flags: method.access,
        name: method.sym.name.to_string(),
        descriptor,
        signature: sig::method_signature(env, method),
        exceptions,
        annotation_default: method
            .default_value
            .as_ref()
            .and_then(|value| element_value(value)),
        visible_annotations: visible,
        invisible_annotations: invisible,
        visible_parameter_annotations: visible_params,
        invisible_parameter_annotations: invisible_params,
        visible_type_annotations: type_annos.visible,
        invisible_type_annotations: type_annos.invisible,
    }
}

/// Lower a bound `module-info` declaration.
pub fn lower_module(module: &BoundModule) -> ClassFile {
    let decl = &module.decl;
    let mut out = ClassFile::new("module-info");
    out.access_flags = ACC_MODULE;

    let mut requires = Vec::new();
    let mut exports = Vec::new();
    let mut opens = Vec::new();
    let mut uses = Vec::new();
    let mut provides = Vec::new();

    for directive in &decl.directives {
        match directive {
            ModDirective::Requires {
                transitive,
                static_phase,
                module,
            } => {
                let mut flags = 0u16;
                if *transitive {
                    flags |= 0x0020;
                }
                if *static_phase {
                    flags |= 0x0040;
                }
                requires.push(ModuleRequire {
                    module: module.join("."),
                    flags,
                    version: None,
                });
            }
            ModDirective::Exports { package, to } => exports.push(ModuleExport {
                package: package.join("/"),
                flags: 0,
                to: to.iter().map(|m| m.join(".")).collect(),
            }),
            ModDirective::Opens { package, to } => opens.push(ModuleExport {
                package: package.join("/"),
                flags: 0,
                to: to.iter().map(|m| m.join(".")).collect(),
            }),
            ModDirective::Uses { service } => uses.push(service.join("/")),
            ModDirective::Provides {
                service,
                implementations,
            } => provides.push(ModuleProvide {
                service: service.join("/"),
                implementations: implementations.iter().map(|i| i.join("/")).collect(),
            }),
        }
    }

    // Every module requires java.base; the implicit edge is mandated.
    let name = decl.name.join(".");
    if name != "java.base" && !requires.iter().any(|r| r.module == "java.base") {
        requires.insert(
            0,
            ModuleRequire {
                module: "java.base".to_string(),
                flags: 0x8000,
                version: None,
            },
        );
    }

    out.module = Some(ModuleAttribute {
        name,
        flags: if decl.open { 0x0020 } else { 0 },
        version: None,
        requires,
        exports,
        opens,
        uses,
        provides,
    });
    out
}

/// The classfile-level access of a class: member-class visibility narrows to
/// what the format can express, the true flags live in `InnerClasses`.
fn classfile_access(access: u16, kind: TyKind) -> u16 {
    let mut out = access & !(ACC_PROTECTED | ACC_PRIVATE | ACC_STATIC);
    if access & ACC_PROTECTED != 0 {
        out |= ACC_PUBLIC;
    }
    if !matches!(kind, TyKind::Interface | TyKind::Annotation) {
        out |= ACC_SUPER;
    }
    out
}

fn inner_classes(
    env: &BindingEnv<'_>,
    class: &TypeBoundClass,
) -> Vec<gale_classfile::InnerClassInfo> {
    let mut out = Vec::new();
    let entry = |sym: &ClassSymbol, access: u16| gale_classfile::InnerClassInfo {
        inner_class: sym.binary_name().to_string(),
        outer_class: sym.enclosing().map(|o| o.binary_name().to_string()),
        inner_name: Some(sym.simple_name().to_string()),
        access_flags: access & !ACC_SUPER,
    };

    // Only the class's own parent and immediate children are listed; headers
    // don't need the full transitive set javac records.
    if let Some(owner) = &class.owner {
        if owner.enclosing().is_some() {
            if let Some(view) = env.view(owner) {
                out.push(entry(owner, view.access()));
            }
        }
        out.push(entry(&class.sym, class.access));
    }
    for child in class.children.values() {
        if let Some(view) = env.view(child) {
            out.push(entry(child, view.access()));
        }
    }
    out
}

fn bounds_of(params: &[TyParamInfo]) -> impl Fn(&TyVarSymbol) -> Option<Ty> + '_ {
    move |var: &TyVarSymbol| {
        params
            .iter()
            .find(|p| &p.sym == var)
            .and_then(|p| p.bounds.first().cloned())
    }
}

/// Split annotation uses by retention; `SOURCE` and unresolvable ones drop.
fn partition_annotations(
    env: &BindingEnv<'_>,
    annotations: &[AnnoInfo],
) -> (Vec<Annotation>, Vec<Annotation>) {
    let mut visible = Vec::new();
    let mut invisible = Vec::new();
    for anno in annotations {
        let Some((lowered, retention)) = lower_annotation(env, anno) else {
            continue;
        };
        match retention {
            Retention::Runtime => visible.push(lowered),
            Retention::Class => invisible.push(lowered),
            Retention::Source => {}
        }
    }
    (visible, invisible)
}

fn lower_annotation(env: &BindingEnv<'_>, anno: &AnnoInfo) -> Option<(Annotation, Retention)> {
    let sym = anno.sym.as_ref()?;
    let retention = env
        .view(sym)
        .map(|view| view.annotation_metadata().retention)
        .unwrap_or(Retention::Class);
    let mut lowered = Annotation::new(sym.descriptor());
    for (name, value) in &anno.values {
        lowered
            .elements
            .push((name.clone(), element_value(value)?));
    }
    Some((lowered, retention))
}

fn element_value(value: &Const) -> Option<ElementValue> {
    Some(match value {
        Const::Prim(prim) => ElementValue::Prim(prim.clone()),
        Const::ClassLit(ty) => ElementValue::Class(class_lit_descriptor(ty)),
        Const::EnumConst(field) => ElementValue::Enum {
            type_descriptor: field.owner.descriptor(),
            const_name: field.name.to_string(),
        },
        Const::Anno(anno) => {
            let sym = anno.sym.as_ref()?;
            let mut nested = Annotation::new(sym.descriptor());
            for (name, value) in &anno.values {
                nested.elements.push((name.clone(), element_value(value)?));
            }
            ElementValue::Annotation(Box::new(nested))
        }
        Const::Array(values) => ElementValue::Array(
            values
                .iter()
                .map(element_value)
                .collect::<Option<Vec<_>>>()?,
        ),
    })
}

fn class_lit_descriptor(ty: &Ty) -> String {
    match ty {
        Ty::Void => "V".to_string(),
        other => other.descriptor(),
    }
}

fn constant_value(value: &Const) -> Option<ConstantValue> {
    Some(match value.as_prim()? {
        PrimValue::Boolean(v) => ConstantValue::Int(*v as i32),
        PrimValue::Byte(v) => ConstantValue::Int(*v as i32),
        PrimValue::Short(v) => ConstantValue::Int(*v as i32),
        PrimValue::Char(v) => ConstantValue::Int(*v as i32),
        PrimValue::Int(v) => ConstantValue::Int(*v),
        PrimValue::Long(v) => ConstantValue::Long(*v),
        PrimValue::Float(v) => ConstantValue::Float(*v),
        PrimValue::Double(v) => ConstantValue::Double(*v),
        PrimValue::String(v) => ConstantValue::String(v.clone()),
    })
}

/// Collects type annotations out of `Ty` values, building type paths as it
/// descends.
#[derive(Default)]
struct TypeAnnos {
    visible: Vec<TypeAnnotation>,
    invisible: Vec<TypeAnnotation>,
}

impl TypeAnnos {
    fn collect(&mut self, env: &BindingEnv<'_>, ty: &Ty, target: TargetInfo) {
        let mut path = Vec::new();
        self.walk(env, ty, target, &mut path);
    }

    fn collect_type_param(
        &mut self,
        env: &BindingEnv<'_>,
        param: &TyParamInfo,
        index: usize,
        on_method: bool,
    ) {
        let target = if on_method {
            TargetInfo::MethodTypeParameter(index as u8)
        } else {
            TargetInfo::ClassTypeParameter(index as u8)
        };
        for anno in &param.annotations {
            self.emit(env, anno, target, &[]);
        }

        // Bound index 0 is reserved for a class bound; interface bounds
        // start at 1.
        let first_is_interface = param.bounds.first().is_some_and(|ty| match ty {
            Ty::Class(class) => env
                .view(class.sym())
                .is_some_and(|view| matches!(view.kind(), TyKind::Interface | TyKind::Annotation)),
            _ => false,
        });
        for (idx, bound) in param.bounds.iter().enumerate() {
            let bound_index = (idx + usize::from(first_is_interface)) as u8;
            let target = if on_method {
                TargetInfo::MethodTypeParameterBound {
                    parameter: index as u8,
                    bound: bound_index,
                }
            } else {
                TargetInfo::ClassTypeParameterBound {
                    parameter: index as u8,
                    bound: bound_index,
                }
            };
            let mut path = Vec::new();
            self.walk(env, bound, target, &mut path);
        }
    }

    fn walk(
        &mut self,
        env: &BindingEnv<'_>,
        ty: &Ty,
        target: TargetInfo,
        path: &mut Vec<TypePathStep>,
    ) {
        match ty {
            Ty::Prim { annos, .. } | Ty::TyVar { annos, .. } => {
                for anno in annos {
                    self.emit(env, anno, target, path);
                }
            }
            Ty::Array { elem, annos } => {
                for anno in annos {
                    self.emit(env, anno, target, path);
                }
                path.push(TypePathStep {
                    kind: 0,
                    argument_index: 0,
                });
                self.walk(env, elem, target, path);
                path.pop();
            }
            Ty::Class(class) => {
                // Inner-type steps walk outward in; segment 0 sits at the
                // current path.
                for (depth, segment) in class.segments.iter().enumerate() {
                    for _ in 0..depth {
                        path.push(TypePathStep {
                            kind: 1,
                            argument_index: 0,
                        });
                    }
                    for anno in &segment.annos {
                        self.emit(env, anno, target, path);
                    }
                    for (idx, targ) in segment.targs.iter().enumerate() {
                        path.push(TypePathStep {
                            kind: 3,
                            argument_index: idx as u8,
                        });
                        self.walk(env, targ, target, path);
                        path.pop();
                    }
                    for _ in 0..depth {
                        path.pop();
                    }
                }
            }
            Ty::Wild(wild) => match wild {
                WildTy::None { annos } => {
                    for anno in annos {
                        self.emit(env, anno, target, path);
                    }
                }
                WildTy::Upper { bound, annos } | WildTy::Lower { bound, annos } => {
                    for anno in annos {
                        self.emit(env, anno, target, path);
                    }
                    path.push(TypePathStep {
                        kind: 2,
                        argument_index: 0,
                    });
                    self.walk(env, bound, target, path);
                    path.pop();
                }
            },
            Ty::Intersection(tys) => {
                for ty in tys {
                    self.walk(env, ty, target, path);
                }
            }
            Ty::Void | Ty::Error => {}
        }
    }

    fn emit(
        &mut self,
        env: &BindingEnv<'_>,
        anno: &AnnoInfo,
        target: TargetInfo,
        path: &[TypePathStep],
    ) {
        let Some((lowered, retention)) = lower_annotation(env, anno) else {
            return;
        };
        let type_annotation = TypeAnnotation {
            target,
            path: path.to_vec(),
            annotation: lowered,
        };
        match retention {
            Retention::Runtime => self.visible.push(type_annotation),
            Retention::Class => self.invisible.push(type_annotation),
            Retention::Source => {}
        }
    }
}
