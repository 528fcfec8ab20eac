//! Phase T: resolve every remaining type to a full [`Ty`] value.
//!
//! Field types, method signatures, type-parameter bounds, and annotation
//! uses all bind here. Implicit API surface that javac would synthesize is
//! added too: default constructors, enum `values`/`valueOf`, record
//! accessors and the canonical constructor. Unresolvable references become
//! [`Ty::Error`] plus a diagnostic, and binding continues so one run can
//! report as much as possible.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use gale_classfile::access::*;
use gale_core::{Diagnostic, DiagnosticKind, Diagnostics};
use gale_syntax::tree::{
    AnnoExpr, Member, MethodDecl, Modifiers, NamedTy, TyKind, TypeArg, TypeRef, VarDecl,
};

use crate::bytecode::ClasspathEnv;
use crate::model::{
    AnnoInfo, FieldInfo, HeaderBoundClass, MethodInfo, ParamInfo, RecordCompInfo, SourceBoundClass,
    TyParamInfo, TypeBoundClass,
};
use crate::scope::{Hierarchy, Resolver};
use crate::sym::{ClassSymbol, FieldSymbol, MethodSymbol, ParamSymbol, TyVarOwner, TyVarSymbol};
use crate::tli::TopLevelIndex;
use crate::ty::{ClassTy, SimpleClassTy, Ty, WildTy};

pub(crate) struct TypeBinder<'a> {
    headers: &'a BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>,
    tli: &'a TopLevelIndex,
    classpath: &'a ClasspathEnv,
    diagnostics: RefCell<Diagnostics>,
}

/// Type variables visible at some point in a class or method.
struct TyVarScope {
    vars: Vec<TyVarSymbol>,
}

impl TyVarScope {
    fn lookup(&self, name: &str) -> Option<&TyVarSymbol> {
        // Innermost declaration shadows outer ones.
        self.vars.iter().rev().find(|v| &*v.name == name)
    }
}

impl<'a> TypeBinder<'a> {
    pub fn new(
        headers: &'a BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>,
        tli: &'a TopLevelIndex,
        classpath: &'a ClasspathEnv,
    ) -> Self {
        Self {
            headers,
            tli,
            classpath,
            diagnostics: RefCell::new(Diagnostics::default()),
        }
    }

    pub fn bind_all(self) -> (BTreeMap<ClassSymbol, TypeBoundClass>, Diagnostics) {
        let mut bound = BTreeMap::new();
        for (sym, header) in self.headers {
            bound.insert(sym.clone(), self.bind_class(header));
        }
        (bound, self.diagnostics.into_inner())
    }

    fn bind_class(&self, header: &HeaderBoundClass) -> TypeBoundClass {
        let class = &header.base;
        let decl = class.decl();

        // Type variables of enclosing classes are in scope too.
        let mut scope = TyVarScope { vars: Vec::new() };
        let mut enclosing: Vec<&Rc<HeaderBoundClass>> = Vec::new();
        let mut owner = class.owner.clone();
        while let Some(sym) = owner {
            if let Some(outer) = self.headers.get(&sym) {
                enclosing.push(outer);
                owner = outer.base.owner.clone();
            } else {
                break;
            }
        }
        for outer in enclosing.iter().rev() {
            scope.vars.extend(outer.type_params.iter().cloned());
        }
        scope.vars.extend(header.type_params.iter().cloned());

        let type_params = self.bind_type_params(
            class,
            &scope,
            &decl.type_params,
            TyVarOwner::Class(class.sym.clone()),
        );

        let superclass = match class.kind {
            TyKind::Enum => {
                // `enum E` extends `Enum<E>`.
                let mut enum_ty = ClassTy::raw(ClassSymbol::new("java/lang/Enum"));
                enum_ty.segments[0].targs.push(Ty::class(class.sym.clone()));
                Some(Ty::Class(enum_ty))
            }
            _ => match (&decl.extends, &header.superclass) {
                (Some(named), Some(_)) => Some(self.bind_named(class, &scope, named)),
                (_, Some(sym)) => Some(Ty::class(sym.clone())),
                (_, None) => None,
            },
        };

        let interfaces = match class.kind {
            TyKind::Annotation => {
                vec![Ty::class(ClassSymbol::new("java/lang/annotation/Annotation"))]
            }
            _ => decl
                .implements
                .iter()
                .map(|named| self.bind_named(class, &scope, named))
                .collect(),
        };

        let annotations = self.bind_annotations(class, &decl.annotations);

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut method_index = 0u32;

        // Enum constants come first, like javac lays them out.
        for constant in &decl.enum_constants {
            fields.push(FieldInfo {
                sym: FieldSymbol::new(class.sym.clone(), &constant.name),
                access: ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM,
                ty: Ty::class(class.sym.clone()),
                annotations: self.bind_annotations(class, &constant.annotations),
                init: None,
                value: None,
            });
        }

        let record_components: Vec<RecordCompInfo> = decl
            .components
            .iter()
            .map(|component| RecordCompInfo {
                name: component.name.clone(),
                ty: self.bind_ty(class, &scope, &component.ty),
                annotations: self.bind_annotations(class, &component.annotations),
            })
            .collect();
        for component in &record_components {
            fields.push(FieldInfo {
                sym: FieldSymbol::new(class.sym.clone(), &component.name),
                access: ACC_PRIVATE | ACC_FINAL,
                ty: component.ty.clone(),
                annotations: component.annotations.clone(),
                init: None,
                value: None,
            });
        }

        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    let access = field_access(field.mods, class.kind);
                    fields.push(FieldInfo {
                        sym: FieldSymbol::new(class.sym.clone(), &field.name),
                        access,
                        ty: self.bind_ty(class, &scope, &field.ty),
                        annotations: self.bind_annotations(class, &field.annotations),
                        init: field.init.clone(),
                        value: None,
                    });
                }
                Member::Method(method) => {
                    methods.push(self.bind_method(class, &scope, method, method_index));
                    method_index += 1;
                }
                Member::Type(_) => {}
            }
        }

        self.synthesize_members(class, &record_components, &mut methods, &mut method_index);

        TypeBoundClass {
            sym: class.sym.clone(),
            kind: class.kind,
            access: class.access,
            owner: class.owner.clone(),
            children: class.children.clone(),
            superclass_sym: header.superclass.clone(),
            interface_syms: header.interfaces.clone(),
            superclass,
            interfaces,
            type_params,
            fields,
            methods,
            annotations,
            record_components,
            anno_metadata: None, // filled in after constant evaluation
        }
    }

    fn bind_method(
        &self,
        class: &SourceBoundClass,
        class_scope: &TyVarScope,
        method: &MethodDecl,
        index: u32,
    ) -> MethodInfo {
        let name = if method.is_constructor {
            "<init>"
        } else {
            &method.name
        };
        let sym = MethodSymbol::new(class.sym.clone(), index, name);

        let mut scope = TyVarScope {
            vars: class_scope.vars.clone(),
        };
        scope.vars.extend(
            method
                .type_params
                .iter()
                .map(|tp| TyVarSymbol::new(TyVarOwner::Method(sym.clone()), &tp.name)),
        );

        let type_params = self.bind_type_params(
            class,
            &scope,
            &method.type_params,
            TyVarOwner::Method(sym.clone()),
        );

        let params = method
            .params
            .iter()
            .enumerate()
            .map(|(idx, param)| self.bind_param(class, &scope, &sym, idx as u32, param))
            .collect();

        let throws = method
            .throws
            .iter()
            .map(|named| self.bind_named(class, &scope, named))
            .collect();

        MethodInfo {
            sym,
            access: method_access(method, class.kind),
            type_params,
            return_ty: self.bind_ty(class, &scope, &method.return_ty),
            params,
            throws,
            annotations: self.bind_annotations(class, &method.annotations),
            default_expr: method.default_value.clone(),
            default_value: None,
        }
    }

    fn bind_param(
        &self,
        class: &SourceBoundClass,
        scope: &TyVarScope,
        method: &MethodSymbol,
        index: u32,
        param: &VarDecl,
    ) -> ParamInfo {
        ParamInfo {
            sym: ParamSymbol {
                owner: method.clone(),
                index,
                name: param.name.as_str().into(),
            },
            ty: self.bind_ty(class, scope, &param.ty),
            annotations: self.bind_annotations(class, &param.annotations),
        }
    }

    fn bind_type_params(
        &self,
        class: &SourceBoundClass,
        scope: &TyVarScope,
        decls: &[gale_syntax::tree::TyParamDecl],
        owner: TyVarOwner,
    ) -> Vec<TyParamInfo> {
        decls
            .iter()
            .map(|tp| TyParamInfo {
                sym: TyVarSymbol::new(owner.clone(), &tp.name),
                bounds: tp
                    .bounds
                    .iter()
                    .map(|bound| self.bind_named(class, scope, bound))
                    .collect(),
                annotations: self.bind_annotations(class, &tp.annotations),
            })
            .collect()
    }

    /// Synthesize the implicit members javac would: default constructors,
    /// enum `values`/`valueOf`, record accessors and canonical constructor.
    fn synthesize_members(
        &self,
        class: &SourceBoundClass,
        record_components: &[RecordCompInfo],
        methods: &mut Vec<MethodInfo>,
        method_index: &mut u32,
    ) {
        let has_ctor = methods.iter().any(MethodInfo::is_constructor);
        match class.kind {
            TyKind::Class if !has_ctor => {
                let access = class.access & (ACC_PUBLIC | ACC_PROTECTED | ACC_PRIVATE);
                methods.push(self.simple_method(class, method_index, "<init>", Ty::Void, access));
            }
            TyKind::Enum => {
                if !has_ctor {
                    methods.push(self.simple_method(
                        class,
                        method_index,
                        "<init>",
                        Ty::Void,
                        ACC_PRIVATE,
                    ));
                }
                let values_ty = Ty::Array {
                    elem: Box::new(Ty::class(class.sym.clone())),
                    annos: Vec::new(),
                };
                methods.push(self.simple_method(
                    class,
                    method_index,
                    "values",
                    values_ty,
                    ACC_PUBLIC | ACC_STATIC,
                ));
                let mut value_of = self.simple_method(
                    class,
                    method_index,
                    "valueOf",
                    Ty::class(class.sym.clone()),
                    ACC_PUBLIC | ACC_STATIC,
                );
                value_of.params.push(ParamInfo {
                    sym: ParamSymbol {
                        owner: value_of.sym.clone(),
                        index: 0,
                        name: "name".into(),
                    },
                    ty: Ty::string(),
                    annotations: Vec::new(),
                });
                methods.push(value_of);
            }
            TyKind::Record => {
                if !has_ctor {
                    let access = class.access & (ACC_PUBLIC | ACC_PROTECTED | ACC_PRIVATE);
                    let mut ctor =
                        self.simple_method(class, method_index, "<init>", Ty::Void, access);
                    for (idx, component) in record_components.iter().enumerate() {
                        ctor.params.push(ParamInfo {
                            sym: ParamSymbol {
                                owner: ctor.sym.clone(),
                                index: idx as u32,
                                name: component.name.as_str().into(),
                            },
                            ty: component.ty.clone(),
                            annotations: Vec::new(),
                        });
                    }
                    methods.push(ctor);
                }
                for component in record_components {
                    let declared = methods
                        .iter()
                        .any(|m| &*m.sym.name == component.name && m.params.is_empty());
                    if !declared {
                        methods.push(self.simple_method(
                            class,
                            method_index,
                            &component.name,
                            component.ty.clone(),
                            ACC_PUBLIC,
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    fn simple_method(
        &self,
        class: &SourceBoundClass,
        method_index: &mut u32,
        name: &str,
        return_ty: Ty,
        access: u16,
    ) -> MethodInfo {
        let sym = MethodSymbol::new(class.sym.clone(), *method_index, name);
        *method_index += 1;
        MethodInfo {
            sym,
            access,
            type_params: Vec::new(),
            return_ty,
            params: Vec::new(),
            throws: Vec::new(),
            annotations: Vec::new(),
            default_expr: None,
            default_value: None,
        }
    }

    fn bind_annotations(&self, class: &SourceBoundClass, annos: &[AnnoExpr]) -> Vec<AnnoInfo> {
        annos
            .iter()
            .map(|anno| {
                let resolver = Resolver {
                    hierarchy: self,
                    tli: self.tli,
                };
                let sym = resolver.resolve(class, &anno.name, false);
                if sym.is_none() {
                    self.report_unresolved(class, anno.pos, &anno.name.join("."));
                }
                AnnoInfo {
                    sym,
                    args: anno.args.clone(),
                    values: Vec::new(),
                }
            })
            .collect()
    }

    fn bind_named(&self, class: &SourceBoundClass, scope: &TyVarScope, named: &NamedTy) -> Ty {
        self.bind_ty(class, scope, &TypeRef::Named(named.clone()))
    }

    fn bind_ty(&self, class: &SourceBoundClass, scope: &TyVarScope, ty: &TypeRef) -> Ty {
        match ty {
            TypeRef::Void => Ty::Void,
            TypeRef::Prim {
                kind, annotations, ..
            } => Ty::Prim {
                kind: *kind,
                annos: self.bind_annotations(class, annotations),
            },
            TypeRef::Array { elem, annotations } => Ty::Array {
                elem: Box::new(self.bind_ty(class, scope, elem)),
                annos: self.bind_annotations(class, annotations),
            },
            TypeRef::Named(named) => self.bind_class_ty(class, scope, named),
        }
    }

    fn bind_class_ty(&self, class: &SourceBoundClass, scope: &TyVarScope, named: &NamedTy) -> Ty {
        // A single-segment name may be a type variable in scope.
        if named.segments.len() == 1 {
            let segment = &named.segments[0];
            if let Some(var) = scope.lookup(&segment.name) {
                return Ty::TyVar {
                    sym: var.clone(),
                    annos: self.bind_annotations(class, &segment.annotations),
                };
            }
        }

        let resolver = Resolver {
            hierarchy: self,
            tli: self.tli,
        };
        let segments: Vec<String> = named.segments.iter().map(|s| s.name.clone()).collect();
        let Some(sym) = resolver.resolve(class, &segments, false) else {
            self.report_unresolved(class, named.pos, &named.dotted());
            return Ty::Error;
        };

        // Build the segment chain from the resolved symbol's nesting, then
        // attach written type arguments to matching class segments, innermost
        // outward. Implicit (unwritten) enclosing segments get no arguments.
        let mut chain = Vec::new();
        let mut current = Some(sym);
        while let Some(s) = current {
            current = s.enclosing();
            chain.push(s);
        }
        chain.reverse();

        let mut simple: Vec<SimpleClassTy> = chain
            .into_iter()
            .map(|sym| SimpleClassTy {
                sym,
                targs: Vec::new(),
                annos: Vec::new(),
            })
            .collect();

        let mut chain_idx = simple.len();
        for segment in named.segments.iter().rev() {
            if chain_idx == 0 {
                break;
            }
            if simple[chain_idx - 1].sym.simple_name() == segment.name {
                chain_idx -= 1;
                simple[chain_idx].targs = segment
                    .type_args
                    .iter()
                    .map(|arg| self.bind_type_arg(class, scope, arg))
                    .collect();
                simple[chain_idx].annos = self.bind_annotations(class, &segment.annotations);
            }
        }

        Ty::Class(ClassTy { segments: simple })
    }

    fn bind_type_arg(&self, class: &SourceBoundClass, scope: &TyVarScope, arg: &TypeArg) -> Ty {
        match arg {
            TypeArg::Ty(ty) => self.bind_ty(class, scope, ty),
            TypeArg::Wild { annotations } => Ty::Wild(WildTy::None {
                annos: self.bind_annotations(class, annotations),
            }),
            TypeArg::WildUpper { bound, annotations } => Ty::Wild(WildTy::Upper {
                bound: Box::new(self.bind_ty(class, scope, bound)),
                annos: self.bind_annotations(class, annotations),
            }),
            TypeArg::WildLower { bound, annotations } => Ty::Wild(WildTy::Lower {
                bound: Box::new(self.bind_ty(class, scope, bound)),
                annos: self.bind_annotations(class, annotations),
            }),
        }
    }

    fn report_unresolved(&self, class: &SourceBoundClass, pos: u32, name: &str) {
        self.diagnostics.borrow_mut().push(
            Diagnostic::new(
                &class.source.path,
                DiagnosticKind::SymbolNotFound,
                format!("could not resolve {name}"),
            )
            .at(&class.source.line_map, pos),
        );
    }
}

impl Hierarchy for TypeBinder<'_> {
    fn supers(&self, sym: &ClassSymbol) -> (Option<ClassSymbol>, Vec<ClassSymbol>) {
        if let Some(header) = self.headers.get(sym) {
            (header.superclass.clone(), header.interfaces.clone())
        } else if let Some(bytecode) = self.classpath.get(sym) {
            (bytecode.superclass(), bytecode.interfaces())
        } else {
            (None, Vec::new())
        }
    }

    fn child(&self, sym: &ClassSymbol, simple_name: &str) -> Option<ClassSymbol> {
        if let Some(header) = self.headers.get(sym) {
            return header.base.children.get(simple_name).cloned();
        }
        self.classpath.get(sym)?.child(simple_name)
    }
}

fn field_access(mods: Modifiers, class_kind: TyKind) -> u16 {
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
    if mods.contains(Modifiers::TRANSIENT) {
        access |= ACC_TRANSIENT;
    }
    if mods.contains(Modifiers::VOLATILE) {
        access |= ACC_VOLATILE;
    }
    if matches!(class_kind, TyKind::Interface | TyKind::Annotation) {
        access = (access & !(ACC_PROTECTED | ACC_PRIVATE)) | ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
    }
    access
}

fn method_access(method: &MethodDecl, class_kind: TyKind) -> u16 {
    let mods = method.mods;
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
    if mods.contains(Modifiers::NATIVE) {
        access |= ACC_NATIVE;
    }
    if mods.contains(Modifiers::SYNCHRONIZED) {
        access |= ACC_SYNCHRONIZED;
    }
    if mods.contains(Modifiers::STRICTFP) {
        access |= ACC_STRICT;
    }
    if method.varargs {
        access |= ACC_VARARGS;
    }
    if matches!(class_kind, TyKind::Interface | TyKind::Annotation) {
        if access & (ACC_PRIVATE | ACC_PROTECTED) == 0 {
            access |= ACC_PUBLIC;
        }
        // Interface methods without a body are implicitly abstract; default
        // and static methods have (skipped) bodies.
        if access & (ACC_STATIC | ACC_PRIVATE) == 0 && !method.mods.contains(Modifiers::DEFAULT) {
            access |= ACC_ABSTRACT;
        }
    }
    access
}
