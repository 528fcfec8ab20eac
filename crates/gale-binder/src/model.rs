use std::collections::BTreeMap;
use std::rc::Rc;

use gale_syntax::tree::{Expr, Member, TyDecl, TyKind};
use gale_syntax::SourceFile;

use crate::bytecode::BytecodeBoundClass;
use crate::sym::{ClassSymbol, FieldSymbol, MethodSymbol, ParamSymbol, TyVarSymbol};
use crate::ty::Ty;
use crate::value::Const;

/// An annotation use. Source-side uses carry their argument expressions
/// until constant evaluation fills in the value map; classpath uses arrive
/// with values only.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnoInfo {
    /// `None` when the annotation type did not resolve (dropped at lowering).
    pub sym: Option<ClassSymbol>,
    pub args: Vec<(Option<String>, Expr)>,
    pub values: Vec<(String, Const)>,
}

impl AnnoInfo {
    pub fn resolved(sym: ClassSymbol) -> Self {
        Self {
            sym: Some(sym),
            args: Vec::new(),
            values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Source,
    Class,
    Runtime,
}

/// The meta-annotations of an annotation declaration that header compilation
/// must preserve: retention, target set, repeatable container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMetadata {
    pub retention: Retention,
    /// `None` means no `@Target`: every declaration context applies.
    pub targets: Option<Vec<String>>,
    pub repeatable: Option<ClassSymbol>,
}

impl Default for AnnotationMetadata {
    fn default() -> Self {
        Self {
            retention: Retention::Class,
            targets: None,
            repeatable: None,
        }
    }
}

impl AnnotationMetadata {
    pub fn target(&self) -> &[String] {
        self.targets.as_deref().unwrap_or(&[])
    }
}

/// Phase E output: a declared type, its place in the nesting forest, and a
/// handle back to its syntax.
#[derive(Debug, Clone)]
pub struct SourceBoundClass {
    pub sym: ClassSymbol,
    pub owner: Option<ClassSymbol>,
    pub kind: TyKind,
    /// Classfile access flags, computed from modifiers and context.
    pub access: u16,
    /// Simple name to symbol, declaration order preserved by the map's
    /// ordering on names.
    pub children: BTreeMap<String, ClassSymbol>,
    pub source: Rc<SourceFile>,
    /// Path to the declaration: an index into `unit.types`, then member
    /// indices for each nesting level.
    pub decl_path: Vec<usize>,
}

impl SourceBoundClass {
    pub fn decl(&self) -> &TyDecl {
        let mut decl = &self.source.unit.types[self.decl_path[0]];
        for &idx in &self.decl_path[1..] {
            decl = match &decl.members[idx] {
                Member::Type(nested) => nested,
                other => panic!("decl path does not name a type: {other:?}"),
            };
        }
        decl
    }
}

/// Phase H output: supertypes and type parameters as symbols.
#[derive(Debug, Clone)]
pub struct HeaderBoundClass {
    pub base: SourceBoundClass,
    /// `None` only for `java/lang/Object` itself.
    pub superclass: Option<ClassSymbol>,
    pub interfaces: Vec<ClassSymbol>,
    pub type_params: Vec<TyVarSymbol>,
}

/// Phase T (and C) output: the fully typed class.
#[derive(Debug, Clone)]
pub struct TypeBoundClass {
    pub sym: ClassSymbol,
    pub kind: TyKind,
    pub access: u16,
    pub owner: Option<ClassSymbol>,
    pub children: BTreeMap<String, ClassSymbol>,
    pub superclass_sym: Option<ClassSymbol>,
    pub interface_syms: Vec<ClassSymbol>,
    pub superclass: Option<Ty>,
    pub interfaces: Vec<Ty>,
    pub type_params: Vec<TyParamInfo>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub annotations: Vec<AnnoInfo>,
    /// Record components, in declaration order; empty for non-records.
    pub record_components: Vec<RecordCompInfo>,
    /// Present on annotation declarations.
    pub anno_metadata: Option<AnnotationMetadata>,
}

#[derive(Debug, Clone)]
pub struct RecordCompInfo {
    pub name: String,
    pub ty: Ty,
    pub annotations: Vec<AnnoInfo>,
}

#[derive(Debug, Clone)]
pub struct TyParamInfo {
    pub sym: TyVarSymbol,
    pub bounds: Vec<Ty>,
    pub annotations: Vec<AnnoInfo>,
}

impl TyParamInfo {
    /// The erasure of this parameter: its first bound, or `Object`.
    pub fn erasure_descriptor(&self) -> String {
        self.bounds
            .first()
            .map(Ty::descriptor)
            .unwrap_or_else(|| "Ljava/lang/Object;".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub sym: FieldSymbol,
    pub access: u16,
    pub ty: Ty,
    pub annotations: Vec<AnnoInfo>,
    /// The initializer expression, kept for constant evaluation.
    pub init: Option<Expr>,
    /// Filled in by phase C for constant variables.
    pub value: Option<Const>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub sym: MethodSymbol,
    pub access: u16,
    pub type_params: Vec<TyParamInfo>,
    pub return_ty: Ty,
    pub params: Vec<ParamInfo>,
    pub throws: Vec<Ty>,
    pub annotations: Vec<AnnoInfo>,
    /// Annotation element default, pre- and post-eval.
    pub default_expr: Option<Expr>,
    pub default_value: Option<Const>,
}

impl MethodInfo {
    pub fn is_constructor(&self) -> bool {
        &*self.sym.name == "<init>"
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub sym: ParamSymbol,
    pub ty: Ty,
    pub annotations: Vec<AnnoInfo>,
}

/// A uniform view over fully bound classes, wherever they came from.
#[derive(Clone)]
pub enum ClassView<'a> {
    Source(&'a TypeBoundClass),
    Bytecode(Rc<BytecodeBoundClass>),
}

impl ClassView<'_> {
    pub fn kind(&self) -> TyKind {
        match self {
            ClassView::Source(c) => c.kind,
            ClassView::Bytecode(c) => c.kind(),
        }
    }

    pub fn access(&self) -> u16 {
        match self {
            ClassView::Source(c) => c.access,
            ClassView::Bytecode(c) => c.access(),
        }
    }

    pub fn superclass(&self) -> Option<ClassSymbol> {
        match self {
            ClassView::Source(c) => c.superclass_sym.clone(),
            ClassView::Bytecode(c) => c.superclass(),
        }
    }

    pub fn interfaces(&self) -> Vec<ClassSymbol> {
        match self {
            ClassView::Source(c) => c.interface_syms.clone(),
            ClassView::Bytecode(c) => c.interfaces(),
        }
    }

    pub fn child(&self, simple_name: &str) -> Option<ClassSymbol> {
        match self {
            ClassView::Source(c) => c.children.get(simple_name).cloned(),
            ClassView::Bytecode(c) => c.child(simple_name),
        }
    }

    pub fn annotation_metadata(&self) -> AnnotationMetadata {
        match self {
            ClassView::Source(c) => c.anno_metadata.clone().unwrap_or_default(),
            ClassView::Bytecode(c) => c.annotation_metadata(),
        }
    }
}
