use gale_syntax::tree::PrimKind;

use crate::model::AnnoInfo;
use crate::sym::{ClassSymbol, TyVarSymbol};

/// A bound language type.
///
/// Every variant that can carry type-use annotations does; annotations never
/// affect identity for binding purposes, they only round-trip into bytecode.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Prim {
        kind: PrimKind,
        annos: Vec<AnnoInfo>,
    },
    Void,
    Class(ClassTy),
    Array {
        elem: Box<Ty>,
        annos: Vec<AnnoInfo>,
    },
    TyVar {
        sym: TyVarSymbol,
        annos: Vec<AnnoInfo>,
    },
    Wild(WildTy),
    Intersection(Vec<Ty>),
    /// The sentinel for unresolved references; downstream consumers treat it
    /// as an opaque `java/lang/Object`-like type and keep going.
    Error,
}

impl Ty {
    pub fn prim(kind: PrimKind) -> Self {
        Ty::Prim {
            kind,
            annos: Vec::new(),
        }
    }

    /// A non-generic class type for `sym`.
    pub fn class(sym: ClassSymbol) -> Self {
        Ty::Class(ClassTy::raw(sym))
    }

    pub fn object() -> Self {
        Ty::class(ClassSymbol::new("java/lang/Object"))
    }

    pub fn string() -> Self {
        Ty::class(ClassSymbol::new("java/lang/String"))
    }

    /// The erased field descriptor of this type. `Error` erases to
    /// `java/lang/Object` so emission can continue past unresolved symbols.
    pub fn descriptor(&self) -> String {
        match self {
            Ty::Prim { kind, .. } => prim_descriptor(*kind).to_string(),
            Ty::Void => "V".to_string(),
            Ty::Class(class) => class.sym().descriptor(),
            Ty::Array { elem, .. } => format!("[{}", elem.descriptor()),
            Ty::TyVar { .. } => "Ljava/lang/Object;".to_string(),
            Ty::Wild(_) => "Ljava/lang/Object;".to_string(),
            Ty::Intersection(tys) => tys
                .first()
                .map(Ty::descriptor)
                .unwrap_or_else(|| "Ljava/lang/Object;".to_string()),
            Ty::Error => "Ljava/lang/Object;".to_string(),
        }
    }

    /// Whether a `Signature` attribute is needed when this type appears in a
    /// descriptor position.
    pub fn is_generic(&self) -> bool {
        match self {
            Ty::Prim { .. } | Ty::Void | Ty::Error => false,
            Ty::TyVar { .. } | Ty::Wild(_) | Ty::Intersection(_) => true,
            Ty::Class(class) => class
                .segments
                .iter()
                .any(|seg| !seg.targs.is_empty()),
            Ty::Array { elem, .. } => elem.is_generic(),
        }
    }
}

/// Erasure with type-variable bounds in scope: a variable erases to its
/// first bound (`Object` without one), recursively.
pub fn erased_descriptor(ty: &Ty, bounds: &dyn Fn(&TyVarSymbol) -> Option<Ty>) -> String {
    erased_descriptor_rec(ty, bounds, 0)
}

fn erased_descriptor_rec(
    ty: &Ty,
    bounds: &dyn Fn(&TyVarSymbol) -> Option<Ty>,
    depth: u32,
) -> String {
    // `T extends U, U extends T` style cycles bottom out at Object.
    if depth > 16 {
        return "Ljava/lang/Object;".to_string();
    }
    match ty {
        Ty::TyVar { sym, .. } => match bounds(sym) {
            Some(bound) => erased_descriptor_rec(&bound, bounds, depth + 1),
            None => "Ljava/lang/Object;".to_string(),
        },
        Ty::Array { elem, .. } => {
            format!("[{}", erased_descriptor_rec(elem, bounds, depth + 1))
        }
        Ty::Intersection(tys) => tys
            .first()
            .map(|t| erased_descriptor_rec(t, bounds, depth + 1))
            .unwrap_or_else(|| "Ljava/lang/Object;".to_string()),
        other => other.descriptor(),
    }
}

pub(crate) fn prim_descriptor(kind: PrimKind) -> &'static str {
    match kind {
        PrimKind::Boolean => "Z",
        PrimKind::Byte => "B",
        PrimKind::Short => "S",
        PrimKind::Int => "I",
        PrimKind::Long => "J",
        PrimKind::Char => "C",
        PrimKind::Float => "F",
        PrimKind::Double => "D",
    }
}

/// A class type as a sequence of enclosing segments, outermost first, each
/// with its own type arguments: `Outer<A>.Inner<B>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTy {
    pub segments: Vec<SimpleClassTy>,
}

impl ClassTy {
    /// A single-segment, argument-free class type.
    pub fn raw(sym: ClassSymbol) -> Self {
        Self {
            segments: vec![SimpleClassTy {
                sym,
                targs: Vec::new(),
                annos: Vec::new(),
            }],
        }
    }

    /// The symbol of the class itself: the last segment's.
    pub fn sym(&self) -> &ClassSymbol {
        &self
            .segments
            .last()
            .expect("ClassTy has at least one segment")
            .sym
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleClassTy {
    pub sym: ClassSymbol,
    pub targs: Vec<Ty>,
    pub annos: Vec<AnnoInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WildTy {
    None {
        annos: Vec<AnnoInfo>,
    },
    Upper {
        bound: Box<Ty>,
        annos: Vec<AnnoInfo>,
    },
    Lower {
        bound: Box<Ty>,
        annos: Vec<AnnoInfo>,
    },
}
