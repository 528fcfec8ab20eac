//! The symbol binder: turns parsed compilation units plus a classpath into a
//! fully typed, cross-referenced class model.
//!
//! Binding runs as four phases, each a complete pass over the source set:
//!
//! 1. **Enter** — enumerate declared types, assign canonical binary names,
//!    build package scopes.
//! 2. **Header** — resolve superclass, interface, and type-parameter-bound
//!    symbols; detect hierarchy cycles.
//! 3. **Type** — resolve field/method/annotation types to full [`Ty`] values.
//! 4. **Constant** — fixed-point evaluation of constant field initializers
//!    and annotation arguments.
//!
//! Classes are never linked by direct references: a [`ClassSymbol`] names a
//! class, and every dereference goes through an environment, which is what
//! makes cyclic class-to-class references tractable.

mod binder;
mod bytecode;
mod consteval;
mod enter;
mod hier;
mod members;
mod memo;
mod model;
mod scope;
mod sym;
mod tli;
mod ty;
mod typebind;
mod value;

pub use crate::binder::{bind, BoundModule, BoundResult};
pub use crate::bytecode::{BytecodeBoundClass, ClasspathEnv};
pub use crate::binder::BindingEnv;
pub use crate::members::{all_members, supertype_closure, MemberRec};
pub use crate::ty::erased_descriptor;
pub use crate::model::{
    AnnoInfo, AnnotationMetadata, ClassView, FieldInfo, HeaderBoundClass, MethodInfo, ParamInfo,
    RecordCompInfo, Retention, SourceBoundClass, TyParamInfo, TypeBoundClass,
};
pub use crate::sym::{ClassSymbol, FieldSymbol, MethodSymbol, ParamSymbol, TyVarOwner, TyVarSymbol};
pub use crate::tli::{LookupResult, TopLevelIndex};
pub use crate::ty::{ClassTy, SimpleClassTy, Ty, WildTy};
pub use crate::value::Const;
