//! Member inheritance: the union of declared and inherited members, with
//! overridden methods collapsed and accessibility filtered.

use std::collections::{HashSet, VecDeque};

use gale_classfile::access::*;

use crate::binder::BindingEnv;
use crate::model::ClassView;
use crate::sym::{ClassSymbol, TyVarSymbol};
use crate::ty::{erased_descriptor, Ty};
use crate::value::Const;

/// One member, normalized across source- and bytecode-bound classes.
#[derive(Debug, Clone)]
pub struct MemberRec {
    pub owner: ClassSymbol,
    pub name: String,
    pub access: u16,
    pub is_field: bool,
    /// Erased descriptor: a field descriptor or a method descriptor.
    pub descriptor: String,
    /// The constant value for constant variables, `None` otherwise.
    pub constant: Option<Const>,
}

impl MemberRec {
    pub fn is_enum_constant(&self) -> bool {
        self.is_field && self.access & ACC_ENUM != 0
    }
}

/// All members of `sym` visible from `from_package`: declared members plus
/// inherited ones, walking superclass before interfaces.
///
/// A supertype method is hidden when a subtype already contributed one with
/// the same name and erased parameter types; fields hide by simple name.
/// Constructors are never inherited.
pub fn all_members(env: &BindingEnv<'_>, sym: &ClassSymbol, from_package: &str) -> Vec<MemberRec> {
    let mut out = Vec::new();
    let mut seen_fields: HashSet<String> = HashSet::new();
    let mut seen_methods: HashSet<(String, String)> = HashSet::new();
    let mut visited: HashSet<ClassSymbol> = HashSet::new();
    let mut queue: VecDeque<ClassSymbol> = VecDeque::new();
    queue.push_back(sym.clone());

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(view) = env.view(&current) else { continue };
        let inherited = current != *sym;

        for member in declared_members(env, &view, &current) {
            if inherited && !accessible(&member, &current, from_package) {
                continue;
            }
            if inherited && member.name == "<init>" {
                continue;
            }
            if member.is_field {
                if seen_fields.insert(member.name.clone()) {
                    out.push(member);
                }
            } else {
                let key = (member.name.clone(), param_part(&member.descriptor));
                if seen_methods.insert(key) {
                    out.push(member);
                }
            }
        }

        if let Some(superclass) = view.superclass() {
            queue.push_back(superclass);
        }
        for iface in view.interfaces() {
            queue.push_back(iface);
        }
    }

    out
}

/// The transitive supertype closure of `roots`, excluding the roots
/// themselves, in deterministic first-encounter (depth-first, superclass
/// before interfaces) order.
pub fn supertype_closure(env: &BindingEnv<'_>, roots: &[ClassSymbol]) -> Vec<ClassSymbol> {
    let mut out = Vec::new();
    let mut visited: HashSet<ClassSymbol> = roots.iter().cloned().collect();
    for root in roots {
        let Some(view) = env.view(root) else { continue };
        let mut stack: Vec<ClassSymbol> = Vec::new();
        for iface in view.interfaces().into_iter().rev() {
            stack.push(iface);
        }
        if let Some(superclass) = view.superclass() {
            stack.push(superclass);
        }
        while let Some(sym) = stack.pop() {
            if !visited.insert(sym.clone()) {
                continue;
            }
            if let Some(view) = env.view(&sym) {
                for iface in view.interfaces().into_iter().rev() {
                    stack.push(iface);
                }
                if let Some(superclass) = view.superclass() {
                    stack.push(superclass);
                }
            }
            out.push(sym);
        }
    }
    out
}

/// Find one field (by name) on `sym` or its supertypes, from any package
/// with access filtering disabled for the declaring class itself. Used by
/// constant evaluation, which only cares about constant variables.
pub(crate) fn find_field(
    env: &BindingEnv<'_>,
    sym: &ClassSymbol,
    name: &str,
) -> Option<MemberRec> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(sym.clone());
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(view) = env.view(&current) else { continue };
        for member in declared_members(env, &view, &current) {
            if member.is_field && member.name == name {
                return Some(member);
            }
        }
        if let Some(superclass) = view.superclass() {
            queue.push_back(superclass);
        }
        for iface in view.interfaces() {
            queue.push_back(iface);
        }
    }
    None
}

fn declared_members(
    env: &BindingEnv<'_>,
    view: &ClassView<'_>,
    owner: &ClassSymbol,
) -> Vec<MemberRec> {
    match view {
        ClassView::Source(class) => {
            let class_bounds = bounds_lookup(env, class);
            let mut out: Vec<MemberRec> = class
                .fields
                .iter()
                .map(|field| MemberRec {
                    owner: owner.clone(),
                    name: field.sym.name.to_string(),
                    access: field.access,
                    is_field: true,
                    descriptor: erased_descriptor(&field.ty, &class_bounds),
                    constant: field.value.clone(),
                })
                .collect();
            for method in &class.methods {
                let method_bounds = |var: &TyVarSymbol| {
                    method
                        .type_params
                        .iter()
                        .find(|tp| &tp.sym == var)
                        .and_then(|tp| tp.bounds.first().cloned())
                        .or_else(|| class_bounds(var))
                };
                let mut descriptor = String::from("(");
                for param in &method.params {
                    descriptor.push_str(&erased_descriptor(&param.ty, &method_bounds));
                }
                descriptor.push(')');
                descriptor.push_str(&erased_descriptor(&method.return_ty, &method_bounds));
                out.push(MemberRec {
                    owner: owner.clone(),
                    name: method.sym.name.to_string(),
                    access: method.access,
                    is_field: false,
                    descriptor,
                    constant: None,
                });
            }
            out
        }
        ClassView::Bytecode(class) => {
            let mut out: Vec<MemberRec> = class
                .fields()
                .iter()
                .map(|field| MemberRec {
                    owner: owner.clone(),
                    name: field.name.clone(),
                    access: field.access,
                    is_field: true,
                    descriptor: field.descriptor.clone(),
                    constant: field.constant.clone(),
                })
                .collect();
            for method in class.methods().iter() {
                out.push(MemberRec {
                    owner: owner.clone(),
                    name: method.name.clone(),
                    access: method.access,
                    is_field: false,
                    descriptor: method.descriptor.clone(),
                    constant: None,
                });
            }
            out
        }
    }
}

fn bounds_lookup<'b>(
    _env: &BindingEnv<'_>,
    class: &'b crate::model::TypeBoundClass,
) -> impl Fn(&TyVarSymbol) -> Option<Ty> + 'b {
    move |var: &TyVarSymbol| {
        class
            .type_params
            .iter()
            .find(|tp| &tp.sym == var)
            .and_then(|tp| tp.bounds.first().cloned())
    }
}

fn accessible(member: &MemberRec, owner: &ClassSymbol, from_package: &str) -> bool {
    if member.access & ACC_PUBLIC != 0 || member.access & ACC_PROTECTED != 0 {
        return true;
    }
    if member.access & ACC_PRIVATE != 0 {
        return false;
    }
    owner.package_name() == from_package
}

fn param_part(descriptor: &str) -> String {
    match descriptor.split_once(')') {
        Some((params, _)) => format!("{params})"),
        None => descriptor.to_string(),
    }
}
