//! Name resolution scopes.
//!
//! Resolution order for a name used in a class C of unit U:
//!
//! 1. member types of C and its enclosing classes (including inherited ones),
//! 2. single-type imports of U,
//! 3. U's own package,
//! 4. on-demand imports of U (failures ignored),
//! 5. the top-level index (fully qualified names).
//!
//! Phase H and phase T differ only in where supertype edges come from, so
//! the walker is generic over a [`Hierarchy`] source.

use std::collections::HashSet;

use gale_syntax::tree::ImportDecl;

use crate::model::SourceBoundClass;
use crate::sym::ClassSymbol;
use crate::tli::TopLevelIndex;

/// Supertype and member-type edges, supplied by the current phase.
pub(crate) trait Hierarchy {
    fn supers(&self, sym: &ClassSymbol) -> (Option<ClassSymbol>, Vec<ClassSymbol>);
    fn child(&self, sym: &ClassSymbol, simple_name: &str) -> Option<ClassSymbol>;
}

pub(crate) struct Resolver<'a, H: Hierarchy> {
    pub hierarchy: &'a H,
    pub tli: &'a TopLevelIndex,
}

impl<'a, H: Hierarchy> Resolver<'a, H> {
    /// Resolve a dotted name appearing inside `context`.
    ///
    /// While a class's own header is being bound, inherited members of that
    /// class are not yet available; `binding_self` restricts the first
    /// lexical hop to declared children in that case.
    pub fn resolve(
        &self,
        context: &SourceBoundClass,
        segments: &[String],
        binding_self: bool,
    ) -> Option<ClassSymbol> {
        let first = segments.first()?;
        if let Some(base) = self.resolve_simple(context, first, binding_self) {
            return self.descend(base, &segments[1..]);
        }
        // Leading segments that resolve to nothing in scope may be package
        // qualifiers of a fully qualified name.
        self.resolve_canonical(segments)
    }

    /// Resolve the nested-class tail of a lookup.
    pub fn descend(&self, base: ClassSymbol, rest: &[String]) -> Option<ClassSymbol> {
        let mut current = base;
        for segment in rest {
            current = self.find_member_type(&current, segment)?;
        }
        Some(current)
    }

    fn resolve_simple(
        &self,
        context: &SourceBoundClass,
        name: &str,
        binding_self: bool,
    ) -> Option<ClassSymbol> {
        // 1. The class itself and its enclosing chain.
        if binding_self {
            if let Some(child) = context.children.get(name) {
                return Some(child.clone());
            }
        } else if let Some(found) = self.find_member_type(&context.sym, name) {
            return Some(found);
        }
        let mut enclosing = context.owner.clone();
        while let Some(sym) = enclosing {
            if sym.simple_name() == name {
                return Some(sym);
            }
            if let Some(found) = self.find_member_type(&sym, name) {
                return Some(found);
            }
            enclosing = sym.enclosing();
        }
        // A top-level class is in scope of its own body by simple name.
        let top_level = top_level_of(&context.sym);
        if top_level.simple_name() == name {
            return Some(top_level);
        }

        let unit = &context.source.unit;

        // 2. Single-type imports. An import that names something that does
        // not exist resolves nothing; that is only an error if the name is
        // actually used and nothing else resolves it.
        for import in &unit.imports {
            if import.wildcard || import.is_static {
                continue;
            }
            if import.name.last().map(String::as_str) == Some(name) {
                if let Some(found) = self.resolve_canonical(&import.name) {
                    return Some(found);
                }
            }
        }

        // 3. Same package.
        let package: Vec<String> = match &unit.package {
            Some(pkg) => pkg.name.clone(),
            None => Vec::new(),
        };
        if let Some(scope) = self.tli.lookup_package(&package) {
            if let Some(found) = scope.class(name) {
                return Some(found);
            }
        }

        // 4. On-demand imports; failures are ignored, matching source
        // semantics. `java.lang` is implicitly imported on demand.
        for import in &unit.imports {
            if !import.wildcard || import.is_static {
                continue;
            }
            if let Some(found) = self.resolve_on_demand(import, name) {
                return Some(found);
            }
        }
        if let Some(scope) = self.tli.lookup_package(&java_lang()) {
            if let Some(found) = scope.class(name) {
                return Some(found);
            }
        }

        // 5. Fully qualified via the top-level index: `name` alone can only
        // be a class in the unnamed package here.
        let key = vec![name.to_string()];
        self.tli.lookup(&key).map(|result| result.sym)
    }

    /// Resolve a canonical (import-style) qualified name.
    pub fn resolve_canonical(&self, segments: &[String]) -> Option<ClassSymbol> {
        let result = self.tli.lookup(segments)?;
        self.descend(result.sym, result.remaining)
    }

    fn resolve_on_demand(&self, import: &ImportDecl, name: &str) -> Option<ClassSymbol> {
        // `import a.b.*` where a.b is a package...
        if let Some(scope) = self.tli.lookup_package(&import.name) {
            if let Some(found) = scope.class(name) {
                return Some(found);
            }
        }
        // ...or where a.b is a class whose member types are imported.
        let base = self.resolve_canonical(&import.name)?;
        self.find_member_type(&base, name)
    }

    /// Search `sym` and its supertype closure for a member type.
    pub fn find_member_type(&self, sym: &ClassSymbol, name: &str) -> Option<ClassSymbol> {
        let mut seen = HashSet::new();
        self.find_member_type_rec(sym, name, &mut seen)
    }

    fn find_member_type_rec(
        &self,
        sym: &ClassSymbol,
        name: &str,
        seen: &mut HashSet<ClassSymbol>,
    ) -> Option<ClassSymbol> {
        if !seen.insert(sym.clone()) {
            return None;
        }
        if let Some(child) = self.hierarchy.child(sym, name) {
            return Some(child);
        }
        let (superclass, interfaces) = self.hierarchy.supers(sym);
        for parent in superclass.into_iter().chain(interfaces) {
            if let Some(found) = self.find_member_type_rec(&parent, name, seen) {
                return Some(found);
            }
        }
        None
    }
}

fn java_lang() -> [String; 2] {
    ["java".to_string(), "lang".to_string()]
}

fn top_level_of(sym: &ClassSymbol) -> ClassSymbol {
    let mut current = sym.clone();
    while let Some(enclosing) = current.enclosing() {
        current = enclosing;
    }
    current
}
