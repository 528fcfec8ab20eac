//! Phase H: resolve superclass, interface, and type-parameter-bound symbols,
//! detecting hierarchy cycles along the way.
//!
//! Headers are bound on demand and memoized: resolving `class B extends A`
//! may need member types of `A`, which needs `A`'s header first. A depth-
//! first stack catches back-edges; a cycle is reported once, as a path, and
//! the offending class falls back to `java/lang/Object` so binding can keep
//! accruing diagnostics.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use gale_core::{Diagnostic, DiagnosticKind, Diagnostics};
use gale_syntax::tree::{NamedTy, TyKind};

use crate::bytecode::ClasspathEnv;
use crate::model::{HeaderBoundClass, SourceBoundClass};
use crate::scope::{Hierarchy, Resolver};
use crate::sym::{ClassSymbol, TyVarOwner, TyVarSymbol};
use crate::tli::TopLevelIndex;

pub(crate) struct HierarchyBinder<'a> {
    enter: &'a BTreeMap<ClassSymbol, SourceBoundClass>,
    tli: &'a TopLevelIndex,
    classpath: &'a ClasspathEnv,
    cache: RefCell<HashMap<ClassSymbol, Rc<HeaderBoundClass>>>,
    stack: RefCell<Vec<ClassSymbol>>,
    diagnostics: RefCell<Diagnostics>,
}

impl<'a> HierarchyBinder<'a> {
    pub fn new(
        enter: &'a BTreeMap<ClassSymbol, SourceBoundClass>,
        tli: &'a TopLevelIndex,
        classpath: &'a ClasspathEnv,
    ) -> Self {
        Self {
            enter,
            tli,
            classpath,
            cache: RefCell::new(HashMap::new()),
            stack: RefCell::new(Vec::new()),
            diagnostics: RefCell::new(Diagnostics::default()),
        }
    }

    pub fn bind_all(self) -> (BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>, Diagnostics) {
        for sym in self.enter.keys() {
            self.header(sym);
        }
        let headers: BTreeMap<ClassSymbol, Rc<HeaderBoundClass>> = {
            let cache = self.cache.borrow();
            self.enter
                .keys()
                .map(|sym| (sym.clone(), cache[sym].clone()))
                .collect()
        };
        self.check_cycles(&headers);
        (headers, self.diagnostics.into_inner())
    }

    /// Depth-first walk over supertype edges; a back-edge on the walk stack
    /// is a cycle, reported as the offending path.
    ///
    /// Cycles that resolution itself tripped over were already broken with an
    /// Object fallback (and reported), so this pass sees each remaining cycle
    /// exactly once.
    fn check_cycles(&self, headers: &BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>) {
        let mut done: HashSet<ClassSymbol> = HashSet::new();
        for root in headers.keys() {
            let mut stack = Vec::new();
            self.cycle_dfs(root, headers, &mut done, &mut stack);
        }
    }

    fn cycle_dfs(
        &self,
        sym: &ClassSymbol,
        headers: &BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>,
        done: &mut HashSet<ClassSymbol>,
        stack: &mut Vec<ClassSymbol>,
    ) {
        if done.contains(sym) {
            return;
        }
        if let Some(start) = stack.iter().position(|s| s == sym) {
            let mut path: Vec<&str> = stack[start..].iter().map(ClassSymbol::binary_name).collect();
            path.push(sym.binary_name());
            // Attach the diagnostic to the first source class on the cycle.
            if let Some(class) = stack[start..].iter().find_map(|s| self.enter.get(s)) {
                let decl = class.decl();
                self.diagnostics.borrow_mut().push(
                    Diagnostic::new(
                        &class.source.path,
                        DiagnosticKind::CyclicHierarchy,
                        format!("cycle in class hierarchy: {}", path.join(" -> ")),
                    )
                    .at(&class.source.line_map, decl.pos),
                );
            }
            // Mark the members settled so the cycle reports only once.
            for member in &stack[start..] {
                done.insert(member.clone());
            }
            return;
        }

        let (superclass, interfaces) = if let Some(header) = headers.get(sym) {
            (header.superclass.clone(), header.interfaces.clone())
        } else if let Some(bytecode) = self.classpath.get(sym) {
            (bytecode.superclass(), bytecode.interfaces())
        } else {
            (None, Vec::new())
        };

        stack.push(sym.clone());
        for parent in superclass.into_iter().chain(interfaces) {
            self.cycle_dfs(&parent, headers, done, stack);
        }
        stack.pop();
        done.insert(sym.clone());
    }

    pub fn header(&self, sym: &ClassSymbol) -> Rc<HeaderBoundClass> {
        if let Some(cached) = self.cache.borrow().get(sym) {
            return cached.clone();
        }

        if self.stack.borrow().iter().any(|s| s == sym) {
            self.report_cycle(sym);
            // Break the recursion; the fallback super keeps later phases
            // moving while the cycle diagnostic fails the compilation.
            let fallback = Rc::new(HeaderBoundClass {
                base: self.enter[sym].clone(),
                superclass: Some(ClassSymbol::new("java/lang/Object")),
                interfaces: Vec::new(),
                type_params: Vec::new(),
            });
            self.cache
                .borrow_mut()
                .insert(sym.clone(), fallback.clone());
            return fallback;
        }

        self.stack.borrow_mut().push(sym.clone());
        let bound = Rc::new(self.bind_header(&self.enter[sym]));
        self.stack.borrow_mut().pop();

        // A cycle detected mid-bind may have already cached a fallback for
        // this symbol; the first entry wins so the path stays consistent.
        self.cache
            .borrow_mut()
            .entry(sym.clone())
            .or_insert(bound)
            .clone()
    }

    fn bind_header(&self, class: &SourceBoundClass) -> HeaderBoundClass {
        let decl = class.decl();

        let type_params = decl
            .type_params
            .iter()
            .map(|tp| TyVarSymbol::new(TyVarOwner::Class(class.sym.clone()), &tp.name))
            .collect();

        let superclass = match class.kind {
            TyKind::Enum => Some(ClassSymbol::new("java/lang/Enum")),
            TyKind::Record => Some(ClassSymbol::new("java/lang/Record")),
            TyKind::Interface | TyKind::Annotation => Some(ClassSymbol::new("java/lang/Object")),
            TyKind::Class => match &decl.extends {
                // Unresolved supertypes fall back to Object here; phase T
                // re-resolves the written type and owns the diagnostic.
                Some(named) => Some(
                    self.resolve_quiet(class, named)
                        .unwrap_or_else(|| ClassSymbol::new("java/lang/Object")),
                ),
                None if class.sym.binary_name() == "java/lang/Object" => None,
                None => Some(ClassSymbol::new("java/lang/Object")),
            },
        };

        let mut interfaces: Vec<ClassSymbol> = decl
            .implements
            .iter()
            .filter_map(|named| self.resolve_quiet(class, named))
            .collect();
        if class.kind == TyKind::Annotation {
            interfaces.push(ClassSymbol::new("java/lang/annotation/Annotation"));
        }

        // Type-parameter bounds resolve here as raw symbols; phase T redoes
        // them as full types. Unresolvable bounds are phase T's diagnostic.
        for tp in &decl.type_params {
            for bound in &tp.bounds {
                let resolver = Resolver {
                    hierarchy: self,
                    tli: self.tli,
                };
                let segments: Vec<String> =
                    bound.segments.iter().map(|s| s.name.clone()).collect();
                let _ = resolver.resolve(class, &segments, true);
            }
        }

        HeaderBoundClass {
            base: class.clone(),
            superclass,
            interfaces,
            type_params,
        }
    }

    fn resolve_quiet(&self, class: &SourceBoundClass, named: &NamedTy) -> Option<ClassSymbol> {
        let resolver = Resolver {
            hierarchy: self,
            tli: self.tli,
        };
        let segments: Vec<String> = named.segments.iter().map(|s| s.name.clone()).collect();
        resolver.resolve(class, &segments, true)
    }

    fn report_cycle(&self, sym: &ClassSymbol) {
        let stack = self.stack.borrow();
        let start = stack.iter().position(|s| s == sym).unwrap_or(0);
        let mut path: Vec<&str> = stack[start..]
            .iter()
            .map(ClassSymbol::binary_name)
            .collect();
        path.push(sym.binary_name());
        let class = &self.enter[sym];
        let decl = class.decl();
        self.diagnostics.borrow_mut().push(
            Diagnostic::new(
                &class.source.path,
                DiagnosticKind::CyclicHierarchy,
                format!("cycle in class hierarchy: {}", path.join(" -> ")),
            )
            .at(&class.source.line_map, decl.pos),
        );
    }
}

impl Hierarchy for HierarchyBinder<'_> {
    fn supers(&self, sym: &ClassSymbol) -> (Option<ClassSymbol>, Vec<ClassSymbol>) {
        if self.enter.contains_key(sym) {
            let header = self.header(sym);
            (header.superclass.clone(), header.interfaces.clone())
        } else if let Some(bytecode) = self.classpath.get(sym) {
            (bytecode.superclass(), bytecode.interfaces())
        } else {
            (None, Vec::new())
        }
    }

    fn child(&self, sym: &ClassSymbol, simple_name: &str) -> Option<ClassSymbol> {
        if let Some(source) = self.enter.get(sym) {
            return source.children.get(simple_name).cloned();
        }
        self.classpath.get(sym)?.child(simple_name)
    }
}
