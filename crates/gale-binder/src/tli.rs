use std::collections::HashMap;

use crate::sym::ClassSymbol;

/// An ordered tree of all known fully qualified top-level names: source
/// declarations plus classpath entries.
///
/// When a prefix has been observed as both a class and a package, the first
/// declaration wins and the other role is invisible from the top-level scope
/// (repositories that mix `java/Foo` and `java/Foo/Bar` exist).
#[derive(Debug, Default)]
pub struct TopLevelIndex {
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    classes: HashMap<String, ClassSymbol>,
    packages: HashMap<String, Node>,
}

/// A successful lookup: the class symbol of the longest resolvable prefix,
/// plus the segments left over (which become nested-class lookups).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult<'a> {
    pub sym: ClassSymbol,
    pub remaining: &'a [String],
}

impl TopLevelIndex {
    pub fn builder() -> TopLevelIndexBuilder {
        TopLevelIndexBuilder {
            index: TopLevelIndex::default(),
        }
    }

    /// Resolve as many leading segments as possible to packages, then one
    /// segment to a class. `None` when no class is reached.
    pub fn lookup<'a>(&self, key: &'a [String]) -> Option<LookupResult<'a>> {
        let mut node = &self.root;
        for (idx, segment) in key.iter().enumerate() {
            if let Some(sym) = node.classes.get(segment) {
                return Some(LookupResult {
                    sym: sym.clone(),
                    remaining: &key[idx + 1..],
                });
            }
            node = node.packages.get(segment)?;
        }
        None
    }

    /// The scope of a (possibly nested) package, for on-demand imports and
    /// same-package resolution.
    pub fn lookup_package(&self, name: &[String]) -> Option<PackageScope<'_>> {
        let mut node = &self.root;
        for segment in name {
            node = node.packages.get(segment)?;
        }
        Some(PackageScope { node })
    }
}

/// Name resolution inside one package.
#[derive(Clone, Copy, Debug)]
pub struct PackageScope<'a> {
    node: &'a Node,
}

impl PackageScope<'_> {
    pub fn class(&self, simple_name: &str) -> Option<ClassSymbol> {
        self.node.classes.get(simple_name).cloned()
    }
}

#[derive(Debug)]
pub struct TopLevelIndexBuilder {
    index: TopLevelIndex,
}

impl TopLevelIndexBuilder {
    /// Insert a top-level class. Earlier insertions win any class/package
    /// conflict on the same prefix.
    pub fn insert_class(&mut self, sym: ClassSymbol) {
        let binary_name = sym.binary_name().to_string();
        let Some((package, simple)) = split_binary_name(&binary_name) else {
            return;
        };
        let mut node = &mut self.index.root;
        for segment in package {
            if node.classes.contains_key(segment) {
                // This prefix is already a class; the package (and the class
                // inside it) stays invisible.
                return;
            }
            node = node.packages.entry(segment.to_string()).or_default();
        }
        if node.packages.contains_key(simple) {
            return;
        }
        node.classes.entry(simple.to_string()).or_insert(sym);
    }

    pub fn finish(self) -> TopLevelIndex {
        self.index
    }
}

/// Split `a/b/C` into package segments and simple name. Binary names with
/// `$` belong to nested classes and are not top-level entries.
fn split_binary_name(binary_name: &str) -> Option<(Vec<&str>, &str)> {
    if binary_name.contains('$') {
        return None;
    }
    let mut segments: Vec<&str> = binary_name.split('/').collect();
    let simple = segments.pop()?;
    Some((segments, simple))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lookup_splits_remaining_segments() {
        let mut builder = TopLevelIndex::builder();
        builder.insert_class(ClassSymbol::new("java/util/Map"));
        let index = builder.finish();

        let k = key(&["java", "util", "Map", "Entry"]);
        let result = index.lookup(&k).unwrap();
        assert_eq!(result.sym, ClassSymbol::new("java/util/Map"));
        assert_eq!(result.remaining, &k[3..]);

        assert!(index.lookup(&key(&["java", "util", "List"])).is_none());
        assert!(index.lookup(&key(&["java"])).is_none());
    }

    #[test]
    fn nested_binary_names_are_not_top_level() {
        let mut builder = TopLevelIndex::builder();
        builder.insert_class(ClassSymbol::new("java/util/Map$Entry"));
        let index = builder.finish();
        assert!(index.lookup(&key(&["java", "util", "Map"])).is_none());
    }

    #[test]
    fn first_declaration_wins_class_vs_package() {
        // `java/Foo` the class first, then `java/Foo/Bar` implying package
        // `java/Foo`: the class wins, Bar is invisible.
        let mut builder = TopLevelIndex::builder();
        builder.insert_class(ClassSymbol::new("java/Foo"));
        builder.insert_class(ClassSymbol::new("java/Foo/Bar"));
        let index = builder.finish();

        let k = key(&["java", "Foo", "Bar"]);
        let result = index.lookup(&k).unwrap();
        assert_eq!(result.sym, ClassSymbol::new("java/Foo"));
        assert_eq!(result.remaining.len(), 1);

        // And the other way round: the package wins, the class is invisible.
        let mut builder = TopLevelIndex::builder();
        builder.insert_class(ClassSymbol::new("java/Foo/Bar"));
        builder.insert_class(ClassSymbol::new("java/Foo"));
        let index = builder.finish();
        assert_eq!(
            index.lookup(&k).unwrap().sym,
            ClassSymbol::new("java/Foo/Bar")
        );
        assert!(index.lookup(&key(&["java", "Foo"])).is_none());
    }

    #[test]
    fn package_scope_lookup() {
        let mut builder = TopLevelIndex::builder();
        builder.insert_class(ClassSymbol::new("a/b/C"));
        builder.insert_class(ClassSymbol::new("a/b/D"));
        let index = builder.finish();
        let scope = index.lookup_package(&key(&["a", "b"])).unwrap();
        assert_eq!(scope.class("C"), Some(ClassSymbol::new("a/b/C")));
        assert_eq!(scope.class("E"), None);
        assert!(index.lookup_package(&key(&["a", "x"])).is_none());
    }
}
