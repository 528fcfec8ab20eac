use std::fmt;
use std::sync::Arc;

/// A class identified by its canonical binary name: slash-separated package
/// segments, `$`-separated nesting (`java/util/Map$Entry`).
///
/// Symbols are cheap to clone and compare; everything interesting about the
/// class lives in an environment keyed by the symbol.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassSymbol(Arc<str>);

impl ClassSymbol {
    pub fn new(binary_name: impl AsRef<str>) -> Self {
        Self(Arc::from(binary_name.as_ref()))
    }

    pub fn binary_name(&self) -> &str {
        &self.0
    }

    /// The simple (source-level) name: the part after the last `$` or `/`.
    pub fn simple_name(&self) -> &str {
        let start = self.0.rfind(['$', '/']).map(|i| i + 1).unwrap_or(0);
        &self.0[start..]
    }

    /// The slash-separated package name; empty for the unnamed package.
    pub fn package_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// The enclosing class implied by the binary name, if any.
    pub fn enclosing(&self) -> Option<ClassSymbol> {
        let idx = self.0.rfind('$')?;
        Some(ClassSymbol::new(&self.0[..idx]))
    }

    /// The symbol of a directly nested class.
    pub fn nested(&self, simple_name: &str) -> ClassSymbol {
        ClassSymbol::new(format!("{}${}", self.0, simple_name))
    }

    /// The descriptor form, `Lbinary/Name;`.
    pub fn descriptor(&self) -> String {
        format!("L{};", self.0)
    }
}

impl fmt::Debug for ClassSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ClassSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A field, identified by owner and name (Java fields cannot overload).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FieldSymbol {
    pub owner: ClassSymbol,
    pub name: Arc<str>,
}

impl FieldSymbol {
    pub fn new(owner: ClassSymbol, name: impl AsRef<str>) -> Self {
        Self {
            owner,
            name: Arc::from(name.as_ref()),
        }
    }
}

impl fmt::Display for FieldSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.name)
    }
}

/// A method, identified by owner, declaration index, and name. The index
/// disambiguates overloads before descriptors exist.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MethodSymbol {
    pub owner: ClassSymbol,
    pub index: u32,
    pub name: Arc<str>,
}

impl MethodSymbol {
    pub fn new(owner: ClassSymbol, index: u32, name: impl AsRef<str>) -> Self {
        Self {
            owner,
            index,
            name: Arc::from(name.as_ref()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ParamSymbol {
    pub owner: MethodSymbol,
    pub index: u32,
    pub name: Arc<str>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TyVarOwner {
    Class(ClassSymbol),
    Method(MethodSymbol),
}

/// A type parameter, scoped to its declaring class or method.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TyVarSymbol {
    pub owner: TyVarOwner,
    pub name: Arc<str>,
}

impl TyVarSymbol {
    pub fn new(owner: TyVarOwner, name: impl AsRef<str>) -> Self {
        Self {
            owner,
            name: Arc::from(name.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_parts() {
        let sym = ClassSymbol::new("java/util/Map$Entry");
        assert_eq!(sym.simple_name(), "Entry");
        assert_eq!(sym.package_name(), "java/util");
        assert_eq!(sym.enclosing(), Some(ClassSymbol::new("java/util/Map")));
        assert_eq!(sym.descriptor(), "Ljava/util/Map$Entry;");
    }

    #[test]
    fn unnamed_package() {
        let sym = ClassSymbol::new("Test");
        assert_eq!(sym.simple_name(), "Test");
        assert_eq!(sym.package_name(), "");
        assert_eq!(sym.enclosing(), None);
    }
}
