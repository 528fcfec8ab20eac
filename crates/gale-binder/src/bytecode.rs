//! Lazily bound classpath classes.
//!
//! A [`BytecodeBoundClass`] wraps a class-file byte source and answers the
//! same questions as a source-bound class, parsing and memoizing on demand.
//! Reads that touch *other* classpath classes always go back through the
//! ambient [`ClasspathEnv`], never through this object, so the binder's view
//! of the classpath stays consistent.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use gale_classfile::{access, ClassFile, ConstantValue, ElementValue, PrimValue};
use gale_classpath::{ByteSource, ClassPathIndex};
use gale_syntax::tree::{PrimKind, TyKind};

use crate::memo::Memo;
use crate::model::{AnnoInfo, AnnotationMetadata, Retention};
use crate::sym::{ClassSymbol, FieldSymbol};
use crate::ty::Ty;
use crate::value::Const;

/// A field as read from bytecode.
#[derive(Debug, Clone)]
pub struct BcField {
    pub name: String,
    pub access: u16,
    pub descriptor: String,
    pub constant: Option<Const>,
}

/// A method as read from bytecode.
#[derive(Debug, Clone)]
pub struct BcMethod {
    pub name: String,
    pub access: u16,
    pub descriptor: String,
}

#[derive(Debug)]
pub struct BytecodeBoundClass {
    sym: ClassSymbol,
    source: ByteSource,
    classfile: Memo<Option<Rc<ClassFile>>>,
    fields: Memo<Rc<Vec<BcField>>>,
    methods: Memo<Rc<Vec<BcMethod>>>,
    annotations: Memo<Rc<Vec<AnnoInfo>>>,
    metadata: Memo<Rc<AnnotationMetadata>>,
}

impl BytecodeBoundClass {
    fn new(sym: ClassSymbol, source: ByteSource) -> Self {
        Self {
            sym,
            source,
            classfile: Memo::new(),
            fields: Memo::new(),
            methods: Memo::new(),
            annotations: Memo::new(),
            metadata: Memo::new(),
        }
    }

    pub fn sym(&self) -> &ClassSymbol {
        &self.sym
    }

    /// The parsed class file; `None` if the bytes are unreadable or corrupt
    /// (the class then resolves like a missing one).
    pub fn classfile(&self) -> Option<Rc<ClassFile>> {
        self.classfile
            .get_or_init(|| match self.source.read() {
                Ok(bytes) => match ClassFile::parse(&bytes) {
                    Ok(cf) => Some(Rc::new(cf)),
                    Err(err) => {
                        tracing::warn!(sym = %self.sym, %err, "corrupt classpath classfile");
                        None
                    }
                },
                Err(err) => {
                    tracing::warn!(sym = %self.sym, %err, "unreadable classpath entry");
                    None
                }
            })
            .flatten()
    }

    pub fn access(&self) -> u16 {
        self.classfile().map(|cf| cf.access_flags).unwrap_or(0)
    }

    pub fn kind(&self) -> TyKind {
        let Some(cf) = self.classfile() else {
            return TyKind::Class;
        };
        if cf.access_flags & access::ACC_ANNOTATION != 0 {
            TyKind::Annotation
        } else if cf.access_flags & access::ACC_INTERFACE != 0 {
            TyKind::Interface
        } else if cf.access_flags & access::ACC_ENUM != 0 {
            TyKind::Enum
        } else if cf.record_components.is_some() {
            TyKind::Record
        } else {
            TyKind::Class
        }
    }

    pub fn superclass(&self) -> Option<ClassSymbol> {
        self.classfile()?
            .super_class
            .as_deref()
            .map(ClassSymbol::new)
    }

    pub fn interfaces(&self) -> Vec<ClassSymbol> {
        self.classfile()
            .map(|cf| cf.interfaces.iter().map(ClassSymbol::new).collect())
            .unwrap_or_default()
    }

    /// A directly nested member class, found via the `InnerClasses` table.
    pub fn child(&self, simple_name: &str) -> Option<ClassSymbol> {
        let cf = self.classfile()?;
        for inner in &cf.inner_classes {
            if inner.inner_name.as_deref() == Some(simple_name)
                && inner.outer_class.as_deref() == Some(self.sym.binary_name())
            {
                return Some(ClassSymbol::new(&inner.inner_class));
            }
        }
        None
    }

    pub fn fields(&self) -> Rc<Vec<BcField>> {
        self.fields
            .get_or_init(|| {
                let Some(cf) = self.classfile() else {
                    return Rc::new(Vec::new());
                };
                Rc::new(
                    cf.fields
                        .iter()
                        .map(|f| BcField {
                            name: f.name.clone(),
                            access: f.access_flags,
                            descriptor: f.descriptor.clone(),
                            constant: f
                                .constant_value
                                .as_ref()
                                .map(|v| constant_from_attribute(v, &f.descriptor)),
                        })
                        .collect(),
                )
            })
            .expect("field table computation does not re-enter")
    }

    pub fn methods(&self) -> Rc<Vec<BcMethod>> {
        self.methods
            .get_or_init(|| {
                let Some(cf) = self.classfile() else {
                    return Rc::new(Vec::new());
                };
                Rc::new(
                    cf.methods
                        .iter()
                        .map(|m| BcMethod {
                            name: m.name.clone(),
                            access: m.access_flags,
                            descriptor: m.descriptor.clone(),
                        })
                        .collect(),
                )
            })
            .expect("method table computation does not re-enter")
    }

    /// Declaration annotations, deserialized on demand. Annotation types
    /// that fail to resolve keep `sym: None` and are dropped downstream.
    pub fn annotations(&self) -> Rc<Vec<AnnoInfo>> {
        self.annotations
            .get_or_init(|| {
                let Some(cf) = self.classfile() else {
                    return Rc::new(Vec::new());
                };
                Rc::new(
                    cf.visible_annotations
                        .iter()
                        .chain(cf.invisible_annotations.iter())
                        .map(anno_from_classfile)
                        .collect(),
                )
            })
            .expect("annotation table computation does not re-enter")
    }

    /// Meta-annotations of an annotation declaration. Always resolved, even
    /// when ordinary annotations on the class are not.
    pub fn annotation_metadata(&self) -> AnnotationMetadata {
        let meta = self
            .metadata
            .get_or_init(|| {
                let mut meta = AnnotationMetadata::default();
                for anno in self.annotations().iter() {
                    let Some(sym) = &anno.sym else { continue };
                    match sym.binary_name() {
                        "java/lang/annotation/Retention" => {
                            if let Some((_, Const::EnumConst(field))) = anno.values.first() {
                                meta.retention = match &*field.name {
                                    "SOURCE" => Retention::Source,
                                    "RUNTIME" => Retention::Runtime,
                                    _ => Retention::Class,
                                };
                            }
                        }
                        "java/lang/annotation/Target" => {
                            let mut targets = Vec::new();
                            if let Some((_, Const::Array(elements))) = anno.values.first() {
                                for element in elements {
                                    if let Const::EnumConst(field) = element {
                                        targets.push(field.name.to_string());
                                    }
                                }
                            }
                            meta.targets = Some(targets);
                        }
                        "java/lang/annotation/Repeatable" => {
                            if let Some((_, Const::ClassLit(Ty::Class(class)))) =
                                anno.values.first()
                            {
                                meta.repeatable = Some(class.sym().clone());
                            }
                        }
                        _ => {}
                    }
                }
                Rc::new(meta)
            })
            .expect("metadata computation does not re-enter");
        (*meta).clone()
    }
}

fn constant_from_attribute(value: &ConstantValue, descriptor: &str) -> Const {
    // Booleans, bytes, shorts, and chars are all Int on the wire; the field
    // descriptor recovers the declared type.
    let prim = match (value, descriptor) {
        (ConstantValue::Int(v), "Z") => PrimValue::Boolean(*v != 0),
        (ConstantValue::Int(v), "B") => PrimValue::Byte(*v as i8),
        (ConstantValue::Int(v), "S") => PrimValue::Short(*v as i16),
        (ConstantValue::Int(v), "C") => PrimValue::Char(*v as u16),
        (ConstantValue::Int(v), _) => PrimValue::Int(*v),
        (ConstantValue::Long(v), _) => PrimValue::Long(*v),
        (ConstantValue::Float(v), _) => PrimValue::Float(*v),
        (ConstantValue::Double(v), _) => PrimValue::Double(*v),
        (ConstantValue::String(v), _) => PrimValue::String(v.clone()),
    };
    Const::Prim(prim)
}

fn anno_from_classfile(anno: &gale_classfile::Annotation) -> AnnoInfo {
    AnnoInfo {
        sym: anno.internal_name().map(ClassSymbol::new),
        args: Vec::new(),
        values: anno
            .elements
            .iter()
            .map(|(name, value)| (name.clone(), const_from_element(value)))
            .collect(),
    }
}

fn const_from_element(value: &ElementValue) -> Const {
    match value {
        ElementValue::Prim(prim) => Const::Prim(prim.clone()),
        ElementValue::Enum {
            type_descriptor,
            const_name,
        } => {
            let owner = type_descriptor
                .strip_prefix('L')
                .and_then(|rest| rest.strip_suffix(';'))
                .unwrap_or(type_descriptor);
            Const::EnumConst(FieldSymbol::new(ClassSymbol::new(owner), const_name))
        }
        ElementValue::Class(descriptor) => Const::ClassLit(ty_from_return_descriptor(descriptor)),
        ElementValue::Annotation(nested) => Const::Anno(anno_from_classfile(nested)),
        ElementValue::Array(elements) => {
            Const::Array(elements.iter().map(const_from_element).collect())
        }
    }
}

fn ty_from_return_descriptor(descriptor: &str) -> Ty {
    match descriptor {
        "V" => Ty::Void,
        "Z" => Ty::prim(PrimKind::Boolean),
        "B" => Ty::prim(PrimKind::Byte),
        "S" => Ty::prim(PrimKind::Short),
        "I" => Ty::prim(PrimKind::Int),
        "J" => Ty::prim(PrimKind::Long),
        "C" => Ty::prim(PrimKind::Char),
        "F" => Ty::prim(PrimKind::Float),
        "D" => Ty::prim(PrimKind::Double),
        _ => {
            if let Some(elem) = descriptor.strip_prefix('[') {
                Ty::Array {
                    elem: Box::new(ty_from_return_descriptor(elem)),
                    annos: Vec::new(),
                }
            } else if let Some(name) =
                descriptor.strip_prefix('L').and_then(|r| r.strip_suffix(';'))
            {
                Ty::class(ClassSymbol::new(name))
            } else {
                Ty::Error
            }
        }
    }
}

/// The ambient classpath environment: bootclasspath first, then the user
/// classpath, with one memoized [`BytecodeBoundClass`] per symbol.
pub struct ClasspathEnv {
    boot: ClassPathIndex,
    classpath: ClassPathIndex,
    cells: RefCell<HashMap<ClassSymbol, Option<Rc<BytecodeBoundClass>>>>,
}

impl ClasspathEnv {
    pub fn new(boot: ClassPathIndex, classpath: ClassPathIndex) -> Self {
        Self {
            boot,
            classpath,
            cells: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(&self, sym: &ClassSymbol) -> Option<Rc<BytecodeBoundClass>> {
        if let Some(cached) = self.cells.borrow().get(sym) {
            return cached.clone();
        }
        let source = self
            .boot
            .lookup(sym.binary_name())
            .or_else(|| self.classpath.lookup(sym.binary_name()));
        let bound = source.map(|s| Rc::new(BytecodeBoundClass::new(sym.clone(), s)));
        self.cells.borrow_mut().insert(sym.clone(), bound.clone());
        bound
    }

    pub fn contains(&self, sym: &ClassSymbol) -> bool {
        self.boot.contains(sym.binary_name()) || self.classpath.contains(sym.binary_name())
    }

    pub fn is_boot(&self, sym: &ClassSymbol) -> bool {
        self.boot.contains(sym.binary_name())
    }

    /// The classpath archive a symbol came from; `None` for bootclasspath
    /// classes (they are never reported as dependencies).
    pub fn origin(&self, sym: &ClassSymbol) -> Option<&Path> {
        if self.is_boot(sym) {
            return None;
        }
        self.classpath.origin(sym.binary_name())
    }

    pub fn boot_index(&self) -> &ClassPathIndex {
        &self.boot
    }

    pub fn classpath_index(&self) -> &ClassPathIndex {
        &self.classpath
    }
}
