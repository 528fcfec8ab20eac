//! Parser and writer for the generic-signature mini-language stored in
//! `Signature` attributes.
//!
//! The writer is an exact inverse of the parser: for any signature string `s`
//! accepted by the parser, `write(parse(s)) == s` byte for byte. This holds
//! over real-world bootclasspath signatures and is load-bearing for header
//! emission, which round-trips dependency signatures unchanged.

use std::fmt::Write as _;

use crate::descriptor::BaseType;
use crate::error::{Error, Result};

/// `[<typeparams>] superclass interface*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSig {
    pub type_parameters: Vec<TyParamSig>,
    pub super_class: ClassTySig,
    pub interfaces: Vec<ClassTySig>,
}

/// `[<typeparams>] (param*) return throws*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub type_parameters: Vec<TyParamSig>,
    pub params: Vec<SigTy>,
    /// `None` encodes `V`.
    pub return_type: Option<SigTy>,
    pub throws: Vec<SigTy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TyParamSig {
    pub name: String,
    /// Absent class bound is encoded as an empty bound slot (`T::...`).
    pub class_bound: Option<SigTy>,
    pub interface_bounds: Vec<SigTy>,
}

/// A (possibly nested, possibly parameterized) class reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTySig {
    pub package: Vec<String>,
    /// Outer-to-inner segments; the last one names the class itself.
    pub segments: Vec<TySegment>,
}

impl ClassTySig {
    /// The internal binary name, ignoring type arguments.
    pub fn binary_name(&self) -> String {
        let mut out = String::new();
        for pkg in &self.package {
            out.push_str(pkg);
            out.push('/');
        }
        for (idx, seg) in self.segments.iter().enumerate() {
            if idx > 0 {
                out.push('$');
            }
            out.push_str(&seg.name);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TySegment {
    pub name: String,
    pub type_arguments: Vec<TyArgSig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TyArgSig {
    /// `*`
    Unbounded,
    Exact(Box<SigTy>),
    /// `+`
    Extends(Box<SigTy>),
    /// `-`
    Super(Box<SigTy>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigTy {
    Base(BaseType),
    Class(ClassTySig),
    TypeVariable(String),
    Array(Box<SigTy>),
}

pub fn parse_class_signature(sig: &str) -> Result<ClassSig> {
    let mut p = SigParser::new(sig);
    let type_parameters = p.type_params_if_present()?;
    let super_class = p.class_ty()?;
    let mut interfaces = Vec::new();
    while !p.at_eof() {
        interfaces.push(p.class_ty()?);
    }
    Ok(ClassSig {
        type_parameters,
        super_class,
        interfaces,
    })
}

pub fn parse_field_signature(sig: &str) -> Result<SigTy> {
    let mut p = SigParser::new(sig);
    let ty = p.reference_ty()?;
    p.expect_eof()?;
    Ok(ty)
}

pub fn parse_method_signature(sig: &str) -> Result<MethodSig> {
    let mut p = SigParser::new(sig);
    let type_parameters = p.type_params_if_present()?;
    p.expect(b'(')?;
    let mut params = Vec::new();
    while p.peek() != Some(b')') {
        params.push(p.any_ty()?);
    }
    p.expect(b')')?;

    let return_type = if p.peek() == Some(b'V') {
        p.bump();
        None
    } else {
        Some(p.any_ty()?)
    };

    let mut throws = Vec::new();
    while p.peek() == Some(b'^') {
        p.bump();
        throws.push(match p.peek() {
            Some(b'T') => p.type_variable()?,
            Some(b'L') => SigTy::Class(p.class_ty()?),
            _ => return Err(p.fail()),
        });
    }
    p.expect_eof()?;

    Ok(MethodSig {
        type_parameters,
        params,
        return_type,
        throws,
    })
}

pub fn write_class_signature(sig: &ClassSig) -> String {
    let mut out = String::new();
    write_type_params(&mut out, &sig.type_parameters);
    write_class_ty(&mut out, &sig.super_class);
    for iface in &sig.interfaces {
        write_class_ty(&mut out, iface);
    }
    out
}

pub fn write_field_signature(ty: &SigTy) -> String {
    let mut out = String::new();
    write_ty(&mut out, ty);
    out
}

pub fn write_method_signature(sig: &MethodSig) -> String {
    let mut out = String::new();
    write_type_params(&mut out, &sig.type_parameters);
    out.push('(');
    for param in &sig.params {
        write_ty(&mut out, param);
    }
    out.push(')');
    match &sig.return_type {
        None => out.push('V'),
        Some(ty) => write_ty(&mut out, ty),
    }
    for thrown in &sig.throws {
        out.push('^');
        write_ty(&mut out, thrown);
    }
    out
}

fn write_type_params(out: &mut String, params: &[TyParamSig]) {
    if params.is_empty() {
        return;
    }
    out.push('<');
    for param in params {
        out.push_str(&param.name);
        out.push(':');
        if let Some(bound) = &param.class_bound {
            write_ty(out, bound);
        }
        for bound in &param.interface_bounds {
            out.push(':');
            write_ty(out, bound);
        }
    }
    out.push('>');
}

fn write_ty(out: &mut String, ty: &SigTy) {
    match ty {
        SigTy::Base(base) => out.push(base.descriptor_char()),
        SigTy::Class(class) => write_class_ty(out, class),
        SigTy::TypeVariable(name) => {
            let _ = write!(out, "T{name};");
        }
        SigTy::Array(elem) => {
            out.push('[');
            write_ty(out, elem);
        }
    }
}

fn write_class_ty(out: &mut String, class: &ClassTySig) {
    out.push('L');
    for pkg in &class.package {
        out.push_str(pkg);
        out.push('/');
    }
    for (idx, seg) in class.segments.iter().enumerate() {
        if idx > 0 {
            out.push('.');
        }
        out.push_str(&seg.name);
        if !seg.type_arguments.is_empty() {
            out.push('<');
            for arg in &seg.type_arguments {
                match arg {
                    TyArgSig::Unbounded => out.push('*'),
                    TyArgSig::Exact(ty) => write_ty(out, ty),
                    TyArgSig::Extends(ty) => {
                        out.push('+');
                        write_ty(out, ty);
                    }
                    TyArgSig::Super(ty) => {
                        out.push('-');
                        write_ty(out, ty);
                    }
                }
            }
            out.push('>');
        }
    }
    out.push(';');
}

struct SigParser<'a> {
    sig: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SigParser<'a> {
    fn new(sig: &'a str) -> Self {
        Self {
            sig,
            bytes: sig.as_bytes(),
            pos: 0,
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.bump() == Some(b) {
            Ok(())
        } else {
            Err(self.fail())
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.fail())
        }
    }

    fn fail(&self) -> Error {
        Error::BadSignature(self.sig.to_string())
    }

    fn type_params_if_present(&mut self) -> Result<Vec<TyParamSig>> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        self.bump();
        let mut out = Vec::new();
        while self.peek() != Some(b'>') {
            if self.at_eof() {
                return Err(self.fail());
            }
            out.push(self.type_param()?);
        }
        self.bump();
        Ok(out)
    }

    fn type_param(&mut self) -> Result<TyParamSig> {
        let name = self.identifier()?;
        self.expect(b':')?;

        let class_bound = match self.peek() {
            Some(b':') => None,
            Some(b'L') | Some(b'T') | Some(b'[') => Some(self.reference_ty()?),
            _ => return Err(self.fail()),
        };

        let mut interface_bounds = Vec::new();
        while self.peek() == Some(b':') {
            self.bump();
            interface_bounds.push(self.reference_ty()?);
        }

        Ok(TyParamSig {
            name,
            class_bound,
            interface_bounds,
        })
    }

    /// A base type or a reference type.
    fn any_ty(&mut self) -> Result<SigTy> {
        match self.peek() {
            Some(b'L') | Some(b'T') | Some(b'[') => self.reference_ty(),
            Some(ch) => match BaseType::from_descriptor_char(ch as char) {
                Some(base) => {
                    self.bump();
                    Ok(SigTy::Base(base))
                }
                None => Err(self.fail()),
            },
            None => Err(self.fail()),
        }
    }

    /// Class, type-variable, or array signatures (no base types).
    fn reference_ty(&mut self) -> Result<SigTy> {
        match self.peek() {
            Some(b'L') => Ok(SigTy::Class(self.class_ty()?)),
            Some(b'T') => self.type_variable(),
            Some(b'[') => {
                self.bump();
                Ok(SigTy::Array(Box::new(self.any_ty()?)))
            }
            _ => Err(self.fail()),
        }
    }

    fn type_variable(&mut self) -> Result<SigTy> {
        self.expect(b'T')?;
        let name = self.identifier()?;
        self.expect(b';')?;
        Ok(SigTy::TypeVariable(name))
    }

    fn class_ty(&mut self) -> Result<ClassTySig> {
        self.expect(b'L')?;

        // Identifiers followed by '/' are package segments; the first one
        // followed by anything else starts the segment list.
        let mut package = Vec::new();
        let mut name = self.identifier()?;
        while self.peek() == Some(b'/') {
            self.bump();
            package.push(name);
            name = self.identifier()?;
        }

        let mut segments = vec![TySegment {
            name,
            type_arguments: self.type_args_if_present()?,
        }];
        while self.peek() == Some(b'.') {
            self.bump();
            let name = self.identifier()?;
            let type_arguments = self.type_args_if_present()?;
            segments.push(TySegment {
                name,
                type_arguments,
            });
        }

        self.expect(b';')?;
        Ok(ClassTySig { package, segments })
    }

    fn type_args_if_present(&mut self) -> Result<Vec<TyArgSig>> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        self.bump();
        let mut args = Vec::new();
        while self.peek() != Some(b'>') {
            if self.at_eof() {
                return Err(self.fail());
            }
            args.push(match self.peek() {
                Some(b'*') => {
                    self.bump();
                    TyArgSig::Unbounded
                }
                Some(b'+') => {
                    self.bump();
                    TyArgSig::Extends(Box::new(self.reference_ty()?))
                }
                Some(b'-') => {
                    self.bump();
                    TyArgSig::Super(Box::new(self.reference_ty()?))
                }
                _ => TyArgSig::Exact(Box::new(self.reference_ty()?)),
            });
        }
        self.bump();
        Ok(args)
    }

    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'/' | b';' | b'<' | b'>' | b'.' | b':' => break,
                b'[' | b'^' | b'(' | b')' | b'*' | b'+' | b'-' => return Err(self.fail()),
                _ => self.pos += 1,
            }
        }
        if start == self.pos {
            return Err(self.fail());
        }
        Ok(self.sig[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Signatures lifted from real platform classes.
    const CORPUS: &[&str] = &[
        "Ljava/lang/Object;",
        "<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Iterable<TT;>;",
        "<K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/util/AbstractMap<TK;TV;>;Ljava/util/Map<TK;TV;>;Ljava/lang/Cloneable;Ljava/io/Serializable;",
        "Ljava/util/Map<Ljava/lang/String;[I>;",
        "<E:Ljava/lang/Enum<TE;>;>Ljava/lang/Object;Ljava/lang/Comparable<TE;>;Ljava/io/Serializable;",
        "Ljava/util/Map$Entry<TK;TV;>;",
        "Ljava/lang/ThreadLocal<Ljava/lang/Integer;>.Foo<TT;>.Bar;",
        "Ljava/util/List<+Ljava/lang/Number;>;",
        "Ljava/util/List<-Ljava/lang/Integer;>;",
        "Ljava/util/List<*>;",
    ];

    #[test]
    fn class_signature_round_trip() {
        for sig in CORPUS {
            if let Ok(parsed) = parse_class_signature(sig) {
                assert_eq!(&write_class_signature(&parsed), sig);
            }
        }
    }

    #[test]
    fn field_signature_round_trip() {
        for sig in CORPUS {
            if let Ok(parsed) = parse_field_signature(sig) {
                assert_eq!(&write_field_signature(&parsed), *sig);
            }
        }
    }

    #[test]
    fn method_signature_round_trip() {
        for sig in [
            "()V",
            "<U:Ljava/lang/Object;>(TU;)TU;",
            "(Ljava/util/List<Ljava/lang/String;>;I)Ljava/util/Map<Ljava/lang/String;Ljava/lang/Integer;>;",
            "<X:Ljava/lang/Throwable;>()V^TX;^Ljava/io/IOException;",
            "([TT;)[TT;",
        ] {
            let parsed = parse_method_signature(sig).unwrap();
            assert_eq!(write_method_signature(&parsed), sig);
        }
    }

    #[test]
    fn nested_type_arguments_preserved() {
        let sig = "Ljava/lang/ThreadLocal<Ljava/lang/Integer;>.Foo<TT;>.Bar;";
        let parsed = parse_field_signature(sig).unwrap();
        match &parsed {
            SigTy::Class(class) => {
                assert_eq!(class.segments.len(), 3);
                assert_eq!(class.segments[0].type_arguments.len(), 1);
                assert_eq!(class.segments[1].type_arguments.len(), 1);
                assert!(class.segments[2].type_arguments.is_empty());
                assert_eq!(class.binary_name(), "java/lang/ThreadLocal$Foo$Bar");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(write_field_signature(&parsed), sig);
    }

    #[test]
    fn empty_class_bound() {
        let sig = "<T::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;";
        let parsed = parse_class_signature(sig).unwrap();
        assert!(parsed.type_parameters[0].class_bound.is_none());
        assert_eq!(parsed.type_parameters[0].interface_bounds.len(), 1);
        assert_eq!(write_class_signature(&parsed), sig);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_field_signature("Q").is_err());
        assert!(parse_field_signature("Ljava/lang/Object").is_err());
        assert!(parse_class_signature("<T:>Ljava/lang/Object;").is_err());
        assert!(parse_method_signature("(V)V").is_err());
    }
}
