//! `RuntimeVisibleTypeAnnotations` support for the targets a header can
//! carry: supertypes, type parameters and their bounds, fields, and method
//! return/parameter/throws positions. Code-local targets (casts, local
//! variables) never appear in headers.

use crate::annotation::Annotation;
use crate::constant_pool::{ConstantPool, ConstantPoolBuilder};
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::Writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetInfo {
    /// `0x00` / `0x01`
    ClassTypeParameter(u8),
    MethodTypeParameter(u8),
    /// `0x10`; `0xFFFF` is the superclass, otherwise an interface index.
    Supertype(u16),
    /// `0x11` / `0x12`
    ClassTypeParameterBound { parameter: u8, bound: u8 },
    MethodTypeParameterBound { parameter: u8, bound: u8 },
    /// `0x13`
    Field,
    /// `0x14`
    MethodReturn,
    /// `0x16`
    MethodFormalParameter(u8),
    /// `0x17`
    Throws(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypePathStep {
    /// 0 = into array, 1 = into nested type, 2 = wildcard bound, 3 = type argument.
    pub kind: u8,
    pub argument_index: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub target: TargetInfo,
    pub path: Vec<TypePathStep>,
    pub annotation: Annotation,
}

impl TypeAnnotation {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let target_type = reader.u1()?;
        let target = match target_type {
            0x00 => TargetInfo::ClassTypeParameter(reader.u1()?),
            0x01 => TargetInfo::MethodTypeParameter(reader.u1()?),
            0x10 => TargetInfo::Supertype(reader.u2()?),
            0x11 => TargetInfo::ClassTypeParameterBound {
                parameter: reader.u1()?,
                bound: reader.u1()?,
            },
            0x12 => TargetInfo::MethodTypeParameterBound {
                parameter: reader.u1()?,
                bound: reader.u1()?,
            },
            0x13 => TargetInfo::Field,
            0x14 => TargetInfo::MethodReturn,
            0x16 => TargetInfo::MethodFormalParameter(reader.u1()?),
            0x17 => TargetInfo::Throws(reader.u2()?),
            _ => return Err(Error::BadAttribute("RuntimeVisibleTypeAnnotations")),
        };

        let path_length = reader.u1()? as usize;
        let mut path = Vec::with_capacity(path_length);
        for _ in 0..path_length {
            path.push(TypePathStep {
                kind: reader.u1()?,
                argument_index: reader.u1()?,
            });
        }

        let annotation = Annotation::parse(reader, cp)?;
        Ok(Self {
            target,
            path,
            annotation,
        })
    }

    pub(crate) fn write(&self, w: &mut Writer, pool: &mut ConstantPoolBuilder) -> Result<()> {
        match self.target {
            TargetInfo::ClassTypeParameter(idx) => {
                w.write_u1(0x00);
                w.write_u1(idx);
            }
            TargetInfo::MethodTypeParameter(idx) => {
                w.write_u1(0x01);
                w.write_u1(idx);
            }
            TargetInfo::Supertype(idx) => {
                w.write_u1(0x10);
                w.write_u2(idx);
            }
            TargetInfo::ClassTypeParameterBound { parameter, bound } => {
                w.write_u1(0x11);
                w.write_u1(parameter);
                w.write_u1(bound);
            }
            TargetInfo::MethodTypeParameterBound { parameter, bound } => {
                w.write_u1(0x12);
                w.write_u1(parameter);
                w.write_u1(bound);
            }
            TargetInfo::Field => w.write_u1(0x13),
            TargetInfo::MethodReturn => w.write_u1(0x14),
            TargetInfo::MethodFormalParameter(idx) => {
                w.write_u1(0x16);
                w.write_u1(idx);
            }
            TargetInfo::Throws(idx) => {
                w.write_u1(0x17);
                w.write_u2(idx);
            }
        }

        w.write_u1(self.path.len() as u8);
        for step in &self.path {
            w.write_u1(step.kind);
            w.write_u1(step.argument_index);
        }

        self.annotation.write(w, pool)
    }
}
