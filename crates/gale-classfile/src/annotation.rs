use crate::constant_pool::{ConstantPool, ConstantPoolBuilder, CpInfo};
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::Writer;

/// An annotation use as stored in `RuntimeVisibleAnnotations` and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface, e.g. `Ljava/lang/Deprecated;`.
    pub type_descriptor: String,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub fn new(type_descriptor: impl Into<String>) -> Self {
        Self {
            type_descriptor: type_descriptor.into(),
            elements: Vec::new(),
        }
    }

    /// The internal (slash-separated) name of the annotation interface, when
    /// the descriptor has the expected `L...;` shape.
    pub fn internal_name(&self) -> Option<&str> {
        self.type_descriptor
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
    }

    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let type_descriptor = cp.get_utf8(reader.u2()?)?.to_string();
        let num = reader.u2()? as usize;
        let mut elements = Vec::with_capacity(num);
        for _ in 0..num {
            let name = cp.get_utf8(reader.u2()?)?.to_string();
            let value = ElementValue::parse(reader, cp)?;
            elements.push((name, value));
        }
        Ok(Self {
            type_descriptor,
            elements,
        })
    }

    pub(crate) fn write(&self, w: &mut Writer, pool: &mut ConstantPoolBuilder) -> Result<()> {
        w.write_u2(pool.utf8(&self.type_descriptor)?);
        w.write_u2(self.elements.len() as u16);
        for (name, value) in &self.elements {
            w.write_u2(pool.utf8(name)?);
            value.write(w, pool)?;
        }
        Ok(())
    }
}

/// A primitive or string constant inside an annotation element.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimValue {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Prim(PrimValue),
    Enum {
        /// Field descriptor of the enum type.
        type_descriptor: String,
        const_name: String,
    },
    /// A class literal, as a return descriptor (`V` is legal: `void.class`).
    Class(String),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let tag = reader.u1()? as char;
        match tag {
            'B' | 'C' | 'I' | 'S' | 'Z' => {
                let idx = reader.u2()?;
                let value = match cp.get(idx)? {
                    CpInfo::Integer(v) => *v,
                    other => {
                        return Err(Error::WrongPoolEntry {
                            index: idx,
                            expected: "Integer",
                            found: other.kind(),
                        })
                    }
                };
                let prim = match tag {
                    'B' => PrimValue::Byte(value as i8),
                    'C' => PrimValue::Char(value as u16),
                    'I' => PrimValue::Int(value),
                    'S' => PrimValue::Short(value as i16),
                    'Z' => PrimValue::Boolean(value != 0),
                    _ => unreachable!(),
                };
                Ok(ElementValue::Prim(prim))
            }
            'D' => {
                let idx = reader.u2()?;
                match cp.get(idx)? {
                    CpInfo::Double(v) => Ok(ElementValue::Prim(PrimValue::Double(*v))),
                    other => Err(Error::WrongPoolEntry {
                        index: idx,
                        expected: "Double",
                        found: other.kind(),
                    }),
                }
            }
            'F' => {
                let idx = reader.u2()?;
                match cp.get(idx)? {
                    CpInfo::Float(v) => Ok(ElementValue::Prim(PrimValue::Float(*v))),
                    other => Err(Error::WrongPoolEntry {
                        index: idx,
                        expected: "Float",
                        found: other.kind(),
                    }),
                }
            }
            'J' => {
                let idx = reader.u2()?;
                match cp.get(idx)? {
                    CpInfo::Long(v) => Ok(ElementValue::Prim(PrimValue::Long(*v))),
                    other => Err(Error::WrongPoolEntry {
                        index: idx,
                        expected: "Long",
                        found: other.kind(),
                    }),
                }
            }
            's' => {
                let idx = reader.u2()?;
                Ok(ElementValue::Prim(PrimValue::String(
                    cp.get_utf8(idx)?.to_string(),
                )))
            }
            'e' => {
                let type_descriptor = cp.get_utf8(reader.u2()?)?.to_string();
                let const_name = cp.get_utf8(reader.u2()?)?.to_string();
                Ok(ElementValue::Enum {
                    type_descriptor,
                    const_name,
                })
            }
            'c' => Ok(ElementValue::Class(
                cp.get_utf8(reader.u2()?)?.to_string(),
            )),
            '@' => Ok(ElementValue::Annotation(Box::new(Annotation::parse(
                reader, cp,
            )?))),
            '[' => {
                let num = reader.u2()? as usize;
                let mut values = Vec::with_capacity(num);
                for _ in 0..num {
                    values.push(ElementValue::parse(reader, cp)?);
                }
                Ok(ElementValue::Array(values))
            }
            _ => Err(Error::BadAttribute("RuntimeVisibleAnnotations")),
        }
    }

    pub(crate) fn write(&self, w: &mut Writer, pool: &mut ConstantPoolBuilder) -> Result<()> {
        match self {
            ElementValue::Prim(prim) => {
                let (tag, idx) = match prim {
                    PrimValue::Byte(v) => ('B', pool.integer(*v as i32)?),
                    PrimValue::Char(v) => ('C', pool.integer(*v as i32)?),
                    PrimValue::Short(v) => ('S', pool.integer(*v as i32)?),
                    PrimValue::Int(v) => ('I', pool.integer(*v)?),
                    PrimValue::Boolean(v) => ('Z', pool.integer(*v as i32)?),
                    PrimValue::Long(v) => ('J', pool.long(*v)?),
                    PrimValue::Float(v) => ('F', pool.float(*v)?),
                    PrimValue::Double(v) => ('D', pool.double(*v)?),
                    PrimValue::String(v) => ('s', pool.utf8(v)?),
                };
                w.write_u1(tag as u8);
                w.write_u2(idx);
            }
            ElementValue::Enum {
                type_descriptor,
                const_name,
            } => {
                w.write_u1(b'e');
                w.write_u2(pool.utf8(type_descriptor)?);
                w.write_u2(pool.utf8(const_name)?);
            }
            ElementValue::Class(descriptor) => {
                w.write_u1(b'c');
                w.write_u2(pool.utf8(descriptor)?);
            }
            ElementValue::Annotation(anno) => {
                w.write_u1(b'@');
                anno.write(w, pool)?;
            }
            ElementValue::Array(values) => {
                w.write_u1(b'[');
                w.write_u2(values.len() as u16);
                for value in values {
                    value.write(w, pool)?;
                }
            }
        }
        Ok(())
    }
}
