use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::mutf8;
use crate::reader::Reader;
use crate::writer::Writer;

#[derive(Debug, Clone)]
pub enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType { descriptor_index: u16 },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class { .. } => "Class",
            CpInfo::String { .. } => "String",
            CpInfo::Fieldref { .. } => "Fieldref",
            CpInfo::Methodref { .. } => "Methodref",
            CpInfo::InterfaceMethodref { .. } => "InterfaceMethodref",
            CpInfo::NameAndType { .. } => "NameAndType",
            CpInfo::MethodHandle { .. } => "MethodHandle",
            CpInfo::MethodType { .. } => "MethodType",
            CpInfo::Dynamic { .. } => "Dynamic",
            CpInfo::InvokeDynamic { .. } => "InvokeDynamic",
            CpInfo::Module { .. } => "Module",
            CpInfo::Package { .. } => "Package",
        }
    }
}

/// A parsed constant pool, indexed 1-based as in the class-file format.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Option<CpInfo>>,
}

impl ConstantPool {
    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.u2()? as usize;
        if count == 0 {
            return Err(Error::Malformed("constant_pool_count must be >= 1"));
        }

        let mut entries = vec![None; count];
        let mut i = 1usize;
        while i < count {
            let tag = reader.u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.u2()? as usize;
                    CpInfo::Utf8(mutf8::decode(reader.bytes(len)?)?)
                }
                3 => CpInfo::Integer(reader.i4()?),
                4 => CpInfo::Float(f32::from_bits(reader.u4()?)),
                5 => CpInfo::Long(reader.i8()?),
                6 => CpInfo::Double(f64::from_bits(reader.i8()? as u64)),
                7 => CpInfo::Class {
                    name_index: reader.u2()?,
                },
                8 => CpInfo::String {
                    string_index: reader.u2()?,
                },
                9 => CpInfo::Fieldref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                10 => CpInfo::Methodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                11 => CpInfo::InterfaceMethodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                12 => CpInfo::NameAndType {
                    name_index: reader.u2()?,
                    descriptor_index: reader.u2()?,
                },
                15 => CpInfo::MethodHandle {
                    reference_kind: reader.u1()?,
                    reference_index: reader.u2()?,
                },
                16 => CpInfo::MethodType {
                    descriptor_index: reader.u2()?,
                },
                17 => CpInfo::Dynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                18 => CpInfo::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                19 => CpInfo::Module {
                    name_index: reader.u2()?,
                },
                20 => CpInfo::Package {
                    name_index: reader.u2()?,
                },
                other => return Err(Error::BadPoolTag(other)),
            };

            // Long and Double take up two slots.
            let wide = matches!(entry, CpInfo::Long(_) | CpInfo::Double(_));
            entries[i] = Some(entry);
            if wide {
                if i + 1 >= count {
                    return Err(Error::Malformed("malformed constant pool"));
                }
                i += 2;
            } else {
                i += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, index: u16) -> Result<&CpInfo> {
        let idx = index as usize;
        if idx == 0 || idx >= self.entries.len() {
            return Err(Error::BadPoolIndex(index));
        }
        self.entries[idx]
            .as_ref()
            .ok_or(Error::BadPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s.as_str()),
            other => Err(Error::WrongPoolEntry {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::WrongPoolEntry {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    pub fn get_string_constant(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::String { string_index } => Ok(self.get_utf8(*string_index)?.to_string()),
            other => Err(Error::WrongPoolEntry {
                index,
                expected: "String",
                found: other.kind(),
            }),
        }
    }

    pub fn get_module_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Module { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::WrongPoolEntry {
                index,
                expected: "Module",
                found: other.kind(),
            }),
        }
    }

    pub fn get_package_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Package { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::WrongPoolEntry {
                index,
                expected: "Package",
                found: other.kind(),
            }),
        }
    }
}

/// Interning constant-pool builder for the write side.
///
/// Float and double keys intern by bit pattern so `-0.0` and `0.0` stay
/// distinct and `NaN` payloads survive.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    entries: Vec<CpInfo>,
    // Entry count in slots (longs/doubles take two); the next allocated index.
    next_index: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    integers: HashMap<i32, u16>,
    floats: HashMap<u32, u16>,
    longs: HashMap<i64, u16>,
    doubles: HashMap<u64, u16>,
    strings: HashMap<String, u16>,
    modules: HashMap<String, u16>,
    packages: HashMap<String, u16>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self {
            next_index: 1,
            ..Self::default()
        }
    }

    fn push(&mut self, entry: CpInfo) -> Result<u16> {
        let index = self.next_index;
        let slots: u16 = match entry {
            CpInfo::Long(_) | CpInfo::Double(_) => 2,
            _ => 1,
        };
        self.next_index = self
            .next_index
            .checked_add(slots)
            .ok_or(Error::PoolTooLarge)?;
        self.entries.push(entry);
        Ok(index)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        if let Some(&idx) = self.utf8.get(value) {
            return Ok(idx);
        }
        let idx = self.push(CpInfo::Utf8(value.to_string()))?;
        self.utf8.insert(value.to_string(), idx);
        Ok(idx)
    }

    pub fn class_info(&mut self, internal_name: &str) -> Result<u16> {
        if let Some(&idx) = self.classes.get(internal_name) {
            return Ok(idx);
        }
        let name_index = self.utf8(internal_name)?;
        let idx = self.push(CpInfo::Class { name_index })?;
        self.classes.insert(internal_name.to_string(), idx);
        Ok(idx)
    }

    pub fn integer(&mut self, value: i32) -> Result<u16> {
        if let Some(&idx) = self.integers.get(&value) {
            return Ok(idx);
        }
        let idx = self.push(CpInfo::Integer(value))?;
        self.integers.insert(value, idx);
        Ok(idx)
    }

    pub fn float(&mut self, value: f32) -> Result<u16> {
        let bits = value.to_bits();
        if let Some(&idx) = self.floats.get(&bits) {
            return Ok(idx);
        }
        let idx = self.push(CpInfo::Float(value))?;
        self.floats.insert(bits, idx);
        Ok(idx)
    }

    pub fn long(&mut self, value: i64) -> Result<u16> {
        if let Some(&idx) = self.longs.get(&value) {
            return Ok(idx);
        }
        let idx = self.push(CpInfo::Long(value))?;
        self.longs.insert(value, idx);
        Ok(idx)
    }

    pub fn double(&mut self, value: f64) -> Result<u16> {
        let bits = value.to_bits();
        if let Some(&idx) = self.doubles.get(&bits) {
            return Ok(idx);
        }
        let idx = self.push(CpInfo::Double(value))?;
        self.doubles.insert(bits, idx);
        Ok(idx)
    }

    pub fn string(&mut self, value: &str) -> Result<u16> {
        if let Some(&idx) = self.strings.get(value) {
            return Ok(idx);
        }
        let string_index = self.utf8(value)?;
        let idx = self.push(CpInfo::String { string_index })?;
        self.strings.insert(value.to_string(), idx);
        Ok(idx)
    }

    pub fn module(&mut self, name: &str) -> Result<u16> {
        if let Some(&idx) = self.modules.get(name) {
            return Ok(idx);
        }
        let name_index = self.utf8(name)?;
        let idx = self.push(CpInfo::Module { name_index })?;
        self.modules.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn package(&mut self, name: &str) -> Result<u16> {
        if let Some(&idx) = self.packages.get(name) {
            return Ok(idx);
        }
        let name_index = self.utf8(name)?;
        let idx = self.push(CpInfo::Package { name_index })?;
        self.packages.insert(name.to_string(), idx);
        Ok(idx)
    }

    /// Serialize as `constant_pool_count` followed by the entries.
    pub fn write_to(&self, w: &mut Writer) {
        w.write_u2(self.next_index);
        for entry in &self.entries {
            match entry {
                CpInfo::Utf8(s) => {
                    let bytes = mutf8::encode(s);
                    w.write_u1(1);
                    w.write_u2(bytes.len() as u16);
                    w.write_bytes(&bytes);
                }
                CpInfo::Integer(v) => {
                    w.write_u1(3);
                    w.write_i4(*v);
                }
                CpInfo::Float(v) => {
                    w.write_u1(4);
                    w.write_u4(v.to_bits());
                }
                CpInfo::Long(v) => {
                    w.write_u1(5);
                    w.write_i8(*v);
                }
                CpInfo::Double(v) => {
                    w.write_u1(6);
                    w.write_i8(v.to_bits() as i64);
                }
                CpInfo::Class { name_index } => {
                    w.write_u1(7);
                    w.write_u2(*name_index);
                }
                CpInfo::String { string_index } => {
                    w.write_u1(8);
                    w.write_u2(*string_index);
                }
                CpInfo::Module { name_index } => {
                    w.write_u1(19);
                    w.write_u2(*name_index);
                }
                CpInfo::Package { name_index } => {
                    w.write_u1(20);
                    w.write_u2(*name_index);
                }
                // The builder never allocates reference-shaped entries; headers
                // have no code to point at them.
                other => unreachable!("builder produced {}", other.kind()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_interns() {
        let mut pool = ConstantPoolBuilder::new();
        let a = pool.utf8("java/lang/Object").unwrap();
        let b = pool.utf8("java/lang/Object").unwrap();
        assert_eq!(a, b);
        let c = pool.class_info("java/lang/Object").unwrap();
        let d = pool.class_info("java/lang/Object").unwrap();
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut pool = ConstantPoolBuilder::new();
        let l = pool.long(1).unwrap();
        let i = pool.integer(1).unwrap();
        assert_eq!(l, 1);
        assert_eq!(i, 3);
    }

    #[test]
    fn builder_round_trips_through_parser() {
        let mut pool = ConstantPoolBuilder::new();
        pool.utf8("Hello").unwrap();
        pool.integer(-42).unwrap();
        pool.double(2.5).unwrap();
        pool.class_info("a/B").unwrap();
        pool.string("Hello").unwrap();

        let mut w = Writer::new();
        pool.write_to(&mut w);
        let bytes = w.into_bytes();
        let parsed = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(parsed.get_utf8(1).unwrap(), "Hello");
        match parsed.get(2).unwrap() {
            CpInfo::Integer(v) => assert_eq!(*v, -42),
            other => panic!("unexpected {other:?}"),
        }
        match parsed.get(3).unwrap() {
            CpInfo::Double(v) => assert_eq!(*v, 2.5),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parsed.get_class_name(6).unwrap(), "a/B");
        assert_eq!(parsed.get_string_constant(7).unwrap(), "Hello");
    }

    #[test]
    fn distinguishes_float_zero_signs() {
        let mut pool = ConstantPoolBuilder::new();
        let pos = pool.float(0.0).unwrap();
        let neg = pool.float(-0.0).unwrap();
        assert_ne!(pos, neg);
    }
}
