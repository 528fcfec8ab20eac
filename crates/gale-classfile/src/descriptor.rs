use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn descriptor_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    pub fn from_descriptor_char(ch: char) -> Option<Self> {
        Some(match ch {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    /// Internal (slash-separated) class name.
    Object(String),
    Array(Box<FieldType>),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(base) => write!(f, "{}", base.descriptor_char()),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(elem) => write!(f, "[{elem}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        match &self.return_type {
            ReturnType::Void => write!(f, "V"),
            ReturnType::Type(ty) => write!(f, "{ty}"),
        }
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let (ty, rest) = parse_field_type(desc)?;
    if !rest.is_empty() {
        return Err(Error::BadDescriptor(desc.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let rest = desc
        .strip_prefix('(')
        .ok_or_else(|| Error::BadDescriptor(desc.to_string()))?;

    let mut rest = rest;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(Error::BadDescriptor(desc.to_string()));
        }
        let (param, remaining) = parse_field_type(rest)?;
        params.push(param);
        rest = remaining;
    }

    let return_type = if rest == "V" {
        ReturnType::Void
    } else {
        let (ty, remaining) = parse_field_type(rest)?;
        if !remaining.is_empty() {
            return Err(Error::BadDescriptor(desc.to_string()));
        }
        ReturnType::Type(ty)
    };

    Ok(MethodDescriptor {
        params,
        return_type,
    })
}

fn parse_field_type(s: &str) -> Result<(FieldType, &str)> {
    let first = s
        .chars()
        .next()
        .ok_or_else(|| Error::BadDescriptor(s.to_string()))?;
    if let Some(base) = BaseType::from_descriptor_char(first) {
        return Ok((FieldType::Base(base), &s[1..]));
    }
    match first {
        'L' => {
            let end = s
                .find(';')
                .ok_or_else(|| Error::BadDescriptor(s.to_string()))?;
            let name = &s[1..end];
            if name.is_empty() {
                return Err(Error::BadDescriptor(s.to_string()));
            }
            Ok((FieldType::Object(name.to_string()), &s[end + 1..]))
        }
        '[' => {
            let (elem, rest) = parse_field_type(&s[1..])?;
            Ok((FieldType::Array(Box::new(elem)), rest))
        }
        _ => Err(Error::BadDescriptor(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_round_trip() {
        for desc in ["I", "J", "Ljava/lang/String;", "[[D", "[La/B$C;"] {
            let parsed = parse_field_descriptor(desc).unwrap();
            assert_eq!(parsed.to_string(), desc);
        }
    }

    #[test]
    fn method_round_trip() {
        for desc in ["()V", "(IJ)Ljava/lang/String;", "([BLjava/lang/Object;)[I"] {
            let parsed = parse_method_descriptor(desc).unwrap();
            assert_eq!(parsed.to_string(), desc);
        }
    }

    #[test]
    fn rejects_truncated() {
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("(I)VX").is_err());
    }
}
