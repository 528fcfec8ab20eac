use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Reading and writing failures for class-file structures.
///
/// The set is closed and display-heavy: callers either surface the message
/// (corrupt output would be an internal error) or treat the classpath entry
/// as unreadable and move on.
#[derive(Debug)]
pub enum Error {
    /// Input ended in the middle of a structure.
    Truncated,
    BadMagic(u32),
    BadPoolIndex(u16),
    BadPoolTag(u8),
    WrongPoolEntry {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    BadUtf8,
    BadDescriptor(String),
    BadSignature(String),
    /// A named attribute whose payload doesn't match its shape.
    BadAttribute(&'static str),
    /// More than 65535 constant-pool slots on the write side.
    PoolTooLarge,
    Malformed(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated => f.write_str("truncated class file"),
            Error::BadMagic(magic) => write!(f, "not a class file (magic 0x{magic:08x})"),
            Error::BadPoolIndex(index) => write!(f, "constant pool index {index} out of range"),
            Error::BadPoolTag(tag) => write!(f, "unknown constant pool tag {tag}"),
            Error::WrongPoolEntry {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool entry {index} is a {found}, expected a {expected}"
            ),
            Error::BadUtf8 => f.write_str("malformed modified UTF-8"),
            Error::BadDescriptor(desc) => write!(f, "malformed descriptor `{desc}`"),
            Error::BadSignature(sig) => write!(f, "malformed signature `{sig}`"),
            Error::BadAttribute(name) => write!(f, "malformed {name} attribute"),
            Error::PoolTooLarge => f.write_str("constant pool exceeds 65535 slots"),
            Error::Malformed(what) => write!(f, "malformed class file: {what}"),
        }
    }
}

impl std::error::Error for Error {}
