//! A reader for the jimage container format (`$JAVA_HOME/lib/modules`).
//!
//! Only what indexing needs: the header, the location-offset table, location
//! attribute decoding, and the strings region. Lookup tables for hashed
//! access are skipped; Gale enumerates every resource once and keeps its own
//! map. Compressed resources are rejected (JDK runtime images store class
//! resources uncompressed).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{ClasspathError, Result};

const MAGIC: u32 = 0xCAFE_DADA;
const HEADER_SIZE: usize = 28;

const ATTRIBUTE_END: u8 = 0;
const ATTRIBUTE_MODULE: u8 = 1;
const ATTRIBUTE_PARENT: u8 = 2;
const ATTRIBUTE_BASE: u8 = 3;
const ATTRIBUTE_EXTENSION: u8 = 4;
const ATTRIBUTE_OFFSET: u8 = 5;
const ATTRIBUTE_COMPRESSED: u8 = 6;
const ATTRIBUTE_UNCOMPRESSED: u8 = 7;

#[derive(Debug, Clone, Copy)]
struct Location {
    offset: u64,
    compressed_size: u64,
    uncompressed_size: u64,
}

#[derive(Debug)]
pub(crate) struct JImage {
    path: PathBuf,
    bytes: Vec<u8>,
    resource_data_start: usize,
    locations: HashMap<String, Location>,
    names_sorted: Vec<String>,
}

impl JImage {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let corrupt = |message: &str| ClasspathError::Image {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        if bytes.len() < HEADER_SIZE {
            return Err(corrupt("truncated header"));
        }

        // The container is written in the build host's byte order; the magic
        // number tells us which.
        let le = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) == MAGIC;
        if !le && u32::from_be_bytes(bytes[0..4].try_into().unwrap()) != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let read_u32 = |off: usize| -> u32 {
            let raw: [u8; 4] = bytes[off..off + 4].try_into().unwrap();
            if le {
                u32::from_le_bytes(raw)
            } else {
                u32::from_be_bytes(raw)
            }
        };

        let table_length = read_u32(12) as usize;
        let locations_size = read_u32(16) as usize;
        let strings_size = read_u32(20) as usize;

        let redirect_start = HEADER_SIZE;
        let offsets_start = redirect_start + table_length * 4;
        let locations_start = offsets_start + table_length * 4;
        let strings_start = locations_start + locations_size;
        let resource_data_start = strings_start + strings_size;
        if resource_data_start > bytes.len() {
            return Err(corrupt("index extends past end of file"));
        }

        let locations_region = &bytes[locations_start..strings_start];
        let strings_region = &bytes[strings_start..resource_data_start];

        let mut locations = HashMap::new();
        for slot in 0..table_length {
            let offset = read_u32(offsets_start + slot * 4) as usize;
            if offset == 0 {
                continue;
            }
            let (name, location) =
                decode_location(locations_region, strings_region, offset)
                    .ok_or_else(|| corrupt("malformed location attributes"))?;
            locations.insert(name, location);
        }

        let mut names_sorted: Vec<String> = locations.keys().cloned().collect();
        names_sorted.sort();

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            resource_data_start,
            locations,
            names_sorted,
        })
    }

    pub(crate) fn resource_names(&self) -> &[String] {
        &self.names_sorted
    }

    pub(crate) fn read(&self, name: &str) -> Result<Vec<u8>> {
        let corrupt = |message: String| ClasspathError::Image {
            path: self.path.clone(),
            message,
        };
        let location = self
            .locations
            .get(name)
            .ok_or_else(|| corrupt(format!("no such resource: {name}")))?;
        if location.compressed_size != 0 {
            return Err(corrupt(format!("compressed resource not supported: {name}")));
        }
        let start = self.resource_data_start + location.offset as usize;
        let end = start + location.uncompressed_size as usize;
        self.bytes
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| corrupt(format!("resource out of bounds: {name}")))
    }
}

/// Decode one location's attribute stream into its full name and data
/// coordinates.
///
/// Attributes are encoded as `(kind << 3) | (length - 1)` followed by
/// `length` big-endian value bytes; string-valued attributes hold offsets
/// into the strings region, where strings are NUL-terminated.
fn decode_location(
    locations: &[u8],
    strings: &[u8],
    offset: usize,
) -> Option<(String, Location)> {
    let mut pos = offset;
    let mut module = None;
    let mut parent = None;
    let mut base = None;
    let mut extension = None;
    let mut data_offset = 0u64;
    let mut compressed = 0u64;
    let mut uncompressed = 0u64;

    loop {
        let head = *locations.get(pos)?;
        pos += 1;
        let kind = head >> 3;
        if kind == ATTRIBUTE_END {
            break;
        }
        let len = (head & 0x7) as usize + 1;
        let mut value = 0u64;
        for _ in 0..len {
            value = (value << 8) | *locations.get(pos)? as u64;
            pos += 1;
        }
        match kind {
            ATTRIBUTE_MODULE => module = Some(read_string(strings, value as usize)?),
            ATTRIBUTE_PARENT => parent = Some(read_string(strings, value as usize)?),
            ATTRIBUTE_BASE => base = Some(read_string(strings, value as usize)?),
            ATTRIBUTE_EXTENSION => extension = Some(read_string(strings, value as usize)?),
            ATTRIBUTE_OFFSET => data_offset = value,
            ATTRIBUTE_COMPRESSED => compressed = value,
            ATTRIBUTE_UNCOMPRESSED => uncompressed = value,
            _ => return None,
        }
    }

    let mut name = String::new();
    if let Some(module) = module {
        name.push('/');
        name.push_str(&module);
        name.push('/');
    }
    if let Some(parent) = parent {
        name.push_str(&parent);
        name.push('/');
    }
    name.push_str(&base?);
    if let Some(extension) = extension {
        name.push('.');
        name.push_str(&extension);
    }

    Some((
        name,
        Location {
            offset: data_offset,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
        },
    ))
}

fn read_string(strings: &[u8], offset: usize) -> Option<String> {
    let rest = strings.get(offset..)?;
    let end = rest.iter().position(|b| *b == 0)?;
    // Strings are modified UTF-8; platform resource names are ASCII in
    // practice, so plain UTF-8 decoding suffices.
    String::from_utf8(rest[..end].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(kind: u8, value: u64) -> Vec<u8> {
        // Smallest encoding with a fixed 2-byte value keeps the test honest
        // about multi-byte big-endian decoding.
        vec![(kind << 3) | 1, (value >> 8) as u8, value as u8]
    }

    #[test]
    fn decodes_location_attributes() {
        let strings = b"java.base\0java/lang\0Object\0class\0";
        let mut blob = vec![0u8; 4]; // padding so offset != 0
        let offset = blob.len();
        blob.extend(attr(ATTRIBUTE_MODULE, 0));
        blob.extend(attr(ATTRIBUTE_PARENT, 10));
        blob.extend(attr(ATTRIBUTE_BASE, 20));
        blob.extend(attr(ATTRIBUTE_EXTENSION, 27));
        blob.extend(attr(ATTRIBUTE_OFFSET, 123));
        blob.extend(attr(ATTRIBUTE_UNCOMPRESSED, 456));
        blob.push(0); // END

        let (name, location) = decode_location(&blob, strings, offset).unwrap();
        assert_eq!(name, "/java.base/java/lang/Object.class");
        assert_eq!(location.offset, 123);
        assert_eq!(location.uncompressed_size, 456);
        assert_eq!(location.compressed_size, 0);
    }

    #[test]
    fn rejects_truncated_attributes() {
        let strings = b"x\0";
        let blob = vec![(ATTRIBUTE_BASE << 3) | 3, 0, 0]; // claims 4 bytes, has 2
        assert!(decode_location(&blob, strings, 0).is_none());
    }
}
