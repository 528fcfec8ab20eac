use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::Result;

/// The fixed timestamp stamped on every emitted jar entry, so outputs are
/// byte-identical across runs: 2010-01-01T00:00:00 local.
const NORMALIZED_TIMESTAMP: (u16, u8, u8, u8, u8, u8) = (2010, 1, 1, 0, 0, 0);

/// Main attributes of `META-INF/MANIFEST.MF`.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub target_label: Option<String>,
    pub injecting_rule_kind: Option<String>,
}

impl Manifest {
    fn render(&self) -> Vec<u8> {
        // The jar spec wants CRLF line endings and a trailing newline.
        let mut out = String::new();
        out.push_str("Manifest-Version: 1.0\r\n");
        out.push_str("Created-By: gale\r\n");
        if let Some(label) = &self.target_label {
            out.push_str("Target-Label: ");
            out.push_str(label);
            out.push_str("\r\n");
        }
        if let Some(kind) = &self.injecting_rule_kind {
            out.push_str("Injecting-Rule-Kind: ");
            out.push_str(kind);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// Writes a deterministic jar: all entries STORED, fixed timestamp,
/// `META-INF/` and the manifest first.
pub struct JarBuilder<W: Write + Seek> {
    zip: zip::ZipWriter<W>,
}

impl JarBuilder<BufWriter<File>> {
    pub fn create(path: &Path, manifest: &Manifest) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Self::new(file, manifest)
    }
}

impl<W: Write + Seek> JarBuilder<W> {
    pub fn new(writer: W, manifest: &Manifest) -> Result<Self> {
        let mut builder = Self {
            zip: zip::ZipWriter::new(writer),
        };
        builder.zip.add_directory("META-INF/", builder_options())?;
        builder.add_entry("META-INF/MANIFEST.MF", &manifest.render())?;
        Ok(builder)
    }

    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.zip.start_file(name, builder_options())?;
        self.zip.write_all(data)?;
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

fn builder_options() -> zip::write::SimpleFileOptions {
    let (year, month, day, hour, minute, second) = NORMALIZED_TIMESTAMP;
    let timestamp = zip::DateTime::from_date_and_time(year, month, day, hour, minute, second)
        .expect("normalized timestamp is a valid DOS datetime");
    zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .last_modified_time(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn build_sample(manifest: &Manifest) -> Vec<u8> {
        let cursor = Cursor::new(Vec::new());
        let mut jar = JarBuilder::new(cursor, manifest).unwrap();
        jar.add_entry("a/A.class", b"\xCA\xFE\xBA\xBEfake").unwrap();
        jar.finish().unwrap().into_inner()
    }

    #[test]
    fn entries_are_stored_with_fixed_timestamp() {
        let bytes = build_sample(&Manifest::default());
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let entry = archive.by_name("a/A.class").unwrap();
        assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
        let dt = entry.last_modified().unwrap();
        assert_eq!(
            (dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), dt.second()),
            (2010, 1, 1, 0, 0, 0)
        );
        assert_eq!(entry.crc32(), crc32_of(b"\xCA\xFE\xBA\xBEfake"));
    }

    fn crc32_of(data: &[u8]) -> u32 {
        // Reference implementation of CRC-32 (IEEE), bit-reflected.
        let mut crc: u32 = !0;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
            }
        }
        !crc
    }

    #[test]
    fn manifest_is_first_and_stamped() {
        let manifest = Manifest {
            target_label: Some("//java/com/example:lib".to_string()),
            injecting_rule_kind: Some("java_library".to_string()),
        };
        let bytes = build_sample(&manifest);
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "META-INF/");
        assert_eq!(archive.by_index(1).unwrap().name(), "META-INF/MANIFEST.MF");

        let mut text = String::new();
        archive
            .by_name("META-INF/MANIFEST.MF")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains("Manifest-Version: 1.0\r\n"));
        assert!(text.contains("Created-By: gale\r\n"));
        assert!(text.contains("Target-Label: //java/com/example:lib\r\n"));
        assert!(text.contains("Injecting-Rule-Kind: java_library\r\n"));
    }

    #[test]
    fn output_is_deterministic() {
        let manifest = Manifest::default();
        assert_eq!(build_sample(&manifest), build_sample(&manifest));
    }
}
