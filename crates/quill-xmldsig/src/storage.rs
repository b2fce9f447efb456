//! In-memory view of a ZIP-like container: part name -> bytes.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use crate::error::SignatureResult;
use crate::model::StorageFormat;

/// Name prefix of the OOXML signatures sub-storage inside the root
/// container.
pub(crate) const SIGNATURES_STORAGE_PREFIX: &str = "_xmlsignatures/";

/// The root container, fully inflated into memory.
#[derive(Debug, Clone, Default)]
pub struct ContainerStorage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl ContainerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> SignatureResult<Self> {
        let reader = Cursor::new(bytes);
        let mut zip = zip::ZipArchive::new(reader)?;

        let mut parts = BTreeMap::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            parts.insert(file.name().to_string(), buf);
        }
        Ok(Self { parts })
    }

    pub fn to_bytes(&self) -> SignatureResult<Vec<u8>> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in &self.parts {
            zip.start_file(name.clone(), options)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(|v| v.as_slice())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Serialization format of this container: an OOXML package carries a
    /// `[Content_Types].xml` entry, an ODF one does not.
    pub fn storage_format(&self) -> StorageFormat {
        if self.has_part("[Content_Types].xml") {
            StorageFormat::Ooxml
        } else {
            StorageFormat::Odf
        }
    }

    /// Extract the signatures sub-storage (OOXML only), stream names
    /// relative to the sub-storage.
    pub(crate) fn signature_storage(&self) -> SignatureStorage {
        let mut storage = SignatureStorage::default();
        for (name, bytes) in &self.parts {
            if let Some(stream) = name.strip_prefix(SIGNATURES_STORAGE_PREFIX) {
                storage.streams.insert(stream.to_string(), bytes.clone());
            }
        }
        storage
    }

    /// Promote a committed signatures sub-storage into the container,
    /// replacing whatever was there.
    pub(crate) fn commit_signature_storage(&mut self, storage: &SignatureStorage) {
        let stale: Vec<String> = self
            .parts
            .keys()
            .filter(|name| name.starts_with(SIGNATURES_STORAGE_PREFIX))
            .cloned()
            .collect();
        for name in stale {
            self.parts.remove(&name);
        }
        for (stream, bytes) in &storage.streams {
            self.parts
                .insert(format!("{SIGNATURES_STORAGE_PREFIX}{stream}"), bytes.clone());
        }
    }
}

/// The OOXML signatures sub-storage: many signature streams plus a
/// relationships part, committed as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureStorage {
    pub(crate) streams: BTreeMap<String, Vec<u8>>,
}

impl SignatureStorage {
    pub fn stream(&self, name: &str) -> Option<&[u8]> {
        self.streams.get(name).map(|v| v.as_slice())
    }

    pub fn set_stream(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.streams.insert(name.into(), bytes);
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn zip_with(parts: &[(&str, &str)]) -> Vec<u8> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in parts {
            zip.start_file(name.to_string(), options).expect("start file");
            zip.write_all(content.as_bytes()).expect("write file");
        }
        zip.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn format_probe_keys_off_content_types() {
        let odf = ContainerStorage::from_bytes(&zip_with(&[("mimetype", "x")])).unwrap();
        assert_eq!(odf.storage_format(), StorageFormat::Odf);

        let ooxml = ContainerStorage::from_bytes(&zip_with(&[
            ("[Content_Types].xml", "<Types/>"),
        ]))
        .unwrap();
        assert_eq!(ooxml.storage_format(), StorageFormat::Ooxml);
    }

    #[test]
    fn container_round_trips_through_zip() {
        let mut container = ContainerStorage::new();
        container.set_part("a.xml", b"<a/>".to_vec());
        container.set_part("dir/b.bin", vec![1, 2, 3]);
        let reread = ContainerStorage::from_bytes(&container.to_bytes().unwrap()).unwrap();
        assert_eq!(reread.part("a.xml"), Some(b"<a/>".as_slice()));
        assert_eq!(reread.part("dir/b.bin"), Some([1, 2, 3].as_slice()));
    }

    #[test]
    fn signature_storage_commit_replaces_previous_parts() {
        let mut container = ContainerStorage::new();
        container.set_part("_xmlsignatures/sig1.xml", b"old".to_vec());
        container.set_part("word/document.xml", b"<w/>".to_vec());

        let mut storage = SignatureStorage::default();
        storage.set_stream("sig2.xml", b"new".to_vec());
        container.commit_signature_storage(&storage);

        assert!(container.part("_xmlsignatures/sig1.xml").is_none());
        assert_eq!(
            container.part("_xmlsignatures/sig2.xml"),
            Some(b"new".as_slice())
        );
        assert_eq!(
            container.signature_storage().stream("sig2.xml"),
            Some(b"new".as_slice())
        );
    }
}
