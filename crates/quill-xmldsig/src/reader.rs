//! Reading signature streams back into records and driving verification.
//!
//! The stream is pumped through the SAX chain controller: collection is
//! switched on for the duration of every `<Signature>` element, which
//! splices the buffer stage in, and switched off again at its end. The
//! parser sits at the end of the chain and rebuilds
//! [`SignatureInformation`] records from the event stream.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::chain::{ConnectAction, SaxChainController};
use crate::crypto::SignatureVerifier;
use crate::error::SignatureResult;
use crate::export::ALGO_C14N;
use crate::model::{parse_iso8601, ReferenceType, SignatureInformation, SignatureReference};
use crate::relations::parse_relationships;
use crate::sax::{start_event, DocumentHandler, SaxEvent};
use crate::store::SignatureStore;
use crate::storage::SignatureStorage;

#[derive(Debug)]
struct PendingReference {
    uri: String,
    same_document: bool,
    has_c14n_transform: bool,
    digest_value: String,
}

/// Terminal chain stage that rebuilds signature records from SAX events.
#[derive(Debug, Default)]
pub(crate) struct SignatureParser {
    signatures: Vec<SignatureInformation>,
    current: Option<SignatureInformation>,
    reference: Option<PendingReference>,
    stack: Vec<String>,
    text: String,
    property_id: String,
    property_has_date: bool,
    property_has_description: bool,
}

impl SignatureParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn finish(self) -> Vec<SignatureInformation> {
        self.signatures
    }

    fn attr<'a>(attributes: &'a [crate::sax::Attribute], name: &str) -> Option<&'a str> {
        attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    fn on_start(&mut self, local: &str, attributes: &[crate::sax::Attribute]) {
        match local {
            "Signature" => {
                let mut info = SignatureInformation::new(0);
                if let Some(id) = Self::attr(attributes, "Id") {
                    info.signature_id = id.to_string();
                }
                self.current = Some(info);
            }
            "Reference" if self.current.is_some() => {
                let uri = Self::attr(attributes, "URI").unwrap_or_default();
                let (uri, same_document) = match uri.strip_prefix('#') {
                    Some(fragment) => (fragment.to_string(), true),
                    None => (uri.to_string(), false),
                };
                self.reference = Some(PendingReference {
                    uri,
                    same_document,
                    has_c14n_transform: false,
                    digest_value: String::new(),
                });
            }
            "Transform" => {
                if let Some(reference) = self.reference.as_mut() {
                    if Self::attr(attributes, "Algorithm") == Some(ALGO_C14N) {
                        reference.has_c14n_transform = true;
                    }
                }
            }
            "SignatureProperty" => {
                self.property_id = Self::attr(attributes, "Id").unwrap_or_default().to_string();
                self.property_has_date = false;
                self.property_has_description = false;
            }
            _ => {}
        }
    }

    fn on_end(&mut self, local: &str) {
        let text = std::mem::take(&mut self.text);
        if local == "Signature" {
            if let Some(done) = self.current.take() {
                self.signatures.push(done);
            }
            return;
        }
        let parent = self.stack.last().map(String::as_str);
        let Some(info) = self.current.as_mut() else {
            return;
        };
        match local {
            "Reference" => {
                if let Some(pending) = self.reference.take() {
                    let reference_type = if pending.same_document {
                        ReferenceType::SameDocument
                    } else if pending.has_c14n_transform {
                        ReferenceType::XmlStream
                    } else {
                        ReferenceType::BinaryStream
                    };
                    info.references.push(SignatureReference {
                        reference_type,
                        uri: pending.uri,
                        digest_value: pending.digest_value,
                    });
                }
            }
            "DigestValue" => {
                if parent == Some("CertDigest") {
                    info.cert_digest = text.trim().to_string();
                } else if let Some(reference) = self.reference.as_mut() {
                    reference.digest_value = text.trim().to_string();
                }
            }
            "SignatureValue" => info.signature_value = text.trim().to_string(),
            "X509IssuerName" => info.x509_issuer_name = text.trim().to_string(),
            "X509SerialNumber" => info.x509_serial_number = text.trim().to_string(),
            "X509Certificate" => info.x509_certificate = text.trim().to_string(),
            "date" => {
                Self::set_date(info, &text);
                self.property_has_date = true;
            }
            "description" => {
                info.description = text;
                self.property_has_description = true;
            }
            "Value" => {
                if parent == Some("SignatureTime") {
                    Self::set_date(info, &text);
                }
            }
            "SigningTime" => Self::set_date(info, &text),
            "SignatureComments" => info.description = text,
            "SignatureProperty" => {
                if self.property_has_date {
                    info.property_id = std::mem::take(&mut self.property_id);
                } else if self.property_has_description {
                    info.description_property_id = std::mem::take(&mut self.property_id);
                }
            }
            _ => {}
        }
    }

    fn set_date(info: &mut SignatureInformation, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        info.date_time_text = Some(trimmed.to_string());
        if let Some(parsed) = parse_iso8601(trimmed) {
            info.date_time = parsed;
        }
    }
}

impl DocumentHandler for SignatureParser {
    fn handle_event(&mut self, event: SaxEvent) -> SignatureResult<()> {
        match &event {
            SaxEvent::StartElement { attributes, .. } => {
                let local = event.local_name().to_string();
                self.on_start(&local, attributes);
                self.text.clear();
                self.stack.push(local);
            }
            SaxEvent::EndElement { .. } => {
                let local = event.local_name().to_string();
                self.stack.pop();
                self.on_end(&local);
            }
            SaxEvent::Characters(text) => self.text.push_str(text),
        }
        Ok(())
    }
}

/// Pump one XML stream through the chain into `parser`, engaging the
/// buffer stage across every `<Signature>` subtree.
pub(crate) fn pump_signatures(
    xml: &[u8],
    parser: &mut SignatureParser,
    chain: &mut SaxChainController,
) -> SignatureResult<()> {
    chain.set_sax_chain_connector(ConnectAction::SetDocumentHandler);

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let event = start_event(&e)?;
                if event.local_name() == "Signature" {
                    chain.collection_status_changed(true);
                }
                chain.dispatch(event, parser)?;
            }
            Event::Empty(e) => {
                let event = start_event(&e)?;
                let name = match &event {
                    SaxEvent::StartElement { name, .. } => name.clone(),
                    _ => unreachable!(),
                };
                chain.dispatch(event, parser)?;
                chain.dispatch(SaxEvent::EndElement { name }, parser)?;
            }
            Event::End(e) => {
                let event = SaxEvent::EndElement {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                };
                let was_signature = event.local_name() == "Signature";
                chain.dispatch(event, parser)?;
                if was_signature {
                    chain.collection_status_changed(false);
                }
            }
            Event::Text(e) => {
                chain.dispatch(SaxEvent::Characters(e.unescape()?.into_owned()), parser)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    chain.clear_sax_chain_connector(parser)
}

fn store_and_verify(
    parsed: Vec<SignatureInformation>,
    store: &mut SignatureStore,
    verifier: &mut dyn SignatureVerifier,
) {
    for mut info in parsed {
        info.security_id = store.new_security_id();
        store.push(info);
    }

    // Verification outcomes arrive as callbacks keyed by SecurityId; they
    // are routed onto the records regardless of arrival order.
    let mut outcomes = Vec::new();
    for info in store.records() {
        verifier.verify(info, &mut |id, status| outcomes.push((id, status)));
    }
    for (id, status) in outcomes {
        store.signature_verified(id, status);
    }
}

/// Read an ODF signature stream and verify every signature in it.
pub(crate) fn read_and_verify_signature_stream(
    xml: &[u8],
    store: &mut SignatureStore,
    chain: &mut SaxChainController,
    verifier: &mut dyn SignatureVerifier,
) -> SignatureResult<()> {
    let mut parser = SignatureParser::new();
    pump_signatures(xml, &mut parser, chain)?;
    store_and_verify(parser.finish(), store, verifier);
    Ok(())
}

/// Read an OOXML signatures sub-storage: every stream its relationships
/// part lists is parsed and verified.
pub(crate) fn read_and_verify_signature_storage(
    storage: &SignatureStorage,
    store: &mut SignatureStore,
    chain: &mut SaxChainController,
    verifier: &mut dyn SignatureVerifier,
) -> SignatureResult<()> {
    let rels_name = "_rels/origin.sigs.rels";
    let Some(rels) = storage.stream(rels_name) else {
        // No relationships part means no signatures.
        return Ok(());
    };

    let mut parsed = Vec::new();
    for relation in parse_relationships(rels, rels_name)? {
        if relation.type_ != crate::relations::SIGNATURE_REL_TYPE {
            continue;
        }
        let Some(xml) = storage.stream(&relation.target) else {
            log::warn!("signature stream {} listed but missing", relation.target);
            continue;
        };
        let mut parser = SignatureParser::new();
        pump_signatures(xml, &mut parser, chain)?;
        parsed.extend(parser.finish());
    }
    store_and_verify(parsed, store, verifier);
    Ok(())
}
