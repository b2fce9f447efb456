//! Signature records and the small enums that classify them.

use chrono::{DateTime, NaiveDateTime, Utc};

/// What kind of resource a signature reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    /// A `#fragment` reference into the signature document itself.
    SameDocument,
    /// A container stream digested as raw bytes.
    BinaryStream,
    /// A container stream digested after C14N canonicalization.
    XmlStream,
}

/// One signed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureReference {
    pub reference_type: ReferenceType,
    pub uri: String,
    pub digest_value: String,
}

/// Outcome of a signature creation or verification, delivered through the
/// asynchronous result callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Unknown,
    OperationSucceeded,
    RuntimeError,
    MalformedDigitalSignature,
}

/// Wire format of the signature storage, decided by probing the root
/// container for a `[Content_Types].xml` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Odf,
    Ooxml,
}

/// Which class of document content a signature covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    Content,
    Macros,
}

/// Everything known about one signature, parsed or about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInformation {
    /// Correlates asynchronous creation/verification results with this
    /// record; assigned monotonically per store.
    pub security_id: u32,
    pub signature_id: String,
    pub property_id: String,
    pub description_property_id: String,
    pub signature_value: String,
    pub digest_value: String,
    pub x509_issuer_name: String,
    pub x509_serial_number: String,
    /// Base64-encoded DER certificate.
    pub x509_certificate: String,
    /// Base64-encoded SHA-256 thumbprint of the certificate.
    pub cert_digest: String,
    pub date_time: DateTime<Utc>,
    /// The date/time string as originally read from the document. Preferred
    /// when re-serializing, so rounding differences cannot break an existing
    /// signature.
    pub date_time_text: Option<String>,
    pub description: String,
    pub references: Vec<SignatureReference>,
    pub status: SignatureStatus,
}

impl SignatureInformation {
    pub fn new(security_id: u32) -> Self {
        Self {
            security_id,
            signature_id: String::new(),
            property_id: String::new(),
            description_property_id: String::new(),
            signature_value: String::new(),
            digest_value: String::new(),
            x509_issuer_name: String::new(),
            x509_serial_number: String::new(),
            x509_certificate: String::new(),
            cert_digest: String::new(),
            date_time: DateTime::<Utc>::UNIX_EPOCH,
            date_time_text: None,
            description: String::new(),
            references: Vec::new(),
            status: SignatureStatus::Unknown,
        }
    }
}

/// A pre-parsed signing certificate. Certificate parsing itself is the
/// embedder's concern; the manager only consumes the fields it serializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub issuer_name: String,
    pub serial_number: String,
    pub der: Vec<u8>,
}

/// ISO 8601 with seconds precision; a non-zero fraction is appended as
/// `,nnn` milliseconds.
pub(crate) fn to_iso8601(date_time: &DateTime<Utc>) -> String {
    let base = date_time.format("%Y-%m-%dT%H:%M:%S").to_string();
    if date_time.timestamp_subsec_nanos() != 0 {
        format!("{base},{:03}", date_time.timestamp_subsec_millis())
    } else {
        base
    }
}

/// The ODF signature date: the original text when present, otherwise the
/// converted timestamp.
pub(crate) fn odf_date_value(info: &SignatureInformation) -> String {
    match &info.date_time_text {
        Some(text) => text.clone(),
        None => to_iso8601(&info.date_time),
    }
}

/// The OOXML signature time: the original text when present, otherwise the
/// converted timestamp with any `,nnn` fraction dropped and `Z` appended.
pub(crate) fn ooxml_time_value(info: &SignatureInformation) -> String {
    match &info.date_time_text {
        Some(text) => text.clone(),
        None => {
            let mut value = to_iso8601(&info.date_time);
            if let Some(comma) = value.find(',') {
                value.truncate(comma);
                value.push('Z');
            }
            value
        }
    }
}

/// Lenient ISO 8601 parse for dates read back from documents; fractions and
/// a trailing `Z` are tolerated and dropped.
pub(crate) fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let text = text.strip_suffix('Z').unwrap_or(text);
    let text = text
        .split_once(',')
        .map(|(head, _)| head)
        .unwrap_or(text);
    let text = text
        .split_once('.')
        .map(|(head, _)| head)
        .unwrap_or(text);
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
