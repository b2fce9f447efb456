use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("xml error: {0}")]
    XmlDom(#[from] roxmltree::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("missing part: {0}")]
    MissingPart(String),
    #[error("no certificate selected")]
    MissingCertificate,
    #[error("certificate has an empty serial number")]
    EmptySerialNumber,
    #[error("malformed signature stream: {0}")]
    MalformedSignature(String),
    #[error("signature index out of range: {0}")]
    InvalidIndex(usize),
    #[error("sax chain in an inconsistent state")]
    ChainState,
}

pub type SignatureResult<T> = Result<T, SignatureError>;
