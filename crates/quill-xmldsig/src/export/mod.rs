//! XML-DSig serialization, one module per wire format.

pub mod odf;
pub mod ooxml;

use crate::error::SignatureResult;
use crate::sax::{DocumentHandler, SaxEvent};

pub(crate) const NS_XMLDSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
pub(crate) const ALGO_C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub(crate) const ALGO_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub(crate) const ALGO_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub(crate) const ALGO_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub(crate) const ALGO_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub(crate) const ALGO_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/package/2006/RelationshipTransform";
pub(crate) const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub(crate) const NS_MDSSI: &str =
    "http://schemas.openxmlformats.org/package/2006/digital-signature";
pub(crate) const NS_XD: &str = "http://uri.etsi.org/01903/v1.3.2#";
pub(crate) const NS_MSODIGSIG: &str = "http://schemas.microsoft.com/office/2006/digsig";

pub(crate) fn start(
    handler: &mut dyn DocumentHandler,
    name: &str,
    attributes: &[(&str, &str)],
) -> SignatureResult<()> {
    handler.handle_event(SaxEvent::start(name, attributes))
}

pub(crate) fn end(handler: &mut dyn DocumentHandler, name: &str) -> SignatureResult<()> {
    handler.handle_event(SaxEvent::end(name))
}

pub(crate) fn characters(handler: &mut dyn DocumentHandler, text: &str) -> SignatureResult<()> {
    handler.handle_event(SaxEvent::Characters(text.to_string()))
}

/// `<name attrs...>text</name>` in one go.
pub(crate) fn text_element(
    handler: &mut dyn DocumentHandler,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> SignatureResult<()> {
    start(handler, name, attributes)?;
    characters(handler, text)?;
    end(handler, name)
}
