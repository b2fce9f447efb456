//! The ODF flavour: one `<Signature>` element per signature, emitted as
//! siblings into the signature stream.

use super::{
    characters, end, start, text_element, ALGO_C14N, ALGO_RSA_SHA1, ALGO_SHA1, NS_DC, NS_XMLDSIG,
};
use crate::error::SignatureResult;
use crate::model::{odf_date_value, ReferenceType, SignatureInformation};
use crate::sax::DocumentHandler;

/// Serialize one signature record into the handler.
pub fn export_signature(
    handler: &mut dyn DocumentHandler,
    info: &SignatureInformation,
) -> SignatureResult<()> {
    let mut signature_attrs: Vec<(&str, &str)> = vec![("xmlns", NS_XMLDSIG)];
    if !info.signature_id.is_empty() {
        signature_attrs.push(("Id", info.signature_id.as_str()));
    }
    start(handler, "Signature", &signature_attrs)?;

    start(handler, "SignedInfo", &[])?;
    start(handler, "CanonicalizationMethod", &[("Algorithm", ALGO_C14N)])?;
    end(handler, "CanonicalizationMethod")?;
    start(handler, "SignatureMethod", &[("Algorithm", ALGO_RSA_SHA1)])?;
    end(handler, "SignatureMethod")?;

    for reference in &info.references {
        let uri = if reference.reference_type == ReferenceType::SameDocument {
            format!("#{}", reference.uri)
        } else {
            reference.uri.clone()
        };
        start(handler, "Reference", &[("URI", uri.as_str())])?;

        if reference.reference_type == ReferenceType::XmlStream {
            // An xml stream is canonicalized before digesting.
            start(handler, "Transforms", &[])?;
            start(handler, "Transform", &[("Algorithm", ALGO_C14N)])?;
            end(handler, "Transform")?;
            end(handler, "Transforms")?;
        }

        start(handler, "DigestMethod", &[("Algorithm", ALGO_SHA1)])?;
        end(handler, "DigestMethod")?;
        text_element(handler, "DigestValue", &[], &reference.digest_value)?;
        end(handler, "Reference")?;
    }
    end(handler, "SignedInfo")?;

    text_element(handler, "SignatureValue", &[], &info.signature_value)?;

    start(handler, "KeyInfo", &[])?;
    start(handler, "X509Data", &[])?;
    start(handler, "X509IssuerSerial", &[])?;
    text_element(handler, "X509IssuerName", &[], &info.x509_issuer_name)?;
    text_element(handler, "X509SerialNumber", &[], &info.x509_serial_number)?;
    end(handler, "X509IssuerSerial")?;
    if !info.x509_certificate.is_empty() {
        text_element(handler, "X509Certificate", &[], &info.x509_certificate)?;
    }
    end(handler, "X509Data")?;
    end(handler, "KeyInfo")?;

    start(handler, "Object", &[])?;
    start(handler, "SignatureProperties", &[])?;

    let target = format!("#{}", info.signature_id);
    start(
        handler,
        "SignatureProperty",
        &[
            ("Id", info.property_id.as_str()),
            ("Target", target.as_str()),
        ],
    )?;
    start(handler, "dc:date", &[("xmlns:dc", NS_DC)])?;
    characters(handler, &odf_date_value(info))?;
    end(handler, "dc:date")?;
    end(handler, "SignatureProperty")?;

    if !info.description.is_empty() {
        start(
            handler,
            "SignatureProperty",
            &[
                ("Id", info.description_property_id.as_str()),
                ("Target", target.as_str()),
            ],
        )?;
        text_element(
            handler,
            "dc:description",
            &[("xmlns:dc", NS_DC)],
            &info.description,
        )?;
        end(handler, "SignatureProperty")?;
    }

    end(handler, "SignatureProperties")?;
    end(handler, "Object")?;
    end(handler, "Signature")
}
