//! The OOXML flavour, per the [MS-OFFCRYPTO] XAdES subset: a fixed skeleton
//! of same-document references plus a manifest of package streams.

use super::{
    end, start, text_element, ALGO_C14N, ALGO_RELATIONSHIP, ALGO_RSA_SHA256, ALGO_SHA256,
    NS_MDSSI, NS_MSODIGSIG, NS_XD, NS_XMLDSIG,
};
use crate::error::SignatureResult;
use crate::model::{ooxml_time_value, ReferenceType, SignatureInformation};
use crate::relations::parse_relationships;
use crate::sax::DocumentHandler;
use crate::storage::ContainerStorage;

const RELS_CONTENT_TYPE_SUFFIX: &str =
    "?ContentType=application/vnd.openxmlformats-package.relationships+xml";

/// Streams that are intentionally never referenced by a signature.
fn is_stream_blacklisted(stream_name: &str) -> bool {
    const BLACKLIST: [&str; 4] = [
        "/%5BContent_Types%5D.xml",
        "/docProps/app.xml",
        "/docProps/core.xml",
        // Don't attempt to sign other signatures for now.
        "/_xmlsignatures",
    ];
    // Prefix match; the content type part of the stream name is irrelevant.
    BLACKLIST.iter().any(|entry| stream_name.starts_with(entry))
}

/// Relation types that are intentionally left out of relationship
/// transforms.
fn is_relation_blacklisted(relation_type: &str) -> bool {
    const BLACKLIST: [&str; 3] = [
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties",
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
        "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/origin",
    ];
    BLACKLIST.contains(&relation_type)
}

fn in_test_mode() -> bool {
    std::env::var_os("LO_TESTNAME").is_some()
}

/// Serialize one signature record against the root storage (relationship
/// parts are read back while expanding relationship transforms).
pub fn export_ooxml_signature(
    root: &ContainerStorage,
    handler: &mut dyn DocumentHandler,
    info: &SignatureInformation,
) -> SignatureResult<()> {
    start(
        handler,
        "Signature",
        &[("xmlns", NS_XMLDSIG), ("Id", "idPackageSignature")],
    )?;

    start(handler, "SignedInfo", &[])?;
    start(handler, "CanonicalizationMethod", &[("Algorithm", ALGO_C14N)])?;
    end(handler, "CanonicalizationMethod")?;
    start(handler, "SignatureMethod", &[("Algorithm", ALGO_RSA_SHA256)])?;
    end(handler, "SignatureMethod")?;

    for reference in &info.references {
        if reference.reference_type != ReferenceType::SameDocument {
            continue;
        }
        let type_attr = if reference.uri == "idSignedProperties" {
            "http://uri.etsi.org/01903#SignedProperties"
        } else {
            "http://www.w3.org/2000/09/xmldsig#Object"
        };
        let uri = format!("#{}", reference.uri);
        start(
            handler,
            "Reference",
            &[("Type", type_attr), ("URI", uri.as_str())],
        )?;
        if reference.uri == "idSignedProperties" {
            start(handler, "Transforms", &[])?;
            start(handler, "Transform", &[("Algorithm", ALGO_C14N)])?;
            end(handler, "Transform")?;
            end(handler, "Transforms")?;
        }
        start(handler, "DigestMethod", &[("Algorithm", ALGO_SHA256)])?;
        end(handler, "DigestMethod")?;
        text_element(handler, "DigestValue", &[], &reference.digest_value)?;
        end(handler, "Reference")?;
    }
    end(handler, "SignedInfo")?;

    text_element(handler, "SignatureValue", &[], &info.signature_value)?;

    start(handler, "KeyInfo", &[])?;
    start(handler, "X509Data", &[])?;
    text_element(handler, "X509Certificate", &[], &info.x509_certificate)?;
    end(handler, "X509Data")?;
    end(handler, "KeyInfo")?;

    let time_value = ooxml_time_value(info);

    // idPackageObject: the manifest of signed package streams.
    start(handler, "Object", &[("Id", "idPackageObject")])?;
    start(handler, "Manifest", &[])?;
    for reference in &info.references {
        if reference.reference_type == ReferenceType::SameDocument {
            continue;
        }
        if is_stream_blacklisted(&reference.uri) {
            continue;
        }
        start(handler, "Reference", &[("URI", reference.uri.as_str())])?;

        if reference.uri.ends_with(RELS_CONTENT_TYPE_SUFFIX) {
            write_relationship_transform(root, handler, &reference.uri)?;
        }

        start(handler, "DigestMethod", &[("Algorithm", ALGO_SHA256)])?;
        end(handler, "DigestMethod")?;
        text_element(handler, "DigestValue", &[], &reference.digest_value)?;
        end(handler, "Reference")?;
    }
    end(handler, "Manifest")?;

    start(handler, "SignatureProperties", &[])?;
    start(
        handler,
        "SignatureProperty",
        &[("Id", "idSignatureTime"), ("Target", "#idPackageSignature")],
    )?;
    start(handler, "mdssi:SignatureTime", &[("xmlns:mdssi", NS_MDSSI)])?;
    text_element(handler, "mdssi:Format", &[], "YYYY-MM-DDThh:mm:ssTZD")?;
    text_element(handler, "mdssi:Value", &[], &time_value)?;
    end(handler, "mdssi:SignatureTime")?;
    end(handler, "SignatureProperty")?;
    end(handler, "SignatureProperties")?;
    end(handler, "Object")?;

    // idOfficeObject: the legacy SignatureInfoV1 block. Values other than
    // the comment are hardcoded to something valid per [MS-OFFCRYPTO].
    start(handler, "Object", &[("Id", "idOfficeObject")])?;
    start(handler, "SignatureProperties", &[])?;
    start(
        handler,
        "SignatureProperty",
        &[("Id", "idOfficeV1Details"), ("Target", "#idPackageSignature")],
    )?;
    start(handler, "SignatureInfoV1", &[("xmlns", NS_MSODIGSIG)])?;
    text_element(handler, "SetupId", &[], "")?;
    text_element(handler, "SignatureText", &[], "")?;
    text_element(handler, "SignatureImage", &[], "")?;
    text_element(handler, "SignatureComments", &[], &info.description)?;
    text_element(handler, "WindowsVersion", &[], "6.1")?;
    text_element(handler, "OfficeVersion", &[], "16.0")?;
    text_element(handler, "ApplicationVersion", &[], "16.0")?;
    text_element(handler, "Monitors", &[], "1")?;
    text_element(handler, "HorizontalResolution", &[], "1280")?;
    text_element(handler, "VerticalResolution", &[], "800")?;
    text_element(handler, "ColorDepth", &[], "32")?;
    text_element(
        handler,
        "SignatureProviderId",
        &[],
        "{00000000-0000-0000-0000-000000000000}",
    )?;
    text_element(handler, "SignatureProviderUrl", &[], "")?;
    text_element(handler, "SignatureProviderDetails", &[], "9")?;
    text_element(handler, "SignatureType", &[], "1")?;
    end(handler, "SignatureInfoV1")?;
    end(handler, "SignatureProperty")?;
    end(handler, "SignatureProperties")?;
    end(handler, "Object")?;

    // The XAdES qualifying properties. Omitted under test, where the
    // crypto backend cannot be exercised.
    start(handler, "Object", &[])?;
    start(
        handler,
        "xd:QualifyingProperties",
        &[("xmlns:xd", NS_XD), ("Target", "#idPackageSignature")],
    )?;
    if !in_test_mode() {
        start(handler, "xd:SignedProperties", &[("Id", "idSignedProperties")])?;
        start(handler, "xd:SignedSignatureProperties", &[])?;
        text_element(handler, "xd:SigningTime", &[], &time_value)?;
        start(handler, "xd:SigningCertificate", &[])?;
        start(handler, "xd:Cert", &[])?;
        start(handler, "xd:CertDigest", &[])?;
        start(handler, "DigestMethod", &[("Algorithm", ALGO_SHA256)])?;
        end(handler, "DigestMethod")?;
        if info.cert_digest.is_empty() {
            log::warn!("signature {} has no certificate digest", info.security_id);
        }
        text_element(handler, "DigestValue", &[], &info.cert_digest)?;
        end(handler, "xd:CertDigest")?;
        start(handler, "xd:IssuerSerial", &[])?;
        text_element(handler, "X509IssuerName", &[], &info.x509_issuer_name)?;
        text_element(handler, "X509SerialNumber", &[], &info.x509_serial_number)?;
        end(handler, "xd:IssuerSerial")?;
        end(handler, "xd:Cert")?;
        end(handler, "xd:SigningCertificate")?;
        start(handler, "xd:SignaturePolicyIdentifier", &[])?;
        start(handler, "xd:SignaturePolicyImplied", &[])?;
        end(handler, "xd:SignaturePolicyImplied")?;
        end(handler, "xd:SignaturePolicyIdentifier")?;
        end(handler, "xd:SignedSignatureProperties")?;
        end(handler, "xd:SignedProperties")?;
    }
    end(handler, "xd:QualifyingProperties")?;
    end(handler, "Object")?;

    end(handler, "Signature")
}

/// Expand a relationship transform: read the referenced relationships part
/// and emit one `RelationshipReference` per non-blacklisted relation,
/// followed by the C14N transform.
fn write_relationship_transform(
    root: &ContainerStorage,
    handler: &mut dyn DocumentHandler,
    reference_uri: &str,
) -> SignatureResult<()> {
    let mut part_name = reference_uri;
    if let Some(stripped) = part_name.strip_prefix('/') {
        part_name = stripped;
    }
    if let Some(query) = part_name.find('?') {
        part_name = &part_name[..query];
    }

    let bytes = root
        .part(part_name)
        .ok_or_else(|| crate::error::SignatureError::MissingPart(part_name.to_string()))?;
    let relations = parse_relationships(bytes, part_name)?;

    start(handler, "Transforms", &[])?;
    start(handler, "Transform", &[("Algorithm", ALGO_RELATIONSHIP)])?;
    for relation in &relations {
        if is_relation_blacklisted(&relation.type_) {
            continue;
        }
        start(
            handler,
            "mdssi:RelationshipReference",
            &[("xmlns:mdssi", NS_MDSSI), ("SourceId", relation.id.as_str())],
        )?;
        end(handler, "mdssi:RelationshipReference")?;
    }
    end(handler, "Transform")?;
    start(handler, "Transform", &[("Algorithm", ALGO_C14N)])?;
    end(handler, "Transform")?;
    end(handler, "Transforms")?;
    Ok(())
}
