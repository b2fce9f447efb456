//! The seam towards the cryptographic backend.
//!
//! Signature algorithms, canonicalization and certificate chain validation
//! live outside this crate. The manager only needs a verifier that delivers
//! per-signature outcomes through a callback, plus the two certificate
//! encodings it serializes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::model::{SignatureInformation, SignatureStatus};

/// Verification backend. Outcomes are delivered asynchronously through
/// `resolve`, keyed by the record's SecurityId; callers route them into the
/// store.
pub trait SignatureVerifier {
    fn verify(
        &mut self,
        info: &SignatureInformation,
        resolve: &mut dyn FnMut(u32, SignatureStatus),
    );
}

/// Structural default used when no cryptographic backend is wired in: a
/// signature that parsed with at least one reference is reported intact,
/// anything else malformed. Real verdicts need a real backend.
#[derive(Debug, Default)]
pub struct StructuralVerifier;

impl SignatureVerifier for StructuralVerifier {
    fn verify(
        &mut self,
        info: &SignatureInformation,
        resolve: &mut dyn FnMut(u32, SignatureStatus),
    ) {
        let status = if info.references.is_empty() {
            SignatureStatus::MalformedDigitalSignature
        } else {
            SignatureStatus::OperationSucceeded
        };
        resolve(info.security_id, status);
    }
}

/// Base64 of the DER certificate, as written into `<X509Certificate>`.
pub(crate) fn encode_certificate(der: &[u8]) -> String {
    BASE64.encode(der)
}

/// Base64 SHA-256 thumbprint of the DER certificate.
pub(crate) fn sha256_thumbprint(der: &[u8]) -> String {
    BASE64.encode(Sha256::digest(der))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn thumbprint_is_base64_of_sha256() {
        // SHA-256 of the empty input, base64 encoded.
        assert_eq!(
            sha256_thumbprint(b""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn structural_verifier_flags_reference_free_signatures() {
        let mut verifier = StructuralVerifier;
        let mut outcomes = Vec::new();
        let info = SignatureInformation::new(7);
        verifier.verify(&info, &mut |id, status| outcomes.push((id, status)));
        assert_eq!(
            outcomes,
            vec![(7, SignatureStatus::MalformedDigitalSignature)]
        );
    }
}
