#![forbid(unsafe_code)]

//! XML-DSig signature management for office containers.
//!
//! The crate creates, enumerates, verifies and removes XML digital
//! signatures over a ZIP-like container document, in two wire formats: the
//! ODF flat signature stream (`META-INF/documentsignatures.xml`) and the
//! OOXML signature sub-storage (`_xmlsignatures/` plus relationship
//! bookkeeping). Reading runs a streaming SAX pipeline that dynamically
//! splices an event-buffering stage into the chain while signature
//! elements are collected.
//!
//! Cryptographic primitives stay outside: certificate parsing, signature
//! algorithms and canonicalization are the embedder's, wired in through
//! [`crypto::SignatureVerifier`] and the pre-parsed [`Certificate`]
//! fields. This crate orchestrates them and owns the serialization.

pub mod chain;
pub mod crypto;
pub mod error;
pub mod export;
pub mod keeper;
pub mod manager;
pub mod model;
pub mod sax;
pub mod storage;
pub mod store;

mod reader;
mod relations;

pub use chain::{ComponentsStatus, ConnectAction, SaxChainController, StageLink};
pub use crypto::{SignatureVerifier, StructuralVerifier};
pub use error::{SignatureError, SignatureResult};
pub use manager::DocumentSignatureManager;
pub use model::{
    Certificate, ReferenceType, SignatureInformation, SignatureMode, SignatureReference,
    SignatureStatus, StorageFormat,
};
pub use storage::ContainerStorage;
pub use store::SignatureStore;
