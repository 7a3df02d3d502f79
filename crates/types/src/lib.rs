//! Records shared by every stage of the GenomeGuard upload pipeline.
//!
//! A [`ContentRecord`] describes ciphertext that has been published to the
//! content-addressed store, an [`AttestationRecord`] describes the ledger
//! commitment that references it.

pub mod attestation;
pub mod content;
pub mod endpoint;

pub use attestation::*;
pub use content::*;
pub use endpoint::normalize_base_url;
