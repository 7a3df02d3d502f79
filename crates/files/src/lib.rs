//! GenomeGuard content publishing
//!
//! Publishes encrypted payloads to IPFS through a pinning service, reads them
//! back through HTTP gateways, and keeps a local fallback store so uploads
//! still succeed without credentials or connectivity.

pub mod errors;
pub mod fallback;
pub mod gateway;
pub mod pinning;
pub mod publisher;

pub use errors::{PublishError, Result};
pub use fallback::{fallback_content_id, FallbackStore, FallbackTier, DEFAULT_FALLBACK_QUOTA_BYTES};
pub use gateway::{ContentGateway, HttpGateway, DEFAULT_GATEWAY_URL, PUBLIC_GATEWAY_URL};
pub use pinning::{
    PinMetadata, PinataClient, PinataMetadata, PinnedFile, PinningService,
    DEFAULT_PINNING_API_URL, UPLOAD_FILE_NAME,
};
pub use publisher::{ContentPublisher, PinOutcome, PinningPublisher, PublishMetadata, DEFAULT_PIN_NAME};
