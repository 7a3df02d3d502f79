//! GenomeGuard upload pipeline.
//!
//! Wires the key store, encryption engine, content publisher, attestation
//! client and analysis backend into one [`Orchestrator`].

pub mod backend;
pub mod config;
pub mod context;
pub mod errors;
pub mod file;
pub mod orchestrator;
pub mod progress;

pub use backend::{BackendAttestation, BackendClient, BackendReceipt, HttpBackendClient};
pub use config::{AppConfig, BackendSettings, LedgerSettings, PinningSettings, WalletSettings};
pub use context::PipelineContext;
pub use errors::*;
pub use file::{FileSource, UploadFile, ACCEPTED_EXTENSION, MAX_UPLOAD_BYTES};
pub use orchestrator::{Orchestrator, UploadOutcome, UploadSession};
pub use progress::{ProgressReporter, TracingProgress, UploadStage};
