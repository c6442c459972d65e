//! Shared types and utilities for the Pagesmith publishing daemon.
//!
//! This crate carries everything the daemon needs that does not touch the
//! network: the wire/domain types, environment configuration, the error
//! catalog, repository-identity resolution, attachment decoding, content
//! building, and the backoff schedule shared by retry loops.

pub mod config;
pub mod content;
pub mod errors;
pub mod retry;
pub mod slug;
pub mod types;

pub use config::{ConfigError, DaemonConfig};
pub use content::{
    DataUriError, DecodeOutcome, DecodedAttachment, FileSet, build_file_set, decode_data_uri,
    is_data_uri,
};
pub use errors::{NotifyError, ProviderError};
pub use retry::BackoffSchedule;
pub use slug::RepoSlug;
pub use types::{
    Attachment, ConfirmationRequest, EvaluationPayload, PendingKey, RemoteRepo, TaskRequest,
    TaskResponse,
};
