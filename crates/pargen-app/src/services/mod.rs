//! Orchestration layer for IO-bound services.
//!
//! Modules exposed here coordinate external systems (storage, text
//! generation, job persistence). Pure transforms live in `crate::pdf`,
//! `crate::render`, and `crate::report`.

pub mod blob_store;
pub mod context;
pub mod generator;
pub mod jobs;
pub mod worker;

pub use blob_store::{
    derive_signing_key, BlobError, BlobKey, BlobMeta, BlobStore, FsBlobStore,
};
pub use context::{build_context, AppContext, ContextError};
pub use generator::{GenerateError, GenerationRequest, OpenAiGenerator, TextGenerator};
pub use jobs::{ReportJob, ReportJobStatus, ReportJobStore, ReportJobStoreError};
pub use worker::{drain_pending, process_job, run_claimed_job, run_worker, ReportJobError};
