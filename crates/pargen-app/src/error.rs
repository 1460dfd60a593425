//! Application-level error type shared across the binary and services.

use thiserror::Error;

use crate::config::AppConfigError;
use crate::paths::PathError;
use crate::pdf::PdfTextError;
use crate::render::RenderError;
use crate::server::ServerError;
use crate::services::blob_store::BlobError;
use crate::services::context::ContextError;
use crate::services::generator::GenerateError;
use crate::services::jobs::ReportJobStoreError;
use crate::services::worker::ReportJobError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] AppConfigError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Paths(#[from] PathError),
    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobError),
    #[error(transparent)]
    Jobs(#[from] Box<ReportJobStoreError>),
    #[error(transparent)]
    Pdf(#[from] PdfTextError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Job(#[from] ReportJobError),
}

impl From<ReportJobStoreError> for AppError {
    fn from(e: ReportJobStoreError) -> Self {
        AppError::Jobs(Box::new(e))
    }
}
