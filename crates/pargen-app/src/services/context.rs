//! Process-wide collaborators, constructed explicitly at startup and injected
//! into the server and worker. No ambient globals: tests substitute fakes by
//! building the context by hand.

use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::paths::{AppPaths, PathError};
use crate::services::blob_store::{derive_signing_key, BlobStore, FsBlobStore};
use crate::services::generator::{GenerateError, OpenAiGenerator, TextGenerator};
use crate::services::jobs::{ReportJobStore, ReportJobStoreError};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Jobs(#[from] Box<ReportJobStoreError>),
    #[error(transparent)]
    Generator(#[from] GenerateError),
}

impl From<ReportJobStoreError> for ContextError {
    fn from(e: ReportJobStoreError) -> Self {
        ContextError::Jobs(Box::new(e))
    }
}

/// Shared application context for one process.
pub struct AppContext {
    pub paths: AppPaths,
    pub config: AppConfig,
    pub blobs: Arc<dyn BlobStore>,
    pub jobs: Arc<ReportJobStore>,
    pub generator: Arc<dyn TextGenerator>,
}

/// Wire the production collaborators: filesystem blob store, LMDB job store,
/// and the chat-completions generator (API key from the environment).
pub fn build_context(config: AppConfig) -> Result<AppContext, ContextError> {
    let paths = AppPaths::new(&config.storage.path)?;

    let signing_key = config
        .server
        .url_signing_secret
        .as_deref()
        .map(derive_signing_key);
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::builder()
            .paths(paths.clone())
            .maybe_signing_key(signing_key)
            .build(),
    );

    let jobs = Arc::new(ReportJobStore::open(&paths)?);
    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::from_env(&config.generator)?);

    Ok(AppContext {
        paths,
        config,
        blobs,
        jobs,
        generator,
    })
}
