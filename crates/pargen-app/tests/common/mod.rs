//! Shared test doubles and context wiring for the integration specs.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use pargen_app::config::{
    AppConfig, GeneratorConfig, ServerConfig, StorageConfig, WorkerConfig,
};
use pargen_app::paths::AppPaths;
use pargen_app::services::blob_store::{derive_signing_key, BlobStore, FsBlobStore};
use pargen_app::services::context::AppContext;
use pargen_app::services::generator::{GenerateError, GenerationRequest, TextGenerator};
use pargen_app::services::jobs::ReportJobStore;

/// Scripted generator double: returns `RESPONSE-<n>` for the n-th call and
/// records every request so specs can assert ordering and prompt contents.
pub struct MockGenerator {
    pub fail_on_call: Option<usize>,
    pub calls: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn scripted() -> Arc<Self> {
        Arc::new(Self {
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_on(call: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on_call: Some(call),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn recorded_calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn response_for(call: usize) -> String {
        format!("RESPONSE-{call}")
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerateError> {
        let call = {
            let mut calls = self.calls.lock().expect("calls lock");
            calls.push(request);
            calls.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(GenerateError::Rejected {
                status: 402,
                message: "insufficient quota".to_string(),
            });
        }
        Ok(Self::response_for(call))
    }
}

pub fn test_config(temp: &TempDir) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            url_signing_secret: Some("spec-secret".to_string()),
        },
        storage: StorageConfig {
            path: temp.path().to_path_buf(),
        },
        generator: GeneratorConfig {
            api_base_url: "http://127.0.0.1:1".to_string(),
            model: "test-model".to_string(),
            request_timeout_secs: 5,
            max_retries: 0,
            min_retry_delay_ms: 1,
        },
        worker: WorkerConfig {
            poll_interval_ms: 25,
        },
    }
}

/// Build an app context over a temp directory with the supplied generator.
pub fn test_context(temp: &TempDir, generator: Arc<dyn TextGenerator>) -> AppContext {
    let config = test_config(temp);
    let paths = AppPaths::new(&config.storage.path).expect("app paths");
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::builder()
            .paths(paths.clone())
            .signing_key(derive_signing_key("spec-secret"))
            .build(),
    );
    let jobs = Arc::new(ReportJobStore::open(&paths).expect("open job store"));

    AppContext {
        paths,
        config,
        blobs,
        jobs,
        generator,
    }
}
