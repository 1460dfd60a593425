//! Web server entrypoints: upload intake, job polling, and report download.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::report::{InputSlot, OUTPUT_FILE_NAME};
use crate::services::blob_store::BlobKey;
use crate::services::context::AppContext;
use crate::services::jobs::{ReportJob, ReportJobStatus};
use crate::services::worker::run_worker;

const SESSION_COOKIE: &str = "pargen_session";
const UPLOAD_FIELD: &str = "assessment_files";
const ALLOWED_EXTENSIONS: &[&str] = &["pdf"];
const DOWNLOAD_LINK_TTL: Duration = Duration::from_secs(3600);
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
/// Fixed user-visible text for any job-level failure; details go to the log.
const FAILED_TASK_MESSAGE: &str = "Report generation failed. Please submit a new request.";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listen address may not be empty")]
    EmptyListenAddr,
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to determine local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

/// Build the full application router over the shared context.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/processing", get(processing))
        .route("/results", get(results))
        .route("/download_file", get(download_file))
        .route("/test_s3", get(storage_probe))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve HTTP and run the embedded report worker until shutdown.
pub async fn serve(ctx: AppContext) -> Result<(), ServerError> {
    debug_assert!(ctx.config.server.listen_addr.len() <= 128);

    let listen_addr = parse_listen_addr(&ctx.config.server.listen_addr)?;
    let listener = bind_listener(listen_addr).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    info!(%local_addr, "pargen server listening");

    let ctx = Arc::new(ctx);
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(Arc::clone(&ctx), worker_shutdown_rx));

    let app = build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .map_err(|source| ServerError::Serve { source })?;

    let _ = worker_shutdown_tx.send(true);
    let _ = worker.await;
    info!("server shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to capture Ctrl+C signal");
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("shutdown requested via Ctrl+C"),
        _ = sigterm => info!("shutdown requested via SIGTERM"),
    }
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ServerError::EmptyListenAddr);
    }

    trimmed
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: trimmed.to_string(),
            source,
        })
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })
}

async fn index() -> Html<String> {
    let slot_list = InputSlot::all()
        .map(|slot| format!("<li>{}</li>", slot.file_name()))
        .collect::<String>();
    Html(format!(
        "<!DOCTYPE html><html><head><title>Psychological Assessment Report</title></head><body>\
         <h1>Upload assessment documents</h1>\
         <p>Required document names (any missing slot is filled with a blank placeholder):</p>\
         <ul>{slot_list}</ul>\
         <form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"{UPLOAD_FIELD}\" multiple accept=\".pdf\">\
         <button type=\"submit\">Generate report</button>\
         </form></body></html>"
    ))
}

async fn submit(State(ctx): State<Arc<AppContext>>, mut multipart: Multipart) -> Response {
    let submission_id = uuid::Uuid::new_v4().to_string();
    info!(submission_id = submission_id.as_str(), "submission received");

    let mut uploaded: std::collections::BTreeMap<String, String> = Default::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                warn!(%error, "malformed multipart payload");
                return plain_error(StatusCode::BAD_REQUEST, "Malformed upload payload");
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if original_name.is_empty() {
            continue;
        }
        if !allowed_file(&original_name) {
            warn!(file = original_name.as_str(), "disallowed upload extension");
            return plain_error(
                StatusCode::BAD_REQUEST,
                &format!("Invalid file: {original_name}"),
            );
        }
        let Some(file_name) = sanitize_file_name(&original_name) else {
            return plain_error(
                StatusCode::BAD_REQUEST,
                &format!("Invalid file: {original_name}"),
            );
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, file = file_name.as_str(), "failed to read upload body");
                return plain_error(StatusCode::BAD_REQUEST, "Malformed upload payload");
            }
        };

        let key = match BlobKey::new(&submission_id, &file_name) {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, file = file_name.as_str(), "rejected upload name");
                return plain_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid file: {original_name}"),
                );
            }
        };
        if let Err(error) = ctx.blobs.put(&key, bytes).await {
            error!(%error, key = key.object_key().as_str(), "failed to store upload");
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload");
        }
        // Verify the upload landed before relying on it.
        match ctx.blobs.head(&key).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                error!(key = key.object_key().as_str(), "upload verification failed");
                return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload");
            }
        }
        info!(key = key.object_key().as_str(), "stored uploaded file");
        uploaded.insert(file_name, key.object_key());
    }

    // Fill every missing required slot with a zero-length placeholder blob
    // before the job is enqueued.
    let mut input_keys = std::collections::BTreeMap::new();
    for slot in InputSlot::all() {
        let file_name = slot.file_name();
        if let Some(object_key) = uploaded.get(file_name) {
            input_keys.insert(file_name.to_string(), object_key.clone());
            continue;
        }
        let key = match BlobKey::new(&submission_id, file_name) {
            Ok(key) => key,
            Err(error) => {
                error!(%error, slot = file_name, "invalid placeholder key");
                return plain_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("Failed to create blank file for: {file_name}"),
                );
            }
        };
        if let Err(error) = ctx.blobs.put(&key, Bytes::new()).await {
            error!(%error, slot = file_name, "failed to create placeholder blob");
            return plain_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to create blank file for: {file_name}"),
            );
        }
        info!(key = key.object_key().as_str(), "created placeholder blob");
        input_keys.insert(file_name.to_string(), key.object_key());
    }
    debug_assert_eq!(input_keys.len(), InputSlot::COUNT);

    let job = ReportJob::new(&submission_id, input_keys);
    if let Err(error) = ctx.jobs.enqueue(&job) {
        error!(%error, submission_id = submission_id.as_str(), "failed to enqueue report job");
        return plain_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An error occurred while processing your request. Please try again later.",
        );
    }
    info!(job_id = job.job_id.as_str(), "report job enqueued");

    let mut response = Redirect::to("/processing").into_response();
    match session_cookie_value(&submission_id) {
        Some(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        None => plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to start session"),
    }
}

async fn processing(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    let Some(submission_id) = session_from_headers(&headers) else {
        return Redirect::to("/").into_response();
    };

    match ctx.jobs.get(&submission_id) {
        Ok(Some(job)) => match job.status {
            ReportJobStatus::Pending | ReportJobStatus::Running => {
                processing_page().into_response()
            }
            ReportJobStatus::Succeeded => Redirect::to("/results").into_response(),
            ReportJobStatus::Failed => {
                error!(
                    job_id = job.job_id.as_str(),
                    error = job.error.as_deref().unwrap_or("unknown"),
                    "reporting failed job to user"
                );
                plain_error(StatusCode::INTERNAL_SERVER_ERROR, FAILED_TASK_MESSAGE)
            }
        },
        Ok(None) => Redirect::to("/").into_response(),
        Err(error) => {
            error!(%error, submission_id = submission_id.as_str(), "failed to read job state");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, FAILED_TASK_MESSAGE)
        }
    }
}

async fn results(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    let Some(submission_id) = session_from_headers(&headers) else {
        return Redirect::to("/").into_response();
    };

    let job = match ctx.jobs.get(&submission_id) {
        Ok(Some(job)) => job,
        Ok(None) => return Redirect::to("/").into_response(),
        Err(error) => {
            error!(%error, submission_id = submission_id.as_str(), "failed to read job state");
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, FAILED_TASK_MESSAGE);
        }
    };
    if job.status != ReportJobStatus::Succeeded {
        return Redirect::to("/processing").into_response();
    }

    let key = match BlobKey::new(&submission_id, OUTPUT_FILE_NAME) {
        Ok(key) => key,
        Err(error) => {
            error!(%error, "invalid output key");
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, FAILED_TASK_MESSAGE);
        }
    };
    match ctx.blobs.head(&key).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(key = key.object_key().as_str(), "report not yet visible in storage");
            return Redirect::to("/processing").into_response();
        }
        Err(error) => {
            error!(%error, "failed to check report in storage");
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "An error occurred");
        }
    }

    match ctx.blobs.retrieval_url(&key, DOWNLOAD_LINK_TTL) {
        Ok(url) => results_page(&url).into_response(),
        Err(error) => {
            error!(%error, "failed to mint retrieval link");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, "An error occurred")
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    submission: String,
    name: String,
    expires: i64,
    sig: String,
}

async fn download_file(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let key = match BlobKey::new(&params.submission, &params.name) {
        Ok(key) => key,
        Err(_) => return plain_error(StatusCode::BAD_REQUEST, "Invalid download link"),
    };
    if !ctx.blobs.verify_retrieval(&key, params.expires, &params.sig) {
        return plain_error(StatusCode::FORBIDDEN, "Download link invalid or expired");
    }

    match ctx.blobs.get(&key).await {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
            headers.insert(
                CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=generated_par.pdf"),
            );
            (headers, bytes).into_response()
        }
        Err(crate::services::blob_store::BlobError::NotFound) => {
            plain_error(StatusCode::NOT_FOUND, "Report not found")
        }
        Err(error) => {
            error!(%error, "failed to stream report");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Error downloading file")
        }
    }
}

/// Storage connectivity probe. The route name is part of the external
/// contract even though the backend is trait-abstracted.
async fn storage_probe(State(ctx): State<Arc<AppContext>>) -> Response {
    let key = match BlobKey::new("connectivity-probe", "probe.pdf") {
        Ok(key) => key,
        Err(error) => {
            error!(%error, "invalid probe key");
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage probe failed");
        }
    };
    match ctx.blobs.head(&key).await {
        Ok(_) => (StatusCode::OK, "Successfully connected to storage backend").into_response(),
        Err(error) => {
            error!(%error, "storage probe failed");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage probe failed")
        }
    }
}

fn processing_page() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html><html><head><title>Processing</title>\
         <meta http-equiv=\"refresh\" content=\"3\"></head><body>\
         <h1>Generating your report</h1>\
         <p>This page refreshes automatically. Generation can take several minutes.</p>\
         </body></html>",
    )
}

fn results_page(download_url: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><title>Report ready</title></head><body>\
         <h1>Your report is ready</h1>\
         <p><a href=\"{download_url}\">Download report</a> (link valid for one hour)</p>\
         </body></html>"
    ))
}

fn plain_error(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

fn session_cookie_value(submission_id: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={submission_id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        pair.trim()
            .strip_prefix(SESSION_COOKIE)?
            .strip_prefix('=')
            .map(str::to_string)
    })
}

fn allowed_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Keep only the final path component, restricted to a conservative
/// character set, mirroring the usual secure-filename treatment.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect::<String>();
    if base.is_empty() || base.chars().all(|c| c == '.') {
        None
    } else {
        Some(base)
    }
}
