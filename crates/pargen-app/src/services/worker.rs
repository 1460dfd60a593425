//! Background worker: claims pending report jobs and runs them to completion.
//!
//! One claimed job fully occupies the worker. The extract → generate →
//! assemble → render → upload chain is strictly sequential; success is
//! recorded only after the rendered document's upload is confirmed, and any
//! error anywhere in the chain records failure with the error's message.
//! There is no job-level retry, no partial resume, and no cancellation once
//! a job is Running.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::pdf::{extract_text_from_pdf, PdfTextError};
use crate::render::{render_report, RenderError};
use crate::report::{assemble_report, ExtractedInputs, InputSlot, OUTPUT_FILE_NAME};
use crate::services::blob_store::{BlobError, BlobKey};
use crate::services::context::AppContext;
use crate::services::generator::GenerateError;
use crate::services::jobs::{ReportJob, ReportJobStatus, ReportJobStoreError};

/// Failure taxonomy for one report job. Every variant aborts the job and is
/// surfaced to the user only as the generic failed-task message; the detail
/// goes to the log and the job record.
#[derive(Debug, Error)]
pub enum ReportJobError {
    #[error("storage error: {0}")]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Extract(#[from] PdfTextError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Poll for pending jobs until shutdown is signalled.
pub async fn run_worker(ctx: Arc<AppContext>, mut shutdown: watch::Receiver<bool>) {
    let poll_interval = Duration::from_millis(ctx.config.worker.poll_interval_ms.max(50));
    info!(poll_ms = poll_interval.as_millis(), "report worker started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = sleep(poll_interval) => {
                drain_pending(&ctx).await;
            }
        }
    }

    info!("report worker stopped");
}

/// Claim and run every currently pending job, oldest first, one at a time.
pub async fn drain_pending(ctx: &AppContext) {
    loop {
        let claimed = match claim_oldest_pending(ctx) {
            Ok(job) => job,
            Err(err) => {
                warn!(error = %err, "failed to poll report job queue");
                return;
            }
        };
        let Some(job) = claimed else {
            return;
        };
        run_claimed_job(ctx, &job).await;
    }
}

fn claim_oldest_pending(ctx: &AppContext) -> Result<Option<ReportJob>, ReportJobStoreError> {
    let mut pending = ctx.jobs.list_by_status(ReportJobStatus::Pending, 64)?;
    if pending.is_empty() {
        return Ok(None);
    }
    pending.sort_by_key(|job| job.created_at_ms);
    let job = pending.remove(0);
    let claimed = ctx
        .jobs
        .update_status(&job.job_id, ReportJobStatus::Running, None)?;
    Ok(Some(claimed))
}

/// Run one already-claimed (Running) job and persist its terminal status.
pub async fn run_claimed_job(ctx: &AppContext, job: &ReportJob) {
    debug_assert!(job.status == ReportJobStatus::Running);
    info!(job_id = job.job_id.as_str(), "report job started");

    match process_job(ctx, job).await {
        Ok(output_key) => {
            let mut record = job.clone();
            record.output_key = Some(output_key.clone());
            record.set_status(ReportJobStatus::Succeeded, None);
            if let Err(err) = ctx.jobs.upsert(&record) {
                warn!(
                    job_id = job.job_id.as_str(),
                    error = %err,
                    "unable to persist succeeded job state"
                );
                return;
            }
            info!(
                job_id = job.job_id.as_str(),
                output_key = output_key.as_str(),
                "report job succeeded"
            );
        }
        Err(err) => fail_job(ctx, job, err.to_string()),
    }
}

fn fail_job(ctx: &AppContext, job: &ReportJob, message: String) {
    warn!(job_id = job.job_id.as_str(), error = %message, "report job failed");
    let mut record = job.clone();
    record.set_status(ReportJobStatus::Failed, Some(message));
    if let Err(err) = ctx.jobs.upsert(&record) {
        warn!(
            job_id = job.job_id.as_str(),
            error = %err,
            "unable to persist failed job state"
        );
    }
}

/// The whole pipeline for one submission. Returns the output object key; the
/// caller records Succeeded only after this returns, i.e. after the upload
/// has been confirmed.
pub async fn process_job(ctx: &AppContext, job: &ReportJob) -> Result<String, ReportJobError> {
    debug_assert_eq!(job.input_keys.len(), InputSlot::COUNT);

    let mut inputs = ExtractedInputs::default();
    for slot in InputSlot::all() {
        let key = BlobKey::new(&job.submission_id, slot.file_name())?;
        let bytes = ctx.blobs.get(&key).await?;
        let text = extract_text_from_pdf(&bytes)?;
        info!(
            job_id = job.job_id.as_str(),
            slot = slot.file_name(),
            bytes = bytes.len(),
            chars = text.len(),
            "extracted input document"
        );
        inputs.insert(slot, text);
    }

    let report = assemble_report(&inputs, ctx.generator.as_ref()).await?;
    let rendered = render_report(&report.cover, &report.toc, &report.body)?;
    debug_assert!(!rendered.is_empty());

    let output_key = BlobKey::new(&job.submission_id, OUTPUT_FILE_NAME)?;
    ctx.blobs.put(&output_key, Bytes::from(rendered)).await?;

    Ok(output_key.object_key())
}
