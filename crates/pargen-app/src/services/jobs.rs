use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bincode::config;
use bincode::error::{DecodeError, EncodeError};
use bincode::serde::{decode_from_slice, encode_to_vec};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::{AppPaths, PathError};

const JOB_ENV_MAP_SIZE_BYTES: usize = 1 << 26; // 64 MiB

/// Lifecycle state of a report-generation job.
///
/// Pending → Running → {Succeeded, Failed}. There are no intermediate states,
/// no job-level retry, and no cancellation once Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportJobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Metadata persisted for every report job. The job id doubles as the
/// submission id: one submission enqueues exactly one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportJob {
    pub job_id: String,
    pub submission_id: String,
    /// Input slot file name → object key in the blob store.
    pub input_keys: BTreeMap<String, String>,
    pub status: ReportJobStatus,
    /// Object key of the rendered document; set only on success, after the
    /// upload is confirmed.
    pub output_key: Option<String>,
    /// Failure payload: the message of whichever step errored.
    pub error: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ReportJob {
    #[must_use]
    pub fn new(submission_id: impl Into<String>, input_keys: BTreeMap<String, String>) -> Self {
        let submission_id = submission_id.into();
        debug_assert!(!submission_id.is_empty());
        let now_ms = current_timestamp_ms();
        Self {
            job_id: submission_id.clone(),
            submission_id,
            input_keys,
            status: ReportJobStatus::Pending,
            output_key: None,
            error: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn set_status(&mut self, status: ReportJobStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.updated_at_ms = current_timestamp_ms();
    }
}

pub(crate) fn current_timestamp_ms() -> i64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    since_epoch.as_millis() as i64
}

/// Errors emitted by the report job store.
#[derive(Debug, Error)]
pub enum ReportJobStoreError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Heed(#[from] heed::Error),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("job `{0}` already exists")]
    Duplicate(String),
    #[error("job `{0}` not found")]
    NotFound(String),
}

/// LMDB-backed persistence for report jobs.
#[derive(Debug)]
pub struct ReportJobStore {
    env: Env,
    jobs: Database<Str, Bytes>,
}

impl ReportJobStore {
    pub fn open(paths: &AppPaths) -> Result<Self, ReportJobStoreError> {
        let path = paths.jobs_lmdb_dir()?;
        debug_assert!(path.exists());

        let mut options = EnvOpenOptions::new();
        options.max_dbs(4);
        options.map_size(JOB_ENV_MAP_SIZE_BYTES);
        let env = unsafe {
            // SAFETY: LMDB requires callers to uphold environment lifetime invariants.
            options.open(&path)?
        };
        let jobs = {
            let rtxn = env.read_txn()?;
            let opened = env.open_database::<Str, Bytes>(&rtxn, Some("jobs"))?;
            drop(rtxn);
            match opened {
                Some(existing) => existing,
                None => {
                    let mut wtxn = env.write_txn()?;
                    let db = env.create_database::<Str, Bytes>(&mut wtxn, Some("jobs"))?;
                    wtxn.commit()?;
                    db
                }
            }
        };
        Ok(Self { env, jobs })
    }

    /// Persist a new pending job. Enqueuing the same submission twice is a
    /// caller bug and is rejected.
    pub fn enqueue(&self, job: &ReportJob) -> Result<(), ReportJobStoreError> {
        debug_assert!(!job.job_id.is_empty());
        debug_assert!(job.status == ReportJobStatus::Pending);

        let mut wtxn = self.env.write_txn()?;
        if self.jobs.get(&wtxn, job.job_id.as_str())?.is_some() {
            return Err(ReportJobStoreError::Duplicate(job.job_id.clone()));
        }
        let encoded = encode_to_vec(job, config::standard())?;
        self.jobs
            .put(&mut wtxn, job.job_id.as_str(), encoded.as_slice())?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<ReportJob>, ReportJobStoreError> {
        debug_assert!(!job_id.is_empty());
        let rtxn = self.env.read_txn()?;
        let value = self.jobs.get(&rtxn, job_id)?;
        if let Some(raw) = value {
            let (job, _) = decode_from_slice::<ReportJob, _>(raw, config::standard())?;
            Ok(Some(job))
        } else {
            Ok(None)
        }
    }

    pub fn update_status(
        &self,
        job_id: &str,
        status: ReportJobStatus,
        error: Option<String>,
    ) -> Result<ReportJob, ReportJobStoreError> {
        debug_assert!(!job_id.is_empty());
        let mut wtxn = self.env.write_txn()?;
        let existing = self.jobs.get(&wtxn, job_id)?;
        let Some(raw) = existing else {
            return Err(ReportJobStoreError::NotFound(job_id.to_string()));
        };
        let (mut job, _) = decode_from_slice::<ReportJob, _>(raw, config::standard())?;
        job.set_status(status, error);
        let encoded = encode_to_vec(&job, config::standard())?;
        self.jobs.put(&mut wtxn, job_id, encoded.as_slice())?;
        wtxn.commit()?;
        Ok(job)
    }

    pub fn upsert(&self, job: &ReportJob) -> Result<(), ReportJobStoreError> {
        debug_assert!(!job.job_id.is_empty());
        let mut wtxn = self.env.write_txn()?;
        let encoded = encode_to_vec(job, config::standard())?;
        self.jobs
            .put(&mut wtxn, job.job_id.as_str(), encoded.as_slice())?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn list_by_status(
        &self,
        status: ReportJobStatus,
        limit: usize,
    ) -> Result<Vec<ReportJob>, ReportJobStoreError> {
        debug_assert!(limit > 0);
        let rtxn = self.env.read_txn()?;
        let iter = self.jobs.iter(&rtxn)?;
        let mut out = Vec::new();
        for entry in iter {
            let (_, raw) = entry?;
            let (job, _) = decode_from_slice::<ReportJob, _>(raw, config::standard())?;
            if job.status != status {
                continue;
            }
            out.push(job);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    pub fn count_by_status(
        &self,
        status: ReportJobStatus,
    ) -> Result<usize, ReportJobStoreError> {
        let rtxn = self.env.read_txn()?;
        let iter = self.jobs.iter(&rtxn)?;
        let mut count = 0_usize;
        for entry in iter {
            let (_, raw) = entry?;
            let (job, _) = decode_from_slice::<ReportJob, _>(raw, config::standard())?;
            if job.status == status {
                count = count.saturating_add(1);
            }
        }
        Ok(count)
    }
}
