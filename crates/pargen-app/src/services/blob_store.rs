//! Blob storage abstractions.
//!
//! Blobs are addressed by a submission-scoped key (`{submission_id}/{name}`).
//! Each submission owns its own prefix, so concurrent jobs never contend on a
//! key. The filesystem implementation also mints the time-limited retrieval
//! URLs handed out by the results view, signed with a keyed blake3 hash.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

use crate::paths::AppPaths;

/// Minimal metadata returned by `head` about a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: BlobKey,
    pub size_bytes: u64,
}

/// Errors emitted by blob storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("not found")]
    NotFound,

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Io(e.to_string())
    }
}

/// Submission-scoped blob address. Both segments are validated so a key can
/// never escape its submission prefix on a filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKey {
    submission: String,
    name: String,
}

impl BlobKey {
    pub fn new(
        submission: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, BlobError> {
        let submission = submission.into();
        let name = name.into();
        validate_segment(&submission)?;
        validate_segment(&name)?;
        Ok(Self { submission, name })
    }

    pub fn submission(&self) -> &str {
        &self.submission
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical object key: `{submission_id}/{name}`.
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.submission, self.name)
    }
}

fn validate_segment(segment: &str) -> Result<(), BlobError> {
    if segment.is_empty() {
        return Err(BlobError::InvalidKey("empty key segment".to_string()));
    }
    if segment == "." || segment == ".." {
        return Err(BlobError::InvalidKey(segment.to_string()));
    }
    if segment
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(BlobError::InvalidKey(segment.to_string()));
    }
    Ok(())
}

/// Trait abstracting over blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under the key, replacing any existing blob.
    async fn put(&self, key: &BlobKey, bytes: Bytes) -> Result<(), BlobError>;

    /// Return the blob's bytes or `BlobError::NotFound`.
    async fn get(&self, key: &BlobKey) -> Result<Bytes, BlobError>;

    /// Return metadata for the key if present.
    async fn head(&self, key: &BlobKey) -> Result<Option<BlobMeta>, BlobError>;

    /// Delete the blob if present. Returns Ok(true) if deleted.
    async fn delete(&self, key: &BlobKey) -> Result<bool, BlobError>;

    /// Mint a time-limited retrieval URL for the key.
    fn retrieval_url(&self, key: &BlobKey, ttl: Duration) -> Result<String, BlobError>;

    /// Check an expiry timestamp and signature minted by `retrieval_url`.
    fn verify_retrieval(&self, key: &BlobKey, expires_unix: i64, signature_hex: &str) -> bool;
}

/// Context string for deriving the link-signing key from a configured secret.
const SIGNING_KEY_CONTEXT: &str = "pargen 2024-11 download link signing v1";

/// Derive a signing key from a configured secret string.
pub fn derive_signing_key(secret: &str) -> [u8; 32] {
    blake3::derive_key(SIGNING_KEY_CONTEXT, secret.as_bytes())
}

/// Random per-process signing key; links stop verifying after a restart.
pub fn random_signing_key() -> [u8; 32] {
    derive_signing_key(&uuid::Uuid::new_v4().to_string())
}

/// Filesystem blob store rooted at `{data_dir}/blobs/{submission}/{name}`.
///
/// Write strategy: stream to a temp file in the destination directory, then
/// rename over the final path so readers never observe partial writes.
#[derive(Debug, Clone, bon::Builder)]
pub struct FsBlobStore {
    paths: AppPaths,
    #[builder(default = random_signing_key())]
    signing_key: [u8; 32],
}

impl FsBlobStore {
    fn submission_dir(&self, key: &BlobKey) -> Result<PathBuf, BlobError> {
        let mut dir = self
            .paths
            .blobs_base_dir()
            .map_err(|e| BlobError::Io(e.to_string()))?;
        dir.push(key.submission());
        Ok(dir)
    }

    fn blob_path(&self, key: &BlobKey) -> Result<PathBuf, BlobError> {
        Ok(self.submission_dir(key)?.join(key.name()))
    }

    fn sign(&self, key: &BlobKey, expires_unix: i64) -> blake3::Hash {
        let message = format!("{}:{}", key.object_key(), expires_unix);
        blake3::keyed_hash(&self.signing_key, message.as_bytes())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &BlobKey, bytes: Bytes) -> Result<(), BlobError> {
        let dir = self.submission_dir(key)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| BlobError::Io(format!("create submission dir: {e}")))?;

        let temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| BlobError::Io(format!("create temp file: {e}")))?;
        fs::write(temp.path(), bytes.as_ref())
            .await
            .map_err(|e| BlobError::Io(format!("write blob: {e}")))?;

        let final_path = self.blob_path(key)?;
        temp.into_temp_path()
            .persist(&final_path)
            .map_err(|e| BlobError::Io(format!("finalize blob: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<Bytes, BlobError> {
        let path = self.blob_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(BlobError::Io(format!("read blob: {e}"))),
        }
    }

    async fn head(&self, key: &BlobKey) -> Result<Option<BlobMeta>, BlobError> {
        let path = self.blob_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(BlobMeta {
                key: key.clone(),
                size_bytes: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobError::Io(format!("stat blob: {e}"))),
        }
    }

    async fn delete(&self, key: &BlobKey) -> Result<bool, BlobError> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::Io(format!("delete blob: {e}"))),
        }
    }

    fn retrieval_url(&self, key: &BlobKey, ttl: Duration) -> Result<String, BlobError> {
        let expires_unix = current_unix_secs().saturating_add(ttl.as_secs() as i64);
        let signature = self.sign(key, expires_unix);
        Ok(format!(
            "/download_file?submission={}&name={}&expires={}&sig={}",
            key.submission(),
            key.name(),
            expires_unix,
            signature.to_hex()
        ))
    }

    fn verify_retrieval(&self, key: &BlobKey, expires_unix: i64, signature_hex: &str) -> bool {
        if expires_unix < current_unix_secs() {
            return false;
        }
        let Ok(presented) = blake3::Hash::from_hex(signature_hex) else {
            return false;
        };
        // blake3::Hash equality is constant-time.
        self.sign(key, expires_unix) == presented
    }
}

pub(crate) fn current_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsBlobStore) {
        let temp = TempDir::new().expect("temp dir");
        let paths = AppPaths::new(temp.path()).expect("app paths");
        let store = FsBlobStore::builder().paths(paths).build();
        (temp, store)
    }

    #[test]
    fn keys_reject_path_escapes() {
        assert!(BlobKey::new("sub", "Transcript.pdf").is_ok());
        assert!(matches!(
            BlobKey::new("sub", "../escape.pdf"),
            Err(BlobError::InvalidKey(_))
        ));
        assert!(matches!(
            BlobKey::new("a/b", "name.pdf"),
            Err(BlobError::InvalidKey(_))
        ));
        assert!(matches!(BlobKey::new("", "x"), Err(BlobError::InvalidKey(_))));
    }

    #[test]
    fn object_key_is_prefix_scoped() {
        let key = BlobKey::new("abc-123", "generated_par.pdf").expect("valid key");
        assert_eq!(key.object_key(), "abc-123/generated_par.pdf");
    }

    #[tokio::test]
    async fn put_get_head_delete_roundtrip() {
        let (_temp, store) = store();
        let key = BlobKey::new("sub-1", "Transcript.pdf").expect("valid key");

        store
            .put(&key, Bytes::from_static(b"hello world"))
            .await
            .expect("put succeeds");

        let meta = store
            .head(&key)
            .await
            .expect("head succeeds")
            .expect("blob exists");
        assert_eq!(meta.size_bytes, 11);

        let bytes = store.get(&key).await.expect("get succeeds");
        assert_eq!(bytes.as_ref(), b"hello world");

        assert!(store.delete(&key).await.expect("delete succeeds"));
        assert!(store.head(&key).await.expect("head succeeds").is_none());
        assert!(!store.delete(&key).await.expect("second delete succeeds"));
    }

    #[tokio::test]
    async fn zero_length_placeholder_blobs_roundtrip() {
        let (_temp, store) = store();
        let key = BlobKey::new("sub-2", "GAD_Results.pdf").expect("valid key");

        store.put(&key, Bytes::new()).await.expect("put succeeds");
        let meta = store
            .head(&key)
            .await
            .expect("head succeeds")
            .expect("blob exists");
        assert_eq!(meta.size_bytes, 0);
        assert!(store.get(&key).await.expect("get succeeds").is_empty());
    }

    #[tokio::test]
    async fn put_replaces_existing_blob() {
        let (_temp, store) = store();
        let key = BlobKey::new("sub-3", "Transcript.pdf").expect("valid key");

        store
            .put(&key, Bytes::from_static(b"first"))
            .await
            .expect("first put");
        store
            .put(&key, Bytes::from_static(b"second"))
            .await
            .expect("second put");
        assert_eq!(store.get(&key).await.expect("get").as_ref(), b"second");
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let (_temp, store) = store();
        let key = BlobKey::new("sub-4", "absent.pdf").expect("valid key");
        assert!(matches!(store.get(&key).await, Err(BlobError::NotFound)));
    }

    #[test]
    fn retrieval_url_verifies_until_expiry() {
        let (_temp, store) = store();
        let key = BlobKey::new("sub-5", "generated_par.pdf").expect("valid key");

        let url = store
            .retrieval_url(&key, Duration::from_secs(3600))
            .expect("url minted");
        assert!(url.starts_with("/download_file?submission=sub-5"));

        let expires: i64 = extract_param(&url, "expires").parse().expect("expiry int");
        let sig = extract_param(&url, "sig");

        assert!(store.verify_retrieval(&key, expires, &sig));
        assert!(!store.verify_retrieval(&key, expires - 1, &sig), "tampered expiry");
        assert!(
            !store.verify_retrieval(&key, current_unix_secs() - 10, &sig),
            "expired link"
        );

        let other = BlobKey::new("sub-6", "generated_par.pdf").expect("valid key");
        assert!(!store.verify_retrieval(&other, expires, &sig), "wrong key");
    }

    #[test]
    fn signatures_differ_across_signing_keys() {
        let temp = TempDir::new().expect("temp dir");
        let paths = AppPaths::new(temp.path()).expect("app paths");
        let a = FsBlobStore::builder()
            .paths(paths.clone())
            .signing_key(derive_signing_key("alpha"))
            .build();
        let b = FsBlobStore::builder()
            .paths(paths)
            .signing_key(derive_signing_key("beta"))
            .build();

        let key = BlobKey::new("sub", "generated_par.pdf").expect("valid key");
        let url = a.retrieval_url(&key, Duration::from_secs(60)).expect("url");
        let expires: i64 = extract_param(&url, "expires").parse().expect("expiry int");
        let sig = extract_param(&url, "sig");

        assert!(a.verify_retrieval(&key, expires, &sig));
        assert!(!b.verify_retrieval(&key, expires, &sig));
    }

    fn extract_param(url: &str, name: &str) -> String {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{name}=")))
            .unwrap_or_default()
            .to_string()
    }
}
