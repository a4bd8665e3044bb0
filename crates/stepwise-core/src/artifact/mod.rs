//! Stage artifacts between the Object Store and an activity's workspace.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::service::{ObjectStoreClient, ObjectStoreError};

const GZ_SUFFIX: &str = ".gz";

/// A file materialized under `store/output/` after a command run, ready for
/// upload: `(relative-key, content-hash, byte-length, bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Slash-separated key, relative to `store/output/`, independent of host OS.
    pub key: String,
    /// Hex-encoded SHA-256 digest of the uncompressed payload.
    pub content_hash: String,
    /// Length in bytes of the uncompressed payload.
    pub byte_length: u64,
    /// The bytes actually uploaded (compressed if gzip mode is on).
    pub bytes: Vec<u8>,
}

/// A blob downloaded from the Object Store, staged into `store/input/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// Errors from staging operations.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("object store error: {0}")]
    Store(#[from] ObjectStoreError),

    #[error("io error staging {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress artifact {key}: {source}")]
    Gunzip {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compress artifact {key}: {source}")]
    Gzip {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads input artifacts into a workspace and uploads output artifacts
/// produced by a command run, keyed by the owning activity's uid.
pub struct ArtifactStager<'a> {
    store: &'a dyn ObjectStoreClient,
    gzip: bool,
}

impl<'a> ArtifactStager<'a> {
    pub fn new(store: &'a dyn ObjectStoreClient, gzip: bool) -> Self {
        Self { store, gzip }
    }

    /// List all keys under `uid`'s prefix; for each, materialize the blob
    /// under `input_dir`, creating parent directories as needed. Gzip-coded
    /// keys (`.gz` suffix) are decompressed and the suffix stripped.
    #[instrument(skip(self, input_dir), fields(uid))]
    pub async fn stage_in(&self, uid: &str, input_dir: &Path) -> Result<Vec<Blob>, StageError> {
        let keys = self.store.list_keys(uid).await?;
        let mut blobs = Vec::with_capacity(keys.len());

        for key in keys {
            let raw = self.store.get(uid, &key).await?;

            let (relative_key, bytes) = if self.gzip {
                let stripped = key.strip_suffix(GZ_SUFFIX).unwrap_or(&key).to_string();
                let decoded = gunzip(&key, &raw)?;
                (stripped, decoded)
            } else {
                (key.clone(), raw)
            };

            let dest = input_dir.join(relative_key_to_path(&relative_key));
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|source| StageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&dest, &bytes).map_err(|source| StageError::Io {
                path: dest.clone(),
                source,
            })?;

            debug!(%uid, key = %relative_key, bytes = bytes.len(), "staged in artifact");
            blobs.push(Blob {
                key: relative_key,
                bytes,
            });
        }

        Ok(blobs)
    }

    /// Walk `output_dir` depth-first for regular files (hidden files
    /// included), compute `(key, sha256, len, bytes)` for each, optionally
    /// gzip-encode, and upload under `uid`'s prefix in discovered order. An
    /// empty output directory uploads zero artifacts; this is not an error.
    #[instrument(skip(self, output_dir), fields(uid))]
    pub async fn stage_out(&self, uid: &str, output_dir: &Path) -> Result<Vec<Artifact>, StageError> {
        let mut artifacts = Vec::new();

        let mut entries: Vec<_> = walkdir::WalkDir::new(output_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        for entry in entries {
            let relative = entry
                .path()
                .strip_prefix(output_dir)
                .expect("walkdir yields paths under output_dir");
            let key = path_to_relative_key(relative);

            let payload = fs::read(entry.path()).map_err(|source| StageError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;

            let mut hasher = Sha256::new();
            hasher.update(&payload);
            let content_hash = hex::encode(hasher.finalize());
            let byte_length = payload.len() as u64;

            let (upload_key, upload_bytes) = if self.gzip {
                (format!("{key}{GZ_SUFFIX}"), gzip(&key, &payload)?)
            } else {
                (key.clone(), payload)
            };

            self.store.put(uid, &upload_key, upload_bytes.clone()).await?;

            debug!(%uid, %key, byte_length, "staged out artifact");
            artifacts.push(Artifact {
                key,
                content_hash,
                byte_length,
                bytes: upload_bytes,
            });
        }

        Ok(artifacts)
    }
}

fn gunzip(key: &str, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|source| StageError::Gunzip {
            key: key.to_string(),
            source,
        })?;
    Ok(out)
}

fn gzip(key: &str, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|source| StageError::Gzip {
            key: key.to_string(),
            source,
        })?;
    encoder.finish().map_err(|source| StageError::Gzip {
        key: key.to_string(),
        source,
    })
}

fn relative_key_to_path(key: &str) -> PathBuf {
    key.split('/').collect()
}

fn path_to_relative_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::InMemoryObjectStore;
    use std::fs;

    #[tokio::test]
    async fn stage_in_verbatim_when_gzip_off() {
        let store = InMemoryObjectStore::new();
        store.put("uid-1", "a/b.txt", b"hello".to_vec()).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let stager = ArtifactStager::new(&store, false);
        let blobs = stager.stage_in("uid-1", dir.path()).await.unwrap();

        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].key, "a/b.txt");
        assert_eq!(fs::read(dir.path().join("a/b.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn stage_in_decodes_and_strips_gz_suffix() {
        let store = InMemoryObjectStore::new();
        let compressed = gzip("a.txt", b"world").unwrap();
        store.put("uid-2", "a.txt.gz", compressed).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let stager = ArtifactStager::new(&store, true);
        let blobs = stager.stage_in("uid-2", dir.path()).await.unwrap();

        assert_eq!(blobs[0].key, "a.txt");
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"world");
    }

    #[tokio::test]
    async fn stage_out_empty_dir_uploads_nothing() {
        let store = InMemoryObjectStore::new();
        let dir = tempfile::tempdir().unwrap();
        let stager = ArtifactStager::new(&store, false);

        let artifacts = stager.stage_out("uid-3", dir.path()).await.unwrap();
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn stage_out_hashes_and_uploads_verbatim() {
        let store = InMemoryObjectStore::new();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("result.txt"), b"payload").unwrap();

        let stager = ArtifactStager::new(&store, false);
        let artifacts = stager.stage_out("uid-4", dir.path()).await.unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].key, "result.txt");
        assert_eq!(artifacts[0].byte_length, 7);

        let mut hasher = Sha256::new();
        hasher.update(b"payload");
        assert_eq!(artifacts[0].content_hash, hex::encode(hasher.finalize()));

        let uploaded = store.get("uid-4", "result.txt").await.unwrap();
        assert_eq!(uploaded, b"payload");
    }

    #[tokio::test]
    async fn stage_out_gzips_and_suffixes_key() {
        let store = InMemoryObjectStore::new();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("result.txt"), b"payload").unwrap();

        let stager = ArtifactStager::new(&store, true);
        let artifacts = stager.stage_out("uid-5", dir.path()).await.unwrap();

        assert_eq!(artifacts[0].key, "result.txt");
        let uploaded = store.get("uid-5", "result.txt.gz").await.unwrap();
        assert_eq!(gunzip("result.txt", &uploaded).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn stage_out_includes_hidden_files() {
        let store = InMemoryObjectStore::new();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".hidden"), b"secret").unwrap();

        let stager = ArtifactStager::new(&store, false);
        let artifacts = stager.stage_out("uid-6", dir.path()).await.unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].key, ".hidden");
    }

    #[tokio::test]
    async fn gzip_roundtrip_through_stage_out_then_stage_in() {
        let store = InMemoryObjectStore::new();
        let out_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(out_dir.path().join("nested")).unwrap();
        fs::write(out_dir.path().join("nested/data.bin"), b"binary-content").unwrap();

        let stager = ArtifactStager::new(&store, true);
        stager.stage_out("uid-7", out_dir.path()).await.unwrap();

        let in_dir = tempfile::tempdir().unwrap();
        let blobs = stager.stage_in("uid-7", in_dir.path()).await.unwrap();

        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].key, "nested/data.bin");
        assert_eq!(blobs[0].bytes, b"binary-content");
    }
}
