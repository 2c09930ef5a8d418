//! Storage layer: persisted index artifacts.
//!
//! An index lives in three files sharing one path prefix:
//! `<prefix>.embeddings.bin`, `<prefix>.metadatas.jsonl`, `<prefix>.texts.jsonl`.
//! Line/row `i` of each file describes the same chunk.

pub mod models;

use models::{Chunk, ChunkMeta, IndexSnapshot};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const MAGIC: &[u8; 4] = b"RVIX";
const VERSION: u32 = 2;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 20 + DIGEST_LEN;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    prefix: PathBuf,
}

impl ArtifactStore {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.with_suffix("embeddings.bin")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.with_suffix("metadatas.jsonl")
    }

    pub fn texts_path(&self) -> PathBuf {
        self.with_suffix("texts.jsonl")
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s = self.prefix.as_os_str().to_owned();
        s.push(".");
        s.push(suffix);
        PathBuf::from(s)
    }

    fn all_paths(&self) -> [PathBuf; 3] {
        [self.vectors_path(), self.metadata_path(), self.texts_path()]
    }

    /// True only when all three artifacts exist.
    pub fn is_complete(&self) -> bool {
        self.all_paths().iter().all(|p| p.is_file())
    }

    /// Write all three artifacts. Each file is written to a temporary sibling
    /// and renamed into place, the vector file last. Its header carries a
    /// digest of the text and metadata files, so `read` rejects any set whose
    /// files come from different writes.
    pub fn write(&self, snapshot: &IndexSnapshot) -> Result<(), StorageError> {
        let mut texts = Vec::new();
        for chunk in &snapshot.chunks {
            serde_json::to_writer(&mut texts, &chunk.text)?;
            texts.push(b'\n');
        }
        let mut metas = Vec::new();
        for chunk in &snapshot.chunks {
            serde_json::to_writer(&mut metas, &chunk.meta)?;
            metas.push(b'\n');
        }
        let vectors = encode_vectors(snapshot, &content_digest(&texts, &metas));

        write_atomic(&self.texts_path(), &texts)?;
        write_atomic(&self.metadata_path(), &metas)?;
        write_atomic(&self.vectors_path(), &vectors)?;
        debug!(
            prefix = %self.prefix.display(),
            rows = snapshot.chunks.len(),
            "index artifacts written"
        );
        Ok(())
    }

    /// Read the artifacts back. Missing, partial, misaligned or undecodable
    /// artifacts all yield `Ok(None)`: the caller rebuilds.
    pub fn read(&self) -> Result<Option<IndexSnapshot>, StorageError> {
        let present: Vec<bool> = self.all_paths().iter().map(|p| p.is_file()).collect();
        if present.iter().all(|p| !p) {
            debug!(prefix = %self.prefix.display(), "no index artifacts");
            return Ok(None);
        }
        if present.iter().any(|p| !p) {
            warn!(prefix = %self.prefix.display(), "partial index artifacts, ignoring");
            return Ok(None);
        }

        let Some(decoded) = decode_vectors(&fs::read(self.vectors_path())?) else {
            warn!(path = %self.vectors_path().display(), "undecodable vector artifact");
            return Ok(None);
        };
        let meta_bytes = fs::read(self.metadata_path())?;
        let text_bytes = fs::read(self.texts_path())?;
        if content_digest(&text_bytes, &meta_bytes) != decoded.digest {
            warn!(prefix = %self.prefix.display(), "index artifacts from different writes, ignoring");
            return Ok(None);
        }
        let DecodedVectors {
            backend,
            dims,
            vectors,
            ..
        } = decoded;

        let metas: Vec<ChunkMeta> = match parse_lines(&String::from_utf8_lossy(&meta_bytes)) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "undecodable metadata artifact");
                return Ok(None);
            }
        };
        let texts: Vec<String> = match parse_lines(&String::from_utf8_lossy(&text_bytes)) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "undecodable text artifact");
                return Ok(None);
            }
        };

        if metas.len() != vectors.len() || texts.len() != vectors.len() {
            warn!(
                vectors = vectors.len(),
                metadatas = metas.len(),
                texts = texts.len(),
                "index artifacts out of alignment, ignoring"
            );
            return Ok(None);
        }

        let chunks = texts
            .into_iter()
            .zip(metas)
            .map(|(text, meta)| Chunk { text, meta })
            .collect();
        Ok(Some(IndexSnapshot {
            backend,
            dims,
            vectors,
            chunks,
        }))
    }

    /// Remove every artifact that exists.
    pub fn clear(&self) -> Result<(), StorageError> {
        for p in self.all_paths() {
            if p.is_file() {
                fs::remove_file(p)?;
            }
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn parse_lines<T: serde::de::DeserializeOwned>(content: &str) -> Result<Vec<T>, serde_json::Error> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// blake3 over the text artifact then the metadata artifact, each length-prefixed.
fn content_digest(texts: &[u8], metas: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(texts.len() as u64).to_le_bytes());
    hasher.update(texts);
    hasher.update(&(metas.len() as u64).to_le_bytes());
    hasher.update(metas);
    *hasher.finalize().as_bytes()
}

struct DecodedVectors {
    backend: String,
    dims: usize,
    digest: [u8; DIGEST_LEN],
    vectors: Vec<Vec<f32>>,
}

// Layout: magic, version, rows, dims, backend length (u32 LE each after the
// magic), 32-byte content digest, backend name bytes, then rows*dims f32 LE.
fn encode_vectors(snapshot: &IndexSnapshot, digest: &[u8; DIGEST_LEN]) -> Vec<u8> {
    let backend = snapshot.backend.as_bytes();
    let mut out =
        Vec::with_capacity(HEADER_LEN + backend.len() + snapshot.vectors.len() * snapshot.dims * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(snapshot.vectors.len() as u32).to_le_bytes());
    out.extend_from_slice(&(snapshot.dims as u32).to_le_bytes());
    out.extend_from_slice(&(backend.len() as u32).to_le_bytes());
    out.extend_from_slice(digest);
    out.extend_from_slice(backend);
    for v in &snapshot.vectors {
        for x in v {
            out.extend_from_slice(&x.to_le_bytes());
        }
    }
    out
}

fn decode_vectors(bytes: &[u8]) -> Option<DecodedVectors> {
    let read_u32 = |at: usize| -> Option<u32> {
        let b = bytes.get(at..at + 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    };
    if bytes.get(0..4)? != MAGIC || read_u32(4)? != VERSION {
        return None;
    }
    let rows = read_u32(8)? as usize;
    let dims = read_u32(12)? as usize;
    let name_len = read_u32(16)? as usize;
    let digest: [u8; DIGEST_LEN] = bytes.get(20..HEADER_LEN)?.try_into().ok()?;
    let body_start = HEADER_LEN.checked_add(name_len)?;
    let backend = String::from_utf8(bytes.get(HEADER_LEN..body_start)?.to_vec()).ok()?;
    let body = bytes.get(body_start..)?;
    if body.len() != rows.checked_mul(dims)?.checked_mul(4)? {
        return None;
    }
    let vectors = if dims == 0 {
        vec![Vec::new(); rows]
    } else {
        body.chunks_exact(dims * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect()
    };
    Some(DecodedVectors {
        backend,
        dims,
        digest,
        vectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> IndexSnapshot {
        IndexSnapshot {
            backend: "seeded".to_string(),
            dims: 3,
            vectors: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.6, 0.8]],
            chunks: vec![
                Chunk {
                    text: "first line\nsecond line".to_string(),
                    meta: ChunkMeta::new("ref/a.md", 0).with("type", "md"),
                },
                Chunk {
                    text: "other".to_string(),
                    meta: ChunkMeta::new("ref/b.txt", 0).with("pages", 3i64),
                },
            ],
        }
    }

    #[test]
    fn write_then_read_reproduces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested/vector"));
        let snap = snapshot();
        store.write(&snap).unwrap();
        assert!(store.is_complete());
        let back = store.read().unwrap().expect("artifacts present");
        assert_eq!(back, snap);
    }

    #[test]
    fn partial_artifacts_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector"));
        store.write(&snapshot()).unwrap();
        fs::remove_file(store.texts_path()).unwrap();
        assert!(!store.is_complete());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn misaligned_artifacts_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector"));
        store.write(&snapshot()).unwrap();
        fs::write(store.texts_path(), "\"only one\"\n").unwrap();
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn same_size_rewrite_without_vectors_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector"));
        store.write(&snapshot()).unwrap();
        let old_vectors = fs::read(store.vectors_path()).unwrap();

        let mut rebuilt = snapshot();
        rebuilt.chunks[0].text = "new X".to_string();
        rebuilt.chunks[1].text = "new Y".to_string();
        store.write(&rebuilt).unwrap();
        // Vector file from the earlier write, text and metadata from the later one.
        fs::write(store.vectors_path(), &old_vectors).unwrap();

        assert!(store.is_complete());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn edited_metadata_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector"));
        store.write(&snapshot()).unwrap();
        let metas = fs::read_to_string(store.metadata_path()).unwrap();
        fs::write(store.metadata_path(), metas.replace("ref/a.md", "ref/z.md")).unwrap();
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn truncated_vectors_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector"));
        store.write(&snapshot()).unwrap();
        let bytes = fs::read(store.vectors_path()).unwrap();
        fs::write(store.vectors_path(), &bytes[..bytes.len() - 2]).unwrap();
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn missing_artifacts_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector"));
        assert!(store.read().unwrap().is_none());
        store.clear().unwrap();
    }
}
