//! Disk persistence for per-document vector indices (libSQL, offline mode).
//!
//! Every ingested document owns one directory under the stores root, named
//! after its [`DocumentId`]. The directory holds a single libSQL database,
//! `index.db`, containing the chunks, their embeddings, and a metadata row.
//!
//! **Write rules:**
//! - [`IndexStore::save`] writes a fresh staging database next to
//!   `index.db` and renames it into place, so readers see either the
//!   previous index or the complete new one.
//! - Re-ingesting a document id replaces its index; nothing is merged.

mod index;
mod migrations;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use pdfrag_shared::{Chunk, DocumentId, PdfRagError, Result};
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use index::{IndexEntry, SearchHit, VectorIndex};

/// File name of the index database inside a document directory.
pub const INDEX_FILE_NAME: &str = "index.db";

/// Descriptive metadata persisted with an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub document_id: DocumentId,
    pub source_url: String,
    /// SHA-256 of the source PDF bytes, when known.
    pub content_hash: Option<String>,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// IndexStore
// ---------------------------------------------------------------------------

/// Root of the on-disk index layout: `<root>/<document_id>/index.db`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the index for `id`. This is the storage key handed
    /// back to ingestion callers.
    pub fn path_for(&self, id: DocumentId) -> PathBuf {
        self.root.join(id.storage_key())
    }

    /// Whether a complete index has been persisted for `id`.
    pub fn exists(&self, id: DocumentId) -> bool {
        self.path_for(id).join(INDEX_FILE_NAME).is_file()
    }

    /// Persist `index` for `meta.document_id`, replacing any previous index.
    /// Returns the document directory.
    #[instrument(skip_all, fields(document_id = %meta.document_id, chunks = index.len()))]
    pub async fn save(&self, index: &VectorIndex, meta: &IndexMeta) -> Result<PathBuf> {
        let dir = self.path_for(meta.document_id);
        std::fs::create_dir_all(&dir).map_err(|e| PdfRagError::io(&dir, e))?;

        let staging = dir.join(format!("{INDEX_FILE_NAME}.staging-{}", Uuid::now_v7()));
        let target = dir.join(INDEX_FILE_NAME);

        let written = write_index(&staging, index, meta).await;
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }

        std::fs::rename(&staging, &target).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            PdfRagError::io(&target, e)
        })?;

        info!(path = %dir.display(), "index persisted");
        Ok(dir)
    }

    /// Load the persisted index for `id`.
    #[instrument(skip(self))]
    pub async fn load(&self, id: DocumentId) -> Result<(VectorIndex, IndexMeta)> {
        let path = self.path_for(id).join(INDEX_FILE_NAME);
        if !path.is_file() {
            return Err(PdfRagError::not_found(format!(
                "no index stored for document {id} at {}",
                path.display()
            )));
        }

        let db = IndexDb::open_existing(&path).await?;
        let meta = db.read_meta().await?.ok_or_else(|| {
            PdfRagError::Storage(format!("index at {} has no metadata row", path.display()))
        })?;
        let entries = db.read_entries().await?;
        let index = VectorIndex::from_entries(entries)?;

        debug!(chunks = index.len(), dimensions = index.dimensions(), "index loaded");
        Ok((index, meta))
    }
}

async fn write_index(path: &Path, index: &VectorIndex, meta: &IndexMeta) -> Result<()> {
    let db = IndexDb::open(path).await?;
    db.write(index, meta).await?;
    // Close before the caller renames the file.
    drop(db);
    Ok(())
}

// ---------------------------------------------------------------------------
// IndexDb
// ---------------------------------------------------------------------------

/// Handle to one index database file.
struct IndexDb {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl IndexDb {
    /// Open or create the database at `path` and apply migrations.
    async fn open(path: &Path) -> Result<Self> {
        let handle = Self::connect(path).await?;
        handle.run_migrations().await?;
        Ok(handle)
    }

    /// Open a persisted index without touching its schema. The file must
    /// already be at the latest migration.
    async fn open_existing(path: &Path) -> Result<Self> {
        let handle = Self::connect(path).await?;
        let version = handle.get_schema_version().await;
        let latest = migrations::latest_version();
        if version != latest {
            return Err(PdfRagError::Storage(format!(
                "index at {} has schema v{version}, expected v{latest}",
                path.display()
            )));
        }
        Ok(handle)
    }

    async fn connect(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        Ok(Self { db, conn })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                debug!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PdfRagError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Replace the stored chunks and metadata in one transaction.
    async fn write(&self, index: &VectorIndex, meta: &IndexMeta) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        tx.execute("DELETE FROM chunks", params![])
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;
        tx.execute("DELETE FROM index_meta", params![])
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        for (position, entry) in index.entries().iter().enumerate() {
            tx.execute(
                "INSERT INTO chunks (position, page, text, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![
                    position as i64,
                    entry.chunk.page as i64,
                    entry.chunk.text.as_str(),
                    encode_vector(&entry.vector)
                ],
            )
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;
        }

        let created_at = meta.created_at.to_rfc3339();
        tx.execute(
            "INSERT INTO index_meta
                (document_id, source_url, content_hash, embedding_model, dimensions, chunk_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                meta.document_id.0,
                meta.source_url.as_str(),
                meta.content_hash.as_deref(),
                meta.embedding_model.as_str(),
                index.dimensions() as i64,
                index.len() as i64,
                created_at.as_str()
            ],
        )
        .await
        .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn read_meta(&self) -> Result<Option<IndexMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT document_id, source_url, content_hash, embedding_model, dimensions,
                        chunk_count, created_at
                 FROM index_meta LIMIT 1",
                params![],
            )
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(IndexMeta {
                document_id: DocumentId(
                    row.get::<i64>(0)
                        .map_err(|e| PdfRagError::Storage(e.to_string()))?,
                ),
                source_url: row
                    .get::<String>(1)
                    .map_err(|e| PdfRagError::Storage(e.to_string()))?,
                content_hash: row.get::<String>(2).ok(),
                embedding_model: row
                    .get::<String>(3)
                    .map_err(|e| PdfRagError::Storage(e.to_string()))?,
                dimensions: row
                    .get::<i64>(4)
                    .map_err(|e| PdfRagError::Storage(e.to_string()))?
                    as usize,
                chunk_count: row
                    .get::<i64>(5)
                    .map_err(|e| PdfRagError::Storage(e.to_string()))?
                    as usize,
                created_at: {
                    let s: String = row
                        .get(6)
                        .map_err(|e| PdfRagError::Storage(e.to_string()))?;
                    DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| PdfRagError::Storage(format!("invalid date: {e}")))?
                },
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(PdfRagError::Storage(e.to_string())),
        }
    }

    async fn read_entries(&self) -> Result<Vec<IndexEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT page, text, embedding FROM chunks ORDER BY position",
                params![],
            )
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PdfRagError::Storage(e.to_string()))?
        {
            let page = row
                .get::<i64>(0)
                .map_err(|e| PdfRagError::Storage(e.to_string()))?;
            let text = row
                .get::<String>(1)
                .map_err(|e| PdfRagError::Storage(e.to_string()))?;
            let blob = row
                .get::<Vec<u8>>(2)
                .map_err(|e| PdfRagError::Storage(e.to_string()))?;

            entries.push(IndexEntry {
                chunk: Chunk {
                    page: page as usize,
                    text,
                },
                vector: decode_vector(&blob)?,
            });
        }
        Ok(entries)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(PdfRagError::Storage(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> IndexStore {
        IndexStore::new(std::env::temp_dir().join(format!("pdfrag_store_{}", Uuid::now_v7())))
    }

    fn sample_index(texts: &[&str]) -> VectorIndex {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                page: i / 2,
                text: (*t).into(),
            })
            .collect();
        let vectors = (0..texts.len())
            .map(|i| vec![i as f32, 0.5, -(i as f32) * 0.25])
            .collect();
        VectorIndex::build(chunks, vectors).expect("build index")
    }

    fn sample_meta(id: i64, index: &VectorIndex) -> IndexMeta {
        IndexMeta {
            document_id: DocumentId(id),
            source_url: "https://example.com/doc.pdf".into(),
            content_hash: Some("abc123".into()),
            embedding_model: "test-embedder".into(),
            dimensions: index.dimensions(),
            chunk_count: index.len(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let path = std::env::temp_dir().join(format!("pdfrag_test_{}.db", Uuid::now_v7()));
        let db = IndexDb::open(&path).await.expect("open");
        assert_eq!(db.get_schema_version().await, 1);
        drop(db);

        let again = IndexDb::open(&path).await.expect("second open");
        assert_eq!(again.get_schema_version().await, 1);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let store = test_store();
        let index = sample_index(&["alpha", "beta", "gamma"]);
        let meta = sample_meta(42, &index);

        let dir = store.save(&index, &meta).await.expect("save");
        assert!(dir.ends_with("42"));
        assert!(store.exists(DocumentId(42)));

        let (loaded, loaded_meta) = store.load(DocumentId(42)).await.expect("load");
        assert_eq!(loaded, index);
        assert_eq!(loaded_meta.document_id, DocumentId(42));
        assert_eq!(loaded_meta.chunk_count, 3);
        assert_eq!(loaded_meta.dimensions, 3);
        assert_eq!(loaded_meta.content_hash.as_deref(), Some("abc123"));

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn save_overwrites_previous_index() {
        let store = test_store();
        let first = sample_index(&["old one", "old two", "old three"]);
        store.save(&first, &sample_meta(7, &first)).await.unwrap();

        let second = sample_index(&["new"]);
        store.save(&second, &sample_meta(7, &second)).await.unwrap();

        let (loaded, meta) = store.load(DocumentId(7)).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].chunk.text, "new");
        assert_eq!(meta.chunk_count, 1);

        // No staging files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(store.path_for(DocumentId(7)))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("staging"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let store = test_store();
        assert!(!store.exists(DocumentId(99)));

        let err = store.load(DocumentId(99)).await.unwrap_err();
        assert!(matches!(err, PdfRagError::NotFound { .. }));
        // Loading must not create anything.
        assert!(!store.path_for(DocumentId(99)).exists());
    }

    #[tokio::test]
    async fn load_unmigrated_file_is_storage_error() {
        let store = test_store();
        let dir = store.path_for(DocumentId(5));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(INDEX_FILE_NAME);
        std::fs::write(&path, b"").unwrap();

        let err = store.load(DocumentId(5)).await.unwrap_err();
        assert!(matches!(err, PdfRagError::Storage(_)));
        // Loading never writes a schema into the file.
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_loads_see_old_or_new_index() {
        let store = test_store();
        let old = sample_index(&["old one", "old two", "old three"]);
        let new = sample_index(&["new"]);
        store.save(&old, &sample_meta(7, &old)).await.unwrap();

        let writer = {
            let store = store.clone();
            let (old, new) = (old.clone(), new.clone());
            tokio::spawn(async move {
                for round in 0..20 {
                    let next = if round % 2 == 0 { &new } else { &old };
                    store.save(next, &sample_meta(7, next)).await.unwrap();
                }
            })
        };

        let mut loads = 0;
        while !writer.is_finished() || loads == 0 {
            let (loaded, meta) = store.load(DocumentId(7)).await.unwrap();
            assert!(loaded == old || loaded == new);
            assert_eq!(meta.chunk_count, loaded.len());
            loads += 1;
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn vector_blob_roundtrip() {
        let v = vec![1.5_f32, -0.25, 0.0, f32::MAX];
        assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
        assert!(decode_vector(&[0, 1, 2]).is_err());
    }
}
