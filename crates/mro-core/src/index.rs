//! Ingestion pipeline: scan → chunk → embed → upsert, one chunk at a time.
//!
//! A run is all-or-nothing: the first failing call aborts it. With content ids a
//! rerun after a failure overwrites what was already written; with random ids it
//! adds duplicates.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chunks::{chunk_documents, ChunkError, ChunkOptions, IdStrategy};
use crate::documents::{scan_documents, ScanError};
use crate::embedding::{Embedder, InputKind};
use crate::error::{ErrorClass, ServiceError};
use crate::figures::{FigureCatalog, FigureError};
use crate::store::{ChunkMetadata, IndexStats, VectorRecord, VectorStore};
use crate::watcher::{watch_documents, WatchError};

/// Settings for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub namespace: String,
    pub chunking: ChunkOptions,
    pub id_strategy: IdStrategy,
    /// Folder with figure images; `None` skips figure resolution.
    pub images_dir: Option<PathBuf>,
}

impl IngestOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            chunking: ChunkOptions::default(),
            id_strategy: IdStrategy::default(),
            images_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Chunks kept whole because their page cites a figure.
    pub figure_pages: usize,
    /// Figure chunks whose image was found in the catalog.
    pub figures_resolved: usize,
}

/// Runs the full pipeline over `root` and writes every chunk to `store`.
pub async fn ingest(
    root: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    opts: &IngestOptions,
) -> Result<IngestReport, IndexError> {
    let docs = scan_documents(root)?;
    let catalog = match &opts.images_dir {
        Some(dir) => FigureCatalog::build(dir)?,
        None => FigureCatalog::default(),
    };
    let mut chunks = chunk_documents(&docs, &opts.chunking);
    info!(documents = docs.len(), chunks = chunks.len(), "loaded and split documents");

    let mut report = IngestReport {
        documents: docs.len(),
        chunks: chunks.len(),
        ..IngestReport::default()
    };
    for chunk in &mut chunks {
        if let Some(citation) = &chunk.figure_reference {
            report.figure_pages += 1;
            match catalog.resolve(citation) {
                Some(image) => {
                    chunk.figure_image = Some(image.to_path_buf());
                    report.figures_resolved += 1;
                }
                None => debug!(%citation, source = %chunk.source.display(), "no image for figure"),
            }
        }
    }

    for chunk in &chunks {
        let values = embedder.embed(&chunk.text, InputKind::Document).await?;
        let record = VectorRecord {
            id: chunk.id(opts.id_strategy),
            values,
            metadata: ChunkMetadata::from(chunk),
        };
        debug!(id = %record.id, source = %chunk.source.display(), page = ?chunk.page, "upserting chunk");
        store.upsert(&opts.namespace, vec![record]).await?;
    }
    Ok(report)
}

/// Top-level ingestion driver: logs progress, and logs any failure before
/// handing it back to the caller.
pub async fn setup_index(
    root: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    opts: &IngestOptions,
) -> Result<IngestReport, IndexError> {
    info!(dir = %root.display(), namespace = %opts.namespace, "indexing documents");
    match ingest(root, embedder, store, opts).await {
        Ok(report) => {
            info!(
                documents = report.documents,
                chunks = report.chunks,
                figure_pages = report.figure_pages,
                "indexing completed successfully"
            );
            Ok(report)
        }
        Err(e) => {
            error!(error = %e, "an error occurred during the indexing process");
            Err(e)
        }
    }
}

/// Reads index statistics and reports whether `namespace` holds any vectors.
pub async fn verify_index(store: &dyn VectorStore, namespace: &str) -> Result<IndexStats, IndexError> {
    let stats = store.describe_stats().await?;
    info!(total = stats.total_vector_count, "index contains vectors");
    match stats.namespaces.get(namespace) {
        Some(0) | None if stats.total_vector_count == 0 => {
            warn!("the index is empty; check the document ingestion process");
        }
        Some(0) | None => warn!(namespace, "namespace holds no vectors"),
        Some(count) => info!(namespace, count, "namespace ready"),
    }
    Ok(stats)
}

/// Ingests `root`, then re-ingests every time something under it changes.
/// Runs until the watcher stops.
pub async fn watch_and_ingest(
    root: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    opts: &IngestOptions,
) -> Result<(), IndexError> {
    if opts.id_strategy == IdStrategy::Random {
        warn!("random chunk ids: every re-ingest adds duplicate records");
    }
    setup_index(root, embedder, store, opts).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = watch_documents(root, tx)?;
    info!(dir = %root.display(), "watching for changes");
    while let Some(paths) = rx.recv().await {
        // Drain bursts so one save triggers one run.
        let mut changed = paths.len();
        while let Ok(more) = rx.try_recv() {
            changed += more.len();
        }
        info!(changed, "documents changed, re-ingesting");
        if let Err(e) = setup_index(root, embedder, store, opts).await {
            if e.class() == ErrorClass::Configuration {
                return Err(e);
            }
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("figure catalog error: {0}")]
    Figures(#[from] FigureError),
    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),
}

impl IndexError {
    pub fn class(&self) -> ErrorClass {
        match self {
            IndexError::Scan(ScanError::NotADirectory(_))
            | IndexError::Chunk(_)
            | IndexError::Watch(_) => ErrorClass::Configuration,
            IndexError::Scan(_) | IndexError::Figures(_) => ErrorClass::Data,
            IndexError::Service(_) => ErrorClass::Service,
        }
    }
}
