//! Splits manual text into chunks for embedding and search.
//!
//! Text is cut into fixed-size character windows that overlap by a fixed
//! amount. PDF pages that cite a figure, or carry almost no text, are kept whole
//! so the figure lookup at query time sees the full page.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::documents::{DocumentKind, Page, SourceDocument};
use crate::figures;

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;
/// PDF pages with fewer characters than this are treated as figure pages.
pub const LOW_TEXT_THRESHOLD: usize = 150;

/// A chunk of text from a manual, with source reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    /// PDF page the chunk came from.
    pub page: Option<u32>,
    /// Index of this chunk within its source (0, 1, 2, …).
    pub index: usize,
    /// Figure citation found on the page, as written (e.g. `Fig. 32-4`).
    pub figure_reference: Option<String>,
    /// Image for `figure_reference`, resolved when the chunk was ingested.
    pub figure_image: Option<PathBuf>,
    /// Page kept whole because it cites a figure or has little text.
    pub low_text: bool,
}

impl Chunk {
    /// Vector-store identifier under the given strategy.
    pub fn id(&self, strategy: IdStrategy) -> String {
        match strategy {
            IdStrategy::Content => content_id(&self.source.to_string_lossy(), self.page, self.index, &self.text),
            IdStrategy::Random => uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// How chunk identifiers are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Hash of source, page, index and normalized text; re-ingesting overwrites in place.
    #[default]
    Content,
    /// Fresh UUID per chunk; every ingest adds new records.
    Random,
}

/// SHA-256 over the source, position and whitespace-normalized text, hex
/// encoded. Identical text at two positions gets two ids.
pub fn content_id(source: &str, page: Option<u32>, index: usize, text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let page = page.map_or_else(String::new, |p| p.to_string());
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(format!("\n{page}\n{index}\n").as_bytes());
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Window size and overlap. `overlap` is always smaller than `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    size: usize,
    overlap: usize,
}

impl ChunkOptions {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkError::InvalidOverlap { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// How a PDF page is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    /// Cites a figure; kept whole and tagged with the citation.
    Figure(String),
    /// Too little text to split; kept whole.
    LowText,
    /// Ordinary page, split into windows.
    Body,
}

pub fn classify_page(text: &str) -> PageKind {
    if let Some(citation) = figures::find_citation(text) {
        return PageKind::Figure(citation);
    }
    if text.trim().chars().count() < LOW_TEXT_THRESHOLD {
        return PageKind::LowText;
    }
    PageKind::Body
}

/// Splits text into windows of at most `size` characters; consecutive windows
/// share exactly `overlap` characters.
pub fn split_text(text: &str, opts: &ChunkOptions) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let step = opts.size - opts.overlap;
    let mut result = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + opts.size).min(chars.len());
        result.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    result
}

/// Chunk a single document.
pub fn chunk_document(doc: &SourceDocument, opts: &ChunkOptions) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in &doc.pages {
        if page.text.trim().is_empty() {
            continue;
        }
        match doc.kind {
            DocumentKind::Text => push_windows(&mut chunks, doc, page, opts),
            DocumentKind::Pdf => match classify_page(&page.text) {
                PageKind::Figure(citation) => {
                    push_whole_page(&mut chunks, doc, page, Some(citation));
                }
                PageKind::LowText => push_whole_page(&mut chunks, doc, page, None),
                PageKind::Body => push_windows(&mut chunks, doc, page, opts),
            },
        }
    }
    chunks
}

/// Chunk all documents. Returns chunks from all documents in order.
pub fn chunk_documents(docs: &[SourceDocument], opts: &ChunkOptions) -> Vec<Chunk> {
    docs.iter().flat_map(|d| chunk_document(d, opts)).collect()
}

fn push_windows(chunks: &mut Vec<Chunk>, doc: &SourceDocument, page: &Page, opts: &ChunkOptions) {
    for text in split_text(&page.text, opts) {
        if text.trim().is_empty() {
            continue;
        }
        chunks.push(Chunk {
            text,
            source: doc.path.clone(),
            page: page.number,
            index: chunks.len(),
            figure_reference: None,
            figure_image: None,
            low_text: false,
        });
    }
}

fn push_whole_page(
    chunks: &mut Vec<Chunk>,
    doc: &SourceDocument,
    page: &Page,
    figure_reference: Option<String>,
) {
    chunks.push(Chunk {
        text: page.text.clone(),
        source: doc.path.clone(),
        page: page.number,
        index: chunks.len(),
        figure_reference,
        figure_image: None,
        low_text: true,
    });
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidOverlap { size: usize, overlap: usize },
}
