//! Figure citations found in manual text and the image files they point at.
//!
//! The catalog is an explicit citation → image table built when documents are
//! ingested. It is derived from the image file names (`fig32-4.png` answers
//! `Fig. 32-4`), optionally overridden by a `figures.yaml` manifest in the image
//! folder:
//!
//! ```yaml
//! "Fig. 32-4": main-gear-actuator.png
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

pub const MANIFEST_FILENAME: &str = "figures.yaml";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfig(?:ure|\.)?\s*\d+(?:-\d+)*").expect("citation regex is valid")
});

/// First figure citation in `text`, as written.
pub fn find_citation(text: &str) -> Option<String> {
    CITATION.find(text).map(|m| m.as_str().to_string())
}

/// Normalized lookup key: lower case, punctuation (except `-`) and whitespace removed.
/// `Fig. 32-4` → `fig32-4`.
pub fn citation_key(citation: &str) -> String {
    citation
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Validated citation key → image path table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FigureCatalog {
    entries: BTreeMap<String, PathBuf>,
}

impl FigureCatalog {
    /// Builds the catalog from the images in `dir`. A missing directory gives an
    /// empty catalog.
    pub fn build(dir: &Path) -> Result<Self, FigureError> {
        let mut entries = BTreeMap::new();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no figure directory");
            return Ok(Self { entries });
        }
        for entry in std::fs::read_dir(dir).map_err(|e| FigureError::Read(dir.to_path_buf(), e))? {
            let path = entry.map_err(|e| FigureError::Read(dir.to_path_buf(), e))?.path();
            if !is_image(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                entries.insert(citation_key(stem), path.clone());
            }
        }

        let manifest = dir.join(MANIFEST_FILENAME);
        if manifest.is_file() {
            let raw = std::fs::read_to_string(&manifest)
                .map_err(|e| FigureError::Read(manifest.clone(), e))?;
            let mapping: BTreeMap<String, String> = serde_yaml::from_str(&raw)
                .map_err(|e| FigureError::Manifest(manifest.clone(), e))?;
            for (citation, file) in mapping {
                let path = dir.join(&file);
                if path.is_file() {
                    entries.insert(citation_key(&citation), path);
                } else {
                    warn!(%citation, file = %path.display(), "figure manifest points at a missing file");
                }
            }
        }
        debug!(dir = %dir.display(), figures = entries.len(), "built figure catalog");
        Ok(Self { entries })
    }

    pub fn resolve(&self, citation: &str) -> Option<&Path> {
        self.entries.get(&citation_key(citation)).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum FigureError {
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("invalid figure manifest {0}: {1}")]
    Manifest(PathBuf, serde_yaml::Error),
}
