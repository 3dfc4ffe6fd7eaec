//! Discovering manuals in a user-chosen directory and extracting their text.
//!
//! Plain-text files are read whole. PDFs are read page by page so that figure
//! pages can be recognised later.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md"];
const PDF_EXTENSION: &str = "pdf";

/// A manual we found: its path and the text of each page.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number; `None` for plain-text files.
    pub number: Option<u32>,
    pub text: String,
}

impl SourceDocument {
    /// A plain-text document with a single unnumbered page.
    pub fn text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: DocumentKind::Text,
            pages: vec![Page {
                number: None,
                text: text.into(),
            }],
        }
    }

    /// Total extracted characters across pages.
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

/// Scans `root` for text and PDF files and returns their extracted text,
/// sorted by path. Does not follow symlinks into directories (walkdir default).
pub fn scan_documents(root: &Path) -> Result<Vec<SourceDocument>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let mut docs = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| ScanError::Walk(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match extension(path).as_deref() {
            Some(ext) if TEXT_EXTENSIONS.contains(&ext) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ScanError::Read(path.to_path_buf(), e))?;
                docs.push(SourceDocument::text(path, text));
            }
            Some(PDF_EXTENSION) => {
                let pages = extract_pdf_pages(path)?;
                debug!(path = %path.display(), pages = pages.len(), "extracted pdf");
                docs.push(SourceDocument {
                    path: path.to_path_buf(),
                    kind: DocumentKind::Pdf,
                    pages,
                });
            }
            _ => debug!(path = %path.display(), "skipping unsupported file"),
        }
    }
    Ok(docs)
}

/// Extracts the text of every page of a PDF, in page order.
pub fn extract_pdf_pages(path: &Path) -> Result<Vec<Page>, ScanError> {
    let doc = lopdf::Document::load(path).map_err(|e| ScanError::Pdf(path.to_path_buf(), e))?;
    let mut pages = Vec::new();
    for number in doc.get_pages().into_keys() {
        let text = doc
            .extract_text(&[number])
            .map_err(|e| ScanError::Pdf(path.to_path_buf(), e))?;
        pages.push(Page {
            number: Some(number),
            text,
        });
    }
    Ok(pages)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse PDF {0}: {1}")]
    Pdf(PathBuf, lopdf::Error),
}

#[cfg(test)]
pub(crate) mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    use super::*;

    /// Writes a PDF with one page per entry of `pages`, each a single line of text.
    pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn scan_reads_text_and_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Torque the bolts.").unwrap();
        std::fs::write(dir.path().join("notes.bin"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join(".cache").join("hidden.txt"), "ignored").unwrap();
        write_pdf(
            &dir.path().join("b.pdf"),
            &["Landing gear overview", "See Fig. 32-4", "Retraction test"],
        );

        let docs = scan_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind, DocumentKind::Text);
        assert_eq!(docs[0].pages[0].text, "Torque the bolts.");
        assert_eq!(docs[0].pages[0].number, None);

        let pdf = &docs[1];
        assert_eq!(pdf.kind, DocumentKind::Pdf);
        assert_eq!(pdf.pages.len(), 3);
        assert_eq!(pdf.pages[1].number, Some(2));
        assert!(pdf.pages[1].text.contains("Fig. 32-4"));
    }

    #[test]
    fn scan_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(scan_documents(&file), Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn malformed_pdf_propagates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pdf"), "not a pdf").unwrap();
        assert!(matches!(scan_documents(dir.path()), Err(ScanError::Pdf(..))));
    }
}
