use std::fs;
use std::path::{Path, PathBuf};

use tokio::task::JoinError;
use tracing::debug;

use crate::rchain::documents::Document;
use crate::rchain::loaders::{DocumentLoader, LoaderError};

/// Loads a PDF as one document per page.
///
/// Metadata carries `source` (the path as given) and `page` (zero-based).
/// Pages with no extractable text are skipped.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    path: PathBuf,
}

impl PdfLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentLoader for PdfLoader {
    async fn load(&self) -> Result<Vec<Document>, LoaderError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_path(&path))
            .await
            .map_err(|err| LoaderError::Pdf {
                path: self.path.clone(),
                message: join_failure(err),
            })?
    }
}

fn load_path(path: &Path) -> Result<Vec<Document>, LoaderError> {
    let bytes = fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|err| LoaderError::Pdf {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    debug!(path = %path.display(), pages = pages.len(), "pdf parsed");

    let documents = pages_to_documents(&path.to_string_lossy(), pages);
    if documents.is_empty() {
        return Err(LoaderError::NoText {
            path: path.to_path_buf(),
        });
    }
    Ok(documents)
}

/// The parser panics on some malformed files; the panic text becomes the error message.
fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("parser crashed ({detail})")
}

fn pages_to_documents(source: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .filter_map(|(index, text)| {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(
                Document::new(text)
                    .with_metadata("source", source)
                    .with_metadata("page", index),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::pages_to_documents;
    use serde_json::json;

    #[test]
    fn blank_pages_are_skipped_but_keep_numbering() {
        let docs = pages_to_documents(
            "report.pdf",
            vec![
                "  Intro page\n".to_string(),
                " \n\n".to_string(),
                "Results".to_string(),
            ],
        );

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page_content, "Intro page");
        assert_eq!(docs[0].metadata["page"], json!(0));
        assert_eq!(docs[1].page_content, "Results");
        assert_eq!(docs[1].metadata["page"], json!(2));
        assert_eq!(docs[1].metadata_str("source"), Some("report.pdf"));
    }
}
