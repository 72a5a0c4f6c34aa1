//! Page-level text extraction from PDF files.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use pdfrag_shared::{Page, PdfRagError, Result};
use regex::Regex;
use tracing::{debug, instrument};

/// Turns a local document file into ordered page texts.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Vec<Page>>;
}

/// [`PageLoader`] backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

#[async_trait]
impl PageLoader for PdfLoader {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let owned: PathBuf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || extract_pages(&owned))
            .await
            .map_err(|e| PdfRagError::parse(format!("PDF extraction task failed: {e}")))??;

        debug!(pages = pages.len(), "PDF pages extracted");
        Ok(pages)
    }
}

fn extract_pages(path: &Path) -> Result<Vec<Page>> {
    // pdf-extract panics on some malformed inputs; surface those as parse errors.
    let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    let raw_pages = match extracted {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            return Err(PdfRagError::parse(format!(
                "failed to read PDF {}: {e}",
                path.display()
            )));
        }
        Err(_) => {
            return Err(PdfRagError::parse(format!(
                "PDF extractor panicked on {}",
                path.display()
            )));
        }
    };

    Ok(raw_pages
        .iter()
        .enumerate()
        .map(|(number, raw)| Page {
            number,
            text: normalize_page_text(raw),
        })
        .collect())
}

/// Collapse extraction noise: CRLF, runs of horizontal whitespace, and
/// more than one blank line in a row.
pub fn normalize_page_text(raw: &str) -> String {
    static HSPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t\x0C\u{00A0}]+").expect("valid regex"));
    static TRAILING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m) +$").expect("valid regex"));
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = HSPACE_RE.replace_all(&text, " ");
    let text = TRAILING_RE.replace_all(&text, "");
    let text = MULTI_BLANK_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}
