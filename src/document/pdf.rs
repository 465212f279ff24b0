//! PDF text extraction
//!
//! Page text comes from `pdf-extract`; this module only decides how the
//! pages are stitched back together.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfExtractError {
    #[error("{0}")]
    Extraction(String),
}

/// Produces the text of every page of a PDF, in page order
pub trait PageTextExtractor: Send + Sync {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, PdfExtractError>;
}

/// Extractor backed by the `pdf-extract` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PageTextExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, PdfExtractError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf)
            .map_err(|e| PdfExtractError::Extraction(e.to_string()))?;
        log::debug!("Extracted text from {} PDF pages", pages.len());
        Ok(pages)
    }
}

/// Join page texts with a newline between pages and trim the result
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(page.as_ref());
    }
    text.trim().to_string()
}
