//! PDF text extraction for uploaded assessment documents.

use std::env;
use std::path::{Path, PathBuf};

use pdfium_render::prelude::{Pdfium, PdfiumError};
use thiserror::Error;

/// Errors emitted while extracting text from PDF documents.
#[derive(Debug, Error)]
pub enum PdfTextError {
    #[error("failed to load Pdfium runtime: {0}")]
    Library(#[from] PdfiumError),

    #[error("failed to load PDF document: {0}")]
    Document(#[source] PdfiumError),

    #[error("failed to extract text for page {page_index}: {source}")]
    PageText {
        page_index: usize,
        #[source]
        source: PdfiumError,
    },
}

/// Extracts UTF-8 text from a PDF byte slice, page by page, joined with `\n`.
///
/// Zero-length input is the placeholder-blob case and yields an empty string
/// rather than a parse error; documents with no pages do the same. A parse
/// failure on non-empty bytes is unrecoverable and propagates to the caller.
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String, PdfTextError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }

    let pdfium = load_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(PdfTextError::Document)?;

    let mut pages = Vec::with_capacity(document.pages().len() as usize);
    for (page_index, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|source| PdfTextError::PageText { page_index, source })?;
        pages.push(text.all());
    }

    Ok(pages.join("\n"))
}

fn load_pdfium() -> Result<Pdfium, PdfiumError> {
    if let Some(result) = try_bind_from_env("PDFIUM_LIBRARY_PATH") {
        return result;
    }

    for var in ["PDFIUM_LIB_DIR", "PDFIUM_DYNAMIC_LIB_PATH"] {
        if let Some(result) = try_bind_from_env(var) {
            if result.is_ok() {
                return result;
            }
        }
    }

    match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")) {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(primary_err) => match Pdfium::bind_to_system_library() {
            Ok(bindings) => Ok(Pdfium::new(bindings)),
            Err(_) => Err(primary_err),
        },
    }
}

fn try_bind_from_env(var: &str) -> Option<Result<Pdfium, PdfiumError>> {
    let value = env::var_os(var)?;
    let path = PathBuf::from(&value);
    try_bind_from_path(&path)
}

fn try_bind_from_path(path: &Path) -> Option<Result<Pdfium, PdfiumError>> {
    if path.is_dir() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(path);
        Some(Pdfium::bind_to_library(lib_path).map(Pdfium::new))
    } else if path.exists() {
        Some(Pdfium::bind_to_library(path).map(Pdfium::new))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_text() {
        let text = extract_text_from_pdf(&[]).expect("placeholder must extract cleanly");
        assert_eq!(text, "");
    }
}
