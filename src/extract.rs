//! Text extraction from source documents.
//!
//! The pipeline consumes whatever text the extractor returns, including
//! empty strings; extraction quality is the extractor's concern, not ours.
//! PDFs go through `pdf-extract`; anything else is read as (lossy) UTF-8.

use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::{IndexError, Result};

/// Read a source document and return its text content.
///
/// Fails with [`IndexError::SourceUnreadable`] when the file is missing,
/// unreadable, or a PDF that cannot be parsed.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| IndexError::SourceUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| IndexError::SourceUnreadable {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        })?
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    debug!(path = %path.display(), chars = text.len(), "extracted text");
    Ok(text)
}
