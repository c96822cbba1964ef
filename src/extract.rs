//! Plain-text extraction from document files.
//!
//! PDFs go through `pdf-extract`; every other matched file must be valid
//! UTF-8. Extraction never panics the caller: ingestion runs it on the
//! blocking pool and treats any failure as a skipped file.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("file is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Extract text from `bytes`, choosing the decoder from `path`'s extension.
pub fn extract_text(path: &Path, bytes: Vec<u8>) -> Result<String, ExtractError> {
    if is_pdf(path) {
        return pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()));
    }
    let text = String::from_utf8(bytes)?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_text_passes_through() {
        let text = extract_text(Path::new("a.md"), "héllo wörld".as_bytes().to_vec()).unwrap();
        assert_eq!(text, "héllo wörld");
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"notes");
        assert_eq!(extract_text(Path::new("a.txt"), bytes).unwrap(), "notes");
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let err = extract_text(Path::new("a.txt"), vec![0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn test_garbage_pdf_is_error() {
        let err = extract_text(Path::new("doc.PDF"), b"not a pdf".to_vec()).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
