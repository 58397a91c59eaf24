//! PDF text extraction backed by `pdf-extract`.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, warn};

use docsift_shared::{DocsiftError, Result};

use crate::PdfExtractor;

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Extracts text from a PDF given either inline data (starting with `%PDF-`)
/// or a local file path.
///
/// Extraction runs on a helper thread so that a hung or panicking parse is
/// reported as an error for this one document.
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    timeout: Duration,
}

impl PdfTextExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn load(&self, raw_data_or_reference: &str) -> Result<Vec<u8>> {
        if raw_data_or_reference.as_bytes().starts_with(PDF_MAGIC) {
            return Ok(raw_data_or_reference.as_bytes().to_vec());
        }

        let path = Path::new(raw_data_or_reference.trim());
        std::fs::read(path).map_err(|e| DocsiftError::io(path, e))
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl PdfExtractor for PdfTextExtractor {
    fn extract_text(&self, raw_data_or_reference: &str) -> Result<String> {
        let data = self.load(raw_data_or_reference)?;
        if !data.starts_with(PDF_MAGIC) {
            return Err(DocsiftError::extraction("content is not a PDF document"));
        }

        debug!(bytes = data.len(), "extracting pdf text");

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let outcome =
                match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&data)) {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(e)) => Err(format!("pdf-extract failed: {e}")),
                    Err(_) => Err("pdf-extract panicked on malformed input".to_string()),
                };
            let _ = tx.send(outcome);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(message)) => {
                warn!(error = %message, "pdf extraction failed");
                Err(DocsiftError::Extraction(message))
            }
            Err(RecvTimeoutError::Timeout) => Err(DocsiftError::Timeout {
                what: "pdf extraction".into(),
                secs: self.timeout.as_secs(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(DocsiftError::extraction(
                "pdf extraction thread exited without a result",
            )),
        }
    }
}
