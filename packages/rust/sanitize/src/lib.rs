//! Content sanitization: reduce retrieved content to plain, whitespace-normalized text.
//!
//! Markup goes through a lexical stripper ([`strip_markup`]); PDFs are handed to a
//! [`PdfExtractor`] collaborator whose output is used verbatim.

mod markup;
mod pdf;

use std::sync::Arc;

use tracing::{debug, instrument};

use docsift_shared::Result;

pub use markup::{collapse_whitespace, remove_element, strip_markup, strip_tags};
pub use pdf::PdfTextExtractor;

/// Capability for turning a PDF (inline data or a reference to it) into prose.
///
/// Implementations are expected to return already-clean text; no further
/// cleaning is applied by the sanitizer.
pub trait PdfExtractor: Send + Sync {
    fn extract_text(&self, raw_data_or_reference: &str) -> Result<String>;
}

impl<F> PdfExtractor for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn extract_text(&self, raw_data_or_reference: &str) -> Result<String> {
        self(raw_data_or_reference)
    }
}

/// Routes raw content to the markup stripper or the PDF collaborator.
#[derive(Clone)]
pub struct Sanitizer {
    pdf: Arc<dyn PdfExtractor>,
}

impl Sanitizer {
    pub fn new(pdf: Arc<dyn PdfExtractor>) -> Self {
        Self { pdf }
    }

    /// Clean `raw_content`.
    ///
    /// An `Err` only ever comes from the PDF collaborator; the markup path is
    /// total. An empty `Ok` means nothing usable was left.
    #[instrument(skip_all, fields(is_pdf = is_pdf, raw_len = raw_content.len()))]
    pub fn sanitize(&self, raw_content: &str, is_pdf: bool) -> Result<String> {
        if is_pdf {
            let text = self.pdf.extract_text(raw_content)?;
            debug!(text_len = text.len(), "pdf extraction complete");
            return Ok(text);
        }

        let text = strip_markup(raw_content);
        debug!(text_len = text.len(), "markup stripped");
        Ok(text)
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer").finish_non_exhaustive()
    }
}
