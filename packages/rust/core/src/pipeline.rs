//! Document processing stage: retrieval JSON → sanitize → assemble → processed JSON.
//!
//! Input that is not a JSON object of the batch shape is answered with the
//! error envelope and no partial output. Everything that goes wrong for a
//! single document, including a malformed entry in `documents`, becomes a
//! [`DocumentOutcome::Skipped`]; one bad document never fails the batch.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use docsift_sanitize::{PdfExtractor, PdfTextExtractor, Sanitizer};
use docsift_shared::{
    AppConfig, DocumentKind, ErrorEnvelope, IncomingBatch, ProcessedBatch, ProcessedDocument,
    RetrievedDocument, RunId, UNKNOWN_URL, to_pretty_json,
};

use crate::assembler::ChunkAssembler;
use crate::progress::{ProgressReporter, SilentProgress, StageSummary};

/// Envelope message for input that is not a JSON object.
pub const INVALID_INPUT_ERROR: &str = "Invalid JSON input from RetrieverAgent";

// ---------------------------------------------------------------------------
// Per-document outcome
// ---------------------------------------------------------------------------

/// Why a document was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The `documents` entry does not have the document shape.
    MalformedDocument(String),
    /// `raw_extracted_content` was empty.
    EmptyContent,
    /// Sanitizing left nothing but whitespace.
    NoUsableText,
    /// A collaborator (PDF extraction) failed or panicked.
    Collaborator(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDocument(e) => write!(f, "malformed document entry: {e}"),
            Self::EmptyContent => write!(f, "no raw content"),
            Self::NoUsableText => write!(f, "content extraction produced no text"),
            Self::Collaborator(e) => write!(f, "collaborator failed: {e}"),
        }
    }
}

/// Result of processing one input document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Processed(ProcessedDocument),
    Skipped { url: String, reason: SkipReason },
}

impl DocumentOutcome {
    fn skipped(doc: &RetrievedDocument, reason: SkipReason) -> Self {
        Self::Skipped {
            url: doc.url.clone(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentProcessor
// ---------------------------------------------------------------------------

/// Stateless per-call transform from a retrieval batch to a [`ProcessedBatch`].
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    sanitizer: Sanitizer,
    assembler: ChunkAssembler,
    concurrency: usize,
}

impl DocumentProcessor {
    pub fn new(sanitizer: Sanitizer, assembler: ChunkAssembler) -> Self {
        Self {
            sanitizer,
            assembler,
            concurrency: 1,
        }
    }

    /// Build a processor with the `pdf-extract` backed PDF collaborator.
    pub fn from_config(config: &AppConfig) -> Self {
        let pdf: Arc<dyn PdfExtractor> = Arc::new(PdfTextExtractor::new(Duration::from_secs(
            config.processing.pdf_timeout_secs,
        )));
        Self::new(
            Sanitizer::new(pdf),
            ChunkAssembler::new(config.chunking.clone()),
        )
        .with_concurrency(config.processing.concurrency)
    }

    /// Number of documents processed at once by the concurrent entry points.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // -----------------------------------------------------------------------
    // JSON contract
    // -----------------------------------------------------------------------

    /// Process a retrieval-stage JSON payload and return the downstream payload.
    pub fn process(&self, batch_json: &str) -> String {
        self.process_with(batch_json, &SilentProgress)
    }

    /// [`Self::process`] with progress reporting.
    pub fn process_with(&self, batch_json: &str, progress: &dyn ProgressReporter) -> String {
        match parse_batch(batch_json) {
            Ok(batch) => to_pretty_json(&self.process_batch(batch, progress)),
            Err(envelope) => envelope.to_json(),
        }
    }

    /// Concurrent variant of [`Self::process_with`]; output order matches input order.
    pub async fn process_concurrent(
        self: &Arc<Self>,
        batch_json: &str,
        progress: &dyn ProgressReporter,
    ) -> String {
        match parse_batch(batch_json) {
            Ok(batch) => to_pretty_json(&self.process_batch_concurrent(batch, progress).await),
            Err(envelope) => envelope.to_json(),
        }
    }

    // -----------------------------------------------------------------------
    // Typed entry points
    // -----------------------------------------------------------------------

    /// Process every document in order, dropping the ones that yield no text.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, documents = batch.documents.len()))]
    pub fn process_batch(
        &self,
        batch: IncomingBatch,
        progress: &dyn ProgressReporter,
    ) -> ProcessedBatch {
        let start = Instant::now();
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));
        let total = batch.documents.len();
        progress.phase("Processing documents");

        let outcomes: Vec<DocumentOutcome> = batch
            .documents
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                progress.document_started(&entry_url(entry), i + 1, total);
                self.process_entry(entry)
            })
            .collect();

        finish(run_id, batch.core_question, outcomes, progress, start)
    }

    /// Process documents on blocking worker threads, at most `concurrency`
    /// at a time, and reassemble results in input order.
    #[instrument(
        skip_all,
        fields(run_id = tracing::field::Empty, documents = batch.documents.len(), concurrency = self.concurrency)
    )]
    pub async fn process_batch_concurrent(
        self: &Arc<Self>,
        batch: IncomingBatch,
        progress: &dyn ProgressReporter,
    ) -> ProcessedBatch {
        let start = Instant::now();
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));
        let total = batch.documents.len();
        progress.phase("Processing documents");

        let mut outcomes = Vec::with_capacity(total);
        let mut index = 0;

        for window in batch.documents.chunks(self.concurrency) {
            let mut handles = Vec::with_capacity(window.len());

            for entry in window {
                index += 1;
                let url = entry_url(entry);
                progress.document_started(&url, index, total);

                let processor = Arc::clone(self);
                let entry = entry.clone();
                handles.push((
                    url,
                    tokio::task::spawn_blocking(move || processor.process_entry(&entry)),
                ));
            }

            for (url, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(%url, error = %e, "document task failed, skipping");
                        DocumentOutcome::Skipped {
                            url,
                            reason: SkipReason::Collaborator(format!("processing task failed: {e}")),
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        finish(run_id, batch.core_question, outcomes, progress, start)
    }

    /// Decode one raw `documents` entry, then sanitize and chunk it.
    pub fn process_entry(&self, entry: &Value) -> DocumentOutcome {
        match RetrievedDocument::deserialize(entry) {
            Ok(doc) => self.process_document(&doc),
            Err(e) => DocumentOutcome::Skipped {
                url: entry_url(entry),
                reason: SkipReason::MalformedDocument(e.to_string()),
            },
        }
    }

    /// Sanitize and chunk a single document.
    pub fn process_document(&self, doc: &RetrievedDocument) -> DocumentOutcome {
        debug!(url = %doc.url, title = ?doc.title, "processing document");

        if doc.raw_content.is_empty() {
            return DocumentOutcome::skipped(doc, SkipReason::EmptyContent);
        }

        let is_pdf = DocumentKind::from_url(&doc.url).is_pdf();

        // Injected collaborators may panic; contain that to this document.
        let sanitized = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.sanitizer.sanitize(&doc.raw_content, is_pdf)
        }));

        let text = match sanitized {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return DocumentOutcome::skipped(doc, SkipReason::Collaborator(e.to_string()));
            }
            Err(_) => {
                return DocumentOutcome::skipped(
                    doc,
                    SkipReason::Collaborator("content extraction panicked".into()),
                );
            }
        };

        if text.trim().is_empty() {
            return DocumentOutcome::skipped(doc, SkipReason::NoUsableText);
        }

        let chunks = self.assembler.assemble(&text);
        debug!(url = %doc.url, chunks = chunks.len(), is_pdf, "document processed");

        DocumentOutcome::Processed(ProcessedDocument {
            source_url: doc.url.clone(),
            source_title: doc.title.clone(),
            relevance_score: doc.relevance_score.clone(),
            chunks,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse the upstream payload, rejecting anything that is not a JSON object.
///
/// Only the batch envelope is checked here; `documents` entries are decoded
/// one at a time by [`DocumentProcessor::process_entry`].
pub fn parse_batch(batch_json: &str) -> Result<IncomingBatch, ErrorEnvelope> {
    parse_stage_input(batch_json, INVALID_INPUT_ERROR)
}

/// Best-effort URL of a raw entry, for logs and skip reports.
fn entry_url(entry: &Value) -> String {
    entry
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_URL)
        .to_string()
}

/// Decode a stage payload. Anything but a JSON object of the right shape is
/// answered with `error_message` in an envelope.
pub(crate) fn parse_stage_input<T: DeserializeOwned>(
    json: &str,
    error_message: &str,
) -> Result<T, ErrorEnvelope> {
    let invalid = |detail: String| {
        warn!(error = %detail, "rejecting stage input");
        ErrorEnvelope::new(error_message)
    };

    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("top-level value is not an object".into()));
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

/// Keep processed documents in order, report skips, and build the output batch.
fn finish(
    run_id: RunId,
    core_question: Option<String>,
    outcomes: Vec<DocumentOutcome>,
    progress: &dyn ProgressReporter,
    start: Instant,
) -> ProcessedBatch {
    let received = outcomes.len();
    let mut processed_documents = Vec::with_capacity(received);

    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Processed(doc) => processed_documents.push(doc),
            DocumentOutcome::Skipped { url, reason } => {
                warn!(%url, %reason, "skipping document");
                progress.document_skipped(&url, &reason);
            }
        }
    }

    let summary = StageSummary {
        run_id,
        stage: "process",
        received,
        kept: processed_documents.len(),
        elapsed: start.elapsed(),
    };
    progress.done(&summary);

    info!(
        received = summary.received,
        kept = summary.kept,
        skipped = summary.skipped(),
        elapsed_ms = summary.elapsed.as_millis(),
        "document processing complete"
    );

    ProcessedBatch {
        core_question,
        processed_documents,
    }
}
