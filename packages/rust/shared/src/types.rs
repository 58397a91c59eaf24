//! Wire types exchanged between pipeline stages.
//!
//! Field names follow the JSON contract exactly; Rust-side names differ only
//! where noted with `#[serde(rename)]`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use uuid::Uuid;

/// Placeholder used when an upstream document carries no URL.
pub const UNKNOWN_URL: &str = "N/A";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one stage invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Retrieval stage input
// ---------------------------------------------------------------------------

/// Structured query produced by the query-parsing stage.
///
/// Only the fields the retrieval stage reads are modelled; anything else
/// (`sub_questions`, `keywords`, ...) is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default)]
    pub core_question: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub boolean_search_queries: Vec<String>,
}

/// A single hit returned by a search provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    /// Kept as the provider wrote it (`1` stays `1`, `0.9` stays `0.9`).
    #[serde(default)]
    pub score: Option<Number>,
}

// ---------------------------------------------------------------------------
// Document processing stage input
// ---------------------------------------------------------------------------

/// A candidate document with its raw fetched content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "unknown_url", deserialize_with = "null_as_unknown_url")]
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(
        rename = "raw_extracted_content",
        default,
        deserialize_with = "null_as_default"
    )]
    pub raw_content: String,
    #[serde(default)]
    pub relevance_score: Option<Number>,
}

/// Batch handed from the retrieval stage to the document processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentBatch {
    #[serde(default)]
    pub core_question: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents: Vec<RetrievedDocument>,
}

/// What the document processor actually decodes from its input.
///
/// The envelope is typed, but each entry of `documents` stays raw JSON until
/// that document's turn, so one malformed entry only costs itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingBatch {
    #[serde(default)]
    pub core_question: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents: Vec<Value>,
}

impl From<DocumentBatch> for IncomingBatch {
    fn from(batch: DocumentBatch) -> Self {
        Self {
            core_question: batch.core_question,
            // A document that cannot become JSON turns into `null` and is
            // skipped as malformed downstream.
            documents: batch
                .documents
                .iter()
                .map(|doc| serde_json::to_value(doc).unwrap_or(Value::Null))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document processing stage output
// ---------------------------------------------------------------------------

/// A bounded unit of section text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub section_title: String,
    #[serde(rename = "text_chunk")]
    pub text: String,
}

/// One input document reduced to ordered chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub source_url: String,
    pub source_title: Option<String>,
    pub relevance_score: Option<Number>,
    #[serde(rename = "processed_chunks")]
    pub chunks: Vec<TextChunk>,
}

/// Batch handed to the downstream reasoning stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBatch {
    pub core_question: Option<String>,
    pub processed_documents: Vec<ProcessedDocument>,
}

/// Flat `{"error": ...}` object signalling the caller must not proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Serialize the envelope as a stage response.
    pub fn to_json(&self) -> String {
        to_pretty_json(self)
    }
}

/// Serialize a stage payload with two-space indentation.
///
/// Serialization of the wire types cannot fail in practice; if it ever does,
/// the failure is reported through the error envelope shape instead of panicking.
pub fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize stage output");
        format!(
            "{{\"error\": {}}}",
            serde_json::Value::String(format!("failed to serialize output: {e}"))
        )
    })
}

// ---------------------------------------------------------------------------
// DocumentKind
// ---------------------------------------------------------------------------

/// Content kind inferred from a document URL suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// HTML or plain text; goes through the markup sanitizer.
    Markup,
    /// `.pdf`; routed to the PDF extraction collaborator.
    Pdf,
}

impl DocumentKind {
    /// Classify a URL by its (case-insensitive) suffix.
    pub fn from_url(url: &str) -> Self {
        if has_extension(url, &[".pdf"]) {
            Self::Pdf
        } else {
            Self::Markup
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// Whether `url` ends with any of `extensions`, ignoring ASCII case.
pub fn has_extension(url: &str, extensions: &[impl AsRef<str>]) -> bool {
    let lower = url.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.as_ref().to_ascii_lowercase()))
}

// ---------------------------------------------------------------------------
// serde helpers
// ---------------------------------------------------------------------------

fn unknown_url() -> String {
    UNKNOWN_URL.to_string()
}

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_unknown_url<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn retrieved_document_uses_wire_names() {
        let json = r#"{
            "title": "Agent Reflection",
            "url": "http://example.com/a",
            "snippet": null,
            "raw_extracted_content": "<p>Hi</p>",
            "relevance_score": 0.95
        }"#;
        let doc: RetrievedDocument = serde_json::from_str(json).expect("deserialize");
        assert_eq!(doc.raw_content, "<p>Hi</p>");
        assert_eq!(doc.relevance_score.and_then(|n| n.as_f64()), Some(0.95));
        assert_eq!(doc.snippet, None);
    }

    #[test]
    fn retrieved_document_tolerates_missing_and_null_fields() {
        let doc: RetrievedDocument =
            serde_json::from_str(r#"{"url": null, "raw_extracted_content": null}"#)
                .expect("deserialize");
        assert_eq!(doc.url, UNKNOWN_URL);
        assert!(doc.raw_content.is_empty());

        let doc: RetrievedDocument = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(doc.url, UNKNOWN_URL);
        assert_eq!(doc.title, None);
    }

    #[test]
    fn batch_defaults_to_no_documents() {
        let batch: DocumentBatch =
            serde_json::from_str(r#"{"core_question": "why?"}"#).expect("deserialize");
        assert_eq!(batch.core_question.as_deref(), Some("why?"));
        assert!(batch.documents.is_empty());
    }

    #[test]
    fn processed_batch_serializes_nulls_and_renames() {
        let batch = ProcessedBatch {
            core_question: None,
            processed_documents: vec![ProcessedDocument {
                source_url: "http://example.com".into(),
                source_title: None,
                relevance_score: None,
                chunks: vec![TextChunk {
                    section_title: "Main Body".into(),
                    text: "Hello".into(),
                }],
            }],
        };
        let value: serde_json::Value =
            serde_json::from_str(&to_pretty_json(&batch)).expect("valid json");
        assert!(value["core_question"].is_null());
        let doc = &value["processed_documents"][0];
        assert!(doc["source_title"].is_null());
        assert!(doc["relevance_score"].is_null());
        assert_eq!(doc["processed_chunks"][0]["text_chunk"], "Hello");
        assert_eq!(doc["processed_chunks"][0]["section_title"], "Main Body");
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let out = ErrorEnvelope::new("boom").to_json();
        assert_eq!(out, "{\n  \"error\": \"boom\"\n}");
    }

    #[test]
    fn document_kind_from_url() {
        assert_eq!(DocumentKind::from_url("http://x.org/paper.PDF"), DocumentKind::Pdf);
        // Office files are filtered upstream; anything that gets here is markup.
        assert_eq!(DocumentKind::from_url("http://x.org/a.docx"), DocumentKind::Markup);
        assert_eq!(DocumentKind::from_url("http://x.org/pdf-guide"), DocumentKind::Markup);
        assert!(DocumentKind::from_url("https://arxiv.org/x.pdf").is_pdf());
    }

    #[test]
    fn integer_scores_pass_through_unchanged() {
        let doc: RetrievedDocument =
            serde_json::from_str(r#"{"url": "u", "relevance_score": 1}"#).expect("deserialize");
        let out = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(out["relevance_score"], serde_json::json!(1));
        assert!(out["relevance_score"].is_u64());
    }

    #[test]
    fn incoming_batch_keeps_entries_raw() {
        let batch: IncomingBatch = serde_json::from_str(
            r#"{"core_question": "q", "documents": [{"url": "a"}, "oops", 7]}"#,
        )
        .expect("deserialize");
        assert_eq!(batch.documents.len(), 3);
        assert_eq!(batch.documents[1], serde_json::json!("oops"));

        let typed = DocumentBatch {
            core_question: Some("q".into()),
            documents: vec![serde_json::from_str(r#"{"url": "a", "raw_extracted_content": "x"}"#)
                .expect("deserialize")],
        };
        let incoming = IncomingBatch::from(typed);
        assert_eq!(incoming.documents[0]["raw_extracted_content"], "x");
    }

    #[test]
    fn structured_query_ignores_extra_fields() {
        let json = r#"{
            "core_question": "q",
            "sub_questions": ["a"],
            "keywords": ["k"],
            "boolean_search_queries": ["(a AND b)"],
            "desired_outputs": ["summary"]
        }"#;
        let query: StructuredQuery = serde_json::from_str(json).expect("deserialize");
        assert_eq!(query.boolean_search_queries, vec!["(a AND b)".to_string()]);
    }
}
