//! Retrieval stage: structured query JSON → search → fetch → document batch JSON.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use docsift_fetch::{PageFetcher, SearchProvider};
use docsift_shared::types::has_extension;
use docsift_shared::{
    DocumentBatch, ErrorEnvelope, RetrievalConfig, RetrievedDocument, RunId, SearchHit,
    StructuredQuery, to_pretty_json,
};

use crate::pipeline::{SkipReason, parse_stage_input};
use crate::progress::{ProgressReporter, SilentProgress, StageSummary};

/// Envelope message for input that is not a JSON object.
pub const INVALID_QUERY_ERROR: &str = "Invalid JSON input from QueryParserAgent";
/// Envelope message when there is nothing to search for.
pub const NO_QUERIES_ERROR: &str = "No boolean search queries found in input.";

/// Searches for the primary boolean query and fetches every usable hit.
#[derive(Debug, Clone)]
pub struct Retriever<S, F> {
    search: S,
    fetcher: F,
    config: RetrievalConfig,
}

impl<S: SearchProvider, F: PageFetcher> Retriever<S, F> {
    pub fn new(search: S, fetcher: F, config: RetrievalConfig) -> Self {
        Self {
            search,
            fetcher,
            config,
        }
    }

    /// Run the stage on a structured query payload.
    pub async fn run(&self, structured_query_json: &str) -> String {
        self.run_with(structured_query_json, &SilentProgress).await
    }

    /// [`Self::run`] with progress reporting.
    pub async fn run_with(
        &self,
        structured_query_json: &str,
        progress: &dyn ProgressReporter,
    ) -> String {
        let query = match parse_query(structured_query_json) {
            Ok(query) => query,
            Err(envelope) => return envelope.to_json(),
        };

        match self.retrieve(&query, progress).await {
            Ok(batch) => to_pretty_json(&batch),
            Err(envelope) => envelope.to_json(),
        }
    }

    /// Search with the first boolean query and fetch the hits in rank order.
    ///
    /// Hits without a URL or pointing at a skipped file type are dropped
    /// before fetching. Fetch failures drop only that hit.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, queries = query.boolean_search_queries.len()))]
    pub async fn retrieve(
        &self,
        query: &StructuredQuery,
        progress: &dyn ProgressReporter,
    ) -> Result<DocumentBatch, ErrorEnvelope> {
        let start = Instant::now();
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let Some(primary) = query.boolean_search_queries.first() else {
            warn!("structured query has no boolean search queries");
            return Err(ErrorEnvelope::new(NO_QUERIES_ERROR));
        };

        progress.phase("Searching");
        info!(query = %primary, limit = self.config.max_search_results, "searching");
        let hits = self
            .search
            .search(primary, self.config.max_search_results)
            .await
            .map_err(|e| {
                warn!(error = %e, "search failed");
                ErrorEnvelope::new(format!("Search failed: {e}"))
            })?;

        // Providers may ignore the limit.
        let hits: Vec<SearchHit> = hits
            .into_iter()
            .take(self.config.max_search_results)
            .collect();
        let total = hits.len();

        progress.phase("Fetching pages");
        let mut documents = Vec::with_capacity(total);

        for (i, hit) in hits.into_iter().enumerate() {
            let Some(url) = hit.url.as_deref().filter(|u| !u.is_empty()) else {
                debug!(title = ?hit.title, "hit has no url, skipping");
                continue;
            };
            if has_extension(url, &self.config.skip_extensions) {
                debug!(%url, "skipping non-web document");
                continue;
            }

            progress.page_fetched(url, i + 1, total);
            match self.fetcher.fetch(url).await {
                Ok(page) => documents.push(RetrievedDocument {
                    title: hit.title.clone().or(page.title),
                    url: url.to_string(),
                    snippet: hit.snippet.clone(),
                    raw_content: page.body,
                    relevance_score: hit.score.clone().or_else(|| {
                        serde_json::Number::from_f64(self.config.default_relevance_score)
                    }),
                }),
                Err(e) => {
                    warn!(%url, error = %e, "fetch failed, skipping");
                    progress.document_skipped(url, &SkipReason::Collaborator(e.to_string()));
                }
            }
        }

        let summary = StageSummary {
            run_id,
            stage: "retrieve",
            received: total,
            kept: documents.len(),
            elapsed: start.elapsed(),
        };
        progress.done(&summary);

        info!(
            hits = summary.received,
            documents = summary.kept,
            elapsed_ms = summary.elapsed.as_millis(),
            "retrieval complete"
        );

        Ok(DocumentBatch {
            core_question: query.core_question.clone(),
            documents,
        })
    }
}

/// Parse the query-stage payload, rejecting anything that is not a JSON object.
pub fn parse_query(structured_query_json: &str) -> Result<StructuredQuery, ErrorEnvelope> {
    parse_stage_input(structured_query_json, INVALID_QUERY_ERROR)
}
