//! Offline search provider backed by a saved result file.

use std::path::PathBuf;

use tracing::debug;

use docsift_shared::{DocsiftError, Result, SearchHit};

use crate::SearchProvider;

/// Serves hits from a JSON array of `{title, url, snippet, score}` objects.
///
/// The query itself is not interpreted; the file is assumed to hold the
/// results for whatever query is being replayed.
#[derive(Debug, Clone)]
pub struct JsonFileSearch {
    path: PathBuf,
}

impl JsonFileSearch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SearchProvider for JsonFileSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DocsiftError::io(&self.path, e))?;

        let hits: Vec<SearchHit> = serde_json::from_str(&content).map_err(|e| {
            DocsiftError::parse(format!(
                "search results in {} are not a JSON array of hits: {e}",
                self.path.display()
            ))
        })?;

        debug!(query, available = hits.len(), limit, "replaying saved search hits");
        Ok(hits.into_iter().take(limit).collect())
    }
}
