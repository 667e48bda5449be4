//! Document retrieval tool.
//!
//! Wraps a [`DocumentStore`] lookup so the model can search the indexed
//! document. Never fails from the loop's point of view: store errors are
//! returned as result text.

use std::sync::Arc;

use async_trait::async_trait;
use tazmic_core::document::{DocumentChunk, DocumentStore};
use tazmic_core::error::ToolError;
use tazmic_core::tool::Tool;
use tracing::{debug, warn};

pub const RETRIEVER_TOOL_NAME: &str = "retriever_tool";

/// Result text when the store has nothing relevant.
pub const NO_RELEVANT_INFORMATION: &str = "I found no relevant information in the document.";

/// Chunks returned per search unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 20;

pub struct RetrieverTool {
    store: Arc<dyn DocumentStore>,
    collection: String,
    top_k: usize,
}

impl RetrieverTool {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Search the document and render the hits for the model.
    pub async fn search(&self, query: &str) -> String {
        match self.store.query(&self.collection, query, self.top_k).await {
            Ok(chunks) if chunks.is_empty() => NO_RELEVANT_INFORMATION.to_string(),
            Ok(chunks) => {
                debug!(
                    collection = %self.collection,
                    query_len = query.len(),
                    hits = chunks.len(),
                    "Retrieved chunks"
                );
                format_chunks(&chunks)
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Document search failed");
                format!("Document search failed: {e}")
            }
        }
    }
}

/// `Document 1:\n<text>\n\nDocument 2:\n<text>...` in ranked order.
pub fn format_chunks(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Document {}:\n{}", i + 1, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "This tool searches and returns the information from the document."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the document"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        // A missing query searches with the empty string
        let query = arguments.get("query").and_then(|q| q.as_str()).unwrap_or("");
        Ok(self.search(query).await)
    }
}
