//! Tools available to the TAZMIC agent.
//!
//! The registry is closed: it is built once from configuration, validated,
//! and frozen behind an `Arc` before the first turn.

pub mod retriever;

use std::sync::Arc;

use tazmic_core::document::DocumentStore;
use tazmic_core::error::ToolError;
use tazmic_core::tool::ToolRegistry;

pub use retriever::{NO_RELEVANT_INFORMATION, RETRIEVER_TOOL_NAME, RetrieverTool};

/// Build and validate the registry holding the document retrieval tool.
pub fn default_registry(
    store: Arc<dyn DocumentStore>,
    collection: &str,
    top_k: usize,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RetrieverTool::new(store, collection).with_top_k(top_k)))?;
    registry.validate()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tazmic_store::{Chunker, HashingEmbedder, InMemoryDocumentStore};

    #[test]
    fn default_registry_has_retriever() {
        let store = Arc::new(InMemoryDocumentStore::new(
            Arc::new(HashingEmbedder::default()),
            Chunker::default(),
        ));
        let registry = default_registry(store, "doc", 20).unwrap();
        assert_eq!(registry.names(), vec!["retriever_tool"]);
        assert_eq!(registry.definitions()[0].name, RETRIEVER_TOOL_NAME);
    }
}
