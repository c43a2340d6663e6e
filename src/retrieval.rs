//! Retrieval adapter boundary.
//!
//! The document index service (storage, chunking, embedding) is an external
//! collaborator; this module specifies only the interface the pipeline
//! consumes and ships an in-memory implementation for tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// A relevant passage returned by the index, best match first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub score: f32,
}

/// Read interface onto the external document index service.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Full indexed text content for one document.
    async fn fetch_content(&self, document_id: Uuid) -> PipelineResult<String>;

    /// Most relevant passages for a query, scoped to the given documents.
    async fn search(&self, query: &str, document_ids: &[Uuid]) -> PipelineResult<Vec<Passage>>;

    /// Whether the document exists in the workspace's index. Used by the
    /// dispatcher for create-time validation.
    async fn contains(&self, document_id: Uuid) -> bool;
}

/// In-memory index keyed by document id; search is naive term overlap.
#[derive(Default)]
pub struct InMemoryIndex {
    documents: HashMap<Uuid, String>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document_id: Uuid, content: impl Into<String>) {
        self.documents.insert(document_id, content.into());
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn fetch_content(&self, document_id: Uuid) -> PipelineResult<String> {
        self.documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("document {}", document_id)))
    }

    async fn search(&self, query: &str, document_ids: &[Uuid]) -> PipelineResult<Vec<Passage>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut passages = Vec::new();
        for id in document_ids {
            let Some(content) = self.documents.get(id) else {
                continue;
            };

            // Paragraphs ranked by how many query terms they mention.
            for paragraph in content.split("\n\n") {
                let lower = paragraph.to_lowercase();
                let hits = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                if hits > 0 {
                    passages.push(Passage {
                        text: paragraph.trim().to_string(),
                        score: hits as f32 / terms.len().max(1) as f32,
                    });
                }
            }
        }

        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(8);
        Ok(passages)
    }

    async fn contains(&self, document_id: Uuid) -> bool {
        self.documents.contains_key(&document_id)
    }
}
