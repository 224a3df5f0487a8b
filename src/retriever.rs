//! Recuperador de contexto: envoltorio fino sobre el vector store con un
//! top-k fijo. Sin re-ranking ni umbral de score: se devuelve lo que el
//! store devuelva.

use std::sync::Arc;

use crate::errors::RagError;
use crate::models::RetrievedChunk;
use crate::vector_store::VectorStore;

/// Número de chunks recuperados por consulta.
pub const TOP_K: usize = 2;

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            top_k: TOP_K,
        }
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, RagError> {
        self.store.search(question, self.top_k).await
    }
}
