//! Vector store de chunks con embeddings.
//!
//! El trait [`VectorStore`] es la costura de inyección del sistema: la
//! implementación de producción guarda los chunks como nodos `:Chunk` en
//! Neo4j con un índice vectorial coseno de 384 dimensiones, y los tests
//! usan una implementación en memoria con búsqueda por fuerza bruta.

use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{query, Graph};
use tracing::info;
use uuid::Uuid;

use crate::embedding::{HashEmbedder, EMBEDDING_DIM};
use crate::errors::RagError;
use crate::models::{Chunk, RetrievedChunk};

const INDEX_NAME: &str = "chunkEmbeddingIndex";

/// Operaciones que el sistema exige a un vector store: inserción,
/// búsqueda top-k por similitud y borrado/recuento por metadato `file_id`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), RagError>;
    async fn search(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RagError>;
    async fn delete_by_file(&self, file_id: i64) -> Result<usize, RagError>;
    async fn count_by_file(&self, file_id: i64) -> Result<usize, RagError>;
}

/// Garantiza que el índice vectorial sobre `:Chunk(embedding)` exista.
pub async fn ensure_chunk_vector_index(graph: &Graph) -> anyhow::Result<()> {
    // ¿Ya existe el índice? Usamos la sintaxis moderna SHOW VECTOR INDEXES.
    let mut cursor = graph
        .execute(
            query("SHOW VECTOR INDEXES YIELD name WHERE name = $name RETURN name")
                .param("name", INDEX_NAME),
        )
        .await?;

    if cursor.next().await?.is_some() {
        info!("Índice vectorial '{INDEX_NAME}' ya existe.");
        return Ok(());
    }

    let cypher = format!(
        "\
CREATE VECTOR INDEX {INDEX_NAME}
FOR (c:Chunk)
ON (c.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {EMBEDDING_DIM},
    `vector.similarity_function`: 'cosine'
  }}
}}"
    );

    graph.run(query(&cypher)).await?;
    info!("Índice vectorial '{INDEX_NAME}' creado.");

    Ok(())
}

/// Implementación de producción sobre Neo4j.
#[derive(Clone)]
pub struct Neo4jVectorStore {
    graph: Arc<Graph>,
    embedder: HashEmbedder,
}

impl Neo4jVectorStore {
    pub fn new(graph: Arc<Graph>, embedder: HashEmbedder) -> Self {
        Self { graph, embedder }
    }
}

#[async_trait]
impl VectorStore for Neo4jVectorStore {
    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), RagError> {
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text);
            self.graph
                .run(
                    query(
                        "MERGE (c:Chunk {id: $id})
                         SET c.file_id = $file_id, c.index = $index,
                             c.text = $text, c.embedding = $embedding",
                    )
                    .param("id", Uuid::new_v4().to_string())
                    .param("file_id", chunk.file_id)
                    .param("index", chunk.index)
                    .param("text", chunk.text.clone())
                    .param("embedding", embedding),
                )
                .await
                .map_err(|e| RagError::Indexing(e.to_string()))?;
        }
        Ok(())
    }

    async fn search(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RagError> {
        let query_vec = self.embedder.embed(question);

        let mut cursor = self
            .graph
            .execute(
                query(
                    "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                     YIELD node, score
                     RETURN score, node.file_id AS file_id, node.text AS text
                     ORDER BY score DESC",
                )
                .param("index_name", INDEX_NAME)
                .param("k", top_k as i64)
                .param("embedding", query_vec),
            )
            .await
            .map_err(|e| RagError::Retrieval(e.to_string()))?;

        let mut output = Vec::new();
        loop {
            let row = cursor
                .next()
                .await
                .map_err(|e| RagError::Retrieval(e.to_string()))?;
            let Some(row) = row else { break };

            let score: f64 = row
                .get("score")
                .ok_or_else(|| RagError::Retrieval("Falta campo 'score'".into()))?;
            let file_id: i64 = row
                .get("file_id")
                .ok_or_else(|| RagError::Retrieval("Falta campo 'file_id'".into()))?;
            let text: String = row
                .get("text")
                .ok_or_else(|| RagError::Retrieval("Falta campo 'text'".into()))?;

            output.push(RetrievedChunk {
                score,
                file_id,
                text,
            });
        }

        Ok(output)
    }

    async fn delete_by_file(&self, file_id: i64) -> Result<usize, RagError> {
        let found = self.count_by_file(file_id).await?;
        self.graph
            .run(query("MATCH (c:Chunk {file_id: $file_id}) DETACH DELETE c").param("file_id", file_id))
            .await
            .map_err(|e| RagError::Deletion(e.to_string()))?;
        Ok(found)
    }

    async fn count_by_file(&self, file_id: i64) -> Result<usize, RagError> {
        let mut cursor = self
            .graph
            .execute(
                query("MATCH (c:Chunk {file_id: $file_id}) RETURN count(c) AS total")
                    .param("file_id", file_id),
            )
            .await
            .map_err(|e| RagError::Deletion(e.to_string()))?;

        let row = cursor
            .next()
            .await
            .map_err(|e| RagError::Deletion(e.to_string()))?;
        let total: i64 = row
            .and_then(|r| r.get("total"))
            .ok_or_else(|| RagError::Deletion("Falta campo 'total'".into()))?;
        Ok(total as usize)
    }
}

#[cfg(test)]
pub mod testing {
    //! Vector store en memoria para aislar los tests del resto del sistema.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryVectorStore {
        embedder: HashEmbedder,
        chunks: Mutex<Vec<(Chunk, Vec<f64>)>>,
    }

    impl MemoryVectorStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl VectorStore for MemoryVectorStore {
        async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), RagError> {
            let mut stored = self.chunks.lock().unwrap();
            for chunk in chunks {
                let embedding = self.embedder.embed(&chunk.text);
                stored.push((chunk.clone(), embedding));
            }
            Ok(())
        }

        async fn search(
            &self,
            question: &str,
            top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, RagError> {
            let query_vec = self.embedder.embed(question);
            let stored = self.chunks.lock().unwrap();

            // Vectores unitarios: el producto escalar es la similitud coseno.
            let mut scored: Vec<RetrievedChunk> = stored
                .iter()
                .map(|(chunk, embedding)| {
                    let score = embedding
                        .iter()
                        .zip(query_vec.iter())
                        .map(|(a, b)| a * b)
                        .sum::<f64>();
                    RetrievedChunk {
                        score,
                        file_id: chunk.file_id,
                        text: chunk.text.clone(),
                    }
                })
                .collect();

            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(top_k);
            Ok(scored)
        }

        async fn delete_by_file(&self, file_id: i64) -> Result<usize, RagError> {
            let mut stored = self.chunks.lock().unwrap();
            let before = stored.len();
            stored.retain(|(chunk, _)| chunk.file_id != file_id);
            Ok(before - stored.len())
        }

        async fn count_by_file(&self, file_id: i64) -> Result<usize, RagError> {
            let stored = self.chunks.lock().unwrap();
            Ok(stored
                .iter()
                .filter(|(chunk, _)| chunk.file_id == file_id)
                .count())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryVectorStore;
    use super::*;

    fn chunk(file_id: i64, index: i64, text: &str) -> Chunk {
        Chunk {
            file_id,
            index,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn search_returns_at_most_top_k() {
        let store = MemoryVectorStore::new();
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| chunk(1, i, &format!("texto número {i}")))
            .collect();
        store.add_chunks(&chunks).await.unwrap();

        let results = store.search("texto", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn delete_by_file_removes_only_matching_chunks() {
        let store = MemoryVectorStore::new();
        store
            .add_chunks(&[chunk(1, 0, "uno"), chunk(2, 0, "dos"), chunk(1, 1, "tres")])
            .await
            .unwrap();

        let deleted = store.delete_by_file(1).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count_by_file(1).await.unwrap(), 0);
        assert_eq!(store.count_by_file(2).await.unwrap(), 1);
    }
}
