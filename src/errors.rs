//! Tipos de error del servicio RAG.
//!
//! Cada variante corresponde a una fase concreta del flujo: indexación,
//! borrado, recuperación, llamada al LLM o búsqueda en vivo. Las capas
//! superiores deciden si el error se degrada (p. ej. recuperación fallida
//! → respuesta sin contexto) o se reporta como booleano al llamador.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("tipo de fichero no soportado: {0}")]
    UnsupportedFileType(String),

    #[error("fallo de indexación: {0}")]
    Indexing(String),

    #[error("fallo de borrado: {0}")]
    Deletion(String),

    #[error("fallo de recuperación: {0}")]
    Retrieval(String),

    #[error("fallo en la llamada al LLM: {0}")]
    LlmCall(String),

    #[error("fallo en la búsqueda en vivo: {0}")]
    LiveSearch(String),
}
