//! Modelos de dominio (registro de documentos, chunks y mensajes de chat).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registro de un documento indexado (:Document en Neo4j).
/// Su `id` entero es el que referencian los chunks vía `file_id`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub upload_timestamp: DateTime<Utc>,
}

/// Trozo de texto extraído de un documento, pendiente de insertar en el
/// vector store. El embedding se calcula en el momento de la inserción.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub file_id: i64,
    pub index: i64,
    pub text: String,
}

/// Chunk devuelto por una búsqueda por similitud.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub score: f64,
    pub file_id: i64,
    pub text: String,
}

/// Rol de un mensaje dentro de una sesión de chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Mensaje de una sesión de chat. Las sesiones son append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Modelos de chat admitidos a través de OpenRouter.
pub const ALLOWED_MODELS: &[&str] = &[
    "nvidia/nemotron-nano-9b-v2:free",
    "qwen/qwen3-4b:free",
    "deepseek/deepseek-r1-0528:free",
    "mistralai/mistral-small-3.1-24b-instruct:free",
];

/// Modelo usado cuando la petición no especifica otro.
pub const DEFAULT_MODEL: &str = "nvidia/nemotron-nano-9b-v2:free";
