//! Sesiones de chat en memoria de proceso.
//!
//! Cada sesión es una lista append-only de mensajes identificada por un
//! UUID v4. No hay persistencia: reiniciar el servidor vacía las sesiones,
//! igual que el botón "Nueva conversación" del frontend genera un id nuevo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::models::{ChatMessage, Role};

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Vec<ChatMessage>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devuelve el id de sesión a usar: el recibido si no está vacío, o uno
    /// recién generado. En ambos casos la sesión queda creada.
    pub fn resolve(&self, session_id: Option<String>) -> String {
        let id = match session_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        self.sessions.lock().unwrap().entry(id.clone()).or_default();
        id
    }

    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn append(&self, session_id: &str, role: Role, content: &str) {
        self.sessions
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push(ChatMessage {
                role,
                content: content.to_string(),
            });
    }
}
