//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementan OpenRouter y OpenAI; Ollama queda preparado
//! para el futuro.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::Prompt;

use crate::config::{AppConfig, LlmProvider};
use crate::errors::RagError;

/// Costura de inyección para el modelo de chat: un preámbulo de sistema y
/// una pregunta producen una respuesta. Los tests la sustituyen por dobles.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, RagError>;
}

/// Gestor de LLMs. Toda llamada es single-shot y está acotada por un
/// timeout fijo; no hay reintentos.
#[derive(Debug, Clone)]
pub struct LlmManager {
    provider: LlmProvider,
    chat_model: String,
    timeout: Duration,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
            timeout: Duration::from_secs(cfg.llm_timeout_secs),
        })
    }

    /// Copia del manager apuntando a otro modelo (el frontend permite elegir
    /// modelo por petición).
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            chat_model: model.to_string(),
            ..self.clone()
        }
    }

    fn timeout_error(&self) -> RagError {
        RagError::LlmCall(format!(
            "timeout tras {} segundos sin respuesta del proveedor",
            self.timeout.as_secs()
        ))
    }

    async fn complete_with_openrouter(
        &self,
        preamble: &str,
        prompt: &str,
    ) -> Result<String, RagError> {
        use rig::client::CompletionClient as _;
        use rig::providers::openrouter;

        // Cliente OpenRouter de Rig (lee OPENROUTER_API_KEY del entorno)
        let client = openrouter::Client::from_env();
        let agent = client.agent(&self.chat_model).preamble(preamble).build();

        tokio::time::timeout(self.timeout, async { agent.prompt(prompt).await })
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| RagError::LlmCall(e.to_string()))
    }

    async fn complete_with_openai(
        &self,
        preamble: &str,
        prompt: &str,
    ) -> Result<String, RagError> {
        use rig::client::CompletionClient as _;
        use rig::providers::openai;

        let client = openai::Client::from_env();
        let agent = client.agent(&self.chat_model).preamble(preamble).build();

        tokio::time::timeout(self.timeout, async { agent.prompt(prompt).await })
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| RagError::LlmCall(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for LlmManager {
    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, RagError> {
        match self.provider {
            LlmProvider::OpenRouter => self.complete_with_openrouter(preamble, prompt).await,
            LlmProvider::OpenAI => self.complete_with_openai(preamble, prompt).await,
            ref other => Err(RagError::LlmCall(format!(
                "Proveedor LLM {other:?} aún no implementado para chat"
            ))),
        }
    }
}
