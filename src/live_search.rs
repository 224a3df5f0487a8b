//! Herramienta de búsqueda en vivo para preguntas sensibles al tiempo
//! (fecha, tiempo atmosférico, datos "de ahora mismo").
//!
//! Implementación por defecto: la interfaz HTML de DuckDuckGo, que no
//! requiere clave de API. El resultado es una cadena con los primeros
//! snippets, pensada como contexto para una única llamada al LLM.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::errors::RagError;

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const MAX_SNIPPETS: usize = 3;

#[async_trait]
pub trait LiveSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, RagError>;
}

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        // User-Agent de navegador real para no ser bloqueados
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .expect("No se pudo construir el cliente HTTP");

        Self { client }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<String, RagError> {
        let response = self
            .client
            .post(DDG_HTML_URL)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| RagError::LiveSearch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RagError::LiveSearch(format!(
                "DuckDuckGo respondió con estado {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| RagError::LiveSearch(e.to_string()))?;

        let snippets = parse_snippets(&html, MAX_SNIPPETS);
        if snippets.is_empty() {
            Ok("No live results found.".to_string())
        } else {
            Ok(snippets.join("\n"))
        }
    }
}

/// Extrae los snippets de resultado (`a.result__snippet`) del HTML de DDG.
fn parse_snippets(html: &str, max_results: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.result__snippet") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|node| {
            node.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|snippet| !snippet.is_empty())
        .take(max_results)
        .collect()
}
