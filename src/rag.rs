//! Despachador de respuestas: decide cómo contestar cada turno de chat.
//!
//! Política de decisión como lista ordenada de reglas (predicado, ruta),
//! evaluada de arriba abajo; la primera que casa gana:
//!   1. Saludo / charla trivial → respuesta enlatada, sin LLM ni herramientas.
//!   2. Datos en vivo (fecha, tiempo, "ahora") → búsqueda en vivo + una
//!      llamada al LLM para resumir en una frase.
//!   3. Pregunta sobre documentos → recuperación top-k + una llamada al LLM
//!      que juzga si el contexto responde; un token centinela señala que no.
//!   4. Fallback → una llamada al LLM con la pregunta tal cual.
//!
//! Las dependencias (retriever, modelo de chat, búsqueda en vivo) se
//! inyectan en la construcción; no hay estado global.

use std::sync::Arc;

use tracing::warn;

use crate::llm::ChatModel;
use crate::live_search::LiveSearch;
use crate::models::ChatMessage;
use crate::retriever::Retriever;

/// Token literal con el que el modelo señala que el contexto recuperado no
/// responde a la pregunta.
pub const NO_ANSWER_SENTINEL: &str = "NO_ANSWER_FOUND";

const GREETING_REPLY: &str = "Hello! I'm your document assistant. Upload a PDF, \
DOCX or HTML file and ask me anything about it.";

/// Palabras sueltas que marcan un saludo.
const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "hola", "thanks"];

/// Frases de charla trivial buscadas como subcadena.
const SMALL_TALK_PHRASES: &[&str] = &[
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "what's up",
    "thank you",
];

/// Preguntas de cortesía con respuesta enlatada (igualdad exacta).
const CHIT_CHAT_QUESTIONS: &[&str] = &[
    "who are you",
    "what can you do",
    "what is your name",
];

/// Palabras asociadas a consultas sensibles al tiempo. Se comparan palabra
/// a palabra, no como subcadena ("now" casaría con "know").
const LIVE_DATA_WORDS: &[&str] = &[
    "date",
    "weather",
    "today",
    "now",
    "current",
    "currently",
    "temperature",
    "time",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SmallTalk,
    LiveData,
    Document,
}

/// Tabla ordenada de reglas. `Route::Document` actúa de "otherwise": su
/// propio manejador cae al fallback cuando el contexto no responde.
const RULES: &[(fn(&str) -> bool, Route)] = &[
    (is_small_talk, Route::SmallTalk),
    (is_live_data, Route::LiveData),
    (always, Route::Document),
];

fn always(_question: &str) -> bool {
    true
}

fn normalized_words(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_small_talk(question: &str) -> bool {
    let normalized = question.trim().to_lowercase();
    let words = normalized_words(&normalized);

    words.iter().any(|w| GREETING_WORDS.contains(&w.as_str()))
        || SMALL_TALK_PHRASES.iter().any(|p| normalized.contains(p))
        || CHIT_CHAT_QUESTIONS
            .iter()
            .any(|q| normalized.trim_end_matches(['?', '!', '.']) == *q)
}

fn is_live_data(question: &str) -> bool {
    normalized_words(question)
        .iter()
        .any(|w| LIVE_DATA_WORDS.contains(&w.as_str()))
}

/// Ruta elegida para una pregunta. Primera regla que casa.
pub fn route(question: &str) -> Route {
    RULES
        .iter()
        .find(|(predicate, _)| predicate(question))
        .map(|(_, route)| *route)
        .unwrap_or(Route::Document)
}

pub struct Dispatcher {
    retriever: Retriever,
    llm: Arc<dyn ChatModel>,
    live_search: Arc<dyn LiveSearch>,
}

impl Dispatcher {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn ChatModel>,
        live_search: Arc<dyn LiveSearch>,
    ) -> Self {
        Self {
            retriever,
            llm,
            live_search,
        }
    }

    /// Produce la respuesta a un turno de chat. Nunca devuelve error: todo
    /// fallo se degrada a una rama de menor prioridad o a un mensaje de
    /// disculpa con el texto del error.
    pub async fn answer(&self, question: &str, history: &[ChatMessage]) -> String {
        match route(question) {
            Route::SmallTalk => GREETING_REPLY.to_string(),
            Route::LiveData => self.answer_live_data(question).await,
            Route::Document => self.answer_from_documents(question, history).await,
        }
    }

    async fn answer_live_data(&self, question: &str) -> String {
        let tool_output = match self.live_search.search(question).await {
            Ok(output) => output,
            Err(err) => {
                warn!("Fallo de la búsqueda en vivo: {err}");
                return format!("I couldn't reach live data sources right now ({err}).");
            }
        };

        let preamble = format!(
            "You are a helpful assistant. Using only the live search results \
             below, answer the user's question in one sentence.\n\n\
             Search results:\n{tool_output}"
        );

        match self.llm.complete(&preamble, question).await {
            Ok(reply) => reply,
            Err(err) => {
                // Degradación: el resultado crudo de la herramienta sirve de respuesta.
                warn!("Fallo del LLM en la rama de datos en vivo: {err}");
                tool_output
            }
        }
    }

    async fn answer_from_documents(&self, question: &str, history: &[ChatMessage]) -> String {
        let context = match self.retriever.retrieve(question).await {
            Ok(chunks) => chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            Err(err) => {
                // Degradación: un fallo de recuperación no aborta el turno.
                warn!("Fallo de recuperación, se continúa sin contexto: {err}");
                String::new()
            }
        };

        if !context.trim().is_empty() {
            let preamble = format!(
                "You are a helpful AI assistant. Judge whether the context below \
                 answers the user's question. If it does, answer using only that \
                 context. If it does not, reply with exactly {NO_ANSWER_SENTINEL}.\n\n\
                 Context:\n{context}"
            );

            match self.llm.complete(&preamble, question).await {
                Ok(reply) if !reply.contains(NO_ANSWER_SENTINEL) => return reply,
                Ok(_) => {}
                Err(err) => {
                    warn!("Fallo del LLM en la rama de documentos, se pasa al fallback: {err}");
                }
            }
        }

        self.answer_fallback(question, history).await
    }

    async fn answer_fallback(&self, question: &str, history: &[ChatMessage]) -> String {
        let preamble = build_preamble(history);
        match self.llm.complete(&preamble, question).await {
            Ok(reply) => reply,
            Err(err) => {
                format!("I'm sorry, I ran into a problem while answering: {err}")
            }
        }
    }
}

/// Aplana el historial de la sesión en el preámbulo de sistema; el historial
/// no influye en el enrutado, sólo en la llamada final al modelo.
fn build_preamble(history: &[ChatMessage]) -> String {
    let mut preamble = String::from("You are a helpful AI assistant.");
    if !history.is_empty() {
        preamble.push_str("\n\nChat history:\n");
        for message in history {
            preamble.push_str(message.role.as_str());
            preamble.push_str(": ");
            preamble.push_str(&message.content);
            preamble.push('\n');
        }
    }
    preamble
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::RagError;
    use crate::models::{Chunk, RetrievedChunk, Role};
    use crate::vector_store::testing::MemoryVectorStore;
    use crate::vector_store::VectorStore;

    /// Modelo de chat doble: devuelve respuestas de una cola y cuenta llamadas.
    struct ScriptedLlm {
        calls: AtomicUsize,
        replies: Mutex<VecDeque<Result<String, RagError>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, RagError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                replies: Mutex::new(replies.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedLlm {
        async fn complete(&self, _preamble: &str, _prompt: &str) -> Result<String, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("respuesta por defecto".to_string()))
        }
    }

    struct ScriptedSearch {
        calls: AtomicUsize,
        result: Result<String, ()>,
    }

    impl ScriptedSearch {
        fn ok(result: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Ok(result.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Err(()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LiveSearch for ScriptedSearch {
        async fn search(&self, _query: &str) -> Result<String, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(s) => Ok(s.clone()),
                Err(()) => Err(RagError::LiveSearch("sin red".to_string())),
            }
        }
    }

    /// Vector store que siempre falla, para la degradación de recuperación.
    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn add_chunks(&self, _chunks: &[Chunk]) -> Result<(), RagError> {
            Err(RagError::Indexing("store caído".to_string()))
        }

        async fn search(
            &self,
            _question: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, RagError> {
            Err(RagError::Retrieval("store caído".to_string()))
        }

        async fn delete_by_file(&self, _file_id: i64) -> Result<usize, RagError> {
            Err(RagError::Deletion("store caído".to_string()))
        }

        async fn count_by_file(&self, _file_id: i64) -> Result<usize, RagError> {
            Err(RagError::Deletion("store caído".to_string()))
        }
    }

    fn dispatcher(
        store: Arc<dyn VectorStore>,
        llm: Arc<ScriptedLlm>,
        search: Arc<ScriptedSearch>,
    ) -> Dispatcher {
        Dispatcher::new(Retriever::new(store), llm, search)
    }

    #[test]
    fn routing_follows_priority_order() {
        assert_eq!(route("hello"), Route::SmallTalk);
        assert_eq!(route("  Hello there!  "), Route::SmallTalk);
        assert_eq!(route("who are you?"), Route::SmallTalk);
        // El saludo gana aunque haya palabras de datos en vivo.
        assert_eq!(route("hello, what's the weather today?"), Route::SmallTalk);
        assert_eq!(route("what's the weather today?"), Route::LiveData);
        assert_eq!(route("what time is it?"), Route::LiveData);
        assert_eq!(route("What is the capital of France?"), Route::Document);
        // "know" no debe casar con "now", ni "this" con "hi".
        assert_eq!(route("what do you know about this topic?"), Route::Document);
    }

    #[tokio::test]
    async fn greeting_uses_no_llm_and_no_tool() {
        let llm = ScriptedLlm::new(vec![]);
        let search = ScriptedSearch::ok("irrelevante");
        let d = dispatcher(Arc::new(MemoryVectorStore::new()), llm.clone(), search.clone());

        let answer = d.answer("hello", &[]).await;

        assert_eq!(answer, GREETING_REPLY);
        assert_eq!(llm.calls(), 0);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn live_data_calls_the_tool_once_and_the_llm_at_most_once() {
        let llm = ScriptedLlm::new(vec![Ok("It is sunny in Madrid today.".to_string())]);
        let search = ScriptedSearch::ok("Madrid: soleado, 31 grados");
        let d = dispatcher(Arc::new(MemoryVectorStore::new()), llm.clone(), search.clone());

        let answer = d.answer("what's the weather today", &[]).await;

        assert_eq!(answer, "It is sunny in Madrid today.");
        assert_eq!(search.calls(), 1);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn live_data_degrades_to_raw_tool_output_when_the_llm_fails() {
        let llm = ScriptedLlm::new(vec![Err(RagError::LlmCall("timeout".to_string()))]);
        let search = ScriptedSearch::ok("Madrid: soleado, 31 grados");
        let d = dispatcher(Arc::new(MemoryVectorStore::new()), llm.clone(), search.clone());

        let answer = d.answer("what's the weather today", &[]).await;

        assert_eq!(answer, "Madrid: soleado, 31 grados");
        assert_eq!(search.calls(), 1);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn live_data_surfaces_a_tool_failure() {
        let llm = ScriptedLlm::new(vec![]);
        let search = ScriptedSearch::failing();
        let d = dispatcher(Arc::new(MemoryVectorStore::new()), llm.clone(), search.clone());

        let answer = d.answer("what's the weather today", &[]).await;

        assert!(answer.contains("live data sources"));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn unmatched_question_with_empty_store_falls_back_once() {
        let llm = ScriptedLlm::new(vec![Ok("respuesta libre".to_string())]);
        let search = ScriptedSearch::ok("irrelevante");
        let d = dispatcher(Arc::new(MemoryVectorStore::new()), llm.clone(), search.clone());

        let answer = d.answer("tell me about quantum entanglement", &[]).await;

        assert_eq!(answer, "respuesta libre");
        assert_eq!(llm.calls(), 1);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn document_branch_answers_from_retrieved_context() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .add_chunks(&[Chunk {
                file_id: 1,
                index: 0,
                text: "The capital of France is Paris.".to_string(),
            }])
            .await
            .unwrap();

        let llm = ScriptedLlm::new(vec![Ok("Paris is the capital of France.".to_string())]);
        let search = ScriptedSearch::ok("irrelevante");
        let d = dispatcher(store, llm.clone(), search.clone());

        let answer = d.answer("What is the capital of France?", &[]).await;

        assert!(answer.contains("Paris"));
        assert!(!answer.contains(NO_ANSWER_SENTINEL));
        assert_eq!(llm.calls(), 1);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn sentinel_reply_falls_through_to_the_fallback() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .add_chunks(&[Chunk {
                file_id: 1,
                index: 0,
                text: "Texto sobre jardinería.".to_string(),
            }])
            .await
            .unwrap();

        let llm = ScriptedLlm::new(vec![
            Ok(NO_ANSWER_SENTINEL.to_string()),
            Ok("respuesta del fallback".to_string()),
        ]);
        let search = ScriptedSearch::ok("irrelevante");
        let d = dispatcher(store, llm.clone(), search);

        let answer = d.answer("explain byzantine consensus", &[]).await;

        assert_eq!(answer, "respuesta del fallback");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_the_fallback() {
        let llm = ScriptedLlm::new(vec![Ok("sin contexto, pero respondo".to_string())]);
        let search = ScriptedSearch::ok("irrelevante");
        let d = dispatcher(Arc::new(FailingStore), llm.clone(), search);

        let answer = d.answer("what does the report conclude?", &[]).await;

        assert_eq!(answer, "sin contexto, pero respondo");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_failure_becomes_an_apology_with_the_error_text() {
        let llm = ScriptedLlm::new(vec![Err(RagError::LlmCall("proveedor caído".to_string()))]);
        let search = ScriptedSearch::ok("irrelevante");
        let d = dispatcher(Arc::new(MemoryVectorStore::new()), llm.clone(), search);

        let answer = d.answer("an unanswerable question", &[]).await;

        assert!(answer.starts_with("I'm sorry"));
        assert!(answer.contains("proveedor caído"));
    }

    #[test]
    fn preamble_flattens_the_history() {
        let history = vec![
            ChatMessage {
                role: Role::User,
                content: "hola".to_string(),
            },
            ChatMessage {
                role: Role::Assistant,
                content: "¡hola!".to_string(),
            },
        ];

        let preamble = build_preamble(&history);
        assert!(preamble.contains("user: hola"));
        assert!(preamble.contains("assistant: ¡hola!"));

        assert_eq!(build_preamble(&[]), "You are a helpful AI assistant.");
    }
}
