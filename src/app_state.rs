use std::sync::{Arc, Mutex};
use neo4rs::Graph;
use tokio::sync::oneshot;
use crate::{
    config::AppConfig, live_search::LiveSearch, llm::LlmManager, session::SessionStore,
    vector_store::VectorStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub graph: Arc<Graph>,
    pub store: Arc<dyn VectorStore>,
    pub llm_manager: LlmManager,
    pub live_search: Arc<dyn LiveSearch>,
    pub sessions: SessionStore,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}
