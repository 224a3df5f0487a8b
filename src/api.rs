use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use mime_guess::MimeGuess;
use neo4rs::query;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    ingest,
    llm::ChatModel,
    models::{Role, ALLOWED_MODELS},
    neo4j_client, rag,
    retriever::Retriever,
};

/// Extensiones aceptadas por el endpoint de subida.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "html"];

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct QueryInput {
    question: String,
    session_id: Option<String>,
    model: Option<String>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    answer: String,
    session_id: String,
    model: String,
}

#[derive(Deserialize)]
pub struct DeleteFileRequest {
    file_id: i64,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/upload-doc", post(upload_doc_handler))
        .route("/list-docs", get(list_docs_handler))
        .route("/delete-doc", post(delete_doc_handler))
        .route("/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn upload_doc_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let mut filename = None;
    let mut data = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("Multipart inválido: {e}")})),
        )
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_string);
            data = Some(field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": format!("No se pudo leer el fichero subido: {e}")})),
                )
            })?);
        }
    }

    let (filename, data) = match (filename, data) {
        (Some(f), Some(d)) => (f, d),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Falta el campo multipart 'file'."})),
            ));
        }
    };

    let extension = Path::new(&filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("")
        .to_lowercase();

    // La extensión se valida antes de registrar nada.
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Allowed file types are .pdf, .docx and .html."
            })),
        ));
    }

    // El fichero se escribe a una ruta temporal para que los cargadores
    // trabajen sobre disco, igual que con cualquier otra ruta.
    let temp_path = std::env::temp_dir().join(format!("documind_{}.{extension}", Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&temp_path, &data).await {
        error!("No se pudo escribir el fichero temporal: {e}");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "No se pudo almacenar el fichero subido."})),
        ));
    }

    let mime_type = MimeGuess::from_path(Path::new(&filename))
        .first()
        .map(|m| m.to_string());

    // 1) Alta en el registro de documentos; 2) indexación; 3) rollback del
    // registro si la indexación falla.
    let file_id = match neo4j_client::insert_document_record(&state.graph, &filename, mime_type)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!("Error registrando el documento {filename}: {e}");
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "No se pudo registrar el documento."})),
            ));
        }
    };

    let indexed = ingest::index_document(state.store.as_ref(), &temp_path, file_id).await;
    let _ = tokio::fs::remove_file(&temp_path).await;

    if indexed {
        Ok(Json(json!({
            "message": format!("File {filename} has been successfully uploaded and indexed."),
            "file_id": file_id,
        })))
    } else {
        if let Err(e) = neo4j_client::delete_document_record(&state.graph, file_id).await {
            error!("No se pudo revertir el registro del documento {file_id}: {e}");
        }
        Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to index {filename}.")})),
        ))
    }
}

#[axum::debug_handler]
async fn list_docs_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match neo4j_client::list_documents(&state.graph).await {
        Ok(documents) => Ok(Json(json!(documents))),
        Err(e) => {
            error!("Error listando documentos: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[axum::debug_handler]
async fn delete_doc_handler(
    State(state): State<AppState>,
    Json(payload): Json<DeleteFileRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let deleted = ingest::delete_document(state.store.as_ref(), payload.file_id).await;

    if !deleted {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": format!("Failed to delete chunks for file_id {}.", payload.file_id)
            })),
        ));
    }

    if let Err(e) = neo4j_client::delete_document_record(&state.graph, payload.file_id).await {
        error!("Error borrando el registro del documento {}: {e}", payload.file_id);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Chunks deleted, but the document record could not be removed."})),
        ));
    }

    Ok(Json(json!({
        "message": format!("Document {} deleted.", payload.file_id)
    })))
}

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<QueryInput>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<serde_json::Value>)> {
    let model = match payload.model {
        Some(m) if ALLOWED_MODELS.contains(&m.as_str()) => m,
        Some(m) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Modelo no admitido: {m}")})),
            ));
        }
        None => state.config.llm_chat_model.clone(),
    };

    let session_id = state.sessions.resolve(payload.session_id);
    info!("Sesión {session_id}: nueva pregunta (modelo {model}).");

    // El historial pasa al dispatcher sin el turno actual; los dos mensajes
    // del turno se anotan después de obtener la respuesta.
    let history = state.sessions.history(&session_id);

    let llm: Arc<dyn ChatModel> = Arc::new(state.llm_manager.with_model(&model));
    let dispatcher = rag::Dispatcher::new(
        Retriever::new(state.store.clone()),
        llm,
        state.live_search.clone(),
    );

    let answer = dispatcher.answer(&payload.question, &history).await;

    state
        .sessions
        .append(&session_id, Role::User, &payload.question);
    state
        .sessions
        .append(&session_id, Role::Assistant, &answer);

    Ok(Json(QueryResponse {
        answer,
        session_id,
        model,
    }))
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.graph.run(query("RETURN 1")).await {
        Ok(_) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Error en el health check de Neo4j: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
