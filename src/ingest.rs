//! Indexación y borrado de documentos subidos.
//!
//! Flujo de indexación:
//!   1. Selección de cargador por extensión (.pdf, .docx, .html).
//!   2. Troceado en ventanas deslizantes de caracteres con solape.
//!   3. Etiquetado de cada chunk con el `file_id` del documento.
//!   4. Inserción en el vector store con embeddings recién calculados.
//!
//! Ambas operaciones públicas devuelven un booleano: el detalle del fallo
//! se registra en el log, nunca se propaga al llamador HTTP.

use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::Html;
use tracing::{error, info};

use crate::errors::RagError;
use crate::models::Chunk;
use crate::vector_store::VectorStore;

/// Tamaño de ventana en caracteres.
pub const CHUNK_SIZE: usize = 1000;
/// Solape entre ventanas consecutivas, en caracteres.
pub const CHUNK_OVERLAP: usize = 200;

/// Indexa un documento en el vector store. Devuelve `false` ante cualquier
/// fallo (extensión no soportada, fichero ilegible, error del store); el
/// llamador decide si revierte el registro del documento.
pub async fn index_document(store: &dyn VectorStore, path: &Path, file_id: i64) -> bool {
    match try_index(store, path, file_id).await {
        Ok(count) => {
            info!("Indexado {} con {count} chunks (file_id {file_id}).", path.display());
            true
        }
        Err(err) => {
            error!("Error indexando {}: {err}", path.display());
            false
        }
    }
}

/// Borra del vector store todos los chunks cuyo `file_id` coincida.
/// Sin garantía transaccional: se delega en la atomicidad del propio store.
pub async fn delete_document(store: &dyn VectorStore, file_id: i64) -> bool {
    match try_delete(store, file_id).await {
        Ok(deleted) => {
            info!("Borrados {deleted} chunks con file_id {file_id}.");
            true
        }
        Err(err) => {
            error!("Error borrando chunks con file_id {file_id}: {err}");
            false
        }
    }
}

async fn try_index(store: &dyn VectorStore, path: &Path, file_id: i64) -> Result<usize, RagError> {
    let text = load_document_text(path)?;

    let chunks: Vec<Chunk> = split_into_chunks(&text, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            file_id,
            index: index as i64,
            text,
        })
        .collect();

    if chunks.is_empty() {
        return Err(RagError::Indexing(format!(
            "el fichero {} no contiene texto útil",
            path.display()
        )));
    }

    store.add_chunks(&chunks).await?;
    Ok(chunks.len())
}

async fn try_delete(store: &dyn VectorStore, file_id: i64) -> Result<usize, RagError> {
    let found = store.count_by_file(file_id).await?;
    info!("Encontrados {found} chunks para file_id {file_id}.");
    store.delete_by_file(file_id).await
}

// ---------------------------------------------------------------------
// Cargadores por tipo de fichero
// ---------------------------------------------------------------------

/// Extrae el texto completo de un documento según su extensión.
pub fn load_document_text(path: &Path) -> Result<String, RagError> {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "pdf" => pdf_extract::extract_text(path).map_err(|e| {
            RagError::Indexing(format!("no se pudo extraer texto del PDF: {e}"))
        }),
        "docx" => extract_docx_text(path),
        "html" => {
            let raw = fs::read_to_string(path)
                .map_err(|e| RagError::Indexing(format!("no se pudo leer el HTML: {e}")))?;
            Ok(extract_html_text(&raw))
        }
        other => Err(RagError::UnsupportedFileType(format!(".{other}"))),
    }
}

/// Un .docx es un zip; el texto vive en `word/document.xml`. Se recorren los
/// eventos XML acumulando texto y marcando cada fin de párrafo `</w:p>`.
fn extract_docx_text(path: &Path) -> Result<String, RagError> {
    let file = fs::File::open(path)
        .map_err(|e| RagError::Indexing(format!("no se pudo abrir el .docx: {e}")))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| RagError::Indexing(format!(".docx corrupto: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| RagError::Indexing(format!(".docx sin word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| RagError::Indexing(format!("no se pudo leer word/document.xml: {e}")))?;

    let mut reader = Reader::from_str(&xml);
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                if let Ok(fragment) = t.unescape() {
                    text.push_str(&fragment);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => text.push('\n'),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RagError::Indexing(format!("XML inválido en el .docx: {e}")));
            }
            _ => {}
        }
    }
    Ok(text)
}

fn extract_html_text(raw: &str) -> String {
    let document = Html::parse_document(raw);
    let fragments: Vec<&str> = document.root_element().text().collect();
    fragments.join(" ")
}

// ---------------------------------------------------------------------
// Troceado
// ---------------------------------------------------------------------

/// Divide el texto en ventanas deslizantes de `chunk_size` caracteres con
/// `overlap` caracteres de solape. Determinista: el mismo texto produce
/// siempre la misma secuencia de chunks.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
