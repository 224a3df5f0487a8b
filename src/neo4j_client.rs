use crate::config::AppConfig;
use crate::models::DocumentRecord;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea constraints básicos para las etiquetas usadas:
/// :Document (registro de subidas) y :Chunk (trozos con embedding).
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        // Document.id único
        "CREATE CONSTRAINT doc_id IF NOT EXISTS
         FOR (d:Document)
         REQUIRE d.id IS UNIQUE",
        // Chunk.id único
        "CREATE CONSTRAINT chunk_id IF NOT EXISTS
         FOR (c:Chunk)
         REQUIRE c.id IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints básicos creados).");
    Ok(())
}

// ---------------------------------------------------------------------
// Registro de documentos
// ---------------------------------------------------------------------

/// Inserta un registro :Document con id entero autoincremental y devuelve
/// el id asignado. El timestamp se guarda como cadena RFC 3339.
pub async fn insert_document_record(
    graph: &Graph,
    filename: &str,
    mime_type: Option<String>,
) -> Result<i64> {
    let ts = Utc::now().to_rfc3339();
    let mut cursor = graph
        .execute(
            query(
                "OPTIONAL MATCH (d:Document)
                 WITH coalesce(max(d.id), 0) + 1 AS next_id
                 CREATE (n:Document {id: next_id, filename: $filename,
                                     mime_type: $mime_type, upload_timestamp: $ts})
                 RETURN next_id AS id",
            )
            .param("filename", filename)
            .param("mime_type", mime_type.unwrap_or_default())
            .param("ts", ts),
        )
        .await?;

    let row = cursor
        .next()
        .await?
        .ok_or_else(|| anyhow!("La creación del registro de documento no devolvió un id"))?;
    row.get::<i64>("id")
        .ok_or_else(|| anyhow!("Falta campo 'id' en el resultado de Neo4j"))
}

/// Elimina el registro :Document. Los chunks asociados se borran aparte,
/// a través del vector store.
pub async fn delete_document_record(graph: &Graph, file_id: i64) -> Result<()> {
    graph
        .run(query("MATCH (d:Document {id: $id}) DETACH DELETE d").param("id", file_id))
        .await?;
    Ok(())
}

/// Lista todos los documentos registrados, los más recientes primero.
pub async fn list_documents(graph: &Graph) -> Result<Vec<DocumentRecord>> {
    let mut cursor = graph
        .execute(query(
            "MATCH (d:Document)
             RETURN d.id AS id, d.filename AS filename, d.upload_timestamp AS upload_timestamp
             ORDER BY d.upload_timestamp DESC",
        ))
        .await?;

    let mut documents = Vec::new();
    while let Some(row) = cursor.next().await? {
        let id: i64 = row
            .get("id")
            .ok_or_else(|| anyhow!("Falta campo 'id' en resultado de Neo4j"))?;
        let filename: String = row
            .get("filename")
            .ok_or_else(|| anyhow!("Falta campo 'filename' en resultado de Neo4j"))?;
        let ts: String = row
            .get("upload_timestamp")
            .ok_or_else(|| anyhow!("Falta campo 'upload_timestamp' en resultado de Neo4j"))?;

        let upload_timestamp = DateTime::parse_from_rfc3339(&ts)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        documents.push(DocumentRecord {
            id,
            filename,
            upload_timestamp,
        });
    }

    Ok(documents)
}
