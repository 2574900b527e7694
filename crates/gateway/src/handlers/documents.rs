//! Document lifecycle handlers
//!
//! Upload (multipart, 202 + background ingestion), listing, section and
//! paragraph introspection, motivation extraction, and reparsing.

use crate::registry::{DocumentEntry, DocumentStatus};
use crate::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use veridoc_common::document::Entities;
use veridoc_common::errors::{AppError, Result};
use veridoc_common::motivations::{Motivation, MotivationExtractor};
use veridoc_ingestion::IngestOptions;

// Response DTOs

#[derive(Serialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub title: String,
    pub status: DocumentStatus,
}

#[derive(Serialize)]
pub struct DocumentListItem {
    pub document_id: String,
    pub title: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub struct SectionsResponse {
    pub document_id: String,
    pub title: String,
    pub sections: Vec<SectionSummary>,
    pub equation_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct SectionSummary {
    pub title: String,
    pub paragraph_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct ParagraphResponse {
    pub paragraph_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub equation_refs: Vec<String>,
}

#[derive(Serialize)]
pub struct MotivationsResponse {
    pub document_id: String,
    pub paragraphs: Vec<ParagraphMotivations>,
}

#[derive(Serialize)]
pub struct ParagraphMotivations {
    pub paragraph_id: String,
    pub motivations: Vec<Motivation>,
}

/// Strip path separators and control characters from an upload filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

fn ingest_options(state: &AppState) -> IngestOptions {
    IngestOptions {
        min_paragraph_len: state.config.ingest.min_paragraph_len,
        ..IngestOptions::default()
    }
}

/// Parse uploaded bytes into a document and record the outcome in the
/// registry. Runs on a blocking thread; parsing is pure CPU.
async fn ingest_task(
    state: AppState,
    document_id: String,
    title: String,
    filename: String,
    bytes: Vec<u8>,
) {
    let options = ingest_options(&state);

    let parse_result = tokio::task::spawn_blocking(move || {
        if filename.to_lowercase().ends_with(".pdf") {
            veridoc_ingestion::parse_pdf_bytes_to_document(&bytes, &title, &options)
        } else {
            let text = String::from_utf8_lossy(&bytes);
            veridoc_ingestion::parse_text_to_document(&text, &title, &options)
        }
    })
    .await;

    match parse_result {
        Ok(Ok(document)) => {
            tracing::info!(document_id = %document_id, "Ingestion complete");
            state.registry.mark_ready(&document_id, Arc::new(document));
        }
        Ok(Err(e)) => {
            tracing::warn!(document_id = %document_id, error = %e, "Ingestion failed");
            state.registry.mark_failed(&document_id, e.to_string());
        }
        Err(e) => {
            tracing::error!(document_id = %document_id, error = %e, "Ingestion task panicked");
            state
                .registry
                .mark_failed(&document_id, "internal ingestion failure".to_string());
        }
    }
}

/// Upload a document (multipart: `file` required, `title` optional).
/// Returns 202 immediately; ingestion continues in the background.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("invalid multipart body: {}", e),
        field: None,
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = sanitize_filename(field.file_name().unwrap_or("upload.txt"));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation {
                        message: format!("failed to read upload: {}", e),
                        field: Some("file".into()),
                    })?
                    .to_vec();
                upload = Some((filename, bytes));
            }
            Some("title") => {
                title = field.text().await.ok().map(|t| t.trim().to_string());
            }
            _ => {}
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;

    let limit = state.config.ingest.max_upload_bytes;
    if bytes.len() > limit {
        return Err(AppError::PayloadTooLarge {
            size: bytes.len(),
            limit,
        });
    }
    if bytes.is_empty() {
        return Err(AppError::Validation {
            message: "uploaded file is empty".to_string(),
            field: Some("file".into()),
        });
    }

    let document_id = Uuid::new_v4().to_string();
    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            PathBuf::from(&filename)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Untitled".to_string())
        });

    // Keep the source file for reparsing
    let storage_dir = PathBuf::from(&state.config.ingest.storage_dir);
    tokio::fs::create_dir_all(&storage_dir).await?;
    let stored_path = storage_dir.join(format!("{}_{}", document_id, filename));
    tokio::fs::write(&stored_path, &bytes).await?;

    state.registry.add(DocumentEntry::ingesting(
        document_id.clone(),
        title.clone(),
        Some(stored_path.display().to_string()),
    ));

    tracing::info!(document_id = %document_id, title = %title, bytes = bytes.len(), "Upload accepted");

    let task_state = state.clone();
    let task_id = document_id.clone();
    let task_title = title.clone();
    tokio::spawn(async move {
        ingest_task(task_state, task_id, task_title, filename, bytes).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id,
            title,
            status: DocumentStatus::Ingesting,
        }),
    ))
}

/// List all documents, newest first.
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentListItem>> {
    let items = state
        .registry
        .list_all()
        .into_iter()
        .map(|entry| DocumentListItem {
            document_id: entry.document_id,
            title: entry.title,
            status: entry.status,
            created_at: entry.created_at,
            error_message: entry.error_message,
        })
        .collect();

    Json(items)
}

/// Section layout of a ready document: titles and paragraph IDs only.
pub async fn get_sections(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<SectionsResponse>> {
    let document = state.registry.get_ready_document(&document_id)?;

    let sections = document
        .sections
        .iter()
        .map(|s| SectionSummary {
            title: s.title.clone(),
            paragraph_ids: s.paragraphs.iter().map(|p| p.paragraph_id.clone()).collect(),
        })
        .collect();

    Ok(Json(SectionsResponse {
        document_id,
        title: document.title.clone(),
        sections,
        equation_ids: document.equations.iter().map(|e| e.equation_id.clone()).collect(),
    }))
}

/// Fetch one paragraph by ID.
pub async fn get_paragraph(
    State(state): State<AppState>,
    Path((document_id, paragraph_id)): Path<(String, String)>,
) -> Result<Json<ParagraphResponse>> {
    let document = state.registry.get_ready_document(&document_id)?;

    let paragraph = document
        .paragraph(&paragraph_id)
        .ok_or_else(|| AppError::ParagraphNotFound {
            id: paragraph_id.clone(),
        })?;

    Ok(Json(ParagraphResponse {
        paragraph_id: paragraph.paragraph_id.clone(),
        text: paragraph.text.clone(),
        entities: paragraph.entities.clone(),
        equation_refs: paragraph.equation_refs.clone(),
    }))
}

/// Explicit author motivations for every paragraph that has any.
pub async fn get_motivations(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<MotivationsResponse>> {
    let document = state.registry.get_ready_document(&document_id)?;

    let extractor = MotivationExtractor::new();
    let paragraphs = extractor
        .extract_for_document(&document)
        .into_iter()
        .map(|(paragraph_id, motivations)| ParagraphMotivations {
            paragraph_id,
            motivations,
        })
        .collect();

    Ok(Json(MotivationsResponse {
        document_id,
        paragraphs,
    }))
}

/// Re-run ingestion from the stored source file. 202 on acceptance.
pub async fn reparse_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let entry = state
        .registry
        .get(&document_id)
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.clone(),
        })?;

    let file_path = entry.file_path.clone().ok_or_else(|| AppError::NotFound {
        resource_type: "source file".to_string(),
        id: document_id.clone(),
    })?;

    let bytes = tokio::fs::read(&file_path).await.map_err(|_| AppError::NotFound {
        resource_type: "source file".to_string(),
        id: document_id.clone(),
    })?;

    let mut refreshed = DocumentEntry::ingesting(
        entry.document_id.clone(),
        entry.title.clone(),
        Some(file_path.clone()),
    );
    refreshed.created_at = entry.created_at;
    state.registry.add(refreshed);

    let filename = PathBuf::from(&file_path)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.txt".to_string());

    let task_state = state.clone();
    let task_id = document_id.clone();
    let task_title = entry.title.clone();
    tokio::spawn(async move {
        ingest_task(task_state, task_id, task_title, filename, bytes).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id,
            title: entry.title,
            status: DocumentStatus::Ingesting,
        }),
    ))
}
