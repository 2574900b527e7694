//! In-memory document registry
//!
//! Thread-safe storage for ingested documents. Documents live in memory and
//! are lost on restart; the registry owns all write-path locking, while the
//! pipeline only ever sees immutable `Arc<Document>` snapshots, so requests
//! read concurrently without coordination.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use veridoc_common::document::Document;
use veridoc_common::errors::{AppError, Result};

/// Status of a document in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Ingesting,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Ingesting => "ingesting",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// Entry in the document registry.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    /// Unique identifier for the document
    pub document_id: String,

    /// Document title
    pub title: String,

    /// Current ingestion status
    pub status: DocumentStatus,

    /// Path to the stored source file, when kept on disk
    pub file_path: Option<String>,

    /// When the document was uploaded
    pub created_at: DateTime<Utc>,

    /// The parsed document (None while ingesting or after failure)
    pub document: Option<Arc<Document>>,

    /// Error details when status is Failed
    pub error_message: Option<String>,
}

impl DocumentEntry {
    /// A fresh entry in the Ingesting state.
    pub fn ingesting(document_id: String, title: String, file_path: Option<String>) -> Self {
        Self {
            document_id,
            title,
            status: DocumentStatus::Ingesting,
            file_path,
            created_at: Utc::now(),
            document: None,
            error_message: None,
        }
    }
}

/// Thread-safe in-memory document registry.
#[derive(Default)]
pub struct DocumentRegistry {
    entries: RwLock<HashMap<String, DocumentEntry>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document entry.
    pub fn add(&self, entry: DocumentEntry) {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(entry.document_id.clone(), entry);
    }

    /// Get a snapshot of an entry by ID.
    pub fn get(&self, document_id: &str) -> Option<DocumentEntry> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(document_id)
            .cloned()
    }

    /// Get a Ready document for querying, with precise errors for the
    /// not-found and not-ready cases.
    pub fn get_ready_document(&self, document_id: &str) -> Result<Arc<Document>> {
        let entry = self.get(document_id).ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

        match entry.status {
            DocumentStatus::Ready => entry.document.ok_or_else(|| AppError::Internal {
                message: format!("document {} marked ready but missing body", document_id),
            }),
            other => Err(AppError::DocumentNotReady {
                id: document_id.to_string(),
                status: other.as_str().to_string(),
            }),
        }
    }

    /// Mark an entry Ready with its parsed document.
    pub fn mark_ready(&self, document_id: &str, document: Arc<Document>) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if let Some(entry) = entries.get_mut(document_id) {
            entry.status = DocumentStatus::Ready;
            entry.document = Some(document);
            entry.error_message = None;
        }
    }

    /// Mark an entry Failed with the error message.
    pub fn mark_failed(&self, document_id: &str, error_message: String) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if let Some(entry) = entries.get_mut(document_id) {
            entry.status = DocumentStatus::Failed;
            entry.document = None;
            entry.error_message = Some(error_message);
        }
    }

    /// Snapshot of all entries, newest first.
    pub fn list_all(&self) -> Vec<DocumentEntry> {
        let mut entries: Vec<DocumentEntry> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Remove an entry. Returns true when something was removed.
    pub fn remove(&self, document_id: &str) -> bool {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .remove(document_id)
            .is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
