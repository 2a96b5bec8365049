use crate::error::ApiError;
use crate::types::{Incident, IncidentId, IncidentStatus};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// One photo selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl EvidenceFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Guess from the extension; unknown files go out as octet-stream
    pub fn content_type(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            _ => "application/octet-stream",
        }
    }
}

/// A batch of files with an optional shared label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceUpload {
    pub label: Option<String>,
    pub files: Vec<EvidenceFile>,
}

impl EvidenceUpload {
    pub fn new(files: Vec<EvidenceFile>) -> Self {
        Self { label: None, files }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = if label.trim().is_empty() { None } else { Some(label) };
        self
    }
}

/// Remote incident resource. Implementations attach the session credential.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    async fn list_incidents(&self, status: Option<IncidentStatus>) -> Result<Vec<Incident>, ApiError>;
    async fn get_incident(&self, id: IncidentId) -> Result<Incident, ApiError>;
    async fn start(&self, id: IncidentId) -> Result<(), ApiError>;
    async fn upload_evidence(&self, id: IncidentId, upload: &EvidenceUpload) -> Result<(), ApiError>;
    async fn finalize(&self, id: IncidentId, comment: &str) -> Result<(), ApiError>;
    async fn reject(&self, id: IncidentId, reason: &str) -> Result<(), ApiError>;
}

/// Backend liveness check used by the session guard
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: IncidentApi + ?Sized> IncidentApi for Arc<T> {
    async fn list_incidents(&self, status: Option<IncidentStatus>) -> Result<Vec<Incident>, ApiError> {
        (**self).list_incidents(status).await
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, ApiError> {
        (**self).get_incident(id).await
    }

    async fn start(&self, id: IncidentId) -> Result<(), ApiError> {
        (**self).start(id).await
    }

    async fn upload_evidence(&self, id: IncidentId, upload: &EvidenceUpload) -> Result<(), ApiError> {
        (**self).upload_evidence(id, upload).await
    }

    async fn finalize(&self, id: IncidentId, comment: &str) -> Result<(), ApiError> {
        (**self).finalize(id, comment).await
    }

    async fn reject(&self, id: IncidentId, reason: &str) -> Result<(), ApiError> {
        (**self).reject(id, reason).await
    }
}

#[async_trait]
impl<T: HealthProbe + ?Sized> HealthProbe for Arc<T> {
    async fn probe(&self) -> Result<(), ApiError> {
        (**self).probe().await
    }
}
