//! In-memory backend used by the unit tests of this crate.

use crate::api::{EvidenceUpload, HealthProbe, IncidentApi};
use crate::error::ApiError;
use crate::types::{EvidenceAttachment, Incident, IncidentId, IncidentStatus};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn incident(id: IncidentId, status: IncidentStatus) -> Incident {
    Incident {
        id,
        title: format!("Incident {}", id),
        description: "Reported by a resident".to_string(),
        status,
        location: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        rejection_reason: match status {
            IncidentStatus::Rejected => Some("duplicate".to_string()),
            _ => None,
        },
        evidence: Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(Option<IncidentStatus>),
    Get(IncidentId),
    Start(IncidentId),
    Upload(IncidentId, usize, Option<String>),
    Finalize(IncidentId, String),
    Reject(IncidentId, String),
}

#[derive(Default)]
pub struct FakeBackend {
    incidents: Mutex<HashMap<IncidentId, Incident>>,
    calls: Mutex<Vec<Call>>,
    fail_with: Mutex<Option<ApiError>>,
    fail_reads_with: Mutex<Option<ApiError>>,
}

impl FakeBackend {
    pub fn with(incidents: Vec<Incident>) -> Self {
        let backend = Self::default();
        {
            let mut map = backend.incidents.lock().unwrap();
            for incident in incidents {
                map.insert(incident.id, incident);
            }
        }
        backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Every later call fails with `err`
    pub fn fail_with(&self, err: ApiError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    /// Later `get_incident` calls fail with `err`; writes still succeed
    pub fn fail_reads_with(&self, err: ApiError) {
        *self.fail_reads_with.lock().unwrap() = Some(err);
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn update(&self, id: IncidentId, f: impl FnOnce(&mut Incident)) -> Result<(), ApiError> {
        let mut map = self.incidents.lock().unwrap();
        let incident = map.get_mut(&id).ok_or(ApiError::Status {
            status: 404,
            body: "not found".into(),
        })?;
        f(incident);
        Ok(())
    }
}

#[async_trait]
impl IncidentApi for FakeBackend {
    async fn list_incidents(&self, status: Option<IncidentStatus>) -> Result<Vec<Incident>, ApiError> {
        self.record(Call::List(status))?;
        let map = self.incidents.lock().unwrap();
        let mut incidents: Vec<Incident> = map
            .values()
            .filter(|i| status.map(|s| i.status == s).unwrap_or(true))
            .cloned()
            .collect();
        incidents.sort_by_key(|i| i.id);
        Ok(incidents)
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, ApiError> {
        self.record(Call::Get(id))?;
        if let Some(err) = self.fail_reads_with.lock().unwrap().clone() {
            return Err(err);
        }
        self.incidents
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                body: "not found".into(),
            })
    }

    async fn start(&self, id: IncidentId) -> Result<(), ApiError> {
        self.record(Call::Start(id))?;
        self.update(id, |i| i.status = IncidentStatus::InProgress)
    }

    async fn upload_evidence(&self, id: IncidentId, upload: &EvidenceUpload) -> Result<(), ApiError> {
        self.record(Call::Upload(id, upload.files.len(), upload.label.clone()))?;
        self.update(id, |i| {
            for file in &upload.files {
                let next = i.evidence.len() as u64 + 1;
                i.evidence.push(EvidenceAttachment {
                    id: next,
                    url: format!("https://cdn.test/{}", file.file_name),
                    name: upload.label.clone(),
                });
            }
        })
    }

    async fn finalize(&self, id: IncidentId, comment: &str) -> Result<(), ApiError> {
        self.record(Call::Finalize(id, comment.to_string()))?;
        self.update(id, |i| i.status = IncidentStatus::Finalized)
    }

    async fn reject(&self, id: IncidentId, reason: &str) -> Result<(), ApiError> {
        self.record(Call::Reject(id, reason.to_string()))?;
        self.update(id, |i| {
            i.status = IncidentStatus::Rejected;
            i.rejection_reason = Some(reason.to_string());
        })
    }
}

pub struct FakeProbe {
    pub healthy: bool,
    pub probes: AtomicUsize,
}

impl FakeProbe {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy,
            probes: AtomicUsize::new(0),
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe(&self) -> Result<(), ApiError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            Ok(())
        } else {
            Err(ApiError::Unreachable("connection refused".into()))
        }
    }
}
