use crate::api::{EvidenceUpload, IncidentApi};
use crate::dashboard::DashboardStats;
use crate::error::{ValidationError, WorkflowError};
use crate::navigation::{Navigator, Route};
use crate::types::{Incident, IncidentId, IncidentStatus};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

pub const START_PROMPT: &str = "Start work on this incident?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    UploadEvidence,
    Finalize,
    Reject,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Action::Start => "start",
            Action::UploadEvidence => "upload evidence to",
            Action::Finalize => "finalize",
            Action::Reject => "reject",
        };
        f.write_str(verb)
    }
}

/// Actions a view may offer for an incident in `status`
pub fn allowed_actions(status: IncidentStatus) -> &'static [Action] {
    match status {
        IncidentStatus::Pending => &[Action::Start],
        IncidentStatus::InProgress => &[Action::UploadEvidence, Action::Finalize, Action::Reject],
        IncidentStatus::Finalized | IncidentStatus::Rejected => &[],
    }
}

pub fn is_allowed(status: IncidentStatus, action: Action) -> bool {
    allowed_actions(status).contains(&action)
}

/// Blocking yes/no gate asked before starting work
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Incident),
    Declined,
}

type InFlightSet = Arc<Mutex<HashSet<IncidentId>>>;

/// Proof that no other transition is outstanding for one incident.
/// Released when dropped; every transition consumes one.
pub struct InFlight {
    id: IncidentId,
    status: IncidentStatus,
    registry: InFlightSet,
}

impl InFlight {
    pub fn incident_id(&self) -> IncidentId {
        self.id
    }

    pub fn status(&self) -> IncidentStatus {
        self.status
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("id", &self.id)
            .field("status", &self.status)
            .finish()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut set) = self.registry.lock() {
            set.remove(&self.id);
        }
    }
}

pub struct WorkflowController<A> {
    api: A,
    navigator: Arc<dyn Navigator>,
    in_flight: InFlightSet,
}

impl<A: IncidentApi> WorkflowController<A> {
    pub fn new(api: A, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            api,
            navigator,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn is_in_flight(&self, id: IncidentId) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&id))
            .unwrap_or(false)
    }

    /// Claim the incident for one transition, based on the state the view currently shows
    pub fn begin(&self, incident: &Incident) -> Result<InFlight, WorkflowError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| WorkflowError::Busy(incident.id))?;
        if !set.insert(incident.id) {
            return Err(WorkflowError::Busy(incident.id));
        }
        Ok(InFlight {
            id: incident.id,
            status: incident.status,
            registry: self.in_flight.clone(),
        })
    }

    pub async fn load(&self, id: IncidentId) -> Result<Incident, WorkflowError> {
        let incident = self.api.get_incident(id).await?;
        warn_if_inconsistent(&incident);
        Ok(incident)
    }

    /// Read the incident back after `applied` succeeded. A failure here must not
    /// look like the transition itself failed.
    async fn refresh(&self, id: IncidentId, applied: Action) -> Result<Incident, WorkflowError> {
        match self.api.get_incident(id).await {
            Ok(incident) => {
                warn_if_inconsistent(&incident);
                Ok(incident)
            }
            Err(source) => {
                warn!("Incident {} updated ({}) but reload failed: {}", id, applied, source);
                Err(WorkflowError::Refresh { id, applied, source })
            }
        }
    }

    pub async fn list(&self, status: Option<IncidentStatus>) -> Result<Vec<Incident>, WorkflowError> {
        Ok(self.api.list_incidents(status).await?)
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, WorkflowError> {
        let incidents = self.api.list_incidents(None).await?;
        Ok(DashboardStats::from_incidents(&incidents))
    }

    pub async fn start(
        &self,
        ticket: InFlight,
        confirm: &dyn Confirm,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.check(&ticket, Action::Start)?;
        if !confirm.confirm(START_PROMPT) {
            info!("Start of incident {} declined", ticket.id);
            return Ok(TransitionOutcome::Declined);
        }

        self.api.start(ticket.id).await?;
        info!("Incident {} started", ticket.id);
        Ok(TransitionOutcome::Applied(
            self.refresh(ticket.id, Action::Start).await?,
        ))
    }

    pub async fn upload_evidence(
        &self,
        ticket: InFlight,
        upload: &EvidenceUpload,
    ) -> Result<Incident, WorkflowError> {
        self.check(&ticket, Action::UploadEvidence)?;
        if upload.files.is_empty() {
            return Err(ValidationError::NoFiles.into());
        }

        self.api.upload_evidence(ticket.id, upload).await?;
        info!("Uploaded {} evidence file(s) to incident {}", upload.files.len(), ticket.id);
        self.refresh(ticket.id, Action::UploadEvidence).await
    }

    pub async fn finalize(&self, ticket: InFlight, comment: &str) -> Result<Incident, WorkflowError> {
        self.check(&ticket, Action::Finalize)?;
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }

        self.api.finalize(ticket.id, comment).await?;
        info!("Incident {} finalized", ticket.id);
        self.refresh(ticket.id, Action::Finalize).await
    }

    /// Reject the incident; on success the caller is sent back to the list
    pub async fn reject(&self, ticket: InFlight, reason: &str) -> Result<Incident, WorkflowError> {
        self.check(&ticket, Action::Reject)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }

        self.api.reject(ticket.id, reason).await?;
        info!("Incident {} rejected", ticket.id);
        self.navigator.navigate(Route::IncidentList);
        self.refresh(ticket.id, Action::Reject).await
    }

    fn check(&self, ticket: &InFlight, action: Action) -> Result<(), WorkflowError> {
        if is_allowed(ticket.status, action) {
            return Ok(());
        }
        error!("Refusing to {} incident {} in state {}", action, ticket.id, ticket.status);
        Err(WorkflowError::IllegalTransition {
            id: ticket.id,
            status: ticket.status,
            action,
        })
    }
}

fn warn_if_inconsistent(incident: &Incident) {
    if !incident.is_consistent() {
        warn!(
            "Incident {} is {} but rejection reason present = {}",
            incident.id,
            incident.status,
            incident.rejection_reason.is_some()
        );
    }
}
