use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type IncidentId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "en_proceso")]
    InProgress,
    #[serde(rename = "finalizada")]
    Finalized,
    #[serde(rename = "rechazada")]
    Rejected,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 4] = [
        IncidentStatus::Pending,
        IncidentStatus::InProgress,
        IncidentStatus::Finalized,
        IncidentStatus::Rejected,
    ];

    /// Value used by the backend, both in payloads and in the `estado` query filter
    pub fn as_wire(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pendiente",
            IncidentStatus::InProgress => "en_proceso",
            IncidentStatus::Finalized => "finalizada",
            IncidentStatus::Rejected => "rechazada",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_wire() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Finalized | IncidentStatus::Rejected)
    }

    pub fn badge(&self) -> StatusBadge {
        match self {
            IncidentStatus::Pending => StatusBadge {
                label: "Pendiente",
                tone: BadgeTone::Neutral,
            },
            IncidentStatus::InProgress => StatusBadge {
                label: "En Proceso",
                tone: BadgeTone::Warning,
            },
            IncidentStatus::Finalized => StatusBadge {
                label: "Finalizada",
                tone: BadgeTone::Success,
            },
            IncidentStatus::Rejected => StatusBadge {
                label: "Rechazada",
                tone: BadgeTone::Danger,
            },
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Neutral,
    Warning,
    Success,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAttachment {
    pub id: u64,
    pub url: String,
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "estado")]
    pub status: IncidentStatus,
    #[serde(rename = "ubicacion", default)]
    pub location: Option<String>,
    #[serde(rename = "creadoEl")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "motivo_rechazo", default)]
    pub rejection_reason: Option<String>,
    #[serde(rename = "multimedias", default)]
    pub evidence: Vec<EvidenceAttachment>,
}

impl Incident {
    /// A rejection reason is present exactly when the incident is rejected
    pub fn is_consistent(&self) -> bool {
        let has_reason = self
            .rejection_reason
            .as_deref()
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false);
        has_reason == (self.status == IncidentStatus::Rejected)
    }
}
