use crate::types::{Incident, IncidentStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub finalized: usize,
    pub rejected: usize,
}

impl DashboardStats {
    pub fn from_incidents(incidents: &[Incident]) -> Self {
        let mut stats = Self::default();
        for incident in incidents {
            stats.total += 1;
            match incident.status {
                IncidentStatus::Pending => stats.pending += 1,
                IncidentStatus::InProgress => stats.in_progress += 1,
                IncidentStatus::Finalized => stats.finalized += 1,
                IncidentStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }

    /// Share of assigned incidents that reached a terminal state, 0.0 when none are assigned
    pub fn closed_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.finalized + self.rejected) as f64 / self.total as f64
        }
    }
}

/// Case-insensitive match on id, title, wire status or status label
pub fn matches_search(incident: &Incident, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    incident.id.to_string().contains(&needle)
        || incident.title.to_lowercase().contains(&needle)
        || incident.status.as_wire().contains(&needle)
        || incident.status.badge().label.to_lowercase().contains(&needle)
}

pub fn search<'a>(incidents: &'a [Incident], query: &str) -> Vec<&'a Incident> {
    incidents
        .iter()
        .filter(|incident| matches_search(incident, query))
        .collect()
}
