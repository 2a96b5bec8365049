use cuadrilla_core::dashboard::DashboardStats;
use cuadrilla_core::types::{BadgeTone, Incident, IncidentStatus};
use cuadrilla_core::workflow::{allowed_actions, Action};
use std::fmt::Write;

fn tone_marker(tone: BadgeTone) -> &'static str {
    match tone {
        BadgeTone::Neutral => "·",
        BadgeTone::Warning => "~",
        BadgeTone::Success => "✓",
        BadgeTone::Danger => "✗",
    }
}

pub fn badge(status: IncidentStatus) -> String {
    let badge = status.badge();
    format!("{} {}", tone_marker(badge.tone), badge.label)
}

fn command_hint(action: Action, id: u64) -> String {
    match action {
        Action::Start => format!("cuadrilla start {}", id),
        Action::UploadEvidence => format!("cuadrilla upload {} <FILE>... [--label <LABEL>]", id),
        Action::Finalize => format!("cuadrilla finalize {} --comment <TEXT>", id),
        Action::Reject => format!("cuadrilla reject {} --reason <TEXT>", id),
    }
}

pub fn render_list(incidents: &[&Incident]) -> String {
    if incidents.is_empty() {
        return "No incidents found.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:>6}  {:<14}  {:<10}  {:<32}  LOCATION", "ID", "STATUS", "CREATED", "TITLE");
    for incident in incidents {
        let _ = writeln!(
            out,
            "{:>6}  {:<14}  {:<10}  {:<32}  {}",
            format!("#{}", incident.id),
            badge(incident.status),
            incident.created_at.format("%Y-%m-%d"),
            truncate(&incident.title, 32),
            incident.location.as_deref().unwrap_or("-"),
        );
    }
    out
}

pub fn render_detail(incident: &Incident) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Incident #{}  [{}]", incident.id, badge(incident.status));
    let _ = writeln!(out, "Created {}", incident.created_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", incident.title);
    let _ = writeln!(out, "{}", incident.description);
    let _ = writeln!(
        out,
        "Location: {}",
        incident.location.as_deref().unwrap_or("not specified")
    );
    if let Some(reason) = &incident.rejection_reason {
        let _ = writeln!(out, "Rejected: {}", reason);
    }

    let _ = writeln!(out);
    if incident.evidence.is_empty() {
        let _ = writeln!(out, "No evidence");
    } else {
        let _ = writeln!(out, "Evidence ({}):", incident.evidence.len());
        for item in &incident.evidence {
            match &item.name {
                Some(name) => {
                    let _ = writeln!(out, "  - {} {}", name, item.url);
                }
                None => {
                    let _ = writeln!(out, "  - {}", item.url);
                }
            }
        }
    }

    let actions = allowed_actions(incident.status);
    if !actions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Actions:");
        for action in actions {
            let _ = writeln!(out, "  {}", command_hint(*action, incident.id));
        }
    }
    out
}

pub fn render_dashboard(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Assigned incidents: {}", stats.total);
    let rows = [
        (IncidentStatus::Pending, stats.pending),
        (IncidentStatus::InProgress, stats.in_progress),
        (IncidentStatus::Finalized, stats.finalized),
        (IncidentStatus::Rejected, stats.rejected),
    ];
    for (status, count) in rows {
        let _ = writeln!(out, "  {:<14} {}", badge(status), count);
    }
    let _ = writeln!(out, "Closed: {:.0}%", stats.closed_ratio() * 100.0);
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
