use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_INCIDENTS_URL: &str = "http://localhost:8000/api/cuadrilla/incidencias/";
pub const DEFAULT_AUTH_URL: &str = "http://localhost:8000/api/auth/";
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:8000/api";
pub const SESSION_FILE_NAME: &str = "session.json";

/// Backend locations and the credential file used by one client process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub incidents_url: String,
    pub auth_url: String,
    pub health_url: String,
    pub session_file: PathBuf,
}

impl ClientConfig {
    pub fn new(incidents_url: &str, auth_url: &str, health_url: &str, session_file: PathBuf) -> Self {
        Self {
            incidents_url: with_trailing_slash(incidents_url),
            auth_url: with_trailing_slash(auth_url),
            health_url: health_url.trim_end_matches('/').to_string(),
            session_file,
        }
    }

    pub fn incidents_endpoint(&self) -> &str {
        &self.incidents_url
    }

    pub fn incident_endpoint(&self, id: u64) -> String {
        format!("{}{}/", self.incidents_url, id)
    }

    /// `{base}{id}/{action}/`, e.g. `.../42/iniciar/`
    pub fn action_endpoint(&self, id: u64, action: &str) -> String {
        format!("{}{}/{}/", self.incidents_url, id, action)
    }

    pub fn login_endpoint(&self) -> String {
        format!("{}token/", self.auth_url)
    }

    pub fn health_endpoint(&self) -> String {
        format!("{}/health/", self.health_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_INCIDENTS_URL,
            DEFAULT_AUTH_URL,
            DEFAULT_HEALTH_URL,
            default_session_file(),
        )
    }
}

/// `$HOME/.cuadrilla/session.json`, or the working directory when HOME is unset
pub fn default_session_file() -> PathBuf {
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(".cuadrilla").join(SESSION_FILE_NAME)
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}
