use crate::metrics;
use cuadrilla_core::config::ClientConfig;
use cuadrilla_core::error::LoginError;
use cuadrilla_core::session::{Credential, Session};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_REJECTION: &str = "invalid credentials";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Error body of a refused login, e.g. `{"non_field_errors": ["..."]}`
#[derive(Deserialize, Default)]
struct LoginRejection {
    #[serde(default)]
    non_field_errors: Vec<String>,
    detail: Option<String>,
}

impl LoginRejection {
    fn into_message(self) -> String {
        self.non_field_errors
            .into_iter()
            .next()
            .or(self.detail)
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string())
    }
}

/// Obtains credentials from the auth API and installs them in the session
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: Session,
}

impl AuthClient {
    pub fn new(config: ClientConfig, session: Session) -> Self {
        Self::with_http(reqwest::Client::new(), config, session)
    }

    pub fn with_http(http: reqwest::Client, config: ClientConfig, session: Session) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, LoginError> {
        let request = LoginRequest { username, password };
        let response = match self
            .http
            .post(self.config.login_endpoint())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                warn!("Login could not reach the server: {}", e);
                metrics::record_login("unreachable");
                return Err(LoginError::Unreachable);
            }
            Err(e) => {
                metrics::record_login("error");
                return Err(LoginError::Unknown(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_client_error() {
            let rejection: LoginRejection = response.json().await.unwrap_or_default();
            let message = rejection.into_message();
            warn!("Login refused for {}: {}", username, message);
            metrics::record_login("rejected");
            return Err(LoginError::InvalidCredentials(message));
        }
        if !status.is_success() {
            metrics::record_login("error");
            return Err(LoginError::Unknown(format!("server answered {}", status)));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| LoginError::Unknown(e.to_string()))?;
        if body.token.trim().is_empty() {
            metrics::record_login("error");
            return Err(LoginError::Unknown("response carried no token".to_string()));
        }

        let credential = Credential::new(body.token);
        self.session.establish(credential.clone());
        metrics::record_login("ok");
        info!("Logged in as {}", username);
        Ok(credential)
    }

    pub fn logout(&self) -> bool {
        self.session.logout()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }
}
