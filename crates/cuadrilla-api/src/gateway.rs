use crate::metrics;
use async_trait::async_trait;
use cuadrilla_core::api::{EvidenceFile, EvidenceUpload, HealthProbe, IncidentApi};
use cuadrilla_core::config::ClientConfig;
use cuadrilla_core::error::ApiError;
use cuadrilla_core::session::Session;
use cuadrilla_core::types::{Incident, IncidentId, IncidentStatus};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

/// Single choke point for authenticated calls to the incident API
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: Session,
}

impl GatewayClient {
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

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `Authorization: Token <credential>` when a credential is held; sent bare otherwise
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.credential() {
            Some(credential) => {
                request.header(AUTHORIZATION, format!("Token {}", credential.expose()))
            }
            None => request,
        }
    }

    async fn send(&self, endpoint: &'static str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = match self.authorize(request).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request(endpoint, "unreachable");
                return Err(ApiError::Unreachable(e.to_string()));
            }
        };

        let status = response.status();
        debug!("{} -> {}", endpoint, status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("{} answered {}, clearing session", endpoint, status);
            metrics::record_auth_expired(endpoint);
            self.session.expire();
            return Err(ApiError::AuthExpired);
        }

        if !status.is_success() {
            metrics::record_request(endpoint, "error");
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!("{} error body unreadable: {}", endpoint, e);
                    String::new()
                }
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        metrics::record_request(endpoint, "ok");
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn evidence_part(file: &EvidenceFile) -> Part {
    let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
    part.mime_str(file.content_type())
        .unwrap_or_else(|_| Part::bytes(file.bytes.clone()).file_name(file.file_name.clone()))
}

/// The boundary header is left to reqwest, which generates it per request
fn evidence_form(upload: &EvidenceUpload) -> Form {
    let mut form = Form::new();
    if let Some(label) = &upload.label {
        form = form.text("nombre", label.clone());
    }
    for file in &upload.files {
        form = form.part("evidencias", evidence_part(file));
    }
    form
}

#[async_trait]
impl IncidentApi for GatewayClient {
    async fn list_incidents(&self, status: Option<IncidentStatus>) -> Result<Vec<Incident>, ApiError> {
        let mut request = self.http.get(self.config.incidents_endpoint());
        if let Some(status) = status {
            request = request.query(&[("estado", status.as_wire())]);
        }
        let response = self.send("list_incidents", request).await?;
        Self::decode(response).await
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, ApiError> {
        let request = self.http.get(self.config.incident_endpoint(id));
        let response = self.send("get_incident", request).await?;
        Self::decode(response).await
    }

    async fn start(&self, id: IncidentId) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.config.action_endpoint(id, "iniciar"))
            .json(&json!({}));
        self.send("start", request).await?;
        Ok(())
    }

    async fn upload_evidence(&self, id: IncidentId, upload: &EvidenceUpload) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.config.action_endpoint(id, "subir-evidencia"))
            .multipart(evidence_form(upload));
        self.send("upload_evidence", request).await?;
        Ok(())
    }

    async fn finalize(&self, id: IncidentId, comment: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.config.action_endpoint(id, "finalizar"))
            .json(&json!({ "comentario": comment }));
        self.send("finalize", request).await?;
        Ok(())
    }

    async fn reject(&self, id: IncidentId, reason: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.config.action_endpoint(id, "rechazar"))
            .json(&json!({ "motivo_rechazo": reason }));
        self.send("reject", request).await?;
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for GatewayClient {
    async fn probe(&self) -> Result<(), ApiError> {
        let result = match self.http.get(self.config.health_endpoint()).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(ApiError::Status {
                status: response.status().as_u16(),
                body: String::new(),
            }),
            Err(e) => Err(ApiError::Unreachable(e.to_string())),
        };
        metrics::record_probe(result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuadrilla_core::navigation::{Route, RouteLog};
    use cuadrilla_core::session::{Credential, MemoryCredentialStore};
    use mockito::{Matcher, Server};
    use std::path::PathBuf;
    use std::sync::Arc;

    const INCIDENT_42: &str = r#"{"id": 42, "titulo": "Bache", "descripcion": "Bache profundo", "estado": "en_proceso", "creadoEl": "2024-03-01T12:30:00Z", "multimedias": []}"#;

    struct Harness {
        gateway: GatewayClient,
        session: Session,
        store: Arc<MemoryCredentialStore>,
        routes: Arc<RouteLog>,
    }

    fn config_for(url: &str) -> ClientConfig {
        ClientConfig::new(
            &format!("{}/api/cuadrilla/incidencias/", url),
            &format!("{}/api/auth/", url),
            &format!("{}/api", url),
            PathBuf::from("unused.json"),
        )
    }

    fn harness(url: &str, token: Option<&str>) -> Harness {
        let store = Arc::new(match token {
            Some(token) => MemoryCredentialStore::with_credential(Credential::new(token)),
            None => MemoryCredentialStore::new(),
        });
        let routes = Arc::new(RouteLog::new());
        let session = Session::open(store.clone(), routes.clone());
        Harness {
            gateway: GatewayClient::new(config_for(url), session.clone()),
            session,
            store,
            routes,
        }
    }

    #[tokio::test]
    async fn test_get_incident_attaches_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/cuadrilla/incidencias/42/")
            .match_header("authorization", "Token abc123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(INCIDENT_42)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc123"));
        let incident = h.gateway.get_incident(42).await.unwrap();

        assert_eq!(incident.id, 42);
        assert_eq!(incident.status, IncidentStatus::InProgress);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/cuadrilla/incidencias/")
            .match_query(Matcher::UrlEncoded("estado".into(), "pendiente".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 1, "titulo": "a", "descripcion": "b", "estado": "pendiente", "creadoEl": "2024-03-01T12:30:00Z"}]"#)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        let incidents = h
            .gateway
            .list_incidents(Some(IncidentStatus::Pending))
            .await
            .unwrap();

        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].status, IncidentStatus::Pending);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_credential_still_sends_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/cuadrilla/incidencias/")
            .match_header("authorization", Matcher::Missing)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), None);
        let err = h.gateway.list_incidents(None).await.unwrap_err();

        assert_eq!(err, ApiError::AuthExpired);
        assert_eq!(h.routes.last(), Some(Route::Login));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_before_returning() {
        for status in [401, 403] {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("POST", "/api/cuadrilla/incidencias/42/iniciar/")
                .with_status(status)
                .with_body(r#"{"detail": "Invalid token."}"#)
                .create_async()
                .await;

            let h = harness(&server.url(), Some("stale"));
            let err = h.gateway.start(42).await.unwrap_err();

            assert_eq!(err, ApiError::AuthExpired);
            assert!(!h.session.is_authenticated());
            assert_eq!(h.store.contents(), None);
            assert_eq!(h.routes.last(), Some(Route::Login));
        }
    }

    #[tokio::test]
    async fn test_server_error_propagates_and_keeps_session() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/cuadrilla/incidencias/42/finalizar/")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        let err = h.gateway.finalize(42, "done").await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                body: "boom".into()
            }
        );
        assert!(h.session.is_authenticated());
        assert!(h.routes.history().is_empty());
    }

    #[tokio::test]
    async fn test_error_without_body_keeps_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/cuadrilla/incidencias/7/")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        let err = h.gateway.get_incident(7).await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                body: String::new()
            }
        );
        assert!(h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_start_posts_empty_object() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/cuadrilla/incidencias/42/iniciar/")
            .match_header("authorization", "Token abc")
            .match_body(Matcher::Json(json!({})))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        h.gateway.start(42).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_finalize_and_reject_bodies() {
        let mut server = Server::new_async().await;
        let finalize = server
            .mock("POST", "/api/cuadrilla/incidencias/42/finalizar/")
            .match_body(Matcher::Json(json!({"comentario": "pothole filled"})))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let reject = server
            .mock("POST", "/api/cuadrilla/incidencias/43/rechazar/")
            .match_body(Matcher::Json(json!({"motivo_rechazo": "duplicate report"})))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        h.gateway.finalize(42, "pothole filled").await.unwrap();
        h.gateway.reject(43, "duplicate report").await.unwrap();

        finalize.assert_async().await;
        reject.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_lets_transport_pick_boundary() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/cuadrilla/incidencias/42/subir-evidencia/")
            .match_header("authorization", "Token abc")
            .match_header(
                "content-type",
                Matcher::Regex(r"^multipart/form-data; boundary=.+$".into()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="nombre""#.into()),
                Matcher::Regex("after repair".into()),
                Matcher::Regex(r#"name="evidencias"; filename="front.jpg""#.into()),
                Matcher::Regex(r#"name="evidencias"; filename="side.png""#.into()),
            ]))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        let upload = EvidenceUpload::new(vec![
            EvidenceFile::new("front.jpg", b"jpeg-bytes".to_vec()),
            EvidenceFile::new("side.png", b"png-bytes".to_vec()),
        ])
        .with_label("after repair");
        h.gateway.upload_evidence(42, &upload).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/cuadrilla/incidencias/42/")
            .with_status(200)
            .with_body(r#"{"id": 42}"#)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        let err = h.gateway.get_incident(42).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let h = harness(&format!("http://{}", addr), Some("abc"));

        let err = h.gateway.get_incident(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Unreachable(_)));
        assert!(h.session.is_authenticated());
        assert!(h.gateway.probe().await.is_err());
    }

    #[tokio::test]
    async fn test_health_probe() {
        let mut server = Server::new_async().await;
        let healthy = server
            .mock("GET", "/api/health/")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url(), Some("abc"));
        assert!(h.gateway.probe().await.is_ok());
        healthy.assert_async().await;

        let mut down_server = Server::new_async().await;
        let _down = down_server
            .mock("GET", "/api/health/")
            .with_status(503)
            .create_async()
            .await;
        let down = harness(&down_server.url(), Some("abc"));
        assert_eq!(
            down.gateway.probe().await,
            Err(ApiError::Status {
                status: 503,
                body: String::new()
            })
        );
    }
}
