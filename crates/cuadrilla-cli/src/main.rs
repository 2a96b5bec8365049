mod prompt;
mod views;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use cuadrilla_api::auth::AuthClient;
use cuadrilla_api::gateway::GatewayClient;
use cuadrilla_core::api::{EvidenceFile, EvidenceUpload, HealthProbe};
use cuadrilla_core::config::{
    default_session_file, ClientConfig, DEFAULT_AUTH_URL, DEFAULT_HEALTH_URL, DEFAULT_INCIDENTS_URL,
};
use cuadrilla_core::dashboard::search;
use cuadrilla_core::error::{LoginError, WorkflowError};
use cuadrilla_core::guard::SessionGuard;
use cuadrilla_core::navigation::{Navigator, Route, RouteLog};
use cuadrilla_core::session::{FileCredentialStore, Session};
use cuadrilla_core::types::{IncidentId, IncidentStatus};
use cuadrilla_core::workflow::{Action, Confirm, TransitionOutcome, WorkflowController};
use prompt::{AssumeYes, StdinConfirm};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cuadrilla")]
#[command(about = "Work-crew incident client: review assigned incidents and move them through their workflow")]
struct Cli {
    /// Incident resource base URL
    #[arg(long, global = true, env = "CUADRILLA_API_URL", default_value = DEFAULT_INCIDENTS_URL)]
    api_url: String,
    /// Auth API base URL
    #[arg(long, global = true, env = "CUADRILLA_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    auth_url: String,
    /// Base URL serving the /health/ probe
    #[arg(long, global = true, env = "CUADRILLA_HEALTH_URL", default_value = DEFAULT_HEALTH_URL)]
    health_url: String,
    /// Where the session credential is kept
    #[arg(long, global = true, env = "CUADRILLA_SESSION_FILE")]
    session_file: Option<PathBuf>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session credential
    Login {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Check that the backend is alive
    Health,
    /// Summary of assigned incidents
    Dashboard,
    /// List assigned incidents
    List {
        /// pendiente, en_proceso, finalizada or rechazada
        #[arg(long, value_parser = parse_status)]
        status: Option<IncidentStatus>,
        /// Filter by id, title or status
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one incident and the actions it allows
    Show { id: IncidentId },
    /// Start work on a pending incident
    Start {
        id: IncidentId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Attach photo evidence to an incident in progress
    Upload {
        id: IncidentId,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Optional title for the batch
        #[arg(long)]
        label: Option<String>,
    },
    /// Close an incident in progress
    Finalize {
        id: IncidentId,
        #[arg(long)]
        comment: String,
    },
    /// Reject an incident in progress
    Reject {
        id: IncidentId,
        #[arg(long)]
        reason: String,
    },
}

fn parse_status(s: &str) -> Result<IncidentStatus, String> {
    IncidentStatus::from_wire(s).ok_or_else(|| {
        let valid: Vec<&str> = IncidentStatus::ALL.iter().map(|st| st.as_wire()).collect();
        format!("unknown status '{}', expected one of {}", s, valid.join(", "))
    })
}

struct App {
    session: Session,
    routes: Arc<RouteLog>,
    auth: AuthClient,
    gateway: GatewayClient,
    controller: WorkflowController<GatewayClient>,
    guard: SessionGuard<GatewayClient>,
}

impl App {
    fn new(config: ClientConfig) -> Self {
        let routes = Arc::new(RouteLog::new());
        let store = Arc::new(FileCredentialStore::new(config.session_file.clone()));
        let session = Session::open(store, routes.clone());

        let gateway = GatewayClient::new(config.clone(), session.clone());
        let auth = AuthClient::new(config, session.clone());
        let controller = WorkflowController::new(gateway.clone(), session.navigator());
        let guard = SessionGuard::new(session.clone(), gateway.clone());

        Self {
            session,
            routes,
            auth,
            gateway,
            controller,
            guard,
        }
    }

    /// Run a view behind the session guard
    async fn protected<F, Fut, T>(&self, view: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.guard.enter(view).await {
            Some(result) => result,
            None => Err(self.login_required()),
        }
    }

    fn login_required(&self) -> anyhow::Error {
        debug!("Redirected to {:?}", self.routes.last());
        anyhow!("not logged in or session expired, run `cuadrilla login`")
    }

    fn workflow_failure(&self, action: Action, err: WorkflowError) -> anyhow::Error {
        match err {
            WorkflowError::AuthExpired => self.login_required(),
            WorkflowError::Validation(reason) => anyhow!("{}", reason),
            WorkflowError::OperationFailed(cause) => {
                anyhow!("could not {} the incident: {}. Try again.", action, cause)
            }
            WorkflowError::Refresh { id, source, .. } => anyhow!(
                "the backend accepted the request, but reloading incident #{} failed: {}. Do not repeat it; run `cuadrilla show {}` to see the current state.",
                id,
                source,
                id
            ),
            other => anyhow!(other),
        }
    }

    fn read_failure(&self, err: WorkflowError) -> anyhow::Error {
        match err {
            WorkflowError::AuthExpired => self.login_required(),
            other => anyhow!("could not load incidents: {}", other),
        }
    }

    async fn login(&self, username: &str, password: Option<String>) -> anyhow::Result<()> {
        let password = match password {
            Some(password) => password,
            None => prompt::read_secret("Password")?,
        };
        match self.auth.login(username, &password).await {
            Ok(_) => {
                self.routes.navigate(Route::Dashboard);
                println!("Logged in as {}", username);
                Ok(())
            }
            Err(LoginError::InvalidCredentials(message)) => Err(anyhow!("{}", message)),
            Err(err) => Err(anyhow!(err)),
        }
    }

    fn logout(&self) {
        if self.auth.logout() {
            println!("Logged out");
        } else {
            println!("No active session");
        }
    }

    async fn health(&self) -> anyhow::Result<()> {
        self.gateway
            .probe()
            .await
            .map_err(|e| anyhow!("backend unavailable: {}", e))?;
        println!("Backend is up");
        Ok(())
    }

    async fn dashboard(&self) -> anyhow::Result<()> {
        self.protected(move || async move {
            let stats = self
                .controller
                .dashboard()
                .await
                .map_err(|e| self.read_failure(e))?;
            print!("{}", views::render_dashboard(&stats));
            Ok(())
        })
        .await
    }

    async fn list(&self, status: Option<IncidentStatus>, query: Option<String>) -> anyhow::Result<()> {
        self.protected(move || async move {
            let incidents = self
                .controller
                .list(status)
                .await
                .map_err(|e| self.read_failure(e))?;
            let shown = search(&incidents, query.as_deref().unwrap_or(""));
            print!("{}", views::render_list(&shown));
            Ok(())
        })
        .await
    }

    async fn show(&self, id: IncidentId) -> anyhow::Result<()> {
        self.protected(move || async move {
            let incident = self.controller.load(id).await.map_err(|e| self.read_failure(e))?;
            print!("{}", views::render_detail(&incident));
            Ok(())
        })
        .await
    }

    async fn start(&self, id: IncidentId, yes: bool) -> anyhow::Result<()> {
        self.protected(move || async move {
            let incident = self.controller.load(id).await.map_err(|e| self.read_failure(e))?;
            let ticket = self
                .controller
                .begin(&incident)
                .map_err(|e| self.workflow_failure(Action::Start, e))?;
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &StdinConfirm };

            match self
                .controller
                .start(ticket, confirm)
                .await
                .map_err(|e| self.workflow_failure(Action::Start, e))?
            {
                TransitionOutcome::Applied(updated) => print!("{}", views::render_detail(&updated)),
                TransitionOutcome::Declined => println!("Incident #{} left untouched", id),
            }
            Ok(())
        })
        .await
    }

    async fn upload(&self, id: IncidentId, files: Vec<PathBuf>, label: Option<String>) -> anyhow::Result<()> {
        self.protected(move || async move {
            let incident = self.controller.load(id).await.map_err(|e| self.read_failure(e))?;
            let mut evidence = Vec::with_capacity(files.len());
            for path in &files {
                evidence.push(read_evidence(path).await?);
            }
            let mut upload = EvidenceUpload::new(evidence);
            if let Some(label) = &label {
                upload = upload.with_label(label.as_str());
            }

            let ticket = self
                .controller
                .begin(&incident)
                .map_err(|e| self.workflow_failure(Action::UploadEvidence, e))?;
            let updated = self
                .controller
                .upload_evidence(ticket, &upload)
                .await
                .map_err(|e| self.workflow_failure(Action::UploadEvidence, e))?;
            print!("{}", views::render_detail(&updated));
            Ok(())
        })
        .await
    }

    async fn finalize(&self, id: IncidentId, comment: &str) -> anyhow::Result<()> {
        self.protected(move || async move {
            let incident = self.controller.load(id).await.map_err(|e| self.read_failure(e))?;
            let ticket = self
                .controller
                .begin(&incident)
                .map_err(|e| self.workflow_failure(Action::Finalize, e))?;
            let updated = self
                .controller
                .finalize(ticket, comment)
                .await
                .map_err(|e| self.workflow_failure(Action::Finalize, e))?;
            print!("{}", views::render_detail(&updated));
            Ok(())
        })
        .await
    }

    async fn reject(&self, id: IncidentId, reason: &str) -> anyhow::Result<()> {
        self.protected(move || async move {
            let incident = self.controller.load(id).await.map_err(|e| self.read_failure(e))?;
            let ticket = self
                .controller
                .begin(&incident)
                .map_err(|e| self.workflow_failure(Action::Reject, e))?;
            match self.controller.reject(ticket, reason).await {
                Ok(_) => println!("Incident #{} rejected", id),
                Err(WorkflowError::Refresh { source, .. }) => {
                    warn!("Reload after reject failed: {}", source);
                    println!("Incident #{} rejected, but reloading it failed", id);
                }
                Err(e) => return Err(self.workflow_failure(Action::Reject, e)),
            }

            if self.routes.last() == Some(Route::IncidentList) {
                let incidents = self
                    .controller
                    .list(None)
                    .await
                    .map_err(|e| self.read_failure(e))?;
                let all: Vec<_> = incidents.iter().collect();
                print!("{}", views::render_list(&all));
            }
            Ok(())
        })
        .await
    }
}

async fn read_evidence(path: &Path) -> anyhow::Result<EvidenceFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(EvidenceFile::new(file_name, bytes))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env();
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ClientConfig::new(
        &cli.api_url,
        &cli.auth_url,
        &cli.health_url,
        cli.session_file.unwrap_or_else(default_session_file),
    );
    info!("Incident API: {}", config.incidents_url);
    let app = App::new(config);
    debug!("Authenticated at startup: {}", app.session.is_authenticated());

    match cli.command {
        Commands::Login { username, password } => app.login(&username, password).await?,
        Commands::Logout => app.logout(),
        Commands::Health => app.health().await?,
        Commands::Dashboard => app.dashboard().await?,
        Commands::List { status, search } => app.list(status, search).await?,
        Commands::Show { id } => app.show(id).await?,
        Commands::Start { id, yes } => app.start(id, yes).await?,
        Commands::Upload { id, files, label } => app.upload(id, files, label).await?,
        Commands::Finalize { id, comment } => app.finalize(id, &comment).await?,
        Commands::Reject { id, reason } => app.reject(id, &reason).await?,
    }

    Ok(())
}
