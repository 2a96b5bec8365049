use crate::navigation::{Navigator, Route};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Opaque bearer token issued by the backend at login
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Durable storage for the credential, outliving the process
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<Credential>>;
    fn save(&self, credential: &Credential) -> anyhow::Result<()>;
    fn remove(&self) -> anyhow::Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
}

/// JSON document on disk holding the credential under the `token` key
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> anyhow::Result<Option<Credential>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let stored: StoredSession = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed session file {}", self.path.display()))?;
        Ok(Some(Credential::new(stored.token)))
    }

    fn save(&self, credential: &Credential) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&StoredSession {
            token: credential.expose().to_string(),
        })?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    pub fn contents(&self) -> Option<Credential> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> anyhow::Result<Option<Credential>> {
        Ok(self.contents())
    }

    fn save(&self, credential: &Credential) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot poisoned"))?;
        *slot = Some(credential.clone());
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot poisoned"))?;
        *slot = None;
        Ok(())
    }
}

struct SessionInner {
    credential: RwLock<Option<Credential>>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
}

/// Process-wide authentication context. Cloning shares the same credential.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Build the session from whatever the durable store currently holds
    pub fn open(store: Arc<dyn CredentialStore>, navigator: Arc<dyn Navigator>) -> Self {
        let credential = match store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Ignoring unreadable stored session: {:#}", e);
                None
            }
        };
        debug!("Session opened (authenticated: {})", credential.is_some());

        Self {
            inner: Arc::new(SessionInner {
                credential: RwLock::new(credential),
                store,
                navigator,
            }),
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner
            .credential
            .read()
            .ok()
            .and_then(|c| c.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .credential
            .read()
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    pub fn navigator(&self) -> Arc<dyn Navigator> {
        self.inner.navigator.clone()
    }

    /// Install a freshly issued credential in memory and in the durable store
    pub fn establish(&self, credential: Credential) {
        if let Err(e) = self.inner.store.save(&credential) {
            warn!("Credential kept in memory only: {:#}", e);
        }
        if let Ok(mut slot) = self.inner.credential.write() {
            *slot = Some(credential);
        }
        info!("Session established");
    }

    /// Drop the credential everywhere. Returns whether one was held.
    pub fn clear(&self) -> bool {
        let had_credential = match self.inner.credential.write() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => false,
        };
        if let Err(e) = self.inner.store.remove() {
            warn!("Failed to remove stored credential: {:#}", e);
        }
        had_credential
    }

    /// Explicit user logout; a second call finds nothing to clear and does nothing
    pub fn logout(&self) -> bool {
        if !self.clear() {
            return false;
        }
        info!("Logged out");
        self.inner.navigator.navigate(Route::Login);
        true
    }

    /// Forced logout after the backend refused the credential or became unreachable
    pub fn expire(&self) {
        if self.clear() {
            warn!("Session cleared, login required");
        }
        self.inner.navigator.navigate(Route::Login);
    }
}
