use crate::types::IncidentId;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    IncidentList,
    IncidentDetail(IncidentId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::IncidentList => "/cuadrilla/incidencias".to_string(),
            Route::IncidentDetail(id) => format!("/cuadrilla/incidencias/{}", id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Receiver of navigation requests issued by the session and workflow layers
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that remembers every requested route, in order
#[derive(Debug, Default)]
pub struct RouteLog {
    routes: Mutex<Vec<Route>>,
}

impl RouteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes.lock().ok().and_then(|r| r.last().copied())
    }

    pub fn history(&self) -> Vec<Route> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Navigator for RouteLog {
    fn navigate(&self, route: Route) {
        debug!("Navigating to {}", route);
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route);
        }
    }
}
