pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod session;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod fake;

pub use api::*;
pub use config::*;
pub use dashboard::*;
pub use error::*;
pub use guard::*;
pub use navigation::*;
pub use session::*;
pub use types::*;
pub use workflow::*;
