pub mod auth;
pub mod gateway;
pub mod metrics;

pub use auth::*;
pub use gateway::*;
