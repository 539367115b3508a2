//! Clinic management backend.
//!
//! Patients, appointments and medicine stock behind bearer-token
//! authentication and a per-operation role gate.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod errors;
pub mod middleware;
pub mod observability;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use context::AppContext;
pub use errors::{ClinicError, ClinicResult};
pub use middleware::Middleware;
pub use response::ClinicResponse;
pub use router::{Route, Router};
pub use server::ClinicServer;
