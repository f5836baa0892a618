//! HTTP endpoints for field clients.

pub mod auth;
pub mod error;
pub mod ingest;

pub use auth::{authenticate, login_handler};
pub use error::{AuthError, IngestError};
pub use ingest::{ingest, ingest_handler};
