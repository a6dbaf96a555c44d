//! HTTP API over the record screens.
//!
//! `api_router()` returns a composable `Router`; `start_server()` binds it
//! and runs it in the background until told to stop.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ApiSession, ServerError};
