//! # janus-server
//!
//! The HTTP surface of the janus identity provider: the axum router, the
//! request handlers for authentication, password lifecycle and OAuth2, the
//! session cookie plumbing, and the background maintenance sweeps.

#![forbid(unsafe_code)]
#![deny(warnings)]

pub mod cookie;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod maintenance;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
