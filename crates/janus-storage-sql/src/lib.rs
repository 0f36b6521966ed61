//! # janus-storage-sql
//!
//! PostgreSQL implementations of the janus storage contracts, built on
//! `sqlx`. This is the durable backend: strong consistency, sweep-based
//! expiry, and the conditional single-row updates the security state
//! machine leans on (failed-attempt counters, one-shot code redemption).

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod audit;
pub mod client;
pub mod code;
pub mod consent;
mod entities;
pub mod error;
pub mod history;
pub mod pool;
pub mod reset;
pub mod scope;
pub mod session;
pub mod token;
pub mod user;

pub use audit::PgAuditStore;
pub use client::PgClientProvider;
pub use code::PgCodeProvider;
pub use consent::PgConsentProvider;
pub use history::PgPasswordHistoryProvider;
pub use pool::{PoolConfig, create_pool};
pub use reset::PgResetTicketProvider;
pub use scope::PgScopeProvider;
pub use session::PgSessionStore;
pub use token::PgTokenProvider;
pub use user::PgUserProvider;
