//! # janus-auth
//!
//! The authentication core of the janus identity provider:
//!
//! - [`SessionService`]: session creation, sliding renewal, termination
//! - [`Authenticator`]: the credential-check and account-lockout automaton,
//!   including the two-factor branch
//! - [`TotpManager`]: RFC 6238 verification and enrollment lifecycle
//! - [`PasswordManager`]: change and reset flows with history-based reuse
//!   prevention and the session cascade
//!
//! Every state transition these services make is audited through
//! [`AuditLogger`]; audit failures are logged and never block the flow.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod audit;
pub mod authenticator;
pub mod error;
pub mod password;
pub mod session;
pub mod totp;

pub use audit::AuditLogger;
pub use authenticator::{Authenticator, LoginOutcome};
pub use error::{AuthError, AuthResult};
pub use password::PasswordManager;
pub use session::SessionService;
pub use totp::{TotpManager, TotpSetup};
