//! Authentication error types.

use chrono::{DateTime, Utc};
use janus_crypto::PolicyViolation;
use janus_storage::StorageError;
use thiserror::Error;

/// Authentication operation errors.
///
/// "No such user" and "wrong password" both surface as
/// [`AuthError::InvalidCredentials`]; the distinction exists only in the
/// audit log.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Account is locked out.
    #[error("account is locked due to too many failed attempts")]
    AccountLocked {
        /// When the lockout expires, if known.
        until: Option<DateTime<Utc>>,
    },

    /// Account is not active.
    #[error("account is not active")]
    AccountInactive,

    /// TOTP code did not verify.
    #[error("invalid two-factor code")]
    InvalidTotp,

    /// No enabled two-factor enrollment for this account.
    #[error("two-factor authentication is not set up")]
    TotpNotSetup,

    /// Session token is unknown.
    #[error("session not found")]
    SessionNotFound,

    /// Session token is past its expiry.
    #[error("session has expired")]
    SessionExpired,

    /// Current password check failed during a password change.
    #[error("current password is incorrect")]
    WrongCurrentPassword,

    /// New password matches one of the recent ones.
    #[error("password was recently used")]
    PasswordReused,

    /// New password violates the complexity policy.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    /// Reset token is unknown.
    #[error("reset token not found")]
    TokenNotFound,

    /// Reset token has expired.
    #[error("reset token has expired")]
    TokenExpired,

    /// Reset token has already been consumed.
    #[error("reset token has already been used")]
    TokenUsed,

    /// Storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal error.
    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns the wire error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountLocked { .. } => "account_locked",
            Self::AccountInactive => "account_inactive",
            Self::InvalidTotp => "invalid_totp",
            Self::TotpNotSetup => "totp_not_setup",
            Self::SessionNotFound | Self::SessionExpired => "invalid_session",
            Self::WrongCurrentPassword => "wrong_current_password",
            Self::PasswordReused => "password_reused",
            Self::Policy(violation) => violation.code(),
            Self::TokenNotFound => "token_not_found",
            Self::TokenExpired => "token_expired",
            Self::TokenUsed => "token_used",
            Self::Storage(_) | Self::Internal(_) => "server_error",
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(AuthError::InvalidCredentials.code(), "invalid_credentials");
        assert_eq!(
            AuthError::AccountLocked { until: None }.code(),
            "account_locked"
        );
        assert_eq!(
            AuthError::Policy(PolicyViolation::TooCommon).code(),
            "policy_violation/too_common"
        );
        assert_eq!(
            AuthError::Storage(StorageError::Internal("boom".to_string())).code(),
            "server_error"
        );
    }

    #[test]
    fn lookup_and_password_failures_share_an_error() {
        // Anti-enumeration: both render identically on the wire.
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid email or password"
        );
    }
}
