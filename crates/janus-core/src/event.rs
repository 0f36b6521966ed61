//! Audit event model.
//!
//! Every authentication-relevant transition produces an append-only audit
//! record: who, what, from where, when. Writing the record must never block
//! or fail the operation being audited; that rule lives with the sink, the
//! model here just carries the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Successful password login.
    LoginSuccess,
    /// Successful login completed with a second factor.
    LoginSuccess2fa,
    /// Failed login attempt (detail carries the reason).
    LoginFailed,
    /// Account transitioned to locked.
    AccountLocked,
    /// Login requires a second factor; temp session issued.
    TwoFactorRequired,
    /// Second factor verified.
    TwoFactorVerified,
    /// Two-factor enrollment enabled.
    TwoFactorEnabled,
    /// Two-factor enrollment disabled.
    TwoFactorDisabled,
    /// Session terminated by the user.
    Logout,
    /// Password changed by the authenticated owner.
    PasswordChanged,
    /// Password reset ticket requested.
    PasswordResetRequested,
    /// Password reset completed with a ticket.
    PasswordReset,
    /// OAuth2 consent granted or updated.
    ConsentGranted,
    /// OAuth2 consent denied at the prompt.
    ConsentDenied,
    /// Tokens issued at the token endpoint.
    TokenIssued,
    /// Token revoked via the revocation endpoint.
    TokenRevoked,
}

impl AuditAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginSuccess2fa => "login_success_2fa",
            Self::LoginFailed => "login_failed",
            Self::AccountLocked => "account_locked",
            Self::TwoFactorRequired => "2fa_required",
            Self::TwoFactorVerified => "2fa_verified",
            Self::TwoFactorEnabled => "2fa_enabled",
            Self::TwoFactorDisabled => "2fa_disabled",
            Self::Logout => "logout",
            Self::PasswordChanged => "password_changed",
            Self::PasswordResetRequested => "password_reset_requested",
            Self::PasswordReset => "password_reset",
            Self::ConsentGranted => "consent_granted",
            Self::ConsentDenied => "consent_denied",
            Self::TokenIssued => "token_issued",
            Self::TokenRevoked => "token_revoked",
        }
    }
}

/// An append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: Uuid,

    /// Principal involved, when known. Failed lookups leave this unset.
    pub user_id: Option<Uuid>,

    /// What happened.
    pub action: AuditAction,

    /// Resource class the action touched (e.g. "authentication", "oauth2").
    pub resource: String,

    /// Source IP address.
    pub ip_address: String,

    /// User agent string.
    pub user_agent: String,

    /// Free-form detail, e.g. the failure reason.
    pub detail: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates a new event builder.
    #[must_use]
    pub fn builder(action: AuditAction) -> AuditEventBuilder {
        AuditEventBuilder::new(action)
    }
}

/// Builder for audit events.
pub struct AuditEventBuilder {
    action: AuditAction,
    user_id: Option<Uuid>,
    resource: String,
    ip_address: String,
    user_agent: String,
    detail: String,
}

impl AuditEventBuilder {
    /// Creates a new builder for the given action.
    #[must_use]
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            resource: "authentication".to_string(),
            ip_address: String::new(),
            user_agent: String::new(),
            detail: String::new(),
        }
    }

    /// Sets the principal.
    #[must_use]
    pub const fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the resource class.
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Sets the client address pair.
    #[must_use]
    pub fn client(mut self, ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the detail string.
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Builds the event, stamping id and timestamp.
    #[must_use]
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: Uuid::now_v7(),
            user_id: self.user_id,
            action: self.action,
            resource: self.resource,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            detail: self.detail,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_fields() {
        let user_id = Uuid::now_v7();
        let event = AuditEvent::builder(AuditAction::LoginFailed)
            .user(user_id)
            .client("10.0.0.1", "curl/8.0")
            .detail("invalid password")
            .build();

        assert_eq!(event.action, AuditAction::LoginFailed);
        assert_eq!(event.user_id, Some(user_id));
        assert_eq!(event.resource, "authentication");
        assert_eq!(event.ip_address, "10.0.0.1");
        assert_eq!(event.detail, "invalid password");
    }

    #[test]
    fn action_wire_names() {
        assert_eq!(AuditAction::LoginSuccess.as_str(), "login_success");
        assert_eq!(AuditAction::TwoFactorRequired.as_str(), "2fa_required");
        assert_eq!(AuditAction::AccountLocked.as_str(), "account_locked");
    }

    #[test]
    fn event_has_timestamp() {
        let before = Utc::now();
        let event = AuditEvent::builder(AuditAction::Logout).build();
        let after = Utc::now();

        assert!(event.timestamp >= before);
        assert!(event.timestamp <= after);
    }
}
