//! TOTP verification and enrollment lifecycle (RFC 6238).
//!
//! Codes are six digits over a 30-second step with HMAC-SHA-1 and one step
//! of tolerance either way. Verification is hand-rolled over the HMAC
//! primitive so the comparison stays constant-time and the clock can be
//! pinned in tests.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use janus_crypto::hash::{constant_time_eq, hmac_sha1};
use janus_crypto::random::{generate_backup_codes, generate_totp_secret};
use janus_crypto::{PasswordHasher, PasswordHashError};
use janus_model::TwoFactor;
use janus_storage::UserProvider;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Number of backup codes issued at setup.
const BACKUP_CODE_COUNT: usize = 10;

/// TOTP parameters.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Number of digits in a code.
    pub digits: u8,
    /// Time step in seconds.
    pub period: u32,
    /// Steps of clock tolerance checked either side of now.
    pub skew: u32,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            digits: 6,
            period: 30,
            skew: 1,
        }
    }
}

/// Result of a two-factor setup call.
///
/// The secret and backup codes cross the wire exactly once, here.
pub struct TotpSetup {
    /// Base32 secret for the authenticator app.
    pub secret: String,
    /// `otpauth://` provisioning URI.
    pub provisioning_uri: String,
    /// Plain backup codes; only hashes are stored.
    pub backup_codes: Vec<String>,
}

/// Two-factor enrollment manager.
pub struct TotpManager {
    users: Arc<dyn UserProvider>,
    hasher: Arc<PasswordHasher>,
    issuer: String,
    config: TotpConfig,
}

impl TotpManager {
    /// Creates a manager with default RFC 6238 parameters.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserProvider>,
        hasher: Arc<PasswordHasher>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            users,
            hasher,
            issuer: issuer.into(),
            config: TotpConfig::default(),
        }
    }

    /// Starts an enrollment: fresh secret, pending record, backup codes.
    ///
    /// Re-running setup replaces any previous enrollment, enabled or not.
    pub async fn setup(&self, user_id: Uuid) -> AuthResult<TotpSetup> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let secret = generate_totp_secret();
        let backup_codes = generate_backup_codes(BACKUP_CODE_COUNT);

        let mut hashes = Vec::with_capacity(backup_codes.len());
        for code in &backup_codes {
            hashes.push(self.hasher.hash(code).map_err(internal)?);
        }

        let enrollment = TwoFactor::pending(user_id, secret.clone(), hashes);
        self.users.upsert_two_factor(&enrollment).await?;

        let provisioning_uri = format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={digits}&period={period}",
            issuer = urlencoding::encode(&self.issuer),
            account = urlencoding::encode(&user.email),
            digits = self.config.digits,
            period = self.config.period,
        );

        Ok(TotpSetup {
            secret,
            provisioning_uri,
            backup_codes,
        })
    }

    /// Verifies a code against the pending enrollment and enables it.
    pub async fn verify_and_enable(&self, user_id: Uuid, code: &str) -> AuthResult<()> {
        let enrollment = self
            .users
            .get_two_factor(user_id)
            .await?
            .ok_or(AuthError::TotpNotSetup)?;

        if !verify_totp(&enrollment.secret, code, &self.config) {
            return Err(AuthError::InvalidTotp);
        }

        self.users.enable_two_factor(user_id, Utc::now()).await?;
        Ok(())
    }

    /// Verifies a code against an enabled enrollment.
    pub async fn verify(&self, user_id: Uuid, code: &str) -> AuthResult<()> {
        let enrollment = self.enabled_enrollment(user_id).await?;

        if verify_totp(&enrollment.secret, code, &self.config) {
            Ok(())
        } else {
            Err(AuthError::InvalidTotp)
        }
    }

    /// Login-path verification: TOTP first, backup codes as fallback.
    ///
    /// A matching backup code is consumed: its hash is removed so it can
    /// never be presented twice.
    pub async fn verify_login_code(&self, user_id: Uuid, code: &str) -> AuthResult<()> {
        let enrollment = self.enabled_enrollment(user_id).await?;

        if verify_totp(&enrollment.secret, code, &self.config) {
            return Ok(());
        }

        for (index, hash) in enrollment.backup_code_hashes.iter().enumerate() {
            match self.hasher.verify(code, hash) {
                Ok(()) => {
                    let mut remaining = enrollment.backup_code_hashes.clone();
                    remaining.remove(index);
                    self.users.update_backup_codes(user_id, &remaining).await?;
                    return Ok(());
                }
                Err(PasswordHashError::Mismatch | PasswordHashError::Malformed) => {}
                Err(err) => return Err(internal(err)),
            }
        }

        Err(AuthError::InvalidTotp)
    }

    /// Disables the enrollment. The secret is retained for audit.
    pub async fn disable(&self, user_id: Uuid) -> AuthResult<()> {
        self.users.disable_two_factor(user_id).await?;
        Ok(())
    }

    /// Checks whether the principal has an enabled enrollment.
    pub async fn is_enabled(&self, user_id: Uuid) -> AuthResult<bool> {
        Ok(self
            .users
            .get_two_factor(user_id)
            .await?
            .is_some_and(|e| e.enabled))
    }

    async fn enabled_enrollment(&self, user_id: Uuid) -> AuthResult<TwoFactor> {
        let enrollment = self
            .users
            .get_two_factor(user_id)
            .await?
            .ok_or(AuthError::TotpNotSetup)?;

        if !enrollment.enabled {
            return Err(AuthError::TotpNotSetup);
        }

        Ok(enrollment)
    }
}

fn internal(err: PasswordHashError) -> AuthError {
    AuthError::Internal(err.to_string())
}

/// Verifies a TOTP code against the wall clock.
#[must_use]
pub fn verify_totp(secret_b32: &str, code: &str, config: &TotpConfig) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    verify_totp_at(secret_b32, code, config, now)
}

/// Verifies a TOTP code at an explicit unix time.
#[must_use]
pub fn verify_totp_at(secret_b32: &str, code: &str, config: &TotpConfig, unix_time: u64) -> bool {
    let Some(secret) = decode_secret(secret_b32) else {
        return false;
    };

    let current = unix_time / u64::from(config.period);

    for offset in 0..=u64::from(config.skew) {
        let ahead = generate_hotp(&secret, current.saturating_add(offset), config.digits);
        if constant_time_eq(code.as_bytes(), ahead.as_bytes()) {
            return true;
        }

        if offset > 0 {
            let behind = generate_hotp(&secret, current.saturating_sub(offset), config.digits);
            if constant_time_eq(code.as_bytes(), behind.as_bytes()) {
                return true;
            }
        }
    }

    false
}

/// Generates the code for an explicit unix time, for enrollment tests and
/// client tooling.
#[must_use]
pub fn generate_totp_at(secret_b32: &str, config: &TotpConfig, unix_time: u64) -> Option<String> {
    let secret = decode_secret(secret_b32)?;
    let counter = unix_time / u64::from(config.period);
    Some(generate_hotp(&secret, counter, config.digits))
}

fn decode_secret(secret_b32: &str) -> Option<Vec<u8>> {
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, secret_b32)
}

/// HOTP per RFC 4226: HMAC-SHA-1, dynamic truncation, modulo 10^digits.
fn generate_hotp(secret: &[u8], counter: u64, digits: u8) -> String {
    let hmac = hmac_sha1(secret, &counter.to_be_bytes());

    let offset = (hmac.last().copied().unwrap_or(0) & 0x0f) as usize;
    let code = u32::from_be_bytes([
        hmac.get(offset).copied().unwrap_or(0) & 0x7f,
        hmac.get(offset + 1).copied().unwrap_or(0),
        hmac.get(offset + 2).copied().unwrap_or(0),
        hmac.get(offset + 3).copied().unwrap_or(0),
    ]);

    let code = code % 10_u32.pow(u32::from(digits));
    format!("{code:0width$}", width = digits as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_model::User;
    use janus_test_support::MemoryUserProvider;

    // RFC 4226 appendix D secret, base32-encoded.
    const RFC_SECRET_B32: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn hotp_matches_rfc4226_vectors() {
        let secret = b"12345678901234567890";
        let expected = ["755224", "287082", "359152", "969429", "338314", "254676"];

        for (counter, code) in expected.iter().enumerate() {
            assert_eq!(generate_hotp(secret, counter as u64, 6), *code);
        }
    }

    #[test]
    fn totp_matches_rfc6238_vector() {
        // RFC 6238 appendix B, T = 59s: the 8-digit vector is 94287082.
        let config = TotpConfig::default();
        assert_eq!(
            generate_totp_at(RFC_SECRET_B32, &config, 59).unwrap(),
            "287082"
        );
        assert!(verify_totp_at(RFC_SECRET_B32, "287082", &config, 59));
    }

    #[test]
    fn totp_accepts_adjacent_steps_only() {
        let config = TotpConfig::default();
        let at_90 = generate_totp_at(RFC_SECRET_B32, &config, 90).unwrap();

        // One step of skew either way
        assert!(verify_totp_at(RFC_SECRET_B32, &at_90, &config, 60));
        assert!(verify_totp_at(RFC_SECRET_B32, &at_90, &config, 120));
        // Two steps away is out of tolerance
        assert!(!verify_totp_at(RFC_SECRET_B32, &at_90, &config, 180));
    }

    #[test]
    fn wrong_code_fails() {
        let config = TotpConfig::default();
        assert!(!verify_totp_at(RFC_SECRET_B32, "000000", &config, 59));
        assert!(!verify_totp_at("not!base32!!", "287082", &config, 59));
    }

    fn manager(users: Arc<MemoryUserProvider>) -> TotpManager {
        TotpManager::new(users, Arc::new(PasswordHasher::with_defaults()), "janus")
    }

    async fn seeded_user(users: &MemoryUserProvider) -> Uuid {
        users.seed(User::new("a@b.c", "Alice", "$argon2id$stub".to_string()))
    }

    #[tokio::test]
    async fn setup_produces_pending_enrollment() {
        let users = MemoryUserProvider::new();
        let user_id = seeded_user(&users).await;
        let manager = manager(users.clone());

        let setup = manager.setup(user_id).await.unwrap();

        assert_eq!(setup.backup_codes.len(), 10);
        assert!(setup.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(setup.provisioning_uri.contains(&setup.secret));

        // Pending: does not gate login yet
        assert!(!manager.is_enabled(user_id).await.unwrap());
        assert!(matches!(
            manager.verify(user_id, "123456").await,
            Err(AuthError::TotpNotSetup)
        ));
    }

    #[tokio::test]
    async fn verify_and_enable_flips_the_gate() {
        let users = MemoryUserProvider::new();
        let user_id = seeded_user(&users).await;
        let manager = manager(users.clone());

        let setup = manager.setup(user_id).await.unwrap();
        let code = generate_totp_at(
            &setup.secret,
            &TotpConfig::default(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
        )
        .unwrap();

        manager.verify_and_enable(user_id, &code).await.unwrap();
        assert!(manager.is_enabled(user_id).await.unwrap());

        // And a live code now verifies through the login path
        manager.verify_login_code(user_id, &code).await.unwrap();
    }

    #[tokio::test]
    async fn enable_rejects_wrong_code() {
        let users = MemoryUserProvider::new();
        let user_id = seeded_user(&users).await;
        let manager = manager(users.clone());

        manager.setup(user_id).await.unwrap();
        assert!(matches!(
            manager.verify_and_enable(user_id, "000000").await,
            Err(AuthError::InvalidTotp)
        ));
        assert!(!manager.is_enabled(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn backup_code_is_single_use() {
        let users = MemoryUserProvider::new();
        let user_id = seeded_user(&users).await;
        let manager = manager(users.clone());

        let setup = manager.setup(user_id).await.unwrap();
        users
            .enable_two_factor(user_id, Utc::now())
            .await
            .unwrap();

        let backup = setup.backup_codes[0].clone();

        // First use succeeds and consumes the code
        manager.verify_login_code(user_id, &backup).await.unwrap();

        let remaining = users.get_two_factor(user_id).await.unwrap().unwrap();
        assert_eq!(remaining.backup_code_hashes.len(), 9);

        // Second use fails
        assert!(matches!(
            manager.verify_login_code(user_id, &backup).await,
            Err(AuthError::InvalidTotp)
        ));
    }

    #[tokio::test]
    async fn disable_clears_the_gate() {
        let users = MemoryUserProvider::new();
        let user_id = seeded_user(&users).await;
        let manager = manager(users.clone());

        manager.setup(user_id).await.unwrap();
        users.enable_two_factor(user_id, Utc::now()).await.unwrap();
        assert!(manager.is_enabled(user_id).await.unwrap());

        manager.disable(user_id).await.unwrap();
        assert!(!manager.is_enabled(user_id).await.unwrap());

        // Secret is retained
        let enrollment = users.get_two_factor(user_id).await.unwrap().unwrap();
        assert!(!enrollment.secret.is_empty());
    }
}
