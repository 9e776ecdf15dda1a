// src/services/credentials.rs

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::SecretPolicy;
use crate::error::{EngineError, EngineResult};
use crate::models::{Assignment, AssignmentDetail};

use super::{chrono_duration, Engine};

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";
const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

pub const OTP_DIGITS: usize = 6;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Otp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

fn random_token<R: Rng + ?Sized>(rng: &mut R, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

/// Login id + password for one assignment's lifetime. Drawn from the OS
/// CSPRNG; the password contains every character class.
pub fn generate_credentials(policy: &SecretPolicy) -> Credentials {
    let mut rng = OsRng;
    let login_id = format!(
        "{}{}",
        policy.login_prefix,
        random_token(&mut rng, ALNUM, policy.login_len)
    );

    let mut password: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS]
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    let rest = policy.password_len.saturating_sub(password.len());
    password.extend((0..rest).map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]));
    password.shuffle(&mut rng);

    Credentials {
        login_id,
        password: password.into_iter().map(char::from).collect(),
    }
}

pub fn generate_otp(now: DateTime<Utc>, policy: &SecretPolicy) -> Otp {
    let code = format!("{:06}", OsRng.gen_range(0..1_000_000u32));
    Otp { code, expires_at: now + chrono_duration(policy.otp_ttl) }
}

pub fn is_well_formed_otp(code: &str) -> bool {
    code.len() == OTP_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compares `candidate` against a stored digest without short-circuiting.
pub fn secret_matches(candidate: &str, stored_hash: Option<&str>) -> bool {
    let Some(stored) = stored_hash else {
        return false;
    };
    let computed = hash_secret(candidate);
    if computed.len() != stored.len() {
        return false;
    }
    computed
        .bytes()
        .zip(stored.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

impl Engine {
    /// Worker login with the credentials issued at allocation. Unknown ids
    /// and wrong passwords are indistinguishable to the caller.
    pub async fn assignment_login(
        &self,
        login_id: &str,
        password: &str,
    ) -> EngineResult<AssignmentDetail> {
        if login_id.trim().is_empty() || password.is_empty() {
            return Err(EngineError::Validation("login id and password are required".into()));
        }
        let assignment = self
            .store
            .assignment_by_login(login_id)
            .await?
            .ok_or(EngineError::InvalidCredentials)?;
        if !secret_matches(password, assignment.login_password_hash.as_deref()) {
            tracing::warn!(assignment_id = assignment.assignment_id, "assignment login rejected");
            return Err(EngineError::InvalidCredentials);
        }
        if !assignment.is_active() {
            return Err(EngineError::AlreadyResolved(assignment.assignment_id));
        }
        tracing::info!(assignment_id = assignment.assignment_id, "worker logged in");
        self.detail(assignment).await
    }

    /// There is no way to refresh an expired OTP; a new assignment is needed.
    pub fn reissue_otp(&self, _assignment_id: i64) -> EngineResult<()> {
        Err(EngineError::Unsupported("re-issuing an assignment OTP"))
    }

    pub(crate) async fn detail(&self, assignment: Assignment) -> EngineResult<AssignmentDetail> {
        let workers = self.store.workers(&assignment.worker_ids).await?;
        let resources = self.store.resources(&assignment.resource_ids).await?;
        Ok(AssignmentDetail { assignment, workers, resources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn login_id_has_prefix_and_length() {
        let policy = SecretPolicy::default();
        let c = generate_credentials(&policy);
        assert!(c.login_id.starts_with("wrk_"));
        assert_eq!(c.login_id.len(), policy.login_prefix.len() + policy.login_len);
        assert!(c.login_id[4..].bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn password_mixes_every_class() {
        let policy = SecretPolicy { password_len: 16, ..SecretPolicy::default() };
        for _ in 0..50 {
            let p = generate_credentials(&policy).password;
            assert_eq!(p.len(), 16);
            assert!(p.bytes().any(|b| b.is_ascii_uppercase()));
            assert!(p.bytes().any(|b| b.is_ascii_lowercase()));
            assert!(p.bytes().any(|b| b.is_ascii_digit()));
            assert!(p.bytes().any(|b| SYMBOLS.contains(&b)));
        }
    }

    #[test]
    fn otp_is_six_digits_with_ttl() {
        let now = Utc::now();
        let policy = SecretPolicy { otp_ttl: Duration::from_secs(600), ..SecretPolicy::default() };
        let otp = generate_otp(now, &policy);
        assert!(is_well_formed_otp(&otp.code));
        assert_eq!(otp.expires_at - now, chrono::Duration::minutes(10));
    }

    #[test]
    fn malformed_otps() {
        assert!(!is_well_formed_otp("12345"));
        assert!(!is_well_formed_otp("12345a"));
        assert!(!is_well_formed_otp("1234567"));
        assert!(is_well_formed_otp("000123"));
    }

    #[test]
    fn secrets_compare_by_digest() {
        let stored = hash_secret("s3cr3t!");
        assert!(secret_matches("s3cr3t!", Some(&stored)));
        assert!(!secret_matches("s3cr3t?", Some(&stored)));
        assert!(!secret_matches("s3cr3t!", None));
    }
}
