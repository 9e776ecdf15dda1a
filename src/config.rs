// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

/// Escalation ladder timing. Ages are measured from a complaint's
/// `ladder_started_at`.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub interval: Duration,
    pub to_admin_after: Duration,
    pub to_superadmin_after: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            to_admin_after: Duration::from_secs(2 * 60),
            to_superadmin_after: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverduePolicy {
    pub interval: Duration,
    pub sla: Duration,
}

impl Default for OverduePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            sla: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Shape of the per-assignment secrets.
#[derive(Debug, Clone)]
pub struct SecretPolicy {
    pub login_prefix: String,
    pub login_len: usize,
    pub password_len: usize,
    pub otp_ttl: Duration,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self {
            login_prefix: "wrk_".into(),
            login_len: 8,
            password_len: 12,
            otp_ttl: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub escalation: EscalationPolicy,
    pub overdue: OverduePolicy,
    pub secrets: SecretPolicy,
    pub warning_threshold: i32,
    pub notify_webhook_url: Option<String>,
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn secs_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
    parse_var(name, default.as_secs()).map(Duration::from_secs)
}

impl Settings {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a local `.env`.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let esc = EscalationPolicy::default();
        let escalation = EscalationPolicy {
            interval: secs_var("ESCALATION_INTERVAL_SECS", esc.interval)?,
            to_admin_after: secs_var("ESCALATE_TO_ADMIN_AFTER_SECS", esc.to_admin_after)?,
            to_superadmin_after: secs_var(
                "ESCALATE_TO_SUPERADMIN_AFTER_SECS",
                esc.to_superadmin_after,
            )?,
        };

        let ovd = OverduePolicy::default();
        let overdue = OverduePolicy {
            interval: secs_var("OVERDUE_INTERVAL_SECS", ovd.interval)?,
            sla: secs_var("OVERDUE_SLA_SECS", ovd.sla)?,
        };

        let sec = SecretPolicy::default();
        let secrets = SecretPolicy {
            login_prefix: env::var("LOGIN_ID_PREFIX").unwrap_or(sec.login_prefix),
            login_len: parse_var("LOGIN_ID_LENGTH", sec.login_len)?,
            password_len: parse_var("LOGIN_PASSWORD_LENGTH", sec.password_len)?,
            otp_ttl: secs_var("OTP_TTL_SECS", sec.otp_ttl)?,
        };

        let settings = Settings {
            database_url,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_var("PORT", 8080)?,
            escalation,
            overdue,
            secrets,
            warning_threshold: parse_var("WARNING_THRESHOLD", 3)?,
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let esc = &self.escalation;
        if esc.interval.is_zero() || self.overdue.interval.is_zero() {
            bail!("scheduler intervals must be greater than zero");
        }
        if esc.to_superadmin_after < esc.to_admin_after {
            bail!("ESCALATE_TO_SUPERADMIN_AFTER_SECS must not be shorter than ESCALATE_TO_ADMIN_AFTER_SECS");
        }
        if self.secrets.login_len == 0 {
            bail!("LOGIN_ID_LENGTH must be at least 1");
        }
        // one character from each class
        if self.secrets.password_len < 4 {
            bail!("LOGIN_PASSWORD_LENGTH must be at least 4");
        }
        if self.warning_threshold < 1 {
            bail!("WARNING_THRESHOLD must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests() -> Self {
        Settings {
            database_url: String::new(),
            max_connections: 1,
            port: 0,
            escalation: EscalationPolicy::default(),
            overdue: OverduePolicy::default(),
            secrets: SecretPolicy::default(),
            warning_threshold: 3,
            notify_webhook_url: None,
        }
    }
}
