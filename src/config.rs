use anyhow::Context;
use serde::Deserialize;

/// Placeholder signing secret for local development. Refused when `APP_ENV=production`.
pub const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret-do-not-deploy";

/// Upper bound for token lifetimes (one year).
const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    pub fn is_dev_secret(&self) -> bool {
        self.secret == DEV_JWT_SECRET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    pub url_base: String,
    pub sweep_secs: u64,
}

/// SMTP relay used for outbound mail. Present only when `EMAIL_HOST` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub production: bool,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub reset: ResetConfig,
    pub hash: HashConfig,
    pub email: Option<EmailConfig>,
    pub reminder_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let secret = match get("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(s) => s,
            None if production => anyhow::bail!("JWT_SECRET must be set when APP_ENV=production"),
            None => DEV_JWT_SECRET.to_string(),
        };
        if production && secret == DEV_JWT_SECRET {
            anyhow::bail!("JWT_SECRET is the development placeholder");
        }

        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "applytrack".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "applytrack-users".into()),
            ttl_minutes: ttl_or(&get, "JWT_TTL_MINUTES", 60)?,
        };

        let reset = ResetConfig {
            ttl_minutes: ttl_or(&get, "RESET_TTL_MINUTES", 30)?,
            url_base: get("RESET_URL_BASE")
                .unwrap_or_else(|| "http://localhost:5173/reset-password".into()),
            sweep_secs: parse_or(&get, "RESET_SWEEP_SECS", 300)?,
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_or(&get, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        let email = match get("EMAIL_HOST").filter(|s| !s.is_empty()) {
            Some(host) => {
                let user = get("EMAIL_USER").context("EMAIL_USER must be set with EMAIL_HOST")?;
                let pass = get("EMAIL_PASS").context("EMAIL_PASS must be set with EMAIL_HOST")?;
                Some(EmailConfig {
                    host,
                    port: parse_or(&get, "EMAIL_PORT", 587)?,
                    from: get("EMAIL_FROM").unwrap_or_else(|| user.clone()),
                    user,
                    pass,
                })
            }
            None => None,
        };

        Ok(Self {
            production,
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            jwt,
            reset,
            hash,
            email,
            reminder_interval_secs: parse_or(&get, "REMINDER_INTERVAL_SECS", 24 * 60 * 60)?,
        })
    }

    /// Cheap settings for tests: minimal argon2 cost, in-memory stores.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            production: false,
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            reset: ResetConfig {
                ttl_minutes: 30,
                url_base: "http://localhost:5173/reset-password".into(),
                sweep_secs: 0,
            },
            hash: HashConfig {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
            email: None,
            reminder_interval_secs: 0,
        }
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value")),
        None => Ok(default),
    }
}

fn ttl_or<F>(get: &F, key: &str, default: i64) -> anyhow::Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    let minutes = parse_or(get, key, default)?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("{key} must be between 1 and {MAX_TTL_MINUTES} minutes");
    }
    Ok(minutes)
}
