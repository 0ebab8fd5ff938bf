use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::Duration;
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::CredentialHasher,
        repo::{MemoryUserStore, PgUserStore, UserStore},
        reset::{MemoryResetStore, ResetTokens},
        services::AuthService,
    },
    clock::{Clock, SystemClock},
    config::AppConfig,
    jobs::repo::{JobStore, MemoryJobStore, PgJobStore},
    notify::{LogNotifier, Notifier, SmtpNotifier},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub jobs: Arc<dyn JobStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub db: Option<PgPool>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifier: Arc<dyn Notifier> = match &config.email {
            Some(email) => {
                info!(host = %email.host, port = email.port, "mailing notices over smtp");
                Arc::new(SmtpNotifier::new(email)?)
            }
            None => {
                warn!("EMAIL_HOST not set; reset links and reminders are only logged");
                Arc::new(LogNotifier)
            }
        };

        match config.database_url.as_deref() {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                let users = Arc::new(PgUserStore::new(db.clone()));
                let jobs = Arc::new(PgJobStore::new(db.clone()));
                let mut state = Self::from_parts(config, users, jobs, notifier, clock)?;
                state.db = Some(db);
                Ok(state)
            }
            None => {
                warn!("DATABASE_URL not set; users and job applications are kept in memory");
                Self::from_parts(
                    config,
                    Arc::new(MemoryUserStore::new()),
                    Arc::new(MemoryJobStore::new()),
                    notifier,
                    clock,
                )
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        jobs: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let resets = ResetTokens::new(
            Arc::new(MemoryResetStore::new()),
            Duration::minutes(config.reset.ttl_minutes),
            clock.clone(),
        );
        let auth = AuthService::new(
            users,
            CredentialHasher::new(&config.hash)?,
            JwtKeys::new(&config.jwt, clock.clone()),
            resets,
            notifier.clone(),
            config.reset.url_base.clone(),
        )?;

        Ok(Self {
            config,
            auth: Arc::new(auth),
            jobs,
            notifier,
            clock,
            db: None,
        })
    }

    /// In-memory state with cheap hashing for tests.
    #[cfg(test)]
    pub fn fake(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryJobStore::new()),
            notifier,
            clock,
        )
        .expect("test state")
    }
}
