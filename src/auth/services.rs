use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::Subject,
        jwt::JwtKeys,
        password::CredentialHasher,
        repo::UserStore,
        repo_types::{NewUser, StoreError, User},
        reset::ResetTokens,
    },
    error::ApiError,
    notify::Notifier,
};

pub const REGISTERED_MESSAGE: &str = "Registration successful!";
pub const RESET_REQUESTED_MESSAGE: &str = "If this email exists, reset instructions sent.";
pub const PASSWORD_RESET_MESSAGE: &str = "Password has been reset successfully.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Register, login, password reset and bearer-token identity resolution.
///
/// Holds no per-request state; every operation is a single transaction against the
/// user store and, for resets, the reset token registry.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    keys: JwtKeys,
    resets: ResetTokens,
    notifier: Arc<dyn Notifier>,
    reset_url_base: String,
    // verified against when the email is unknown so both login failures cost the same
    decoy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: CredentialHasher,
        keys: JwtKeys,
        resets: ResetTokens,
        notifier: Arc<dyn Notifier>,
        reset_url_base: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let decoy_hash = hasher.hash_password("decoy-password-never-matches")?;
        Ok(Self {
            users,
            hasher,
            keys,
            resets,
            notifier,
            reset_url_base: reset_url_base.into(),
            decoy_hash,
        })
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    pub fn resets(&self) -> &ResetTokens {
        &self.resets
    }

    /// Creates the account. No session token is issued; the caller logs in separately.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, ApiError> {
        if name.is_empty() || email.is_empty() || password.is_empty() {
            warn!("register with missing fields");
            return Err(ApiError::Validation("All fields required."));
        }
        if !is_valid_email(email) {
            warn!("register with invalid email");
            return Err(ApiError::Validation("Invalid email."));
        }

        if self.users.find_by_email(email).await?.is_some() {
            warn!("email already registered");
            return Err(ApiError::Conflict);
        }

        let password_hash = self.hasher.hash(password.to_string()).await?;
        let user = match self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
        {
            Ok(u) => u,
            // lost a race with a concurrent registration for the same email
            Err(StoreError::Duplicate) => {
                warn!("email already registered");
                return Err(ApiError::Conflict);
            }
            Err(StoreError::Other(e)) => return Err(ApiError::Internal(e)),
        };

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Returns a signed session token. Unknown email and wrong password fail identically.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let user = self.users.find_by_email(email).await?;
        let hash = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| self.decoy_hash.clone());
        let ok = self.hasher.verify(password.to_string(), hash).await?;

        let user = match user {
            Some(u) if ok => u,
            Some(u) => {
                warn!(user_id = %u.id, "login invalid password");
                return Err(ApiError::InvalidCredentials);
            }
            None => {
                warn!("login unknown email");
                return Err(ApiError::InvalidCredentials);
            }
        };

        let token = self.keys.sign(&Subject {
            user_id: user.id,
            email: user.email.clone(),
            name: Some(user.name.clone()),
        })?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// Issues and dispatches a reset link when the email belongs to a user. The returned
    /// message is the same in every case, including internal failures.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn request_reset(&self, email: &str) -> &'static str {
        match self.users.find_by_email(email).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!("reset requested for unknown email");
                return RESET_REQUESTED_MESSAGE;
            }
            Err(e) => {
                error!(error = %e, "reset lookup failed");
                return RESET_REQUESTED_MESSAGE;
            }
        }

        let token = match self.resets.issue_for(email).await {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "reset token issue failed");
                return RESET_REQUESTED_MESSAGE;
            }
        };

        let url = format!("{}/{}", self.reset_url_base.trim_end_matches('/'), token);
        if let Err(e) = self.notifier.send_reset_link(email, &url).await {
            error!(error = %e, "reset link delivery failed");
        }
        RESET_REQUESTED_MESSAGE
    }

    /// Consumes the reset token and stores a hash of the new password.
    #[instrument(skip_all)]
    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        if token.is_empty() || new_password.is_empty() {
            return Err(ApiError::Validation("All fields required."));
        }

        let Some(email) = self.resets.consume(token).await? else {
            warn!("invalid or expired reset token");
            return Err(ApiError::InvalidOrExpiredToken);
        };

        if self.users.find_by_email(&email).await?.is_none() {
            error!(%email, "reset token owner has no user record");
            return Err(ApiError::UserNotFound);
        }

        let password_hash = self.hasher.hash(new_password.to_string()).await?;
        if !self.users.update_password(&email, &password_hash).await? {
            error!(%email, "user vanished during password reset");
            return Err(ApiError::UserNotFound);
        }

        info!(%email, "password reset");
        Ok(())
    }

    /// Resolves a bearer token to the stored user it names.
    pub async fn identify(&self, token: Option<&str>) -> Result<User, ApiError> {
        let claims = token
            .and_then(|t| self.keys.verify(t))
            .ok_or(ApiError::Unauthorized)?;

        match self.users.find_by_email(&claims.email).await? {
            Some(user) if user.id == claims.sub => Ok(user),
            _ => {
                warn!(user_id = %claims.sub, "token subject not found");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
