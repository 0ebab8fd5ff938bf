use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::Duration;
use tracing::debug;

use super::claims::{Claims, Subject};
use crate::{clock::Clock, config::JwtConfig};

/// Signs and verifies stateless session tokens (HS256).
///
/// Tokens are not tracked server-side: a verified, unexpired token is honoured for its whole
/// lifetime, including after the subject changes their password.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
            clock,
        }
    }

    pub fn sign(&self, subject: &Subject) -> anyhow::Result<String> {
        let now = self.clock.now();
        let exp = now + self.ttl;
        let claims = Claims {
            sub: subject.user_id,
            email: subject.email.clone(),
            name: subject.name.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %subject.user_id, "jwt signed");
        Ok(token)
    }

    /// `None` for any token that is malformed, badly signed, for another issuer/audience,
    /// or expired. The reason is deliberately not reported.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        // expiry is checked below against the injected clock
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                return None;
            }
        };
        if claims.exp <= self.clock.now().unix_timestamp() {
            debug!(user_id = %claims.sub, "jwt expired");
            return None;
        }
        debug!(user_id = %claims.sub, "jwt verified");
        Some(claims)
    }
}
