use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::HashConfig;

/// Salted argon2id hashing with configurable cost.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// False for a wrong password and for a digest that does not parse.
    /// Cost parameters are read from the digest itself.
    pub fn verify_password(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Runs [`Self::hash_password`] on the blocking pool.
    pub async fn hash(&self, plain: String) -> anyhow::Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&plain)).await?
    }

    /// Runs [`Self::verify_password`] on the blocking pool.
    pub async fn verify(&self, plain: String, hash: String) -> anyhow::Result<bool> {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify_password(&plain, &hash)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(&HashConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .expect("params")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let h = hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = h.hash_password(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains(password));
        assert!(h.verify_password(password, &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let h = hasher();
        let a = h.hash_password("secret1").unwrap();
        let b = h.hash_password("secret1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let h = hasher();
        let hash = h.hash_password("correct-horse-battery-staple").unwrap();
        assert!(!h.verify_password("wrong-password", &hash));
    }

    #[test]
    fn verify_is_false_on_malformed_hash() {
        let h = hasher();
        assert!(!h.verify_password("anything", "not-a-valid-hash"));
        assert!(!h.verify_password("anything", ""));
    }

    #[test]
    fn digest_carries_its_own_cost() {
        let cheap = hasher();
        let hash = cheap.hash_password("secret1").unwrap();
        let costlier = CredentialHasher::new(&HashConfig {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(costlier.verify_password("secret1", &hash));
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(CredentialHasher::new(&HashConfig {
            memory_kib: 8,
            iterations: 0,
            parallelism: 1,
        })
        .is_err());
    }

    #[tokio::test]
    async fn async_helpers_run_off_thread() {
        let h = hasher();
        let hash = h.hash("secret1".into()).await.unwrap();
        assert!(h.verify("secret1".into(), hash.clone()).await.unwrap());
        assert!(!h.verify("secret2".into(), hash).await.unwrap());
    }
}
