//! Single-use, time-limited password reset tokens.
//!
//! Per email the lifecycle is `NONE -> ISSUED -> (CONSUMED | EXPIRED)`; issuing again for the
//! same email replaces the live token. Expiry is checked lazily on consumption, and an
//! optional sweep only bounds memory.

use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::Clock;

/// 32 bytes = 256 bits of entropy.
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetEntry {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Keyed storage behind the registry. Implementations must make `take_live` atomic:
/// of any number of concurrent calls for the same token, at most one returns the email.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Stores `entry` for `email`, discarding whatever was there.
    async fn put(&self, email: &str, entry: ResetEntry) -> anyhow::Result<()>;
    /// Removes and returns the owner of `token` if it is present and unexpired at `now`.
    async fn take_live(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<Option<String>>;
    /// Deletes entries expired at `now`; returns how many were removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<usize>;
}

#[derive(Default)]
pub struct MemoryResetStore {
    entries: Mutex<HashMap<String, ResetEntry>>,
}

impl MemoryResetStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetStore {
    async fn put(&self, email: &str, entry: ResetEntry) -> anyhow::Result<()> {
        self.entries.lock().await.insert(email.to_string(), entry);
        Ok(())
    }

    async fn take_live(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let owner = entries
            .iter()
            .find(|(_, e)| e.token == token && e.expires_at > now)
            .map(|(email, _)| email.clone());
        if let Some(email) = &owner {
            entries.remove(email);
        }
        Ok(owner)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok(before - entries.len())
    }
}

/// Issues and consumes reset tokens over a pluggable [`ResetTokenStore`].
#[derive(Clone)]
pub struct ResetTokens {
    store: Arc<dyn ResetTokenStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResetTokens {
    pub fn new(store: Arc<dyn ResetTokenStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, ttl, clock }
    }

    /// Always succeeds for any email; callers decide whether the email deserves a token.
    pub async fn issue_for(&self, email: &str) -> anyhow::Result<String> {
        let token = generate_token();
        let expires_at = self.clock.now() + self.ttl;
        self.store
            .put(
                email,
                ResetEntry {
                    token: token.clone(),
                    expires_at,
                },
            )
            .await?;
        debug!(%email, %expires_at, "reset token issued");
        Ok(token)
    }

    /// Owner email of a live token, removing it. `None` for unknown, expired or already
    /// consumed tokens; nothing is mutated in that case.
    pub async fn consume(&self, token: &str) -> anyhow::Result<Option<String>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.store.take_live(token, self.clock.now()).await
    }

    pub async fn sweep(&self) -> anyhow::Result<usize> {
        self.store.purge_expired(self.clock.now()).await
    }

    /// Periodically purges expired entries until the runtime shuts down.
    pub fn spawn_sweeper(&self, every: StdDuration) -> tokio::task::JoinHandle<()> {
        let tokens = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.tick().await;
            loop {
                tick.tick().await;
                match tokens.sweep().await {
                    Ok(0) => {}
                    Ok(n) => info!(removed = n, "expired reset tokens swept"),
                    Err(e) => tracing::warn!(error = %e, "reset token sweep failed"),
                }
            }
        })
    }
}

fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn registry() -> (ResetTokens, Arc<MemoryResetStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryResetStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let tokens = ResetTokens::new(store.clone(), Duration::minutes(30), clock.clone());
        (tokens, store, clock)
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let (tokens, store, _) = registry();
        let token = tokens.issue_for("a@x.com").await.unwrap();

        assert_eq!(tokens.consume(&token).await.unwrap().as_deref(), Some("a@x.com"));
        assert_eq!(tokens.consume(&token).await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn reissue_replaces_previous_token() {
        let (tokens, _, _) = registry();
        let first = tokens.issue_for("a@x.com").await.unwrap();
        let second = tokens.issue_for("a@x.com").await.unwrap();

        assert_eq!(tokens.consume(&first).await.unwrap(), None);
        assert_eq!(tokens.consume(&second).await.unwrap().as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn expired_token_is_invalid_and_left_in_place() {
        let (tokens, store, clock) = registry();
        let token = tokens.issue_for("a@x.com").await.unwrap();

        clock.advance(Duration::minutes(29));
        clock.advance(Duration::seconds(59));
        let live = tokens.issue_for("b@x.com").await.unwrap();
        clock.advance(Duration::seconds(1));

        assert_eq!(tokens.consume(&token).await.unwrap(), None);
        assert_eq!(store.len().await, 2);
        assert_eq!(tokens.consume(&live).await.unwrap().as_deref(), Some("b@x.com"));
    }

    #[tokio::test]
    async fn unknown_or_empty_token_is_invalid() {
        let (tokens, store, _) = registry();
        tokens.issue_for("a@x.com").await.unwrap();
        assert_eq!(tokens.consume("deadbeef").await.unwrap(), None);
        assert_eq!(tokens.consume("").await.unwrap(), None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let (tokens, store, clock) = registry();
        tokens.issue_for("a@x.com").await.unwrap();
        clock.advance(Duration::minutes(20));
        tokens.issue_for("b@x.com").await.unwrap();
        clock.advance(Duration::minutes(15));

        assert_eq!(tokens.sweep().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_have_one_winner() {
        let (tokens, _, _) = registry();
        let token = tokens.issue_for("a@x.com").await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tokens = tokens.clone();
                let token = token.clone();
                tokio::spawn(async move { tokens.consume(&token).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overwritten_token_never_revives() {
        let (tokens, _, _) = registry();
        let old = tokens.issue_for("a@x.com").await.unwrap();

        let racer = {
            let tokens = tokens.clone();
            let old = old.clone();
            tokio::spawn(async move { tokens.consume(&old).await.unwrap() })
        };
        let new = tokens.issue_for("a@x.com").await.unwrap();
        racer.await.unwrap();

        // whichever side won the race, the old token is gone and the new one is live
        assert_eq!(tokens.consume(&old).await.unwrap(), None);
        assert_eq!(tokens.consume(&new).await.unwrap().as_deref(), Some("a@x.com"));
    }
}
