//! In-memory login throttling keyed by client identity.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::AuthThrottleConfig;

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
struct Entry {
    failures: VecDeque<Instant>,
    locked_until: Option<Instant>,
}

impl Entry {
    fn forget_before(&mut self, cutoff: Option<Instant>) {
        if let Some(cutoff) = cutoff {
            while self.failures.front().is_some_and(|t| *t < cutoff) {
                self.failures.pop_front();
            }
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.failures.is_empty() && self.locked_until.is_none_or(|until| until <= now)
    }
}

pub struct LoginThrottle {
    config: AuthThrottleConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(config: AuthThrottleConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `Err(retry_after_seconds)` while the key is locked out.
    pub async fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now()).await
    }

    /// Counts a failed attempt. Returns the lockout length in seconds when
    /// this failure triggers one.
    pub async fn record_failure(&self, key: &str) -> Option<u64> {
        self.record_failure_at(key, Instant::now()).await
    }

    pub async fn record_success(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let entries = self.entries.lock().await;

        match entries.get(key).and_then(|e| e.locked_until) {
            Some(until) if until > now => Err(until.duration_since(now).as_secs().max(1)),
            _ => Ok(()),
        }
    }

    async fn record_failure_at(&self, key: &str, now: Instant) -> Option<u64> {
        let window = Duration::from_secs(self.config.window_seconds);
        let mut entries = self.entries.lock().await;

        if entries.len() > PRUNE_THRESHOLD {
            let cutoff = now.checked_sub(window);
            entries.retain(|_, entry| {
                entry.forget_before(cutoff);
                !entry.is_stale(now)
            });
        }

        let entry = entries.entry(key.to_string()).or_default();
        if entry.locked_until.is_some_and(|until| until <= now) {
            entry.locked_until = None;
        }
        entry.forget_before(now.checked_sub(window));
        entry.failures.push_back(now);

        let max_attempts = self.config.max_attempts.max(1) as usize;
        if entry.failures.len() >= max_attempts {
            entry.failures.clear();
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            return Some(self.config.lockout_seconds);
        }

        None
    }
}

/// Resolves the identity used for throttling. Forwarded headers are only
/// honoured when the socket peer is a configured proxy.
#[must_use]
pub fn client_identity(
    peer: Option<IpAddr>,
    forwarded_for: Option<&str>,
    trusted_proxies: &[String],
) -> Option<String> {
    let peer = peer?;

    let peer_is_trusted = trusted_proxies
        .iter()
        .filter_map(|p| p.trim().parse::<IpAddr>().ok())
        .any(|proxy| proxy == peer);

    if peer_is_trusted
        && let Some(client) = forwarded_for
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .and_then(|first| first.parse::<IpAddr>().ok())
    {
        return Some(client.to_string());
    }

    Some(peer.to_string())
}
