//! Per-client request admission.
//!
//! Each (client, policy class) pair owns a fixed window that opens on its
//! first request. The check and the increment happen under the map's shard
//! lock for that key, so concurrent requests from one client can never both
//! take the last slot.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{RateLimitConfig, WindowPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyClass {
    /// Register and login
    Auth,
    /// Job reads and stats
    Public,
    /// Scraper endpoints
    Ingest,
}

impl PolicyClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Public => "public",
            Self::Ingest => "ingest",
        }
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many requests, retry in {} seconds", retry_after.as_secs())]
pub struct RateLimited {
    pub limit: u32,
    /// Time left in the current window, rounded up to whole seconds.
    pub retry_after: Duration,
}

/// A request that was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Instant,
    count: u32,
}

pub struct RequestGate {
    enabled: bool,
    auth: WindowPolicy,
    public: WindowPolicy,
    ingest: WindowPolicy,
    windows: DashMap<(String, PolicyClass), Window>,
}

impl RequestGate {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            auth: config.auth,
            public: config.public,
            ingest: config.ingest,
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub const fn policy(&self, class: PolicyClass) -> WindowPolicy {
        match class {
            PolicyClass::Auth => self.auth,
            PolicyClass::Public => self.public,
            PolicyClass::Ingest => self.ingest,
        }
    }

    pub fn check(&self, client: &str, class: PolicyClass) -> Result<Admission, RateLimited> {
        self.check_at(client, class, Instant::now())
    }

    /// Admits or rejects one request from `client` at `now`.
    pub fn check_at(
        &self,
        client: &str,
        class: PolicyClass,
        now: Instant,
    ) -> Result<Admission, RateLimited> {
        let policy = self.policy(class);
        if !self.enabled {
            return Ok(Admission {
                limit: policy.max_requests,
                remaining: policy.max_requests,
            });
        }

        let length = Duration::from_secs(policy.window_seconds);
        let mut window = self
            .windows
            .entry((client.to_string(), class))
            .or_insert(Window {
                opened_at: now,
                count: 0,
            });

        if now.saturating_duration_since(window.opened_at) >= length {
            window.opened_at = now;
            window.count = 0;
        }

        if window.count >= policy.max_requests {
            let elapsed = now.saturating_duration_since(window.opened_at);
            return Err(RateLimited {
                limit: policy.max_requests,
                retry_after: round_up_secs(length.saturating_sub(elapsed)),
            });
        }

        window.count += 1;
        Ok(Admission {
            limit: policy.max_requests,
            remaining: policy.max_requests - window.count,
        })
    }

    /// Drops windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|(_, class), window| {
            let length = Duration::from_secs(self.policy(*class).window_seconds);
            now.saturating_duration_since(window.opened_at) < length
        });
        before.saturating_sub(self.windows.len())
    }

    #[must_use]
    pub fn tracked_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn spawn_purge_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.purge_expired(Instant::now());
                if removed > 0 {
                    debug!(removed, "Purged elapsed rate limit windows");
                }
            }
        })
    }
}

fn round_up_secs(d: Duration) -> Duration {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RequestGate {
        RequestGate::new(&RateLimitConfig::default())
    }

    #[test]
    fn test_public_policy_admits_100_then_rejects() {
        let gate = gate();
        let start = Instant::now();

        for i in 0..100 {
            let admission = gate
                .check_at("10.0.0.1", PolicyClass::Public, start + Duration::from_secs(i))
                .unwrap();
            assert_eq!(admission.remaining, 99 - u32::try_from(i).unwrap());
        }

        let now = start + Duration::from_secs(120);
        let rejected = gate
            .check_at("10.0.0.1", PolicyClass::Public, now)
            .unwrap_err();
        assert_eq!(rejected.limit, 100);
        assert_eq!(rejected.retry_after, Duration::from_secs(900 - 120));
    }

    #[test]
    fn test_window_resets_after_elapsing() {
        let gate = gate();
        let start = Instant::now();
        for _ in 0..5 {
            gate.check_at("a", PolicyClass::Auth, start).unwrap();
        }
        assert!(gate.check_at("a", PolicyClass::Auth, start).is_err());
        assert!(
            gate.check_at("a", PolicyClass::Auth, start + Duration::from_secs(899))
                .is_err()
        );
        assert!(
            gate.check_at("a", PolicyClass::Auth, start + Duration::from_secs(900))
                .is_ok()
        );
    }

    #[test]
    fn test_classes_and_clients_are_independent() {
        let gate = gate();
        let now = Instant::now();
        for _ in 0..5 {
            gate.check_at("a", PolicyClass::Auth, now).unwrap();
        }
        assert!(gate.check_at("a", PolicyClass::Auth, now).is_err());
        assert!(gate.check_at("a", PolicyClass::Public, now).is_ok());
        assert!(gate.check_at("a", PolicyClass::Ingest, now).is_ok());
        assert!(gate.check_at("b", PolicyClass::Auth, now).is_ok());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let gate = gate();
        let start = Instant::now();
        for _ in 0..50 {
            gate.check_at("agent", PolicyClass::Ingest, start).unwrap();
        }
        let rejected = gate
            .check_at("agent", PolicyClass::Ingest, start + Duration::from_millis(59_500))
            .unwrap_err();
        assert_eq!(rejected.retry_after, Duration::from_secs(1));
    }

    #[test]
    fn test_disabled_gate_admits_everything() {
        let gate = RequestGate::new(&RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        let now = Instant::now();
        for _ in 0..10 {
            assert!(gate.check_at("a", PolicyClass::Auth, now).is_ok());
        }
        assert_eq!(gate.tracked_windows(), 0);
    }

    #[test]
    fn test_purge_drops_only_elapsed_windows() {
        let gate = gate();
        let start = Instant::now();
        gate.check_at("a", PolicyClass::Ingest, start).unwrap();
        gate.check_at("a", PolicyClass::Public, start).unwrap();

        assert_eq!(gate.purge_expired(start + Duration::from_secs(61)), 1);
        assert_eq!(gate.tracked_windows(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_overadmit() {
        let gate = Arc::new(gate());
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| gate.check_at("shared", PolicyClass::Public, now).is_ok())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }
}
