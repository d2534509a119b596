//! Replay protection for withdrawal claims
//!
//! A claim that authenticated once is remembered for as long as it could still
//! pass the freshness gate. Presenting it again inside that span is rejected
//! before any contract call. Memory is bounded: when full, expired entries go
//! first, then the oldest.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Claims seen within the last `ttl`, keyed by replay key
pub struct ReplayGuard {
    seen: Mutex<SeenClaims>,
}

struct SeenClaims {
    map: HashMap<[u8; 32], Instant>,
    max_size: usize,
    ttl: Duration,
}

impl SeenClaims {
    fn is_live(&self, key: &[u8; 32], now: Instant) -> bool {
        self.map
            .get(key)
            .is_some_and(|&t| now.duration_since(t) < self.ttl)
    }

    fn evict(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.map.retain(|_, &mut t| now.duration_since(t) < ttl);

        while self.map.len() >= self.max_size {
            match self.map.iter().min_by_key(|(_, t)| **t).map(|(k, _)| *k) {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

impl ReplayGuard {
    /// `max_size` is clamped to at least one entry
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(SeenClaims {
                map: HashMap::new(),
                max_size: max_size.max(1),
                ttl,
            }),
        }
    }

    /// Record `key`. Returns false if it was already recorded and has not expired.
    ///
    /// The check and the insert happen under one lock, so two concurrent
    /// submissions of the same claim cannot both pass.
    pub async fn check_and_record(&self, key: [u8; 32]) -> bool {
        let mut seen = self.seen.lock().await;
        let now = Instant::now();

        if seen.is_live(&key, now) {
            return false;
        }

        seen.evict(now);
        seen.map.insert(key, now);
        true
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.map.is_empty()
    }
}
