//! Sliding-window rate limiting for external AI calls.
//!
//! The limiter is an explicit capability selected once at construction:
//!
//! - [`RateLimiter::Budgeted`] — backed by a [`CounterStore`] (in-memory or
//!   SQLite). Uses the standard two-bucket sliding-window approximation:
//!   the previous window's count, weighted by how much of it still overlaps
//!   the rolling window, plus the current window's count.
//! - [`RateLimiter::Unbounded`] — fail-open: always allows. Constructed when
//!   no counter store is configured (`rate_limit.backend = "none"`). This is
//!   a deliberate availability-over-strictness choice; do not change it to
//!   fail-closed. Callers never branch on limiter configuration — both
//!   variants return the same [`RateDecision`] shape.
//!
//! Budget keys concatenate actor and endpoint, so different endpoints never
//! share budget. Denied requests still consume budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the rolling window (0 when denied).
    pub remaining: u64,
    /// Unix seconds when the current window ends.
    pub reset_at: i64,
}

/// Shared counter backend: atomic increment-and-read on windowed keys.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for (key, window_start) and return
    /// the post-increment count.
    async fn increment(&self, key: &str, window_start: i64) -> Result<u64>;

    /// Read the counter for (key, window_start) without incrementing.
    async fn get(&self, key: &str, window_start: i64) -> Result<u64>;

    /// Drop counters whose window started before `older_than` (TTL stand-in).
    async fn prune(&self, older_than: i64) -> Result<()>;
}

/// Process-local counter store.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<(String, i64), u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window_start: i64) -> Result<u64> {
        let mut counters = self.counters.lock().unwrap();
        let count = counters
            .entry((key.to_string(), window_start))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn get(&self, key: &str, window_start: i64) -> Result<u64> {
        let counters = self.counters.lock().unwrap();
        Ok(counters
            .get(&(key.to_string(), window_start))
            .copied()
            .unwrap_or(0))
    }

    async fn prune(&self, older_than: i64) -> Result<()> {
        let mut counters = self.counters.lock().unwrap();
        counters.retain(|(_, start), _| *start >= older_than);
        Ok(())
    }
}

/// SQLite counter store, shared across processes on one host.
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn increment(&self, key: &str, window_start: i64) -> Result<u64> {
        // Single statement, so concurrent callers cannot undercount
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_counters (key, window_start, count) VALUES (?, ?, 1)
            ON CONFLICT(key, window_start) DO UPDATE SET count = count + 1
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn get(&self, key: &str, window_start: i64) -> Result<u64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM rate_counters WHERE key = ? AND window_start = ?",
        )
        .bind(key)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0) as u64)
    }

    async fn prune(&self, older_than: i64) -> Result<()> {
        sqlx::query("DELETE FROM rate_counters WHERE window_start < ?")
            .bind(older_than)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Request-budget limiter guarding external AI calls.
pub enum RateLimiter {
    Budgeted {
        store: Arc<dyn CounterStore>,
        window_ms: i64,
    },
    Unbounded,
}

impl RateLimiter {
    pub fn budgeted(store: Arc<dyn CounterStore>, window: Duration) -> Self {
        RateLimiter::Budgeted {
            store,
            window_ms: window.as_millis() as i64,
        }
    }

    /// Fail-open limiter used when no counter store is configured.
    pub fn unbounded() -> Self {
        RateLimiter::Unbounded
    }

    /// Check (and consume) one unit of budget for (actor, endpoint).
    pub async fn check(&self, actor: &str, endpoint: &str, limit: u64) -> Result<RateDecision> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.check_at(now_ms, actor, endpoint, limit).await
    }

    async fn check_at(
        &self,
        now_ms: i64,
        actor: &str,
        endpoint: &str,
        limit: u64,
    ) -> Result<RateDecision> {
        match self {
            RateLimiter::Unbounded => Ok(RateDecision {
                allowed: true,
                remaining: limit,
                reset_at: now_ms / 1000,
            }),
            RateLimiter::Budgeted { store, window_ms } => {
                let window = *window_ms;
                let cur_start = now_ms - now_ms.rem_euclid(window);
                let prev_start = cur_start - window;
                let key = format!("{}:{}", actor, endpoint);

                let current = store.increment(&key, cur_start).await?;
                let previous = store.get(&key, prev_start).await?;
                store.prune(prev_start).await?;

                // Weight the previous window by how much of it still falls
                // inside the rolling window ending now.
                let elapsed = (now_ms - cur_start) as f64 / window as f64;
                let estimate = previous as f64 * (1.0 - elapsed) + current as f64;

                let allowed = estimate <= limit as f64;
                let remaining = if allowed {
                    (limit as f64 - estimate).floor() as u64
                } else {
                    0
                };

                Ok(RateDecision {
                    allowed,
                    remaining,
                    reset_at: (cur_start + window) / 1000,
                })
            }
        }
    }
}
