//! Rate/queue governor for outbound model requests
//!
//! Serializes remote calls behind a minimum inter-request spacing, honors a
//! cooldown installed after a quota signal, drains queued work strictly FIFO,
//! and holds the two low-variance response caches (daily quote, web search).
//! Constructed once at startup and passed by handle; never a global.

use crate::error::AssistantError;
use crate::Result;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const MIN_REQUEST_SPACING: Duration = Duration::from_secs(3);
pub const QUOTA_COOLDOWN: Duration = Duration::from_secs(60);
pub const QUOTE_TTL: Duration = Duration::from_secs(60 * 60);
pub const SEARCH_TTL: Duration = Duration::from_secs(30 * 60);

/// A unit of queued work; failures are logged, never escalated.
pub type QueuedTask = BoxFuture<'static, Result<()>>;

struct PermitState {
    last_permit: Option<Instant>,
    cooldown_until: Option<Instant>,
}

struct CacheSlot {
    text: String,
    stored_at: Instant,
}

impl CacheSlot {
    fn fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

struct QueueState {
    tasks: VecDeque<QueuedTask>,
    draining: bool,
}

pub struct RateGovernor {
    min_spacing: Duration,
    quote_ttl: Duration,
    search_ttl: Duration,
    permits: Mutex<PermitState>,
    quote_cache: Mutex<Option<CacheSlot>>,
    search_cache: Mutex<HashMap<String, CacheSlot>>,
    queue: Mutex<QueueState>,
}

impl RateGovernor {
    pub fn new() -> Self {
        Self::with_config(MIN_REQUEST_SPACING, QUOTE_TTL, SEARCH_TTL)
    }

    pub fn with_config(min_spacing: Duration, quote_ttl: Duration, search_ttl: Duration) -> Self {
        Self {
            min_spacing,
            quote_ttl,
            search_ttl,
            permits: Mutex::new(PermitState {
                last_permit: None,
                cooldown_until: None,
            }),
            quote_cache: Mutex::new(None),
            search_cache: Mutex::new(HashMap::new()),
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                draining: false,
            }),
        }
    }

    // =============================
    // Permits
    // =============================

    /// Suspend until any cooldown and the minimum spacing have elapsed, then
    /// stamp the permit. The fair mutex is held across the wait, so permits
    /// are granted strictly in arrival order.
    pub async fn acquire_permit(&self) -> Result<()> {
        self.acquire_permit_with_cancel(&CancellationToken::new())
            .await
    }

    pub async fn acquire_permit_with_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AssistantError::Cancelled);
        }

        let mut state = tokio::select! {
            guard = self.permits.lock() => guard,
            _ = cancel.cancelled() => return Err(AssistantError::Cancelled),
        };

        let now = Instant::now();
        let mut due = now;
        if let Some(cooldown) = state.cooldown_until {
            if cooldown > due {
                due = cooldown;
            }
        }
        if let Some(last) = state.last_permit {
            let spaced = last + self.min_spacing;
            if spaced > due {
                due = spaced;
            }
        }

        if due > now {
            debug!(wait_ms = (due - now).as_millis() as u64, "Waiting for permit");
            tokio::select! {
                _ = sleep_until(due) => {}
                _ = cancel.cancelled() => return Err(AssistantError::Cancelled),
            }
        }

        state.cooldown_until = None;
        state.last_permit = Some(Instant::now());
        Ok(())
    }

    /// Install a cooldown deadline after a quota-exhaustion signal. The next
    /// permit will not resolve before it passes.
    pub async fn set_cooldown(&self, duration: Duration) {
        let mut state = self.permits.lock().await;
        state.cooldown_until = Some(Instant::now() + duration);
        warn!(cooldown_secs = duration.as_secs(), "Quota cooldown installed");
    }

    // =============================
    // FIFO Work Queue
    // =============================

    /// Append a task and make sure exactly one drainer is running. Tasks run
    /// in arrival order, each behind a fresh permit; a failure is logged and
    /// the drain continues.
    pub async fn enqueue(self: &Arc<Self>, task: QueuedTask) {
        let mut queue = self.queue.lock().await;
        queue.tasks.push_back(task);

        if !queue.draining {
            queue.draining = true;
            let governor = Arc::clone(self);
            tokio::spawn(async move {
                governor.drain_queue().await;
            });
        }
    }

    async fn drain_queue(&self) {
        loop {
            let task = {
                let mut queue = self.queue.lock().await;
                match queue.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };

            let outcome = async {
                self.acquire_permit().await?;
                task.await
            }
            .await;

            if let Err(error) = outcome {
                warn!("Queued task failed: {}", error);
            }
        }
    }

    // =============================
    // Caches
    // =============================

    pub async fn cached_quote(&self) -> Option<String> {
        let slot = self.quote_cache.lock().await;
        slot.as_ref()
            .filter(|slot| slot.fresh(self.quote_ttl))
            .map(|slot| slot.text.clone())
    }

    /// Only called on a successful remote response.
    pub async fn store_quote(&self, text: String) {
        let mut slot = self.quote_cache.lock().await;
        *slot = Some(CacheSlot {
            text,
            stored_at: Instant::now(),
        });
    }

    pub fn normalize_query(query: &str) -> String {
        query
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn cached_search(&self, query: &str) -> Option<String> {
        let key = Self::normalize_query(query);
        let cache = self.search_cache.lock().await;
        cache
            .get(&key)
            .filter(|slot| slot.fresh(self.search_ttl))
            .map(|slot| slot.text.clone())
    }

    pub async fn store_search(&self, query: &str, text: String) {
        let key = Self::normalize_query(query);
        let mut cache = self.search_cache.lock().await;
        // Expired keys pile up otherwise; sweep them on write.
        let ttl = self.search_ttl;
        cache.retain(|_, slot| slot.fresh(ttl));
        cache.insert(
            key,
            CacheSlot {
                text,
                stored_at: Instant::now(),
            },
        );
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_permits_respect_min_spacing() {
        let governor = RateGovernor::new();
        let start = Instant::now();

        governor.acquire_permit().await.unwrap();
        governor.acquire_permit().await.unwrap();
        governor.acquire_permit().await.unwrap();

        assert!(start.elapsed() >= MIN_REQUEST_SPACING * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_next_permit() {
        let governor = RateGovernor::new();
        governor.acquire_permit().await.unwrap();
        governor.set_cooldown(QUOTA_COOLDOWN).await;

        let start = Instant::now();
        governor.acquire_permit().await.unwrap();
        assert!(start.elapsed() >= QUOTA_COOLDOWN);

        // Cooldown is one-shot: the following permit only waits for spacing.
        let start = Instant::now();
        governor.acquire_permit().await.unwrap();
        assert!(start.elapsed() < QUOTA_COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_served_fifo() {
        let governor = Arc::new(RateGovernor::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3u32 {
            let governor = Arc::clone(&governor);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                governor.acquire_permit().await.unwrap();
                order.lock().await.push(i);
            }));
            // Let the task reach the permit queue before spawning the next.
            advance(Duration::from_millis(1)).await;
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_drains_in_arrival_order_despite_failure() {
        let governor = Arc::new(RateGovernor::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3u32 {
            let seen = Arc::clone(&seen);
            governor
                .enqueue(Box::pin(async move {
                    seen.lock().await.push(i);
                    if i == 1 {
                        return Err(AssistantError::ToolError("boom".to_string()));
                    }
                    Ok(())
                }))
                .await;
        }

        // Enough paused time for three spaced permits.
        for _ in 0..20 {
            if seen.lock().await.len() == 3 {
                break;
            }
            advance(MIN_REQUEST_SPACING).await;
            tokio::task::yield_now().await;
        }

        assert_eq!(*seen.lock().await, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_cache_expires() {
        let governor = RateGovernor::new();
        assert!(governor.cached_quote().await.is_none());

        governor.store_quote("Stay curious.".to_string()).await;
        assert_eq!(
            governor.cached_quote().await.as_deref(),
            Some("Stay curious.")
        );

        advance(QUOTE_TTL + Duration::from_secs(1)).await;
        assert!(governor.cached_quote().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_cache_is_keyed_by_normalized_query() {
        let governor = RateGovernor::new();
        governor
            .store_search("Rust  News", "rust headlines".to_string())
            .await;

        assert_eq!(
            governor.cached_search("  rust news ").await.as_deref(),
            Some("rust headlines")
        );
        assert!(governor.cached_search("python news").await.is_none());

        advance(SEARCH_TTL + Duration::from_secs(1)).await;
        assert!(governor.cached_search("rust news").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_releases_without_permit() {
        let governor = Arc::new(RateGovernor::new());
        governor.acquire_permit().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = governor.acquire_permit_with_cancel(&cancel).await;
        assert!(matches!(result, Err(AssistantError::Cancelled)));
    }
}
