use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::{AppResult, MatrixError};

/// Operation classes with independent budgets on the homeserver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    RoomCreation,
    Message,
    Invite,
    Registration,
    Join,
}

impl RateLimitCategory {
    pub const ALL: [RateLimitCategory; 5] = [
        RateLimitCategory::RoomCreation,
        RateLimitCategory::Message,
        RateLimitCategory::Invite,
        RateLimitCategory::Registration,
        RateLimitCategory::Join,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RateLimitCategory::RoomCreation => "room_creation",
            RateLimitCategory::Message => "message",
            RateLimitCategory::Invite => "invite",
            RateLimitCategory::Registration => "registration",
            RateLimitCategory::Join => "join",
        }
    }

    /// Rate and burst at the homeserver's default limits.
    fn base(&self) -> (f64, u32) {
        match self {
            RateLimitCategory::RoomCreation => (0.05, 2),
            RateLimitCategory::Message => (0.2, 10),
            RateLimitCategory::Invite => (0.3, 10),
            RateLimitCategory::Registration => (0.17, 3),
            RateLimitCategory::Join => (0.1, 10),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitMode {
    Disabled,
    Relaxed,
    #[default]
    Automatic,
    Conservative,
    Restricted,
}

impl RateLimitMode {
    /// Multiplier applied to the homeserver-default rates, `None` when
    /// limiting is off entirely.
    fn multiplier(&self) -> Option<f64> {
        match self {
            RateLimitMode::Disabled => None,
            RateLimitMode::Relaxed => Some(5.0),
            RateLimitMode::Automatic => Some(2.0),
            RateLimitMode::Conservative => Some(1.0),
            RateLimitMode::Restricted => Some(0.5),
        }
    }

    pub fn bucket_config(&self, category: RateLimitCategory) -> BucketConfig {
        let Some(multiplier) = self.multiplier() else {
            return BucketConfig::default();
        };
        let (rate, burst) = category.base();
        BucketConfig {
            rate: Some(rate * multiplier),
            burst,
            min_interval: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BucketConfig {
    /// Tokens per second. `None` disables the token budget.
    pub rate: Option<f64>,
    pub burst: u32,
    /// Floor between consecutive calls, independent of the token budget.
    pub min_interval: Option<Duration>,
}

impl BucketConfig {
    fn capacity(&self) -> f64 {
        self.burst.max(1) as f64
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    last_call: Option<Instant>,
}

/// A token bucket with an optional minimum inter-call interval.
pub struct Bucket {
    config: BucketConfig,
    state: Mutex<BucketState>,
}

impl Bucket {
    pub fn new(config: BucketConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: config.capacity(),
                last_refill: Instant::now(),
                last_call: None,
            }),
        }
    }

    /// Takes a token when one is available now, otherwise reports how long
    /// the caller would have to wait. State only changes on success.
    fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().expect("bucket mutex poisoned");
        let now = Instant::now();
        let mut delay = Duration::ZERO;

        if let Some(rate) = self.config.rate {
            let elapsed = now.saturating_duration_since(state.last_refill);
            state.tokens = (state.tokens + elapsed.as_secs_f64() * rate).min(self.config.capacity());
            state.last_refill = now;
            if state.tokens < 1.0 {
                delay = delay.max(Duration::from_secs_f64((1.0 - state.tokens) / rate));
            }
        }
        if let (Some(min_interval), Some(last_call)) = (self.config.min_interval, state.last_call) {
            let since = now.saturating_duration_since(last_call);
            if since < min_interval {
                delay = delay.max(min_interval - since);
            }
        }

        if delay.is_zero() {
            if self.config.rate.is_some() {
                state.tokens -= 1.0;
            }
            state.last_call = Some(now);
            Ok(())
        } else {
            Err(delay)
        }
    }

    pub fn allow(&self) -> bool {
        self.try_acquire().is_ok()
    }

    pub async fn wait(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Like [`wait`](Self::wait) but refuses without consuming a token when
    /// the required delay would pass `deadline`.
    pub async fn wait_until(&self, deadline: Instant) -> AppResult<()> {
        loop {
            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(delay) => {
                    if Instant::now() + delay > deadline {
                        return Err(MatrixError::limit_exceeded(
                            Some(delay.as_millis() as u64),
                            "rate limit wait would exceed deadline",
                        )
                        .into());
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// One bucket per category, built from the configured mode.
pub struct RateLimiter {
    mode: RateLimitMode,
    buckets: HashMap<RateLimitCategory, Bucket>,
}

impl RateLimiter {
    pub fn new(mode: RateLimitMode) -> Self {
        let buckets = RateLimitCategory::ALL
            .into_iter()
            .map(|c| (c, Bucket::new(mode.bucket_config(c))))
            .collect();
        Self { mode, buckets }
    }

    pub fn mode(&self) -> RateLimitMode {
        self.mode
    }

    pub fn allow(&self, category: RateLimitCategory) -> bool {
        if self.mode == RateLimitMode::Disabled {
            return true;
        }
        self.buckets[&category].allow()
    }

    pub async fn wait(&self, category: RateLimitCategory) {
        if self.mode == RateLimitMode::Disabled {
            return;
        }
        self.buckets[&category].wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automatic_mode_doubles_default_rates() {
        let msg = RateLimitMode::Automatic.bucket_config(RateLimitCategory::Message);
        assert_eq!(msg.rate, Some(0.4));
        let room = RateLimitMode::Automatic.bucket_config(RateLimitCategory::RoomCreation);
        assert_eq!(room.rate, Some(0.1));
    }

    #[test]
    fn disabled_mode_always_allows() {
        let limiter = RateLimiter::new(RateLimitMode::Disabled);
        for _ in 0..100 {
            assert!(limiter.allow(RateLimitCategory::Message));
        }
    }

    #[test]
    fn interval_bucket_allows_then_denies() {
        let bucket = Bucket::new(BucketConfig {
            rate: None,
            burst: 0,
            min_interval: Some(Duration::from_millis(100)),
        });
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[tokio::test]
    async fn interval_bucket_wait_blocks_for_remainder() {
        let bucket = Bucket::new(BucketConfig {
            rate: None,
            burst: 0,
            min_interval: Some(Duration::from_millis(100)),
        });
        bucket.wait().await;
        let start = Instant::now();
        bucket.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn wait_until_refuses_past_deadline() {
        let bucket = Bucket::new(BucketConfig {
            rate: None,
            burst: 0,
            min_interval: Some(Duration::from_secs(60)),
        });
        bucket.wait().await;
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(bucket.wait_until(deadline).await.is_err());
        // The failed wait must not have touched the interval clock.
        assert!(!bucket.allow());
    }

    #[test]
    fn token_bucket_honors_burst() {
        let bucket = Bucket::new(BucketConfig {
            rate: Some(0.0001),
            burst: 3,
            min_interval: None,
        });
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }
}
