//! Sliding-window rate limiter with a hard cooldown.
//!
//! Each provider client owns one limiter. The window counts request instants
//! over the trailing period; the cooldown is armed when the vendor answers
//! with a throttle response and blocks every request until it elapses.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Fraction of the documented vendor limit we allow ourselves to use.
const HEADROOM: f64 = 0.9;

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rate limit configuration for a provider.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    /// Limit the vendor documents per window.
    pub documented_limit: u32,
    /// Hard pause after a throttle response.
    pub cooldown: Duration,
    /// Sliding window length.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(documented_limit: u32, cooldown: Duration) -> Self {
        Self {
            documented_limit,
            cooldown,
            window: DEFAULT_WINDOW,
        }
    }

    /// Requests we allow per window: the documented limit minus ~10%.
    pub fn effective_limit(&self) -> u32 {
        ((self.documented_limit as f64 * HEADROOM).floor() as u32).max(1)
    }
}

/// Why a request was refused locally.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Denial {
    /// A cooldown is active.
    Cooldown { remaining: Duration },
    /// The window already holds `limit` requests.
    WindowFull { limit: u32 },
}

#[derive(Debug, Default)]
struct WindowState {
    requests: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

impl WindowState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.requests.front() {
            if now.saturating_duration_since(*front) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Thread-safe limiter for a single provider.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    limit: u32,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let limit = config.effective_limit();
        Self {
            config,
            limit,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Lock the window, recovering from poison if necessary.
    ///
    /// A poisoned window only means a slightly inaccurate count.
    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Reserve a slot for one request, or say why not.
    pub fn try_acquire(&self) -> Result<(), Denial> {
        self.try_acquire_at(Instant::now())
    }

    /// [`Self::try_acquire`] with an explicit clock.
    ///
    /// The cooldown is checked before the window so an active cooldown is
    /// reported even when the window has room.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Denial> {
        let mut state = self.lock_state();

        if let Some(until) = state.cooldown_until {
            if now < until {
                return Err(Denial::Cooldown {
                    remaining: until - now,
                });
            }
            state.cooldown_until = None;
        }

        state.prune(now, self.config.window);
        if state.requests.len() >= self.limit as usize {
            debug!(
                "Rate limiter: window full ({}/{})",
                state.requests.len(),
                self.limit
            );
            return Err(Denial::WindowFull { limit: self.limit });
        }

        state.requests.push_back(now);
        Ok(())
    }

    /// Arm the cooldown after a throttle response.
    pub fn trigger_cooldown(&self) -> Duration {
        self.trigger_cooldown_at(Instant::now())
    }

    pub fn trigger_cooldown_at(&self, now: Instant) -> Duration {
        let mut state = self.lock_state();
        let until = now + self.config.cooldown;
        // Never shorten an active cooldown.
        let until = match state.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        };
        state.cooldown_until = Some(until);
        until - now
    }

    pub fn cooldown_remaining_at(&self, now: Instant) -> Option<Duration> {
        self.lock_state()
            .cooldown_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_remaining_at(Instant::now()).is_some()
    }

    /// Requests currently counted in the window.
    pub fn occupancy_at(&self, now: Instant) -> usize {
        let mut state = self.lock_state();
        state.prune(now, self.config.window);
        state.requests.len()
    }
}
