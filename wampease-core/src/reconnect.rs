//! Reconnection strategies for transports that reopen on their own
//!
//! When a session is lost, the transport asks its strategy how long to wait
//! before the next attempt and whether to keep trying at all. Each reopen
//! that succeeds hands the facade a fresh session, which is what triggers
//! subscription and registration recovery.
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: doubling delays with a cap, optional jitter
//! - **FixedDelay**: constant delay between attempts
//! - **NoReconnect**: never reopen; a loss is final
//!
//! # Examples
//!
//! ```rust
//! use wampease_core::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_millis(50), Duration::from_secs(5))
//!     .with_max_attempts(3);
//!
//! assert_eq!(backoff.next_delay(0), Some(Duration::from_millis(50)));
//! assert_eq!(backoff.next_delay(1), Some(Duration::from_millis(100)));
//! assert_eq!(backoff.next_delay(3), None);
//! ```

use std::time::Duration;

/// Decides whether and when a lost transport retries
///
/// `attempt` counts consecutive failed attempts since the last successful
/// open, starting at 0. `reset` is called after every successful open.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before attempt number `attempt`, or `None` to give up
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Forget accumulated state after a successful open
    fn reset(&mut self);
}

/// Exponential backoff: `min_delay * 2^attempt`, capped at `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Unlimited attempts, no jitter
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
            current_attempt: 0,
        }
    }

    /// Give up after `max_attempts` consecutive failures
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random delay to each attempt
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
            .with_max_attempts(10)
            .with_jitter()
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.current_attempt = attempt;

        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let base = (self.min_delay.as_millis() as u64).saturating_mul(factor);
        let delay = base.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            use rand::Rng;
            let jitter_ms = rand::thread_rng().gen_range(0..=(delay / 4));
            return Some(Duration::from_millis(delay + jitter_ms));
        }

        Some(Duration::from_millis(delay))
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Unlimited attempts every `delay`
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` consecutive failures
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }

    fn reset(&mut self) {}
}

/// Never reopen
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
