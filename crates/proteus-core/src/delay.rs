//! Timing policies: exponential backoff with jitter and Gaussian inter-task
//! pacing.
//!
//! Both are pure functions of (attempt, config) over a caller-supplied RNG,
//! so tests can seed them and assert exact schedules.

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Retry budget and backoff shape for one tier.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per tier before it is reported exhausted.
    pub max_attempts: u32,

    /// Backoff base: the wait before the first retry.
    pub base: Duration,

    /// Ceiling for the exponential wait, applied before jitter.
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        }
    }
}

/// Gaussian inter-task delay parameters.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub mean: Duration,
    pub std_dev: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            mean: Duration::from_millis(3500),
            std_dev: Duration::from_millis(500),
        }
    }
}

impl PacingConfig {
    /// No pacing at all. Used by tests and by callers that batch offline.
    pub fn disabled() -> Self {
        Self {
            mean: Duration::ZERO,
            std_dev: Duration::ZERO,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.mean.is_zero() && self.std_dev.is_zero()
    }
}

/// Wait before retry number `attempt + 1`:
/// `min(max_wait, base * 2^attempt)`, then ±25% jitter.
///
/// Jitter is applied after the cap, so the realized wait can exceed
/// `max_wait` by up to a quarter.
pub fn backoff_delay<R: Rng>(attempt: u32, config: &RetryConfig, rng: &mut R) -> Duration {
    let base_ms = config.base.as_millis() as f64;
    let exp = 2f64.powi(attempt.min(63) as i32);
    let capped_ms = (base_ms * exp).min(config.max_wait.as_millis() as f64);
    let jittered_ms = capped_ms * rng.gen_range(0.75..=1.25);
    Duration::from_millis(jittered_ms.round() as u64)
}

/// One Gaussian-distributed pause between batch tasks, clamped to
/// `mean ± 3σ` and floored at zero.
pub fn inter_task_delay<R: Rng>(config: &PacingConfig, rng: &mut R) -> Duration {
    if config.is_disabled() {
        return Duration::ZERO;
    }
    let mean_ms = config.mean.as_millis() as f64;
    let std_ms = config.std_dev.as_millis() as f64;

    // Box-Muller transform over two uniform draws.
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.r#gen();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();

    let raw_ms = mean_ms + z * std_ms;
    let lo = (mean_ms - 3.0 * std_ms).max(0.0);
    let hi = mean_ms + 3.0 * std_ms;
    Duration::from_millis(raw_ms.clamp(lo, hi).round() as u64)
}

/// Shared randomness behind the pure delay functions.
///
/// One instance is shared by the retry engine (jitter) and the orchestrator
/// (pacing); seeding it makes a whole run reproducible.
pub struct DelaySource {
    rng: Mutex<StdRng>,
}

impl DelaySource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn backoff(&self, attempt: u32, config: &RetryConfig) -> Duration {
        backoff_delay(attempt, config, &mut *self.lock_rng())
    }

    pub fn pacing(&self, config: &PacingConfig) -> Duration {
        inter_task_delay(config, &mut *self.lock_rng())
    }
}

impl Default for DelaySource {
    fn default() -> Self {
        Self::new()
    }
}
