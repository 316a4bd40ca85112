use std::time::Duration;
use tokio::{
    sync::Mutex,
    time::{Instant, sleep},
};
use tracing::debug;

/// Spaces consecutive requests to one endpoint by a fixed minimum interval.
///
/// The first call never waits. Shared between every request a source makes
/// to the same endpoint family so the ceiling holds across sub-windows and
/// chunks.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn with_interval(name: &str, min_interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// `requests_per_minute == 0` disables pacing.
    pub fn per_minute(name: &str, requests_per_minute: u32) -> Self {
        let interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / f64::from(requests_per_minute))
        };
        Self::with_interval(name, interval)
    }

    pub fn unlimited(name: &str) -> Self {
        Self::with_interval(name, Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait if necessary to comply with the rate ceiling.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(
                    limiter = %self.name,
                    wait_ms = wait_time.as_millis() as u64,
                    "Rate limiting"
                );
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
