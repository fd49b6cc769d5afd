//! Background polling that keeps the temperature cache warm.

use cputemp_core::{SampleSource, SensorCache};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Minimum spacing between repeated error logs.
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Decides which consecutive poll errors are worth logging.
///
/// The first error of a run is always logged, later ones at most once per
/// [`ERROR_LOG_INTERVAL`].
#[derive(Debug, Default)]
pub struct ErrorThrottle {
    consecutive: u32,
    last_log: Option<Instant>,
}

impl ErrorThrottle {
    /// Records an error. Returns the length of the error run if it should be
    /// logged now.
    pub fn record_error(&mut self) -> Option<u32> {
        self.consecutive = self.consecutive.saturating_add(1);
        let due = match self.last_log {
            Some(at) => self.consecutive == 1 || at.elapsed() >= ERROR_LOG_INTERVAL,
            None => true,
        };
        if due {
            self.last_log = Some(Instant::now());
            Some(self.consecutive)
        } else {
            None
        }
    }

    /// Ends the current error run.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Keeps the cache warm and logs every reading.
pub async fn poll_loop(cache: SensorCache, interval: Duration) {
    match cache.read().await {
        Ok(sample) => info!(
            temperature = sample.celsius,
            unit = "celsius",
            "Initial temperature reading successful"
        ),
        Err(e) => error!(error = %e, "Initial temperature reading failed"),
    }

    let mut throttle = ErrorThrottle::default();

    loop {
        tokio::time::sleep(interval).await;
        match cache.read().await {
            Ok(sample) => {
                throttle.reset();
                if sample.source == SampleSource::StaleFallback {
                    warn!(
                        temperature = sample.celsius,
                        retries = cache.consecutive_failures(),
                        "Serving last known CPU temperature"
                    );
                } else {
                    info!(
                        temperature = sample.celsius,
                        unit = "celsius",
                        retries = cache.consecutive_failures(),
                        cache_hit = sample.source == SampleSource::Cached,
                        "CPU temperature read"
                    );
                }
            }
            Err(e) => {
                if let Some(repeated) = throttle.record_error() {
                    error!(
                        error = %e,
                        repeated,
                        retries = cache.consecutive_failures(),
                        component = "temperature_monitor",
                        "Failed to read CPU temperature"
                    );
                }
            }
        }
    }
}
