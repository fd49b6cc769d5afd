//! Cached, retry-bounded temperature reads.
//!
//! [`SensorCache`] serves the last reading while it is younger than the
//! freshness window and only touches the sensor on a miss. Concurrent misses
//! share a single in-flight read, so a burst of requests costs one sensor
//! access and at most one failure against the retry budget.
//!
//! ```text
//! request A ─┐
//! request B ─┼──► SensorCache ──(fresh?)──► cached value
//! request C ─┘        │
//!                     └──(miss)──► one shared read ──► A, B, C
//! ```

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::source::{parse_millidegrees, SensorSource};
use crate::{ReadError, Result};

/// A validated temperature and the moment it was read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub celsius: f64,
    /// When the sensor produced it.
    pub observed_at: Instant,
}

impl Reading {
    /// Age of the reading.
    pub fn age(&self) -> Duration {
        self.observed_at.elapsed()
    }
}

/// Where a returned temperature came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    /// Served from cache without touching the sensor.
    Cached,
    /// Read from the sensor for this request.
    Fresh,
    /// Sensor failed past the retry budget; last known value served instead.
    StaleFallback,
}

/// Result of a successful [`SensorCache::read`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Temperature in degrees Celsius.
    pub celsius: f64,
    /// Where the value came from.
    pub source: SampleSource,
}

impl Sample {
    /// True when the value is a stale fallback rather than a current reading.
    pub fn used_stale_fallback(&self) -> bool {
        self.source == SampleSource::StaleFallback
    }
}

/// What to do once the retry budget is used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Serve the last known value, or fail with [`ReadError::Exhausted`].
    #[default]
    Degrade,
    /// Fail with [`ReadError::Exhausted`] and raise [`SensorCache::terminated`].
    Terminate,
}

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Maximum age of a reading served without touching the sensor.
    pub freshness_window: Duration,
    /// Consecutive failures tolerated before escalating.
    pub max_failures: u32,
    /// Upper bound on a single sensor read.
    pub read_timeout: Duration,
    /// Behavior once `max_failures` is reached.
    pub exhaustion: ExhaustionPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_millis(15_000),
            max_failures: 9,
            read_timeout: Duration::from_secs(1),
            exhaustion: ExhaustionPolicy::Degrade,
        }
    }
}

/// Counters for monitoring cache behavior.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from cache.
    pub hits: u64,
    /// Reads that started a sensor access.
    pub misses: u64,
    /// Reads that joined an in-flight sensor access.
    pub coalesced: u64,
    /// Sensor accesses performed.
    pub sensor_reads: u64,
    /// Sensor accesses that failed (I/O, timeout or invalid data).
    pub failures: u64,
    /// Stale values served after the budget ran out.
    pub fallbacks: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    sensor_reads: AtomicU64,
    failures: AtomicU64,
    fallbacks: AtomicU64,
}

type SharedRead = Shared<BoxFuture<'static, Result<Sample>>>;

struct CacheState {
    last_reading: Option<Reading>,
    consecutive_failures: u32,
    in_flight: Option<SharedRead>,
}

/// Why a single sensor access failed.
enum Fault {
    Io(String),
    Invalid(ReadError),
}

struct Inner {
    source: Arc<dyn SensorSource>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
    counters: Counters,
    terminated: watch::Sender<bool>,
}

/// Temperature cache with bounded staleness and bounded retries.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct SensorCache {
    inner: Arc<Inner>,
}

impl SensorCache {
    /// Creates an empty cache over the given source.
    pub fn new(source: Arc<dyn SensorSource>, settings: CacheSettings) -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                source,
                settings,
                state: Mutex::new(CacheState {
                    last_reading: None,
                    consecutive_failures: 0,
                    in_flight: None,
                }),
                counters: Counters::default(),
                terminated,
            }),
        }
    }

    /// Returns the current temperature.
    ///
    /// Answers from cache while the last reading is fresh. Otherwise joins the
    /// in-flight sensor read or starts one.
    pub async fn read(&self) -> Result<Sample> {
        let pending = {
            let mut state = self.inner.lock_state();

            if let Some(reading) = state.last_reading {
                let age = reading.age();
                if age < self.inner.settings.freshness_window {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        temperature = reading.celsius,
                        cache_age_ms = age.as_millis() as u64,
                        "Using cached temperature data"
                    );
                    return Ok(Sample {
                        celsius: reading.celsius,
                        source: SampleSource::Cached,
                    });
                }
            }

            if let Some(pending) = state.in_flight.clone() {
                self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!("Joining in-flight sensor read");
                pending
            } else {
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                // The read runs as its own task so it completes even when every
                // waiter has gone away.
                let inner = self.inner.clone();
                let pending = tokio::spawn(self.inner.clone().poll_sensor())
                    .map(move |joined| {
                        joined.unwrap_or_else(|e| {
                            let mut state = inner.lock_state();
                            state.in_flight = None;
                            Err(ReadError::Transient {
                                message: format!("sensor read task failed: {}", e),
                                failures: state.consecutive_failures,
                                max_failures: inner.settings.max_failures,
                            })
                        })
                    })
                    .boxed()
                    .shared();
                state.in_flight = Some(pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Returns the last validated reading, fresh or not.
    pub fn last_reading(&self) -> Option<Reading> {
        self.inner.lock_state().last_reading
    }

    /// Returns the number of consecutive failed sensor accesses.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock_state().consecutive_failures
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            sensor_reads: c.sensor_reads.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            fallbacks: c.fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Resolves once the budget ran out under [`ExhaustionPolicy::Terminate`].
    pub async fn terminated(&self) {
        let mut rx = self.inner.terminated.subscribe();
        let _ = rx.wait_for(|terminated| *terminated).await;
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Performs one sensor access and folds the outcome into the state.
    async fn poll_sensor(self: Arc<Self>) -> Result<Sample> {
        self.counters.sensor_reads.fetch_add(1, Ordering::Relaxed);

        let answer = tokio::time::timeout(self.settings.read_timeout, self.source.read()).await;
        let observed_at = Instant::now();
        let outcome = match answer {
            Ok(Ok(raw)) => parse_millidegrees(&raw).map_err(Fault::Invalid),
            Ok(Err(e)) => Err(Fault::Io(e.to_string())),
            Err(_) => Err(Fault::Io(format!(
                "sensor read timed out after {} ms",
                self.settings.read_timeout.as_millis()
            ))),
        };

        let mut state = self.lock_state();
        state.in_flight = None;

        match outcome {
            Ok(celsius) => {
                state.consecutive_failures = 0;
                state.last_reading = Some(Reading {
                    celsius,
                    observed_at,
                });
                debug!(
                    temperature = celsius,
                    unit = "celsius",
                    "Temperature reading successful"
                );
                Ok(Sample {
                    celsius,
                    source: SampleSource::Fresh,
                })
            }
            Err(fault) => self.record_failure(&mut state, fault),
        }
    }

    fn record_failure(&self, state: &mut CacheState, fault: Fault) -> Result<Sample> {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);

        let max_failures = self.settings.max_failures;
        state.consecutive_failures = state
            .consecutive_failures
            .saturating_add(1)
            .min(max_failures);
        let failures = state.consecutive_failures;

        let under_budget = failures < max_failures;
        let error = match fault {
            Fault::Io(message) => {
                error!(
                    error = %message,
                    retries = failures,
                    max_retries = max_failures,
                    path = %self.source.describe(),
                    "Failed to read temperature file"
                );
                ReadError::Transient {
                    message,
                    failures,
                    max_failures,
                }
            }
            Fault::Invalid(e) => {
                error!(
                    error = %e,
                    retries = failures,
                    max_retries = max_failures,
                    "Error parsing temperature data"
                );
                e
            }
        };

        if under_budget {
            return Err(error);
        }

        match self.settings.exhaustion {
            ExhaustionPolicy::Terminate => {
                error!(
                    retries = failures,
                    max_retries = max_failures,
                    "Maximum retries reached, requesting process exit"
                );
                self.terminated.send_replace(true);
                Err(ReadError::Exhausted { failures })
            }
            ExhaustionPolicy::Degrade => {
                warn!(
                    retries = failures,
                    max_retries = max_failures,
                    has_cached_data = state.last_reading.is_some(),
                    "Maximum retries reached, returning last known value"
                );
                match state.last_reading {
                    Some(reading) => {
                        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                        Ok(Sample {
                            celsius: reading.celsius,
                            source: SampleSource::StaleFallback,
                        })
                    }
                    None => Err(ReadError::Exhausted { failures }),
                }
            }
        }
    }
}
