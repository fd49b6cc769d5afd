//! CPU temperature core library.
//!
//! Provides the cached sensor read state machine and a transport-independent
//! request router producing JSON and Prometheus responses.

pub mod assets;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod router;
pub mod source;

pub use assets::{Asset, AssetSpec, AssetStore, StaticAssets};
pub use cache::{
    CacheSettings, CacheStats, ExhaustionPolicy, Reading, Sample, SampleSource, SensorCache,
};
pub use error::{ReadError, Result};
pub use router::{RequestRouter, RouteOutcome, JSON_CONTENT_TYPE};
pub use source::{FileSource, SensorSource};
