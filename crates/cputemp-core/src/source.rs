//! Raw temperature sources.
//!
//! The kernel exposes thermal zones as text files holding an integer in
//! millidegrees Celsius (e.g. `/sys/class/thermal/thermal_zone0/temp`).

use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::path::PathBuf;

use crate::ReadError;

/// Lowest temperature accepted as a real reading.
pub const MIN_CELSIUS: f64 = -100.0;

/// Highest temperature accepted as a real reading.
pub const MAX_CELSIUS: f64 = 150.0;

/// Anything that can produce the raw text of a temperature sensor.
pub trait SensorSource: Send + Sync {
    /// Reads the raw sensor text.
    fn read(&self) -> BoxFuture<'_, io::Result<String>>;

    /// Describes the source for log output.
    fn describe(&self) -> String;
}

/// Sensor backed by a sysfs thermal zone file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source reading from the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorSource for FileSource {
    fn read(&self) -> BoxFuture<'_, io::Result<String>> {
        tokio::fs::read_to_string(&self.path).boxed()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Converts raw millidegree text to Celsius rounded to two decimals.
///
/// Leading and trailing whitespace (the trailing newline sysfs emits) is
/// ignored. Values outside [`MIN_CELSIUS`, `MAX_CELSIUS`] are rejected.
pub fn parse_millidegrees(raw: &str) -> Result<f64, ReadError> {
    let millis: i64 = raw.trim().parse().map_err(|_| ReadError::InvalidData {
        raw: raw.to_string(),
        reason: "not an integer millidegree value".to_string(),
    })?;

    let celsius = (millis as f64 / 1000.0 * 100.0).round() / 100.0;
    if !(MIN_CELSIUS..=MAX_CELSIUS).contains(&celsius) {
        return Err(ReadError::InvalidData {
            raw: raw.to_string(),
            reason: format!(
                "{} is outside [{}, {}] Celsius",
                celsius, MIN_CELSIUS, MAX_CELSIUS
            ),
        });
    }

    Ok(celsius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("45600").unwrap(), 45.6);
        assert_eq!(parse_millidegrees("38500\n").unwrap(), 38.5);
        assert_eq!(parse_millidegrees("  42000 ").unwrap(), 42.0);
        assert_eq!(parse_millidegrees("-5250").unwrap(), -5.25);
    }

    #[test]
    fn test_parse_rounds_to_two_decimals() {
        assert_eq!(parse_millidegrees("45678").unwrap(), 45.68);
        assert_eq!(parse_millidegrees("45674").unwrap(), 45.67);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_millidegrees("not a number"),
            Err(ReadError::InvalidData { .. })
        ));
        assert!(parse_millidegrees("").is_err());
        assert!(parse_millidegrees("45.6").is_err());
    }

    #[test]
    fn test_parse_range_bounds() {
        assert_eq!(parse_millidegrees("150000").unwrap(), 150.0);
        assert_eq!(parse_millidegrees("-100000").unwrap(), -100.0);
        assert!(parse_millidegrees("150010").is_err());
        assert!(parse_millidegrees("-100010").is_err());
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/thermal_zone/temp");
        assert!(source.read().await.is_err());
        assert_eq!(source.describe(), "/nonexistent/thermal_zone/temp");
    }
}
