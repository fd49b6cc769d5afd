//! Prometheus text exposition of the temperature gauge.

/// Metric name exposed on the metrics endpoint.
pub const METRIC_NAME: &str = "cpu_temperature";

/// Content type of the exposition body.
pub const CONTENT_TYPE: &str = "text/plain";

/// Formats a temperature as a Prometheus gauge.
pub fn exposition(celsius: f64) -> String {
    format!(
        "# HELP {name} Current CPU temperature in Celsius\n\
         # TYPE {name} gauge\n\
         {name} {value}\n",
        name = METRIC_NAME,
        value = celsius
    )
}
