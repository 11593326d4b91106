use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sample::Sample;
use crate::window::{validate, SlidingWindow};

/// Window and granularity of a counter. JSON form uses whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(rename = "window_ms", with = "millis")]
    pub window: Duration,
    #[serde(rename = "granularity_ms", with = "millis")]
    pub granularity: Duration,
}

impl WindowConfig {
    pub fn new(window: Duration, granularity: Duration) -> Self {
        Self { window, granularity }
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn validate(&self) -> Result<()> {
        validate(self.window, self.granularity).map(|_| ())
    }

    pub fn bucket_count(&self) -> Result<usize> {
        validate(self.window, self.granularity)
    }

    pub fn build<T: Sample>(&self) -> Result<SlidingWindow<T>> {
        SlidingWindow::new(self.window, self.granularity)
    }

    pub fn build_manual<T: Sample>(&self) -> Result<SlidingWindow<T>> {
        SlidingWindow::manual(self.window, self.granularity)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            granularity: Duration::from_secs(1),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Parses `250ms`, `10s`, `1m` style durations. A bare number means seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    if num.is_empty() {
        return Err(format!("invalid duration '{s}': missing number"));
    }
    let n: u64 = num
        .parse()
        .map_err(|e| format!("invalid duration '{s}': {e}"))?;
    let d = match unit.trim() {
        "ns" => Duration::from_nanos(n),
        "us" => Duration::from_micros(n),
        "ms" => Duration::from_millis(n),
        "" | "s" => Duration::from_secs(n),
        "m" => Duration::from_secs(n.saturating_mul(60)),
        "h" => Duration::from_secs(n.saturating_mul(3600)),
        other => return Err(format!("invalid duration '{s}': unknown unit '{other}'")),
    };
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("5us").unwrap(), Duration::from_micros(5));
        assert_eq!(parse_duration(" 7ns ").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("3 days").unwrap_err().contains("unknown unit"));
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn json_round_trip_uses_millis() {
        let cfg = WindowConfig::from_json(r#"{"window_ms": 10000, "granularity_ms": 500}"#).unwrap();
        assert_eq!(cfg.window, Duration::from_secs(10));
        assert_eq!(cfg.granularity, Duration::from_millis(500));
        assert_eq!(cfg.bucket_count().unwrap(), 20);

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"window_ms\":10000"));
    }

    #[test]
    fn validate_reports_exact_cause() {
        let cfg = WindowConfig::new(Duration::from_secs(3), Duration::from_secs(2));
        assert_eq!(
            cfg.validate().unwrap_err().to_string(),
            "window size has to be a multiplier of the granularity size"
        );
        assert!(WindowConfig::default().validate().is_ok());
    }

    #[test]
    fn build_manual_has_no_clock() {
        let cfg = WindowConfig::new(Duration::from_secs(4), Duration::from_secs(1));
        let counter = cfg.build_manual::<i64>().unwrap();
        assert!(!counter.is_running());
        assert_eq!(counter.bucket_count(), 4);
    }
}
