use serde::{Deserialize, Serialize};
use std::process::Command;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

/// A single location sample from the platform location source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
    pub timestamp: f64,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
        }
    }
}

/// Options for the continuous location watch.
#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Poll period for the location source
    pub interval: Duration,
    /// Emit synthetic fixes when the platform source is unavailable
    pub mock: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            mock: false,
        }
    }
}

/// Continuous fix stream. Polls the platform location command on a fixed
/// period and pushes each fix into the channel. Stops when the receiver is
/// dropped. With `mock` set, falls back to synthetic fixes so the rest of
/// the pipeline can run without a GPS.
pub async fn watch_loop(tx: Sender<GeoFix>, opts: WatchOptions) {
    let mut interval = interval(opts.interval);
    let mut fix_count = 0u64;
    let mut miss_count = 0u64;

    loop {
        interval.tick().await;

        let fix = match read_location() {
            Some(fix) => fix,
            None if opts.mock => mock_fix(),
            None => {
                miss_count += 1;
                if miss_count % 10 == 1 {
                    log::warn!("location source unavailable ({} misses)", miss_count);
                }
                continue;
            }
        };

        match tx.try_send(fix) {
            Ok(_) => {
                fix_count += 1;
                if fix_count % 30 == 0 {
                    log::debug!("{} fixes delivered", fix_count);
                }
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("fix channel closed after {} fixes", fix_count);
                break;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // Consumer is behind, drop this fix
            }
        }
    }
}

/// Raw `termux-location` JSON payload. Extra fields ignored.
#[derive(Deserialize)]
struct TermuxLocation {
    latitude: f64,
    longitude: f64,
    accuracy: f64,
}

fn read_location() -> Option<GeoFix> {
    match Command::new("termux-location")
        .arg("-p")
        .arg("gps")
        .arg("-r")
        .arg("last")
        .output()
    {
        Ok(output) => {
            let text = String::from_utf8_lossy(&output.stdout);
            parse_location_output(&text)
        }
        Err(_) => None,
    }
}

fn parse_location_output(output: &str) -> Option<GeoFix> {
    let loc: TermuxLocation = serde_json::from_str(output.trim()).ok()?;
    Some(GeoFix::new(
        loc.latitude,
        loc.longitude,
        loc.accuracy,
        current_timestamp(),
    ))
}

fn mock_fix() -> GeoFix {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as f64;

    // Slow drift north-east from central Paris, ~8 m per fix
    GeoFix {
        latitude: 48.8566 + seq * 0.00005,
        longitude: 2.3522 + seq * 0.00005,
        accuracy: 8.0 + (seq * 0.1).sin() * 4.0,
        timestamp: current_timestamp(),
    }
}

pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_termux_output() {
        let raw = r#"{
            "latitude": 48.8566,
            "longitude": 2.3522,
            "altitude": 35.0,
            "accuracy": 12.5,
            "bearing": 0.0,
            "speed": 1.2,
            "provider": "gps"
        }"#;
        let fix = parse_location_output(raw).unwrap();
        assert_eq!(fix.latitude, 48.8566);
        assert_eq!(fix.longitude, 2.3522);
        assert_eq!(fix.accuracy, 12.5);
    }

    #[test]
    fn test_parse_garbage_output() {
        assert!(parse_location_output("").is_none());
        assert!(parse_location_output("not json").is_none());
        assert!(parse_location_output(r#"{"latitude": 1.0}"#).is_none());
    }

    #[test]
    fn test_mock_fix_drifts() {
        let a = mock_fix();
        let b = mock_fix();
        assert!(b.latitude > a.latitude);
        assert!(b.longitude > a.longitude);
    }
}
