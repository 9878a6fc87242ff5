use tokio::time::{Duration, Instant};

/// Tracks liveness of the fix stream.
///
/// `Searching` until the first accuracy-accepted fix arrives, `Silent` once
/// the stream has gone quiet past the threshold. Rejected-fix counting lives
/// on the session; together the two distinguish "no signal yet", "signal
/// lost" and "signal present but poor".
#[derive(Clone, Debug)]
pub struct GpsHealth {
    last_fix: Option<Instant>,
    silence_threshold: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpsState {
    /// No accepted fix yet this session
    Searching,
    Healthy,
    /// Fixes stopped arriving
    Silent,
}

impl GpsHealth {
    pub fn new(silence_threshold_secs: u64) -> Self {
        Self {
            last_fix: None,
            silence_threshold: Duration::from_secs(silence_threshold_secs),
        }
    }

    /// Record an accepted fix.
    pub fn update(&mut self) {
        self.last_fix = Some(Instant::now());
    }

    pub fn time_since_last_fix(&self) -> Option<Duration> {
        self.last_fix.map(|t| t.elapsed())
    }

    pub fn state(&self) -> GpsState {
        match self.time_since_last_fix() {
            None => GpsState::Searching,
            Some(elapsed) if elapsed > self.silence_threshold => GpsState::Silent,
            Some(_) => GpsState::Healthy,
        }
    }

    pub fn is_searching(&self) -> bool {
        self.state() == GpsState::Searching
    }

    pub fn is_silent(&self) -> bool {
        self.state() == GpsState::Silent
    }
}

impl Default for GpsHealth {
    fn default() -> Self {
        // GPS silence threshold: 30 seconds
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_searching_until_first_fix() {
        let mut health = GpsHealth::new(30);
        assert_eq!(health.state(), GpsState::Searching);
        assert!(health.is_searching());

        health.update();
        assert_eq!(health.state(), GpsState::Healthy);
    }

    #[test]
    fn test_silence_detection() {
        let mut health = GpsHealth::new(1);
        health.update();
        assert!(!health.is_silent());

        thread::sleep(Duration::from_millis(1100));
        assert!(health.is_silent());

        // A fresh fix recovers
        health.update();
        assert_eq!(health.state(), GpsState::Healthy);
    }
}
