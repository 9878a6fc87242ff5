use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::annotation::PointEvent;
use crate::gps_health::{GpsHealth, GpsState};
use crate::session::WalkSession;

/// Snapshot of a running session, written as JSON for the dashboard.
#[derive(Serialize, Deserialize, Clone)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub dog_id: i64,
    pub state: String,
    pub mode: String,
    pub elapsed_seconds: u64,
    pub distance_km: f64,
    pub path: Vec<[f64; 2]>,
    pub events: Vec<PointEvent>,
    pub accepted_fixes: u64,
    pub rejected_fixes: u64,
    // Live position marker
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub gps_accuracy: Option<f64>,
    // Stream health
    pub gps_searching: bool,
    pub gps_silent: bool,
}

impl LiveStatus {
    pub fn from_session(session: &WalkSession, health: &GpsHealth) -> Self {
        let gps_state = health.state();
        Self {
            timestamp: crate::location::current_timestamp(),
            dog_id: session.dog_id,
            state: format!("{:?}", session.state()).to_lowercase(),
            mode: session.mode.as_str().to_string(),
            elapsed_seconds: session.elapsed_seconds,
            distance_km: session.distance_km,
            path: session.path.clone(),
            events: session.events.clone(),
            accepted_fixes: session.accepted_fixes,
            rejected_fixes: session.rejected_fixes,
            gps_lat: session.current_position.as_ref().map(|f| f.latitude),
            gps_lon: session.current_position.as_ref().map(|f| f.longitude),
            gps_accuracy: session.current_position.as_ref().map(|f| f.accuracy),
            gps_searching: gps_state == GpsState::Searching,
            gps_silent: gps_state == GpsState::Silent,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::GeoFix;

    #[test]
    fn test_snapshot_reflects_session() {
        let mut session = WalkSession::new(7);
        session.start().unwrap();
        session.apply_fix(GeoFix::new(48.8566, 2.3522, 10.0, 0.0));
        session.tick_second();

        let mut health = GpsHealth::default();
        health.update();

        let status = LiveStatus::from_session(&session, &health);
        assert_eq!(status.dog_id, 7);
        assert_eq!(status.state, "running");
        assert_eq!(status.elapsed_seconds, 1);
        assert_eq!(status.path.len(), 1);
        assert_eq!(status.gps_lat, Some(48.8566));
        assert!(!status.gps_searching);
    }

    #[test]
    fn test_save_roundtrip() {
        let session = WalkSession::new(1);
        let status = LiveStatus::from_session(&session, &GpsHealth::default());
        assert!(status.gps_searching);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live_status.json");
        status.save(&path).unwrap();

        let loaded: LiveStatus =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.state, "idle");
        assert_eq!(loaded.gps_lat, None);
    }
}
