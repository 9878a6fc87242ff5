use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::annotation::PointEvent;
use crate::error::{Result, TrackerError};
use crate::session::{calories_for, SessionState, WalkSession};

/// Upper bound for a manually entered distance, km.
const MAX_MANUAL_DISTANCE_KM: f64 = 100.0;
/// Upper bound for a manually entered duration, minutes (one day).
const MAX_MANUAL_DURATION_MIN: u32 = 1440;

/// The `route_json` blob: path plus events. The backend stores it opaquely;
/// the walk detail view parses it back with these exact keys.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RouteData {
    pub path: Vec<[f64; 2]>,
    pub events: Vec<PointEvent>,
}

/// Body of `POST /api/walks`. Field set matches the backend's walk-create
/// schema; blank numerics submit as null.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WalkPayload {
    pub dog_id: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<u32>,
    pub calories: Option<u32>,
    pub notes: Option<String>,
    pub route_json: Option<String>,
}

/// Truncate (not round) to two decimals for submission.
pub fn truncate_km(distance: f64) -> f64 {
    (distance * 100.0).trunc() / 100.0
}

impl WalkPayload {
    /// Build the submission body from a stopped tracking session.
    pub fn from_session(session: &WalkSession) -> Result<Self> {
        if session.state() != SessionState::Stopped {
            return Err(TrackerError::InvalidState(
                "only a stopped session can be submitted".to_string(),
            ));
        }

        let route_json = if session.path.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&RouteData {
                path: session.path.clone(),
                events: session.events.clone(),
            })?)
        };

        Ok(Self {
            dog_id: session.dog_id,
            start_time: session
                .start_time
                .unwrap_or_else(Utc::now)
                .to_rfc3339(),
            end_time: session.end_time.map(|t| t.to_rfc3339()),
            distance_km: (!session.path.is_empty()).then(|| truncate_km(session.distance_km)),
            duration_minutes: session.duration_minutes,
            calories: session.calories,
            notes: session.notes.clone(),
            route_json,
        })
    }

    /// Build a manual-entry body. Bounded-numeric validation only; no GPS
    /// machinery is involved in this mode.
    pub fn manual(
        dog_id: i64,
        distance_km: Option<f64>,
        duration_minutes: Option<u32>,
        notes: Option<String>,
    ) -> Result<Self> {
        if distance_km.is_none() && duration_minutes.is_none() {
            return Err(TrackerError::InvalidEntry(
                "enter a distance or a duration".to_string(),
            ));
        }
        if let Some(d) = distance_km {
            if !d.is_finite() || d <= 0.0 || d > MAX_MANUAL_DISTANCE_KM {
                return Err(TrackerError::InvalidEntry(format!(
                    "distance must be in (0, {}] km",
                    MAX_MANUAL_DISTANCE_KM
                )));
            }
        }
        if let Some(m) = duration_minutes {
            if m == 0 || m > MAX_MANUAL_DURATION_MIN {
                return Err(TrackerError::InvalidEntry(format!(
                    "duration must be in (0, {}] minutes",
                    MAX_MANUAL_DURATION_MIN
                )));
            }
        }

        Ok(Self {
            dog_id,
            start_time: Utc::now().to_rfc3339(),
            end_time: None,
            distance_km: distance_km.map(truncate_km),
            duration_minutes,
            calories: duration_minutes.map(calories_for),
            notes: notes.filter(|n| !n.trim().is_empty()),
            route_json: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::EventKind;
    use crate::location::GeoFix;

    fn stopped_session_with_route() -> WalkSession {
        let mut session = WalkSession::new(3);
        session.start().unwrap();
        session.apply_fix(GeoFix::new(45.757, 4.832, 10.0, 0.0));
        session.apply_fix(GeoFix::new(45.758, 4.833, 10.0, 1.0));
        session.annotate(EventKind::Pee);
        for _ in 0..125 {
            session.tick_second();
        }
        session.set_notes(Some("Great walk!".to_string()));
        session.stop().unwrap();
        session
    }

    #[test]
    fn test_truncation() {
        assert_eq!(truncate_km(1.2599), 1.25);
        assert_eq!(truncate_km(0.0049), 0.0);
        assert_eq!(truncate_km(3.5), 3.5);
    }

    #[test]
    fn test_from_session_requires_stopped() {
        let mut session = WalkSession::new(1);
        assert!(WalkPayload::from_session(&session).is_err());
        session.start().unwrap();
        assert!(WalkPayload::from_session(&session).is_err());
    }

    #[test]
    fn test_from_session_fields() {
        let session = stopped_session_with_route();
        let payload = WalkPayload::from_session(&session).unwrap();

        assert_eq!(payload.dog_id, 3);
        assert_eq!(payload.duration_minutes, Some(2));
        assert_eq!(payload.calories, Some(10));
        assert_eq!(payload.notes.as_deref(), Some("Great walk!"));
        assert!(payload.end_time.is_some());

        // Two-decimal truncation of the accumulated ~0.138 km
        let d = payload.distance_km.unwrap();
        assert_eq!(d, truncate_km(session.distance_km));
        assert_eq!((d * 100.0).fract(), 0.0);
    }

    #[test]
    fn test_route_json_wire_shape() {
        let session = stopped_session_with_route();
        let payload = WalkPayload::from_session(&session).unwrap();

        let route: serde_json::Value =
            serde_json::from_str(payload.route_json.as_deref().unwrap()).unwrap();
        assert_eq!(route["path"].as_array().unwrap().len(), 2);
        assert_eq!(route["path"][0][0], 45.757);
        let event = &route["events"][0];
        assert_eq!(event["type"], "pee");
        assert!(event["lat"].is_f64());
        assert!(event["lng"].is_f64());
        assert!(event["time"].is_string());
    }

    #[test]
    fn test_degraded_session_has_no_route() {
        let mut session = WalkSession::new(1);
        session.start().unwrap();
        for _ in 0..600 {
            session.tick_second();
        }
        session.stop().unwrap();

        let payload = WalkPayload::from_session(&session).unwrap();
        assert!(payload.route_json.is_none());
        assert!(payload.distance_km.is_none());
        assert_eq!(payload.duration_minutes, Some(10));
        assert_eq!(payload.calories, Some(50));
    }

    #[test]
    fn test_manual_entry_bounds() {
        assert!(WalkPayload::manual(1, None, None, None).is_err());
        assert!(WalkPayload::manual(1, Some(0.0), None, None).is_err());
        assert!(WalkPayload::manual(1, Some(-2.0), None, None).is_err());
        assert!(WalkPayload::manual(1, Some(101.0), None, None).is_err());
        assert!(WalkPayload::manual(1, None, Some(0), None).is_err());
        assert!(WalkPayload::manual(1, None, Some(1441), None).is_err());
        assert!(WalkPayload::manual(1, Some(f64::NAN), None, None).is_err());
    }

    #[test]
    fn test_manual_entry_derives_calories() {
        let payload = WalkPayload::manual(2, Some(3.5), Some(45), None).unwrap();
        assert_eq!(payload.distance_km, Some(3.5));
        assert_eq!(payload.duration_minutes, Some(45));
        assert_eq!(payload.calories, Some(225));
        assert!(payload.route_json.is_none());

        // Distance-only entry: no duration, no calories
        let payload = WalkPayload::manual(2, Some(2.0), None, None).unwrap();
        assert_eq!(payload.calories, None);
    }
}
