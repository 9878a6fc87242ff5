use chrono::{DateTime, Utc};

use crate::annotation::{EventKind, PointEvent};
use crate::error::{Result, TrackerError};
use crate::geo::haversine_km;
use crate::location::GeoFix;

/// Fixes with a worse accuracy radius than this never touch the session.
pub const MAX_ACCURACY_M: f64 = 50.0;

/// Minimum great-circle distance between consecutive path points.
pub const MIN_MOVE_KM: f64 = 0.005;

/// Estimated energy expenditure per walked minute. Placeholder linear proxy,
/// not a physiological model.
pub const KCAL_PER_MINUTE: u32 = 5;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet tracking
    Idle,
    /// Tracking active
    Running,
    /// Tracking ended, awaiting review/submission
    Stopped,
}

/// How the walk is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    Timer,
    Manual,
}

impl WalkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalkMode::Timer => "timer",
            WalkMode::Manual => "manual",
        }
    }
}

/// What a single fix did to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Dropped entirely: session not running, or accuracy above the gate
    Rejected,
    /// Refreshed the live position marker only
    PositionOnly,
    /// Appended to the path and grew the distance total
    Appended { delta_km: f64 },
}

/// One start-to-stop walk: the path, its events, and the derived summary.
///
/// The session is a plain reducer over `GeoFix` and tick events; the task
/// handles feeding it live in a tracking run are owned by `Tracker`.
#[derive(Debug, Clone)]
pub struct WalkSession {
    pub dog_id: i64,
    pub mode: WalkMode,
    state: SessionState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    /// Accumulated great-circle distance in km, unrounded
    pub distance_km: f64,
    /// Accepted `[lat, lon]` points, time-ascending
    pub path: Vec<[f64; 2]>,
    pub events: Vec<PointEvent>,
    /// Freshest accuracy-accepted fix, path member or not
    pub current_position: Option<GeoFix>,
    pub notes: Option<String>,
    /// Derived on stop: round(elapsed_seconds / 60)
    pub duration_minutes: Option<u32>,
    /// Derived on stop: duration_minutes * 5
    pub calories: Option<u32>,
    pub accepted_fixes: u64,
    /// Fixes dropped by the accuracy gate (surfaced in live status)
    pub rejected_fixes: u64,
}

/// The one energy formula, used identically for timer stops and manual
/// duration entry.
pub fn calories_for(duration_minutes: u32) -> u32 {
    duration_minutes * KCAL_PER_MINUTE
}

impl WalkSession {
    /// Create a new session in Idle state
    pub fn new(dog_id: i64) -> Self {
        Self {
            dog_id,
            mode: WalkMode::Timer,
            state: SessionState::Idle,
            start_time: None,
            end_time: None,
            elapsed_seconds: 0,
            distance_km: 0.0,
            path: Vec::new(),
            events: Vec::new(),
            current_position: None,
            notes: None,
            duration_minutes: None,
            calories: None,
            accepted_fixes: 0,
            rejected_fixes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Begin tracking (Idle → Running). Records the start timestamp and
    /// resets the timer, path, events and distance.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                self.start_time = Some(Utc::now());
                self.end_time = None;
                self.elapsed_seconds = 0;
                self.distance_km = 0.0;
                self.path.clear();
                self.events.clear();
                self.current_position = None;
                self.duration_minutes = None;
                self.calories = None;
                self.accepted_fixes = 0;
                self.rejected_fixes = 0;
                self.state = SessionState::Running;
                Ok(())
            }
            SessionState::Running => Err(TrackerError::AlreadyRunning),
            SessionState::Stopped => Err(TrackerError::InvalidState(
                "stopped session cannot be restarted".to_string(),
            )),
        }
    }

    /// One elapsed-time increment from the 1-second ticker.
    pub fn tick_second(&mut self) {
        if self.state == SessionState::Running {
            self.elapsed_seconds += 1;
        }
    }

    /// Feed one raw fix through the filter.
    ///
    /// Accuracy gate: fixes worse than 50 m are dropped outright. Movement
    /// gate: an accepted fix joins the path only when it is more than 5 m
    /// from the last path point; either way it refreshes the live position.
    /// The first fix of a session is always appended.
    pub fn apply_fix(&mut self, fix: GeoFix) -> FixOutcome {
        if self.state != SessionState::Running {
            return FixOutcome::Rejected;
        }
        if fix.accuracy > MAX_ACCURACY_M {
            self.rejected_fixes += 1;
            return FixOutcome::Rejected;
        }

        self.accepted_fixes += 1;
        let point = [fix.latitude, fix.longitude];

        let outcome = match self.path.last() {
            None => {
                self.path.push(point);
                FixOutcome::Appended { delta_km: 0.0 }
            }
            Some(last) => {
                let delta_km = haversine_km(last[0], last[1], fix.latitude, fix.longitude);
                if delta_km > MIN_MOVE_KM {
                    self.path.push(point);
                    self.distance_km += delta_km;
                    FixOutcome::Appended { delta_km }
                } else {
                    FixOutcome::PositionOnly
                }
            }
        };

        self.current_position = Some(fix);
        outcome
    }

    /// Record a point-event at the live position. No-op (returns None) when
    /// no accepted fix exists yet or the session is not running.
    pub fn annotate(&mut self, kind: EventKind) -> Option<&PointEvent> {
        if self.state != SessionState::Running {
            return None;
        }
        let pos = self.current_position.as_ref()?;
        let event = PointEvent {
            kind,
            lat: pos.latitude,
            lng: pos.longitude,
            time: Utc::now().to_rfc3339(),
        };
        self.events.push(event);
        self.events.last()
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes.filter(|n| !n.trim().is_empty());
    }

    /// End tracking (Running → Stopped) and compute the derived summary.
    /// Task cancellation is the owner's job; after this call the reducer
    /// rejects every further fix and tick.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            SessionState::Running => {
                self.end_time = Some(Utc::now());
                let minutes = (self.elapsed_seconds as f64 / 60.0).round() as u32;
                self.duration_minutes = Some(minutes);
                self.calories = Some(calories_for(minutes));
                self.state = SessionState::Stopped;
                Ok(())
            }
            _ => Err(TrackerError::NotRunning),
        }
    }
}
