use serde::{Deserialize, Serialize};

/// Kind of point-event the user can tag during a walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pee,
    Poop,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pee => "pee",
            EventKind::Poop => "poop",
        }
    }
}

/// A geotagged annotation captured at the live position. Immutable once
/// recorded; the wire shape is shared with the walk history/detail views.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub lat: f64,
    pub lng: f64,
    /// RFC 3339 capture time
    pub time: String,
}
