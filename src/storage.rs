use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotation::PointEvent;
use crate::error::Result;
use crate::payload::WalkPayload;

/// Complete walk export (JSON-serializable). This file is the artifact kept
/// after a failed submission: `walk_tracker submit <file>` re-attempts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub saved_at: String,
    pub payload: WalkPayload,
}

impl SessionExport {
    pub fn new(payload: WalkPayload) -> Self {
        Self {
            saved_at: Utc::now().to_rfc3339(),
            payload,
        }
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the export into `dir` with a timestamped filename.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let filename = format!("walk_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// GPX track for mapping applications.
#[derive(Debug, Serialize)]
pub struct GpxTrack {
    pub name: String,
    pub path: Vec<[f64; 2]>,
    pub events: Vec<PointEvent>,
}

impl GpxTrack {
    /// Generate GPX document XML string: one trkpt per path point, one wpt
    /// per annotation.
    pub fn to_gpx_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"WalkTracker\">\n");
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{}</name>\n", self.name));
        xml.push_str("  </metadata>\n");

        for event in &self.events {
            xml.push_str(&format!(
                "  <wpt lat=\"{}\" lon=\"{}\">\n",
                event.lat, event.lng
            ));
            xml.push_str(&format!("    <name>{}</name>\n", event.kind.as_str()));
            xml.push_str(&format!("    <time>{}</time>\n", event.time));
            xml.push_str("  </wpt>\n");
        }

        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", self.name));
        xml.push_str("    <trkseg>\n");
        for point in &self.path {
            xml.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\"/>\n",
                point[0], point[1]
            ));
        }
        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");

        xml
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let filename = format!("walk_{}.gpx", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);
        fs::write(&path, self.to_gpx_xml())?;
        Ok(path)
    }
}

/// Build a GPX track from a finished session's route.
pub fn create_gpx_track(dog_id: i64, path: &[[f64; 2]], events: &[PointEvent]) -> GpxTrack {
    GpxTrack {
        name: format!(
            "Walk dog {} {}",
            dog_id,
            Utc::now().format("%Y-%m-%d %H:%M")
        ),
        path: path.to_vec(),
        events: events.to_vec(),
    }
}
