//! JSON exporter for offline replay.
//!
//! Exports per-frame ground truth next to what the overlay displayed.

use serde::{Deserialize, Serialize};
use skywatch_core::geodesy::format_counter;
use skywatch_core::{ContactRow, TacticalPicture};
use std::fs::File;
use std::io::Write;

use crate::oracle::GroundTruthContact;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Mission clock, HH:MM:SS
    pub clock: String,

    /// Ground truth contact positions
    pub ground_truth: Vec<ContactPosition>,

    /// What the overlay shows for each tracked contact
    pub contacts: Vec<ContactFrame>,

    /// Notable events (removals, settings changes)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// True position of a contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPosition {
    pub id: u32,
    pub lat: f64,
    pub lon: f64,
    pub speed_knots: f64,
}

impl From<&GroundTruthContact> for ContactPosition {
    fn from(contact: &GroundTruthContact) -> Self {
        Self {
            id: contact.id,
            lat: contact.profile.position.lat,
            lon: contact.profile.position.lon,
            speed_knots: contact.profile.speed_knots,
        }
    }
}

/// Overlay view of one contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactFrame {
    pub entity_id: u32,
    pub label: String,
    pub row: String,
    pub speed_knots: i64,
    pub lat: f64,
    pub lon: f64,
    pub trail_length: usize,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }
}

/// Builds a frame from ground truth and the current picture.
pub fn capture_frame(
    time_sec: f64,
    truth: &[&GroundTruthContact],
    picture: &TacticalPicture,
    events: Vec<SimEvent>,
) -> SimFrame {
    let contacts = picture
        .entities()
        .iter()
        .map(|entity| {
            let row = ContactRow {
                entity_id: entity.id,
                label: picture.display_name(entity),
                speed_knots: picture.tracks().speed_of(entity.id).round() as i64,
            };
            ContactFrame {
                entity_id: entity.id.0,
                row: row.to_string(),
                label: row.label,
                speed_knots: row.speed_knots,
                lat: entity.latitude,
                lon: entity.longitude,
                trail_length: picture
                    .tracks()
                    .tracks_of(entity.id)
                    .map(|track| track.len())
                    .unwrap_or(0),
            }
        })
        .collect();

    SimFrame {
        time_sec,
        clock: format_counter(time_sec.max(0.0) as u64),
        ground_truth: truth.iter().map(|c| ContactPosition::from(*c)).collect(),
        contacts,
        events,
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Map the scenario is flown on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theater: Option<String>,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            theater: None,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ContactProfile, Oracle};
    use skywatch_core::geodesy::LatLon;

    #[test]
    fn test_capture_frame_matches_rows() {
        let mut oracle = Oracle::new(3);
        oracle.spawn_contact(
            ContactProfile::air("Allies", "F-16C_50", LatLon::new(42.0, 41.0))
                .with_pilot("Viper")
                .moving(90.0, 400.0),
        );
        let mut picture = TacticalPicture::with_defaults();
        for _ in 0..2 {
            for event in oracle.feed_events() {
                picture.apply_event(&event);
            }
            oracle.step(1.0).unwrap();
        }

        let truth = oracle.active_contacts();
        let frame = capture_frame(3661.0, &truth, &picture, vec![SimEvent::info("tick")]);

        assert_eq!(frame.clock, "01:01:01");
        assert_eq!(frame.ground_truth.len(), 1);
        assert_eq!(frame.contacts.len(), 1);
        let contact = &frame.contacts[0];
        assert!(contact.label.starts_with("Viper "));
        assert_eq!(contact.row, format!("{} - {} kts", contact.label, contact.speed_knots));
        assert_eq!(contact.trail_length, 2);
    }

    #[test]
    fn test_export_serializes() {
        let mut export = SimExport::new("cap_station", 42);
        export.add_frame(SimFrame {
            time_sec: 2.0,
            clock: "00:00:02".to_string(),
            ground_truth: vec![],
            contacts: vec![],
            events: vec![],
        });
        export.finalize(true, None);

        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"scenario\":\"cap_station\""));
        assert!(!json.contains("failure_reason"));
        assert!(!json.contains("events"));
        assert_eq!(export.duration_sec, 2.0);
    }
}
