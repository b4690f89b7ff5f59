//! Operator settings.
//!
//! `Settings` is plain data held in a `Store<Settings>`. Persistence is
//! not handled here: whoever owns the process subscribes to the store and
//! writes `to_json()` wherever it keeps its files.

use serde::{Deserialize, Serialize};

use crate::store::Patch;

/// Which side's ground units are drawn on the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundUnitMode {
    #[default]
    Friendly,
    Enemy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapSettings {
    pub show_track_icons: bool,
    pub show_track_labels: bool,
    pub track_trail_length: usize,
    pub ground_unit_mode: GroundUnitMode,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            show_track_icons: true,
            show_track_labels: true,
            track_trail_length: 9,
            ground_unit_mode: GroundUnitMode::Friendly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub map: MapSettings,
    pub show_aircraft_type_in_track_names: bool,
    /// "Allies" or "Enemies"
    pub coalition: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            map: MapSettings::default(),
            show_aircraft_type_in_track_names: true,
            coalition: "Allies".to_string(),
        }
    }
}

impl Settings {
    /// Parses saved settings; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.coalition.trim().is_empty() {
            return Err(SettingsError::Invalid("coalition must not be empty".to_string()));
        }
        if self.map.track_trail_length == 0 {
            return Err(SettingsError::Invalid("trackTrailLength must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Partial settings update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub show_track_icons: Option<bool>,
    pub show_track_labels: Option<bool>,
    pub track_trail_length: Option<usize>,
    pub ground_unit_mode: Option<GroundUnitMode>,
    pub show_aircraft_type_in_track_names: Option<bool>,
    pub coalition: Option<String>,
}

impl Patch<Settings> for SettingsPatch {
    fn apply(self, target: &mut Settings) {
        if let Some(v) = self.show_track_icons {
            target.map.show_track_icons = v;
        }
        if let Some(v) = self.show_track_labels {
            target.map.show_track_labels = v;
        }
        if let Some(v) = self.track_trail_length {
            target.map.track_trail_length = v.max(1);
        }
        if let Some(v) = self.ground_unit_mode {
            target.map.ground_unit_mode = v;
        }
        if let Some(v) = self.show_aircraft_type_in_track_names {
            target.show_aircraft_type_in_track_names = v;
        }
        if let Some(v) = self.coalition {
            target.coalition = v;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.map.show_track_icons);
        assert!(s.map.show_track_labels);
        assert_eq!(s.map.track_trail_length, 9);
        assert_eq!(s.map.ground_unit_mode, GroundUnitMode::Friendly);
        assert!(s.show_aircraft_type_in_track_names);
        assert_eq!(s.coalition, "Allies");
    }

    #[test]
    fn test_json_uses_camel_case_and_round_trips() {
        let json = Settings::default().to_json().unwrap();
        assert!(json.contains("showAircraftTypeInTrackNames"));
        assert!(json.contains("\"groundUnitMode\": \"friendly\""));
        assert_eq!(Settings::from_json(&json).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s = Settings::from_json(r#"{"coalition": "Enemies", "map": {"trackTrailLength": 4}}"#).unwrap();
        assert_eq!(s.coalition, "Enemies");
        assert_eq!(s.map.track_trail_length, 4);
        assert!(s.map.show_track_icons);
        assert!(s.show_aircraft_type_in_track_names);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(matches!(
            Settings::from_json(r#"{"coalition": " "}"#),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(Settings::from_json("not json"), Err(SettingsError::Json(_))));
    }

    #[test]
    fn test_patch_through_store() {
        let store = Store::new(Settings::default());
        store.update(SettingsPatch {
            coalition: Some("Enemies".to_string()),
            ground_unit_mode: Some(GroundUnitMode::Enemy),
            ..Default::default()
        });

        let s = store.get();
        assert_eq!(s.coalition, "Enemies");
        assert_eq!(s.map.ground_unit_mode, GroundUnitMode::Enemy);
        assert_eq!(s.map.track_trail_length, 9);
    }
}
