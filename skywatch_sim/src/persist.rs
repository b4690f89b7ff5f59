//! Settings persistence for the simulator CLI.
//!
//! The core `Store<Settings>` never touches the filesystem. The CLI loads
//! the file once at startup and subscribes a listener that rewrites it
//! after every change.

use skywatch_core::{Settings, SettingsError, Store, Subscription};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Settings file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Reads saved settings, falling back to defaults when the file is absent.
pub fn load_settings(path: &Path) -> Result<Settings, PersistError> {
    if !path.exists() {
        debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let json = std::fs::read_to_string(path)?;
    Ok(Settings::from_json(&json)?)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), PersistError> {
    std::fs::write(path, settings.to_json()?)?;
    Ok(())
}

/// Writes the settings back to `path` after every store mutation.
pub fn attach_persistence(store: &Store<Settings>, path: impl Into<PathBuf>) -> Subscription {
    let path = path.into();
    store.subscribe(move |settings| {
        if let Err(e) = save_settings(&path, settings) {
            warn!("Failed to persist settings to {}: {}", path.display(), e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skywatch_core::SettingsPatch;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_listener_persists_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = Store::new(Settings::default());
        let subscription = attach_persistence(&store, &path);

        store.update(SettingsPatch {
            coalition: Some("Enemies".to_string()),
            track_trail_length: Some(4),
            ..Default::default()
        });

        let reloaded = load_settings(&path).unwrap();
        assert_eq!(reloaded.coalition, "Enemies");
        assert_eq!(reloaded.map.track_trail_length, 4);

        subscription.unsubscribe();
        store.update(SettingsPatch {
            coalition: Some("Allies".to_string()),
            ..Default::default()
        });
        assert_eq!(load_settings(&path).unwrap().coalition, "Enemies");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(PersistError::Settings(SettingsError::Json(_)))
        ));
    }
}
