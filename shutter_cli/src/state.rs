//! JSON file holding the last known position of every cover.
//!
//! ```json
//! { "living_room": { "name": "Living room", "position": 50,
//!                    "travel_up": 25.0, "travel_down": 22.5 } }
//! ```
//!
//! The file is rewritten (temp file + rename) only when a published value
//! differs from what is already recorded. Write failures are logged, never
//! returned: losing a position update must not stop a moving cover.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use shutter_traits::{CoverAttributes, PositionStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: u8,
    pub travel_up: f64,
    pub travel_down: f64,
}

#[derive(Debug)]
pub struct JsonStateFile {
    path: PathBuf,
    names: BTreeMap<String, String>,
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl JsonStateFile {
    /// Load `path`; a missing file starts empty. `names` maps cover ids to
    /// display names recorded alongside positions.
    pub fn open(path: impl Into<PathBuf>, names: BTreeMap<String, String>) -> eyre::Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .wrap_err_with(|| format!("state file {} is not valid JSON", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no state file yet");
                BTreeMap::new()
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("failed to read state file {}", path.display()));
            }
        };
        Ok(Self {
            path,
            names,
            entries: Mutex::new(entries),
        })
    }

    pub fn entry(&self, cover_id: &str) -> Option<Entry> {
        self.lock().get(cover_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, Entry>) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(entries).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)
    }
}

impl PositionStore for JsonStateFile {
    fn load_last_position(&self, cover_id: &str) -> Option<u8> {
        self.lock().get(cover_id).map(|e| e.position)
    }

    fn publish(&self, cover_id: &str, position: u8, attributes: &CoverAttributes) {
        let entry = Entry {
            name: self.names.get(cover_id).cloned(),
            position,
            travel_up: attributes.travel_up_secs,
            travel_down: attributes.travel_down_secs,
        };
        let mut entries = self.lock();
        if entries.get(cover_id) == Some(&entry) {
            return;
        }
        entries.insert(cover_id.to_owned(), entry);
        if let Err(e) = self.persist(&entries) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write state file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTRS: CoverAttributes = CoverAttributes {
        travel_up_secs: 25.0,
        travel_down_secs: 22.5,
    };

    #[test]
    fn missing_file_starts_empty_and_is_created_on_publish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        let names = BTreeMap::from([("lr".to_string(), "Living room".to_string())]);
        let store = JsonStateFile::open(&path, names).unwrap();
        assert_eq!(store.load_last_position("lr"), None);

        store.publish("lr", 40, &ATTRS);
        let reopened = JsonStateFile::open(&path, BTreeMap::new()).unwrap();
        assert_eq!(reopened.load_last_position("lr"), Some(40));
        let e = reopened.entry("lr").unwrap();
        assert_eq!(e.name.as_deref(), Some("Living room"));
        assert_eq!(e.travel_down, 22.5);
    }

    #[test]
    fn unchanged_positions_do_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonStateFile::open(&path, BTreeMap::new()).unwrap();
        store.publish("a", 10, &ATTRS);
        fs::remove_file(&path).unwrap();
        store.publish("a", 10, &ATTRS);
        assert!(!path.exists());
        store.publish("a", 11, &ATTRS);
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonStateFile::open(&path, BTreeMap::new()).unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }
}
