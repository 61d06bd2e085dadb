use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};

use crate::types::Settings;

/// Owns the in-memory settings value and its persistence lifecycle.
///
/// The value starts at [`Settings::default`] so the UI can render before the
/// first load completes. Reads never block on I/O; writes go through
/// [`SettingsStore::save`] and replace the in-memory value only after the
/// file write succeeded, so memory and disk converge after every successful
/// save and a failed save leaves the previous value fully intact.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
    /// Serializes saves so two concurrent save calls can't interleave
    /// partial writes.
    save_gate: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current: RwLock::new(Settings::default()),
            save_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the current in-memory settings.
    pub fn current(&self) -> Settings {
        self.current.read().expect("settings lock poisoned").clone()
    }

    /// Load settings from disk, replacing the in-memory value on success.
    ///
    /// Fails soft: a missing file is a normal first launch (the default
    /// stays in place), and any read/parse error keeps the last in-memory
    /// value; the error is returned for logging only.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(self.current());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let loaded: Settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        *self.current.write().expect("settings lock poisoned") = loaded.clone();
        Ok(loaded)
    }

    /// Persist `next` and make it the current value. Returns whether the
    /// write was accepted; on failure the in-memory value is untouched.
    pub async fn save(&self, next: Settings) -> bool {
        let _gate = self.save_gate.lock().await;
        match self.write_file(&next) {
            Ok(()) => {
                *self.current.write().expect("settings lock poisoned") = next;
                true
            }
            Err(e) => {
                tracing::warn!("failed to save settings: {e:#}");
                false
            }
        }
    }

    /// Write atomically: temp file alongside the target, then rename.
    /// A crash mid-write can't leave a truncated settings file behind.
    fn write_file(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
