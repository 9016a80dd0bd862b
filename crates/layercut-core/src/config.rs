use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunable editor settings. Every field falls back to its default when
/// missing from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo entries kept.
    pub history_limit: usize,
    /// Drift above which an overlay handle is hard-seeked.
    pub overlay_resync_tolerance_secs: f64,
    /// Drift above which the separated-audio handle is hard-seeked.
    pub audio_resync_tolerance_secs: f64,
    pub autosave_debounce_ms: u64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: [u8; 4],
    pub proxy_endpoint: String,
    /// Length given to dropped media whose duration could not be read.
    pub fallback_clip_duration_secs: f64,
    pub min_clip_duration_secs: f64,
    /// Gaps shorter than this are played straight through.
    pub gap_resume_threshold_secs: f64,
    pub storage_key: String,
    pub handoff_key: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            overlay_resync_tolerance_secs: 0.25,
            audio_resync_tolerance_secs: 0.1,
            autosave_debounce_ms: 1000,
            canvas_width: 1080,
            canvas_height: 1920,
            background: [0, 0, 0, 255],
            proxy_endpoint: "/api/proxy-video".into(),
            fallback_clip_duration_secs: 10.0,
            min_clip_duration_secs: 0.1,
            gap_resume_threshold_secs: 0.1,
            storage_key: "layercut-session".into(),
            handoff_key: "layercut-handoff".into(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
