use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clip::{AudioClip, VideoClip};
use crate::error::{CoreError, Result};
use crate::source::MediaSource;
use crate::subtitle::SubtitleTrack;

/// Version stamped into every saved session.
pub const CURRENT_SNAPSHOT_VERSION: &str = "1.0.0";

fn current_version() -> String {
    CURRENT_SNAPSHOT_VERSION.to_string()
}

/// Everything needed to resume an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default = "current_version")]
    pub version: String,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtitles: SubtitleTrack,
    #[serde(default)]
    pub video_clips: Vec<VideoClip>,
    #[serde(default)]
    pub audio_clips: Vec<AudioClip>,
    #[serde(default)]
    pub script_text: String,
    #[serde(default)]
    pub primary_media: Option<MediaSource>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            version: current_version(),
            saved_at: None,
            subtitles: SubtitleTrack::default(),
            video_clips: Vec::new(),
            audio_clips: Vec::new(),
            script_text: String::new(),
            primary_media: None,
        }
    }
}

impl SessionSnapshot {
    /// Nothing worth saving: no media, no clips, no subtitles.
    pub fn is_empty(&self) -> bool {
        self.primary_media.is_none() && self.video_clips.is_empty() && self.subtitles.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a saved session, rejecting ones written by a newer major version.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn check_version(&self) -> Result<()> {
        let got = semver::Version::parse(&self.version)?;
        let max = semver::Version::parse(CURRENT_SNAPSHOT_VERSION)?;
        if got.major > max.major {
            return Err(CoreError::IncompatibleSnapshotVersion {
                got: self.version.clone(),
                max: CURRENT_SNAPSHOT_VERSION.to_string(),
            });
        }
        Ok(())
    }

    /// The primary media to reopen. Session-local references cannot
    /// survive a reload and are dropped.
    pub fn restorable_primary_media(&self) -> Option<MediaSource> {
        match &self.primary_media {
            Some(source) if source.is_transient() => {
                tracing::info!("Skipped stale local media reference, waiting for re-upload");
                None
            }
            other => other.clone(),
        }
    }

    /// Largest clip end time, used to seed the timeline duration.
    pub fn content_end(&self) -> f64 {
        let video = self.video_clips.iter().map(|c| c.end());
        let audio = self.audio_clips.iter().map(|a| a.end());
        video.chain(audio).fold(0.0, f64::max)
    }
}

/// A durable keyed string store.
pub trait SnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Keeps one `<key>.json` file per key in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stamp and write `snapshot` under `key`.
pub fn save_snapshot(
    store: &mut dyn SnapshotStore,
    key: &str,
    snapshot: &SessionSnapshot,
) -> Result<()> {
    let mut stamped = snapshot.clone();
    stamped.version = current_version();
    stamped.saved_at = Some(Utc::now());
    store.put(key, &stamped.to_json()?)
}

pub fn load_snapshot(store: &dyn SnapshotStore, key: &str) -> Result<Option<SessionSnapshot>> {
    store
        .get(key)?
        .map(|json| SessionSnapshot::from_json(&json))
        .transpose()
}

/// Read and consume a project handed over under `key`, so a reload does not
/// apply it twice.
pub fn take_handoff(store: &mut dyn SnapshotStore, key: &str) -> Result<Option<SessionSnapshot>> {
    let Some(json) = store.get(key)? else {
        return Ok(None);
    };
    let snapshot = SessionSnapshot::from_json(&json)?;
    store.remove(key)?;
    tracing::info!(clips = snapshot.video_clips.len(), "Consumed project handoff");
    Ok(Some(snapshot))
}

/// Debounces saves to a fixed delay after the last mutation.
#[derive(Debug, Clone)]
pub struct Autosaver {
    debounce: Duration,
    dirty_since: Option<Instant>,
}

impl Autosaver {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            dirty_since: None,
        }
    }

    /// Restart the debounce window at `now`.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Whether a save is due at `now`. A due save clears the dirty flag.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.dirty_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => {
                self.dirty_since = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.dirty_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autosaver_waits_for_quiet_period() {
        let mut saver = Autosaver::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        assert!(!saver.poll(t0));

        saver.mark_dirty(t0);
        assert!(!saver.poll(t0 + Duration::from_millis(600)));
        saver.mark_dirty(t0 + Duration::from_millis(600));
        assert!(!saver.poll(t0 + Duration::from_millis(1200)));
        assert!(saver.poll(t0 + Duration::from_millis(1600)));
        assert!(!saver.is_dirty());
        assert!(!saver.poll(t0 + Duration::from_millis(5000)));
    }

    #[test]
    fn test_missing_version_defaults_to_current() {
        let snapshot = SessionSnapshot::from_json(r#"{"video_clips": []}"#).unwrap();
        assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
    }

    #[test]
    fn test_memory_store_remove_is_idempotent() {
        let mut store = MemoryStore::new();
        store.put("k", "v").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
