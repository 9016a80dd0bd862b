use std::path::{Path, PathBuf};

use layercut_core::persistence::{JsonFileStore, SessionSnapshot};
use tempfile::TempDir;

/// A snapshot store in a fresh temp directory. Keep the `TempDir` alive for
/// as long as the store is used.
pub fn temp_file_store() -> (TempDir, JsonFileStore) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let store = JsonFileStore::new(dir.path());
    (dir, store)
}

/// Write `snapshot` as a pretty-printed session file.
pub fn write_session_file(dir: &Path, name: &str, snapshot: &SessionSnapshot) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    let json = serde_json::to_string_pretty(snapshot).expect("failed to serialize session");
    std::fs::write(&path, json).expect("failed to write session file");
    path
}
