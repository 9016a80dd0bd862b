use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    pub id: Uuid,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub translated_text: Option<String>,
}

impl Subtitle {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time,
            text: text.into(),
            translated_text: None,
        }
    }
}

/// Subtitles plus the set excluded from the final cut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub subtitles: Vec<Subtitle>,
    #[serde(default)]
    pub excluded: BTreeSet<Uuid>,
}

impl SubtitleTrack {
    pub fn new(subtitles: Vec<Subtitle>) -> Self {
        Self {
            subtitles,
            excluded: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subtitles.is_empty()
    }

    /// Toggle whether `id` is cut from the output. Returns the new state.
    pub fn toggle_excluded(&mut self, id: Uuid) -> bool {
        if self.excluded.remove(&id) {
            false
        } else {
            self.excluded.insert(id);
            true
        }
    }

    /// Subtitles that make it into the output, ordered by start time.
    pub fn effective(&self) -> Vec<Subtitle> {
        let mut kept: Vec<Subtitle> = self
            .subtitles
            .iter()
            .filter(|s| !self.excluded.contains(&s.id))
            .cloned()
            .collect();
        kept.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        kept
    }

    /// The subtitle on screen at `t`.
    pub fn at(&self, t: f64) -> Option<&Subtitle> {
        self.subtitles
            .iter()
            .find(|s| !self.excluded.contains(&s.id) && t >= s.start_time && t < s.end_time)
    }
}
