use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::source::MediaSource;
use crate::time::TimeRange;

/// Aspect ratio assumed when neither a stored nor a measured ratio exists.
pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;

/// A point on the preview surface, in percent of its width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const CENTER: Position = Position { x: 50.0, y: 50.0 };
}

impl Default for Position {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Preview placement of a clip.
///
/// Layer 0 reads `position` as an offset from the fitted center. Overlays
/// read it as the absolute center point on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipTransform {
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for ClipTransform {
    fn default() -> Self {
        Self {
            position: Position::CENTER,
            scale: 1.0,
        }
    }
}

/// Per-clip track flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackFlags {
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// A placed interval of a media source on a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    /// Insertion stamp assigned by the store. Later clips draw on top of
    /// earlier ones sharing a layer.
    #[serde(default)]
    pub seq: u64,
    pub timeline_range: TimeRange,
    pub source_range: TimeRange,
    /// Full length of the underlying media, used as the trim limit.
    #[serde(default)]
    pub source_duration: Option<f64>,
    /// 0 is the base track, higher layers are overlays.
    #[serde(default)]
    pub layer: u32,
    pub source: MediaSource,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default = "default_true")]
    pub has_audio: bool,
    #[serde(default = "default_true")]
    pub is_audio_linked: bool,
    #[serde(default)]
    pub audio_clip_id: Option<Uuid>,
    /// Width over height, stored when the media was first measured.
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    #[serde(default)]
    pub transform: Option<ClipTransform>,
    #[serde(default)]
    pub flags: TrackFlags,
}

fn default_true() -> bool {
    true
}

impl VideoClip {
    /// Create a clip whose timeline length matches its source interval.
    pub fn new(source: MediaSource, timeline_start: f64, source_range: TimeRange) -> Result<Self> {
        let timeline_range = TimeRange::starting_at(timeline_start, source_range.duration())?;
        Self::with_ranges(source, timeline_range, source_range)
    }

    pub fn with_ranges(
        source: MediaSource,
        timeline_range: TimeRange,
        source_range: TimeRange,
    ) -> Result<Self> {
        let clip = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            seq: 0,
            timeline_range,
            source_range,
            source_duration: None,
            layer: 0,
            source,
            asset_id: None,
            has_audio: true,
            is_audio_linked: true,
            audio_clip_id: None,
            aspect_ratio: None,
            transform: None,
            flags: TrackFlags::default(),
        };
        clip.validate()?;
        Ok(clip)
    }

    pub fn start(&self) -> f64 {
        self.timeline_range.start
    }

    pub fn end(&self) -> f64 {
        self.timeline_range.end
    }

    pub fn duration(&self) -> f64 {
        self.timeline_range.duration()
    }

    pub fn is_base(&self) -> bool {
        self.layer == 0
    }

    /// Source time shown when the playhead is at timeline time `t`.
    pub fn source_time_at(&self, t: f64) -> f64 {
        self.source_range.start + (t - self.timeline_range.start)
    }

    /// Stored ratio, else `measured`, else 16:9.
    pub fn effective_aspect_ratio(&self, measured: Option<f64>) -> f64 {
        self.aspect_ratio
            .filter(|r| r.is_finite() && *r > 0.0)
            .or(measured.filter(|r| r.is_finite() && *r > 0.0))
            .unwrap_or(DEFAULT_ASPECT_RATIO)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.timeline_range.is_valid_timeline() {
            return Err(CoreError::InvalidClipInterval {
                start: self.timeline_range.start,
                end: self.timeline_range.end,
            });
        }
        if !self.source_range.is_valid_source() {
            return Err(CoreError::InvalidSourceInterval {
                start: self.source_range.start,
                end: self.source_range.end,
            });
        }
        Ok(())
    }
}

/// Audio separated from a video clip, played through its own handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub id: Uuid,
    /// The video clip this audio was separated from.
    pub video_clip_id: Uuid,
    pub timeline_range: TimeRange,
    pub source_range: TimeRange,
    #[serde(default)]
    pub layer: u32,
    pub source: MediaSource,
    #[serde(default)]
    pub muted: bool,
}

impl AudioClip {
    /// Copy the timing, layer and source of `clip`.
    pub fn separated_from(clip: &VideoClip) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_clip_id: clip.id,
            timeline_range: clip.timeline_range,
            source_range: clip.source_range,
            layer: clip.layer,
            source: clip.source.clone(),
            muted: false,
        }
    }

    pub fn start(&self) -> f64 {
        self.timeline_range.start
    }

    pub fn end(&self) -> f64 {
        self.timeline_range.end
    }

    pub fn source_time_at(&self, t: f64) -> f64 {
        self.source_range.start + (t - self.timeline_range.start)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.timeline_range.is_valid_timeline() {
            return Err(CoreError::InvalidClipInterval {
                start: self.timeline_range.start,
                end: self.timeline_range.end,
            });
        }
        if !self.source_range.is_valid_source() {
            return Err(CoreError::InvalidSourceInterval {
                start: self.source_range.start,
                end: self.source_range.end,
            });
        }
        Ok(())
    }
}
