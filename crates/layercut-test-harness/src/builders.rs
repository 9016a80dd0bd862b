use layercut_core::clip::{AudioClip, ClipTransform, Position, VideoClip};
use layercut_core::config::EditorConfig;
use layercut_core::persistence::{MemoryStore, SessionSnapshot, save_snapshot};
use layercut_core::source::MediaSource;
use layercut_core::time::TimeRange;
use layercut_engine::session::EditorSession;
use uuid::Uuid;

use crate::fakes::FakeHandleFactory;

/// The remote URL the builders give media called `name`.
pub fn media_url(name: &str) -> String {
    format!("https://cdn.test/{name}.mp4")
}

/// Builder for creating test VideoClips with sensible defaults.
pub struct VideoClipBuilder {
    name: String,
    source: MediaSource,
    layer: u32,
    timeline_start_secs: f64,
    source_start_secs: f64,
    duration_secs: f64,
    source_duration: Option<f64>,
    aspect_ratio: Option<f64>,
    transform: Option<ClipTransform>,
    has_audio: bool,
    muted: bool,
    hidden: bool,
    locked: bool,
}

impl VideoClipBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            source: MediaSource::Remote(media_url(name)),
            layer: 0,
            timeline_start_secs: 0.0,
            source_start_secs: 0.0,
            duration_secs: 5.0,
            source_duration: None,
            aspect_ratio: None,
            transform: None,
            has_audio: true,
            muted: false,
            hidden: false,
            locked: false,
        }
    }

    pub fn layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    pub fn at(mut self, start_secs: f64) -> Self {
        self.timeline_start_secs = start_secs;
        self
    }

    /// Place the clip on `[start, end)`.
    pub fn span(mut self, start_secs: f64, end_secs: f64) -> Self {
        self.timeline_start_secs = start_secs;
        self.duration_secs = end_secs - start_secs;
        self
    }

    pub fn source_start(mut self, secs: f64) -> Self {
        self.source_start_secs = secs;
        self
    }

    pub fn duration_secs(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn source_duration(mut self, secs: f64) -> Self {
        self.source_duration = Some(secs);
        self
    }

    pub fn ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    pub fn transform(mut self, x: f64, y: f64, scale: f64) -> Self {
        self.transform = Some(ClipTransform {
            position: Position { x, y },
            scale,
        });
        self
    }

    pub fn blob(mut self) -> Self {
        self.source = MediaSource::LocalBlob(format!("blob:http://localhost/{}", self.name));
        self
    }

    pub fn no_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn build(self) -> VideoClip {
        let timeline_range = TimeRange::starting_at(self.timeline_start_secs, self.duration_secs)
            .expect("invalid timeline range in test builder");
        let source_range = TimeRange::source(
            self.source_start_secs,
            self.source_start_secs + self.duration_secs,
        )
        .expect("invalid source range in test builder");

        let mut clip = VideoClip::with_ranges(self.source, timeline_range, source_range)
            .expect("invalid clip in test builder");
        clip.name = self.name;
        clip.layer = self.layer;
        clip.source_duration = self.source_duration;
        clip.aspect_ratio = self.aspect_ratio;
        clip.transform = self.transform;
        clip.has_audio = self.has_audio;
        clip.flags.muted = self.muted;
        clip.flags.hidden = self.hidden;
        clip.flags.locked = self.locked;
        clip
    }
}

/// Builder for separated audio clips not tied to a stored video clip.
pub struct AudioClipBuilder {
    name: String,
    video_clip_id: Uuid,
    timeline_start_secs: f64,
    source_start_secs: f64,
    duration_secs: f64,
    muted: bool,
}

impl AudioClipBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            video_clip_id: Uuid::new_v4(),
            timeline_start_secs: 0.0,
            source_start_secs: 0.0,
            duration_secs: 5.0,
            muted: false,
        }
    }

    pub fn for_clip(mut self, video_clip_id: Uuid) -> Self {
        self.video_clip_id = video_clip_id;
        self
    }

    pub fn at(mut self, start_secs: f64) -> Self {
        self.timeline_start_secs = start_secs;
        self
    }

    pub fn source_start(mut self, secs: f64) -> Self {
        self.source_start_secs = secs;
        self
    }

    pub fn duration_secs(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }

    pub fn build(self) -> AudioClip {
        AudioClip {
            id: Uuid::new_v4(),
            video_clip_id: self.video_clip_id,
            timeline_range: TimeRange::starting_at(self.timeline_start_secs, self.duration_secs)
                .expect("invalid timeline range in test builder"),
            source_range: TimeRange::source(
                self.source_start_secs,
                self.source_start_secs + self.duration_secs,
            )
            .expect("invalid source range in test builder"),
            layer: 0,
            source: MediaSource::Remote(media_url(&self.name)),
            muted: self.muted,
        }
    }
}

/// Build an editor session backed by fake media handles, optionally
/// pre-populated with clips restored as if from a saved session.
pub struct SessionBuilder {
    config: EditorConfig,
    clips: Vec<VideoClip>,
    audio_clips: Vec<AudioClip>,
    factory: FakeHandleFactory,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
            clips: Vec::new(),
            audio_clips: Vec::new(),
            factory: FakeHandleFactory::new(),
        }
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn factory(mut self, factory: FakeHandleFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_clip(mut self, clip: VideoClip) -> Self {
        self.clips.push(clip);
        self
    }

    pub fn with_audio_clip(mut self, audio: AudioClip) -> Self {
        self.audio_clips.push(audio);
        self
    }

    /// Returns the session and a handle on the factory its media comes from.
    pub fn build(self) -> (EditorSession, FakeHandleFactory) {
        let mut session = EditorSession::new(self.config, Box::new(self.factory.clone()));
        if !self.clips.is_empty() || !self.audio_clips.is_empty() {
            let snapshot = SessionSnapshot {
                video_clips: self.clips,
                audio_clips: self.audio_clips,
                ..SessionSnapshot::default()
            };
            let mut backend = MemoryStore::new();
            let key = session.config().storage_key.clone();
            save_snapshot(&mut backend, &key, &snapshot).expect("failed to stage test session");
            assert!(
                session.load_persisted(&mut backend),
                "test session clips failed to load"
            );
        }
        (session, self.factory)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
