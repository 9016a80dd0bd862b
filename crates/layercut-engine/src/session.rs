//! The editor session: one owner for every piece of editing state and one
//! reducer that applies commands to it.
//!
//! After a clip-changing command the session runs its reactions in a fixed
//! order: duration growth, base mute sync, history push, autosave mark.
//! Undo and redo run the same reactions before lowering the history guard.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use layercut_core::audio;
use layercut_core::clip::{ClipTransform, TrackFlags, VideoClip};
use layercut_core::config::EditorConfig;
use layercut_core::error::CoreError;
use layercut_core::export::{CanvasSize, CompositionRequest, ExportCollaborator};
use layercut_core::history::{ClipSnapshot, HistoryManager};
use layercut_core::persistence::{
    Autosaver, SessionSnapshot, SnapshotStore, load_snapshot, save_snapshot, take_handoff,
};
use layercut_core::source::{AssetDescriptor, MediaSource, SignedUrlProvider, resolve_asset};
use layercut_core::store::{ClipStore, Placement};
use layercut_core::subtitle::{Subtitle, SubtitleTrack};
use layercut_core::time::TimeRange;
use uuid::Uuid;

use crate::clock::PlaybackClock;
use crate::compositor::{Compositor, FrameReport};
use crate::error::{EngineError, Result};
use crate::handle::HandleFactory;
use crate::keyboard::{FocusContext, KeyEvent, command_for_key};
use crate::pool::{HandleKey, MediaPool};
use crate::surface::RenderSurface;

/// Progress of loading the primary media into clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Empty,
    MetadataLoaded,
    ClipsInitialized,
}

/// New media placed on the timeline from a file or asset drop.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDrop {
    pub source: MediaSource,
    /// `None` appends on a fresh layer above every existing one.
    pub placement: Option<Placement>,
    /// Media length if its metadata could be read.
    pub duration: Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub name: String,
    pub asset_id: Option<String>,
}

impl MediaDrop {
    pub fn new(source: MediaSource) -> Self {
        Self {
            source,
            placement: None,
            duration: None,
            aspect_ratio: None,
            name: String::new(),
            asset_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddClip(VideoClip),
    PlaceClip { clip: VideoClip, placement: Placement },
    DropMedia(MediaDrop),
    RemoveClip(Uuid),
    RemoveAudioClip(Uuid),
    SplitClip { id: Uuid, at: f64 },
    SplitAudioClip { id: Uuid, at: f64 },
    MoveClip { id: Uuid, start: f64, layer: u32 },
    TrimStart { id: Uuid, start: f64 },
    TrimEnd { id: Uuid, end: f64 },
    /// Cut everything before the playhead and close the gap.
    RippleTrimLeft(Uuid),
    /// Cut everything after the playhead and close the gap.
    RippleTrimRight(Uuid),
    SetTransform { id: Uuid, transform: Option<ClipTransform> },
    SetLayerFlags { layer: u32, flags: TrackFlags },
    SeparateAllAudio,
    RelinkAllAudio,
    Play,
    Pause,
    TogglePlay,
    Seek(f64),
    StartScrub,
    ScrubTo(f64),
    EndScrub(f64),
    Undo,
    Redo,
    SetSubtitles(Vec<Subtitle>),
    ToggleSubtitleExcluded(Uuid),
    SetScriptText(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed.
    Noop,
    Applied,
    ClipAdded(Uuid),
    ClipSplit { left: Uuid, right: Uuid },
}

pub struct EditorSession {
    config: EditorConfig,
    store: ClipStore,
    subtitles: SubtitleTrack,
    history: HistoryManager,
    clock: PlaybackClock,
    pool: MediaPool,
    compositor: Compositor,
    autosaver: Autosaver,
    init_state: InitState,
    script_text: String,
    primary_media: Option<MediaSource>,
}

impl EditorSession {
    pub fn new(config: EditorConfig, factory: Box<dyn HandleFactory>) -> Self {
        let store = ClipStore::new();
        let mut history = HistoryManager::new(config.history_limit);
        history.push("Initial", store.snapshot());
        Self {
            pool: MediaPool::new(factory, config.proxy_endpoint.clone()),
            clock: PlaybackClock::new(&config),
            compositor: Compositor::new(&config),
            autosaver: Autosaver::new(Duration::from_millis(config.autosave_debounce_ms)),
            store,
            subtitles: SubtitleTrack::default(),
            history,
            init_state: InitState::Empty,
            script_text: String::new(),
            primary_media: None,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &ClipStore {
        &self.store
    }

    pub fn subtitles(&self) -> &SubtitleTrack {
        &self.subtitles
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn pool(&self) -> &MediaPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut MediaPool {
        &mut self.pool
    }

    pub fn init_state(&self) -> InitState {
        self.init_state
    }

    pub fn script_text(&self) -> &str {
        &self.script_text
    }

    pub fn primary_media(&self) -> Option<&MediaSource> {
        self.primary_media.as_ref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.autosaver.is_dirty()
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        self.dispatch_at(command, Instant::now())
    }

    /// Apply `command` as if it happened at `now`.
    pub fn dispatch_at(&mut self, command: Command, now: Instant) -> Result<Outcome> {
        let outcome = match command {
            Command::AddClip(clip) => {
                let id = self.store.add_clip(clip)?;
                self.clips_changed("Add clip", now);
                Outcome::ClipAdded(id)
            }
            Command::PlaceClip { clip, placement } => {
                let id = self.store.place_clip(clip, placement)?;
                self.clips_changed("Add clip", now);
                Outcome::ClipAdded(id)
            }
            Command::DropMedia(drop) => {
                let id = self.drop_media(drop)?;
                self.clips_changed("Drop media", now);
                Outcome::ClipAdded(id)
            }
            Command::RemoveClip(id) => {
                self.store.remove_clip(id)?;
                self.clips_changed("Delete clip", now);
                Outcome::Applied
            }
            Command::RemoveAudioClip(id) => {
                self.store.remove_audio_clip(id)?;
                self.clips_changed("Delete audio clip", now);
                Outcome::Applied
            }
            Command::SplitClip { id, at } => {
                let (left, right) = self.store.split_clip(id, at)?;
                self.clips_changed("Split clip", now);
                Outcome::ClipSplit { left, right }
            }
            Command::SplitAudioClip { id, at } => {
                let (left, right) = self.store.split_audio_clip(id, at)?;
                self.clips_changed("Split audio clip", now);
                Outcome::ClipSplit { left, right }
            }
            Command::MoveClip { id, start, layer } => {
                self.store.move_clip(id, start, layer)?;
                self.clips_changed("Move clip", now);
                Outcome::Applied
            }
            Command::TrimStart { id, start } => {
                self.store
                    .trim_start(id, start, self.config.min_clip_duration_secs)?;
                self.clips_changed("Trim clip", now);
                Outcome::Applied
            }
            Command::TrimEnd { id, end } => {
                self.store
                    .trim_end(id, end, self.config.min_clip_duration_secs)?;
                self.clips_changed("Trim clip", now);
                Outcome::Applied
            }
            Command::RippleTrimLeft(id) => {
                if !self.store.ripple_trim_left(id, self.clock.current_time())? {
                    return Ok(Outcome::Noop);
                }
                self.clips_changed("Ripple trim", now);
                Outcome::Applied
            }
            Command::RippleTrimRight(id) => {
                if !self.store.ripple_trim_right(id, self.clock.current_time())? {
                    return Ok(Outcome::Noop);
                }
                self.clips_changed("Ripple trim", now);
                Outcome::Applied
            }
            Command::SetTransform { id, transform } => {
                self.store.set_transform(id, transform)?;
                self.clips_changed("Transform clip", now);
                Outcome::Applied
            }
            Command::SetLayerFlags { layer, flags } => {
                self.store.set_layer_flags(layer, flags);
                self.clips_changed("Track flags", now);
                Outcome::Applied
            }
            Command::SeparateAllAudio => {
                if audio::separate_all_audio(&mut self.store)? == 0 {
                    return Ok(Outcome::Noop);
                }
                self.clips_changed("Separate audio", now);
                Outcome::Applied
            }
            Command::RelinkAllAudio => {
                audio::relink_all_audio(&mut self.store)?;
                self.clips_changed("Relink audio", now);
                Outcome::Applied
            }
            Command::Play => {
                self.clock.play(&self.store, &mut self.pool);
                Outcome::Applied
            }
            Command::Pause => {
                self.clock.pause(&mut self.pool);
                Outcome::Applied
            }
            Command::TogglePlay => {
                self.clock.toggle_play(&self.store, &mut self.pool);
                Outcome::Applied
            }
            Command::Seek(t) => {
                self.clock.seek(t, &self.store, &mut self.pool);
                Outcome::Applied
            }
            Command::StartScrub => {
                self.clock.start_scrub(&mut self.pool);
                Outcome::Applied
            }
            Command::ScrubTo(t) => {
                self.clock.preview_frame(t, &self.store, &mut self.pool);
                Outcome::Applied
            }
            Command::EndScrub(t) => {
                self.clock.end_scrub(t, &self.store, &mut self.pool);
                Outcome::Applied
            }
            Command::Undo => match self.history.undo().cloned() {
                Some(snapshot) => {
                    self.restore(&snapshot, "Undo", now);
                    Outcome::Applied
                }
                None => Outcome::Noop,
            },
            Command::Redo => match self.history.redo().cloned() {
                Some(snapshot) => {
                    self.restore(&snapshot, "Redo", now);
                    Outcome::Applied
                }
                None => Outcome::Noop,
            },
            Command::SetSubtitles(subtitles) => {
                self.subtitles = SubtitleTrack::new(subtitles);
                self.autosaver.mark_dirty(now);
                Outcome::Applied
            }
            Command::ToggleSubtitleExcluded(id) => {
                self.subtitles.toggle_excluded(id);
                self.autosaver.mark_dirty(now);
                Outcome::Applied
            }
            Command::SetScriptText(text) => {
                self.script_text = text;
                self.autosaver.mark_dirty(now);
                Outcome::Applied
            }
        };
        Ok(outcome)
    }

    /// Resolve a dragged asset and drop it on the timeline.
    pub fn drop_asset(
        &mut self,
        asset: &AssetDescriptor,
        provider: &dyn SignedUrlProvider,
        placement: Option<Placement>,
        duration: Option<f64>,
        aspect_ratio: Option<f64>,
    ) -> Result<Outcome> {
        let source = resolve_asset(asset, provider)?;
        let drop = MediaDrop {
            placement,
            duration,
            aspect_ratio,
            name: asset.id.clone(),
            asset_id: Some(asset.id.clone()),
            ..MediaDrop::new(source)
        };
        self.dispatch(Command::DropMedia(drop))
    }

    /// Translate a key press and dispatch it.
    pub fn handle_key(&mut self, event: &KeyEvent, focus: FocusContext) -> Result<Outcome> {
        match command_for_key(event, focus) {
            Some(command) => self.dispatch(command),
            None => Ok(Outcome::Noop),
        }
    }

    fn drop_media(&mut self, drop: MediaDrop) -> Result<Uuid> {
        let known = drop.duration.filter(|d| d.is_finite() && *d > 0.0);
        let duration = known.unwrap_or(self.config.fallback_clip_duration_secs);
        let mut clip = VideoClip::new(drop.source, 0.0, TimeRange::source(0.0, duration)?)?;
        clip.name = drop.name;
        clip.asset_id = drop.asset_id;
        clip.source_duration = known;
        clip.aspect_ratio = drop.aspect_ratio;

        let placement = drop.placement.unwrap_or(Placement::Append {
            layer: self.store.next_empty_layer(),
        });
        Ok(self.store.place_clip(clip, placement)?)
    }

    fn restore(&mut self, snapshot: &ClipSnapshot, label: &str, now: Instant) {
        self.store.restore(snapshot);
        self.clips_changed(label, now);
        self.history.finish_restore();
    }

    fn clips_changed(&mut self, label: &str, now: Instant) {
        self.clock.grow_duration(self.store.content_end());
        self.sync_base_mute();
        self.history.push(label, self.store.snapshot());
        self.autosaver.mark_dirty(now);

        let live: HashSet<Uuid> = self.store.clips().iter().map(|c| c.id).collect();
        self.pool.retain_overlays(&live);
        if !self.clock.media_should_play() {
            self.clock.refresh(&self.store, &mut self.pool);
        }
    }

    fn sync_base_mute(&mut self) {
        let muted = audio::base_muted(&self.store);
        if let Some(handle) = self.pool.get_mut(HandleKey::Base) {
            if handle.is_muted() != muted {
                tracing::debug!(muted, "Base handle mute changed");
                handle.set_muted(muted);
            }
        }
    }

    // =========================================================================
    // Primary media
    // =========================================================================

    /// Start over with new primary media. Clips, history and transport reset.
    pub fn replace_primary_media(&mut self, source: MediaSource, now: Instant) {
        tracing::info!(url = %source.as_str(), "Primary media replaced");
        self.store.clear();
        self.history.clear();
        self.history.push("Initial", self.store.snapshot());
        self.clock.reset();
        self.pool.clear();
        self.init_state = InitState::Empty;
        self.primary_media = Some(source);
        self.autosaver.mark_dirty(now);
    }

    /// Primary media metadata arrived. Creates the full-length base clip the
    /// first time; later calls only extend the duration.
    pub fn on_metadata(
        &mut self,
        duration: f64,
        aspect_ratio: Option<f64>,
        now: Instant,
    ) -> Result<Option<Uuid>> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(CoreError::InvalidClipInterval {
                start: 0.0,
                end: duration,
            }
            .into());
        }
        self.clock.grow_duration(duration);

        if self.init_state == InitState::Empty {
            self.init_state = InitState::MetadataLoaded;
            tracing::debug!(duration, "Primary media metadata loaded");
        }
        if self.init_state != InitState::MetadataLoaded {
            return Ok(None);
        }
        self.initialize_clips(duration, aspect_ratio, now)
    }

    fn initialize_clips(
        &mut self,
        duration: f64,
        aspect_ratio: Option<f64>,
        now: Instant,
    ) -> Result<Option<Uuid>> {
        let Some(source) = self.primary_media.clone() else {
            return Ok(None);
        };
        if !self.store.clips().is_empty() {
            self.init_state = InitState::ClipsInitialized;
            return Ok(None);
        }

        let mut clip = VideoClip::new(source, 0.0, TimeRange::source(0.0, duration)?)?;
        clip.name = "Main".to_string();
        clip.source_duration = Some(duration);
        clip.aspect_ratio = aspect_ratio;
        let id = self.store.add_clip(clip)?;
        self.init_state = InitState::ClipsInitialized;
        tracing::debug!(clip_id = %id, duration, "Clips initialized from primary media");
        self.clips_changed("Initialize clips", now);
        Ok(Some(id))
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            subtitles: self.subtitles.clone(),
            video_clips: self.store.clips().to_vec(),
            audio_clips: self.store.audio_clips().to_vec(),
            script_text: self.script_text.clone(),
            primary_media: self.primary_media.clone(),
            ..SessionSnapshot::default()
        }
    }

    /// Restore a handed-over project if one is waiting, else the last saved
    /// session. Read failures are logged and leave the session untouched.
    pub fn load_persisted(&mut self, backend: &mut dyn SnapshotStore) -> bool {
        let handoff_key = self.config.handoff_key.clone();
        match take_handoff(backend, &handoff_key) {
            Ok(Some(snapshot)) => return self.apply_snapshot(snapshot, true),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Failed to read project handoff"),
        }
        match load_snapshot(backend, &self.config.storage_key) {
            Ok(Some(snapshot)) => self.apply_snapshot(snapshot, false),
            Ok(None) => false,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load saved session");
                false
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: SessionSnapshot, handoff: bool) -> bool {
        let duration = snapshot.content_end();
        let primary_media = snapshot.restorable_primary_media();
        let store = match ClipStore::from_parts(snapshot.video_clips, snapshot.audio_clips) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "Saved clips are invalid, ignoring them");
                return false;
            }
        };

        self.store = store;
        self.subtitles = snapshot.subtitles;
        self.script_text = snapshot.script_text;
        self.primary_media = primary_media;
        self.clock.reset();
        self.clock.grow_duration(duration);
        self.pool.clear();
        self.history.clear();
        self.history.push("Restore", self.store.snapshot());
        self.init_state = if self.store.clips().is_empty() {
            InitState::Empty
        } else {
            InitState::ClipsInitialized
        };
        tracing::info!(handoff, clips = self.store.clips().len(), duration, "Session restored");
        true
    }

    /// Save if the debounce window has passed. Returns whether a save was
    /// written. Failures are logged and editing carries on.
    pub fn poll_autosave(&mut self, now: Instant, backend: &mut dyn SnapshotStore) -> bool {
        if !self.autosaver.poll(now) {
            return false;
        }
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            tracing::debug!("Autosave skipped: nothing to save");
            return false;
        }
        match save_snapshot(backend, &self.config.storage_key, &snapshot) {
            Ok(()) => {
                tracing::debug!(clips = snapshot.video_clips.len(), "Session autosaved");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Autosave failed");
                false
            }
        }
    }

    // =========================================================================
    // Frames and export
    // =========================================================================

    /// Advance playback by `dt` seconds and composite one frame.
    pub fn frame(&mut self, dt: f64, surface: &mut dyn RenderSurface) -> FrameReport {
        self.clock.tick(dt, &self.store, &mut self.pool);
        self.clock.sync_audio(&self.store, &mut self.pool);
        self.sync_base_mute();
        self.compositor
            .render_frame(&self.clock, &self.store, &mut self.pool, surface)
    }

    pub fn composition_request(&self) -> CompositionRequest {
        CompositionRequest::build(
            &self.store,
            &self.subtitles,
            CanvasSize {
                width: self.config.canvas_width,
                height: self.config.canvas_height,
            },
        )
    }

    pub fn export(&self, collaborator: &mut dyn ExportCollaborator) -> Result<()> {
        let request = self.composition_request();
        collaborator
            .submit(&request)
            .map_err(EngineError::Export)?;
        tracing::info!(clips = request.clips.len(), "Composition request submitted");
        Ok(())
    }

    /// Stop all media and drop pending saves.
    pub fn close(&mut self) {
        self.autosaver.cancel();
        self.pool.pause_all();
        self.pool.clear();
    }
}
