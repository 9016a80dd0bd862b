//! Authoritative transport state.
//!
//! The clock owns the logical playhead. While a base clip is under the
//! playhead the base handle is the time source and the clock follows it;
//! across gaps between base clips the clock advances from the frame delta
//! it is ticked with.

use layercut_core::config::EditorConfig;
use layercut_core::store::ClipStore;
use layercut_core::time::clamp_time;
use uuid::Uuid;

use crate::pool::{HandleKey, MediaPool};

/// How far ahead of the next base clip gap playback pre-seeks its handle.
const PRESEEK_WINDOW_SECS: f64 = 0.5;

/// Handle drift below this is not worth a seek when engaging playback.
const ENGAGE_EPSILON_SECS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Paused,
    Playing,
    /// A scrub gesture is in progress. `resume` is whether playback was
    /// running when it started.
    Scrubbing { resume: bool },
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: TransportState,
    current_time: f64,
    preview_time: Option<f64>,
    duration: f64,
    in_gap: bool,
    preseeked: Option<Uuid>,
    audio_tolerance: f64,
    gap_resume_threshold: f64,
}

impl PlaybackClock {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            state: TransportState::Paused,
            current_time: 0.0,
            preview_time: None,
            duration: 0.0,
            in_gap: false,
            preseeked: None,
            audio_tolerance: config.audio_resync_tolerance_secs,
            gap_resume_threshold: config.gap_resume_threshold_secs,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Logical playing flag. Stays true through a scrub that started while
    /// playing.
    pub fn is_playing(&self) -> bool {
        matches!(
            self.state,
            TransportState::Playing | TransportState::Scrubbing { resume: true }
        )
    }

    /// Whether media handles should be running right now.
    pub fn media_should_play(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_in_gap(&self) -> bool {
        self.in_gap
    }

    /// The time shown in the preview: the scrub position if one is pending,
    /// else the committed playhead.
    pub fn display_time(&self) -> f64 {
        self.preview_time.unwrap_or(self.current_time)
    }

    /// Extend the duration to `end`. Never shrinks.
    pub fn grow_duration(&mut self, end: f64) {
        if end.is_finite() && end > self.duration {
            tracing::debug!(from = self.duration, to = end, "Duration grown");
            self.duration = end;
        }
    }

    pub fn reset(&mut self) {
        self.state = TransportState::Paused;
        self.current_time = 0.0;
        self.preview_time = None;
        self.duration = 0.0;
        self.in_gap = false;
        self.preseeked = None;
    }

    pub fn play(&mut self, store: &ClipStore, pool: &mut MediaPool) {
        if let TransportState::Scrubbing { .. } = self.state {
            self.state = TransportState::Scrubbing { resume: true };
            return;
        }
        if self.duration > 0.0 && self.current_time >= self.duration {
            tracing::debug!(time = self.current_time, "Play ignored at end of timeline");
            return;
        }
        self.state = TransportState::Playing;
        self.engage(store, pool);
        tracing::debug!(time = self.current_time, in_gap = self.in_gap, "Playback started");
    }

    pub fn pause(&mut self, pool: &mut MediaPool) {
        if let TransportState::Scrubbing { .. } = self.state {
            self.state = TransportState::Scrubbing { resume: false };
            return;
        }
        self.state = TransportState::Paused;
        self.in_gap = false;
        pool.pause_all();
        tracing::debug!(time = self.current_time, "Playback paused");
    }

    pub fn toggle_play(&mut self, store: &ClipStore, pool: &mut MediaPool) {
        if self.is_playing() {
            self.pause(pool);
        } else {
            self.play(store, pool);
        }
    }

    /// Commit the playhead to `t`, clamped to `[0, duration]`, and position
    /// every handle under it.
    pub fn seek(&mut self, t: f64, store: &ClipStore, pool: &mut MediaPool) {
        let t = clamp_time(t, self.duration);
        self.current_time = t;
        self.preview_time = None;
        self.preseeked = None;
        self.position_handles(t, store, pool);
        if self.media_should_play() {
            self.engage(store, pool);
        }
    }

    /// Show the frame at `t` without moving the committed playhead.
    pub fn preview_frame(&mut self, t: f64, store: &ClipStore, pool: &mut MediaPool) {
        let t = clamp_time(t, self.duration);
        self.preview_time = Some(t);
        self.position_handles(t, store, pool);
    }

    /// Re-position handles at the displayed time, e.g. after an edit changed
    /// which clips are under the playhead.
    pub fn refresh(&mut self, store: &ClipStore, pool: &mut MediaPool) {
        self.position_handles(self.display_time(), store, pool);
    }

    pub fn start_scrub(&mut self, pool: &mut MediaPool) {
        if let TransportState::Scrubbing { .. } = self.state {
            return;
        }
        let resume = self.state == TransportState::Playing;
        self.state = TransportState::Scrubbing { resume };
        self.in_gap = false;
        pool.pause_all();
        tracing::debug!(resume, "Scrub started");
    }

    /// Finish a scrub at `t`: commit the seek and restore the play state
    /// captured when the scrub started.
    pub fn end_scrub(&mut self, t: f64, store: &ClipStore, pool: &mut MediaPool) {
        let resume = match self.state {
            TransportState::Scrubbing { resume } => resume,
            _ => self.is_playing(),
        };
        self.state = if resume {
            TransportState::Playing
        } else {
            TransportState::Paused
        };
        self.seek(t, store, pool);
        tracing::debug!(time = self.current_time, resume, "Scrub ended");
    }

    /// Advance playback by one frame of `dt` seconds. Returns the playhead.
    pub fn tick(&mut self, dt: f64, store: &ClipStore, pool: &mut MediaPool) -> f64 {
        if !self.media_should_play() {
            return self.current_time;
        }
        if !self.in_gap {
            self.follow_base(dt, store, pool);
        }
        if self.in_gap {
            self.advance_gap(dt, store, pool);
        }
        self.current_time
    }

    /// The time the compositor should draw: the base handle's mapped time
    /// while it is actively playing, else the last known playhead.
    pub fn master_time(&self, store: &ClipStore, pool: &MediaPool) -> f64 {
        if !self.media_should_play() || self.in_gap {
            return self.display_time();
        }
        let Some(clip) = store.base_clip_at(self.current_time) else {
            return self.current_time;
        };
        match pool.get(HandleKey::Base) {
            Some(handle) if !handle.is_paused() => {
                let mapped = clip.start() + (handle.current_time() - clip.source_range.start);
                clamp_time(mapped, self.duration)
            }
            _ => self.current_time,
        }
    }

    /// Keep the separated-audio handle on the active audio clip.
    pub fn sync_audio(&mut self, store: &ClipStore, pool: &mut MediaPool) {
        let t = self.display_time();
        let should_play = self.media_should_play();
        let Some(audio) = store.active_audio_clip(t) else {
            if let Some(handle) = pool.get_mut(HandleKey::Audio) {
                if !handle.is_paused() {
                    handle.pause();
                }
            }
            return;
        };
        let Some(handle) = pool.ensure(HandleKey::Audio, &audio.source) else {
            return;
        };
        let expected = audio.source_time_at(t);
        let drift = (handle.current_time() - expected).abs();
        if drift > self.audio_tolerance {
            tracing::trace!(clip_id = %audio.id, drift, expected, "Audio resync");
            handle.seek(expected);
        }
        if handle.is_muted() != audio.muted {
            handle.set_muted(audio.muted);
        }
        if should_play && handle.is_paused() {
            handle.play();
        } else if !should_play && !handle.is_paused() {
            handle.pause();
        }
    }

    fn position_handles(&mut self, t: f64, store: &ClipStore, pool: &mut MediaPool) {
        let active = store.active_clips(t);
        let audio = store.active_audio_clip(t);
        if active.is_empty() && audio.is_none() {
            return;
        }

        if let Some(base) = store.base_clip_at(t) {
            if let Some(handle) = pool.ensure(HandleKey::Base, &base.source) {
                handle.seek(base.source_time_at(t));
            }
        }
        for clip in active.iter().filter(|c| !c.is_base()) {
            if let Some(handle) = pool.ensure(HandleKey::Overlay(clip.id), &clip.source) {
                handle.seek(clip.source_time_at(t));
            }
        }
        if let Some(audio) = audio {
            if let Some(handle) = pool.ensure(HandleKey::Audio, &audio.source) {
                handle.seek(audio.source_time_at(t));
            }
        }
    }

    /// Start the base handle under the playhead, or fall into gap playback.
    fn engage(&mut self, store: &ClipStore, pool: &mut MediaPool) {
        let t = self.current_time;
        match store.base_clip_at(t) {
            Some(clip) => {
                self.in_gap = false;
                if let Some(handle) = pool.ensure(HandleKey::Base, &clip.source) {
                    let expected = clip.source_time_at(t);
                    if (handle.current_time() - expected).abs() > ENGAGE_EPSILON_SECS {
                        handle.seek(expected);
                    }
                    handle.play();
                }
            }
            None => {
                self.in_gap = true;
                if let Some(handle) = pool.get_mut(HandleKey::Base) {
                    handle.pause();
                }
            }
        }
    }

    fn follow_base(&mut self, dt: f64, store: &ClipStore, pool: &mut MediaPool) {
        let Some(clip) = store.base_clip_at(self.current_time) else {
            self.in_gap = true;
            return;
        };
        let mapped = match pool.get(HandleKey::Base) {
            Some(handle) => clip.start() + (handle.current_time() - clip.source_range.start),
            // The base media failed to load. Keep time moving.
            None => self.current_time + dt,
        };

        if mapped < clip.end() {
            self.current_time = clamp_time(mapped.max(clip.start()), self.duration);
            return;
        }

        let clip_end = clip.end();
        match store.next_base_clip_after(clip_end) {
            Some(next) if next.start() - clip_end <= self.gap_resume_threshold => {
                tracing::debug!(clip_id = %next.id, "Advancing to next base clip");
                self.current_time = next.start();
                if let Some(handle) = pool.ensure(HandleKey::Base, &next.source) {
                    handle.seek(next.source_range.start);
                    handle.play();
                }
            }
            _ if clip_end >= self.duration => self.finish(pool),
            _ => {
                tracing::debug!(time = clip_end, "Entering gap playback");
                self.current_time = clip_end;
                self.in_gap = true;
                if let Some(handle) = pool.get_mut(HandleKey::Base) {
                    handle.pause();
                }
            }
        }
    }

    fn advance_gap(&mut self, dt: f64, store: &ClipStore, pool: &mut MediaPool) {
        let t = self.current_time + dt.max(0.0);
        if t >= self.duration {
            self.finish(pool);
            return;
        }
        self.current_time = t;

        if let Some(clip) = store.base_clip_at(t) {
            tracing::debug!(clip_id = %clip.id, time = t, "Leaving gap playback");
            self.in_gap = false;
            self.preseeked = None;
            if let Some(handle) = pool.ensure(HandleKey::Base, &clip.source) {
                handle.seek(clip.source_time_at(t));
                handle.play();
            }
            return;
        }

        if let Some(next) = store.next_base_clip_after(t) {
            if next.start() - t <= PRESEEK_WINDOW_SECS && self.preseeked != Some(next.id) {
                if let Some(handle) = pool.ensure(HandleKey::Base, &next.source) {
                    handle.seek(next.source_range.start);
                }
                self.preseeked = Some(next.id);
            }
        }
    }

    fn finish(&mut self, pool: &mut MediaPool) {
        self.current_time = self.duration;
        self.state = TransportState::Paused;
        self.in_gap = false;
        self.preseeked = None;
        pool.pause_all();
        tracing::debug!(time = self.current_time, "Playback reached end");
    }
}
