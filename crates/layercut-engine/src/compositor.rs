use layercut_core::clip::VideoClip;
use layercut_core::config::EditorConfig;
use layercut_core::source::is_same_source;
use layercut_core::store::ClipStore;
use uuid::Uuid;

use crate::clock::PlaybackClock;
use crate::layout::{Rect, base_rect, overlay_rect};
use crate::pool::{HandleKey, MediaPool};
use crate::surface::RenderSurface;

/// What one composited frame did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub master_time: f64,
    /// Whether the surface was cleared to the background this frame.
    pub cleared: bool,
    /// Clips drawn, in draw order.
    pub drawn: Vec<Uuid>,
    /// Overlays hard-seeked for exceeding the drift tolerance.
    pub resynced: Vec<Uuid>,
    pub readiness_changed: bool,
}

/// Draws the active clips onto a surface, bottom layer first.
#[derive(Debug, Clone)]
pub struct Compositor {
    background: [u8; 4],
    overlay_tolerance: f64,
}

impl Compositor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            background: config.background,
            overlay_tolerance: config.overlay_resync_tolerance_secs,
        }
    }

    pub fn background(&self) -> [u8; 4] {
        self.background
    }

    /// Composite one frame. Failures are logged and never stop the caller.
    pub fn render_frame(
        &self,
        clock: &PlaybackClock,
        store: &ClipStore,
        pool: &mut MediaPool,
        surface: &mut dyn RenderSurface,
    ) -> FrameReport {
        pool.pump_events();
        let master_time = clock.master_time(store, pool);
        let mut report = FrameReport {
            master_time,
            readiness_changed: pool.take_readiness_changed(),
            ..FrameReport::default()
        };

        let active = drawable_clips(store, master_time);
        for clip in active.iter().filter(|c| !c.is_base()) {
            pool.ensure(HandleKey::Overlay(clip.id), &clip.source);
        }

        let any_ready = active.iter().any(|c| pool.is_ready(handle_key(c)));
        if active.is_empty() || any_ready {
            surface.clear(self.background);
            report.cleared = true;
        }

        let (width, height) = surface.size();
        let (width, height) = (width as f64, height as f64);
        let proxy_endpoint = pool.proxy_endpoint().to_string();
        let should_play = clock.media_should_play();

        for clip in active {
            let key = handle_key(clip);
            let ready = pool.is_ready(key);
            let Some(handle) = pool.get_mut(key) else {
                continue;
            };

            let rect: Rect = if clip.is_base() {
                let url = clip.source.playable_url(&proxy_endpoint);
                if !is_same_source(handle.source(), &url, &proxy_endpoint) {
                    tracing::trace!(clip_id = %clip.id, "Base handle not on this clip yet");
                    continue;
                }
                let ratio = handle
                    .aspect_ratio()
                    .unwrap_or_else(|| clip.effective_aspect_ratio(None));
                base_rect(width, height, ratio, clip.transform.as_ref())
            } else {
                let expected = clip.source_time_at(master_time);
                let drift = (handle.current_time() - expected).abs();
                if drift > self.overlay_tolerance {
                    tracing::trace!(clip_id = %clip.id, drift, expected, "Overlay resync");
                    handle.seek(expected);
                    report.resynced.push(clip.id);
                }
                if should_play && handle.is_paused() {
                    handle.play();
                } else if !should_play && !handle.is_paused() {
                    handle.pause();
                }
                let muted = clip.flags.muted || !clip.is_audio_linked;
                if handle.is_muted() != muted {
                    handle.set_muted(muted);
                }
                let ratio = clip.effective_aspect_ratio(handle.aspect_ratio());
                overlay_rect(
                    width,
                    height,
                    ratio,
                    &clip.transform.unwrap_or_default(),
                )
            };

            if !ready {
                continue;
            }
            let Some(frame) = handle.current_frame() else {
                continue;
            };
            match surface.draw(frame, rect) {
                Ok(()) => report.drawn.push(clip.id),
                Err(e) => tracing::warn!(clip_id = %clip.id, error = %e, "Draw failed"),
            }
        }

        tracing::trace!(
            time = master_time,
            cleared = report.cleared,
            drawn = report.drawn.len(),
            "Frame composited"
        );
        report
    }
}

/// Active clips in draw order. Only the most recent base clip is kept, since
/// every base clip shares one handle.
pub fn drawable_clips(store: &ClipStore, t: f64) -> Vec<&VideoClip> {
    let mut active = store.active_clips(t);
    if let Some(top_base) = store.base_clip_at(t).map(|c| c.id) {
        active.retain(|c| !c.is_base() || c.id == top_base);
    }
    active
}

fn handle_key(clip: &VideoClip) -> HandleKey {
    if clip.is_base() {
        HandleKey::Base
    } else {
        HandleKey::Overlay(clip.id)
    }
}
