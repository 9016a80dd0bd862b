use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip::{AudioClip, ClipTransform, TrackFlags, VideoClip};
use crate::error::{CoreError, Result};
use crate::history::ClipSnapshot;
use crate::time::TimeRange;

/// Where a newly created clip goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Dropped at a timeline time. The clip lands on the lowest layer that
    /// is free for its whole interval.
    At(f64),
    /// Appended without a position. The clip starts where the last clip on
    /// `layer` ends.
    Append { layer: u32 },
}

/// The single owner of every video and audio clip in a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipStore {
    clips: Vec<VideoClip>,
    audio_clips: Vec<AudioClip>,
    next_seq: u64,
}

impl ClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously saved clips, validating each one.
    pub fn from_parts(clips: Vec<VideoClip>, audio_clips: Vec<AudioClip>) -> Result<Self> {
        for clip in &clips {
            clip.validate()?;
        }
        for audio in &audio_clips {
            audio.validate()?;
        }
        let next_seq = clips.iter().map(|c| c.seq + 1).max().unwrap_or(0);
        Ok(Self {
            clips,
            audio_clips,
            next_seq,
        })
    }

    pub fn clips(&self) -> &[VideoClip] {
        &self.clips
    }

    pub fn audio_clips(&self) -> &[AudioClip] {
        &self.audio_clips
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty() && self.audio_clips.is_empty()
    }

    pub fn clip(&self, id: Uuid) -> Option<&VideoClip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn audio_clip(&self, id: Uuid) -> Option<&AudioClip> {
        self.audio_clips.iter().find(|a| a.id == id)
    }

    fn index_of(&self, id: Uuid) -> Result<usize> {
        self.clips
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::ClipNotFound(id))
    }

    fn unlocked_index_of(&self, id: Uuid) -> Result<usize> {
        let idx = self.index_of(id)?;
        if self.clips[idx].flags.locked {
            return Err(CoreError::ClipLocked(id));
        }
        Ok(idx)
    }

    /// Replace the clip at `idx` once the edited copy is known to be valid.
    fn commit_edit(&mut self, idx: usize, clip: VideoClip) -> Result<()> {
        clip.validate()?;
        self.clips[idx] = clip;
        Ok(())
    }

    fn stamp(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Insert a clip as-is. Zero or negative length clips are rejected and
    /// never stored.
    pub fn add_clip(&mut self, mut clip: VideoClip) -> Result<Uuid> {
        clip.validate()?;
        clip.seq = self.stamp();
        let id = clip.id;
        tracing::debug!(clip_id = %id, layer = clip.layer, start = clip.start(), "Clip added");
        self.clips.push(clip);
        Ok(id)
    }

    /// Position `clip` per `placement` and insert it.
    pub fn place_clip(&mut self, mut clip: VideoClip, placement: Placement) -> Result<Uuid> {
        match placement {
            Placement::At(t) => {
                clip.timeline_range = clip.timeline_range.moved_to(t.max(0.0));
                clip.layer = self.free_layer_for(&clip.timeline_range);
            }
            Placement::Append { layer } => {
                let start = self.magnet_start(layer);
                clip.timeline_range = clip.timeline_range.moved_to(start);
                clip.layer = layer;
            }
        }
        self.add_clip(clip)
    }

    /// Apply `f` to the clip list. The change is discarded if any clip ends
    /// up invalid. Clips introduced by `f` get fresh insertion stamps.
    pub fn update_clips<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<VideoClip>),
    {
        let known: HashSet<Uuid> = self.clips.iter().map(|c| c.id).collect();
        let mut next = self.clips.clone();
        f(&mut next);
        for clip in &next {
            clip.validate()?;
        }
        for clip in next.iter_mut().filter(|c| !known.contains(&c.id)) {
            clip.seq = self.next_seq;
            self.next_seq += 1;
        }
        self.clips = next;
        Ok(())
    }

    /// Apply `f` to the audio clip list, validating the result.
    pub fn update_audio_clips<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<AudioClip>),
    {
        let mut next = self.audio_clips.clone();
        f(&mut next);
        for audio in &next {
            audio.validate()?;
        }
        self.audio_clips = next;
        Ok(())
    }

    pub fn remove_clip(&mut self, id: Uuid) -> Result<VideoClip> {
        let idx = self.unlocked_index_of(id)?;
        tracing::debug!(clip_id = %id, "Clip removed");
        Ok(self.clips.remove(idx))
    }

    /// Remove an audio clip and pull later audio clips left by its length.
    pub fn remove_audio_clip(&mut self, id: Uuid) -> Result<AudioClip> {
        let idx = self
            .audio_clips
            .iter()
            .position(|a| a.id == id)
            .ok_or(CoreError::AudioClipNotFound(id))?;
        let removed = self.audio_clips.remove(idx);
        let gap = removed.timeline_range.duration();
        for audio in &mut self.audio_clips {
            if audio.start() >= removed.end() {
                audio.timeline_range.start -= gap;
                audio.timeline_range.end -= gap;
            }
        }
        Ok(removed)
    }

    /// Visible clips covering `t`, bottom layer first. Clips sharing a layer
    /// are ordered by insertion, so the most recently added one draws last.
    pub fn active_clips(&self, t: f64) -> Vec<&VideoClip> {
        let mut active: Vec<&VideoClip> = self
            .clips
            .iter()
            .filter(|c| !c.flags.hidden && c.timeline_range.contains(t))
            .collect();
        active.sort_by_key(|c| (c.layer, c.seq));
        active
    }

    /// The base-layer clip covering `t`, if any. Overlapping base clips
    /// resolve to the most recently added one.
    pub fn base_clip_at(&self, t: f64) -> Option<&VideoClip> {
        self.active_clips(t).into_iter().rev().find(|c| c.is_base())
    }

    /// The first base-layer clip starting at or after `t`.
    pub fn next_base_clip_after(&self, t: f64) -> Option<&VideoClip> {
        self.clips
            .iter()
            .filter(|c| c.is_base() && !c.flags.hidden && c.start() >= t)
            .min_by(|a, b| a.start().total_cmp(&b.start()))
    }

    pub fn active_audio_clip(&self, t: f64) -> Option<&AudioClip> {
        self.audio_clips
            .iter()
            .find(|a| a.timeline_range.contains(t))
    }

    pub fn clips_on_layer(&self, layer: u32) -> impl Iterator<Item = &VideoClip> {
        self.clips.iter().filter(move |c| c.layer == layer)
    }

    pub fn max_layer(&self) -> Option<u32> {
        self.clips.iter().map(|c| c.layer).max()
    }

    /// The layer above every existing one, or 0 when the store is empty.
    pub fn next_empty_layer(&self) -> u32 {
        self.max_layer().map_or(0, |l| l + 1)
    }

    /// Lowest layer with no clip overlapping `range`.
    pub fn free_layer_for(&self, range: &TimeRange) -> u32 {
        let Some(max) = self.max_layer() else {
            return 0;
        };
        (0..=max)
            .find(|&layer| {
                !self
                    .clips_on_layer(layer)
                    .any(|c| c.timeline_range.overlaps(range))
            })
            .unwrap_or(max + 1)
    }

    /// Where an appended clip starts on `layer`.
    pub fn magnet_start(&self, layer: u32) -> f64 {
        self.clips_on_layer(layer)
            .map(|c| c.end())
            .fold(0.0, f64::max)
    }

    /// Largest end time over every video and audio clip.
    pub fn content_end(&self) -> f64 {
        let video = self.clips.iter().map(|c| c.end());
        let audio = self.audio_clips.iter().map(|a| a.end());
        video.chain(audio).fold(0.0, f64::max)
    }

    /// Split a clip at `t`, dividing its source interval proportionally.
    /// Returns the ids of the left and right halves.
    pub fn split_clip(&mut self, id: Uuid, t: f64) -> Result<(Uuid, Uuid)> {
        let idx = self.unlocked_index_of(id)?;
        let clip = &self.clips[idx];
        if t <= clip.start() || t >= clip.end() {
            return Err(CoreError::SplitOutsideClip { clip_id: id, time: t });
        }
        let split = proportional_split(&clip.timeline_range, &clip.source_range, t);

        let mut left = clip.clone();
        left.id = Uuid::new_v4();
        left.timeline_range.end = t;
        left.source_range.end = split;

        let mut right = clip.clone();
        right.id = Uuid::new_v4();
        right.timeline_range.start = t;
        right.source_range.start = split;

        let ids = (left.id, right.id);
        self.clips[idx] = left;
        self.clips.insert(idx + 1, right);
        tracing::debug!(clip_id = %id, time = t, "Clip split");
        Ok(ids)
    }

    pub fn split_audio_clip(&mut self, id: Uuid, t: f64) -> Result<(Uuid, Uuid)> {
        let idx = self
            .audio_clips
            .iter()
            .position(|a| a.id == id)
            .ok_or(CoreError::AudioClipNotFound(id))?;
        let audio = &self.audio_clips[idx];
        if t <= audio.start() || t >= audio.end() {
            return Err(CoreError::SplitOutsideClip { clip_id: id, time: t });
        }
        let split = proportional_split(&audio.timeline_range, &audio.source_range, t);

        let mut left = audio.clone();
        left.id = Uuid::new_v4();
        left.timeline_range.end = t;
        left.source_range.end = split;

        let mut right = audio.clone();
        right.id = Uuid::new_v4();
        right.timeline_range.start = t;
        right.source_range.start = split;

        let ids = (left.id, right.id);
        self.audio_clips[idx] = left;
        self.audio_clips.insert(idx + 1, right);
        Ok(ids)
    }

    /// Move a clip to `start` on `layer`, keeping its length.
    pub fn move_clip(&mut self, id: Uuid, start: f64, layer: u32) -> Result<()> {
        let idx = self.unlocked_index_of(id)?;
        let mut clip = self.clips[idx].clone();
        require_finite(start, start + clip.duration())?;
        clip.timeline_range = clip.timeline_range.moved_to(start.max(0.0));
        clip.layer = layer;
        self.commit_edit(idx, clip)
    }

    /// Drag the left edge of a clip to `new_start`. The edge stops at the
    /// previous clip on the layer, at zero, at the start of the media, and
    /// `min_duration` before the right edge. Returns the applied start.
    pub fn trim_start(&mut self, id: Uuid, new_start: f64, min_duration: f64) -> Result<f64> {
        let idx = self.unlocked_index_of(id)?;
        let clip = &self.clips[idx];
        require_finite(new_start, clip.end())?;
        let min_duration = min_duration.max(MIN_EDIT_LENGTH_SECS);
        let prev_end = self
            .clips_on_layer(clip.layer)
            .filter(|c| c.id != id && c.start() < clip.start())
            .map(|c| c.end())
            .fold(0.0, f64::max);

        let media_floor = clip.start() - clip.source_range.start;
        let start = new_start
            .max(prev_end)
            .max(media_floor)
            .min(clip.end() - min_duration);
        let delta = start - clip.start();

        let mut clip = clip.clone();
        clip.timeline_range.start = start;
        clip.source_range.start = (clip.source_range.start + delta)
            .max(0.0)
            .min(clip.source_range.end);
        self.commit_edit(idx, clip)?;
        Ok(start)
    }

    /// Drag the right edge of a clip to `new_end`. The edge stops at the next
    /// clip on the layer, at the end of the media, and `min_duration` after
    /// the left edge. Returns the applied end.
    pub fn trim_end(&mut self, id: Uuid, new_end: f64, min_duration: f64) -> Result<f64> {
        let idx = self.unlocked_index_of(id)?;
        let clip = &self.clips[idx];
        require_finite(clip.start(), new_end)?;
        let min_duration = min_duration.max(MIN_EDIT_LENGTH_SECS);
        let next_start = self
            .clips_on_layer(clip.layer)
            .filter(|c| c.id != id && c.start() > clip.start())
            .map(|c| c.start())
            .fold(f64::INFINITY, f64::min);

        let mut end = new_end.min(next_start);
        if let Some(total) = clip.source_duration {
            end = end.min(clip.end() + (total - clip.source_range.end));
        }
        let end = end.max(clip.start() + min_duration);
        let delta = end - clip.end();

        let mut clip = clip.clone();
        clip.timeline_range.end = end;
        clip.source_range.end = (clip.source_range.end + delta).max(clip.source_range.start);
        self.commit_edit(idx, clip)?;
        Ok(end)
    }

    /// Cut the part of a clip before `t` and pull later clips on its layer
    /// left by the cut length. Returns `false` when `t` is not strictly
    /// inside the clip.
    pub fn ripple_trim_left(&mut self, id: Uuid, t: f64) -> Result<bool> {
        let idx = self.unlocked_index_of(id)?;
        let clip = &self.clips[idx];
        if t <= clip.start() || t >= clip.end() {
            return Ok(false);
        }
        let cut = t - clip.start();
        let (layer, old_end) = (clip.layer, clip.end());

        let clip = &mut self.clips[idx];
        clip.timeline_range.end -= cut;
        clip.source_range.start = (clip.source_range.start + cut).min(clip.source_range.end);
        self.shift_layer_after(layer, old_end, cut, id);
        Ok(true)
    }

    /// Cut the part of a clip after `t` and pull later clips on its layer
    /// left by the cut length.
    pub fn ripple_trim_right(&mut self, id: Uuid, t: f64) -> Result<bool> {
        let idx = self.unlocked_index_of(id)?;
        let clip = &self.clips[idx];
        if t <= clip.start() || t >= clip.end() {
            return Ok(false);
        }
        let cut = clip.end() - t;
        let (layer, old_end) = (clip.layer, clip.end());

        let clip = &mut self.clips[idx];
        clip.timeline_range.end = t;
        clip.source_range.end = (clip.source_range.end - cut).max(clip.source_range.start);
        self.shift_layer_after(layer, old_end, cut, id);
        Ok(true)
    }

    fn shift_layer_after(&mut self, layer: u32, from: f64, by: f64, skip: Uuid) {
        for other in self
            .clips
            .iter_mut()
            .filter(|c| c.id != skip && c.layer == layer && c.start() >= from)
        {
            other.timeline_range.start -= by;
            other.timeline_range.end -= by;
        }
    }

    pub fn set_transform(&mut self, id: Uuid, transform: Option<ClipTransform>) -> Result<()> {
        let idx = self.index_of(id)?;
        self.clips[idx].transform = transform;
        Ok(())
    }

    /// Apply mute/lock/hide flags to every clip on `layer`.
    pub fn set_layer_flags(&mut self, layer: u32, flags: TrackFlags) {
        for clip in self.clips.iter_mut().filter(|c| c.layer == layer) {
            clip.flags = flags;
        }
    }

    pub fn snapshot(&self) -> ClipSnapshot {
        ClipSnapshot {
            clips: self.clips.clone(),
            audio_clips: self.audio_clips.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &ClipSnapshot) {
        self.clips = snapshot.clips.clone();
        self.audio_clips = snapshot.audio_clips.clone();
        let restored_next = self.clips.iter().map(|c| c.seq + 1).max().unwrap_or(0);
        self.next_seq = self.next_seq.max(restored_next);
    }

    pub fn clear(&mut self) {
        self.clips.clear();
        self.audio_clips.clear();
    }
}

/// Shortest clip a trim may leave behind, whatever minimum the caller asks for.
const MIN_EDIT_LENGTH_SECS: f64 = 1e-3;

fn require_finite(start: f64, end: f64) -> Result<()> {
    if start.is_finite() && end.is_finite() {
        Ok(())
    } else {
        Err(CoreError::InvalidClipInterval { start, end })
    }
}

fn proportional_split(timeline: &TimeRange, source: &TimeRange, t: f64) -> f64 {
    let ratio = (t - timeline.start) / timeline.duration();
    source.start + source.duration() * ratio
}
