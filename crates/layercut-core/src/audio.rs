//! Linking and unlinking clip audio.
//!
//! Linked audio plays through the owning video clip's own handle. Separation
//! moves it onto dedicated [`AudioClip`]s and silences the video handles so
//! nothing is heard twice.

use crate::clip::AudioClip;
use crate::error::Result;
use crate::store::ClipStore;

/// Separate the audio of every linked clip. Replaces any previous audio
/// clip list. Returns the number of audio clips created; when no clip has
/// linked audio left the store is untouched and 0 is returned.
pub fn separate_all_audio(store: &mut ClipStore) -> Result<usize> {
    let separated: Vec<AudioClip> = store
        .clips()
        .iter()
        .filter(|c| c.has_audio && c.is_audio_linked)
        .map(AudioClip::separated_from)
        .collect();
    if separated.is_empty() {
        tracing::debug!("No linked audio to separate");
        return Ok(0);
    }

    let links: Vec<_> = separated.iter().map(|a| (a.video_clip_id, a.id)).collect();
    store.update_clips(|clips| {
        for clip in clips.iter_mut() {
            if let Some((_, audio_id)) = links.iter().find(|(video_id, _)| *video_id == clip.id) {
                clip.is_audio_linked = false;
                clip.audio_clip_id = Some(*audio_id);
            }
        }
    })?;

    let count = separated.len();
    store.update_audio_clips(|audio| *audio = separated)?;
    tracing::debug!(count, "Audio separated");
    Ok(count)
}

/// Drop every audio clip and give each video clip its audio back.
pub fn relink_all_audio(store: &mut ClipStore) -> Result<()> {
    store.update_audio_clips(|audio| audio.clear())?;
    store.update_clips(|clips| {
        for clip in clips.iter_mut() {
            clip.has_audio = true;
            clip.is_audio_linked = true;
            clip.audio_clip_id = None;
        }
    })?;
    tracing::debug!("Audio relinked");
    Ok(())
}

/// Whether the base handle must be muted for the current clip set.
///
/// True when any base clip is muted, any base clip's audio has been
/// unlinked, or any separated audio clip exists.
pub fn base_muted(store: &ClipStore) -> bool {
    let base_silenced = store
        .clips_on_layer(0)
        .any(|c| c.flags.muted || (c.has_audio && !c.is_audio_linked));
    base_silenced || !store.audio_clips().is_empty()
}
