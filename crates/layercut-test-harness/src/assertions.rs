use layercut_core::clip::VideoClip;
use layercut_core::store::ClipStore;

/// Assert that clips are in non-decreasing layer order.
pub fn assert_layers_sorted(clips: &[&VideoClip]) {
    for window in clips.windows(2) {
        assert!(
            window[0].layer <= window[1].layer,
            "clips not sorted by layer: {:?} (layer {}) should come after {:?} (layer {})",
            window[0].id,
            window[0].layer,
            window[1].id,
            window[1].layer
        );
    }
}

/// Assert the interval invariants of every clip in the store, and that each
/// separated audio clip's video clip is unlinked.
pub fn assert_clip_invariants(store: &ClipStore) {
    for clip in store.clips() {
        assert!(
            clip.start() < clip.end(),
            "clip {:?} has empty timeline interval [{}, {})",
            clip.id,
            clip.start(),
            clip.end()
        );
        assert!(
            clip.source_range.start <= clip.source_range.end,
            "clip {:?} has inverted source interval [{}, {})",
            clip.id,
            clip.source_range.start,
            clip.source_range.end
        );
    }
    for audio in store.audio_clips() {
        assert!(
            audio.start() < audio.end(),
            "audio clip {:?} has empty timeline interval",
            audio.id
        );
        if let Some(owner) = store.clip(audio.video_clip_id) {
            assert!(
                !owner.is_audio_linked,
                "clip {:?} still has linked audio while audio clip {:?} exists",
                owner.id,
                audio.id
            );
        }
    }
}

/// Assert that `actual` is within `tolerance` of `expected`.
pub fn assert_approx(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{actual:.4} != expected {expected:.4} (tolerance {tolerance:.4})"
    );
}
