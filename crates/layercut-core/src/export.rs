use serde::{Deserialize, Serialize};

use crate::clip::VideoClip;
use crate::store::ClipStore;
use crate::subtitle::{Subtitle, SubtitleTrack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

/// The payload handed to the external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRequest {
    pub canvas: CanvasSize,
    pub clips: Vec<VideoClip>,
    pub subtitles: Vec<Subtitle>,
}

impl CompositionRequest {
    pub fn build(store: &ClipStore, subtitles: &SubtitleTrack, canvas: CanvasSize) -> Self {
        Self {
            canvas,
            clips: store.clips().to_vec(),
            subtitles: subtitles.effective(),
        }
    }
}

/// Receives finished composition requests. Encoding happens elsewhere.
pub trait ExportCollaborator {
    fn submit(&mut self, request: &CompositionRequest) -> std::result::Result<(), String>;
}
