use crate::error::Result;
use crate::surface::FrameBuffer;

/// Readiness changes reported by a media handle.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEvent {
    /// A frame at the current position can be presented.
    Ready,
    /// The handle lost its current frame, e.g. after a seek or source switch.
    Buffering,
    Failed(String),
    Ended,
}

/// A platform media element: one decoding source with its own transport.
///
/// Writes such as [`MediaHandle::seek`] are fire-and-forget. The handle
/// settles asynchronously and reports progress through
/// [`MediaHandle::poll_event`].
pub trait MediaHandle {
    fn source(&self) -> &str;

    /// Point the handle at a new URL. Readiness is lost until a new
    /// [`HandleEvent::Ready`] arrives.
    fn set_source(&mut self, url: &str);

    /// Position in source seconds.
    fn current_time(&self) -> f64;

    fn seek(&mut self, source_time: f64);

    fn play(&mut self);

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    /// Pixel size of the decoded picture, once known.
    fn natural_size(&self) -> Option<(u32, u32)>;

    /// The frame at the current position, if decoded.
    fn current_frame(&self) -> Option<&FrameBuffer>;

    fn poll_event(&mut self) -> Option<HandleEvent>;

    /// Width over height of the decoded picture.
    fn aspect_ratio(&self) -> Option<f64> {
        self.natural_size()
            .filter(|(w, h)| *w > 0 && *h > 0)
            .map(|(w, h)| w as f64 / h as f64)
    }
}

/// Creates handles for URLs. Implemented by the platform layer.
pub trait HandleFactory {
    fn create(&mut self, url: &str) -> Result<Box<dyn MediaHandle>>;
}
