use std::fmt::Display;

/// Identifies one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// The platform's per-display-frame callback source.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;

    fn cancel(&mut self, token: FrameToken);
}

/// Keeps exactly one frame callback pending while running.
///
/// A failing frame is logged and the loop reschedules anyway. Dropping the
/// loop cancels the pending callback.
pub struct RenderLoop<S: FrameScheduler> {
    scheduler: S,
    pending: Option<FrameToken>,
    frames: u64,
    failures: u64,
}

impl<S: FrameScheduler> RenderLoop<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: None,
            frames: 0,
            failures: 0,
        }
    }

    pub fn start(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
            tracing::debug!("Render loop started");
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Handle a frame callback. Tokens other than the pending one are
    /// ignored. Returns whether `frame` ran.
    pub fn on_frame<F, E>(&mut self, token: FrameToken, frame: F) -> bool
    where
        F: FnOnce() -> std::result::Result<(), E>,
        E: Display,
    {
        if self.pending != Some(token) {
            tracing::trace!(?token, "Stale frame callback ignored");
            return false;
        }
        self.pending = None;

        if let Err(e) = frame() {
            self.failures += 1;
            tracing::warn!(error = %e, frame = self.frames, "Frame failed");
        }
        self.frames += 1;
        self.pending = Some(self.scheduler.request_frame());
        true
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
            tracing::debug!(frames = self.frames, "Render loop stopped");
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<S: FrameScheduler> Drop for RenderLoop<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
