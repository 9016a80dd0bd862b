use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use layercut_engine::error::{EngineError, Result};
use layercut_engine::handle::{HandleEvent, HandleFactory, MediaHandle};
use layercut_engine::render_loop::{FrameScheduler, FrameToken};
use layercut_engine::surface::FrameBuffer;

/// Observable state of one [`FakeHandle`].
#[derive(Debug, Clone)]
pub struct FakeState {
    pub source: String,
    pub time: f64,
    pub paused: bool,
    pub muted: bool,
    pub natural_size: Option<(u32, u32)>,
    /// Every seek target, in order.
    pub seeks: Vec<f64>,
    pub plays: usize,
    pub pauses: usize,
    events: VecDeque<HandleEvent>,
    auto_ready: bool,
}

/// Test-side view of a fake handle that a pool owns.
#[derive(Debug, Clone)]
pub struct FakeControl(Rc<RefCell<FakeState>>);

impl FakeControl {
    pub fn state(&self) -> FakeState {
        self.0.borrow().clone()
    }

    pub fn source(&self) -> String {
        self.0.borrow().source.clone()
    }

    pub fn time(&self) -> f64 {
        self.0.borrow().time
    }

    /// Move the playback position without recording a seek, as decoding
    /// drift would.
    pub fn set_time(&self, t: f64) {
        self.0.borrow_mut().time = t;
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.0.borrow().seeks.clone()
    }

    pub fn clear_seeks(&self) {
        self.0.borrow_mut().seeks.clear();
    }

    pub fn is_paused(&self) -> bool {
        self.0.borrow().paused
    }

    pub fn is_muted(&self) -> bool {
        self.0.borrow().muted
    }

    pub fn push_event(&self, event: HandleEvent) {
        self.0.borrow_mut().events.push_back(event);
    }

    /// Advance the position by `dt` if playing.
    pub fn advance(&self, dt: f64) {
        let mut state = self.0.borrow_mut();
        if !state.paused {
            state.time += dt;
        }
    }
}

/// An in-memory media handle. Every handle presents one solid frame.
pub struct FakeHandle {
    state: Rc<RefCell<FakeState>>,
    source: String,
    frame: FrameBuffer,
}

impl MediaHandle for FakeHandle {
    fn source(&self) -> &str {
        &self.source
    }

    fn set_source(&mut self, url: &str) {
        self.source = url.to_string();
        let mut state = self.state.borrow_mut();
        state.source = url.to_string();
        state.time = 0.0;
        state.events.push_back(HandleEvent::Buffering);
        if state.auto_ready {
            state.events.push_back(HandleEvent::Ready);
        }
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().time
    }

    fn seek(&mut self, source_time: f64) {
        let mut state = self.state.borrow_mut();
        state.time = source_time;
        state.seeks.push(source_time);
    }

    fn play(&mut self) {
        let mut state = self.state.borrow_mut();
        state.paused = false;
        state.plays += 1;
    }

    fn pause(&mut self) {
        let mut state = self.state.borrow_mut();
        state.paused = true;
        state.pauses += 1;
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.borrow_mut().muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn natural_size(&self) -> Option<(u32, u32)> {
        self.state.borrow().natural_size
    }

    fn current_frame(&self) -> Option<&FrameBuffer> {
        Some(&self.frame)
    }

    fn poll_event(&mut self) -> Option<HandleEvent> {
        self.state.borrow_mut().events.pop_front()
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    created: Vec<FakeControl>,
    failing: Vec<String>,
    manual_ready: bool,
    natural_size: Option<(u32, u32)>,
    color: Option<[u8; 4]>,
}

/// Creates [`FakeHandle`]s and keeps a [`FakeControl`] for each one.
///
/// Clones share state, so a test can keep one clone after handing another
/// to a pool.
#[derive(Debug, Clone, Default)]
pub struct FakeHandleFactory(Rc<RefCell<FactoryState>>);

impl FakeHandleFactory {
    /// Handles report ready as soon as they load a source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles wait for a test to push [`HandleEvent::Ready`].
    pub fn manual_ready(self) -> Self {
        self.0.borrow_mut().manual_ready = true;
        self
    }

    pub fn natural_size(self, width: u32, height: u32) -> Self {
        self.0.borrow_mut().natural_size = Some((width, height));
        self
    }

    pub fn color(self, rgba: [u8; 4]) -> Self {
        self.0.borrow_mut().color = Some(rgba);
        self
    }

    /// Fail every URL containing `needle`.
    pub fn fail_urls_containing(&self, needle: &str) {
        self.0.borrow_mut().failing.push(needle.to_string());
    }

    pub fn created_count(&self) -> usize {
        self.0.borrow().created.len()
    }

    pub fn handles(&self) -> Vec<FakeControl> {
        self.0.borrow().created.clone()
    }

    /// The most recently created handle whose source contains `needle`.
    pub fn handle_for(&self, needle: &str) -> Option<FakeControl> {
        self.0
            .borrow()
            .created
            .iter()
            .rev()
            .find(|c| c.source().contains(needle))
            .cloned()
    }
}

impl HandleFactory for FakeHandleFactory {
    fn create(&mut self, url: &str) -> Result<Box<dyn MediaHandle>> {
        let mut factory = self.0.borrow_mut();
        if factory.failing.iter().any(|needle| url.contains(needle)) {
            return Err(EngineError::MediaLoad {
                url: url.to_string(),
                reason: "unsupported media".to_string(),
            });
        }

        let mut events = VecDeque::new();
        if !factory.manual_ready {
            events.push_back(HandleEvent::Ready);
        }
        let state = Rc::new(RefCell::new(FakeState {
            source: url.to_string(),
            time: 0.0,
            paused: true,
            muted: false,
            natural_size: factory.natural_size,
            seeks: Vec::new(),
            plays: 0,
            pauses: 0,
            events,
            auto_ready: !factory.manual_ready,
        }));
        factory.created.push(FakeControl(state.clone()));

        let color = factory.color.unwrap_or([255, 255, 255, 255]);
        Ok(Box::new(FakeHandle {
            state,
            source: url.to_string(),
            frame: FrameBuffer::filled(2, 2, color),
        }))
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    next: u64,
    pending: Vec<FrameToken>,
    cancelled: Vec<FrameToken>,
}

/// A frame scheduler driven by the test. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler(Rc<RefCell<SchedulerState>>);

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<FrameToken> {
        self.0.borrow().pending.clone()
    }

    pub fn cancelled(&self) -> Vec<FrameToken> {
        self.0.borrow().cancelled.clone()
    }

    /// Remove and return the oldest pending callback, as the platform does
    /// when it fires it.
    pub fn fire_next(&self) -> Option<FrameToken> {
        let mut state = self.0.borrow_mut();
        if state.pending.is_empty() {
            None
        } else {
            Some(state.pending.remove(0))
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameToken {
        let mut state = self.0.borrow_mut();
        let token = FrameToken(state.next);
        state.next += 1;
        state.pending.push(token);
        token
    }

    fn cancel(&mut self, token: FrameToken) {
        let mut state = self.0.borrow_mut();
        state.pending.retain(|t| *t != token);
        state.cancelled.push(token);
    }
}
