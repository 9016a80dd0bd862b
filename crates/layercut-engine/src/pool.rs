use std::collections::{HashMap, HashSet};

use layercut_core::source::{MediaSource, is_same_source};
use uuid::Uuid;

use crate::handle::{HandleEvent, HandleFactory, MediaHandle};

/// Which handle a clip plays through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKey {
    /// The single handle shared by every layer-0 clip.
    Base,
    /// The dedicated handle for separated audio clips.
    Audio,
    /// One handle per overlay clip.
    Overlay(Uuid),
}

#[derive(Debug, Clone)]
struct LoadFailure {
    url: String,
    reason: String,
}

/// Lazily creates media handles and tracks which ones can present a frame.
///
/// Readiness is driven only by handle events drained in
/// [`MediaPool::pump_events`], never inferred from handle state.
pub struct MediaPool {
    factory: Box<dyn HandleFactory>,
    handles: HashMap<HandleKey, Box<dyn MediaHandle>>,
    ready: HashSet<HandleKey>,
    failures: HashMap<HandleKey, LoadFailure>,
    proxy_endpoint: String,
    readiness_changed: bool,
}

impl MediaPool {
    pub fn new(factory: Box<dyn HandleFactory>, proxy_endpoint: impl Into<String>) -> Self {
        Self {
            factory,
            handles: HashMap::new(),
            ready: HashSet::new(),
            failures: HashMap::new(),
            proxy_endpoint: proxy_endpoint.into(),
            readiness_changed: false,
        }
    }

    pub fn proxy_endpoint(&self) -> &str {
        &self.proxy_endpoint
    }

    /// The handle for `key`, created or switched to `source` as needed.
    /// Returns `None` when the source failed to load.
    pub fn ensure(&mut self, key: HandleKey, source: &MediaSource) -> Option<&mut dyn MediaHandle> {
        let url = source.playable_url(&self.proxy_endpoint);

        if let Some(failure) = self.failures.get(&key) {
            if failure.url == url {
                return None;
            }
            self.failures.remove(&key);
        }

        match self.handles.get_mut(&key) {
            Some(handle) => {
                if !is_same_source(handle.source(), &url, &self.proxy_endpoint) {
                    tracing::debug!(?key, url = %url, "Switching handle source");
                    handle.set_source(&url);
                    if self.ready.remove(&key) {
                        self.readiness_changed = true;
                    }
                }
            }
            None => match self.factory.create(&url) {
                Ok(handle) => {
                    tracing::debug!(?key, url = %url, "Created media handle");
                    self.handles.insert(key, handle);
                }
                Err(e) => {
                    tracing::warn!(?key, url = %url, error = %e, "Media load failed");
                    self.failures.insert(
                        key,
                        LoadFailure {
                            url,
                            reason: e.to_string(),
                        },
                    );
                    return None;
                }
            },
        }
        match self.handles.get_mut(&key) {
            Some(handle) => Some(handle.as_mut()),
            None => None,
        }
    }

    pub fn get(&self, key: HandleKey) -> Option<&dyn MediaHandle> {
        self.handles.get(&key).map(|h| h.as_ref())
    }

    pub fn get_mut(&mut self, key: HandleKey) -> Option<&mut dyn MediaHandle> {
        match self.handles.get_mut(&key) {
            Some(handle) => Some(handle.as_mut()),
            None => None,
        }
    }

    pub fn is_ready(&self, key: HandleKey) -> bool {
        self.ready.contains(&key)
    }

    pub fn failure(&self, key: HandleKey) -> Option<&str> {
        self.failures.get(&key).map(|f| f.reason.as_str())
    }

    /// Drain every handle's pending events and update readiness.
    pub fn pump_events(&mut self) {
        for (key, handle) in self.handles.iter_mut() {
            while let Some(event) = handle.poll_event() {
                match event {
                    HandleEvent::Ready => {
                        self.readiness_changed |= self.ready.insert(*key);
                    }
                    HandleEvent::Buffering => {
                        self.readiness_changed |= self.ready.remove(key);
                    }
                    HandleEvent::Failed(reason) => {
                        tracing::warn!(?key, reason = %reason, "Media handle failed");
                        self.readiness_changed |= self.ready.remove(key);
                        self.failures.insert(
                            *key,
                            LoadFailure {
                                url: handle.source().to_string(),
                                reason,
                            },
                        );
                    }
                    HandleEvent::Ended => {}
                }
            }
        }
    }

    /// Whether readiness changed since the last call.
    pub fn take_readiness_changed(&mut self) -> bool {
        std::mem::take(&mut self.readiness_changed)
    }

    /// Pause every handle without touching readiness.
    pub fn pause_all(&mut self) {
        for handle in self.handles.values_mut() {
            if !handle.is_paused() {
                handle.pause();
            }
        }
    }

    /// Drop overlay handles whose clip is gone.
    pub fn retain_overlays(&mut self, live: &HashSet<Uuid>) {
        let stale: Vec<HandleKey> = self
            .handles
            .keys()
            .filter(|k| matches!(k, HandleKey::Overlay(id) if !live.contains(id)))
            .copied()
            .collect();
        for key in stale {
            tracing::debug!(?key, "Releasing overlay handle");
            self.handles.remove(&key);
            self.ready.remove(&key);
            self.failures.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
        self.ready.clear();
        self.failures.clear();
        self.readiness_changed = true;
    }
}
