use std::collections::HashSet;

use layercut_core::source::MediaSource;
use layercut_engine::handle::HandleEvent;
use layercut_engine::pool::{HandleKey, MediaPool};
use layercut_test_harness::fakes::FakeHandleFactory;
use uuid::Uuid;

const PROXY: &str = "/api/proxy-video";

fn remote(url: &str) -> MediaSource {
    MediaSource::Remote(url.into())
}

#[test]
fn test_handles_created_lazily_and_proxied() {
    let factory = FakeHandleFactory::new();
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);
    assert!(pool.is_empty());

    assert!(pool.ensure(HandleKey::Base, &remote("https://cdn.test/a.mp4")).is_some());
    assert_eq!(factory.created_count(), 1);
    assert!(factory.handles()[0].source().starts_with("/api/proxy-video?url="));

    pool.ensure(HandleKey::Base, &remote("https://cdn.test/a.mp4"));
    assert_eq!(factory.created_count(), 1);
}

#[test]
fn test_resigned_url_does_not_switch_source() {
    let factory = FakeHandleFactory::new();
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);

    pool.ensure(HandleKey::Base, &remote("https://cdn.test/a.mp4?token=1"));
    pool.pump_events();
    assert!(pool.is_ready(HandleKey::Base));

    pool.ensure(HandleKey::Base, &remote("https://cdn.test/a.mp4?token=2"));
    let base = factory.handles()[0].clone();
    assert!(base.source().contains("token%3D1"));
    assert!(pool.is_ready(HandleKey::Base));

    pool.ensure(HandleKey::Base, &remote("https://cdn.test/b.mp4"));
    assert!(base.source().contains("b.mp4"));
    assert!(!pool.is_ready(HandleKey::Base), "switching source drops readiness");
    pool.pump_events();
    assert!(pool.is_ready(HandleKey::Base));
}

#[test]
fn test_readiness_tracks_events() {
    let factory = FakeHandleFactory::new().manual_ready();
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);
    let key = HandleKey::Overlay(Uuid::new_v4());

    pool.ensure(key, &remote("https://cdn.test/o.mp4"));
    pool.pump_events();
    assert!(!pool.is_ready(key));
    assert!(!pool.take_readiness_changed());

    let control = factory.handles()[0].clone();
    control.push_event(HandleEvent::Ready);
    pool.pump_events();
    assert!(pool.is_ready(key));
    assert!(pool.take_readiness_changed());
    assert!(!pool.take_readiness_changed());

    control.push_event(HandleEvent::Buffering);
    pool.pump_events();
    assert!(!pool.is_ready(key));
    assert!(pool.take_readiness_changed());
}

#[test]
fn test_load_failure_recorded_and_not_retried() {
    let factory = FakeHandleFactory::new();
    factory.fail_urls_containing("broken");
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);

    assert!(pool.ensure(HandleKey::Base, &remote("https://cdn.test/broken.mp4")).is_none());
    assert!(pool.failure(HandleKey::Base).is_some());
    assert!(pool.ensure(HandleKey::Base, &remote("https://cdn.test/broken.mp4")).is_none());

    // A different source clears the failure.
    assert!(pool.ensure(HandleKey::Base, &remote("https://cdn.test/fine.mp4")).is_some());
    assert!(pool.failure(HandleKey::Base).is_none());
}

#[test]
fn test_failed_event_marks_handle() {
    let factory = FakeHandleFactory::new();
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);

    pool.ensure(HandleKey::Audio, &remote("https://cdn.test/v.mp4"));
    pool.pump_events();
    factory.handles()[0].push_event(HandleEvent::Failed("decode error".into()));
    pool.pump_events();

    assert!(!pool.is_ready(HandleKey::Audio));
    assert_eq!(pool.failure(HandleKey::Audio), Some("decode error"));
}

#[test]
fn test_retain_overlays_releases_stale_handles() {
    let factory = FakeHandleFactory::new();
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);
    let keep = Uuid::new_v4();
    let gone = Uuid::new_v4();

    pool.ensure(HandleKey::Base, &remote("https://cdn.test/a.mp4"));
    pool.ensure(HandleKey::Overlay(keep), &remote("https://cdn.test/k.mp4"));
    pool.ensure(HandleKey::Overlay(gone), &remote("https://cdn.test/g.mp4"));
    assert_eq!(pool.len(), 3);

    pool.retain_overlays(&HashSet::from([keep]));
    assert_eq!(pool.len(), 2);
    assert!(pool.get(HandleKey::Overlay(gone)).is_none());
    assert!(pool.get(HandleKey::Overlay(keep)).is_some());
    assert!(pool.get(HandleKey::Base).is_some());
}

#[test]
fn test_pause_all() {
    let factory = FakeHandleFactory::new();
    let mut pool = MediaPool::new(Box::new(factory.clone()), PROXY);
    pool.ensure(HandleKey::Base, &remote("https://cdn.test/a.mp4"))
        .unwrap()
        .play();
    assert!(!factory.handles()[0].is_paused());

    pool.pause_all();
    assert!(factory.handles()[0].is_paused());
}
