use layercut_engine::handle::HandleEvent;
use layercut_engine::pool::HandleKey;
use layercut_engine::session::Command;
use layercut_engine::surface::FrameBuffer;
use layercut_test_harness::builders::{SessionBuilder, VideoClipBuilder};
use layercut_test_harness::fakes::FakeHandleFactory;

const GREEN: [u8; 4] = [0, 255, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

#[test]
fn test_overlay_hard_seek_past_tolerance() {
    let a = VideoClipBuilder::new("base").span(0.0, 10.0).build();
    let b = VideoClipBuilder::new("overlay")
        .layer(1)
        .span(2.0, 5.0)
        .source_start(0.0)
        .build();
    let b_id = b.id;
    let (mut session, factory) = SessionBuilder::new().with_clip(a).with_clip(b).build();
    let mut surface = FrameBuffer::new(8, 8);

    session.dispatch(Command::Seek(3.0)).unwrap();
    let overlay = factory.handle_for("overlay.mp4").unwrap();
    assert_eq!(overlay.seeks(), vec![1.0]);

    overlay.set_time(1.2);
    let report = session.frame(0.0, &mut surface);
    assert!(report.resynced.is_empty(), "0.2s drift is tolerated");
    assert_eq!(overlay.seeks().len(), 1);

    overlay.set_time(1.5);
    let report = session.frame(0.0, &mut surface);
    assert_eq!(report.resynced, vec![b_id]);
    assert_eq!(overlay.seeks(), vec![1.0, 1.0]);
    assert_eq!(overlay.time(), 1.0);
}

#[test]
fn test_overlay_mirrors_play_state() {
    let (mut session, factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .with_clip(VideoClipBuilder::new("overlay").layer(1).span(2.0, 5.0).build())
        .build();
    let mut surface = FrameBuffer::new(8, 8);

    session.dispatch(Command::Seek(3.0)).unwrap();
    session.dispatch(Command::Play).unwrap();
    session.frame(0.0, &mut surface);
    let overlay = factory.handle_for("overlay.mp4").unwrap();
    assert!(!overlay.is_paused());

    session.dispatch(Command::Pause).unwrap();
    session.frame(0.0, &mut surface);
    assert!(overlay.is_paused());
}

#[test]
fn test_keeps_previous_frame_until_a_handle_is_ready() {
    let factory = FakeHandleFactory::new().manual_ready();
    let (mut session, factory) = SessionBuilder::new()
        .factory(factory)
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();
    let mut surface = FrameBuffer::filled(4, 4, GREEN);

    session.dispatch(Command::Seek(1.0)).unwrap();
    let report = session.frame(0.0, &mut surface);
    assert!(!report.cleared);
    assert!(report.drawn.is_empty());
    assert_eq!(surface.pixel(0, 0), &GREEN);

    factory
        .handle_for("base.mp4")
        .unwrap()
        .push_event(HandleEvent::Ready);
    let report = session.frame(0.0, &mut surface);
    assert!(report.cleared);
    assert!(report.readiness_changed);
    assert_eq!(report.drawn.len(), 1);
}

#[test]
fn test_clears_when_nothing_is_active() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("late").span(5.0, 10.0).build())
        .build();
    let mut surface = FrameBuffer::filled(4, 4, GREEN);

    session.dispatch(Command::Seek(1.0)).unwrap();
    let report = session.frame(0.0, &mut surface);
    assert!(report.cleared);
    assert!(report.drawn.is_empty());
    assert_eq!(surface.pixel(2, 2), &BLACK);
}

#[test]
fn test_draws_bottom_layer_first() {
    let a = VideoClipBuilder::new("base").span(0.0, 10.0).build();
    let b = VideoClipBuilder::new("one").layer(1).span(0.0, 10.0).build();
    let c = VideoClipBuilder::new("two").layer(2).span(0.0, 10.0).build();
    let expected = vec![a.id, b.id, c.id];
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(c)
        .with_clip(a)
        .with_clip(b)
        .build();
    let mut surface = FrameBuffer::new(8, 8);

    session.dispatch(Command::Seek(3.0)).unwrap();
    let report = session.frame(0.0, &mut surface);
    assert_eq!(report.drawn, expected);
}

#[test]
fn test_latest_base_clip_wins_overlap() {
    let (mut session, _factory) = SessionBuilder::new().build();
    session
        .dispatch(Command::AddClip(
            VideoClipBuilder::new("first").span(0.0, 10.0).build(),
        ))
        .unwrap();
    let later = VideoClipBuilder::new("second").span(2.0, 6.0).build();
    let later_id = later.id;
    session.dispatch(Command::AddClip(later)).unwrap();
    let mut surface = FrameBuffer::new(8, 8);

    session.dispatch(Command::Seek(3.0)).unwrap();
    let report = session.frame(0.0, &mut surface);
    assert_eq!(report.drawn, vec![later_id]);
}

#[test]
fn test_failed_overlay_is_skipped() {
    let broken = VideoClipBuilder::new("broken").layer(1).span(0.0, 10.0).build();
    let broken_id = broken.id;
    let (mut session, factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .with_clip(broken)
        .build();
    factory.fail_urls_containing("broken");
    let mut surface = FrameBuffer::new(8, 8);

    session.dispatch(Command::Seek(1.0)).unwrap();
    let report = session.frame(0.0, &mut surface);
    assert_eq!(report.drawn.len(), 1);
    assert!(!report.drawn.contains(&broken_id));
    assert!(session.pool().failure(HandleKey::Overlay(broken_id)).is_some());
}

#[test]
fn test_base_letterboxed_with_native_ratio() {
    let factory = FakeHandleFactory::new().natural_size(4, 2).color(RED);
    let (mut session, _factory) = SessionBuilder::new()
        .factory(factory)
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();
    let mut surface = FrameBuffer::filled(4, 4, GREEN);

    session.dispatch(Command::Seek(1.0)).unwrap();
    session.frame(0.0, &mut surface);

    assert_eq!(surface.pixel(0, 0), &BLACK);
    assert_eq!(surface.pixel(0, 1), &RED);
    assert_eq!(surface.pixel(3, 2), &RED);
    assert_eq!(surface.pixel(3, 3), &BLACK);
}

#[test]
fn test_overlay_uses_stored_ratio_and_transform() {
    let factory = FakeHandleFactory::new().color(RED);
    let (mut session, _factory) = SessionBuilder::new()
        .factory(factory)
        .with_clip(
            VideoClipBuilder::new("sticker")
                .layer(1)
                .span(0.0, 10.0)
                .ratio(1.0)
                .transform(25.0, 25.0, 0.5)
                .build(),
        )
        .build();
    let mut surface = FrameBuffer::new(8, 8);

    session.dispatch(Command::Seek(1.0)).unwrap();
    session.frame(0.0, &mut surface);

    // An 8x8 contain box halved and centered at (2, 2).
    assert_eq!(surface.pixel(0, 0), &RED);
    assert_eq!(surface.pixel(3, 3), &RED);
    assert_eq!(surface.pixel(4, 4), &BLACK);
}
