use std::time::{Duration, Instant};

use layercut_core::clip::TrackFlags;
use layercut_core::error::CoreError;
use layercut_core::export::{CompositionRequest, ExportCollaborator};
use layercut_core::persistence::{MemoryStore, SessionSnapshot, SnapshotStore, save_snapshot};
use layercut_core::source::{AssetDescriptor, MediaSource, SignedUrlProvider};
use layercut_core::store::Placement;
use layercut_core::subtitle::Subtitle;
use layercut_engine::error::EngineError;
use layercut_engine::keyboard::{FocusContext, KeyEvent};
use layercut_engine::session::{Command, InitState, MediaDrop, Outcome};
use layercut_test_harness::assertions::{assert_approx, assert_clip_invariants};
use layercut_test_harness::builders::{SessionBuilder, VideoClipBuilder, media_url};
use layercut_test_harness::fixtures::{temp_file_store, write_session_file};
use uuid::Uuid;

fn clip_ids(session: &layercut_engine::session::EditorSession) -> Vec<Uuid> {
    session.store().clips().iter().map(|c| c.id).collect()
}

#[test]
fn test_undo_redo_through_dispatch() {
    let (mut session, _factory) = SessionBuilder::new().build();
    let a = VideoClipBuilder::new("a").span(0.0, 5.0).build();
    let b = VideoClipBuilder::new("b").span(5.0, 8.0).build();
    let (a_id, b_id) = (a.id, b.id);

    session.dispatch(Command::AddClip(a)).unwrap();
    session.dispatch(Command::AddClip(b)).unwrap();
    assert_eq!(session.history().len(), 3);

    assert_eq!(session.dispatch(Command::Undo).unwrap(), Outcome::Applied);
    assert_eq!(clip_ids(&session), vec![a_id]);
    assert!(!session.history().is_restoring());
    assert_eq!(session.history().len(), 3, "restoring must not push");

    assert_eq!(session.dispatch(Command::Redo).unwrap(), Outcome::Applied);
    assert_eq!(clip_ids(&session), vec![a_id, b_id]);
}

#[test]
fn test_undo_at_start_is_noop() {
    let (mut session, _factory) = SessionBuilder::new().build();
    assert_eq!(session.dispatch(Command::Undo).unwrap(), Outcome::Noop);
    assert_eq!(session.dispatch(Command::Redo).unwrap(), Outcome::Noop);
}

#[test]
fn test_rejected_edit_leaves_history_alone() {
    let clip = VideoClipBuilder::new("a").span(0.0, 5.0).locked().build();
    let id = clip.id;
    let (mut session, _factory) = SessionBuilder::new().with_clip(clip).build();

    let err = session.dispatch(Command::RemoveClip(id)).unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::ClipLocked(got)) if got == id));
    assert_eq!(session.store().clips().len(), 1);
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_base_mute_follows_audio_separation() {
    let (mut session, factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();
    session.dispatch(Command::Seek(1.0)).unwrap();
    let base = factory.handle_for("base.mp4").unwrap();
    assert!(!base.is_muted());

    session.dispatch(Command::SeparateAllAudio).unwrap();
    assert!(base.is_muted());
    assert_eq!(session.store().audio_clips().len(), 1);
    assert_clip_invariants(session.store());

    session.dispatch(Command::RelinkAllAudio).unwrap();
    assert!(!base.is_muted());
    assert!(session.store().audio_clips().is_empty());
}

#[test]
fn test_repeated_separation_is_noop() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();

    session.dispatch(Command::SeparateAllAudio).unwrap();
    let history_len = session.history().len();
    let audio_id = session.store().audio_clips()[0].id;

    let outcome = session.dispatch(Command::SeparateAllAudio).unwrap();
    assert_eq!(outcome, Outcome::Noop);
    assert_eq!(session.history().len(), history_len);
    assert_eq!(session.store().audio_clips().len(), 1);
    assert_eq!(
        session.store().clips()[0].audio_clip_id,
        Some(audio_id),
        "video clip must still point at its audio clip"
    );
}

#[test]
fn test_non_finite_trim_leaves_session_intact() {
    let clip = VideoClipBuilder::new("base").span(0.0, 10.0).build();
    let id = clip.id;
    let (mut session, _factory) = SessionBuilder::new().with_clip(clip).build();
    let history_len = session.history().len();

    let result = session.dispatch(Command::TrimEnd { id, end: f64::NAN });
    assert!(matches!(
        result,
        Err(EngineError::Core(CoreError::InvalidClipInterval { .. }))
    ));
    assert_eq!(session.history().len(), history_len);
    assert_eq!(session.clock().duration(), 10.0);
    assert_clip_invariants(session.store());
}

#[test]
fn test_muted_base_track_mutes_handle() {
    let (mut session, factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();
    session.dispatch(Command::Seek(1.0)).unwrap();

    session
        .dispatch(Command::SetLayerFlags {
            layer: 0,
            flags: TrackFlags {
                muted: true,
                ..TrackFlags::default()
            },
        })
        .unwrap();
    assert!(factory.handle_for("base.mp4").unwrap().is_muted());
}

#[test]
fn test_duration_only_grows() {
    let clip = VideoClipBuilder::new("a").span(0.0, 5.0).build();
    let id = clip.id;
    let (mut session, _factory) = SessionBuilder::new().with_clip(clip).build();
    assert_eq!(session.clock().duration(), 5.0);

    session
        .dispatch(Command::MoveClip {
            id,
            start: 20.0,
            layer: 0,
        })
        .unwrap();
    assert_eq!(session.clock().duration(), 25.0);

    session
        .dispatch(Command::MoveClip {
            id,
            start: 0.0,
            layer: 0,
        })
        .unwrap();
    assert_eq!(session.clock().duration(), 25.0);
}

#[test]
fn test_metadata_initializes_clips_once() {
    let (mut session, _factory) = SessionBuilder::new().build();
    let now = Instant::now();
    assert_eq!(session.init_state(), InitState::Empty);

    session.replace_primary_media(MediaSource::Remote(media_url("main")), now);
    let id = session.on_metadata(30.0, Some(16.0 / 9.0), now).unwrap();
    let id = id.expect("first metadata creates the base clip");
    assert_eq!(session.init_state(), InitState::ClipsInitialized);

    let clip = session.store().clip(id).unwrap();
    assert!(clip.is_base());
    assert_eq!((clip.start(), clip.end()), (0.0, 30.0));
    assert_eq!(clip.source_duration, Some(30.0));
    assert_eq!(session.clock().duration(), 30.0);

    assert_eq!(session.on_metadata(30.0, None, now).unwrap(), None);
    assert_eq!(session.store().clips().len(), 1);
}

#[test]
fn test_metadata_without_media_waits() {
    let (mut session, _factory) = SessionBuilder::new().build();
    let now = Instant::now();
    assert_eq!(session.on_metadata(12.0, None, now).unwrap(), None);
    assert_eq!(session.init_state(), InitState::MetadataLoaded);
    assert!(session.on_metadata(f64::NAN, None, now).is_err());
}

#[test]
fn test_restored_session_skips_initialization() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("a").span(0.0, 5.0).build())
        .build();
    assert_eq!(session.init_state(), InitState::ClipsInitialized);
    assert_eq!(session.on_metadata(60.0, None, Instant::now()).unwrap(), None);
    assert_eq!(session.store().clips().len(), 1);
}

#[test]
fn test_replace_primary_media_resets() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("a").span(0.0, 5.0).build())
        .build();
    session.dispatch(Command::Seek(3.0)).unwrap();

    session.replace_primary_media(MediaSource::Remote(media_url("fresh")), Instant::now());
    assert!(session.store().is_empty());
    assert_eq!(session.clock().current_time(), 0.0);
    assert_eq!(session.clock().duration(), 0.0);
    assert_eq!(session.init_state(), InitState::Empty);
    assert!(session.pool().is_empty());
}

#[test]
fn test_autosave_debounces_and_restores() {
    let (mut session, _factory) = SessionBuilder::new().build();
    let mut backend = MemoryStore::new();
    let t0 = Instant::now();

    session
        .dispatch_at(
            Command::AddClip(VideoClipBuilder::new("a").span(0.0, 5.0).build()),
            t0,
        )
        .unwrap();
    assert!(!session.poll_autosave(t0 + Duration::from_millis(500), &mut backend));
    assert!(session.poll_autosave(t0 + Duration::from_millis(1000), &mut backend));
    assert!(backend.get("layercut-session").unwrap().is_some());
    assert!(!session.has_unsaved_changes());

    let (mut restored, _factory) = SessionBuilder::new().build();
    assert!(restored.load_persisted(&mut backend));
    assert_eq!(restored.store().clips(), session.store().clips());
}

#[test]
fn test_autosave_skips_empty_session() {
    let (mut session, _factory) = SessionBuilder::new().build();
    let mut backend = MemoryStore::new();
    let t0 = Instant::now();

    session
        .dispatch_at(Command::SetScriptText("draft".into()), t0)
        .unwrap();
    assert!(!session.poll_autosave(t0 + Duration::from_secs(2), &mut backend));
    assert!(backend.get("layercut-session").unwrap().is_none());
}

#[test]
fn test_handoff_wins_and_is_consumed() {
    let mut backend = MemoryStore::new();
    let handoff = SessionSnapshot {
        video_clips: vec![
            VideoClipBuilder::new("a").span(0.0, 5.0).build(),
            VideoClipBuilder::new("b").span(5.0, 12.0).build(),
        ],
        ..SessionSnapshot::default()
    };
    let saved = SessionSnapshot {
        video_clips: vec![VideoClipBuilder::new("old").span(0.0, 3.0).build()],
        ..SessionSnapshot::default()
    };
    save_snapshot(&mut backend, "layercut-handoff", &handoff).unwrap();
    save_snapshot(&mut backend, "layercut-session", &saved).unwrap();

    let (mut session, _factory) = SessionBuilder::new().build();
    assert!(session.load_persisted(&mut backend));
    assert_eq!(session.store().clips().len(), 2);
    assert_eq!(session.clock().duration(), 12.0);
    assert!(backend.get("layercut-handoff").unwrap().is_none());
}

#[test]
fn test_blob_media_not_restored() {
    let mut backend = MemoryStore::new();
    let snapshot = SessionSnapshot {
        video_clips: vec![VideoClipBuilder::new("a").span(0.0, 5.0).build()],
        primary_media: Some(MediaSource::LocalBlob("blob:http://localhost/1".into())),
        ..SessionSnapshot::default()
    };
    save_snapshot(&mut backend, "layercut-session", &snapshot).unwrap();

    let (mut session, _factory) = SessionBuilder::new().build();
    assert!(session.load_persisted(&mut backend));
    assert!(session.primary_media().is_none());
    assert_eq!(session.store().clips().len(), 1);
}

#[test]
fn test_autosave_survives_on_disk() {
    let (_dir, mut backend) = temp_file_store();
    let (mut session, _factory) = SessionBuilder::new().build();
    let t0 = Instant::now();

    session
        .dispatch_at(
            Command::AddClip(VideoClipBuilder::new("a").span(0.0, 4.0).build()),
            t0,
        )
        .unwrap();
    assert!(session.poll_autosave(t0 + Duration::from_secs(1), &mut backend));
    assert!(backend.dir().join("layercut-session.json").exists());

    let (mut restored, _factory) = SessionBuilder::new().build();
    assert!(restored.load_persisted(&mut backend));
    assert_eq!(restored.store().clips(), session.store().clips());
}

#[test]
fn test_handoff_file_loads_from_disk() {
    let (dir, mut backend) = temp_file_store();
    let snapshot = SessionSnapshot {
        video_clips: vec![VideoClipBuilder::new("a").span(0.0, 7.0).build()],
        ..SessionSnapshot::default()
    };
    let path = write_session_file(dir.path(), "layercut-handoff", &snapshot);

    let (mut session, _factory) = SessionBuilder::new().build();
    assert!(session.load_persisted(&mut backend));
    assert_eq!(session.clock().duration(), 7.0);
    assert!(!path.exists(), "handoff file is consumed");
}

#[test]
fn test_corrupt_save_is_ignored() {
    let mut backend = MemoryStore::new();
    backend.put("layercut-session", "{not json").unwrap();

    let (mut session, _factory) = SessionBuilder::new().build();
    assert!(!session.load_persisted(&mut backend));
    assert!(session.store().is_empty());
}

#[test]
fn test_drop_without_position_uses_new_layer() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();

    let drop = MediaDrop {
        duration: Some(4.0),
        ..MediaDrop::new(MediaSource::Remote(media_url("x")))
    };
    let Outcome::ClipAdded(id) = session.dispatch(Command::DropMedia(drop)).unwrap() else {
        panic!("expected a new clip");
    };
    let clip = session.store().clip(id).unwrap();
    assert_eq!(clip.layer, 1);
    assert_eq!((clip.start(), clip.end()), (0.0, 4.0));
    assert_eq!(clip.source_duration, Some(4.0));

    let drop = MediaDrop::new(MediaSource::Remote(media_url("y")));
    let Outcome::ClipAdded(id) = session.dispatch(Command::DropMedia(drop)).unwrap() else {
        panic!("expected a new clip");
    };
    let clip = session.store().clip(id).unwrap();
    assert_eq!(clip.layer, 2);
    assert_eq!(clip.duration(), 10.0, "unknown duration falls back");
    assert_eq!(clip.source_duration, None);
}

#[test]
fn test_drop_onto_layer_snaps_to_end() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("o").layer(1).span(2.0, 6.0).build())
        .build();

    let drop = MediaDrop {
        placement: Some(Placement::Append { layer: 1 }),
        duration: Some(4.0),
        ..MediaDrop::new(MediaSource::Remote(media_url("x")))
    };
    let Outcome::ClipAdded(id) = session.dispatch(Command::DropMedia(drop)).unwrap() else {
        panic!("expected a new clip");
    };
    let clip = session.store().clip(id).unwrap();
    assert_eq!((clip.layer, clip.start(), clip.end()), (1, 6.0, 10.0));
}

#[test]
fn test_drop_at_time_finds_free_layer() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .with_clip(VideoClipBuilder::new("o").layer(1).span(0.0, 10.0).build())
        .build();

    let drop = MediaDrop {
        placement: Some(Placement::At(3.0)),
        duration: Some(2.0),
        ..MediaDrop::new(MediaSource::Remote(media_url("x")))
    };
    let Outcome::ClipAdded(id) = session.dispatch(Command::DropMedia(drop)).unwrap() else {
        panic!("expected a new clip");
    };
    let clip = session.store().clip(id).unwrap();
    assert_eq!((clip.layer, clip.start(), clip.end()), (2, 3.0, 5.0));
}

struct Signer;

impl SignedUrlProvider for Signer {
    fn signed_url(&self, storage_path: &str) -> Result<Option<String>, String> {
        Ok(Some(format!("https://signed.test/{storage_path}?token=t")))
    }
}

#[test]
fn test_drop_storage_asset() {
    let (mut session, _factory) = SessionBuilder::new().build();
    let asset = AssetDescriptor {
        id: "asset-1".into(),
        url: "https://store.test/object/videos/u/clip.mp4".into(),
        platform: Some("storage".into()),
    };

    let outcome = session
        .drop_asset(&asset, &Signer, None, Some(3.0), Some(9.0 / 16.0))
        .unwrap();
    let Outcome::ClipAdded(id) = outcome else {
        panic!("expected a new clip");
    };
    let clip = session.store().clip(id).unwrap();
    assert_eq!(
        clip.source,
        MediaSource::Remote("https://signed.test/u/clip.mp4?token=t".into())
    );
    assert_eq!(clip.asset_id.as_deref(), Some("asset-1"));
    assert_eq!(clip.aspect_ratio, Some(9.0 / 16.0));
    assert_eq!(clip.layer, 0);
}

#[test]
fn test_ripple_trim_at_playhead() {
    let a = VideoClipBuilder::new("a").span(0.0, 10.0).build();
    let b = VideoClipBuilder::new("b").span(10.0, 15.0).build();
    let (a_id, b_id) = (a.id, b.id);
    let (mut session, _factory) = SessionBuilder::new().with_clip(a).with_clip(b).build();

    session.dispatch(Command::Seek(4.0)).unwrap();
    assert_eq!(
        session.dispatch(Command::RippleTrimLeft(a_id)).unwrap(),
        Outcome::Applied
    );

    let a = session.store().clip(a_id).unwrap();
    assert_eq!((a.start(), a.end()), (0.0, 6.0));
    assert_eq!(a.source_range.start, 4.0);
    let b = session.store().clip(b_id).unwrap();
    assert_eq!((b.start(), b.end()), (6.0, 11.0));

    // Playhead no longer inside b.
    assert_eq!(
        session.dispatch(Command::RippleTrimRight(b_id)).unwrap(),
        Outcome::Noop
    );
}

#[test]
fn test_split_then_undo() {
    let clip = VideoClipBuilder::new("a").span(0.0, 10.0).build();
    let id = clip.id;
    let (mut session, _factory) = SessionBuilder::new().with_clip(clip).build();

    let Outcome::ClipSplit { left, right } = session
        .dispatch(Command::SplitClip { id, at: 4.0 })
        .unwrap()
    else {
        panic!("expected a split");
    };
    assert_approx(session.store().clip(left).unwrap().source_range.end, 4.0, 1e-9);
    assert_approx(session.store().clip(right).unwrap().source_range.start, 4.0, 1e-9);

    session.dispatch(Command::Undo).unwrap();
    assert_eq!(clip_ids(&session), vec![id]);
}

#[test]
fn test_keyboard_undo_suppressed_in_text_field() {
    let (mut session, _factory) = SessionBuilder::new().build();
    session
        .dispatch(Command::AddClip(VideoClipBuilder::new("a").build()))
        .unwrap();

    let undo = KeyEvent::new("z").ctrl();
    let editing = FocusContext { text_field: true };
    assert_eq!(session.handle_key(&undo, editing).unwrap(), Outcome::Noop);
    assert_eq!(session.store().clips().len(), 1);

    assert_eq!(
        session.handle_key(&undo, FocusContext::default()).unwrap(),
        Outcome::Applied
    );
    assert!(session.store().clips().is_empty());

    let redo = KeyEvent::new("Z").meta().shift();
    session.handle_key(&redo, FocusContext::default()).unwrap();
    assert_eq!(session.store().clips().len(), 1);
}

#[derive(Default)]
struct RecordingExport {
    requests: Vec<CompositionRequest>,
}

impl ExportCollaborator for RecordingExport {
    fn submit(&mut self, request: &CompositionRequest) -> Result<(), String> {
        self.requests.push(request.clone());
        Ok(())
    }
}

struct RejectingExport;

impl ExportCollaborator for RejectingExport {
    fn submit(&mut self, _request: &CompositionRequest) -> Result<(), String> {
        Err("render service unavailable".into())
    }
}

#[test]
fn test_export_hands_over_clips_and_effective_subtitles() {
    let (mut session, _factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("a").span(0.0, 5.0).build())
        .build();
    let keep = Subtitle::new(0.0, 1.0, "keep");
    let cut = Subtitle::new(1.0, 2.0, "cut");
    let cut_id = cut.id;
    session
        .dispatch(Command::SetSubtitles(vec![cut, keep.clone()]))
        .unwrap();
    session
        .dispatch(Command::ToggleSubtitleExcluded(cut_id))
        .unwrap();

    let mut export = RecordingExport::default();
    session.export(&mut export).unwrap();
    let request = &export.requests[0];
    assert_eq!(request.clips.len(), 1);
    assert_eq!(request.subtitles, vec![keep]);
    assert_eq!((request.canvas.width, request.canvas.height), (1080, 1920));

    assert!(matches!(
        session.export(&mut RejectingExport),
        Err(EngineError::Export(_))
    ));
}

#[test]
fn test_close_stops_media() {
    let (mut session, factory) = SessionBuilder::new()
        .with_clip(VideoClipBuilder::new("base").span(0.0, 10.0).build())
        .build();
    session.dispatch(Command::Play).unwrap();
    let base = factory.handle_for("base.mp4").unwrap();
    assert!(!base.is_paused());

    session.close();
    assert!(base.is_paused());
    assert!(session.pool().is_empty());
}
