mod common;

use std::sync::Arc;

use codereel::{
    BufferHost, BufferUri, CaptureError, CapturePhase, EditorStatus, FrameKind, MemoryBuffers,
    PlaybackOutcome, PlaybackReport, RecordingSink, ReelError, Session, SessionParts,
};
use common::{ms, preview_target, CountingSource, FakeCapture, Fixture, KeptDownloads, StalledBuffers};
use reelconf::BootstrapConfig;
use reelstore::{MemoryStore, Namespace};
use tokio::time::Instant;

fn finished(outcome: PlaybackOutcome) -> PlaybackReport {
    match outcome {
        PlaybackOutcome::Finished(report) => report,
        PlaybackOutcome::Busy => panic!("expected playback to run"),
    }
}

async fn two_slides(f: &Fixture) {
    let tm = f.session.timeline();
    let a = tm.add().await.unwrap();
    let b = tm.add().await.unwrap();
    tm.write_text(&a, "let a = 1;").await.unwrap();
    tm.write_text(&b, "let a = 1;\nlet b = 2;").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn steps_follow_interval_with_trailing_linger() {
    let f = Fixture::new();
    two_slides(&f).await;
    let options = f.session.playback_options().with_interval(ms(100));

    let report = finished(f.session.player().play(&options, None).await);

    assert!(report.completed());
    assert_eq!(report.frames_shown, 2);
    assert!(report.elapsed >= ms(200));

    let frames = f.display.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].kind, FrameKind::Show("let a = 1;".into()));
    assert_eq!(frames[1].kind, FrameKind::Show("let a = 1;\nlet b = 2;".into()));
    assert_eq!(frames[2].kind, FrameKind::Clear);
    assert!(frames[1].at - frames[0].at >= ms(100));
    assert!(frames[2].at - frames[1].at >= ms(100));
}

#[tokio::test(start_paused = true)]
async fn first_frame_waits_for_settle_delay() {
    let f = Fixture::new();
    two_slides(&f).await;
    let options = f
        .session
        .playback_options()
        .with_interval(ms(100))
        .with_settle_delay(ms(250));

    let started = Instant::now();
    let report = finished(f.session.player().play(&options, None).await);

    assert!(report.completed());
    assert!(report.elapsed >= ms(450));
    let frames = f.display.frames();
    assert!(frames[0].at - started >= ms(250));
}

#[tokio::test(start_paused = true)]
async fn settle_delay_runs_after_capture_starts() {
    let f = Fixture::new();
    two_slides(&f).await;
    let host = Arc::new(FakeCapture::default());
    let downloads = Arc::new(KeptDownloads::default());
    let capture = f
        .session
        .capture_session(host.clone(), downloads, preview_target());
    let options = f
        .session
        .playback_options()
        .with_interval(ms(100))
        .with_settle_delay(ms(250));

    let started = Instant::now();
    let report = finished(f.session.player().play(&options, Some(capture)).await);
    assert!(report.completed());

    let began = host.began_at().expect("recording began");
    let frames = f.display.frames();
    assert!(began >= started);
    assert!(frames[0].at - began >= ms(250));
}

#[tokio::test(start_paused = true)]
async fn second_trigger_while_running_is_ignored() {
    let f = Fixture::new();
    two_slides(&f).await;
    let options = f.session.playback_options().with_interval(ms(100));
    let player = f.session.player();

    let (first, second) = tokio::join!(player.play(&options, None), player.play(&options, None));

    assert!(matches!(second, PlaybackOutcome::Busy));
    assert!(finished(first).completed());
    assert_eq!(f.display.shown().len(), 2);
    assert!(!player.is_playing());

    // The latch reopens once the run is over
    let again = finished(player.play(&options, None).await);
    assert_eq!(again.frames_shown, 2);
}

#[tokio::test(start_paused = true)]
async fn missing_buffer_aborts_through_end_phase() {
    let f = Fixture::new();
    two_slides(&f).await;
    let last = f.session.timeline().order()[1].clone();
    let handle = f
        .buffers
        .get_buffer(&BufferUri::for_id(last.as_str()))
        .await
        .unwrap();
    f.buffers.dispose_buffer(handle).await.unwrap();

    let options = f.session.playback_options().with_interval(ms(50));
    let report = finished(f.session.player().play(&options, None).await);

    assert_eq!(report.frames_shown, 1);
    assert!(matches!(report.error, Some(ReelError::MissingBuffer { .. })));
    assert_eq!(
        f.display.frames().last().map(|frame| frame.kind.clone()),
        Some(FrameKind::Clear)
    );
    assert!(!f.session.player().is_playing());
    assert_eq!(f.session.status().current(), EditorStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn recorded_run_delivers_artifact() {
    let f = Fixture::new();
    two_slides(&f).await;
    let host = Arc::new(FakeCapture::default());
    let downloads = Arc::new(KeptDownloads::default());
    let capture = f
        .session
        .capture_session(host.clone(), downloads.clone(), preview_target());
    assert_eq!(capture.phase(), CapturePhase::Idle);

    let options = f.session.playback_options().with_interval(ms(100));
    let report = finished(f.session.player().play(&options, Some(capture)).await);

    assert!(report.completed());
    let artifact = report.artifact.expect("artifact");
    assert_eq!(&artifact.data[..], b"WEBMTAIL");
    assert_eq!(artifact.file_name, "screen-recording.webm");
    assert_eq!(artifact.mime_type, "video/webm");
    assert_eq!(downloads.0.lock().unwrap().len(), 1);
    assert_eq!(
        host.calls(),
        vec!["request", "restrict", "crop", "begin", "stop", "release"]
    );
}

#[tokio::test(start_paused = true)]
async fn capture_denial_aborts_cleanly() {
    let f = Fixture::new();
    two_slides(&f).await;
    let host = Arc::new(FakeCapture::denying());
    let downloads = Arc::new(KeptDownloads::default());
    let capture = f
        .session
        .capture_session(host.clone(), downloads.clone(), preview_target());

    let report = finished(f.session.play(Some(capture)).await);

    assert!(matches!(
        report.error,
        Some(ReelError::Capture(CaptureError::PermissionDenied))
    ));
    assert_eq!(report.frames_shown, 0);
    assert!(report.artifact.is_none());
    assert!(downloads.0.lock().unwrap().is_empty());
    assert_eq!(f.display.frames().len(), 1);
    assert!(!f.session.player().is_playing());
}

#[tokio::test(start_paused = true)]
async fn stalled_read_times_out_when_bounded() {
    let buffers = Arc::new(StalledBuffers {
        inner: MemoryBuffers::new(),
    });
    let display = Arc::new(RecordingSink::new());
    let mut config = BootstrapConfig::default();
    config.playback.step_timeout_ms = Some(500);
    let session = Session::new(
        &config,
        SessionParts {
            buffers,
            project: Arc::new(MemoryStore::new(Namespace::project("test"))),
            assets: Arc::new(MemoryStore::new(Namespace::assets("test"))),
            source: Arc::new(CountingSource::default()),
            display: display.clone(),
        },
    );
    session.timeline().add().await.unwrap();

    let report = finished(session.play(None).await);

    match report.error {
        Some(ReelError::StepTimeout { timeout, .. }) => assert_eq!(timeout, ms(500)),
        other => panic!("expected step timeout, got {other:?}"),
    }
    assert_eq!(display.frames().len(), 1);
    assert!(!session.player().is_playing());
}

#[tokio::test(start_paused = true)]
async fn long_slides_are_trimmed_for_display() {
    let f = Fixture::new();
    let tm = f.session.timeline();
    let id = tm.add().await.unwrap();
    let text: Vec<String> = (0..150).map(|i| format!("line {i}")).collect();
    tm.write_text(&id, &text.join("\n")).await.unwrap();

    let options = f.session.playback_options().with_interval(ms(10));
    finished(f.session.player().play(&options, None).await);

    let shown = f.display.shown();
    assert_eq!(shown[0].lines().count(), 100);
    assert_eq!(shown[0].lines().last(), Some("line 99"));
}

#[tokio::test(start_paused = true)]
async fn status_reports_animation_while_playing() {
    let f = Fixture::new();
    two_slides(&f).await;
    let mut status = f.session.status().subscribe();
    let options = f.session.playback_options().with_interval(ms(100));

    let player = f.session.player();
    let run = player.play(&options, None);
    let watch = async {
        status.changed().await.unwrap();
        *status.borrow_and_update()
    };
    let (report, seen) = tokio::join!(run, watch);

    assert_eq!(seen, EditorStatus::Animating);
    assert!(finished(report).completed());
    assert_eq!(f.session.status().current(), EditorStatus::Idle);
}
