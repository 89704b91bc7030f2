use std::cell::Cell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use motion_sentry::annotate::BOX_COLOR;
use motion_sentry::{
    run, AlertOutcome, Annotator, BinaryMask, DetectorSettings, Frame, FrameDisplay,
    FrameSource, GateSettings, KeyCommand, MotionDetector, NotificationGate, Notifier,
    NotifyError, Session, SmtpNotifier, SmtpSettings, SourceStats,
};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

// ---- fixtures ----

fn empty_scene(sequence: u64) -> Frame {
    Frame::new(RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 40, 40])), sequence)
}

fn intruder_scene(sequence: u64) -> Frame {
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 40, 40]));
    for y in 40..70 {
        for x in 60..90 {
            image.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    Frame::new(image, sequence)
}

struct ScriptedSource {
    frames: VecDeque<Result<Option<Frame>>>,
    captured: u64,
    released: Rc<Cell<u32>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Result<Option<Frame>>>) -> Self {
        Self {
            frames: frames.into(),
            captured: 0,
            released: Rc::new(Cell::new(0)),
        }
    }

    fn of(frames: Vec<Frame>) -> Self {
        Self::new(frames.into_iter().map(|f| Ok(Some(f))).collect())
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let next = self.frames.pop_front().unwrap_or(Ok(None));
        if let Ok(Some(_)) = &next {
            self.captured += 1;
        }
        next
    }

    fn release(&mut self) {
        self.released.set(self.released.get() + 1);
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.captured,
            source: "scripted".into(),
        }
    }
}

#[derive(Default)]
struct ScriptedDisplay {
    keys: VecDeque<Option<KeyCommand>>,
    shown: Vec<RgbImage>,
    closed: u32,
}

impl ScriptedDisplay {
    fn with_keys(keys: Vec<Option<KeyCommand>>) -> Self {
        Self {
            keys: keys.into(),
            ..Self::default()
        }
    }
}

impl FrameDisplay for ScriptedDisplay {
    fn show(&mut self, feed: &RgbImage, _mask: &BinaryMask) -> Result<()> {
        self.shown.push(feed.clone());
        Ok(())
    }

    fn poll_key(&mut self) -> Option<KeyCommand> {
        self.keys.pop_front().flatten()
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Vec<(String, String)>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent.push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct FailingNotifier {
    attempts: u32,
}

impl Notifier for FailingNotifier {
    fn notify(&mut self, _subject: &str, _body: &str) -> Result<(), NotifyError> {
        self.attempts += 1;
        Err(NotifyError::Transport("connection refused".into()))
    }
}

fn session_with(first: &Frame, gate: GateSettings, snapshot_dir: PathBuf) -> Session {
    let detector = MotionDetector::new(DetectorSettings::default()).expect("detector");
    Session::new(
        detector,
        NotificationGate::new(gate),
        Annotator::without_text(),
        snapshot_dir,
        first,
    )
}

fn session(first: &Frame) -> Session {
    session_with(first, GateSettings::default(), PathBuf::from("."))
}

// ---- scenarios ----

#[test]
fn static_scene_sends_nothing_and_keeps_reference() {
    let first = empty_scene(0);
    let mut session = session(&first);
    let seeded = session.reference().clone();
    let mut source = ScriptedSource::of((1..=5).map(empty_scene).collect());
    let mut display = ScriptedDisplay::default();
    let mut notifier = RecordingNotifier::default();

    let summary = run(&mut session, &mut source, &mut display, &mut notifier, None);

    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.motion_frames, 0);
    assert!(notifier.sent.is_empty());
    assert_eq!(session.reference(), &seeded);
    assert_eq!(display.shown.len(), 5);
}

#[test]
fn intruder_yields_one_region_one_alert_and_frozen_reference() {
    let first = empty_scene(0);
    let mut session = session(&first);
    let seeded = session.reference().clone();
    let mut notifier = RecordingNotifier::default();

    let processed = session.process(&intruder_scene(1), Instant::now(), &mut notifier);

    assert_eq!(processed.motion_count, 1);
    assert_eq!(processed.alert, AlertOutcome::Sent);
    assert_eq!(notifier.sent.len(), 1);
    let (subject, body) = &notifier.sent[0];
    assert_eq!(subject, "🚨 Motion Detected!");
    assert!(body.ends_with("Number of objects detected: 1"));
    assert_eq!(session.reference(), &seeded);
    assert!(processed.annotated.pixels().any(|p| *p == BOX_COLOR));
}

#[test]
fn missing_password_fails_the_alert_but_not_the_loop() {
    let first = empty_scene(0);
    let mut session = session_with(
        &first,
        GateSettings {
            retry_backoff: Duration::ZERO,
            ..GateSettings::default()
        },
        PathBuf::from("."),
    );
    let mut notifier = SmtpNotifier::new(SmtpSettings {
        sender: Some("camera@example.com".into()),
        receiver: Some("owner@example.com".into()),
        password: None,
        ..SmtpSettings::default()
    });
    let mut source = ScriptedSource::of((1..=3).map(intruder_scene).collect());
    let mut display = ScriptedDisplay::default();

    let summary = run(&mut session, &mut source, &mut display, &mut notifier, None);

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.alerts_sent, 0);
    assert_eq!(summary.alert_failures, 3);
    assert!(session.gate().last_success().is_none());
    assert_eq!(display.shown.len(), 3);
    assert!(display
        .shown
        .iter()
        .all(|frame| frame.pixels().any(|p| *p == BOX_COLOR)));
}

#[test]
fn cooldown_limits_alerts() {
    let t0 = Instant::now();

    let first = empty_scene(0);
    let mut session = session(&first);
    let mut notifier = RecordingNotifier::default();
    session.process(&intruder_scene(1), t0, &mut notifier);
    let processed = session.process(&intruder_scene(2), t0 + Duration::from_secs(30), &mut notifier);
    assert_eq!(processed.alert, AlertOutcome::Skipped);
    assert_eq!(notifier.sent.len(), 1);

    let mut session = self::session(&first);
    let mut notifier = RecordingNotifier::default();
    session.process(&intruder_scene(1), t0, &mut notifier);
    let processed = session.process(&intruder_scene(2), t0 + Duration::from_secs(61), &mut notifier);
    assert_eq!(processed.alert, AlertOutcome::Sent);
    assert_eq!(notifier.sent.len(), 2);
}

#[test]
fn failed_alerts_back_off_before_retrying() {
    let t0 = Instant::now();
    let first = empty_scene(0);
    let mut session = session(&first);
    let mut notifier = FailingNotifier::default();

    let processed = session.process(&intruder_scene(1), t0, &mut notifier);
    assert_eq!(
        processed.alert,
        AlertOutcome::Failed {
            retry_in: Duration::from_secs(5)
        }
    );
    session.process(&intruder_scene(2), t0 + Duration::from_secs(2), &mut notifier);
    assert_eq!(notifier.attempts, 1);

    let processed = session.process(&intruder_scene(3), t0 + Duration::from_secs(6), &mut notifier);
    assert_eq!(
        processed.alert,
        AlertOutcome::Failed {
            retry_in: Duration::from_secs(10)
        }
    );
    assert_eq!(notifier.attempts, 2);
    assert!(session.gate().last_success().is_none());
}

#[test]
fn reference_follows_quiet_frames_only() {
    let first = empty_scene(0);
    let mut session = session(&first);
    let seeded = session.reference().clone();
    let mut notifier = RecordingNotifier::default();

    let brighter = Frame::new(RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([44, 44, 44])), 1);
    let processed = session.process(&brighter, Instant::now(), &mut notifier);
    assert_eq!(processed.motion_count, 0);
    let after_quiet = session.reference().clone();
    assert_ne!(after_quiet, seeded);

    session.process(&intruder_scene(2), Instant::now(), &mut notifier);
    assert_eq!(session.reference(), &after_quiet);
}

#[test]
fn reference_is_the_latest_quiet_frame() {
    let first = empty_scene(0);
    let mut session = session(&first);
    let detector = MotionDetector::new(DetectorSettings::default()).expect("detector");

    // Each frame differs from the last, but never by more than the sensitivity.
    let quiet: Vec<Frame> = (1..=6u8)
        .map(|step| {
            let shade = 40 + step * 3;
            let image = RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
                Rgb([shade, shade.saturating_add((x % 4) as u8), shade])
            });
            Frame::new(image, step as u64)
        })
        .collect();
    let expected = detector.prepare(quiet.last().expect("quiet frames"));

    let mut source = ScriptedSource::of(quiet);
    let mut display = ScriptedDisplay::default();
    let summary = run(
        &mut session,
        &mut source,
        &mut display,
        &mut RecordingNotifier::default(),
        None,
    );

    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.motion_frames, 0);
    assert_eq!(session.reference(), &expected);
}

#[test]
fn motion_at_the_left_edge_is_reported() {
    let first = empty_scene(0);
    let mut session = session(&first);
    let mut notifier = RecordingNotifier::default();

    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 40, 40]));
    for y in 50..80 {
        for x in 0..30 {
            image.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    let processed = session.process(&Frame::new(image, 1), Instant::now(), &mut notifier);

    assert_eq!(processed.motion_count, 1);
    assert_eq!(processed.alert, AlertOutcome::Sent);
    assert_eq!(processed.annotated.get_pixel(0, 50), &BOX_COLOR);
}

#[test]
fn snapshot_key_writes_annotated_frame() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let first = empty_scene(0);
    let mut session = session_with(&first, GateSettings::default(), dir.path().to_path_buf());
    let mut source = ScriptedSource::of(vec![intruder_scene(1), intruder_scene(2)]);
    let mut display = ScriptedDisplay::with_keys(vec![Some(KeyCommand::Snapshot)]);
    let mut notifier = RecordingNotifier::default();

    let summary = run(&mut session, &mut source, &mut display, &mut notifier, None);

    assert_eq!(summary.frames_processed, 2);
    assert_eq!(summary.snapshots, 1);
    let written: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with("snapshot_"));
    assert!(written[0].ends_with(".jpg"));
    Ok(())
}

#[test]
fn every_exit_path_releases_source_and_closes_display() {
    let first = empty_scene(0);

    // Quit key.
    let mut session = session(&first);
    let mut source = ScriptedSource::of((1..=5).map(empty_scene).collect());
    let released = source.released.clone();
    let mut display = ScriptedDisplay::with_keys(vec![None, Some(KeyCommand::Quit)]);
    let summary = run(
        &mut session,
        &mut source,
        &mut display,
        &mut RecordingNotifier::default(),
        None,
    );
    assert_eq!(summary.frames_processed, 2);
    assert_eq!(released.get(), 1);
    assert_eq!(display.closed, 1);

    // End of stream.
    let mut session = self::session(&first);
    let mut source = ScriptedSource::of(vec![empty_scene(1)]);
    let released = source.released.clone();
    let mut display = ScriptedDisplay::default();
    run(
        &mut session,
        &mut source,
        &mut display,
        &mut RecordingNotifier::default(),
        None,
    );
    assert_eq!(released.get(), 1);
    assert_eq!(display.closed, 1);

    // Read error after the first frame.
    let mut session = self::session(&first);
    let mut source = ScriptedSource::new(vec![
        Ok(Some(empty_scene(1))),
        Err(anyhow!("device unplugged")),
        Ok(Some(empty_scene(3))),
    ]);
    let released = source.released.clone();
    let mut display = ScriptedDisplay::default();
    let summary = run(
        &mut session,
        &mut source,
        &mut display,
        &mut RecordingNotifier::default(),
        None,
    );
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(released.get(), 1);
    assert_eq!(display.closed, 1);
}

#[test]
fn frame_limit_stops_the_loop() {
    let first = empty_scene(0);
    let mut session = session(&first);
    let mut source = ScriptedSource::of((1..=10).map(empty_scene).collect());
    let mut display = ScriptedDisplay::default();
    let summary = run(
        &mut session,
        &mut source,
        &mut display,
        &mut RecordingNotifier::default(),
        Some(4),
    );
    assert_eq!(summary.frames_processed, 4);
    assert_eq!(display.closed, 1);
}

#[test]
fn missing_first_frame_is_a_startup_failure() {
    let detector = MotionDetector::new(DetectorSettings::default()).expect("detector");
    let mut source = ScriptedSource::new(vec![Ok(None)]);
    let started = Session::start(
        &mut source,
        detector,
        NotificationGate::new(GateSettings::default()),
        Annotator::without_text(),
        PathBuf::from("."),
    );
    assert!(started.is_err());

    let detector = MotionDetector::new(DetectorSettings::default()).expect("detector");
    let mut source = ScriptedSource::new(vec![Err(anyhow!("no such device"))]);
    assert!(Session::start(
        &mut source,
        detector,
        NotificationGate::new(GateSettings::default()),
        Annotator::without_text(),
        PathBuf::from("."),
    )
    .is_err());
}

#[test]
fn synthetic_intruder_stream_triggers_alert_end_to_end() -> Result<()> {
    let mut source = motion_sentry::CaptureSource::open(motion_sentry::CaptureConfig {
        source: "stub://intruder".into(),
        width: 160,
        height: 120,
        target_fps: 30,
    })?;
    let detector = MotionDetector::new(DetectorSettings::default())?;
    let mut session = Session::start(
        &mut source,
        detector,
        NotificationGate::new(GateSettings::default()),
        Annotator::without_text(),
        PathBuf::from("."),
    )?;
    let mut display = ScriptedDisplay::default();
    let mut notifier = RecordingNotifier::default();

    let summary = run(&mut session, &mut source, &mut display, &mut notifier, Some(59));

    assert!(summary.motion_frames > 0);
    assert_eq!(notifier.sent.len(), 1);
    Ok(())
}
