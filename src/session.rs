//! The capture-process-display loop.
//!
//! A `Session` owns all loop state: detector, reference frame, notification
//! gate and counters. `run` drives it against a source, a display and a
//! notifier until the user quits, the stream ends, or a read fails.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;

use crate::annotate::Annotator;
use crate::detect::{DetectionResult, MotionDetector};
use crate::display::{FrameDisplay, KeyCommand};
use crate::frame::{BinaryMask, Frame, PreparedFrame};
use crate::ingest::FrameSource;
use crate::notify::{Alert, NotificationGate, Notifier};
use crate::snapshot::save_snapshot;

pub const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Counters reported when the loop ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub motion_frames: u64,
    pub alerts_sent: u64,
    pub alert_failures: u64,
    pub snapshots: u64,
    pub reference_reseeds: u64,
}

/// What happened to the alert for one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlertOutcome {
    /// No motion, or the gate was closed.
    Skipped,
    /// Motion, but alerts are switched off.
    Disabled,
    Sent,
    Failed { retry_in: Duration },
}

/// Output of one loop iteration.
pub struct Processed {
    pub annotated: RgbImage,
    pub mask: BinaryMask,
    pub motion_count: usize,
    pub alert: AlertOutcome,
    /// The frame size changed and the reference was replaced.
    pub reseeded: bool,
}

pub struct Session {
    detector: MotionDetector,
    reference: PreparedFrame,
    gate: NotificationGate,
    annotator: Annotator,
    snapshot_dir: PathBuf,
    summary: RunSummary,
}

impl Session {
    /// Seed a session from an already captured first frame.
    pub fn new(
        detector: MotionDetector,
        gate: NotificationGate,
        annotator: Annotator,
        snapshot_dir: PathBuf,
        first: &Frame,
    ) -> Self {
        let reference = detector.prepare(first);
        Self {
            detector,
            reference,
            gate,
            annotator,
            snapshot_dir,
            summary: RunSummary::default(),
        }
    }

    /// Read the first frame from `source` and seed the reference with it.
    ///
    /// A source that cannot deliver a first frame is a startup failure.
    pub fn start<S: FrameSource + ?Sized>(
        source: &mut S,
        detector: MotionDetector,
        gate: NotificationGate,
        annotator: Annotator,
        snapshot_dir: PathBuf,
    ) -> Result<Self> {
        let first = source
            .next_frame()
            .context("failed to grab the first frame")?
            .ok_or_else(|| anyhow!("failed to grab the first frame: source returned no frame"))?;
        let (width, height) = first.dimensions();
        log::info!("reference frame seeded ({}x{})", width, height);
        Ok(Self::new(detector, gate, annotator, snapshot_dir, &first))
    }

    /// Detect, alert, annotate and update the reference for one frame.
    pub fn process<N: Notifier + ?Sized>(
        &mut self,
        frame: &Frame,
        now: Instant,
        notifier: &mut N,
    ) -> Processed {
        let current = self.detector.prepare(frame);
        let (detection, reseeded) = match self.detector.detect(&self.reference, &current) {
            Ok(detection) => (detection, false),
            Err(mismatch) => {
                log::warn!("{}; re-seeding reference frame", mismatch);
                self.summary.reference_reseeds += 1;
                let (width, height) = frame.dimensions();
                (DetectionResult::empty(width, height), true)
            }
        };

        self.summary.frames_processed += 1;
        let motion_count = detection.motion_count();
        let mut alert = AlertOutcome::Skipped;
        if detection.motion_detected() {
            self.summary.motion_frames += 1;
            if !notifier.enabled() {
                alert = AlertOutcome::Disabled;
            } else if self.gate.ready(now) {
                alert = self.send_alert(&frame.captured_at, motion_count, now, notifier);
            }
        }

        let annotated = self.annotator.annotate(frame, &detection);

        // Motion keeps the old reference so a lingering object stays visible.
        if !detection.motion_detected() {
            self.reference = current;
        }

        Processed {
            annotated,
            mask: detection.mask,
            motion_count,
            alert,
            reseeded,
        }
    }

    fn send_alert<N: Notifier + ?Sized>(
        &mut self,
        at: &DateTime<Local>,
        motion_count: usize,
        now: Instant,
        notifier: &mut N,
    ) -> AlertOutcome {
        let alert = Alert::motion(at, motion_count);
        match notifier.notify(&alert.subject, &alert.body) {
            Ok(()) => {
                self.gate.record_success(now);
                self.summary.alerts_sent += 1;
                log::info!("motion alert sent ({} objects)", motion_count);
                AlertOutcome::Sent
            }
            Err(err) => {
                let retry_in = self.gate.record_failure(now);
                self.summary.alert_failures += 1;
                log::error!(
                    "failed to send motion alert: {} (next attempt in {}s)",
                    err,
                    retry_in.as_secs()
                );
                AlertOutcome::Failed { retry_in }
            }
        }
    }

    pub fn save_snapshot(&mut self, image: &RgbImage, at: &DateTime<Local>) -> Result<PathBuf> {
        let path = save_snapshot(&self.snapshot_dir, image, at)?;
        self.summary.snapshots += 1;
        Ok(path)
    }

    pub fn reference(&self) -> &PreparedFrame {
        &self.reference
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

/// Releases the source and closes the display however the loop exits.
struct Teardown<'a, S: FrameSource + ?Sized, D: FrameDisplay + ?Sized> {
    source: &'a mut S,
    display: &'a mut D,
}

impl<S: FrameSource + ?Sized, D: FrameDisplay + ?Sized> Drop for Teardown<'_, S, D> {
    fn drop(&mut self) {
        self.source.release();
        self.display.close();
    }
}

/// Run until quit, end of stream, a read error, or `max_frames` processed frames.
pub fn run<S, D, N>(
    session: &mut Session,
    source: &mut S,
    display: &mut D,
    notifier: &mut N,
    max_frames: Option<u64>,
) -> RunSummary
where
    S: FrameSource + ?Sized,
    D: FrameDisplay + ?Sized,
    N: Notifier + ?Sized,
{
    let mut io = Teardown { source, display };
    let mut last_health_log = Instant::now();

    loop {
        if let Some(limit) = max_frames {
            if session.summary.frames_processed >= limit {
                log::info!("frame limit reached ({})", limit);
                break;
            }
        }

        let frame = match io.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source ended");
                break;
            }
            Err(err) => {
                log::error!("failed to grab frame: {:#}", err);
                break;
            }
        };

        let processed = session.process(&frame, Instant::now(), notifier);
        if processed.motion_count > 0 {
            log::debug!(
                "frame {}: {} moving objects",
                frame.sequence,
                processed.motion_count
            );
        }

        if let Err(err) = io.display.show(&processed.annotated, &processed.mask) {
            log::error!("display failed: {:#}", err);
            break;
        }

        match io.display.poll_key() {
            Some(KeyCommand::Quit) => {
                log::info!("quit requested");
                break;
            }
            Some(KeyCommand::Snapshot) => {
                match session.save_snapshot(&processed.annotated, &frame.captured_at) {
                    Ok(path) => log::info!("snapshot saved: {}", path.display()),
                    Err(err) => log::error!("snapshot failed: {:#}", err),
                }
            }
            None => {}
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = io.source.stats();
            let summary = session.summary();
            log::info!(
                "health healthy={} frames={} motion_frames={} alerts_sent={} alert_failures={} source={} captured={}",
                io.source.is_healthy(),
                summary.frames_processed,
                summary.motion_frames,
                summary.alerts_sent,
                summary.alert_failures,
                stats.source,
                stats.frames_captured
            );
            last_health_log = Instant::now();
        }
    }

    drop(io);
    session.summary.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectorSettings;
    use crate::notify::{GateSettings, NotifyError};
    use image::Rgb;

    struct Recorder(u32);

    impl Notifier for Recorder {
        fn notify(&mut self, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.0 += 1;
            Ok(())
        }
    }

    fn frame(block: bool) -> Frame {
        let mut image = RgbImage::new(120, 90);
        if block {
            for y in 30..60 {
                for x in 40..70 {
                    image.put_pixel(x, y, Rgb([255, 255, 255]));
                }
            }
        }
        Frame::new(image, 1)
    }

    fn session(first: &Frame) -> Session {
        let detector = MotionDetector::new(DetectorSettings::default()).unwrap();
        Session::new(
            detector,
            NotificationGate::new(GateSettings::default()),
            Annotator::without_text(),
            PathBuf::from("."),
            first,
        )
    }

    #[test]
    fn motion_keeps_reference_and_alerts_once() {
        let first = frame(false);
        let mut session = session(&first);
        let seeded = session.reference().clone();
        let mut notifier = Recorder(0);
        let now = Instant::now();

        let processed = session.process(&frame(true), now, &mut notifier);
        assert_eq!(processed.motion_count, 1);
        assert_eq!(processed.alert, AlertOutcome::Sent);
        assert_eq!(session.reference(), &seeded);

        let processed = session.process(&frame(true), now + Duration::from_secs(1), &mut notifier);
        assert_eq!(processed.alert, AlertOutcome::Skipped);
        assert_eq!(notifier.0, 1);
        assert_eq!(session.summary().motion_frames, 2);
    }

    #[test]
    fn disabled_alerts_leave_gate_and_counters_alone() {
        let first = frame(false);
        let mut session = session(&first);
        let mut notifier = crate::notify::DisabledNotifier;

        let processed = session.process(&frame(true), Instant::now(), &mut notifier);
        assert_eq!(processed.motion_count, 1);
        assert_eq!(processed.alert, AlertOutcome::Disabled);
        assert_eq!(session.summary().alerts_sent, 0);
        assert_eq!(session.summary().alert_failures, 0);
        assert_eq!(session.summary().motion_frames, 1);
        assert!(session.gate().last_success().is_none());
    }

    #[test]
    fn size_change_reseeds_reference() {
        let first = frame(false);
        let mut session = session(&first);
        let mut notifier = Recorder(0);

        let smaller = Frame::new(RgbImage::new(60, 40), 2);
        let processed = session.process(&smaller, Instant::now(), &mut notifier);
        assert!(processed.reseeded);
        assert_eq!(processed.motion_count, 0);
        assert_eq!(session.reference().dimensions(), (60, 40));
        assert_eq!(session.summary().reference_reseeds, 1);
        assert_eq!(notifier.0, 0);
    }
}
