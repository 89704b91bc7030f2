//! sentryd - camera motion detection daemon
//!
//! This daemon:
//! 1. Loads configuration (`.env`, optional config file, environment, flags)
//! 2. Opens the capture source and seeds the reference frame
//! 3. Runs the detect / annotate / display / notify loop
//! 4. Releases the camera and closes the display on exit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use motion_sentry::{
    run, Annotator, CaptureSource, DisabledNotifier, FrameDisplay, HeadlessDisplay,
    MotionDetector, NotificationGate, Notifier, SentryConfig, Session, SmtpNotifier,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "MOTION_CONFIG")]
    config: Option<PathBuf>,
    /// Capture source: camera index, /dev/videoN, image directory, or stub://<scene>.
    #[arg(long)]
    source: Option<String>,
    /// Do not open preview windows; quit with Ctrl-C.
    #[arg(long)]
    headless: bool,
    /// Detect and display only; never send email.
    #[arg(long)]
    no_email: bool,
    /// Directory for manual snapshots.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    // Credentials may live in .env; a missing file is fine.
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Ok(path) = &dotenv {
        log::debug!("loaded environment from {}", path.display());
    }

    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let stage = ui.stage("Load configuration");
        if let Some(path) = &args.config {
            std::env::set_var("MOTION_CONFIG", path);
        }
        match SentryConfig::load() {
            Ok(cfg) => apply_args(cfg, &args),
            Err(err) => {
                stage.fail();
                return Err(err);
            }
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let detector = MotionDetector::new(cfg.detection.clone())?;
    let annotator = Annotator::load(cfg.font_path.as_deref());

    let mut source = {
        let stage = ui.stage("Open capture source");
        match CaptureSource::open(cfg.capture.clone()) {
            Ok(source) => source,
            Err(err) => {
                stage.fail();
                return Err(err.context(format!("could not open camera {}", cfg.capture.source)));
            }
        }
    };

    let mut session = {
        let stage = ui.stage("Seed reference frame");
        match Session::start(
            &mut source,
            detector,
            NotificationGate::new(cfg.notify.gate.clone()),
            annotator,
            cfg.snapshot_dir.clone(),
        ) {
            Ok(session) => session,
            Err(err) => {
                stage.fail();
                return Err(err);
            }
        }
    };

    let mut notifier: Box<dyn Notifier> = if cfg.notify.enabled {
        Box::new(SmtpNotifier::new(cfg.notify.smtp.clone()))
    } else {
        log::warn!("email alerts disabled");
        Box::new(DisabledNotifier)
    };

    let (mut display, headless) = open_display(args.headless, shutdown);

    log::info!(
        "sentryd running. source={} sensitivity={} min_area={} cooldown={}s",
        cfg.capture.source,
        cfg.detection.sensitivity,
        cfg.detection.min_area,
        cfg.notify.gate.cooldown.as_secs()
    );
    for line in ui.banner(headless) {
        log::info!("{}", line);
    }

    let summary = run(
        &mut session,
        &mut source,
        &mut *display,
        &mut *notifier,
        args.max_frames,
    );

    log::info!(
        "motion detection stopped. frames={} motion_frames={} alerts_sent={} alert_failures={} snapshots={}",
        summary.frames_processed,
        summary.motion_frames,
        summary.alerts_sent,
        summary.alert_failures,
        summary.snapshots
    );
    Ok(())
}

fn apply_args(mut cfg: SentryConfig, args: &Args) -> SentryConfig {
    if let Some(source) = &args.source {
        cfg.capture.source = source.clone();
    }
    if let Some(dir) = &args.snapshot_dir {
        cfg.snapshot_dir = dir.clone();
    }
    if args.no_email {
        cfg.notify.enabled = false;
    }
    cfg
}

#[cfg(feature = "display-window")]
fn open_display(headless: bool, shutdown: Arc<AtomicBool>) -> (Box<dyn FrameDisplay>, bool) {
    if headless {
        return (Box::new(HeadlessDisplay::new(shutdown)), true);
    }
    if !motion_sentry::display::window_system_available() {
        log::warn!("no display server found (DISPLAY / WAYLAND_DISPLAY unset); running headless");
        return (Box::new(HeadlessDisplay::new(shutdown)), true);
    }
    (
        Box::new(motion_sentry::display::WindowDisplay::new(shutdown)),
        false,
    )
}

#[cfg(not(feature = "display-window"))]
fn open_display(headless: bool, shutdown: Arc<AtomicBool>) -> (Box<dyn FrameDisplay>, bool) {
    if !headless {
        log::warn!("built without display-window; running headless");
    }
    (Box::new(HeadlessDisplay::new(shutdown)), true)
}
