//! Startup progress output for the daemon.
//!
//! On a terminal each startup stage gets a spinner; otherwise (or with
//! `--ui plain`) stages are printed as plain lines so logs stay readable.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => Self::Plain,
            Some("pretty") => Self::Pretty,
            _ => Self::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, stderr_is_tty: bool) -> Self {
        let pretty = stderr_is_tty && mode != UiMode::Plain;
        Self { pretty }
    }

    pub fn from_args(ui_flag: Option<&str>, stderr_is_tty: bool) -> Self {
        Self::new(UiMode::parse(ui_flag), stderr_is_tty)
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    /// Start a named stage; it is reported finished when the guard drops.
    pub fn stage(&self, name: &str) -> Stage {
        if !self.pretty {
            eprintln!("==> {}", name);
            return Stage::new(name, None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(format!("{name}…"));
        Stage::new(name, Some(spinner))
    }

    /// Controls shown once the loop is about to start.
    pub fn banner(&self, headless: bool) -> Vec<String> {
        let mut lines = vec!["Motion detection started".to_string()];
        if headless {
            lines.push("Press Ctrl-C to quit".to_string());
        } else {
            lines.push("Press 'q' or Escape to quit".to_string());
            lines.push("Press 's' to save a snapshot".to_string());
        }
        lines
    }
}

pub struct Stage {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl Stage {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Report the stage as failed instead of done.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!(
            "{} {} ({})",
            mark,
            self.name,
            format_duration(self.start.elapsed())
        );
        match &self.spinner {
            Some(spinner) if self.failed => spinner.abandon_with_message(message),
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
