use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Success,
    Attempt,
}

impl Severity {
    fn glyph(self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Warn => "⚠",
            Severity::Error => "✗",
            Severity::Success => "✓",
            Severity::Attempt => "⟳",
        }
    }
}

/// Presentation boundary. The workflow core reports through this trait and
/// never depends on how lines are rendered or where the progress indicator
/// lives.
pub trait ProgressSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity);

    /// Progress is monotonic within a run; callers only ever move it forward.
    fn set_progress(&self, percent: u8);

    /// The terminal-failure signal: shown once, after which no further stages
    /// report.
    fn signal_failure(&self, message: &str);
}

/// Plain console renderer, timestamped like the operator log panel it stands
/// in for. Mirrors every line into tracing.
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn log(&self, message: &str, severity: Severity) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        println!("[{timestamp}] {} {message}", severity.glyph());
        match severity {
            Severity::Warn => warn!("{message}"),
            Severity::Error => error!("{message}"),
            _ => info!("{message}"),
        }
    }

    fn set_progress(&self, percent: u8) {
        let percent = percent.min(100);
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        println!("[{timestamp}] ⏳ {percent}%");
        info!(percent, "progress");
    }

    fn signal_failure(&self, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        println!("[{timestamp}] ✗ {message}");
        error!("{message}");
    }
}
