use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::app::agent::parse::{build_device_snapshot, parse_info_map};
use crate::app::agent::runner::run_command_with_timeout;
use crate::app::agent::DeviceAgent;
use crate::app::clock::Clock;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::guid::score::Confidence;
use crate::app::guid::{extract, score, validator};
use crate::app::models::{DeviceSnapshot, GuidCandidate, RetryBudget};
use crate::app::prompt::OperatorPrompt;
use crate::app::sink::{ProgressSink, Severity};

/// Incomplete collections below this are retried, never treated as "no GUID".
const ARCHIVE_SIZE_FLOOR: u64 = 10 * 1024 * 1024;
const TRACE_FILE: &str = "logdata.LiveData.tracev3";
const SCAN_WINDOW: usize = 512;
const QUERY_PROCESS: &str = "bookassetd";
const QUERY_NEEDLE: &str = "BLDatabaseManager.sqlite";

/// Structured query over a collected log archive. `Ok(None)` means the host
/// query tool is unavailable, which fails the attempt softly instead of
/// erroring the run.
pub trait LogArchiveQuery: Send + Sync {
    fn query(
        &self,
        archive: &Path,
        process: &str,
        needle: &str,
    ) -> Result<Option<String>, AppError>;
}

/// `LogArchiveQuery` over the host's `log show` tool.
pub struct HostLogQuery {
    tool: PathBuf,
    timeout: Duration,
    trace_id: String,
}

impl HostLogQuery {
    pub fn new(timeout: Duration, trace_id: impl Into<String>) -> Self {
        Self {
            tool: PathBuf::from("/usr/bin/log"),
            timeout,
            trace_id: trace_id.into(),
        }
    }
}

impl LogArchiveQuery for HostLogQuery {
    fn query(
        &self,
        archive: &Path,
        process: &str,
        needle: &str,
    ) -> Result<Option<String>, AppError> {
        if !self.tool.exists() {
            return Ok(None);
        }
        let args = vec![
            "show".to_string(),
            "--archive".to_string(),
            archive.to_string_lossy().to_string(),
            "--info".to_string(),
            "--debug".to_string(),
            "--style".to_string(),
            "syslog".to_string(),
            "--predicate".to_string(),
            format!("process == \"{process}\" AND eventMessage CONTAINS \"{needle}\""),
        ];
        let out = run_command_with_timeout(
            &self.tool.to_string_lossy(),
            &args,
            self.timeout,
            &self.trace_id,
        )?;
        if !out.succeeded() {
            return Err(AppError::system(
                format!("Log query exited with an error: {}", out.stderr.trim()),
                &self.trace_id,
            ));
        }
        Ok(Some(out.stdout))
    }
}

/// Derives the per-device database GUID from diagnostic logs. Two strategies,
/// tried in order: a structured query over a freshly collected archive, then
/// a raw scan of the live trace file as the fallback. Each is retry-bounded;
/// full exhaustion is `ERR_NO_GUID_FOUND`.
pub struct AcquisitionEngine<'a> {
    agent: &'a dyn DeviceAgent,
    query: &'a dyn LogArchiveQuery,
    clock: &'a dyn Clock,
    sink: &'a dyn ProgressSink,
    prompt: &'a dyn OperatorPrompt,
    config: &'a AppConfig,
    trace_id: String,
}

impl<'a> AcquisitionEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: &'a dyn DeviceAgent,
        query: &'a dyn LogArchiveQuery,
        clock: &'a dyn Clock,
        sink: &'a dyn ProgressSink,
        prompt: &'a dyn OperatorPrompt,
        config: &'a AppConfig,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            query,
            clock,
            sink,
            prompt,
            config,
            trace_id: trace_id.into(),
        }
    }

    pub fn acquire(&self) -> Result<String, AppError> {
        let mut budget = RetryBudget::new(self.config.retries.structured_attempts);
        while let Some(attempt) = budget.next() {
            self.sink.log(
                &format!(
                    "Structured archive query, attempt {attempt}/{}",
                    budget.max_attempts
                ),
                Severity::Attempt,
            );
            match self.structured_attempt() {
                Ok(guid) => {
                    self.sink
                        .log(&format!("GUID extracted: {guid}"), Severity::Success);
                    return Ok(guid);
                }
                Err(err) => {
                    self.sink
                        .log(&format!("Attempt failed: {err}"), Severity::Warn);
                }
            }
        }

        self.sink.log(
            "Structured query exhausted; falling back to raw trace scan",
            Severity::Warn,
        );
        let mut budget = RetryBudget::new(self.config.retries.raw_scan_attempts);
        while let Some(attempt) = budget.next() {
            if attempt > 1 {
                if let Err(err) = self.recover_between_scans() {
                    self.sink.log(
                        &format!("Recovery before retry failed: {err}"),
                        Severity::Warn,
                    );
                    continue;
                }
            }
            self.sink.log(
                &format!(
                    "Raw trace scan, attempt {attempt}/{}",
                    budget.max_attempts
                ),
                Severity::Attempt,
            );
            match self.raw_scan_attempt() {
                Ok(guid) => {
                    self.sink
                        .log(&format!("GUID extracted: {guid}"), Severity::Success);
                    return Ok(guid);
                }
                Err(err) => {
                    self.sink
                        .log(&format!("Attempt failed: {err}"), Severity::Warn);
                }
            }
        }

        Err(AppError::no_guid_found(
            "No device GUID could be derived from diagnostic logs",
            &self.trace_id,
        ))
    }

    fn structured_attempt(&self) -> Result<String, AppError> {
        self.reboot_or_acknowledge();
        self.await_reconnect()?;
        let scratch = tempfile::tempdir().map_err(|err| {
            AppError::system(format!("Failed to create scratch dir: {err}"), &self.trace_id)
        })?;
        // Scratch (and any partial archive in it) is removed when this
        // returns, on success and failure alike.
        let archive = scratch.path().join("system_logs.logarchive");
        self.collect_archive(&archive)?;

        let Some(output) = self.query.query(&archive, QUERY_PROCESS, QUERY_NEEDLE)? else {
            return Err(AppError::no_guid_found(
                "Host log query tool not found",
                &self.trace_id,
            ));
        };
        let line = output
            .lines()
            .find(|line| line.contains(QUERY_NEEDLE))
            .ok_or_else(|| {
                AppError::no_guid_found("No database line in query output", &self.trace_id)
            })?;
        let pattern = Regex::new(extract::GUID_SHAPE).unwrap();
        let candidate = pattern
            .find(line)
            .map(|found| found.as_str().to_uppercase())
            .ok_or_else(|| {
                AppError::no_guid_found("Database line carries no GUID", &self.trace_id)
            })?;
        if !validator::validate(&candidate) {
            return Err(AppError::no_guid_found(
                format!("Extracted value failed validation: {candidate}"),
                &self.trace_id,
            ));
        }
        Ok(candidate)
    }

    fn raw_scan_attempt(&self) -> Result<String, AppError> {
        let scratch = tempfile::tempdir().map_err(|err| {
            AppError::system(format!("Failed to create scratch dir: {err}"), &self.trace_id)
        })?;
        let archive = scratch.path().join("system_logs.logarchive");
        self.collect_archive(&archive)?;

        let trace_path = archive.join(TRACE_FILE);
        if !trace_path.exists() {
            return Err(AppError::archive_missing(
                format!("{TRACE_FILE} absent from the archive"),
                &self.trace_id,
            ));
        }
        let data = fs::read(&trace_path).map_err(|err| {
            AppError::system(format!("Failed to read trace data: {err}"), &self.trace_id)
        })?;
        self.scan_and_gate(&data)
    }

    fn scan_and_gate(&self, data: &[u8]) -> Result<String, AppError> {
        let mut candidates: Vec<GuidCandidate> = Vec::new();
        for marker_pos in extract::scan_markers(data) {
            candidates.extend(extract::extract(data, marker_pos, SCAN_WINDOW));
        }
        let ranked = score::score(&candidates).ok_or_else(|| {
            AppError::no_guid_found("No candidates found near any marker", &self.trace_id)
        })?;
        let top = &ranked[0];
        let confidence = Confidence::from_score(top.score);
        self.sink.log(
            &format!(
                "Top candidate {} scored {} ({confidence:?} confidence, {} occurrences)",
                top.value, top.score, top.occurrences
            ),
            Severity::Info,
        );
        if confidence.needs_confirmation() && !self.prompt.confirm_guid(&top.value, confidence) {
            return Err(AppError::low_confidence_unconfirmed(
                format!("{confidence:?}-confidence candidate was not confirmed"),
                &self.trace_id,
            ));
        }
        Ok(top.value.clone())
    }

    /// A failed restart command degrades to a manual prompt; the sequence
    /// proceeds either way.
    fn reboot_or_acknowledge(&self) {
        match self.agent.reboot() {
            Ok(()) => self
                .sink
                .log("Reboot issued, waiting for the device", Severity::Info),
            Err(err) => {
                self.sink
                    .log(&format!("Automatic reboot failed: {err}"), Severity::Warn);
                self.prompt
                    .acknowledge("Reboot the device manually, then continue.");
            }
        }
    }

    fn await_reconnect(&self) -> Result<DeviceSnapshot, AppError> {
        let poll = Duration::from_secs(self.config.timeouts.reconnect_poll);
        let deadline = self.clock.now() + self.config.timeouts.reconnect_wait_duration();
        loop {
            self.clock.sleep(poll);
            match self.agent.query_info() {
                Ok(raw) => {
                    let map = parse_info_map(&raw);
                    match build_device_snapshot(&map, &self.trace_id) {
                        Ok(snapshot) => {
                            self.sink.log("Device reconnected", Severity::Success);
                            self.clock
                                .sleep(Duration::from_secs(self.config.timeouts.stabilize));
                            return Ok(snapshot);
                        }
                        Err(err) => debug!("device info incomplete during reconnect: {err}"),
                    }
                }
                Err(err) => debug!("device not back yet: {err}"),
            }
            if self.clock.now() >= deadline {
                return Err(AppError::device_not_found(
                    "Device did not reconnect within the wait window",
                    &self.trace_id,
                ));
            }
        }
    }

    fn collect_archive(&self, dest: &Path) -> Result<(), AppError> {
        self.sink
            .log("Collecting diagnostic log archive", Severity::Info);
        self.agent
            .collect_log_archive(dest, self.config.timeouts.syslog_collect_duration())?;
        if !dest.exists() {
            return Err(AppError::archive_missing(
                "Log archive was not produced",
                &self.trace_id,
            ));
        }
        let size = dir_size(dest);
        if size < ARCHIVE_SIZE_FLOOR {
            return Err(AppError::archive_too_small(
                format!(
                    "Log archive is {:.1} MB, below the {} MB floor",
                    size as f64 / (1024.0 * 1024.0),
                    ARCHIVE_SIZE_FLOOR / (1024 * 1024)
                ),
                &self.trace_id,
            ));
        }
        self.sink.log(
            &format!("Archive collected: {:.1} MB", size as f64 / (1024.0 * 1024.0)),
            Severity::Success,
        );
        Ok(())
    }

    fn recover_between_scans(&self) -> Result<(), AppError> {
        self.reboot_or_acknowledge();
        let snapshot = self.await_reconnect()?;
        info!(
            product_type = %snapshot.product_type,
            serial_number = %snapshot.serial_number,
            "device identity re-captured"
        );
        Ok(())
    }
}

fn dir_size(path: &Path) -> u64 {
    let Ok(metadata) = fs::metadata(path) else {
        return 0;
    };
    if metadata.is_file() {
        return metadata.len();
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| dir_size(&entry.path()))
        .sum()
}
