//! Shared fakes for exercising the engine and workflow without a device,
//! network, or real delays.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::app::agent::DeviceAgent;
use crate::app::clock::Clock;
use crate::app::error::AppError;
use crate::app::guid::engine::LogArchiveQuery;
use crate::app::guid::score::Confidence;
use crate::app::models::StageUrls;
use crate::app::payload::directory::PayloadDirectory;
use crate::app::payload::download::Fetcher;
use crate::app::prompt::OperatorPrompt;
use crate::app::sink::{ProgressSink, Severity};

pub const DEVICE_INFO: &str = "ActivationState: Unactivated\n\
DeviceName: Test iPad\n\
ProductType: iPad11,6\n\
ProductVersion: 18.7.1\n\
SerialNumber: F9FXK0AHQ1GC\n\
UniqueDeviceID: 00008020-000D14E22E88002E\n";

pub const KNOWN_GUID: &str = "2A22A82B-C342-444D-972F-5270FB5080DF";

/// Virtual clock: `sleep` advances time instead of blocking, so reconnect
/// polling and settle holds run instantly under test.
pub struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }

    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<(String, Severity)>>,
    pub progress: Mutex<Vec<u8>>,
    pub failures: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_progress(&self) -> Option<u8> {
        self.progress.lock().unwrap().last().copied()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }

    pub fn saw_line(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(line, _)| line.contains(needle))
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl ProgressSink for RecordingSink {
    fn log(&self, message: &str, severity: Severity) {
        self.lines
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }

    fn set_progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }

    fn signal_failure(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
}

pub struct ScriptedPrompt {
    pub approve: bool,
    pub acknowledged: Mutex<u32>,
    pub confirmations: Mutex<Vec<(String, Confidence)>>,
}

impl ScriptedPrompt {
    pub fn approving() -> Self {
        Self {
            approve: true,
            acknowledged: Mutex::new(0),
            confirmations: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing() -> Self {
        Self {
            approve: false,
            ..Self::approving()
        }
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn acknowledge(&self, _message: &str) {
        *self.acknowledged.lock().unwrap() += 1;
    }

    fn confirm_guid(&self, guid: &str, confidence: Confidence) -> bool {
        self.confirmations
            .lock()
            .unwrap()
            .push((guid.to_string(), confidence));
        self.approve
    }
}

/// How one `collect_log_archive` call materializes the destination.
#[derive(Clone)]
pub enum ArchivePlan {
    /// Collector "succeeds" but nothing lands on disk.
    Missing,
    /// Archive directory holding one file of exactly this many bytes.
    Sized(u64),
    /// Archive directory with the live trace file plus padding up to
    /// `pad_to` total bytes.
    WithTrace { trace: Vec<u8>, pad_to: u64 },
}

/// Scripted device: info responses and archive plans are consumed as queues
/// (the last entry repeats), device files live in an in-memory map so pull,
/// push, remove and list behave like a tiny filesystem.
pub struct FakeAgent {
    pub info_responses: Mutex<Vec<Result<String, String>>>,
    pub archive_plans: Mutex<Vec<ArchivePlan>>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub reboot_ok: bool,
    pub push_fails: bool,
    /// Push reports success but nothing lands in the file map, so a listing
    /// check never finds the file.
    pub push_silently_drops: bool,
    pub reboot_count: Mutex<u32>,
    pub collect_count: Mutex<u32>,
    pub removed: Mutex<Vec<String>>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self {
            info_responses: Mutex::new(vec![Ok(DEVICE_INFO.to_string())]),
            archive_plans: Mutex::new(vec![ArchivePlan::Missing]),
            files: Mutex::new(HashMap::new()),
            reboot_ok: true,
            push_fails: false,
            push_silently_drops: false,
            reboot_count: Mutex::new(0),
            collect_count: Mutex::new(0),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_archive_plans(plans: Vec<ArchivePlan>) -> Self {
        let agent = Self::new();
        *agent.archive_plans.lock().unwrap() = plans;
        agent
    }

    pub fn device_file(&self, remote: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(remote).cloned()
    }

    pub fn put_device_file(&self, remote: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(remote.to_string(), bytes.to_vec());
    }

    pub fn reboots(&self) -> u32 {
        *self.reboot_count.lock().unwrap()
    }

    pub fn collections(&self) -> u32 {
        *self.collect_count.lock().unwrap()
    }

    fn next_from<T: Clone>(queue: &Mutex<Vec<T>>) -> T {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        }
    }
}

impl DeviceAgent for FakeAgent {
    fn query_info(&self) -> Result<String, AppError> {
        match Self::next_from(&self.info_responses) {
            Ok(raw) => Ok(raw),
            Err(message) => Err(AppError::device_not_found(message, "test")),
        }
    }

    fn reboot(&self) -> Result<(), AppError> {
        *self.reboot_count.lock().unwrap() += 1;
        if self.reboot_ok {
            Ok(())
        } else {
            Err(AppError::reboot_failed("restart command failed", "test"))
        }
    }

    fn collect_log_archive(&self, dest: &Path, _timeout: Duration) -> Result<(), AppError> {
        *self.collect_count.lock().unwrap() += 1;
        match Self::next_from(&self.archive_plans) {
            ArchivePlan::Missing => Ok(()),
            ArchivePlan::Sized(bytes) => {
                std::fs::create_dir_all(dest).unwrap();
                std::fs::write(dest.join("system.trace"), vec![0u8; bytes as usize]).unwrap();
                Ok(())
            }
            ArchivePlan::WithTrace { trace, pad_to } => {
                std::fs::create_dir_all(dest).unwrap();
                let pad = pad_to.saturating_sub(trace.len() as u64);
                std::fs::write(dest.join("logdata.LiveData.tracev3"), trace).unwrap();
                std::fs::write(dest.join("padding.bin"), vec![0u8; pad as usize]).unwrap();
                Ok(())
            }
        }
    }

    fn pull_file(&self, remote: &str, local: &Path) -> Result<(), AppError> {
        match self.files.lock().unwrap().get(remote) {
            Some(bytes) => {
                std::fs::write(local, bytes).unwrap();
                Ok(())
            }
            None => Err(AppError::transfer_failed(
                format!("Failed to pull {remote}: ENOENT"),
                "test",
            )),
        }
    }

    fn push_file(&self, local: &Path, remote: &str) -> Result<(), AppError> {
        if self.push_fails {
            return Err(AppError::transfer_failed(
                format!("Failed to push to {remote}"),
                "test",
            ));
        }
        if self.push_silently_drops {
            return Ok(());
        }
        let bytes = std::fs::read(local).unwrap();
        self.files.lock().unwrap().insert(remote.to_string(), bytes);
        Ok(())
    }

    fn remove_file(&self, remote: &str) -> Result<(), AppError> {
        self.removed.lock().unwrap().push(remote.to_string());
        self.files.lock().unwrap().remove(remote);
        Ok(())
    }

    fn list_directory(&self, remote: &str) -> Result<String, AppError> {
        let prefix = format!("{}/", remote.trim_end_matches('/'));
        let files = self.files.lock().unwrap();
        let listing: Vec<&str> = files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .collect();
        Ok(listing.join("\n"))
    }
}

pub struct FakeQuery {
    pub responses: Mutex<Vec<Result<Option<String>, String>>>,
}

impl FakeQuery {
    pub fn returning(line: &str) -> Self {
        Self {
            responses: Mutex::new(vec![Ok(Some(line.to_string()))]),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            responses: Mutex::new(vec![Ok(None)]),
        }
    }
}

impl LogArchiveQuery for FakeQuery {
    fn query(
        &self,
        _archive: &Path,
        _process: &str,
        _needle: &str,
    ) -> Result<Option<String>, AppError> {
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses[0].clone()
        };
        next.map_err(|message| AppError::system(message, "test"))
    }
}

pub struct FakeDirectory {
    pub result: Result<StageUrls, String>,
    pub requests: Mutex<Vec<(String, String, String)>>,
}

impl FakeDirectory {
    pub fn resolving(urls: StageUrls) -> Self {
        Self {
            result: Ok(urls),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl PayloadDirectory for FakeDirectory {
    fn resolve(
        &self,
        product_type: &str,
        guid: &str,
        serial_number: &str,
    ) -> Result<StageUrls, AppError> {
        self.requests.lock().unwrap().push((
            product_type.to_string(),
            guid.to_string(),
            serial_number.to_string(),
        ));
        match &self.result {
            Ok(urls) => Ok(urls.clone()),
            Err(message) => Err(AppError::payload_resolution(message.clone(), "test")),
        }
    }
}

/// Serves canned bodies by URL; unknown URLs fail the fetch.
pub struct FakeFetcher {
    pub responses: Mutex<HashMap<String, Vec<u8>>>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, AppError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url) {
            Some(body) => {
                std::fs::write(dest, body).unwrap();
                Ok(body.len() as u64)
            }
            None => Err(AppError::download_failed(
                format!("Download failed for {url}"),
                "test",
            )),
        }
    }
}

/// Minimal payload database: an `asset` table with the given number of rows,
/// returned as raw file bytes for the fake fetcher to serve.
pub fn build_payload_db(rows: usize) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.sqlitedb");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "CREATE TABLE asset (pid INTEGER PRIMARY KEY, url TEXT NOT NULL, local_path TEXT NOT NULL)",
        [],
    )
    .unwrap();
    for i in 0..rows {
        conn.execute(
            "INSERT INTO asset (pid, url, local_path) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                i as i64 + 1,
                format!("https://assets.example.com/item{i}"),
                format!("/Books/asset{i}.epub")
            ],
        )
        .unwrap();
    }
    drop(conn);
    std::fs::read(&path).unwrap()
}

/// Raw trace bytes with a marker and GUID embedded, repeated enough times to
/// rank as a high-confidence candidate.
pub fn trace_with_guid(guid: &str) -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..3 {
        data.extend_from_slice(b"noise noise noise ");
        data.extend_from_slice(guid.as_bytes());
        data.extend_from_slice(b" BLDatabaseManager.sqlite trailing bytes ");
    }
    data
}
