use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::app::agent::parse::{build_device_snapshot, parse_info_map};
use crate::app::agent::DeviceAgent;
use crate::app::clock::Clock;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::guid::engine::{AcquisitionEngine, LogArchiveQuery};
use crate::app::models::{DeviceSnapshot, StageUrls};
use crate::app::payload::directory::PayloadDirectory;
use crate::app::payload::download::{self, Fetcher};
use crate::app::payload::validate::validate_payload;
use crate::app::prompt::OperatorPrompt;
use crate::app::sink::{ProgressSink, Severity};

const PAYLOAD_TARGET: &str = "/Downloads/downloads.28.sqlitedb";
const PLIST_SOURCE: &str = "/iTunes_Control/iTunes/iTunesMetadata.plist";
const PLIST_BOOKS: &str = "/Books/iTunesMetadata.plist";

/// Removed before the payload is pushed. Removal of an absent path is a
/// no-op, so the deploy is re-runnable.
const STALE_FILES: [&str; 7] = [
    "/Downloads/downloads.28.sqlitedb",
    "/Downloads/downloads.28.sqlitedb-wal",
    "/Downloads/downloads.28.sqlitedb-shm",
    "/Books/asset.epub",
    "/Books/iTunesMetadata.plist",
    "/iTunes_Control/iTunes/iTunesMetadata.plist",
    "/iTunes_Control/iTunes/iTunesMetadata.plist.ext",
];

/// Sidecars and auxiliary files swept after the deploy.
const CLEANUP_FILES: [&str; 6] = [
    "/Downloads/downloads.28.sqlitedb-wal",
    "/Downloads/downloads.28.sqlitedb-shm",
    "/Books/asset.epub",
    "/Books/iTunesMetadata.plist",
    "/iTunes_Control/iTunes/iTunesMetadata.plist",
    "/iTunes_Control/iTunes/iTunesMetadata.plist.ext",
];

/// The twelve-stage activation pipeline. Stages run strictly in order; each
/// publishes its progress percentage on entry, and the first terminal failure
/// signals the sink and ends the run with no further stages executing.
pub struct ActivationWorkflow<'a> {
    agent: &'a dyn DeviceAgent,
    directory: &'a dyn PayloadDirectory,
    fetcher: &'a dyn Fetcher,
    query: &'a dyn LogArchiveQuery,
    clock: &'a dyn Clock,
    sink: &'a dyn ProgressSink,
    prompt: &'a dyn OperatorPrompt,
    config: &'a AppConfig,
    trace_id: String,
}

impl<'a> ActivationWorkflow<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: &'a dyn DeviceAgent,
        directory: &'a dyn PayloadDirectory,
        fetcher: &'a dyn Fetcher,
        query: &'a dyn LogArchiveQuery,
        clock: &'a dyn Clock,
        sink: &'a dyn ProgressSink,
        prompt: &'a dyn OperatorPrompt,
        config: &'a AppConfig,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            directory,
            fetcher,
            query,
            clock,
            sink,
            prompt,
            config,
            trace_id: trace_id.into(),
        }
    }

    pub fn run(&self) -> Result<(), AppError> {
        match self.run_stages() {
            Ok(()) => {
                self.sink.log(
                    "Activation sequence complete. Set the device up as usual.",
                    Severity::Success,
                );
                Ok(())
            }
            Err(err) => {
                self.sink.signal_failure(&err.to_string());
                Err(err)
            }
        }
    }

    fn run_stages(&self) -> Result<(), AppError> {
        let snapshot = self.connect()?;
        let guid = self.acquire_guid()?;
        let urls = self.resolve_payload(&snapshot, &guid)?;

        let scratch = tempfile::tempdir().map_err(|err| {
            AppError::system(format!("Failed to create scratch dir: {err}"), &self.trace_id)
        })?;
        self.preload(&urls, scratch.path());
        let payload = self.download_final_payload(&urls, scratch.path())?;
        self.validate_payload_db(&payload)?;
        self.deploy_payload(&payload)?;
        self.post_deploy_cleanup();
        self.plist_relocation_round1(scratch.path());
        self.plist_relocation_round2(scratch.path());
        self.settle();
        self.final_reboot();
        Ok(())
    }

    fn connect(&self) -> Result<DeviceSnapshot, AppError> {
        self.sink.set_progress(10);
        self.sink.log("Connecting to device", Severity::Info);
        let raw = self.agent.query_info()?;
        let map = parse_info_map(&raw);
        let snapshot = build_device_snapshot(&map, &self.trace_id)?;
        self.sink.log(
            &format!(
                "Connected: {} (serial {})",
                snapshot.product_type, snapshot.serial_number
            ),
            Severity::Success,
        );
        if snapshot.is_activated() {
            self.sink.log(
                "Device already reports ActivationState: Activated",
                Severity::Warn,
            );
        }
        Ok(snapshot)
    }

    fn acquire_guid(&self) -> Result<String, AppError> {
        self.sink.set_progress(20);
        self.sink
            .log("Deriving device GUID from diagnostic logs", Severity::Info);
        let engine = AcquisitionEngine::new(
            self.agent,
            self.query,
            self.clock,
            self.sink,
            self.prompt,
            self.config,
            self.trace_id.clone(),
        );
        let guid = engine.acquire()?;
        self.sink
            .log(&format!("Final GUID: {guid}"), Severity::Success);
        Ok(guid)
    }

    fn resolve_payload(
        &self,
        snapshot: &DeviceSnapshot,
        guid: &str,
    ) -> Result<StageUrls, AppError> {
        self.sink.set_progress(30);
        self.sink
            .log("Requesting stage resources from the directory", Severity::Info);
        let urls =
            self.directory
                .resolve(&snapshot.product_type, guid, &snapshot.serial_number)?;
        info!(stage1 = %urls.stage1, stage2 = %urls.stage2, stage3 = %urls.stage3, "resolved");
        Ok(urls)
    }

    fn preload(&self, urls: &StageUrls, scratch: &Path) {
        self.sink.set_progress(35);
        download::preload(self.fetcher, urls, scratch, self.sink);
    }

    fn download_final_payload(
        &self,
        urls: &StageUrls,
        scratch: &Path,
    ) -> Result<PathBuf, AppError> {
        self.sink.set_progress(45);
        self.sink.log("Downloading final payload", Severity::Info);
        let dest = scratch.join("downloads.28.sqlitedb");
        download::download_final(self.fetcher, &urls.stage3, &dest, &self.trace_id)?;
        Ok(dest)
    }

    fn validate_payload_db(&self, payload: &Path) -> Result<(), AppError> {
        self.sink.set_progress(50);
        self.sink.log("Validating payload database", Severity::Info);
        let records = validate_payload(payload, &self.trace_id)?;
        self.sink.log(
            &format!("Database validation passed, {} records", records.len()),
            Severity::Success,
        );
        for record in &records {
            info!(pid = record.pid, url = %record.url, local_path = %record.local_path, "asset");
        }
        Ok(())
    }

    fn deploy_payload(&self, payload: &Path) -> Result<(), AppError> {
        self.sink.set_progress(60);
        self.sink.log("Uploading payload", Severity::Info);
        for stale in STALE_FILES {
            if let Err(err) = self.agent.remove_file(stale) {
                self.sink
                    .log(&format!("Could not remove {stale}: {err}"), Severity::Warn);
            }
        }
        if let Err(err) = self.agent.push_file(payload, PAYLOAD_TARGET) {
            let _ = std::fs::remove_file(payload);
            return Err(err);
        }
        let listing = self.agent.list_directory("/Downloads")?;
        let deployed = listing
            .lines()
            .any(|entry| entry.trim() == "downloads.28.sqlitedb");
        if !deployed {
            return Err(AppError::transfer_unconfirmed(
                format!("{PAYLOAD_TARGET} not present after upload"),
                &self.trace_id,
            ));
        }
        self.sink
            .log("Payload deployed and confirmed on device", Severity::Success);
        Ok(())
    }

    fn post_deploy_cleanup(&self) {
        self.sink.set_progress(65);
        self.sink
            .log("Cleaning up sidecar and auxiliary files", Severity::Info);
        for path in CLEANUP_FILES {
            match self.agent.remove_file(path) {
                Ok(()) => self
                    .sink
                    .log(&format!("{path} removed or not present"), Severity::Info),
                Err(err) => self
                    .sink
                    .log(&format!("Could not remove {path}: {err}"), Severity::Warn),
            }
        }
    }

    fn plist_relocation_round1(&self, scratch: &Path) {
        self.sink.set_progress(75);
        self.sink.log(
            "Relocation round 1: reboot, then copy the metadata plist to /Books",
            Severity::Info,
        );
        self.tolerated_reboot();
        self.sink
            .log("Waiting for the metadata plist to regenerate", Severity::Info);
        self.clock
            .sleep(Duration::from_secs(self.config.timeouts.plist_regen));
        self.copy_device_file(PLIST_SOURCE, PLIST_BOOKS, scratch);
    }

    fn plist_relocation_round2(&self, scratch: &Path) {
        self.sink.set_progress(85);
        self.sink.log(
            "Relocation round 2: reboot, then copy the metadata plist back",
            Severity::Info,
        );
        self.tolerated_reboot();
        self.clock
            .sleep(Duration::from_secs(self.config.timeouts.stabilize));
        self.copy_device_file(PLIST_BOOKS, PLIST_SOURCE, scratch);
    }

    fn settle(&self) {
        self.sink.set_progress(90);
        self.sink.log(
            "Holding for on-device background processing",
            Severity::Info,
        );
        self.clock
            .sleep(Duration::from_secs(self.config.timeouts.settle));
    }

    /// The run is complete once the reboot command has been issued; whether
    /// the device reconnects afterwards is not observed.
    fn final_reboot(&self) {
        self.sink.set_progress(100);
        self.sink
            .log("Final reboot to trigger activation", Severity::Info);
        self.tolerated_reboot();
    }

    fn tolerated_reboot(&self) {
        if let Err(err) = self.agent.reboot() {
            self.sink.log(
                &format!("Reboot failed, continuing anyway: {err}"),
                Severity::Warn,
            );
        }
    }

    /// Pull-then-push round trip through a local scratch file. A missing
    /// source is tolerated with a warning.
    fn copy_device_file(&self, src: &str, dst: &str, scratch: &Path) {
        let local = scratch.join("temp_plist_copy.plist");
        self.sink
            .log(&format!("Copying {src} to {dst}"), Severity::Info);
        match self.agent.pull_file(src, &local) {
            Ok(()) => {
                match self.agent.push_file(&local, dst) {
                    Ok(()) => self
                        .sink
                        .log(&format!("Copied {src} to {dst}"), Severity::Success),
                    Err(err) => self
                        .sink
                        .log(&format!("Failed to push to {dst}: {err}"), Severity::Warn),
                }
                let _ = std::fs::remove_file(&local);
            }
            Err(_) => {
                self.sink
                    .log(&format!("{src} not found, skipping copy"), Severity::Warn);
            }
        }
    }
}
