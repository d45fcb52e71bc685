use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use uuid::Uuid;

use crate::app::error::AppError;
use crate::app::models::StageUrls;
use crate::app::sink::{ProgressSink, Severity};

/// Availability-probe threshold: anything at or below this is an error page
/// or an empty body, not a payload.
const TRIVIAL_SIZE: u64 = 100;

pub trait Fetcher: Send + Sync {
    /// Downloads `url` into `dest`, returning the byte count written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, AppError>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    trace_id: String,
}

impl HttpFetcher {
    pub fn new(trace_id: impl Into<String>) -> Result<Self, AppError> {
        let trace_id = trace_id.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| {
                AppError::system(format!("Failed to build HTTP client: {err}"), &trace_id)
            })?;
        Ok(Self { client, trace_id })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, AppError> {
        let failed = |err: String| {
            AppError::download_failed(format!("Download failed for {url}: {err}"), &self.trace_id)
        };
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|err| failed(err.to_string()))?;
        let bytes = response.bytes().map_err(|err| failed(err.to_string()))?;
        let mut file = fs::File::create(dest).map_err(|err| failed(err.to_string()))?;
        file.write_all(&bytes)
            .map_err(|err| failed(err.to_string()))?;
        Ok(bytes.len() as u64)
    }
}

/// Connectivity probe over all three stage resources: each is downloaded to a
/// uniquely named scratch file, checked for a non-trivial size, and discarded
/// immediately. Failures are logged and never abort the caller.
pub fn preload(
    fetcher: &dyn Fetcher,
    urls: &StageUrls,
    scratch_dir: &Path,
    sink: &dyn ProgressSink,
) {
    let stages = [
        ("stage1", urls.stage1.as_str()),
        ("stage2", urls.stage2.as_str()),
        ("stage3", urls.stage3.as_str()),
    ];
    for (name, url) in stages {
        sink.log(&format!("Pre-loading {name}"), Severity::Info);
        let dest = scratch_dir.join(format!("preload_{name}_{}", Uuid::new_v4()));
        match fetcher.fetch(url, &dest) {
            Ok(size) if size > TRIVIAL_SIZE => {
                sink.log(
                    &format!("Pre-loaded {name} ({size} bytes)"),
                    Severity::Success,
                );
            }
            Ok(size) => {
                sink.log(
                    &format!("Pre-load of {name} returned a trivial body ({size} bytes)"),
                    Severity::Warn,
                );
            }
            Err(err) => {
                sink.log(&format!("Failed to pre-load {name}: {err}"), Severity::Warn);
            }
        }
        let _ = fs::remove_file(&dest);
    }
}

/// Persistent download of the final payload. An empty result is a failure.
pub fn download_final(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if dest.exists() {
        let _ = fs::remove_file(dest);
    }
    let size = fetcher.fetch(url, dest)?;
    if size == 0 {
        let _ = fs::remove_file(dest);
        return Err(AppError::download_failed(
            format!("Downloaded payload from {url} is empty"),
            trace_id,
        ));
    }
    Ok(())
}
