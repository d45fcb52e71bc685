pub mod locator;
pub mod parse;
pub mod runner;

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::app::config::AgentSettings;
use crate::app::error::AppError;
use locator::{resolve_program, validate_program};
use runner::{run_command, run_command_with_timeout};

const DEFAULT_BRIDGE: &str = "pymobiledevice3";
const DEFAULT_INFO: &str = "ideviceinfo";
const DEFAULT_DIAGNOSTICS: &str = "idevicediagnostics";

/// Command surface of the connected device. Every operation may time out; a
/// timeout is reported as `ERR_COMMAND_TIMEOUT` rather than a generic
/// failure.
pub trait DeviceAgent: Send + Sync {
    /// Raw "Key: Value" identity text.
    fn query_info(&self) -> Result<String, AppError>;

    fn reboot(&self) -> Result<(), AppError>;

    /// Collects a diagnostic log archive into `dest` over a bounded window.
    /// The archive's completeness is judged by the caller (directory
    /// presence, size floor), not by the collector's exit status.
    fn collect_log_archive(&self, dest: &Path, timeout: Duration) -> Result<(), AppError>;

    fn pull_file(&self, remote: &str, local: &Path) -> Result<(), AppError>;

    fn push_file(&self, local: &Path, remote: &str) -> Result<(), AppError>;

    /// Idempotent delete: a missing remote path is success.
    fn remove_file(&self, remote: &str) -> Result<(), AppError>;

    fn list_directory(&self, remote: &str) -> Result<String, AppError>;
}

/// `DeviceAgent` over the host mobile-device CLIs: the bridge tool for
/// reboot/archives/file transfer, the info tool for identity queries, and the
/// diagnostics tool as a reboot fallback.
pub struct MobileDeviceAgent {
    bridge_program: String,
    info_program: String,
    diagnostics_program: String,
    trace_id: String,
}

impl MobileDeviceAgent {
    pub fn new(settings: &AgentSettings, trace_id: impl Into<String>) -> Self {
        Self {
            bridge_program: resolve_program(&settings.bridge_path, DEFAULT_BRIDGE),
            info_program: resolve_program(&settings.info_path, DEFAULT_INFO),
            diagnostics_program: resolve_program(&settings.diagnostics_path, DEFAULT_DIAGNOSTICS),
            trace_id: trace_id.into(),
        }
    }

    /// Checks the configured CLI paths before any device work starts. A
    /// default program name passes; a configured override must exist on
    /// disk.
    pub fn verify_tools(&self) -> Result<(), AppError> {
        let tools = [
            (&self.bridge_program, DEFAULT_BRIDGE),
            (&self.info_program, DEFAULT_INFO),
            (&self.diagnostics_program, DEFAULT_DIAGNOSTICS),
        ];
        for (program, default_program) in tools {
            validate_program(program, default_program).map_err(|detail| {
                AppError::system(format!("{program}: {detail}"), &self.trace_id)
            })?;
        }
        Ok(())
    }

    fn afc(&self, args: Vec<String>) -> Result<runner::CommandOutput, AppError> {
        let mut full = vec!["afc".to_string()];
        full.extend(args);
        run_command_with_timeout(
            &self.bridge_program,
            &full,
            Duration::from_secs(120),
            &self.trace_id,
        )
    }
}

impl DeviceAgent for MobileDeviceAgent {
    fn query_info(&self) -> Result<String, AppError> {
        let out = run_command(&self.info_program, &[], &self.trace_id)?;
        if !out.succeeded() {
            let detail = if out.stderr.trim().is_empty() {
                out.stdout.trim().to_string()
            } else {
                out.stderr.trim().to_string()
            };
            return Err(AppError::device_not_found(
                format!("Device info query failed: {detail}"),
                &self.trace_id,
            ));
        }
        Ok(out.stdout)
    }

    fn reboot(&self) -> Result<(), AppError> {
        let out = run_command(
            &self.bridge_program,
            &["restart".to_string()],
            &self.trace_id,
        );
        if matches!(&out, Ok(o) if o.succeeded()) {
            return Ok(());
        }
        debug!("bridge restart failed; falling back to diagnostics restart");
        let fallback = run_command(
            &self.diagnostics_program,
            &["restart".to_string()],
            &self.trace_id,
        );
        match fallback {
            Ok(o) if o.succeeded() => Ok(()),
            Ok(o) => Err(AppError::reboot_failed(
                format!("Restart command failed: {}", o.stderr.trim()),
                &self.trace_id,
            )),
            Err(err) if err.is_timeout() => Err(err),
            Err(err) => Err(AppError::reboot_failed(err.error, &self.trace_id)),
        }
    }

    fn collect_log_archive(&self, dest: &Path, timeout: Duration) -> Result<(), AppError> {
        let args = vec![
            "syslog".to_string(),
            "collect".to_string(),
            dest.to_string_lossy().to_string(),
        ];
        // Grace margin over the collection window before the hard kill.
        let deadline = timeout + Duration::from_secs(30);
        match run_command_with_timeout(&self.bridge_program, &args, deadline, &self.trace_id) {
            Ok(_) => Ok(()),
            Err(err) if err.is_timeout() => {
                // A partial archive may still be usable; size checks decide.
                warn!("log collection hit the deadline; keeping partial archive");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn pull_file(&self, remote: &str, local: &Path) -> Result<(), AppError> {
        let out = self.afc(vec![
            "pull".to_string(),
            remote.to_string(),
            local.to_string_lossy().to_string(),
        ])?;
        let size = std::fs::metadata(local).map(|m| m.len()).unwrap_or(0);
        if out.succeeded() && size > 0 {
            Ok(())
        } else {
            Err(AppError::transfer_failed(
                format!("Failed to pull {remote}: {}", out.stderr.trim()),
                &self.trace_id,
            ))
        }
    }

    fn push_file(&self, local: &Path, remote: &str) -> Result<(), AppError> {
        let out = self.afc(vec![
            "push".to_string(),
            local.to_string_lossy().to_string(),
            remote.to_string(),
        ])?;
        if out.succeeded() {
            Ok(())
        } else {
            Err(AppError::transfer_failed(
                format!("Failed to push to {remote}: {}", out.stderr.trim()),
                &self.trace_id,
            ))
        }
    }

    fn remove_file(&self, remote: &str) -> Result<(), AppError> {
        let out = self.afc(vec!["rm".to_string(), remote.to_string()])?;
        if out.succeeded()
            || is_missing_path_error(&out.stderr)
            || is_missing_path_error(&out.stdout)
        {
            Ok(())
        } else {
            Err(AppError::transfer_failed(
                format!("Failed to remove {remote}: {}", out.stderr.trim()),
                &self.trace_id,
            ))
        }
    }

    fn list_directory(&self, remote: &str) -> Result<String, AppError> {
        let out = self.afc(vec!["ls".to_string(), remote.to_string()])?;
        if out.succeeded() {
            Ok(out.stdout)
        } else {
            Err(AppError::transfer_failed(
                format!("Failed to list {remote}: {}", out.stderr.trim()),
                &self.trace_id,
            ))
        }
    }
}

/// Remove-of-missing-path is success, not failure.
pub fn is_missing_path_error(output: &str) -> bool {
    output.contains("ENOENT") || output.contains("No such file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_outputs_are_recognized() {
        assert!(is_missing_path_error(
            "ERROR afc error: AfcException('Status: ENOENT')"
        ));
        assert!(is_missing_path_error("rm: No such file or directory"));
        assert!(!is_missing_path_error("Permission denied"));
        assert!(!is_missing_path_error(""));
    }

    #[test]
    fn resolves_default_programs() {
        let agent = MobileDeviceAgent::new(&AgentSettings::default(), "t");
        assert_eq!(agent.bridge_program, "pymobiledevice3");
        assert_eq!(agent.info_program, "ideviceinfo");
        assert_eq!(agent.diagnostics_program, "idevicediagnostics");
        assert!(agent.verify_tools().is_ok());
    }

    #[test]
    fn verify_tools_rejects_a_bad_configured_path() {
        let settings = AgentSettings {
            bridge_path: "/no/such/dir/bridge".to_string(),
            ..AgentSettings::default()
        };
        let agent = MobileDeviceAgent::new(&settings, "t");
        let err = agent.verify_tools().unwrap_err();
        assert_eq!(err.code, "ERR_SYSTEM");
        assert!(err.error.contains("/no/such/dir/bridge"));
    }
}
