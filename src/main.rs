use std::sync::Arc;
use std::time::Duration;

use tracing::error;
use uuid::Uuid;

use turnkey::app::agent::{DeviceAgent, MobileDeviceAgent};
use turnkey::app::clock::{Clock, SystemClock};
use turnkey::app::config::load_config;
use turnkey::app::guid::engine::HostLogQuery;
use turnkey::app::logging::init_logging;
use turnkey::app::payload::directory::RemoteDirectory;
use turnkey::app::payload::download::HttpFetcher;
use turnkey::app::prompt::{AutoPrompt, ConsolePrompt, OperatorPrompt};
use turnkey::app::sink::{ConsoleSink, ProgressSink, Severity};
use turnkey::app::watcher::start_device_watcher;
use turnkey::app::workflow::ActivationWorkflow;

const WATCH_POLL: Duration = Duration::from_secs(2);

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    init_logging();
    let trace_id = Uuid::new_v4().to_string();
    let sink = ConsoleSink;

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "could not load configuration");
            sink.signal_failure(&err.to_string());
            return 2;
        }
    };

    let device_agent = MobileDeviceAgent::new(&config.agent, trace_id.clone());
    if let Err(err) = device_agent.verify_tools() {
        sink.signal_failure(&err.to_string());
        return 2;
    }
    let agent: Arc<dyn DeviceAgent> = Arc::new(device_agent);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    sink.log("Searching for devices...", Severity::Info);
    let watcher = start_device_watcher(Arc::clone(&agent), Arc::clone(&clock), WATCH_POLL);
    let Some(snapshot) = watcher.wait_for_device() else {
        sink.signal_failure("Device watcher exited without a device");
        return 1;
    };
    sink.log(
        &format!(
            "Detected {} ({}), version {}",
            snapshot.device_name.as_deref().unwrap_or("device"),
            snapshot.product_type,
            snapshot.product_version.as_deref().unwrap_or("unknown"),
        ),
        Severity::Success,
    );

    let query = HostLogQuery::new(config.timeouts.log_show_duration(), trace_id.clone());
    // Unattended runs must never block on stdin.
    let prompt: Box<dyn OperatorPrompt> = if std::env::var("TURNKEY_UNATTENDED").is_ok() {
        Box::new(AutoPrompt {
            approve_low_confidence: config.auto_approve_low_confidence,
        })
    } else {
        Box::new(ConsolePrompt {
            approve_low_confidence: config.auto_approve_low_confidence,
        })
    };
    let directory = match RemoteDirectory::new(config.endpoint.url.clone(), trace_id.clone()) {
        Ok(directory) => directory,
        Err(err) => {
            sink.signal_failure(&err.to_string());
            return 2;
        }
    };
    let fetcher = match HttpFetcher::new(trace_id.clone()) {
        Ok(fetcher) => fetcher,
        Err(err) => {
            sink.signal_failure(&err.to_string());
            return 2;
        }
    };

    let workflow = ActivationWorkflow::new(
        agent.as_ref(),
        &directory,
        &fetcher,
        &query,
        clock.as_ref(),
        &sink,
        prompt.as_ref(),
        &config,
        trace_id,
    );
    match workflow.run() {
        Ok(()) => 0,
        Err(err) => {
            error!(code = %err.code, "activation run failed");
            1
        }
    }
}
