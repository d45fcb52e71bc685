use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::app::agent::parse::{build_device_snapshot, parse_info_map};
use crate::app::agent::DeviceAgent;
use crate::app::clock::Clock;
use crate::app::models::DeviceSnapshot;

/// Handle to the background device watcher. The loop polls until a device
/// answers with parseable identity, hands the snapshot over the channel, and
/// self-terminates; `stop` is for shutdown before a device ever shows up.
pub struct WatcherHandle {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    receiver: Receiver<DeviceSnapshot>,
}

impl WatcherHandle {
    /// Blocks until the watcher hands off a device, or `None` if the loop
    /// exited without one.
    pub fn wait_for_device(&self) -> Option<DeviceSnapshot> {
        self.receiver.recv().ok()
    }

    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start_device_watcher(
    agent: Arc<dyn DeviceAgent>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
) -> WatcherHandle {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&stop_flag);
    let (sender, receiver) = mpsc::channel();

    let handle = std::thread::spawn(move || {
        info!("device watcher started");
        while !stop.load(Ordering::SeqCst) {
            match agent.query_info() {
                Ok(raw) => {
                    let map = parse_info_map(&raw);
                    match build_device_snapshot(&map, "watcher") {
                        Ok(snapshot) => {
                            info!(
                                product_type = %snapshot.product_type,
                                "device detected"
                            );
                            let _ = sender.send(snapshot);
                            break;
                        }
                        Err(err) => error!("could not parse device info: {err}"),
                    }
                }
                Err(err) => debug!("no device yet: {err}"),
            }
            clock.sleep(poll_interval);
        }
        info!("device watcher stopped");
    });

    WatcherHandle {
        stop_flag,
        handle: Some(handle),
        receiver,
    }
}
