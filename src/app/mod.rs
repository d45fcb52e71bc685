pub mod agent;
pub mod clock;
pub mod config;
pub mod error;
pub mod guid;
pub mod logging;
pub mod models;
pub mod payload;
pub mod prompt;
pub mod sink;
pub mod watcher;
pub mod workflow;

#[cfg(test)]
pub mod testutil;
