//! Concurrent backup agent for Mingle projects: card pages, attachments and
//! murmurs are pulled over the signed REST API and written to a local tree.

pub mod auth;
pub mod backup;
pub mod client;
pub mod config;
pub mod executor;
pub mod http;
pub mod logging;
pub mod pages;
pub mod queue;
pub mod retry;
pub mod storage;
pub mod subresource;
pub mod sweep;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use backup::{BackupAgent, BackupReport};
pub use config::MbkConfig;
