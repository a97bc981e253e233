//! minly: upload files to S3-compatible storage and share them through
//! short links (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod clipboard;
pub mod config;
pub mod constants;
pub mod env;
pub mod housekeeping;
pub mod lastrun;
pub mod logging;
pub mod paths;
pub mod platform;
pub mod secrets;
pub mod shortener;
pub mod storage;
pub mod store;
pub mod update;
pub mod upload;
