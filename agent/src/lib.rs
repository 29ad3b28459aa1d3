//! Host OS update agent library
//!
//! Keeps a single managed device on the recommended (or a pinned) host OS
//! release by driving updates through the fleet backend.

pub mod app;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod hup;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
pub mod workers;
