//! chatnote-core - Core library for chatnote
//!
//! This crate contains the sync state store, the dedupe and identity
//! protocol, export extraction, folder watching, and note sinks shared by
//! the CLI and the HTTP companion.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod services;
pub mod sink;
pub mod sync;
pub mod util;
pub mod watch;

pub use error::{Error, Result};
pub use models::{SyncEvent, SyncRecord};
