//! # Telemetry Module
//!
//! Records gamepad events to JSONL files with rotation.
//!
//! This module handles:
//! - Turning manager and gamepad events into [`EventRecord`]s
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

pub mod logger;

pub use logger::{EventLogger, EventRecord};
