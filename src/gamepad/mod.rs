//! # Gamepad Module
//!
//! Controller lifecycle and state-diff engine.
//!
//! This module handles:
//! - Tracking live gamepads by slot index ([`GamepadManager`])
//! - Diffing polled button state into `ButtonDown`/`ButtonUp` events
//! - Publishing `GamepadConnected` and `Disconnected` exactly once per gamepad
//! - Read-only access to gamepads through [`GamepadView`]

pub mod manager;
pub mod record;

pub use manager::{GamepadManager, ManagerEvent};
pub use record::{GamepadEvent, GamepadView};
