//! # Gamepad Events Library
//!
//! Track attached game controllers and turn polled state into events.
//!
//! This library provides the controller lifecycle and state-diff engine:
//! an [`InputSource`](source::InputSource) announces gamepads, a
//! [`GamepadManager`](gamepad::GamepadManager) keeps one record per live
//! gamepad, and each call to `refresh()` compares fresh button state with the
//! previous poll to publish `ButtonDown`/`ButtonUp` events. Polling cadence is
//! entirely up to the caller.

pub mod channel;
pub mod config;
pub mod error;
pub mod gamepad;
pub mod source;
pub mod telemetry;
