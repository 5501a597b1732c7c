//! # Input Source Module
//!
//! Boundary between the event engine and whatever actually reads hardware.
//!
//! An [`InputSource`] supplies two things:
//! - attach/detach notifications, published on a [`Channel`](crate::channel::Channel) of [`ConnectionEvent`]
//! - a pull-model [`InputSource::read`] returning the current raw state of one gamepad
//!
//! Implementations:
//! - [`virtual_pad::VirtualSource`]: in-memory, fully scriptable (tests, integrators)
//! - [`evdev::EvdevSource`]: Linux `/dev/input/event*` devices

use crate::channel::Receiver;

pub mod evdev;
pub mod virtual_pad;

/// One button as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ButtonState {
    /// Digital pressed flag (platform threshold)
    pub pressed: bool,
    /// Analog pressure, 0.0 to 1.0
    pub value: f32,
}

impl ButtonState {
    /// Fully pressed button.
    pub const PRESSED: Self = Self { pressed: true, value: 1.0 };

    /// Fully released button.
    pub const RELEASED: Self = Self { pressed: false, value: 0.0 };

    /// Creates a button state from an analog value, pressed when `value >= threshold`.
    pub fn from_value(value: f32, threshold: f32) -> Self {
        let value = value.clamp(0.0, 1.0);
        Self {
            pressed: value >= threshold,
            value,
        }
    }
}

/// Snapshot of one gamepad's raw inputs.
///
/// Lengths are whatever the device reports right now and may change between reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawGamepadState {
    /// Axis positions, -1.0 to 1.0
    pub axes: Vec<f32>,
    /// Buttons in platform order
    pub buttons: Vec<ButtonState>,
}

/// Identity and initial state carried by an attach notification.
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadInfo {
    /// Opaque hardware model identifier
    pub id: String,
    /// Slot assigned by the source, unique among connected gamepads
    pub index: usize,
    /// State at the moment of attachment
    pub state: RawGamepadState,
}

/// Attach/detach notification published by an [`InputSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A gamepad became available
    Attached(GamepadInfo),
    /// The gamepad at `index` went away
    Detached { id: String, index: usize },
}

impl ConnectionEvent {
    /// Slot index the notification refers to.
    pub fn index(&self) -> usize {
        match self {
            ConnectionEvent::Attached(info) => info.index,
            ConnectionEvent::Detached { index, .. } => *index,
        }
    }
}

/// Provider of gamepad notifications and raw state.
///
/// `read` must be cheap and non-blocking: the manager calls it for every live
/// gamepad on every refresh.
pub trait InputSource {
    /// Current raw state at `index`, or `None` if it can't be read right now.
    fn read(&self, index: usize) -> Option<RawGamepadState>;

    /// Channel carrying attach/detach notifications.
    fn connections(&self) -> Receiver<'_, ConnectionEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_state_constants() {
        assert!(ButtonState::PRESSED.pressed);
        assert_eq!(ButtonState::PRESSED.value, 1.0);
        assert!(!ButtonState::RELEASED.pressed);
        assert_eq!(ButtonState::RELEASED.value, 0.0);
        assert_eq!(ButtonState::default(), ButtonState::RELEASED);
    }

    #[test]
    fn test_button_state_from_value_threshold() {
        assert!(!ButtonState::from_value(0.2, 0.5).pressed);
        assert!(ButtonState::from_value(0.5, 0.5).pressed);
        assert!(ButtonState::from_value(0.9, 0.5).pressed);
    }

    #[test]
    fn test_button_state_from_value_clamps() {
        assert_eq!(ButtonState::from_value(1.7, 0.5).value, 1.0);
        assert_eq!(ButtonState::from_value(-0.3, 0.5).value, 0.0);
    }

    #[test]
    fn test_connection_event_index() {
        let attached = ConnectionEvent::Attached(GamepadInfo {
            id: "TestPad".to_string(),
            index: 2,
            state: RawGamepadState::default(),
        });
        let detached = ConnectionEvent::Detached {
            id: "TestPad".to_string(),
            index: 5,
        };

        assert_eq!(attached.index(), 2);
        assert_eq!(detached.index(), 5);
    }
}
