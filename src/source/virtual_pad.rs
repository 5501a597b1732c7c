//! In-memory input source.
//!
//! [`VirtualSource`] holds gamepads entirely in memory and publishes
//! attach/detach notifications only when told to. Every state change is
//! explicit, which makes the manager deterministic to drive in tests.
//!
//! ```
//! use gamepad_events::source::virtual_pad::VirtualSource;
//! use gamepad_events::source::InputSource;
//!
//! let source = VirtualSource::new();
//! source.attach("TestPad", 0, 2, 2);
//! source.press(0, 1);
//!
//! let state = source.read(0).unwrap();
//! assert!(state.buttons[1].pressed);
//! assert_eq!(state.axes, vec![0.0, 0.0]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::channel::{Channel, Receiver};

use super::{ButtonState, ConnectionEvent, GamepadInfo, InputSource, RawGamepadState};

#[derive(Debug, Clone)]
struct VirtualPad {
    id: String,
    state: RawGamepadState,
    readable: bool,
}

/// Scriptable in-memory [`InputSource`].
#[derive(Debug, Default)]
pub struct VirtualSource {
    pads: RefCell<HashMap<usize, VirtualPad>>,
    connections: Channel<ConnectionEvent>,
}

impl VirtualSource {
    /// Creates a source with no gamepads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugs in a gamepad with released buttons and centered axes.
    ///
    /// Replaces any gamepad already at `index` without a detach notification,
    /// the same way a platform may reuse a slot.
    pub fn attach(&self, id: &str, index: usize, buttons: usize, axes: usize) {
        let state = RawGamepadState {
            axes: vec![0.0; axes],
            buttons: vec![ButtonState::RELEASED; buttons],
        };
        self.attach_with_state(id, index, state);
    }

    /// Plugs in a gamepad with an explicit initial state.
    pub fn attach_with_state(&self, id: &str, index: usize, state: RawGamepadState) {
        debug!("Virtual gamepad attached at index {}: {}", index, id);
        self.pads.borrow_mut().insert(
            index,
            VirtualPad {
                id: id.to_string(),
                state: state.clone(),
                readable: true,
            },
        );

        self.connections.emit(&ConnectionEvent::Attached(GamepadInfo {
            id: id.to_string(),
            index,
            state,
        }));
    }

    /// Unplugs the gamepad at `index`. Returns `false` if nothing was attached there.
    pub fn detach(&self, index: usize) -> bool {
        let removed = self.pads.borrow_mut().remove(&index);
        match removed {
            Some(pad) => {
                debug!("Virtual gamepad detached from index {}: {}", index, pad.id);
                self.connections.emit(&ConnectionEvent::Detached { id: pad.id, index });
                true
            }
            None => false,
        }
    }

    /// Sends a detach notification without touching the stored pads.
    ///
    /// Useful for exercising detach handling of indices the source never attached.
    pub fn notify_detached(&self, id: &str, index: usize) {
        self.connections.emit(&ConnectionEvent::Detached {
            id: id.to_string(),
            index,
        });
    }

    /// Fully presses `button`, widening the button list if needed.
    pub fn press(&self, index: usize, button: usize) {
        self.set_button(index, button, ButtonState::PRESSED);
    }

    /// Fully releases `button`, widening the button list if needed.
    pub fn release(&self, index: usize, button: usize) {
        self.set_button(index, button, ButtonState::RELEASED);
    }

    /// Sets the raw state of one button. Ignored if no gamepad is at `index`.
    pub fn set_button(&self, index: usize, button: usize, state: ButtonState) {
        self.with_pad(index, |pad| {
            let buttons = &mut pad.state.buttons;
            if buttons.len() <= button {
                buttons.resize(button + 1, ButtonState::RELEASED);
            }
            buttons[button] = state;
        });
    }

    /// Replaces the whole button list, e.g. to shrink it.
    pub fn set_buttons(&self, index: usize, buttons: Vec<ButtonState>) {
        self.with_pad(index, |pad| pad.state.buttons = buttons);
    }

    /// Moves one axis, clamped to -1.0..=1.0 and widening the axis list if needed.
    pub fn set_axis(&self, index: usize, axis: usize, value: f32) {
        self.with_pad(index, |pad| {
            let axes = &mut pad.state.axes;
            if axes.len() <= axis {
                axes.resize(axis + 1, 0.0);
            }
            axes[axis] = value.clamp(-1.0, 1.0);
        });
    }

    /// Makes reads at `index` fail (or succeed again) without detaching.
    pub fn set_readable(&self, index: usize, readable: bool) {
        self.with_pad(index, |pad| pad.readable = readable);
    }

    /// Whether a gamepad is plugged in at `index`.
    pub fn is_attached(&self, index: usize) -> bool {
        self.pads.borrow().contains_key(&index)
    }

    fn with_pad(&self, index: usize, f: impl FnOnce(&mut VirtualPad)) {
        if let Some(pad) = self.pads.borrow_mut().get_mut(&index) {
            f(pad);
        }
    }
}

impl InputSource for VirtualSource {
    fn read(&self, index: usize) -> Option<RawGamepadState> {
        self.pads
            .borrow()
            .get(&index)
            .filter(|pad| pad.readable)
            .map(|pad| pad.state.clone())
    }

    fn connections(&self) -> Receiver<'_, ConnectionEvent> {
        self.connections.receiver()
    }
}
