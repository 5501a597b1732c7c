//! # Gamepad Record
//!
//! Per-gamepad diff engine and its read-only view.
//!
//! A [`GamepadRecord`] caches the pressed state of every button seen on the
//! previous refresh (the baseline) and turns differences into events:
//!
//! | Current | Baseline | `multiple` | Event |
//! |---------|----------|------------|-------|
//! | pressed | released | any | `ButtonDown` |
//! | pressed | pressed | `true` | `ButtonDown` |
//! | pressed | pressed | `false` | none |
//! | released | pressed | any | `ButtonUp` |
//! | released | released | any | none |
//!
//! Axes never produce events; they are read on demand.
//!
//! Records are owned by the manager. Consumers only see a [`GamepadView`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::channel::{Channel, Receiver, SubscriptionId};
use crate::config::GamepadConfig;
use crate::source::{ButtonState, GamepadInfo, InputSource};

/// Events published on a gamepad's own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamepadEvent {
    /// Button at this index went down (or is still down in `multiple` mode)
    ButtonDown(usize),
    /// Button at this index was released
    ButtonUp(usize),
    /// The gamepad was detached; last event ever published for it
    Disconnected,
}

impl GamepadEvent {
    /// Event name as used in logs and the event log.
    pub fn name(&self) -> &'static str {
        match self {
            GamepadEvent::ButtonDown(_) => "buttonDown",
            GamepadEvent::ButtonUp(_) => "buttonUp",
            GamepadEvent::Disconnected => "disconnected",
        }
    }

    /// Button index for button events.
    pub fn button(&self) -> Option<usize> {
        match self {
            GamepadEvent::ButtonDown(button) | GamepadEvent::ButtonUp(button) => Some(*button),
            GamepadEvent::Disconnected => None,
        }
    }
}

/// One live gamepad: identity, button baseline and event channel.
pub(crate) struct GamepadRecord {
    id: RefCell<String>,
    /// `None` once destroyed
    index: Cell<Option<usize>>,
    live: Cell<bool>,
    baseline: RefCell<Vec<bool>>,
    config: GamepadConfig,
    source: Rc<dyn InputSource>,
    events: Channel<GamepadEvent>,
}

impl GamepadRecord {
    /// Creates a live record for a freshly attached gamepad.
    ///
    /// The baseline starts from the attach snapshot unless
    /// `report_held_on_attach` is set, in which case it starts empty and
    /// buttons held at attach time are reported on the first refresh.
    pub(crate) fn new(info: &GamepadInfo, config: GamepadConfig, source: Rc<dyn InputSource>) -> Self {
        let baseline = if config.report_held_on_attach {
            Vec::new()
        } else {
            info.state.buttons.iter().map(|button| button.pressed).collect()
        };

        Self {
            id: RefCell::new(info.id.clone()),
            index: Cell::new(Some(info.index)),
            live: Cell::new(true),
            baseline: RefCell::new(baseline),
            config,
            source,
            events: Channel::new(),
        }
    }

    pub(crate) fn id(&self) -> String {
        self.id.borrow().clone()
    }

    pub(crate) fn index(&self) -> Option<usize> {
        self.index.get()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.get()
    }

    pub(crate) fn axes(&self) -> Option<Vec<f32>> {
        let index = self.index.get()?;
        self.source.read(index).map(|state| state.axes)
    }

    pub(crate) fn buttons(&self) -> Option<Vec<ButtonState>> {
        let index = self.index.get()?;
        self.source.read(index).map(|state| state.buttons)
    }

    pub(crate) fn events(&self) -> Receiver<'_, GamepadEvent> {
        self.events.receiver()
    }

    /// Reads the buttons once and publishes the differences from the baseline.
    ///
    /// An unreadable gamepad leaves the baseline untouched and publishes
    /// nothing. Does nothing once destroyed.
    pub(crate) fn refresh(&self) {
        if !self.live.get() {
            return;
        }
        let Some(index) = self.index.get() else {
            return;
        };
        let Some(state) = self.source.read(index) else {
            trace!("Gamepad at index {} unreadable, keeping baseline", index);
            return;
        };

        let pending = self.diff(&state.buttons);
        for event in &pending {
            trace!("Gamepad {} {:?}", index, event);
            self.events.emit(event);
        }
    }

    /// Compares `buttons` to the baseline, updating it, and returns the events to publish.
    fn diff(&self, buttons: &[ButtonState]) -> Vec<GamepadEvent> {
        let mut baseline = self.baseline.borrow_mut();
        if baseline.len() < buttons.len() {
            baseline.resize(buttons.len(), false);
        }

        let mut pending = Vec::new();
        for (button, current) in buttons.iter().enumerate() {
            let was_pressed = baseline[button];
            if current.pressed {
                if self.config.multiple || !was_pressed {
                    pending.push(GamepadEvent::ButtonDown(button));
                }
            } else if was_pressed {
                pending.push(GamepadEvent::ButtonUp(button));
            }
            baseline[button] = current.pressed;
        }
        pending
    }

    /// Terminal transition: publishes `Disconnected`, clears identity, closes the channel.
    ///
    /// Calling it again is a no-op.
    pub(crate) fn destroy(&self) {
        if !self.live.replace(false) {
            return;
        }

        debug!(
            "Destroying gamepad record at index {:?}: {}",
            self.index.get(),
            self.id.borrow()
        );
        self.events.emit(&GamepadEvent::Disconnected);
        self.id.borrow_mut().clear();
        self.index.set(None);
        self.events.close();
    }
}

impl fmt::Debug for GamepadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GamepadRecord")
            .field("id", &self.id.borrow())
            .field("index", &self.index.get())
            .field("live", &self.live.get())
            .field("baseline", &self.baseline.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Read-only handle to a gamepad.
///
/// Cheap to clone. Stays valid after the gamepad is detached, at which point
/// `id()` is empty, `index()` is `None`, and the state accessors return `None`.
#[derive(Clone)]
pub struct GamepadView {
    record: Rc<GamepadRecord>,
}

impl GamepadView {
    pub(crate) fn new(record: Rc<GamepadRecord>) -> Self {
        Self { record }
    }

    /// Hardware model identifier, empty after disconnection.
    pub fn id(&self) -> String {
        self.record.id()
    }

    /// Slot index, `None` after disconnection.
    pub fn index(&self) -> Option<usize> {
        self.record.index()
    }

    /// Whether the gamepad is still attached.
    pub fn is_connected(&self) -> bool {
        self.record.is_live()
    }

    /// Current axis positions, read from the source on every call.
    pub fn axes(&self) -> Option<Vec<f32>> {
        self.record.axes()
    }

    /// Current buttons, read from the source on every call.
    pub fn buttons(&self) -> Option<Vec<ButtonState>> {
        self.record.buttons()
    }

    /// This gamepad's event channel.
    pub fn events(&self) -> Receiver<'_, GamepadEvent> {
        self.record.events()
    }

    /// Subscribes to `ButtonDown` only.
    pub fn on_button_down<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(usize) + 'static,
    {
        self.events().subscribe(move |event| {
            if let GamepadEvent::ButtonDown(button) = event {
                handler(*button);
            }
        })
    }

    /// Subscribes to `ButtonUp` only.
    pub fn on_button_up<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(usize) + 'static,
    {
        self.events().subscribe(move |event| {
            if let GamepadEvent::ButtonUp(button) = event {
                handler(*button);
            }
        })
    }

    /// Subscribes to `Disconnected` only.
    pub fn on_disconnected<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + 'static,
    {
        self.events().subscribe(move |event| {
            if let GamepadEvent::Disconnected = event {
                handler();
            }
        })
    }

    /// Whether both views refer to the same record.
    pub fn same_gamepad(&self, other: &GamepadView) -> bool {
        Rc::ptr_eq(&self.record, &other.record)
    }
}

impl fmt::Debug for GamepadView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GamepadView")
            .field("id", &self.id())
            .field("index", &self.index())
            .finish()
    }
}
