//! # Gamepad Manager
//!
//! Registry of live gamepads keyed by slot index.
//!
//! The manager listens to an [`InputSource`] for attach/detach notifications,
//! creates and destroys one gamepad record per slot, and fans
//! [`GamepadManager::refresh`] out to every live record. It never schedules
//! itself: the caller decides how often to refresh.
//!
//! ## Usage
//!
//! ```
//! use std::rc::Rc;
//! use gamepad_events::gamepad::{GamepadManager, ManagerEvent};
//! use gamepad_events::source::virtual_pad::VirtualSource;
//!
//! let source = Rc::new(VirtualSource::new());
//! let manager = GamepadManager::new(source.clone());
//!
//! manager.start().events().subscribe(|event| {
//!     let ManagerEvent::GamepadConnected(gamepad) = event;
//!     gamepad.on_button_down(|button| println!("button {} down", button));
//! });
//!
//! source.attach("TestPad", 0, 2, 2);
//! source.press(0, 0);
//! manager.refresh();
//!
//! assert!(manager.gamepad(0).is_some());
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::channel::{Channel, Receiver, SubscriptionId};
use crate::config::GamepadConfig;
use crate::source::{ConnectionEvent, GamepadInfo, InputSource};

use super::record::{GamepadRecord, GamepadView};

/// Events published on the manager's channel.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A gamepad was attached and is now reachable through [`GamepadManager::gamepad`]
    GamepadConnected(GamepadView),
}

struct ManagerInner {
    source: Rc<dyn InputSource>,
    config: GamepadConfig,
    controllers: RefCell<HashMap<usize, Rc<GamepadRecord>>>,
    events: Channel<ManagerEvent>,
    /// Present while started
    subscription: Cell<Option<SubscriptionId>>,
}

impl ManagerInner {
    fn on_connection(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Attached(gamepad) => self.attach(gamepad),
            ConnectionEvent::Detached { index, .. } => self.detach(*index),
        }
    }

    fn attach(&self, gamepad: &GamepadInfo) {
        info!(
            "Gamepad connected at index {}: {}. {} buttons, {} axes.",
            gamepad.index,
            gamepad.id,
            gamepad.state.buttons.len(),
            gamepad.state.axes.len()
        );

        // A slot collision would otherwise leak the old record's subscribers
        let previous = self.controllers.borrow_mut().remove(&gamepad.index);
        if let Some(previous) = previous {
            warn!(
                "Index {} already held by {}, replacing it",
                gamepad.index,
                previous.id()
            );
            previous.destroy();
        }

        let record = Rc::new(GamepadRecord::new(
            gamepad,
            self.config,
            Rc::clone(&self.source),
        ));
        self.controllers
            .borrow_mut()
            .insert(gamepad.index, Rc::clone(&record));

        self.events
            .emit(&ManagerEvent::GamepadConnected(GamepadView::new(record)));
    }

    fn detach(&self, index: usize) {
        let removed = self.controllers.borrow_mut().remove(&index);
        match removed {
            Some(record) => {
                info!("Gamepad disconnected from index {}: {}", index, record.id());
                record.destroy();
            }
            None => debug!("Ignoring detach for unknown index {}", index),
        }
    }

    fn unsubscribe(&self) -> bool {
        match self.subscription.take() {
            Some(id) => {
                self.source.connections().unsubscribe(id);
                true
            }
            None => false,
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Handle to a gamepad registry.
///
/// Clones share the same registry.
#[derive(Clone)]
pub struct GamepadManager {
    inner: Rc<ManagerInner>,
}

impl GamepadManager {
    /// Creates a stopped manager with the default configuration.
    pub fn new(source: Rc<dyn InputSource>) -> Self {
        Self::with_config(source, GamepadConfig::default())
    }

    /// Creates a stopped manager. `config` applies to every gamepad it creates.
    pub fn with_config(source: Rc<dyn InputSource>, config: GamepadConfig) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                source,
                config,
                controllers: RefCell::new(HashMap::new()),
                events: Channel::new(),
                subscription: Cell::new(None),
            }),
        }
    }

    /// Begins handling attach/detach notifications. Idempotent.
    pub fn start(&self) -> &Self {
        if self.inner.subscription.get().is_some() {
            return self;
        }

        let weak: Weak<ManagerInner> = Rc::downgrade(&self.inner);
        let id = self.inner.source.connections().subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_connection(event);
            }
        });
        self.inner.subscription.set(Some(id));
        debug!("Gamepad manager started");
        self
    }

    /// Stops handling notifications. Idempotent.
    ///
    /// Gamepads already attached stay live and keep refreshing.
    pub fn stop(&self) -> &Self {
        if self.inner.unsubscribe() {
            debug!("Gamepad manager stopped");
        }
        self
    }

    /// Whether the manager is listening for notifications.
    pub fn is_started(&self) -> bool {
        self.inner.subscription.get().is_some()
    }

    /// Runs the diff step on every live gamepad.
    pub fn refresh(&self) -> &Self {
        // Handlers may attach or detach while we iterate
        let records: Vec<Rc<GamepadRecord>> =
            self.inner.controllers.borrow().values().cloned().collect();
        for record in records {
            record.refresh();
        }
        self
    }

    /// View of the live gamepad at `index`.
    pub fn gamepad(&self, index: usize) -> Option<GamepadView> {
        self.inner
            .controllers
            .borrow()
            .get(&index)
            .map(|record| GamepadView::new(Rc::clone(record)))
    }

    /// Indices of live gamepads, ascending.
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.inner.controllers.borrow().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Number of live gamepads.
    pub fn len(&self) -> usize {
        self.inner.controllers.borrow().len()
    }

    /// Whether no gamepad is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configuration given to every gamepad.
    pub fn config(&self) -> GamepadConfig {
        self.inner.config
    }

    /// Manager-level channel carrying [`ManagerEvent::GamepadConnected`].
    pub fn events(&self) -> Receiver<'_, ManagerEvent> {
        self.inner.events.receiver()
    }
}

impl fmt::Debug for GamepadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GamepadManager")
            .field("config", &self.inner.config)
            .field("started", &self.is_started())
            .field("gamepads", &self.indices())
            .finish()
    }
}
