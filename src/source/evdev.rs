//! # evdev Input Source
//!
//! Linux gamepads read through `/dev/input/event*` with the `evdev` crate.
//!
//! ## Gamepad Detection
//!
//! A device counts as a gamepad when it advertises `BTN_SOUTH` (which shares
//! its code with `BTN_GAMEPAD`). There is no hotplug callback here:
//! [`EvdevSource::scan`] lists the device directory, attaches new gamepads and
//! detaches the ones whose device node vanished. Call it on a slow timer.
//!
//! ## Slots
//!
//! Each gamepad gets the lowest free index, like the browser Gamepad API. A
//! slot is reused only after its previous occupant was detached.
//!
//! ## Raw State
//!
//! | Field | Source | Order |
//! |-------|--------|-------|
//! | buttons | `EVIOCGKEY` key state, gamepad-range keys only | key code |
//! | axes | `EVIOCGABS` per supported axis, normalized with the axis min/max | axis code |
//!
//! Buttons are digital, so `value` is either 0.0 or 1.0.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use evdev::{AbsoluteAxisType, Device, Key};
use tracing::{debug, info, trace};

use crate::channel::{Channel, Receiver};
use crate::error::{GamepadEventsError, Result};

use super::{ButtonState, ConnectionEvent, GamepadInfo, InputSource, RawGamepadState};

/// Default directory holding evdev nodes.
pub const DEFAULT_DEVICE_DIR: &str = "/dev/input";

/// Key code ranges reported as gamepad buttons.
///
/// `BTN_JOYSTICK` block, `BTN_GAMEPAD` block, `BTN_DPAD_*` and `BTN_TRIGGER_HAPPY*`.
const BUTTON_CODE_RANGES: &[(u16, u16)] = &[
    (0x120, 0x13f),
    (0x220, 0x223),
    (0x2c0, 0x2e7),
];

/// Whether a key code belongs to a gamepad button block.
pub fn is_gamepad_button(code: u16) -> bool {
    BUTTON_CODE_RANGES
        .iter()
        .any(|&(first, last)| (first..=last).contains(&code))
}

/// Maps a raw absolute value onto -1.0..=1.0 using the axis limits.
///
/// Degenerate ranges (`max <= min`) read as centered.
///
/// # Examples
///
/// ```
/// use gamepad_events::source::evdev::normalize_axis;
///
/// assert_eq!(normalize_axis(0, 0, 255), -1.0);
/// assert_eq!(normalize_axis(255, 0, 255), 1.0);
/// assert_eq!(normalize_axis(0, -32768, 32767).abs() < 0.001, true);
/// ```
pub fn normalize_axis(value: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }

    let span = (max as i64 - min as i64) as f32;
    let offset = (value as i64 - min as i64) as f32;
    (offset / span * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Browser-style identifier: `vendor-product-name` with hex ids.
fn gamepad_id(vendor: u16, product: u16, name: &str) -> String {
    format!("{:x}-{:x}-{}", vendor, product, name)
}

/// Index allocator keyed by device identity.
#[derive(Debug, Clone, Default)]
pub struct SlotTable<K> {
    slots: Vec<Option<K>>,
}

impl<K: PartialEq + Clone> SlotTable<K> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Places `key` in the lowest free slot and returns its index.
    ///
    /// A key that already holds a slot keeps it.
    pub fn assign(&mut self, key: K) -> usize {
        if let Some(index) = self.index_of(&key) {
            return index;
        }

        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(key);
                index
            }
            None => {
                self.slots.push(Some(key));
                self.slots.len() - 1
            }
        }
    }

    /// Frees the slot held by `key`.
    pub fn release(&mut self, key: &K) -> Option<usize> {
        let index = self.index_of(key)?;
        self.slots[index] = None;
        Some(index)
    }

    /// Slot currently held by `key`.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref() == Some(key))
    }

    /// Key occupying `index`.
    pub fn get(&self, index: usize) -> Option<&K> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Frees every slot whose key is not in `present`, returning what was freed.
    pub fn retain_present(&mut self, present: &[K]) -> Vec<(usize, K)> {
        let mut freed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|key| !present.contains(key)) {
                if let Some(key) = slot.take() {
                    freed.push((index, key));
                }
            }
        }
        freed
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An opened gamepad and the layout captured when it was attached.
struct OpenGamepad {
    id: String,
    device: Device,
    buttons: Vec<Key>,
    axes: Vec<AbsoluteAxisType>,
}

impl OpenGamepad {
    /// Opens `path` and returns `None` when it is not a gamepad.
    fn open(path: &Path) -> std::io::Result<Option<Self>> {
        let device = Device::open(path)?;

        let Some(keys) = device.supported_keys() else {
            return Ok(None);
        };
        if !keys.contains(Key::BTN_SOUTH) {
            return Ok(None);
        }

        let buttons: Vec<Key> = keys
            .iter()
            .filter(|key| is_gamepad_button(key.code()))
            .collect();
        let axes: Vec<AbsoluteAxisType> = device
            .supported_absolute_axes()
            .map(|axes| axes.iter().collect())
            .unwrap_or_default();

        let input_id = device.input_id();
        let id = gamepad_id(
            input_id.vendor(),
            input_id.product(),
            device.name().unwrap_or("Unknown Gamepad"),
        );

        Ok(Some(Self {
            id,
            device,
            buttons,
            axes,
        }))
    }

    fn snapshot(&self) -> std::io::Result<RawGamepadState> {
        let keys = self.device.get_key_state()?;
        let buttons = self
            .buttons
            .iter()
            .map(|key| {
                if keys.contains(*key) {
                    ButtonState::PRESSED
                } else {
                    ButtonState::RELEASED
                }
            })
            .collect();

        let axes = if self.axes.is_empty() {
            Vec::new()
        } else {
            let abs = self.device.get_abs_state()?;
            self.axes
                .iter()
                .map(|axis| {
                    let info = abs[axis.0 as usize];
                    normalize_axis(info.value, info.minimum, info.maximum)
                })
                .collect()
        };

        Ok(RawGamepadState { axes, buttons })
    }
}

/// [`InputSource`] backed by Linux evdev nodes.
pub struct EvdevSource {
    device_dir: PathBuf,
    table: RefCell<SlotTable<PathBuf>>,
    gamepads: RefCell<HashMap<usize, OpenGamepad>>,
    /// Nodes already opened and found not to be gamepads
    ignored: RefCell<HashSet<PathBuf>>,
    connections: Channel<ConnectionEvent>,
}

impl std::fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevSource")
            .field("device_dir", &self.device_dir)
            .field("gamepads", &self.table.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Default for EvdevSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevSource {
    /// Source watching [`DEFAULT_DEVICE_DIR`].
    pub fn new() -> Self {
        Self::with_device_dir(DEFAULT_DEVICE_DIR)
    }

    /// Source watching a custom directory of `event*` nodes.
    pub fn with_device_dir<P: AsRef<Path>>(device_dir: P) -> Self {
        Self {
            device_dir: device_dir.as_ref().to_path_buf(),
            table: RefCell::new(SlotTable::new()),
            gamepads: RefCell::new(HashMap::new()),
            ignored: RefCell::new(HashSet::new()),
            connections: Channel::new(),
        }
    }

    /// Directory being scanned.
    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    /// Number of gamepads currently attached.
    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    /// Whether no gamepad is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reconciles attached gamepads with the device directory.
    ///
    /// Publishes `Detached` for vanished nodes first, then `Attached` for new
    /// gamepads. Returns the number of notifications published.
    ///
    /// # Errors
    ///
    /// `InputUnavailable` if the device directory can't be listed.
    pub fn scan(&self) -> Result<usize> {
        let present = self.list_event_nodes()?;
        let mut notifications = Vec::new();

        self.ignored.borrow_mut().retain(|path| present.contains(path));

        let vacated = self.table.borrow_mut().retain_present(&present);
        for (index, path) in vacated {
            if let Some(gamepad) = self.gamepads.borrow_mut().remove(&index) {
                info!("Gamepad at {} removed from index {}", path.display(), index);
                notifications.push(ConnectionEvent::Detached {
                    id: gamepad.id,
                    index,
                });
            }
        }

        for path in present {
            if self.table.borrow().index_of(&path).is_some()
                || self.ignored.borrow().contains(&path)
            {
                continue;
            }

            let gamepad = match OpenGamepad::open(&path) {
                Ok(Some(gamepad)) => gamepad,
                Ok(None) => {
                    trace!("{} is not a gamepad", path.display());
                    self.ignored.borrow_mut().insert(path);
                    continue;
                }
                Err(e) => {
                    // Permissions are often applied just after the node appears, retry next scan
                    debug!("Could not open {}: {}", path.display(), e);
                    continue;
                }
            };

            let state = match gamepad.snapshot() {
                Ok(state) => state,
                Err(e) => {
                    // Retried on the next scan
                    debug!("Could not read initial state of {}: {}", path.display(), e);
                    continue;
                }
            };

            let index = self.table.borrow_mut().assign(path.clone());
            info!(
                "Found gamepad at {}: {} (index {})",
                path.display(),
                gamepad.id,
                index
            );
            notifications.push(ConnectionEvent::Attached(GamepadInfo {
                id: gamepad.id.clone(),
                index,
                state,
            }));
            self.gamepads.borrow_mut().insert(index, gamepad);
        }

        for notification in &notifications {
            self.connections.emit(notification);
        }

        Ok(notifications.len())
    }

    /// Sorted `event*` nodes in the device directory.
    fn list_event_nodes(&self) -> Result<Vec<PathBuf>> {
        if !self.device_dir.is_dir() {
            return Err(GamepadEventsError::InputUnavailable(format!(
                "{} is not a directory",
                self.device_dir.display()
            )));
        }

        let entries = std::fs::read_dir(&self.device_dir).map_err(|e| {
            GamepadEventsError::InputUnavailable(format!(
                "Failed to read {}: {}",
                self.device_dir.display(),
                e
            ))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("event"))
            })
            .collect();

        // Deterministic slot assignment when several gamepads appear at once
        paths.sort();
        Ok(paths)
    }
}

impl InputSource for EvdevSource {
    fn read(&self, index: usize) -> Option<RawGamepadState> {
        let gamepads = self.gamepads.borrow();
        let gamepad = gamepads.get(&index)?;

        match gamepad.snapshot() {
            Ok(state) => Some(state),
            Err(e) => {
                trace!("Gamepad at index {} unreadable: {}", index, e);
                None
            }
        }
    }

    fn connections(&self) -> Receiver<'_, ConnectionEvent> {
        self.connections.receiver()
    }
}
