//! # Gamepad Events
//!
//! Watch gamepads attached to this machine and log their button events.
//!
//! This application drives the gamepad manager from a tokio loop: evdev
//! devices are rescanned for hotplug on a slow timer and the manager is
//! refreshed at the configured rate.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use gamepad_events::config::Config;
use gamepad_events::gamepad::{GamepadEvent, GamepadManager, GamepadView, ManagerEvent};
use gamepad_events::source::evdev::EvdevSource;
use gamepad_events::telemetry::{EventLogger, EventRecord};

type SharedLogger = Rc<RefCell<EventLogger>>;

/// Main entry point for Gamepad Events
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (first argument, defaults when omitted)
///    - Open the event log if enabled
///    - Start the manager and run a first device scan
///
/// 2. **Main Loop**
///    - Refresh all gamepads at `poll.refresh_rate_hz`
///    - Rescan input devices every `poll.scan_interval_ms`
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop the manager
///    - Clean exit
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - The event log directory cannot be created
/// - The input device directory cannot be listed on the first scan
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO gamepad_events: Gamepad Events v0.1.0 starting...
/// INFO gamepad_events::source::evdev: Found gamepad at /dev/input/event21: 54c-ce6-DualSense Wireless Controller (index 0)
/// INFO gamepad_events::gamepad::manager: Gamepad connected at index 0: 54c-ce6-DualSense Wireless Controller. 13 buttons, 8 axes.
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Gamepad Events v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(std::env::args().nth(1))?;
    debug!("Configuration: {:?}", config);

    let logger: Option<SharedLogger> = if config.telemetry.enabled {
        let logger = EventLogger::new(&config.telemetry)
            .context("Failed to open event log")?;
        info!("Logging events to {}", config.telemetry.log_dir);
        Some(Rc::new(RefCell::new(logger)))
    } else {
        None
    };

    let source = Rc::new(EvdevSource::with_device_dir(&config.input.device_dir));
    let manager = GamepadManager::with_config(source.clone(), config.gamepad);

    manager.start().events().subscribe(move |event| {
        let ManagerEvent::GamepadConnected(gamepad) = event;
        watch_gamepad(gamepad, logger.clone());
    });

    source
        .scan()
        .with_context(|| format!("Failed to scan {}", config.input.device_dir))?;
    if manager.is_empty() {
        info!("No gamepad connected yet, waiting...");
    }

    let mut refresh_interval = interval(config.poll.refresh_period());
    refresh_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut scan_interval = interval(config.poll.scan_period());
    scan_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Refreshing at {}Hz, scanning every {}ms",
        config.poll.refresh_rate_hz, config.poll.scan_interval_ms
    );
    info!("Press Ctrl+C to exit");

    // Main loop
    loop {
        tokio::select! {
            _ = refresh_interval.tick() => {
                manager.refresh();
            }

            _ = scan_interval.tick() => {
                if let Err(e) = source.scan() {
                    warn!("Device scan failed: {}", e);
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    manager.stop();
    info!("{} gamepad(s) connected at exit", manager.len());

    Ok(())
}

/// Loads the configuration file given on the command line, or the defaults.
fn load_config(path: Option<String>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::load(&path).with_context(|| format!("Failed to load configuration from {}", path))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// Logs every event of a newly connected gamepad.
fn watch_gamepad(gamepad: &GamepadView, logger: Option<SharedLogger>) {
    let id = gamepad.id();
    let index = gamepad.index();

    if let Some(logger) = &logger {
        write_record(logger, &EventRecord::connected(&id, index));
    }

    gamepad.events().subscribe(move |event| {
        match event {
            GamepadEvent::ButtonDown(button) => debug!("Gamepad {:?}: button {} down", index, button),
            GamepadEvent::ButtonUp(button) => debug!("Gamepad {:?}: button {} up", index, button),
            GamepadEvent::Disconnected => debug!("Gamepad {:?}: disconnected", index),
        }

        if let Some(logger) = &logger {
            write_record(logger, &EventRecord::gamepad(&id, index, event));
        }
    });
}

fn write_record(logger: &SharedLogger, record: &EventRecord) {
    if let Err(e) = logger.borrow_mut().log(record) {
        warn!("Failed to write event log: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamepad_events::config::TelemetryConfig;
    use gamepad_events::source::virtual_pad::VirtualSource;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Some("/nonexistent/config.toml".to_string())).is_err());
    }

    #[test]
    fn test_load_shipped_default_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = load_config(Some(path.to_string())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_watch_gamepad_logs_events() {
        let dir = tempfile::tempdir().unwrap();
        let telemetry = TelemetryConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().to_string(),
            ..TelemetryConfig::default()
        };
        let logger = Rc::new(RefCell::new(EventLogger::new(&telemetry).unwrap()));

        let source = Rc::new(VirtualSource::new());
        let manager = GamepadManager::new(source.clone());
        let shared = Rc::clone(&logger);
        manager.start().events().subscribe(move |event| {
            let ManagerEvent::GamepadConnected(gamepad) = event;
            watch_gamepad(gamepad, Some(Rc::clone(&shared)));
        });

        source.attach("TestPad", 0, 2, 0);
        source.press(0, 1);
        manager.refresh();
        source.detach(0);

        let path = logger.borrow().current_file().unwrap().to_path_buf();
        let events: Vec<String> = std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events, vec!["gamepadConnected", "buttonDown", "disconnected"]);
    }
}
