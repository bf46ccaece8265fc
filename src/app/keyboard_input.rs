use super::commands::command_for_key;
use super::types::{ShellCommand, ShellMode};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw-mode keyboard reader that turns key presses into shell commands
pub struct KeyboardInputHandler {
    mode: ShellMode,
    commands: mpsc::UnboundedSender<ShellCommand>,
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardInputHandler {
    pub fn new(mode: ShellMode, commands: mpsc::UnboundedSender<ShellCommand>) -> Self {
        Self {
            mode,
            commands,
            cancellation_token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Start listening for keyboard input
    pub fn start(&mut self) {
        info!("Starting keyboard input handler ({:?})", self.mode);

        let mode = self.mode;
        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        self.handle = Some(task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                match event::poll(POLL_INTERVAL) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match command_for_key(mode, key_event) {
                            Some(command) => {
                                debug!("Key {:?} -> {:?}", key_event.code, command);
                                if commands.send(command).is_err() || command == ShellCommand::Quit {
                                    break;
                                }
                            }
                            None => debug!("Unbound key: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                        std::thread::sleep(POLL_INTERVAL);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
            debug!("Keyboard input handler task exited");
        }));
    }

    /// Stop the reader and restore the terminal
    pub async fn stop(&mut self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Keyboard input task ended abnormally: {}", e);
            }
        }

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
