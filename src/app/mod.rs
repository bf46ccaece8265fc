//! Terminal shell: key bindings, status output and the workflow runner.

mod commands;
mod keyboard_input;
mod reporter;
mod runner;
mod types;

#[cfg(test)]
mod tests;

pub use commands::{apply_collect_command, command_for_key, key_help, CommandEffect};
pub use keyboard_input::KeyboardInputHandler;
pub use reporter::{print_line, EventReporter};
pub use runner::Workflow;
pub use types::{Session, ShellCommand, ShellMode, ShutdownReason};
