use super::types::{ShellCommand, ShellMode};
use crate::collection::Collector;
use crate::error::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What the shell should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEffect {
    /// Keep running, optionally telling the operator something
    Continue(Option<String>),
    Quit,
}

/// Key bindings of each workflow
pub fn command_for_key(mode: ShellMode, key: KeyEvent) -> Option<ShellCommand> {
    // Raw mode swallows SIGINT, so Ctrl+C arrives as a key press
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(ShellCommand::Quit);
    }

    match (mode, key.code) {
        (_, KeyCode::Char('q')) | (_, KeyCode::Esc) => Some(ShellCommand::Quit),
        (ShellMode::Collect, KeyCode::Char(' ')) => Some(ShellCommand::ToggleCapture),
        (ShellMode::Collect, KeyCode::Char('m')) => Some(ShellCommand::NextMode),
        (ShellMode::Collect, KeyCode::Char('n')) => Some(ShellCommand::NextClass),
        (ShellMode::Collect, KeyCode::Char('p')) => Some(ShellCommand::PrevClass),
        (ShellMode::Collect, KeyCode::Char('r')) => Some(ShellCommand::ResetMode),
        (ShellMode::Collect, KeyCode::Char('s')) => Some(ShellCommand::ShowStatus),
        _ => None,
    }
}

/// Help line printed when a workflow starts
pub fn key_help(mode: ShellMode) -> &'static str {
    match mode {
        ShellMode::Collect => {
            "[space] start/stop  [m] next mode  [n] next class  [p] previous class  \
             [r] reset mode  [s] status  [q] quit"
        }
        ShellMode::Infer => "[q] quit",
    }
}

/// Run one collection command against the collector
pub fn apply_collect_command(collector: &Collector, command: ShellCommand) -> Result<CommandEffect> {
    let message = match command {
        ShellCommand::ToggleCapture => {
            let was_capturing = collector.is_capturing();
            let capturing = collector.toggle_capture();
            let snapshot = collector.snapshot();
            if capturing {
                format!(
                    "Capturing class {} / {} ({}/{})",
                    snapshot.class_id, snapshot.mode.name, snapshot.count, snapshot.target
                )
            } else if was_capturing {
                format!("Paused at {}/{}", snapshot.count, snapshot.target)
            } else {
                format!(
                    "Mode '{}' is already complete ({}/{}), switch mode or class",
                    snapshot.mode.name, snapshot.count, snapshot.target
                )
            }
        }
        ShellCommand::NextMode => {
            collector.next_mode();
            position(collector)
        }
        ShellCommand::NextClass => {
            collector.next_class();
            position(collector)
        }
        ShellCommand::PrevClass => {
            collector.prev_class();
            position(collector)
        }
        ShellCommand::ResetMode => {
            let deleted = collector.reset_current_mode()?;
            let snapshot = collector.snapshot();
            format!(
                "Deleted {} files of class {} / {}",
                deleted, snapshot.class_id, snapshot.mode.name
            )
        }
        ShellCommand::ShowStatus => collector.status()?.to_string(),
        ShellCommand::Quit => return Ok(CommandEffect::Quit),
    };

    Ok(CommandEffect::Continue(Some(message)))
}

fn position(collector: &Collector) -> String {
    let snapshot = collector.snapshot();
    format!(
        "Class {} / {}: {}/{}",
        snapshot.class_id, snapshot.mode.name, snapshot.count, snapshot.target
    )
}
