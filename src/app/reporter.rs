use crate::events::{EventReceiver, PipelineEvent};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Turns pipeline events into operator-facing status lines
#[derive(Debug, Default)]
pub struct EventReporter {
    last_prediction: Option<String>,
    last_progress: Option<u8>,
}

impl EventReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status line for an event, `None` for events the operator does not need to see.
    ///
    /// Frames are never reported; predictions only when the letter changes.
    pub fn line_for(&mut self, event: &PipelineEvent) -> Option<String> {
        match event {
            PipelineEvent::FrameReady { .. } => None,
            PipelineEvent::Prediction { label, confidence } => {
                if self.last_prediction.as_deref() == Some(label.as_str()) {
                    return None;
                }
                self.last_prediction = Some(label.clone());
                Some(format!("Sign: {} ({:.2})", label, confidence))
            }
            PipelineEvent::Progress { percent, .. } => {
                if self.last_progress == Some(*percent) {
                    return None;
                }
                self.last_progress = Some(*percent);
                Some(event.description())
            }
            PipelineEvent::CaptureStatus {
                count, capturing, ..
            } => {
                // Saves arrive every cooldown; report every 50th while capturing
                if *capturing && *count % 50 != 0 {
                    return None;
                }
                Some(event.description())
            }
            _ => Some(event.description()),
        }
    }

    /// Print status lines until cancelled or the bus closes.
    ///
    /// Events already queued at cancellation are still printed.
    pub async fn run(mut self, mut receiver: EventReceiver, token: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => {
                    for event in receiver.drain() {
                        self.report(&event);
                    }
                    break;
                }
                event = receiver.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.report(&event);
        }
        debug!("Event reporter stopped");
    }

    fn report(&mut self, event: &PipelineEvent) {
        if let Some(line) = self.line_for(event) {
            print_line(&line);
        }
    }
}

/// Print a line that also renders correctly while the terminal is in raw mode
pub fn print_line(line: &str) {
    let mut stdout = std::io::stdout().lock();
    for part in line.lines() {
        let _ = write!(stdout, "{}\r\n", part);
    }
    let _ = stdout.flush();
}
