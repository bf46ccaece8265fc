use crate::frame::Frame;
use crate::training::EvaluationSummary;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Long-running activities that report a final outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Collection,
    DatasetBuild,
    Training,
    Inference,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Collection => "collection",
            TaskKind::DatasetBuild => "dataset build",
            TaskKind::Training => "training",
            TaskKind::Inference => "inference",
        };
        f.write_str(name)
    }
}

/// Final success/failure of a task plus a human-readable message
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub message: String,
    pub evaluation: Option<EvaluationSummary>,
}

impl TaskOutcome {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self {
            success: true,
            message: message.into(),
            evaluation: None,
        }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            evaluation: None,
        }
    }

    pub fn with_evaluation(mut self, evaluation: EvaluationSummary) -> Self {
        self.evaluation = Some(evaluation);
        self
    }
}

/// Where a published frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// Mirrored camera preview during collection
    Camera,
    /// Inference output, annotated when a prediction was made
    Inference,
}

/// Notifications published by the pipelines
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    CameraStatusChanged { connected: bool },
    FrameReady { source: FrameSource, frame: Frame },
    CaptureStatus {
        class_id: u32,
        mode: String,
        count: usize,
        target: usize,
        capturing: bool,
    },
    ModeCompleted { class_id: u32, mode: String },
    ClassCompleted { class_id: u32, total_images: usize },
    Progress { task: TaskKind, percent: u8 },
    Prediction { label: String, confidence: f32 },
    TaskFinished { task: TaskKind, outcome: TaskOutcome },
    UserRegistered { username: String },
}

impl PipelineEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PipelineEvent::CameraStatusChanged { connected } => format!(
                "Camera {}",
                if *connected { "connected" } else { "disconnected" }
            ),
            PipelineEvent::FrameReady { source, frame } => {
                format!("Frame {} ready ({:?})", frame.id, source)
            }
            PipelineEvent::CaptureStatus {
                class_id,
                mode,
                count,
                target,
                capturing,
            } => format!(
                "Class {} / {}: {}/{} ({})",
                class_id,
                mode,
                count,
                target,
                if *capturing { "capturing" } else { "paused" }
            ),
            PipelineEvent::ModeCompleted { class_id, mode } => {
                format!("Mode '{}' completed for class {}", mode, class_id)
            }
            PipelineEvent::ClassCompleted {
                class_id,
                total_images,
            } => format!(
                "All modes completed for class {} ({} images)",
                class_id, total_images
            ),
            PipelineEvent::Progress { task, percent } => format!("{}: {}%", task, percent),
            PipelineEvent::Prediction { label, confidence } => {
                format!("Prediction: {} ({:.2})", label, confidence)
            }
            PipelineEvent::TaskFinished { task, outcome } => format!(
                "{} {}: {}",
                task,
                if outcome.success { "succeeded" } else { "failed" },
                outcome.message
            ),
            PipelineEvent::UserRegistered { username } => {
                format!("User '{}' registered", username)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::CameraStatusChanged { .. } => "camera_status_changed",
            PipelineEvent::FrameReady { .. } => "frame_ready",
            PipelineEvent::CaptureStatus { .. } => "capture_status",
            PipelineEvent::ModeCompleted { .. } => "mode_completed",
            PipelineEvent::ClassCompleted { .. } => "class_completed",
            PipelineEvent::Progress { .. } => "progress",
            PipelineEvent::Prediction { .. } => "prediction",
            PipelineEvent::TaskFinished { .. } => "task_finished",
            PipelineEvent::UserRegistered { .. } => "user_registered",
        }
    }
}

/// Event bus for pipeline notifications using broadcast channels.
///
/// Publishing is synchronous so worker threads can report without a runtime handle.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: PipelineEvent) -> usize {
        match &event {
            PipelineEvent::TaskFinished { task, outcome } => {
                if outcome.success {
                    info!("{} finished: {}", task, outcome.message);
                } else {
                    error!("{} failed: {}", task, outcome.message);
                }
            }
            PipelineEvent::CameraStatusChanged { connected } => {
                if *connected {
                    info!("Camera connected");
                } else {
                    warn!("Camera disconnected");
                }
            }
            PipelineEvent::ModeCompleted { .. } | PipelineEvent::ClassCompleted { .. } => {
                info!("{}", event.description());
            }
            PipelineEvent::FrameReady { .. } => {}
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        // No subscribers is fine: nobody is watching this pipeline right now
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Custom(fn(&PipelineEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Receiver that skips events not matching its filter
pub struct EventReceiver {
    receiver: broadcast::Receiver<PipelineEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<PipelineEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event; `None` once the bus is closed
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Frames dominate the bus; losing some is expected
                    debug!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return None;
                }
            }
        }
    }

    /// Drain every pending event that matches the filter
    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        events.push(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let delivered = event_bus.publish(PipelineEvent::Progress {
            task: TaskKind::DatasetBuild,
            percent: 40,
        });
        assert_eq!(delivered, 1);

        match receiver.recv().await.unwrap() {
            PipelineEvent::Progress { task, percent } => {
                assert_eq!(task, TaskKind::DatasetBuild);
                assert_eq!(percent, 40);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(4);
        let delivered = event_bus.publish(PipelineEvent::CameraStatusChanged { connected: true });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["task_finished"]);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus.publish(PipelineEvent::Progress {
            task: TaskKind::Training,
            percent: 10,
        });
        event_bus.publish(PipelineEvent::TaskFinished {
            task: TaskKind::Training,
            outcome: TaskOutcome::failure("dataset missing"),
        });

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            PipelineEvent::TaskFinished { outcome, .. } => {
                assert!(!outcome.success);
                assert_eq!(outcome.message, "dataset missing");
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_drain_applies_filter() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::Custom(|event| {
            matches!(event, PipelineEvent::Prediction { confidence, .. } if *confidence > 0.5)
        });
        let mut receiver = EventReceiver::new(event_bus.subscribe(), filter, "drain".to_string());

        event_bus.publish(PipelineEvent::Prediction {
            label: "A".to_string(),
            confidence: 0.9,
        });
        event_bus.publish(PipelineEvent::Prediction {
            label: "B".to_string(),
            confidence: 0.2,
        });

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "prediction");
    }

    #[test]
    fn test_event_properties() {
        let event = PipelineEvent::Prediction {
            label: "C".to_string(),
            confidence: 0.9,
        };
        assert_eq!(event.event_type(), "prediction");
        assert_eq!(event.description(), "Prediction: C (0.90)");
        assert_eq!(TaskKind::DatasetBuild.to_string(), "dataset build");
    }
}
