use super::interface::CameraOpener;
use crate::error::Result;
use crate::events::{EventBus, FrameSource, PipelineEvent};
use crate::frame_slot::FrameSlot;
use crate::task::BackgroundTask;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Exit status of the camera worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraExit {
    /// Stopped on request after the device had been open
    Stopped,
    /// The device never opened
    OpenFailed(String),
}

/// Camera producer: reads frames, mirrors them and publishes to a frame slot
pub struct CameraTask {
    task: BackgroundTask<CameraExit>,
    frames_read: Arc<AtomicU64>,
}

impl CameraTask {
    /// Spawn the camera thread; the device is opened on that thread
    pub fn start(
        opener: Arc<dyn CameraOpener>,
        slot: FrameSlot,
        event_bus: EventBus,
        read_retry: Duration,
    ) -> Result<Self> {
        let frames_read = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&frames_read);

        let task = BackgroundTask::spawn("camera", move |token| {
            let mut source = match opener.open() {
                Ok(source) => source,
                Err(e) => {
                    error!("Failed to open camera: {}", e);
                    event_bus.publish(PipelineEvent::CameraStatusChanged { connected: false });
                    return CameraExit::OpenFailed(e.to_string());
                }
            };

            event_bus.publish(PipelineEvent::CameraStatusChanged { connected: true });
            info!("Camera capture loop started");

            while !token.is_cancelled() {
                match source.read_frame() {
                    Ok(frame) => {
                        let frame = frame.mirrored();
                        counter.fetch_add(1, Ordering::Relaxed);
                        slot.publish(frame.clone());
                        event_bus.publish(PipelineEvent::FrameReady {
                            source: FrameSource::Camera,
                            frame,
                        });
                    }
                    Err(e) => {
                        warn!("Error reading camera frame: {}", e);
                        std::thread::sleep(read_retry);
                    }
                }
            }

            // Release the device before reporting the exit
            drop(source);
            debug!("Camera released");
            event_bus.publish(PipelineEvent::CameraStatusChanged { connected: false });
            info!("Camera capture loop stopped");
            CameraExit::Stopped
        })?;

        Ok(Self { task, frames_read })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop and wait until the thread has exited and the device is released
    pub fn stop(self) -> Option<CameraExit> {
        info!("Stopping camera capture");
        self.task.stop()
    }
}
