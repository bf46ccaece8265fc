use super::collector::Collector;
use super::modes::CollectorSettings;
use super::repository::ImageRepository;
use crate::camera::{CameraOpener, CameraTask};
use crate::error::Result;
use crate::events::EventBus;
use crate::frame_slot::FrameSlot;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Camera producer plus collector consumer joined by a last-frame-wins slot
pub struct CapturePipeline {
    camera: CameraTask,
    collector: Collector,
    slot: FrameSlot,
}

impl CapturePipeline {
    pub fn start(
        opener: Arc<dyn CameraOpener>,
        repository: Arc<dyn ImageRepository>,
        settings: CollectorSettings,
        event_bus: EventBus,
        read_retry: Duration,
    ) -> Result<Self> {
        let slot = FrameSlot::new();
        let collector = Collector::start(settings, repository, slot.clone(), event_bus.clone())?;
        let camera = CameraTask::start(opener, slot.clone(), event_bus, read_retry)?;

        info!("Capture pipeline started");
        Ok(Self {
            camera,
            collector,
            slot,
        })
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    /// True once the camera thread has exited on its own (e.g. the device failed to open)
    pub fn camera_finished(&self) -> bool {
        self.camera.is_finished()
    }

    /// Stop the collector, then the camera; returns once both threads have exited
    pub fn shutdown(self) {
        info!("Shutting down capture pipeline");
        let stats = self.slot.stats();
        self.collector.shutdown();
        self.camera.stop();
        info!(
            "Capture pipeline stopped ({} frames published, {} dropped)",
            stats.frames_published, stats.frames_dropped
        );
    }
}
