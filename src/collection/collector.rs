use super::modes::{CollectionMode, CollectorSettings};
use super::repository::{ImageRepository, SavedPair};
use crate::error::Result;
use crate::events::{EventBus, PipelineEvent};
use crate::frame::Frame;
use crate::frame_slot::FrameSlot;
use crate::task::BackgroundTask;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Poll interval while capturing but no frame has arrived yet
const FRAME_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Capturing,
    Stopped,
}

struct CollectorState {
    run: RunState,
    class_id: u32,
    mode_index: usize,
    count: usize,
    class_complete: bool,
    /// Bumped whenever (class, mode) changes or the mode is reset
    epoch: u64,
    last_save: Option<Instant>,
    current_frame: Option<Frame>,
}

struct Shared {
    state: Mutex<CollectorState>,
    wake: Condvar,
    /// Serialises writes against deletes; always taken before `state`
    io: Mutex<()>,
    settings: CollectorSettings,
    repository: Arc<dyn ImageRepository>,
    slot: FrameSlot,
    event_bus: EventBus,
}

/// Point-in-time view of the collector position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSnapshot {
    pub class_id: u32,
    pub mode: CollectionMode,
    pub count: usize,
    pub target: usize,
    pub capturing: bool,
    pub class_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeProgress {
    pub name: &'static str,
    pub originals: usize,
    pub target: usize,
}

impl ModeProgress {
    pub fn files(&self) -> usize {
        self.originals * 2
    }

    pub fn is_complete(&self) -> bool {
        self.originals >= self.target
    }
}

/// Per-mode progress of one class, read from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStatus {
    pub class_id: u32,
    pub modes: Vec<ModeProgress>,
    pub total_images: usize,
    pub total_needed: usize,
}

impl fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Class {} status ===", self.class_id)?;
        for mode in &self.modes {
            writeln!(
                f,
                "{}: {}/{} originals ({}/{} files)",
                mode.name,
                mode.originals,
                mode.target,
                mode.files(),
                mode.target * 2
            )?;
        }
        write!(
            f,
            "Total images: {}/{} for class {}",
            self.total_images, self.total_needed, self.class_id
        )
    }
}

impl Shared {
    fn mode(&self, state: &CollectorState) -> CollectionMode {
        self.settings.mode(state.mode_index)
    }

    fn count_on_disk(&self, class_id: u32, mode: CollectionMode) -> usize {
        match self.repository.count(class_id, mode.prefix) {
            Ok(count) => count,
            Err(e) => {
                error!(
                    "Failed to count images for class {} mode '{}': {}",
                    class_id, mode.name, e
                );
                0
            }
        }
    }

    fn reseed(&self, state: &mut CollectorState) {
        let mode = self.mode(state);
        state.count = self.count_on_disk(state.class_id, mode);
        info!(
            "Class {} mode '{}' has {} existing images",
            state.class_id, mode.name, state.count
        );
    }

    fn publish_status(&self, state: &CollectorState) {
        self.event_bus.publish(PipelineEvent::CaptureStatus {
            class_id: state.class_id,
            mode: self.mode(state).name.to_string(),
            count: state.count,
            target: self.settings.target,
            capturing: state.run == RunState::Capturing,
        });
    }

    fn pause(&self, state: &mut CollectorState) {
        if state.run == RunState::Capturing {
            state.run = RunState::Idle;
            info!("Capture stopped");
        }
    }

    fn class_status(&self, class_id: u32) -> Result<ClassStatus> {
        let mut modes = Vec::with_capacity(self.settings.modes.len());
        for mode in &self.settings.modes {
            modes.push(ModeProgress {
                name: mode.name,
                originals: self.repository.count(class_id, mode.prefix)?,
                target: self.settings.target,
            });
        }
        let total_images = modes.iter().map(ModeProgress::files).sum();

        Ok(ClassStatus {
            class_id,
            modes,
            total_images,
            total_needed: self.settings.total_needed(),
        })
    }

    /// Target reached: pause, then advance to the next mode or finish the class
    fn complete_mode(&self, state: &mut CollectorState) {
        let mode = self.mode(state);
        self.pause(state);
        info!("Mode '{}' completed for class {}", mode.name, state.class_id);
        self.event_bus.publish(PipelineEvent::ModeCompleted {
            class_id: state.class_id,
            mode: mode.name.to_string(),
        });

        if state.mode_index + 1 < self.settings.modes.len() {
            state.mode_index += 1;
            state.epoch += 1;
            self.reseed(state);
            info!("Switched to mode '{}'", self.mode(state).name);
        } else {
            state.class_complete = true;
            let total_images = match self.class_status(state.class_id) {
                Ok(status) => status.total_images,
                Err(e) => {
                    error!("Failed to total images for class {}: {}", state.class_id, e);
                    0
                }
            };
            info!(
                "All modes completed for class {} ({} images); press 'n' for the next class",
                state.class_id, total_images
            );
            self.event_bus.publish(PipelineEvent::ClassCompleted {
                class_id: state.class_id,
                total_images,
            });
        }
        self.publish_status(state);
    }

    /// Encode and write one pair with the state lock released.
    ///
    /// Returns `None` when capture was stopped or the position moved before the write began.
    fn write_frame(
        &self,
        epoch: u64,
        class_id: u32,
        mode: CollectionMode,
        frame: &Frame,
    ) -> Option<Result<SavedPair>> {
        let _io = self.io.lock();
        {
            let state = self.state.lock();
            if state.epoch != epoch || state.run != RunState::Capturing {
                return None;
            }
        }
        Some(self.repository.save_pair(class_id, mode.prefix, &frame.image))
    }

    fn record_save(
        &self,
        state: &mut CollectorState,
        epoch: u64,
        frame: &Frame,
        saved: Option<Result<SavedPair>>,
    ) {
        match saved {
            None => debug!("Capture moved on before frame {} was written", frame.id),
            // Best effort: the loop keeps capturing and the next frame is tried after the cooldown
            Some(Err(e)) => error!("Failed to save image: {}", e),
            Some(Ok(saved)) if state.epoch != epoch => debug!(
                "Frame {} saved as #{} after the position changed",
                frame.id, saved.sequence
            ),
            Some(Ok(saved)) => {
                state.count += 1;
                debug!(
                    "Saved frame {} as #{} ({}/{})",
                    frame.id, saved.sequence, state.count, self.settings.target
                );
                self.publish_status(state);
                if state.count >= self.settings.target {
                    self.complete_mode(state);
                }
            }
        }
    }

    /// Capture loop: blocks while idle, saves the latest frame at most once per cooldown
    fn run(&self, token: &tokio_util::sync::CancellationToken) {
        let mut state = self.state.lock();
        info!(
            "Collector started at class {} mode '{}' ({} images)",
            state.class_id,
            self.mode(&state).name,
            state.count
        );
        self.publish_status(&state);

        loop {
            if token.is_cancelled() {
                break;
            }
            match state.run {
                RunState::Stopped => break,
                RunState::Idle => {
                    self.wake.wait(&mut state);
                    continue;
                }
                RunState::Capturing => {}
            }

            if let Some(last) = state.last_save {
                let elapsed = last.elapsed();
                if elapsed < self.settings.cooldown {
                    self.wake
                        .wait_for(&mut state, self.settings.cooldown - elapsed);
                    continue;
                }
            }

            if let Some(frame) = self.slot.take_latest() {
                state.current_frame = Some(frame);
            }
            let Some(frame) = state.current_frame.clone() else {
                debug!("Waiting for a camera frame");
                self.wake.wait_for(&mut state, FRAME_WAIT);
                continue;
            };

            let (epoch, class_id, mode) = (state.epoch, state.class_id, self.mode(&state));
            let saved = MutexGuard::unlocked(&mut state, || {
                self.write_frame(epoch, class_id, mode, &frame)
            });
            state.last_save = Some(Instant::now());
            self.record_save(&mut state, epoch, &frame, saved);
        }

        state.run = RunState::Stopped;
        info!("Collector stopped");
    }
}

/// Capture/processing task with synchronous, lock-protected controls
pub struct Collector {
    shared: Arc<Shared>,
    task: Option<BackgroundTask<()>>,
}

impl Collector {
    /// Seed position from storage (class 0, first mode) and start the processing thread
    pub fn start(
        settings: CollectorSettings,
        repository: Arc<dyn ImageRepository>,
        slot: FrameSlot,
        event_bus: EventBus,
    ) -> Result<Self> {
        if settings.modes.is_empty() {
            return Err(crate::error::SignlabError::system(
                "Collector needs at least one collection mode",
            ));
        }

        let first = settings.modes[0];
        repository.ensure_class(0)?;
        let count = repository.count(0, first.prefix)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(CollectorState {
                run: RunState::Idle,
                class_id: 0,
                mode_index: 0,
                count,
                class_complete: false,
                epoch: 0,
                last_save: None,
                current_frame: None,
            }),
            wake: Condvar::new(),
            io: Mutex::new(()),
            settings,
            repository,
            slot,
            event_bus,
        });

        let worker = Arc::clone(&shared);
        let task = BackgroundTask::spawn("collector", move |token| worker.run(&token))?;

        Ok(Self {
            shared,
            task: Some(task),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.shared.state.lock()
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        let state = self.lock();
        CollectorSnapshot {
            class_id: state.class_id,
            mode: self.shared.mode(&state),
            count: state.count,
            target: self.shared.settings.target,
            capturing: state.run == RunState::Capturing,
            class_complete: state.class_complete,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().run == RunState::Capturing
    }

    /// Arm capture and wake the processing thread.
    ///
    /// Refused when the current mode already holds the target count.
    pub fn start_capture(&self) -> bool {
        let mut state = self.lock();
        if state.run != RunState::Idle {
            return state.run == RunState::Capturing;
        }

        let mode = self.shared.mode(&state);
        if state.count >= self.shared.settings.target {
            warn!(
                "Mode '{}' of class {} already has {}/{} images; switch mode or class first",
                mode.name, state.class_id, state.count, self.shared.settings.target
            );
            return false;
        }

        state.run = RunState::Capturing;
        state.last_save = Some(Instant::now());
        self.shared.wake.notify_all();
        info!("Capture started for class {} mode '{}'", state.class_id, mode.name);
        self.shared.publish_status(&state);
        true
    }

    pub fn stop_capture(&self) {
        let mut state = self.lock();
        self.shared.pause(&mut state);
        self.shared.publish_status(&state);
    }

    /// Start when idle, stop when capturing; returns whether capture is now on
    pub fn toggle_capture(&self) -> bool {
        if self.is_capturing() {
            self.stop_capture();
            false
        } else {
            self.start_capture()
        }
    }

    /// Advance to the next mode, wrapping after the last one
    pub fn next_mode(&self) {
        let mut state = self.lock();
        self.shared.pause(&mut state);
        state.mode_index = (state.mode_index + 1) % self.shared.settings.modes.len();
        state.epoch += 1;
        info!("Switched to mode '{}'", self.shared.mode(&state).name);
        self.shared.reseed(&mut state);
        self.shared.publish_status(&state);
    }

    pub fn next_class(&self) {
        let mut state = self.lock();
        self.shared.pause(&mut state);
        state.class_id += 1;
        self.enter_class(&mut state);
    }

    /// Go back one class; no-op with a warning at class 0
    pub fn prev_class(&self) {
        let mut state = self.lock();
        self.shared.pause(&mut state);
        if state.class_id == 0 {
            warn!("Already at class 0, cannot go to a previous class");
            self.shared.publish_status(&state);
            return;
        }
        state.class_id -= 1;
        self.enter_class(&mut state);
    }

    fn enter_class(&self, state: &mut CollectorState) {
        state.mode_index = 0;
        state.class_complete = false;
        state.epoch += 1;
        if let Err(e) = self.shared.repository.ensure_class(state.class_id) {
            error!("Failed to create directory for class {}: {}", state.class_id, e);
        }
        info!("Switched to class {}", state.class_id);
        self.shared.reseed(state);
        self.shared.publish_status(state);
    }

    /// Delete every image of the current (class, mode); irreversible
    pub fn reset_current_mode(&self) -> Result<usize> {
        let _io = self.shared.io.lock();
        let mut state = self.lock();
        self.shared.pause(&mut state);
        let mode = self.shared.mode(&state);

        let deleted = self
            .shared
            .repository
            .delete_all(state.class_id, mode.prefix)?;
        state.count = 0;
        state.class_complete = false;
        state.epoch += 1;
        warn!(
            "Deleted all {} files of mode '{}' in class {}",
            deleted, mode.name, state.class_id
        );
        self.shared.publish_status(&state);
        Ok(deleted)
    }

    /// Progress of the current class against the per-mode target
    pub fn status(&self) -> Result<ClassStatus> {
        let state = self.lock();
        self.shared.class_status(state.class_id)
    }

    /// Stop the processing thread and wait for it to exit
    pub fn shutdown(mut self) {
        self.request_stop();
        if let Some(task) = self.task.take() {
            task.join();
        }
    }

    fn request_stop(&self) {
        let mut state = self.lock();
        state.run = RunState::Stopped;
        self.shared.wake.notify_all();
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.request_stop();
        }
    }
}
