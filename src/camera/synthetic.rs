use super::interface::{CameraOpener, VideoSource};
use crate::error::{CameraError, Result};
use crate::frame::Frame;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::trace;

/// Generated frames for demos and tests, paced like a real device
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    fail_every: Option<u64>,
    reads: u64,
    frame_counter: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::from_millis(1000 / fps.max(1) as u64),
            fail_every: None,
            reads: 0,
            frame_counter: 0,
        }
    }

    /// Make every n-th read fail with a transient read error
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    fn render(&self, frame_id: u64) -> RgbImage {
        // Diagonal bands that move one pixel per frame; asymmetric so mirroring is visible
        let shift = frame_id as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let band = ((x + shift) / 8 + y / 16) as u8;
            Rgb([band.wrapping_mul(37), (x * 255 / self.width.max(1)) as u8, (y % 256) as u8])
        })
    }
}

impl VideoSource for SyntheticCamera {
    fn read_frame(&mut self) -> Result<Frame> {
        self.reads += 1;
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }

        if let Some(n) = self.fail_every {
            if self.reads % n == 0 {
                return Err(CameraError::FrameRead {
                    details: format!("synthetic read failure #{}", self.reads),
                }
                .into());
            }
        }

        self.frame_counter += 1;
        trace!("Generated synthetic frame {}", self.frame_counter);
        Ok(Frame::new(
            self.frame_counter,
            SystemTime::now(),
            self.render(self.frame_counter),
        ))
    }
}

/// Opener handing out synthetic cameras; can simulate a missing device
#[derive(Clone)]
pub struct SyntheticCameraOpener {
    width: u32,
    height: u32,
    fps: u32,
    available: bool,
    fail_every: Option<u64>,
    opened: Arc<AtomicUsize>,
}

impl SyntheticCameraOpener {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            available: true,
            fail_every: None,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opener whose device never opens
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(1, 1, 1)
        }
    }

    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n);
        self
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl CameraOpener for SyntheticCameraOpener {
    fn open(&self) -> Result<Box<dyn VideoSource>> {
        if !self.available {
            return Err(CameraError::DeviceOpen {
                index: 0,
                details: "synthetic device unavailable".to_string(),
            }
            .into());
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let mut camera = SyntheticCamera::new(self.width, self.height, self.fps);
        if let Some(n) = self.fail_every {
            camera = camera.failing_every(n);
        }
        Ok(Box::new(camera))
    }
}
