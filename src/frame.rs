use image::{imageops, RgbImage};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Camera frame: decoded RGB pixels plus capture metadata
#[derive(Clone)]
pub struct Frame {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Pixel data (shared ownership, frames fan out to several consumers)
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        Self {
            id,
            timestamp,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Horizontally mirrored copy keeping id and timestamp
    pub fn mirrored(&self) -> Self {
        Self {
            id: self.id,
            timestamp: self.timestamp,
            image: Arc::new(mirror(&self.image)),
        }
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("timestamp", &self.timestamp)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Horizontal flip (left/right mirror)
pub fn mirror(image: &RgbImage) -> RgbImage {
    imageops::flip_horizontal(image)
}
