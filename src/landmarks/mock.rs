use super::{HandLandmarker, HandLandmarks, Landmark, LANDMARK_COUNT};
use crate::error::Result;
use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic detector for tests and offline runs.
///
/// Landmarks are derived from the mean colour of the image, so images of
/// different colours give separable features. Images darker than the
/// threshold report no hand.
#[derive(Clone)]
pub struct MockLandmarker {
    darkness_threshold: f32,
    calls: Arc<AtomicUsize>,
}

impl MockLandmarker {
    pub fn new() -> Self {
        Self {
            darkness_threshold: 16.0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `detect` calls across all clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn mean_color(image: &RgbImage) -> [f32; 3] {
        let mut sums = [0f64; 3];
        for pixel in image.pixels() {
            for (sum, value) in sums.iter_mut().zip(pixel.0) {
                *sum += value as f64;
            }
        }
        let count = (image.width() as f64 * image.height() as f64).max(1.0);
        sums.map(|s| (s / count) as f32)
    }
}

impl Default for MockLandmarker {
    fn default() -> Self {
        Self::new()
    }
}

impl HandLandmarker for MockLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<HandLandmarks>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let [r, g, b] = Self::mean_color(image);
        if (r + g + b) / 3.0 < self.darkness_threshold {
            return Ok(None);
        }

        let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            let step = i as f32 / LANDMARK_COUNT as f32;
            *lm = Landmark {
                x: 0.3 + step * (0.1 + 0.3 * r),
                y: 0.3 + step * (0.1 + 0.3 * g),
                z: -step * b * 0.1,
            };
        }

        Ok(Some(HandLandmarks {
            landmarks,
            confidence: 0.95,
        }))
    }
}
