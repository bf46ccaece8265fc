//! Hand landmarks, the detector seam and the feature vector derived from them.
//!
//! Landmark coordinates follow the MediaPipe hand model: `x`/`y` normalised to
//! the image width/height, `z` a relative depth with the wrist as origin.

mod mock;
mod subprocess;

pub use mock::MockLandmarker;
pub use subprocess::{DetectionMode, SubprocessLandmarker};

use crate::error::Result;
use image::RgbImage;

/// Number of landmarks per detected hand
pub const LANDMARK_COUNT: usize = 21;

/// Length of the wrist-relative feature vector
pub const FEATURE_COUNT: usize = LANDMARK_COUNT * 3;

/// Index of the wrist landmark
pub const WRIST: usize = 0;

/// Landmark pairs joined when drawing the hand skeleton: five fingers, then the palm
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (9, 10), (10, 11), (11, 12),
    (13, 14), (14, 15), (15, 16),
    (0, 17), (17, 18), (18, 19), (19, 20),
    (5, 9), (9, 13), (13, 17),
];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// The 21 landmarks of one detected hand
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub landmarks: [Landmark; LANDMARK_COUNT],
    pub confidence: f32,
}

impl HandLandmarks {
    /// Features relative to the wrist, ordered `x0,y0,z0,...,x20,y20,z20`
    pub fn wrist_relative_features(&self) -> Vec<f32> {
        let base = self.landmarks[WRIST];
        let mut features = Vec::with_capacity(FEATURE_COUNT);
        for lm in &self.landmarks {
            features.push(lm.x - base.x);
            features.push(lm.y - base.y);
            features.push(lm.z - base.z);
        }
        features
    }

    /// Landmark positions in pixels for an image of the given size
    pub fn pixel_points(&self, width: u32, height: u32) -> [(f32, f32); LANDMARK_COUNT] {
        self.landmarks
            .map(|lm| (lm.x * width as f32, lm.y * height as f32))
    }

    /// Pixel bounding box of the landmarks in an image of the given size
    pub fn bounding_box(&self, width: u32, height: u32) -> BoundingBox {
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for lm in &self.landmarks {
            min_x = min_x.min(lm.x);
            min_y = min_y.min(lm.y);
            max_x = max_x.max(lm.x);
            max_y = max_y.max(lm.y);
        }

        BoundingBox {
            x1: (min_x * width as f32) as i32,
            y1: (min_y * height as f32) as i32,
            x2: (max_x * width as f32) as i32,
            y2: (max_y * height as f32) as i32,
        }
    }
}

/// Axis-aligned box in pixel coordinates, corners inclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Column names of the feature table, label excluded
pub fn feature_columns() -> Vec<String> {
    (0..LANDMARK_COUNT)
        .flat_map(|i| ["x", "y", "z"].map(|axis| format!("{}{}", axis, i)))
        .collect()
}

/// Detects at most one hand in an RGB image
pub trait HandLandmarker: Send {
    /// `Ok(None)` when no hand is found
    fn detect(&mut self, image: &RgbImage) -> Result<Option<HandLandmarks>>;
}

impl<T: HandLandmarker + ?Sized> HandLandmarker for Box<T> {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<HandLandmarks>> {
        (**self).detect(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_with(f: impl Fn(usize) -> Landmark) -> HandLandmarks {
        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            *lm = f(i);
        }
        HandLandmarks {
            landmarks,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_feature_columns_order() {
        let columns = feature_columns();
        assert_eq!(columns.len(), FEATURE_COUNT);
        assert_eq!(&columns[..4], &["x0", "y0", "z0", "x1"]);
        assert_eq!(columns.last().unwrap(), "z20");
    }

    #[test]
    fn test_wrist_relative_features() {
        let hand = hand_with(|i| Landmark {
            x: 0.5 + i as f32 * 0.01,
            y: 0.25,
            z: -(i as f32),
        });
        let features = hand.wrist_relative_features();

        assert_eq!(features.len(), FEATURE_COUNT);
        assert_eq!(&features[..3], &[0.0, 0.0, 0.0]);
        assert!((features[3] - 0.01).abs() < 1e-6);
        assert_eq!(features[4], 0.0);
        assert_eq!(features[FEATURE_COUNT - 1], -20.0);
    }

    #[test]
    fn test_features_are_translation_invariant() {
        let hand = hand_with(|i| Landmark {
            x: 0.1 * i as f32 / 20.0,
            y: 0.2,
            z: 0.0,
        });
        let shifted = hand_with(|i| Landmark {
            x: 0.1 * i as f32 / 20.0 + 0.5,
            y: 0.7,
            z: 0.0,
        });

        for (a, b) in hand
            .wrist_relative_features()
            .iter()
            .zip(shifted.wrist_relative_features())
        {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bounding_box() {
        let hand = hand_with(|i| Landmark {
            x: 0.25 + 0.25 * (i % 2) as f32,
            y: 0.5 + 0.25 * (i % 3) as f32 / 2.0,
            z: 0.0,
        });
        let bbox = hand.bounding_box(200, 100);
        assert_eq!(bbox, BoundingBox { x1: 50, y1: 50, x2: 100, y2: 75 });
    }
}
