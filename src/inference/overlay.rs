use crate::config::InferenceConfig;
use crate::landmarks::{BoundingBox, HandLandmarks, HAND_CONNECTIONS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::fs;
use tracing::{debug, warn};

/// Gap between the label baseline area and the box
const LABEL_MARGIN: i32 = 10;

/// Skeleton colours
pub const CONNECTION_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const LANDMARK_RADIUS: i32 = 2;

/// Draws the hand box and the prediction label onto frames
pub struct PredictionOverlay {
    font: Option<Font<'static>>,
    font_size: f32,
    thickness: u32,
}

impl PredictionOverlay {
    /// Load the label font; without it only boxes are drawn
    pub fn from_config(config: &InferenceConfig) -> Self {
        let font = match fs::read(&config.font_path) {
            Ok(data) => match Font::try_from_vec(data) {
                Some(font) => Some(font),
                None => {
                    warn!("Failed to parse font file '{}', labels disabled", config.font_path);
                    None
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read font file '{}': {}, labels disabled",
                    config.font_path, e
                );
                None
            }
        };

        Self {
            font,
            font_size: config.font_size,
            thickness: config.box_thickness.max(1),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Hand connections as lines, then a dot on every landmark
    pub fn draw_skeleton(&self, image: &mut RgbImage, hand: &HandLandmarks) {
        let points = hand.pixel_points(image.width(), image.height());
        for (from, to) in HAND_CONNECTIONS {
            draw_line_segment_mut(image, points[from], points[to], CONNECTION_COLOR);
        }
        for (x, y) in points {
            draw_filled_circle_mut(image, (x as i32, y as i32), LANDMARK_RADIUS, LANDMARK_COLOR);
        }
    }

    /// Box around `bbox` with `text` above it, clipped to the image
    pub fn annotate(&self, image: &mut RgbImage, bbox: BoundingBox, text: &str, color: Rgb<u8>) {
        let (width, height) = (image.width() as i32, image.height() as i32);
        if width == 0 || height == 0 {
            return;
        }

        let x1 = bbox.x1.clamp(0, width - 1);
        let y1 = bbox.y1.clamp(0, height - 1);
        let x2 = bbox.x2.clamp(x1, width - 1);
        let y2 = bbox.y2.clamp(y1, height - 1);

        // Nested one-pixel rectangles, growing inwards
        for inset in 0..self.thickness as i32 {
            let w = x2 - x1 + 1 - 2 * inset;
            let h = y2 - y1 + 1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        let Some(font) = &self.font else {
            return;
        };
        let scale = Scale::uniform(self.font_size);
        let (_, text_height) = text_size(scale, font, text);
        let text_y = (y1 - LABEL_MARGIN - text_height).max(0);
        draw_text_mut(image, color, x1, text_y, scale, font, text);
        debug!("Drew label '{}' at ({}, {})", text, x1, text_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_without_font(thickness: u32) -> PredictionOverlay {
        PredictionOverlay::from_config(&InferenceConfig {
            font_path: "/nonexistent/font.ttf".to_string(),
            font_size: 24.0,
            box_thickness: thickness,
        })
    }

    #[test]
    fn test_missing_font_draws_box_only() {
        let overlay = overlay_without_font(2);
        assert!(!overlay.has_font());

        let mut image = RgbImage::new(40, 30);
        let color = Rgb([0, 255, 0]);
        overlay.annotate(
            &mut image,
            BoundingBox { x1: 10, y1: 5, x2: 30, y2: 25 },
            "A (0.90)",
            color,
        );

        assert_eq!(*image.get_pixel(10, 5), color);
        assert_eq!(*image.get_pixel(11, 6), color);
        assert_eq!(*image.get_pixel(30, 25), color);
        assert_eq!(*image.get_pixel(20, 15), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_skeleton_joins_landmarks() {
        use crate::landmarks::{Landmark, LANDMARK_COUNT};

        // Wrist and thumb base apart, every other landmark in the far corner
        let mut landmarks = [Landmark { x: 0.9, y: 0.9, z: 0.0 }; LANDMARK_COUNT];
        landmarks[0] = Landmark { x: 0.1, y: 0.5, z: 0.0 };
        landmarks[1] = Landmark { x: 0.5, y: 0.5, z: 0.0 };
        let hand = HandLandmarks {
            landmarks,
            confidence: 0.9,
        };

        let mut image = RgbImage::new(100, 100);
        overlay_without_font(1).draw_skeleton(&mut image, &hand);

        assert_eq!(*image.get_pixel(10, 50), LANDMARK_COLOR);
        assert_eq!(*image.get_pixel(50, 50), LANDMARK_COLOR);
        assert_eq!(*image.get_pixel(90, 90), LANDMARK_COLOR);
        assert_eq!(*image.get_pixel(30, 50), CONNECTION_COLOR);
        assert_eq!(*image.get_pixel(30, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_box_is_clipped() {
        let overlay = overlay_without_font(4);
        let mut image = RgbImage::new(20, 20);
        let color = Rgb([255, 0, 0]);
        overlay.annotate(
            &mut image,
            BoundingBox { x1: -15, y1: -3, x2: 50, y2: 8 },
            "B",
            color,
        );

        assert_eq!(*image.get_pixel(0, 0), color);
        assert_eq!(*image.get_pixel(19, 8), color);
        assert_eq!(*image.get_pixel(10, 19), Rgb([0, 0, 0]));
    }
}
