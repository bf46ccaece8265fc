use super::{HandLandmarker, HandLandmarks, Landmark, LANDMARK_COUNT};
use crate::config::LandmarkConfig;
use crate::error::{Result, SignlabError};
use image::RgbImage;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// How the helper should treat consecutive frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// Independent still images (dataset building)
    Static,
    /// A live stream where tracking across frames is allowed
    Video,
}

impl DetectionMode {
    fn as_arg(&self) -> &'static str {
        match self {
            DetectionMode::Static => "static",
            DetectionMode::Video => "video",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    hands: Vec<DetectedHand>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectedHand {
    #[serde(default)]
    handedness: String,
    score: f32,
    landmarks: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

/// Hand detector backed by a MediaPipe helper process.
///
/// Frames go to the helper's stdin as a little-endian `u32` header
/// (width, height, channels) followed by raw RGB bytes; the helper answers
/// each frame with a single JSON line.
pub struct SubprocessLandmarker {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    min_confidence: f32,
}

impl SubprocessLandmarker {
    /// Launch the helper and wait for its `READY` line
    pub fn spawn(config: &LandmarkConfig, mode: DetectionMode) -> Result<Self> {
        info!(
            "Starting hand landmark helper: {} {} ({:?} mode)",
            config.helper_command, config.helper_script, mode
        );

        let mut process = Command::new(&config.helper_command)
            .arg(&config.helper_script)
            .arg("--mode")
            .arg(mode.as_arg())
            .arg("--min-confidence")
            .arg(config.min_detection_confidence.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SignlabError::landmarks(format!("failed to start helper: {}", e)))?;

        let (stdin, stdout) = match (process.stdin.take(), process.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = process.kill();
                return Err(SignlabError::landmarks("helper pipes unavailable"));
            }
        };

        let mut landmarker = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            min_confidence: config.min_detection_confidence,
        };

        let ready = landmarker.read_line()?;
        if ready.trim() != "READY" {
            return Err(SignlabError::landmarks(format!(
                "helper did not signal ready, got: {:?}",
                ready.trim()
            )));
        }

        info!("Hand landmark helper ready");
        Ok(landmarker)
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line)?;
        if read == 0 {
            return Err(SignlabError::landmarks("helper closed its output"));
        }
        Ok(line)
    }

    fn send_frame(&mut self, image: &RgbImage) -> Result<()> {
        let header = [image.width(), image.height(), 3u32];
        for value in header {
            self.stdin.write_all(&value.to_le_bytes())?;
        }
        self.stdin.write_all(image.as_raw())?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl HandLandmarker for SubprocessLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<HandLandmarks>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }

        self.send_frame(image)?;
        let line = self.read_line()?;
        let response = parse_response(&line)?;
        Ok(select_hand(response, self.min_confidence))
    }
}

impl Drop for SubprocessLandmarker {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
        debug!("Hand landmark helper stopped");
    }
}

fn parse_response(line: &str) -> Result<DetectionResponse> {
    serde_json::from_str(line.trim())
        .map_err(|e| SignlabError::landmarks(format!("invalid helper response {:?}: {}", line.trim(), e)))
}

/// First hand at or above the confidence threshold with a full landmark set
fn select_hand(response: DetectionResponse, min_confidence: f32) -> Option<HandLandmarks> {
    if let Some(error) = response.error {
        warn!("Hand landmark helper error: {}", error);
        return None;
    }

    for hand in response.hands {
        if hand.score < min_confidence {
            continue;
        }
        if hand.landmarks.len() != LANDMARK_COUNT {
            warn!(
                "Expected {} landmarks, got {}",
                LANDMARK_COUNT,
                hand.landmarks.len()
            );
            continue;
        }

        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (slot, point) in landmarks.iter_mut().zip(&hand.landmarks) {
            *slot = Landmark {
                x: point.x,
                y: point.y,
                z: point.z,
            };
        }

        debug!(
            "Hand detected: {} (score={:.2}), wrist=({:.3},{:.3})",
            hand.handedness, hand.score, landmarks[0].x, landmarks[0].y
        );
        return Some(HandLandmarks {
            landmarks,
            confidence: hand.score,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(score: f32, points: usize) -> String {
        let landmarks: Vec<String> = (0..points)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0}}"#, i as f32 / 100.0))
            .collect();
        format!(
            r#"{{"handedness":"Right","score":{},"landmarks":[{}]}}"#,
            score,
            landmarks.join(",")
        )
    }

    #[test]
    fn test_parse_and_select_hand() {
        let line = format!(r#"{{"hands":[{}]}}"#, hand_json(0.8, 21));
        let hand = select_hand(parse_response(&line).unwrap(), 0.3).unwrap();

        assert_eq!(hand.confidence, 0.8);
        assert!((hand.landmarks[20].x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_low_confidence_is_no_hand() {
        let line = format!(r#"{{"hands":[{}]}}"#, hand_json(0.2, 21));
        assert!(select_hand(parse_response(&line).unwrap(), 0.3).is_none());
    }

    #[test]
    fn test_skips_incomplete_hand() {
        let line = format!(
            r#"{{"hands":[{},{}]}}"#,
            hand_json(0.9, 5),
            hand_json(0.7, 21)
        );
        let hand = select_hand(parse_response(&line).unwrap(), 0.3).unwrap();
        assert_eq!(hand.confidence, 0.7);
    }

    #[test]
    fn test_helper_error_is_no_hand() {
        let response = parse_response(r#"{"hands":[],"error":"decode failed"}"#).unwrap();
        assert!(select_hand(response, 0.0).is_none());
    }

    #[test]
    fn test_invalid_response() {
        assert!(matches!(
            parse_response("not json"),
            Err(SignlabError::Landmarks { .. })
        ));
    }

    #[test]
    fn test_spawn_missing_helper() {
        let config = LandmarkConfig {
            helper_command: "/nonexistent/signlab-helper".to_string(),
            helper_script: "hand_detect.py".to_string(),
            min_detection_confidence: 0.3,
        };
        assert!(SubprocessLandmarker::spawn(&config, DetectionMode::Static).is_err());
    }
}
