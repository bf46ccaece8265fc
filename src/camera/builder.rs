use super::interface::{CameraOpener, DeviceCameraOpener};
use super::synthetic::SyntheticCameraOpener;
use crate::config::CameraConfig;
use crate::error::{Result, SignlabError};
use std::sync::Arc;

/// Builder selecting the frame source for the pipelines
pub struct CameraOpenerBuilder {
    config: Option<CameraConfig>,
    synthetic: bool,
}

impl CameraOpenerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            synthetic: false,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use generated frames instead of the webcam
    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn build(self) -> Result<Arc<dyn CameraOpener>> {
        let config = self
            .config
            .ok_or_else(|| SignlabError::system("Camera configuration must be specified"))?;

        if self.synthetic {
            let (width, height) = config.resolution;
            Ok(Arc::new(SyntheticCameraOpener::new(width, height, config.fps)))
        } else {
            Ok(Arc::new(DeviceCameraOpener::new(config)))
        }
    }
}

impl Default for CameraOpenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
