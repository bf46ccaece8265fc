use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use crate::frame::Frame;

#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer::prelude::*;
#[cfg(all(feature = "camera", target_os = "linux"))]
use tracing::info;

/// An opened video device producing RGB frames
pub trait VideoSource: Send {
    /// Read the next frame; errors are transient read failures
    fn read_frame(&mut self) -> Result<Frame>;
}

/// Opens the video device; only one opened source should exist at a time
pub trait CameraOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn VideoSource>>;
}

/// The default webcam, captured through GStreamer on Linux
pub struct DeviceCameraOpener {
    config: CameraConfig,
}

impl DeviceCameraOpener {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

impl CameraOpener for DeviceCameraOpener {
    #[cfg(all(feature = "camera", target_os = "linux"))]
    fn open(&self) -> Result<Box<dyn VideoSource>> {
        let camera = GstCamera::open(&self.config)?;
        Ok(Box::new(camera))
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    fn open(&self) -> Result<Box<dyn VideoSource>> {
        Err(CameraError::DeviceOpen {
            index: self.config.index,
            details: "webcam capture requires the `camera` feature on Linux".to_string(),
        }
        .into())
    }
}

/// GStreamer pipeline delivering raw RGB frames to an appsink
#[cfg(all(feature = "camera", target_os = "linux"))]
pub struct GstCamera {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_counter: u64,
}

#[cfg(all(feature = "camera", target_os = "linux"))]
impl GstCamera {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let device_error = |details: String| CameraError::DeviceOpen {
            index: config.index,
            details,
        };

        gstreamer::init().map_err(|e| device_error(format!("failed to initialize GStreamer: {}", e)))?;

        let pipeline_desc = build_pipeline_string(config);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| device_error(format!("failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| device_error("failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| device_error("pipeline has no appsink".to_string()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| device_error("failed to downcast to AppSink".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| device_error(format!("failed to start pipeline: {}", e)))?;

        info!("Video device {} opened", config.index);
        Ok(Self {
            pipeline,
            appsink,
            frame_counter: 0,
        })
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_pipeline_string(config: &CameraConfig) -> String {
    let (width, height) = config.resolution;
    format!(
        "v4l2src device=/dev/video{} ! videoconvert ! videoscale ! \
         video/x-raw,format=RGB,width={},height={} ! \
         appsink name=sink sync=false max-buffers=1 drop=true",
        config.index, width, height
    )
}

#[cfg(all(feature = "camera", target_os = "linux"))]
impl VideoSource for GstCamera {
    fn read_frame(&mut self) -> Result<Frame> {
        let read_error = |details: String| CameraError::FrameRead { details };

        let sample = self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(500))
            .ok_or_else(|| read_error("no sample within 500ms".to_string()))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| read_error("no buffer in sample".to_string()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| read_error("no caps in sample".to_string()))?;
        let info = gstreamer_video::VideoInfo::from_caps(caps)
            .map_err(|e| read_error(format!("failed to get video info: {}", e)))?;
        let map = buffer
            .map_readable()
            .map_err(|e| read_error(format!("failed to map buffer: {}", e)))?;

        let width = info.width();
        let height = info.height();
        let stride = info.stride()[0] as usize;
        let row_bytes = width as usize * 3;
        let data = map.as_slice();

        // RGB rows may carry alignment padding
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let row_data = data
                .get(start..start + row_bytes)
                .ok_or_else(|| read_error("buffer shorter than frame".to_string()))?;
            pixels.extend_from_slice(row_data);
        }

        let image = image::RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| read_error("invalid RGB frame size".to_string()))?;

        self.frame_counter += 1;
        Ok(Frame::new(
            self.frame_counter,
            std::time::SystemTime::now(),
            image,
        ))
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
impl Drop for GstCamera {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        info!("Video device released");
    }
}
