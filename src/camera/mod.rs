mod builder;
mod interface;
mod synthetic;
mod task;
#[cfg(test)]
mod tests;

pub use builder::CameraOpenerBuilder;
pub use interface::{CameraOpener, DeviceCameraOpener, VideoSource};
pub use synthetic::{SyntheticCamera, SyntheticCameraOpener};
pub use task::{CameraExit, CameraTask};
