pub mod device;
mod preview;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "webcam")]
pub mod webcam;

pub use device::{StreamConstraints, VideoDevice, VideoStream};
pub use session::{CaptureSession, CaptureStatus};

#[cfg(feature = "webcam")]
pub use webcam::{list_cameras, CameraDescriptor, WebcamDevice};
