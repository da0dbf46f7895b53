use async_trait::async_trait;

use crate::error::DeviceAccessError;
use crate::models::Frame;
use crate::settings::Facing;

/// What is asked of the platform when opening a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Facing,
    /// Always false; kept explicit so backends never open a microphone.
    pub audio: bool,
}

impl StreamConstraints {
    pub fn video_only(facing: Facing) -> Self {
        Self {
            facing,
            audio: false,
        }
    }
}

/// A source of camera streams (the platform's media devices).
#[async_trait]
pub trait VideoDevice: Send + Sync {
    /// Request exclusive access to one video input.
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceAccessError>;
}

/// Exclusive handle on a live camera stream.
///
/// `stop` releases the hardware and must tolerate repeated calls.
#[async_trait]
pub trait VideoStream: Send {
    fn label(&self) -> &str;

    async fn next_frame(&mut self) -> Result<Frame, DeviceAccessError>;

    fn stop(&mut self);
}

const ENVIRONMENT_HINTS: [&str; 3] = ["back", "rear", "environment"];
const USER_HINTS: [&str; 4] = ["front", "user", "facetime", "selfie"];

/// Choose among device names by facing hint, else the first device.
pub fn preferred_index<S: AsRef<str>>(names: &[S], facing: Facing) -> Option<usize> {
    let hints: &[&str] = match facing {
        Facing::Environment => &ENVIRONMENT_HINTS,
        Facing::User => &USER_HINTS,
    };
    names
        .iter()
        .position(|name| {
            let name = name.as_ref().to_lowercase();
            hints.iter().any(|hint| name.contains(hint))
        })
        .or(if names.is_empty() { None } else { Some(0) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_rear_camera() {
        let names = ["FaceTime HD Camera", "Back Ultra Wide Camera"];
        assert_eq!(preferred_index(&names, Facing::Environment), Some(1));
        assert_eq!(preferred_index(&names, Facing::User), Some(0));
    }

    #[test]
    fn test_falls_back_to_first_device() {
        let names = ["USB2.0 HD UVC WebCam", "Integrated Camera"];
        assert_eq!(preferred_index(&names, Facing::Environment), Some(0));
    }

    #[test]
    fn test_no_devices() {
        let names: [&str; 0] = [];
        assert_eq!(preferred_index(&names, Facing::Environment), None);
    }
}
