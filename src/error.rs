//! Failure taxonomy for the capture -> analyze flow.
//!
//! Every error here carries its technical cause in `Display` for the logs and a
//! fixed `user_message()` for the presentation layer. Raw technical text never
//! crosses the command boundary; see [`user_message`].

use thiserror::Error;

pub const ACQUISITION_FAILED: &str = "The selected image could not be read.";
pub const ANALYSIS_FAILED: &str = "Unable to analyze the image. Please try again.";
pub const CAMERA_PERMISSION: &str = "Unable to access the camera. Check your permissions.";
pub const CAMERA_NOT_FOUND: &str = "No camera was found on this device.";
pub const CAMERA_BUSY: &str = "The camera is already in use by another application.";
pub const UNEXPECTED: &str = "Something went wrong. Please try again.";

/// Local file or frame could not be turned into an [`crate::models::EncodedImage`].
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to read image source: {0}")]
    Read(#[from] std::io::Error),
    #[error("image source is empty")]
    Empty,
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    MalformedFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("invalid encoded payload: {0}")]
    Payload(String),
}

impl AcquisitionError {
    pub fn user_message(&self) -> &'static str {
        ACQUISITION_FAILED
    }
}

/// Camera permission or hardware failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceAccessError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("no video input device available")]
    NotFound,
    #[error("camera busy: {0}")]
    Busy(String),
    #[error("camera stream failed: {0}")]
    Stream(String),
}

impl DeviceAccessError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DeviceAccessError::NotFound => CAMERA_NOT_FOUND,
            DeviceAccessError::Busy(_) => CAMERA_BUSY,
            DeviceAccessError::PermissionDenied(_) | DeviceAccessError::Stream(_) => {
                CAMERA_PERMISSION
            }
        }
    }
}

/// Misuse of, or failure inside, a [`crate::camera::CaptureSession`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture session already started")]
    AlreadyStarted,
    #[error("capture session is not streaming")]
    NotStreaming,
    #[error("no frame arrived within {0} ms")]
    FrameTimeout(u64),
    #[error(transparent)]
    Device(#[from] DeviceAccessError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

impl CaptureError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::Device(err) => err.user_message(),
            CaptureError::Acquisition(err) => err.user_message(),
            CaptureError::FrameTimeout(_) => CAMERA_PERMISSION,
            CaptureError::AlreadyStarted | CaptureError::NotStreaming => UNEXPECTED,
        }
    }
}

/// Transport or service-level failure talking to the inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no inference credential configured (set GEMINI_API_KEY)")]
    MissingCredential,
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed inference envelope: {0}")]
    Envelope(String),
}

/// The service answered but the structured result is unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("inference response contained no text")]
    Empty,
    #[error("inference response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("inference response is not a JSON object")]
    NotAnObject,
    #[error("inference response is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("inference response field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Outcome of a failed `analyze` call. Both variants look identical to the user.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AnalysisError {
    pub fn user_message(&self) -> &'static str {
        ANALYSIS_FAILED
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, AnalysisError::Parse(_))
    }
}

/// An event arrived in a phase that has no transition for it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {event} while {phase}")]
pub struct TransitionError {
    pub phase: &'static str,
    pub event: &'static str,
}

impl TransitionError {
    pub fn new(phase: &'static str, event: &'static str) -> Self {
        Self { phase, event }
    }
}

/// Map any orchestration error to the fixed text shown to the user.
pub fn user_message(err: &anyhow::Error) -> String {
    if let Some(err) = err.downcast_ref::<AcquisitionError>() {
        return err.user_message().to_string();
    }
    if let Some(err) = err.downcast_ref::<DeviceAccessError>() {
        return err.user_message().to_string();
    }
    if let Some(err) = err.downcast_ref::<CaptureError>() {
        return err.user_message().to_string();
    }
    if let Some(err) = err.downcast_ref::<AnalysisError>() {
        return err.user_message().to_string();
    }
    if err.downcast_ref::<InferenceError>().is_some() || err.downcast_ref::<ParseError>().is_some()
    {
        return ANALYSIS_FAILED.to_string();
    }
    UNEXPECTED.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_user_message_hides_technical_detail() {
        let err = anyhow::Error::new(AnalysisError::Inference(InferenceError::Status {
            status: 503,
            body: "backend overloaded at node-7".into(),
        }));
        let message = user_message(&err);
        assert_eq!(message, ANALYSIS_FAILED);
        assert!(!message.contains("node-7"));
    }

    #[test]
    fn test_user_message_for_device_errors() {
        let denied = anyhow::Error::new(DeviceAccessError::PermissionDenied("NotAllowed".into()));
        assert_eq!(user_message(&denied), CAMERA_PERMISSION);

        let missing = anyhow::Error::new(CaptureError::Device(DeviceAccessError::NotFound));
        assert_eq!(user_message(&missing), CAMERA_NOT_FOUND);
    }

    #[test]
    fn test_user_message_survives_context() {
        let err = anyhow::Error::new(AcquisitionError::Empty).context("loading upload");
        assert_eq!(user_message(&err), ACQUISITION_FAILED);
    }

    #[test]
    fn test_unknown_error_is_generic() {
        assert_eq!(user_message(&anyhow!("socket 12 closed")), UNEXPECTED);
    }

    #[test]
    fn test_parse_and_inference_share_user_message() {
        let parse = AnalysisError::from(ParseError::MissingField("count"));
        let inference = AnalysisError::from(InferenceError::MissingCredential);
        assert!(parse.is_parse());
        assert!(!inference.is_parse());
        assert_eq!(parse.user_message(), inference.user_message());
    }
}
