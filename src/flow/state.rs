use serde::Serialize;
use uuid::Uuid;

use crate::error::TransitionError;
use crate::models::{AnalysisResult, EncodedImage};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PhaseKind {
    Idle,
    Camera,
    Preview,
    Analyzing,
    Result,
    Error,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Idle => "idle",
            PhaseKind::Camera => "camera",
            PhaseKind::Preview => "preview",
            PhaseKind::Analyzing => "analyzing",
            PhaseKind::Result => "result",
            PhaseKind::Error => "error",
        }
    }
}

/// Progress of the camera screen while the session is in `Camera`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CameraStage {
    Requesting,
    Streaming,
    Failed,
}

/// Identifies one analysis request. A completion carrying an older ticket is
/// dropped instead of being applied to whatever the session became since.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTicket {
    pub session_id: Uuid,
    pub attempt: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Camera {
        request: u64,
        stage: CameraStage,
        failure: Option<String>,
    },
    Preview {
        image: EncodedImage,
    },
    Analyzing {
        image: EncodedImage,
        ticket: AnalysisTicket,
    },
    Result {
        image: EncodedImage,
        result: AnalysisResult,
    },
    Error {
        image: EncodedImage,
        message: String,
    },
}

/// The single live capture -> analyze interaction.
///
/// Data lives inside the phase that owns it, so an image outside `Idle`/`Camera`,
/// a result outside `Result` or a message outside `Error` cannot be represented.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    counter: u64,
    phase: Phase,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            counter: 0,
            phase: Phase::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> PhaseKind {
        match self.phase {
            Phase::Idle => PhaseKind::Idle,
            Phase::Camera { .. } => PhaseKind::Camera,
            Phase::Preview { .. } => PhaseKind::Preview,
            Phase::Analyzing { .. } => PhaseKind::Analyzing,
            Phase::Result { .. } => PhaseKind::Result,
            Phase::Error { .. } => PhaseKind::Error,
        }
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        match &self.phase {
            Phase::Preview { image }
            | Phase::Analyzing { image, .. }
            | Phase::Result { image, .. }
            | Phase::Error { image, .. } => Some(image),
            Phase::Idle | Phase::Camera { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.phase {
            Phase::Result { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Error { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn camera_stage(&self) -> Option<CameraStage> {
        match &self.phase {
            Phase::Camera { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn camera_request(&self) -> Option<u64> {
        match &self.phase {
            Phase::Camera { request, .. } => Some(*request),
            _ => None,
        }
    }

    pub fn camera_failure(&self) -> Option<&str> {
        match &self.phase {
            Phase::Camera { failure, .. } => failure.as_deref(),
            _ => None,
        }
    }

    fn next_counter(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn rejected(&self, event: &'static str) -> TransitionError {
        TransitionError::new(self.phase().as_str(), event)
    }

    /// Idle -> Preview with a user-selected image.
    pub fn load_image(&mut self, image: EncodedImage) -> Result<(), TransitionError> {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Preview { image };
                Ok(())
            }
            _ => Err(self.rejected("load an image")),
        }
    }

    /// Idle -> Camera. Returns the request number the device grant must quote.
    pub fn open_camera(&mut self) -> Result<u64, TransitionError> {
        match self.phase {
            Phase::Idle => {
                let request = self.next_counter();
                self.phase = Phase::Camera {
                    request,
                    stage: CameraStage::Requesting,
                    failure: None,
                };
                Ok(request)
            }
            _ => Err(self.rejected("open the camera")),
        }
    }

    pub fn camera_ready(&mut self, request: u64) -> Completion {
        match &mut self.phase {
            Phase::Camera {
                request: current,
                stage,
                ..
            } if *current == request && *stage == CameraStage::Requesting => {
                *stage = CameraStage::Streaming;
                Completion::Applied
            }
            _ => Completion::Stale,
        }
    }

    /// Device access failed. Stays in `Camera` so the user can back out.
    pub fn camera_failed(&mut self, request: u64, message: impl Into<String>) -> Completion {
        match &mut self.phase {
            Phase::Camera {
                request: current,
                stage,
                failure,
            } if *current == request => {
                *stage = CameraStage::Failed;
                *failure = Some(message.into());
                Completion::Applied
            }
            _ => Completion::Stale,
        }
    }

    /// Camera (streaming) -> Preview with the captured frame.
    pub fn capture(&mut self, image: EncodedImage) -> Result<(), TransitionError> {
        match self.phase {
            Phase::Camera {
                stage: CameraStage::Streaming,
                ..
            } => {
                self.phase = Phase::Preview { image };
                Ok(())
            }
            _ => Err(self.rejected("capture a photo")),
        }
    }

    pub fn cancel_camera(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            Phase::Camera { .. } => {
                self.phase = Phase::Idle;
                Ok(())
            }
            _ => Err(self.rejected("cancel the camera")),
        }
    }

    pub fn discard(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            Phase::Preview { .. } => {
                self.phase = Phase::Idle;
                Ok(())
            }
            _ => Err(self.rejected("discard the image")),
        }
    }

    /// Preview -> Analyzing. Only one request can be outstanding because this
    /// is the sole way into `Analyzing`.
    pub fn confirm(&mut self) -> Result<(AnalysisTicket, EncodedImage), TransitionError> {
        let image = match &self.phase {
            Phase::Preview { image } => image.clone(),
            _ => return Err(self.rejected("confirm analysis")),
        };
        let ticket = AnalysisTicket {
            session_id: self.id,
            attempt: self.next_counter(),
        };
        self.phase = Phase::Analyzing {
            image: image.clone(),
            ticket,
        };
        Ok((ticket, image))
    }

    /// Analyzing -> Result | Error, provided `ticket` is still the live one.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<AnalysisResult, String>,
    ) -> Completion {
        let image = match &self.phase {
            Phase::Analyzing {
                image,
                ticket: current,
            } if *current == ticket => image.clone(),
            _ => return Completion::Stale,
        };

        self.phase = match outcome {
            Ok(result) => Phase::Result { image, result },
            Err(message) => Phase::Error { image, message },
        };
        Completion::Applied
    }

    /// Back to `Idle` from anywhere. A fresh id invalidates outstanding tickets.
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.phase = Phase::Idle;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase(),
            image: self.image().cloned(),
            result: self.result().cloned(),
            error_message: self.error_message().map(str::to_string),
            camera: self.camera_stage().map(|stage| CameraView {
                stage,
                message: self.camera_failure().map(str::to_string),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub stage: CameraStage,
    pub message: Option<String>,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: PhaseKind,
    pub image: Option<EncodedImage>,
    pub result: Option<AnalysisResult>,
    pub error_message: Option<String>,
    pub camera: Option<CameraView>,
}
