#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod state;

pub use controller::FlowController;
pub use state::{
    AnalysisTicket, CameraStage, CameraView, Completion, PhaseKind, Session, SessionSnapshot,
};
