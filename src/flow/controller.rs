use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::acquisition;
use crate::camera::{CaptureSession, CaptureStatus, VideoDevice};
use crate::error::{AnalysisError, CaptureError, DeviceAccessError, TransitionError};
use crate::inference::PeopleCounter;
use crate::models::{AnalysisResult, EncodedImage};
use crate::settings::CameraSettings;

use super::state::{CameraStage, Completion, PhaseKind, Session, SessionSnapshot};

type AnalysisOutcome = Result<AnalysisResult, AnalysisError>;

/// A granted camera plus the task that reports its stream dying.
struct LiveCamera {
    capture: CaptureSession,
    watcher: CancellationToken,
}

impl LiveCamera {
    async fn release(mut self) {
        self.watcher.cancel();
        self.capture.stop().await;
    }
}

/// The one inference call allowed in flight.
struct PendingAnalysis {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the live [`Session`] and the camera it may hold, and applies user
/// events to them one at a time. Every applied transition is published
/// through [`subscribe`](Self::subscribe).
///
/// Locks are always taken session first.
#[derive(Clone)]
pub struct FlowController {
    session: Arc<Mutex<Session>>,
    camera: Arc<Mutex<Option<LiveCamera>>>,
    analysis: Arc<Mutex<Option<PendingAnalysis>>>,
    device: Arc<dyn VideoDevice>,
    counter: Arc<dyn PeopleCounter>,
    camera_settings: CameraSettings,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
}

impl FlowController {
    pub fn new(
        device: Arc<dyn VideoDevice>,
        counter: Arc<dyn PeopleCounter>,
        camera_settings: CameraSettings,
    ) -> Self {
        let session = Session::new();
        let (snapshots, _) = watch::channel(session.snapshot());
        Self {
            session: Arc::new(Mutex::new(session)),
            camera: Arc::new(Mutex::new(None)),
            analysis: Arc::new(Mutex::new(None)),
            device,
            counter,
            camera_settings,
            snapshots: Arc::new(snapshots),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    fn publish(&self, session: &Session) -> SessionSnapshot {
        let snapshot = session.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    /// Idle -> Preview from raw file bytes. On a read failure the session stays idle.
    pub async fn load_bytes(
        &self,
        bytes: &[u8],
        name: Option<&Path>,
        declared_type: Option<&str>,
    ) -> Result<SessionSnapshot> {
        let image = acquisition::from_file(bytes, name, declared_type)
            .inspect_err(|err| error!("Failed to encode selected image: {err}"))?;
        self.show_image(image).await
    }

    pub async fn load_path(&self, path: &Path) -> Result<SessionSnapshot> {
        let image = acquisition::from_path(path)
            .await
            .inspect_err(|err| error!("Failed to read {}: {err}", path.display()))?;
        self.show_image(image).await
    }

    async fn show_image(&self, image: EncodedImage) -> Result<SessionSnapshot> {
        let mut session = self.session.lock().await;
        session.load_image(image)?;
        info!(
            "Image loaded ({}, {} base64 chars)",
            session.image().map_or("", |image| image.content_type()),
            session.image().map_or(0, |image| image.payload().len())
        );
        Ok(self.publish(&session))
    }

    /// Idle -> Camera, then wait for the device. The session lock is not held
    /// while the platform prompts, so the user can cancel in the meantime.
    pub async fn open_camera(&self) -> Result<SessionSnapshot> {
        let request = {
            let mut session = self.session.lock().await;
            let request = session.open_camera()?;
            self.publish(&session);
            request
        };

        let mut capture = CaptureSession::new(self.device.clone(), self.camera_settings.clone());
        let started = capture.start().await;

        let mut session = self.session.lock().await;
        match started {
            Ok(()) => {
                if session.camera_ready(request) == Completion::Stale {
                    info!("Camera granted after the camera screen closed; releasing it");
                    capture.stop().await;
                    return Ok(session.snapshot());
                }
                info!("Camera open: {}", capture.label().unwrap_or("unknown"));
                let watcher = CancellationToken::new();
                self.watch_stream(request, capture.status_updates(), watcher.clone());
                *self.camera.lock().await = Some(LiveCamera { capture, watcher });
                Ok(self.publish(&session))
            }
            Err(err) => {
                capture.stop().await;
                if session.camera_failed(request, err.user_message()) == Completion::Applied {
                    self.publish(&session);
                }
                Err(err.into())
            }
        }
    }

    /// Move the camera screen to `Failed` if the stream dies while it is shown.
    /// Cancelled whenever the camera is released through the controller.
    fn watch_stream(
        &self,
        request: u64,
        status: watch::Receiver<CaptureStatus>,
        cancel_token: CancellationToken,
    ) {
        let flow = self.clone();
        tokio::spawn(async move {
            let failure = tokio::select! {
                _ = cancel_token.cancelled() => return,
                failure = stream_failure(status) => failure,
            };
            let Some(failure) = failure else {
                return;
            };

            let mut session = flow.session.lock().await;
            if cancel_token.is_cancelled() {
                return;
            }
            if session.camera_failed(request, failure.user_message()) == Completion::Stale {
                return;
            }
            warn!("Camera stream lost: {failure}");
            flow.release_camera().await;
            flow.publish(&session);
        });
    }

    /// Newest live frame as a JPEG, or `None` before the first one arrives or
    /// once the stream has stopped.
    pub async fn preview_frame(&self) -> Result<Option<EncodedImage>> {
        let frame = {
            let slot = self.camera.lock().await;
            slot.as_ref()
                .filter(|live| live.capture.status() == CaptureStatus::Streaming)
                .and_then(|live| live.capture.latest_frame())
        };
        match frame {
            Some(frame) => Ok(Some(acquisition::from_frame(
                &frame,
                self.camera_settings.jpeg_quality,
            )?)),
            None => Ok(None),
        }
    }

    /// Camera -> Preview. The device is released before the session leaves `Camera`.
    ///
    /// Waiting for the first frame happens without the session lock, so cancel
    /// and reset stay responsive.
    pub async fn capture_photo(&self) -> Result<SessionSnapshot> {
        let (request, frame_ready) = {
            let session = self.session.lock().await;
            let request = streaming_request(&session, "capture a photo")?;
            let slot = self.camera.lock().await;
            let Some(live) = slot.as_ref() else {
                return Err(CaptureError::NotStreaming.into());
            };
            (request, live.capture.wait_for_frame())
        };

        if let Err(err) = frame_ready.await {
            error!("Photo capture failed: {err}");
            return Err(err.into());
        }

        let mut session = self.session.lock().await;
        if streaming_request(&session, "capture a photo")? != request {
            return Err(TransitionError::new(session.phase().as_str(), "capture a photo").into());
        }

        let mut slot = self.camera.lock().await;
        let Some(live) = slot.as_mut() else {
            return Err(CaptureError::NotStreaming.into());
        };

        match live.capture.capture_frame().await {
            Ok(image) => {
                if let Some(live) = slot.take() {
                    live.release().await;
                }
                session.capture(image)?;
                info!("Photo captured; camera released");
                Ok(self.publish(&session))
            }
            Err(err) => {
                error!("Photo capture failed: {err}");
                if matches!(live.capture.status(), CaptureStatus::Failed(_)) {
                    if let Some(live) = slot.take() {
                        live.release().await;
                    }
                    session.camera_failed(request, err.user_message());
                    self.publish(&session);
                }
                Err(err.into())
            }
        }
    }

    pub async fn cancel_camera(&self) -> Result<SessionSnapshot> {
        let mut session = self.session.lock().await;
        if session.phase() != PhaseKind::Camera {
            return Err(TransitionError::new(session.phase().as_str(), "cancel the camera").into());
        }
        self.release_camera().await;
        session.cancel_camera()?;
        info!("Camera cancelled");
        Ok(self.publish(&session))
    }

    pub async fn discard(&self) -> Result<SessionSnapshot> {
        let mut session = self.session.lock().await;
        session.discard()?;
        Ok(self.publish(&session))
    }

    /// Preview -> Analyzing -> Result | Error.
    ///
    /// Analysis failures land in the session as `Error`, so this only returns
    /// `Err` when the session was not in `Preview`. A reset while the call is
    /// in flight aborts it; the current snapshot is returned instead.
    pub async fn confirm_analysis(&self) -> Result<SessionSnapshot> {
        let (ticket, outcome_rx) = {
            let mut session = self.session.lock().await;
            let (ticket, image) = session.confirm()?;
            info!(
                "Analyzing {} image (attempt {})",
                image.content_type(),
                ticket.attempt
            );

            let (outcome_tx, outcome_rx) = oneshot::channel();
            let cancel_token = CancellationToken::new();
            let handle = tokio::spawn(run_analysis(
                self.counter.clone(),
                image,
                cancel_token.clone(),
                outcome_tx,
            ));
            *self.analysis.lock().await = Some(PendingAnalysis {
                cancel_token,
                handle,
            });
            self.publish(&session);
            (ticket, outcome_rx)
        };

        let Ok(outcome) = outcome_rx.await else {
            return Ok(self.snapshot().await);
        };
        let outcome = outcome.map_err(|err| {
            if err.is_parse() {
                warn!("Analysis answer unusable: {err}");
            } else {
                error!("Analysis failed: {err}");
            }
            err.user_message().to_string()
        });

        let mut session = self.session.lock().await;
        match session.complete_analysis(ticket, outcome) {
            Completion::Applied => {
                self.analysis.lock().await.take();
                Ok(self.publish(&session))
            }
            Completion::Stale => {
                info!("Discarding analysis result for a session that has moved on");
                Ok(session.snapshot())
            }
        }
    }

    /// Back to `Idle` from any phase, releasing the camera if one is held and
    /// aborting an analysis in flight.
    pub async fn reset(&self) -> SessionSnapshot {
        let mut session = self.session.lock().await;
        self.release_camera().await;
        if self.cancel_analysis().await {
            info!("Reset while analyzing; pending request aborted");
        }
        session.reset();
        self.publish(&session)
    }

    async fn release_camera(&self) {
        let live = self.camera.lock().await.take();
        if let Some(live) = live {
            live.release().await;
        }
    }

    /// Abort the in-flight inference call and wait for it to wind down.
    async fn cancel_analysis(&self) -> bool {
        let Some(pending) = self.analysis.lock().await.take() else {
            return false;
        };
        pending.cancel_token.cancel();
        if let Err(err) = pending.handle.await {
            error!("Analysis task failed to join: {err}");
        }
        true
    }
}

fn streaming_request(session: &Session, action: &'static str) -> Result<u64, TransitionError> {
    match (session.camera_stage(), session.camera_request()) {
        (Some(CameraStage::Streaming), Some(request)) => Ok(request),
        _ => Err(TransitionError::new(session.phase().as_str(), action)),
    }
}

async fn stream_failure(mut status: watch::Receiver<CaptureStatus>) -> Option<DeviceAccessError> {
    let current = status
        .wait_for(|status| matches!(status, CaptureStatus::Failed(_)))
        .await
        .ok()?;
    match &*current {
        CaptureStatus::Failed(err) => Some(err.clone()),
        _ => None,
    }
}

async fn run_analysis(
    counter: Arc<dyn PeopleCounter>,
    image: EncodedImage,
    cancel_token: CancellationToken,
    outcome_tx: oneshot::Sender<AnalysisOutcome>,
) {
    tokio::select! {
        _ = cancel_token.cancelled() => {
            info!("Analysis request aborted");
        }
        outcome = counter.analyze(&image) => {
            let _ = outcome_tx.send(outcome);
        }
    }
}
