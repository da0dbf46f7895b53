use std::future::Future;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

use crate::acquisition;
use crate::error::{CaptureError, DeviceAccessError};
use crate::models::{EncodedImage, Frame};
use crate::settings::CameraSettings;

use super::device::{StreamConstraints, VideoDevice};
use super::preview::preview_loop;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Requesting,
    Streaming,
    Capturing,
    Cancelled,
    Failed(DeviceAccessError),
}

/// One camera UI lifetime: acquire in [`start`](Self::start), release in
/// [`stop`](Self::stop) or on drop, whichever comes first.
pub struct CaptureSession {
    device: Arc<dyn VideoDevice>,
    constraints: StreamConstraints,
    settings: CameraSettings,
    status_tx: Arc<watch::Sender<CaptureStatus>>,
    frames: Option<watch::Receiver<Option<Arc<Frame>>>>,
    pump: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    label: Option<String>,
    released: bool,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn VideoDevice>, settings: CameraSettings) -> Self {
        let (status_tx, _) = watch::channel(CaptureStatus::Requesting);
        Self {
            device,
            constraints: StreamConstraints::video_only(settings.facing),
            settings,
            status_tx: Arc::new(status_tx),
            frames: None,
            pump: None,
            cancel_token: None,
            label: None,
            released: false,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status_tx.borrow().clone()
    }

    pub fn status_updates(&self) -> watch::Receiver<CaptureStatus> {
        self.status_tx.subscribe()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Live preview source; `None` until the stream is granted.
    pub fn frames(&self) -> Option<watch::Receiver<Option<Arc<Frame>>>> {
        self.frames.clone()
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frames.as_ref().and_then(|rx| rx.borrow().clone())
    }

    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.status() != CaptureStatus::Requesting || self.pump.is_some() || self.released {
            return Err(CaptureError::AlreadyStarted);
        }

        let stream = match self.device.acquire(self.constraints).await {
            Ok(stream) => stream,
            Err(err) => {
                error!("Camera access failed: {err}");
                self.status_tx.send_replace(CaptureStatus::Failed(err.clone()));
                return Err(err.into());
            }
        };

        let label = stream.label().to_string();
        info!("Camera stream granted: {label}");

        let (frame_tx, frame_rx) = watch::channel(None);
        let cancel_token = CancellationToken::new();
        let frame_interval =
            Duration::from_millis(1_000 / u64::from(self.settings.preview_fps.max(1)));

        // Streaming must be visible before the loop can report a failure.
        self.status_tx.send_replace(CaptureStatus::Streaming);
        let handle = tokio::spawn(preview_loop(
            stream,
            frame_tx,
            self.status_tx.clone(),
            frame_interval,
            cancel_token.clone(),
        ));

        self.label = Some(label);
        self.frames = Some(frame_rx);
        self.cancel_token = Some(cancel_token);
        self.pump = Some(handle);
        Ok(())
    }

    /// Resolves once a preview frame is available, the stream has ended, or the
    /// first-frame timeout passes. Owns its receiver, so callers can await it
    /// without holding the session.
    pub fn wait_for_frame(
        &self,
    ) -> impl Future<Output = Result<(), CaptureError>> + Send + 'static {
        let frames = self.frames.clone();
        let timeout_ms = self.settings.first_frame_timeout_ms;
        async move {
            let Some(mut frames) = frames else {
                return Err(CaptureError::NotStreaming);
            };
            let waited = time::timeout(
                Duration::from_millis(timeout_ms),
                frames.wait_for(Option::is_some),
            )
            .await
            .map(|_| ());
            waited.map_err(|_| CaptureError::FrameTimeout(timeout_ms))
        }
    }

    /// Grab the newest preview frame as a JPEG. The stream keeps running.
    pub async fn capture_frame(&mut self) -> Result<EncodedImage, CaptureError> {
        match self.status() {
            CaptureStatus::Streaming => {}
            CaptureStatus::Failed(err) => return Err(err.into()),
            _ => return Err(CaptureError::NotStreaming),
        }

        self.wait_for_frame().await?;

        // A closed channel with no frame means the pump died first.
        let Some(frame) = self.latest_frame() else {
            return Err(match self.status() {
                CaptureStatus::Failed(err) => err.into(),
                _ => CaptureError::NotStreaming,
            });
        };

        let image = acquisition::from_frame(&frame, self.settings.jpeg_quality)?;
        self.status_tx.send_replace(CaptureStatus::Capturing);
        Ok(image)
    }

    /// Release the device. Safe from any state and on repeated calls.
    pub async fn stop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.pump.take() {
            if let Err(err) = handle.await {
                error!("Preview loop failed to join: {err}");
            }
        }

        self.status_tx.send_if_modified(|status| {
            if matches!(status, CaptureStatus::Requesting | CaptureStatus::Streaming) {
                *status = CaptureStatus::Cancelled;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // The preview loop stops the stream itself once cancelled.
        if let Some(token) = self.cancel_token.take() {
            warn!("Capture session dropped without stop(); releasing camera");
            token.cancel();
        }
    }
}
