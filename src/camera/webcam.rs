//! Native camera backend built on `nokhwa`.
//!
//! nokhwa camera handles are not `Send`, so each stream lives on its own
//! thread and is driven through a command channel.

use std::sync::mpsc::{self, Sender};
use std::thread;

use async_trait::async_trait;
use log::{info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, RequestedFormat, RequestedFormatType};
use nokhwa::{Camera, NokhwaError};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::DeviceAccessError;
use crate::models::{Frame, PixelFormat};
use crate::settings::Facing;

use super::device::{preferred_index, StreamConstraints, VideoDevice, VideoStream};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDescriptor {
    pub position: usize,
    pub name: String,
}

pub fn list_cameras() -> Result<Vec<CameraDescriptor>, DeviceAccessError> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(classify)?;
    Ok(cameras
        .iter()
        .enumerate()
        .map(|(position, info)| CameraDescriptor {
            position,
            name: info.human_name(),
        })
        .collect())
}

enum CameraCommand {
    Grab(oneshot::Sender<Result<Frame, DeviceAccessError>>),
    Stop,
}

pub struct WebcamDevice;

#[async_trait]
impl VideoDevice for WebcamDevice {
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceAccessError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel::<CameraCommand>();

        thread::Builder::new()
            .name("camera-device".to_string())
            .spawn(move || {
                let mut camera = match open_camera(constraints.facing) {
                    Ok(camera) => camera,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                let label = camera.info().human_name();
                if ready_tx.send(Ok(label)).is_err() {
                    let _ = camera.stop_stream();
                    return;
                }

                // Exits on Stop or once the stream handle is dropped.
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        CameraCommand::Grab(reply) => {
                            let _ = reply.send(grab(&mut camera));
                        }
                        CameraCommand::Stop => break,
                    }
                }

                if let Err(err) = camera.stop_stream() {
                    warn!("Failed to stop camera stream cleanly: {err}");
                }
                info!("Camera released");
            })
            .map_err(|err| DeviceAccessError::Busy(err.to_string()))?;

        let label = ready_rx
            .await
            .map_err(|_| DeviceAccessError::Stream("camera thread exited".into()))??;

        Ok(Box::new(WebcamStream {
            tx,
            label,
            stopped: false,
        }))
    }
}

struct WebcamStream {
    tx: Sender<CameraCommand>,
    label: String,
    stopped: bool,
}

#[async_trait]
impl VideoStream for WebcamStream {
    fn label(&self) -> &str {
        &self.label
    }

    async fn next_frame(&mut self) -> Result<Frame, DeviceAccessError> {
        if self.stopped {
            return Err(DeviceAccessError::Stream("stream stopped".into()));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CameraCommand::Grab(reply_tx))
            .map_err(|_| DeviceAccessError::Stream("camera thread gone".into()))?;
        reply_rx
            .await
            .map_err(|_| DeviceAccessError::Stream("camera thread gone".into()))?
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let _ = self.tx.send(CameraCommand::Stop);
    }
}

impl Drop for WebcamStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_camera(facing: Facing) -> Result<Camera, DeviceAccessError> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(classify)?;
    let names: Vec<String> = cameras.iter().map(|info| info.human_name()).collect();
    let position = preferred_index(names.as_slice(), facing).ok_or(DeviceAccessError::NotFound)?;

    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
    let mut camera = Camera::new(cameras[position].index().clone(), requested).map_err(classify)?;
    camera.open_stream().map_err(classify)?;
    Ok(camera)
}

fn grab(camera: &mut Camera) -> Result<Frame, DeviceAccessError> {
    let buffer = camera
        .frame()
        .map_err(|err| DeviceAccessError::Stream(err.to_string()))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|err| DeviceAccessError::Stream(err.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    Ok(Frame::new(decoded.into_raw(), width, height, PixelFormat::Rgb8))
}

/// nokhwa reports everything as strings; sort them into the device taxonomy.
fn classify(err: NokhwaError) -> DeviceAccessError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
        DeviceAccessError::PermissionDenied(message)
    } else if lower.contains("busy") || lower.contains("in use") {
        DeviceAccessError::Busy(message)
    } else if lower.contains("no device") || lower.contains("not found") {
        DeviceAccessError::NotFound
    } else {
        DeviceAccessError::Stream(message)
    }
}
