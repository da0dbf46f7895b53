use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::json;

use countai_lib::camera::{StreamConstraints, VideoDevice, VideoStream};
use countai_lib::error::{self, CaptureError, DeviceAccessError, ANALYSIS_FAILED, CAMERA_PERMISSION};
use countai_lib::flow::{CameraStage, FlowController, PhaseKind};
use countai_lib::inference::{GeminiClient, PeopleCounter};
use countai_lib::models::{Frame, PixelFormat};
use countai_lib::settings::{CameraSettings, InferenceSettings};

/// Device double that records every acquisition and release.
#[derive(Default)]
struct CountingDevice {
    deny: bool,
    acquired: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoDevice for CountingDevice {
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceAccessError> {
        assert!(!constraints.audio);
        if self.deny {
            return Err(DeviceAccessError::PermissionDenied("NotAllowedError".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingStream {
            stopped: self.stopped.clone(),
        }))
    }
}

struct CountingStream {
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoStream for CountingStream {
    fn label(&self) -> &str {
        "test camera"
    }

    async fn next_frame(&mut self) -> Result<Frame, DeviceAccessError> {
        Ok(Frame::new(vec![120; 20 * 10 * 3], 20, 10, PixelFormat::Rgb8))
    }

    fn stop(&mut self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 60]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

fn gemini(base_url: String) -> Arc<dyn PeopleCounter> {
    let settings = InferenceSettings {
        base_url,
        request_timeout_secs: 5,
        ..InferenceSettings::default()
    };
    Arc::new(GeminiClient::new(&settings, Some("test-key".into())).unwrap())
}

fn camera_settings() -> CameraSettings {
    CameraSettings {
        preview_fps: 100,
        first_frame_timeout_ms: 1_000,
        ..CameraSettings::default()
    }
}

fn envelope(answer: serde_json::Value) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": answer.to_string() }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

fn flow_with(device: CountingDevice, counter: Arc<dyn PeopleCounter>) -> FlowController {
    FlowController::new(Arc::new(device), counter, camera_settings())
}

#[tokio::test]
async fn scenario_a_uploaded_jpeg_goes_to_preview() {
    let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    file.write_all(&jpeg_bytes(40, 30)).unwrap();

    let flow = flow_with(CountingDevice::default(), gemini("http://127.0.0.1:9".into()));
    let snapshot = flow.load_path(file.path()).await.unwrap();

    assert_eq!(snapshot.phase, PhaseKind::Preview);
    let image = snapshot.image.unwrap();
    assert_eq!(image.content_type(), "image/jpeg");
    assert_eq!(image.dimensions().unwrap(), (40, 30));
    assert!(snapshot.result.is_none());
    assert!(snapshot.error_message.is_none());
}

#[tokio::test]
async fn scenario_b_confirm_produces_result() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/gemini-2.5-flash:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(envelope(json!({
            "count": 3,
            "description": "Three people near a doorway.",
            "confidenceLevel": "High"
        })))
        .create_async()
        .await;

    let flow = flow_with(CountingDevice::default(), gemini(server.url()));
    flow.load_bytes(&jpeg_bytes(8, 8), None, Some("image/jpeg"))
        .await
        .unwrap();

    let mut updates = flow.subscribe();
    let snapshot = flow.confirm_analysis().await.unwrap();

    mock.assert_async().await;
    assert_eq!(snapshot.phase, PhaseKind::Result);
    let result = snapshot.result.unwrap();
    assert_eq!(result.count, 3);
    assert_eq!(result.description, "Three people near a doorway.");
    assert!(snapshot.image.is_some());
    assert_eq!(updates.borrow_and_update().phase, PhaseKind::Result);
}

#[tokio::test]
async fn scenario_c_network_error_then_reset() {
    // Nothing listens on the discard port, so the request fails in transport.
    let flow = flow_with(CountingDevice::default(), gemini("http://127.0.0.1:9".into()));
    flow.load_bytes(&jpeg_bytes(8, 8), None, None).await.unwrap();

    let failed = flow.confirm_analysis().await.unwrap();
    assert_eq!(failed.phase, PhaseKind::Error);
    assert_eq!(failed.error_message.as_deref(), Some(ANALYSIS_FAILED));

    let idle = flow.reset().await;
    assert_eq!(idle.phase, PhaseKind::Idle);
    assert!(idle.image.is_none());
    assert!(idle.result.is_none());
    assert!(idle.error_message.is_none());
}

#[tokio::test]
async fn scenario_d_denied_camera_then_cancel() {
    let device = CountingDevice {
        deny: true,
        ..CountingDevice::default()
    };
    let acquired = device.acquired.clone();
    let stopped = device.stopped.clone();
    let flow = flow_with(device, gemini("http://127.0.0.1:9".into()));

    let err = flow.open_camera().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CaptureError>(),
        Some(CaptureError::Device(DeviceAccessError::PermissionDenied(_)))
    ));
    assert_eq!(error::user_message(&err), CAMERA_PERMISSION);

    let snapshot = flow.snapshot().await;
    assert_eq!(snapshot.phase, PhaseKind::Camera);
    assert_eq!(snapshot.camera.unwrap().stage, CameraStage::Failed);

    let idle = flow.cancel_camera().await.unwrap();
    assert_eq!(idle.phase, PhaseKind::Idle);
    assert_eq!(acquired.load(Ordering::SeqCst), 0);
    assert_eq!(stopped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_d_cancel_streaming_camera_releases_once() {
    let device = CountingDevice::default();
    let acquired = device.acquired.clone();
    let stopped = device.stopped.clone();
    let flow = flow_with(device, gemini("http://127.0.0.1:9".into()));

    let streaming = flow.open_camera().await.unwrap();
    assert_eq!(streaming.camera.unwrap().stage, CameraStage::Streaming);

    flow.cancel_camera().await.unwrap();
    flow.reset().await;

    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_e_missing_count_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", mockito::Matcher::Any)
        .with_status(200)
        .with_body(envelope(json!({ "description": "Some people." })))
        .create_async()
        .await;

    let flow = flow_with(CountingDevice::default(), gemini(server.url()));
    flow.load_bytes(&jpeg_bytes(8, 8), None, None).await.unwrap();

    let snapshot = flow.confirm_analysis().await.unwrap();
    assert_eq!(snapshot.phase, PhaseKind::Error);
    assert_eq!(snapshot.error_message.as_deref(), Some(ANALYSIS_FAILED));
    assert!(snapshot.result.is_none());
}

#[tokio::test]
async fn camera_capture_then_analysis() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", mockito::Matcher::Any)
        .match_body(mockito::Matcher::PartialJson(json!({
            "contents": [{ "parts": [{ "inlineData": { "mimeType": "image/jpeg" } }] }]
        })))
        .with_status(200)
        .with_body(envelope(json!({ "count": 0, "description": "An empty room." })))
        .create_async()
        .await;

    let device = CountingDevice::default();
    let stopped = device.stopped.clone();
    let flow = flow_with(device, gemini(server.url()));

    flow.open_camera().await.unwrap();
    let preview = flow.capture_photo().await.unwrap();
    assert_eq!(preview.phase, PhaseKind::Preview);
    assert_eq!(preview.image.unwrap().dimensions().unwrap(), (20, 10));
    assert_eq!(stopped.load(Ordering::SeqCst), 1);

    let done = flow.confirm_analysis().await.unwrap();
    assert_eq!(done.phase, PhaseKind::Result);
    assert_eq!(done.result.unwrap().count, 0);
}
