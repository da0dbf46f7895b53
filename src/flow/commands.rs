use std::path::PathBuf;

use log::error;
use tauri::State;

use crate::camera::{self, CameraDescriptor};
use crate::error::user_message;
use crate::flow::{FlowController, SessionSnapshot};
use crate::settings::AppSettings;
use crate::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> FlowController {
    state.flow.clone()
}

fn to_user(err: anyhow::Error) -> String {
    error!("Command failed: {err:#}");
    user_message(&err)
}

#[tauri::command]
pub async fn get_session_state(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub async fn load_image_file(
    state: State<'_, AppState>,
    path: String,
) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .load_path(&PathBuf::from(path))
        .await
        .map_err(to_user)
}

#[tauri::command]
pub async fn load_image_bytes(
    state: State<'_, AppState>,
    bytes: Vec<u8>,
    name: Option<String>,
    content_type: Option<String>,
) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    let name = name.map(PathBuf::from);
    controller
        .load_bytes(&bytes, name.as_deref(), content_type.as_deref())
        .await
        .map_err(to_user)
}

#[tauri::command]
pub async fn open_camera(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.open_camera().await.map_err(to_user)
}

/// Latest preview frame as a `data:` URI, `None` until the camera delivers one.
#[tauri::command]
pub async fn get_preview_frame(state: State<'_, AppState>) -> Result<Option<String>, String> {
    let controller = controller_from_state(&state);
    let frame = controller.preview_frame().await.map_err(to_user)?;
    Ok(frame.map(|image| image.data_uri()))
}

#[tauri::command]
pub async fn capture_photo(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.capture_photo().await.map_err(to_user)
}

#[tauri::command]
pub async fn cancel_camera(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.cancel_camera().await.map_err(to_user)
}

#[tauri::command]
pub async fn discard_image(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.discard().await.map_err(to_user)
}

#[tauri::command]
pub async fn confirm_analysis(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.confirm_analysis().await.map_err(to_user)
}

#[tauri::command]
pub async fn reset_session(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.reset().await)
}

#[tauri::command]
pub fn list_cameras() -> Result<Vec<CameraDescriptor>, String> {
    camera::list_cameras().map_err(|err| {
        error!("Failed to list cameras: {err}");
        err.user_message().to_string()
    })
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> AppSettings {
    state.settings.get()
}
