pub mod acquisition;
pub mod camera;
pub mod error;
pub mod flow;
pub mod inference;
pub mod models;
pub mod settings;
mod utils;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use log::{info, warn};
    use tauri::{AppHandle, Emitter, Manager};
    use tokio::sync::watch;

    use crate::camera::WebcamDevice;
    use crate::flow::commands::{
        cancel_camera, capture_photo, confirm_analysis, discard_image, get_preview_frame,
        get_session_state, get_settings, list_cameras, load_image_bytes, load_image_file,
        open_camera, reset_session,
    };
    use crate::flow::{FlowController, SessionSnapshot};
    use crate::inference::GeminiClient;
    use crate::settings::SettingsStore;

    pub(crate) const SESSION_STATE_EVENT: &str = "session-state-changed";

    pub(crate) struct AppState {
        pub(crate) flow: FlowController,
        pub(crate) settings: SettingsStore,
    }

    /// Mirror every published snapshot to the webview.
    fn forward_session_state(app: AppHandle, mut updates: watch::Receiver<SessionSnapshot>) {
        tauri::async_runtime::spawn(async move {
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                if let Err(err) = app.emit(SESSION_STATE_EVENT, snapshot) {
                    warn!("Failed to emit {SESSION_STATE_EVENT}: {err}");
                }
            }
        });
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        info!("CountAI starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let config_dir = app
                        .path()
                        .app_config_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    let settings = SettingsStore::load(config_dir.join("settings.json"));
                    let app_settings = settings.get();
                    info!(
                        "Settings from {} (model {})",
                        settings.path().display(),
                        app_settings.inference.model
                    );

                    let counter = GeminiClient::from_env(&app_settings.inference)?;
                    let flow = FlowController::new(
                        Arc::new(WebcamDevice),
                        Arc::new(counter),
                        app_settings.camera.clone(),
                    );
                    forward_session_state(app.handle().clone(), flow.subscribe());

                    app.manage(AppState { flow, settings });
                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                get_session_state,
                load_image_file,
                load_image_bytes,
                open_camera,
                get_preview_frame,
                capture_photo,
                cancel_camera,
                discard_image,
                confirm_analysis,
                reset_session,
                list_cameras,
                get_settings,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;
