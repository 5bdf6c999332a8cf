pub mod catalog;
#[cfg(feature = "app")]
mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod freshness;
pub mod geometry;
pub mod session;
pub mod types;

pub use error::{Error, Result};

#[cfg(feature = "app")]
use tauri::{Emitter, Manager};
#[cfg(feature = "app")]
use tokio::sync::broadcast::error::RecvError;

#[cfg(feature = "app")]
async fn start_session(app: &tauri::AppHandle) -> Result<session::MapSession<feed::HttpStatusFeed>> {
    let data_dir = app
        .path()
        .app_data_dir()
        .map_err(|e| Error::Config(format!("Failed to resolve app data directory: {e}")))?;

    let app_config = config::AppConfig::load(&data_dir.join(config::CONFIG_FILE_NAME))?;
    let pool = database::init_database(&data_dir.join(database::DB_FILE_NAME)).await?;
    let feed = feed::HttpStatusFeed::new(&app_config.feed, app_config.policy.coverage_radius_m)?;
    let catalog = session::load_catalog(&pool, &feed).await?;
    pool.close().await;

    Ok(session::MapSession::new(app_config.policy, feed, catalog))
}

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            commands::get_bays,
            commands::get_bays_in_view,
            commands::viewport_settled,
            commands::get_freshness,
        ])
        .setup(|app| {
            let handle = app.handle().clone();
            tauri::async_runtime::block_on(async move {
                match start_session(&handle).await {
                    Ok(session) => {
                        let mut refreshes = session.subscribe();
                        handle.manage(commands::SessionState(session));

                        let emitter = handle.clone();
                        tauri::async_runtime::spawn(async move {
                            loop {
                                match refreshes.recv().await {
                                    Ok(refresh) => {
                                        if let Err(e) = emitter.emit("bay-status-updated", refresh) {
                                            tracing::warn!(event = "app.emit_failed", error = %e);
                                        }
                                    }
                                    Err(RecvError::Lagged(skipped)) => {
                                        tracing::warn!(event = "app.refresh_lagged", skipped);
                                    }
                                    Err(RecvError::Closed) => break,
                                }
                            }
                        });
                        tracing::info!(event = "app.session_started");
                    }
                    Err(e) => {
                        tracing::error!(event = "app.session_failed", error = %e);
                    }
                }
            });
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
