pub mod backend;
pub mod catalog;
pub mod commands;
pub mod db;
pub mod export;
pub mod phones;
pub mod proxies;
pub mod query;
pub mod settings;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tauri::{Emitter, Manager};

use crate::backend::{Backend, HttpBackend};
use crate::query::{QueryCache, QueryConfig, QueryUpdate};
use crate::settings::SettingsStore;

/// All runtime state shared across Tauri commands.
pub struct AppState {
    /// Keyed cache of the manually-triggered async operations.
    pub queries: QueryCache,
    /// Owner of the current settings value and its load/save lifecycle.
    pub settings: Arc<SettingsStore>,
    /// Command-executor boundary: OpenRouter over HTTPS plus the attached
    /// scrape engine.
    pub backend: Arc<dyn Backend>,
    /// Per-operation automatic retry budgets.
    pub config: QueryConfig,
    /// Local SQLite archive of every lead ever returned.
    pub archive_path: PathBuf,
}

impl AppState {
    pub fn new(data_dir: PathBuf, backend: Arc<dyn Backend>, queries: QueryCache) -> Self {
        Self {
            queries,
            settings: Arc::new(SettingsStore::new(data_dir.join("settings.json"))),
            backend,
            config: QueryConfig::default(),
            archive_path: data_dir.join("leads.db"),
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Only log WARN and above in production to avoid leaking operator data
    #[cfg(debug_assertions)]
    tracing_subscriber::fmt::init();
    #[cfg(not(debug_assertions))]
    tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            commands::get_settings,
            commands::reload_settings,
            commands::save_settings,
            commands::update_proxies,
            commands::start_search,
            commands::search_state,
            commands::run_connection_test,
            commands::connection_state,
            commands::dismiss_connection_test,
            commands::start_fetch_models,
            commands::models_state,
            commands::list_models,
            commands::export_leads,
            commands::normalize_phone,
            commands::open_messenger,
        ])
        .setup(|app| {
            let data_dir = app
                .path()
                .app_data_dir()
                .unwrap_or_else(|_| PathBuf::from("."));

            // Every cache transition is pushed to the webview, which is a
            // pure subscriber of entry state.
            let emitter = app.handle().clone();
            let queries = QueryCache::with_notifier(move |key, state| {
                let _ = emitter.emit(
                    "query-state",
                    QueryUpdate {
                        key: key.clone(),
                        state: state.clone(),
                    },
                );
            });

            app.manage(AppState::new(
                data_dir,
                Arc::new(HttpBackend::new()),
                queries,
            ));

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                commands::startup_init(handle).await;
            });
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
