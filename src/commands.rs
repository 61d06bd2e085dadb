use std::sync::Arc;

use tauri::Manager;

use crate::catalog::{self, ModelChoice};
use crate::export;
use crate::phones;
use crate::proxies;
use crate::query::{FetchFn, QueryKey, QueryState, QueryStatus, OP_CONNECTION, OP_LEADS, OP_MODELS};
use crate::types::{ExportPayload, Lead, Model, NormalizedPhone, SearchParams, Settings};
use crate::AppState;

// ─── Tauri commands ────────────────────────────────────────────────────────────

/// Current in-memory settings. Never blocks on I/O; before the first load
/// completes this is the built-in default.
#[tauri::command]
pub async fn get_settings(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    Ok(state.settings.current())
}

/// Explicit re-load from disk. The startup load happens exactly once in
/// `startup_init`; this is for operator-driven refresh only.
#[tauri::command]
pub async fn reload_settings(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    state.settings.load().map_err(|e| e.to_string())
}

/// Returns whether the store accepted the write. A false return leaves the
/// previous settings fully in effect.
#[tauri::command]
pub async fn save_settings(
    settings: Settings,
    state: tauri::State<'_, AppState>,
) -> Result<bool, String> {
    Ok(state.settings.save(settings).await)
}

/// Parse a pasted proxy list and replace the engine's pool with it.
/// Returns how many entries were forwarded.
#[tauri::command]
pub async fn update_proxies(
    text: String,
    state: tauri::State<'_, AppState>,
) -> Result<usize, String> {
    push_proxies(&state, &text).await
}

/// Trigger a lead search. Returns false without touching the cache when the
/// city is empty or the same key is already in flight.
#[tauri::command]
pub async fn start_search(
    city: String,
    query: String,
    state: tauri::State<'_, AppState>,
) -> Result<bool, String> {
    Ok(trigger_search(&state, &city, &query))
}

#[tauri::command]
pub async fn search_state(state: tauri::State<'_, AppState>) -> Result<QueryState, String> {
    Ok(current_state(&state, OP_LEADS))
}

#[tauri::command]
pub async fn run_connection_test(state: tauri::State<'_, AppState>) -> Result<bool, String> {
    Ok(trigger_connection_test(&state))
}

#[tauri::command]
pub async fn connection_state(state: tauri::State<'_, AppState>) -> Result<QueryState, String> {
    Ok(current_state(&state, OP_CONNECTION))
}

/// Dismissing the diagnostics panel drops the entry entirely; the next test
/// starts a fresh cycle with a full retry budget.
#[tauri::command]
pub async fn dismiss_connection_test(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.queries.dispose_op(OP_CONNECTION);
    Ok(())
}

/// Trigger a model catalog fetch. A missing API key is a validation error:
/// the trigger no-ops and the entry stays idle.
#[tauri::command]
pub async fn start_fetch_models(state: tauri::State<'_, AppState>) -> Result<bool, String> {
    Ok(trigger_model_fetch(&state))
}

#[tauri::command]
pub async fn models_state(state: tauri::State<'_, AppState>) -> Result<QueryState, String> {
    Ok(current_state(&state, OP_MODELS))
}

/// The visible model-selector entries for the current combobox input.
#[tauri::command]
pub async fn list_models(
    query: String,
    free_only: bool,
    state: tauri::State<'_, AppState>,
) -> Result<Vec<ModelChoice>, String> {
    Ok(model_choices(&state, &query, free_only))
}

/// Build the CSV blob for the current search results.
#[tauri::command]
pub async fn export_leads(state: tauri::State<'_, AppState>) -> Result<ExportPayload, String> {
    build_export(&state, chrono::Local::now().date_naive())
}

/// Normalize one phone string on demand (manual entry in the lead table).
/// Total: junk input classifies as Unknown instead of erroring.
#[tauri::command]
pub async fn normalize_phone(phone: String) -> Result<NormalizedPhone, String> {
    let (normalized, phone_type) = phones::normalize(&phone);
    Ok(NormalizedPhone {
        display: phones::format_for_display(&normalized),
        normalized,
        phone_type,
    })
}

/// Open a messenger deep link for a mobile lead. Fire-and-forget: nothing
/// is awaited or validated beyond handing the URI to the OS.
#[tauri::command]
pub async fn open_messenger(app: String, phone: String) -> Result<(), String> {
    if !phones::is_mobile(&phone) {
        return Err("messenger links require a mobile number".to_string());
    }
    let url = match app.as_str() {
        "viber" => format!("viber://chat?number={phone}"),
        "telegram" => format!("tg://resolve?domain={phone}"),
        other => return Err(format!("unknown messenger: {other}")),
    };
    open::that_detached(url).map_err(|e| e.to_string())
}

// ─── Orchestration ─────────────────────────────────────────────────────────────

/// Called once on startup: the single automatic settings load. Every later
/// load happens only through the explicit reload command.
pub async fn startup_init(app: tauri::AppHandle) {
    let state = app.state::<AppState>();
    if let Err(e) = state.settings.load() {
        tracing::warn!("failed to load settings: {e:#}");
    }
}

/// Trigger the search operation for the current city/query/settings tuple.
/// All four parameters participate in the cache key, so changing the API key
/// or model and re-triggering addresses a distinct entry.
pub fn trigger_search(state: &AppState, city: &str, query: &str) -> bool {
    let city = city.trim();
    if city.is_empty() {
        return false;
    }

    let settings = state.settings.current();
    let params = SearchParams {
        city: city.to_string(),
        query: query.trim().to_string(),
        api_key: settings.api_key,
        model_id: settings.model_id,
    };
    let key = QueryKey::new(
        OP_LEADS,
        [
            params.city.clone(),
            params.query.clone(),
            params.api_key.clone(),
            params.model_id.clone(),
        ],
    );

    let backend = state.backend.clone();
    let archive_path = state.archive_path.clone();
    let fetch: FetchFn = Arc::new(move || {
        let backend = backend.clone();
        let params = params.clone();
        let archive_path = archive_path.clone();
        Box::pin(async move {
            let raw = backend.search_leads(&params).await?;
            let leads: Vec<Lead> = raw.into_iter().map(phones::enrich).collect();
            archive_leads(&archive_path, &leads);
            serde_json::to_value(&leads).map_err(|e| e.to_string())
        })
    });
    state
        .queries
        .trigger(key, state.config.search_retries, fetch)
}

pub fn trigger_connection_test(state: &AppState) -> bool {
    let backend = state.backend.clone();
    let fetch: FetchFn = Arc::new(move || {
        let backend = backend.clone();
        Box::pin(async move {
            let report = backend.test_connection().await?;
            Ok(serde_json::Value::String(report))
        })
    });
    state.queries.trigger(
        QueryKey::new(OP_CONNECTION, Vec::new()),
        state.config.connection_retries,
        fetch,
    )
}

pub fn trigger_model_fetch(state: &AppState) -> bool {
    let api_key = state.settings.current().api_key;
    if api_key.is_empty() {
        return false;
    }

    let key = QueryKey::new(OP_MODELS, [api_key.clone()]);
    let backend = state.backend.clone();
    let fetch: FetchFn = Arc::new(move || {
        let backend = backend.clone();
        let api_key = api_key.clone();
        Box::pin(async move {
            let models = backend.fetch_models(&api_key).await?;
            serde_json::to_value(&models).map_err(|e| e.to_string())
        })
    });
    state
        .queries
        .trigger(key, state.config.model_retries, fetch)
}

/// The active entry's state for an operation, or idle if it was never
/// triggered.
pub fn current_state(state: &AppState, op: &str) -> QueryState {
    state
        .queries
        .op_state(op)
        .map(|(_, s)| s)
        .unwrap_or_else(QueryState::idle)
}

/// Shape and forward the proxy list. Replace semantics: the engine's whole
/// pool becomes exactly this list.
pub async fn push_proxies(state: &AppState, text: &str) -> Result<usize, String> {
    let list = proxies::parse(text);
    state.backend.update_proxies(list.clone()).await?;
    tracing::info!(count = list.len(), "proxy list replaced");
    Ok(list.len())
}

/// Compute the model combobox entries from the cached catalog. Before any
/// successful fetch the catalog is empty, so free-text input still yields a
/// custom entry.
pub fn model_choices(state: &AppState, query: &str, free_only: bool) -> Vec<ModelChoice> {
    let catalog: Vec<Model> = state
        .queries
        .op_state(OP_MODELS)
        .and_then(|(_, s)| s.data)
        .and_then(|data| serde_json::from_value(data).ok())
        .unwrap_or_default();
    catalog::visible_models(&catalog, query, free_only)
}

/// Build the export payload from the current successful search results.
pub fn build_export(state: &AppState, date: chrono::NaiveDate) -> Result<ExportPayload, String> {
    let (key, entry) = state
        .queries
        .op_state(OP_LEADS)
        .ok_or_else(|| "no search results to export".to_string())?;
    if entry.status != QueryStatus::Success {
        return Err("no search results to export".to_string());
    }
    let leads: Vec<Lead> = entry
        .data
        .and_then(|data| serde_json::from_value(data).ok())
        .ok_or_else(|| "search results are not exportable".to_string())?;

    // First key parameter is the city the search was triggered with.
    let city = key.params.first().map(String::as_str).unwrap_or("unknown");
    Ok(ExportPayload {
        file_name: export::file_name(city, date),
        mime_type: export::CSV_MIME_TYPE.to_string(),
        content: export::to_csv(&leads),
    })
}

// ─── Internal helpers ──────────────────────────────────────────────────────────

/// Best-effort archive of search results. Failures are logged and never
/// fail the search itself.
fn archive_leads(path: &std::path::Path, leads: &[Lead]) {
    match crate::db::open_archive(path).and_then(|conn| crate::db::record_leads(&conn, leads)) {
        Ok(new_rows) => {
            if new_rows > 0 {
                tracing::info!(new_rows, "archived new leads");
            }
        }
        Err(e) => tracing::warn!("lead archive unavailable: {e:#}"),
    }
}
