pub mod error;
pub mod favicon;
pub mod icon_jobs;
pub mod item_store;
pub mod library;
pub mod preferences;
pub mod presenter;
pub mod record;
pub mod scanner;
pub mod settings;

use error::AppError;
use favicon::{remove_favicon_file, FaviconResolver, HttpIconFetcher};
use icon_jobs::IconJobs;
use library::{IconApplyOutcome, IconTicket, ScanLibrary};
use preferences::PreferenceStore;
use presenter::{
    openable_url, render_rows, DeleteConfirmation, DeletePrompt, ListMode, RecordRow,
    NO_HANDLER_MESSAGE,
};
use record::ScanRecord;
use scanner::{ScanSession, ScanState};
use settings::AppSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tauri::{AppHandle, Emitter, Manager, RunEvent, State};
use tauri_plugin_opener::OpenerExt;

const DATA_DIR_ENV: &str = "QRHUB_DATA_DIR";
const DB_FILE_NAME: &str = "qrhub.db";
const FAVICONS_DIR_NAME: &str = "favicons";
const RECORDS_CHANGED_EVENT: &str = "records-changed";

/// When locks nest, take settings before library and library before icon jobs.
pub struct AppState {
    library: Mutex<ScanLibrary>,
    settings: Mutex<AppSettings>,
    delete_confirmation: Mutex<DeleteConfirmation>,
    scan_session: Mutex<ScanSession>,
    icon_jobs: Mutex<IconJobs>,
    resolver: Arc<FaviconResolver<HttpIconFetcher>>,
}

impl AppState {
    fn new(
        library: ScanLibrary,
        settings: AppSettings,
        resolver: FaviconResolver<HttpIconFetcher>,
    ) -> Self {
        Self {
            library: Mutex::new(library),
            settings: Mutex::new(settings),
            delete_confirmation: Mutex::new(DeleteConfirmation::default()),
            scan_session: Mutex::new(ScanSession::default()),
            icon_jobs: Mutex::new(IconJobs::default()),
            resolver: Arc::new(resolver),
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> Result<MutexGuard<'a, T>, String> {
    mutex
        .lock()
        .map_err(|_| AppError::LockPoisoned(name).to_string())
}

fn path_to_string(path: &Path) -> Result<String, String> {
    path.to_str()
        .map(|value| value.to_owned())
        .ok_or_else(|| format!("non-utf8 path: {}", path.display()))
}

fn app_root_path(app: &AppHandle) -> Result<PathBuf, AppError> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    app.path()
        .app_data_dir()
        .map_err(|err| AppError::DataDir(err.to_string()))
}

fn current_rows(state: &AppState) -> Result<Vec<RecordRow>, String> {
    let mode = lock(&state.settings, "settings")?.list_mode;
    let library = lock(&state.library, "library")?;
    Ok(render_rows(library.snapshot(), mode))
}

/// Re-renders and pushes the rows to the front end; the same rows are
/// returned to the command that caused the change.
fn publish_rows(app: &AppHandle, state: &AppState) -> Result<Vec<RecordRow>, String> {
    let rows = current_rows(state)?;
    if let Err(err) = app.emit(RECORDS_CHANGED_EVENT, &rows) {
        log::warn!("failed to emit {}: {}", RECORDS_CHANGED_EVENT, err);
    }
    Ok(rows)
}

fn record_scan_internal(
    app: &AppHandle,
    state: &AppState,
    payload: &str,
) -> Result<Vec<RecordRow>, String> {
    if payload.is_empty() {
        return Err("scanned payload is empty".to_string());
    }
    let record = ScanRecord::from_scan(payload);
    log::info!("recorded scan {} at {}", record.id, record.timestamp);
    let ticket = lock(&state.library, "library")?
        .insert(record)
        .map_err(|err| err.to_string())?;
    let rows = publish_rows(app, state)?;
    spawn_icon_job(app, state, ticket)?;
    Ok(rows)
}

fn spawn_icon_job(app: &AppHandle, state: &AppState, ticket: IconTicket) -> Result<(), String> {
    let mut jobs = lock(&state.icon_jobs, "icon jobs")?;
    let record_id = ticket.record_id.clone();
    let resolver = Arc::clone(&state.resolver);
    let app_handle = app.clone();

    let handle = tauri::async_runtime::spawn(async move {
        let resolved = resolver.resolve(&ticket.url).await;
        let callback_app = app_handle.clone();
        let scheduled = app_handle.run_on_main_thread(move || {
            apply_icon_result(&callback_app, ticket, resolved);
        });
        if let Err(err) = scheduled {
            log::error!("failed to schedule favicon result: {}", err);
        }
    });
    jobs.track(&record_id, handle);
    Ok(())
}

fn apply_icon_result(app: &AppHandle, ticket: IconTicket, resolved: Option<PathBuf>) {
    let state = app.state::<AppState>();
    match lock(&state.icon_jobs, "icon jobs") {
        Ok(mut jobs) => jobs.finish(&ticket.record_id),
        Err(err) => log::error!("{}", err),
    }

    let Some(path) = resolved else {
        return;
    };
    let icon_path = match path_to_string(&path) {
        Ok(icon_path) => icon_path,
        Err(err) => {
            log::error!("cannot store favicon path: {}", err);
            return;
        }
    };

    let outcome = match lock(&state.library, "library") {
        Ok(mut library) => library.apply_icon(&ticket, &icon_path),
        Err(err) => {
            log::error!("{}", err);
            return;
        }
    };
    match outcome {
        Ok(IconApplyOutcome::Applied) => {
            if let Err(err) = publish_rows(app, &state) {
                log::error!("failed to refresh rows after favicon: {}", err);
            }
        }
        Ok(IconApplyOutcome::RecordMissing) => {
            log::info!("record {} is gone, dropping favicon {}", ticket.record_id, icon_path);
        }
        Ok(IconApplyOutcome::UrlChanged) => {
            log::warn!("record {} changed url since fetch started, dropping favicon", ticket.record_id);
        }
        Err(err) => {
            log::error!("failed to save favicon for {}: {}", ticket.record_id, err);
        }
    }
}

fn delete_record_internal(state: &AppState, id: &str) -> Result<(), String> {
    let orphaned_icon = {
        let mut library = lock(&state.library, "library")?;
        let mut jobs = lock(&state.icon_jobs, "icon jobs")?;
        let removed = library.delete(id).map_err(|err| err.to_string())?;
        jobs.cancel(id);
        library.orphaned_icon(&removed, state.resolver.favicons_dir(), |record_id| {
            jobs.is_tracking(record_id)
        })
    };

    if let Some(icon_path) = orphaned_icon {
        if let Err(err) = remove_favicon_file(&icon_path) {
            log::warn!("{}", err);
        }
    }
    log::info!("deleted record {}", id);
    Ok(())
}

#[tauri::command]
fn load_records(state: State<'_, AppState>) -> Result<Vec<RecordRow>, String> {
    current_rows(&state)
}

#[tauri::command]
fn set_list_mode(
    app: AppHandle,
    state: State<'_, AppState>,
    mode: ListMode,
) -> Result<Vec<RecordRow>, String> {
    {
        let mut settings = lock(&state.settings, "settings")?;
        let library = lock(&state.library, "library")?;
        let candidate = AppSettings {
            list_mode: mode,
            ..settings.clone()
        };
        candidate
            .save(library.preferences())
            .map_err(|err| err.to_string())?;
        *settings = candidate;
    }
    publish_rows(&app, &state)
}

#[tauri::command]
fn record_scan(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: String,
) -> Result<Vec<RecordRow>, String> {
    record_scan_internal(&app, &state, &payload)
}

#[tauri::command]
fn edit_record_text(
    app: AppHandle,
    state: State<'_, AppState>,
    id: String,
    text: String,
) -> Result<Vec<RecordRow>, String> {
    let changed = lock(&state.library, "library")?
        .update_text(&id, &text)
        .map_err(|err| err.to_string())?;
    if changed {
        publish_rows(&app, &state)
    } else {
        current_rows(&state)
    }
}

#[tauri::command]
fn toggle_favorite(
    app: AppHandle,
    state: State<'_, AppState>,
    id: String,
) -> Result<Vec<RecordRow>, String> {
    lock(&state.library, "library")?
        .toggle_favorite(&id)
        .map_err(|err| err.to_string())?;
    publish_rows(&app, &state)
}

#[tauri::command]
fn delete_record(
    app: AppHandle,
    state: State<'_, AppState>,
    id: String,
) -> Result<Vec<RecordRow>, String> {
    delete_record_internal(&state, &id)?;
    let mut confirmation = lock(&state.delete_confirmation, "delete confirmation")?;
    if confirmation.pending() == Some(id.as_str()) {
        confirmation.cancel();
    }
    drop(confirmation);
    publish_rows(&app, &state)
}

#[tauri::command]
fn request_delete_confirmation(
    state: State<'_, AppState>,
    id: String,
) -> Result<DeletePrompt, String> {
    let library = lock(&state.library, "library")?;
    let record = library
        .get(&id)
        .ok_or_else(|| AppError::RecordNotFound(id.clone()).to_string())?;
    let mut confirmation = lock(&state.delete_confirmation, "delete confirmation")?;
    Ok(confirmation.request(record))
}

#[tauri::command]
fn confirm_delete(
    app: AppHandle,
    state: State<'_, AppState>,
    id: String,
) -> Result<Vec<RecordRow>, String> {
    let confirmed = lock(&state.delete_confirmation, "delete confirmation")?.confirm(&id);
    let Some(id) = confirmed else {
        return Err("no delete is pending for this item".to_string());
    };
    delete_record_internal(&state, &id)?;
    publish_rows(&app, &state)
}

#[tauri::command]
fn cancel_delete(state: State<'_, AppState>) -> Result<(), String> {
    lock(&state.delete_confirmation, "delete confirmation")?.cancel();
    Ok(())
}

#[tauri::command]
fn open_record_url(app: AppHandle, state: State<'_, AppState>, id: String) -> Result<(), String> {
    let raw_url = lock(&state.library, "library")?
        .get(&id)
        .map(|record| record.url.clone())
        .ok_or_else(|| AppError::RecordNotFound(id.clone()).to_string())?;
    let url = openable_url(&raw_url).map_err(str::to_string)?;
    app.opener()
        .open_url(url.as_str(), None::<&str>)
        .map_err(|err| {
            log::warn!("no handler for {}: {}", url, err);
            NO_HANDLER_MESSAGE.to_string()
        })
}

#[tauri::command]
fn scan_begin(state: State<'_, AppState>) -> Result<ScanState, String> {
    let mut session = lock(&state.scan_session, "scan session")?;
    Ok(session.begin().clone())
}

#[tauri::command]
fn scan_permission_status(state: State<'_, AppState>, granted: bool) -> Result<ScanState, String> {
    let mut session = lock(&state.scan_session, "scan session")?;
    Ok(session.permission_status(granted).clone())
}

#[tauri::command]
fn scan_permission_result(state: State<'_, AppState>, granted: bool) -> Result<ScanState, String> {
    let mut session = lock(&state.scan_session, "scan session")?;
    Ok(session.permission_result(granted).clone())
}

/// Returns the refreshed rows when this frame produced the session's result.
#[tauri::command]
fn scan_frame(
    app: AppHandle,
    state: State<'_, AppState>,
    raw_values: Vec<Option<String>>,
) -> Result<Option<Vec<RecordRow>>, String> {
    let accepted = lock(&state.scan_session, "scan session")?.offer_frame(&raw_values);
    match accepted {
        Some(payload) => record_scan_internal(&app, &state, &payload).map(Some),
        None => Ok(None),
    }
}

#[tauri::command]
fn scan_camera_failed(state: State<'_, AppState>, reason: String) -> Result<ScanState, String> {
    let mut session = lock(&state.scan_session, "scan session")?;
    session.camera_failed(&reason);
    Ok(session.state().clone())
}

#[tauri::command]
fn scan_cancel(state: State<'_, AppState>) -> Result<ScanState, String> {
    let mut session = lock(&state.scan_session, "scan session")?;
    session.cancel();
    Ok(session.state().clone())
}

#[tauri::command]
fn get_settings(state: State<'_, AppState>) -> Result<AppSettings, String> {
    let settings = lock(&state.settings, "settings")?;
    Ok(settings.clone())
}

#[tauri::command]
fn update_settings(
    app: AppHandle,
    state: State<'_, AppState>,
    settings: AppSettings,
) -> Result<AppSettings, String> {
    let normalized = settings.normalized();
    let list_mode_changed = {
        let mut current = lock(&state.settings, "settings")?;
        let library = lock(&state.library, "library")?;
        normalized
            .save(library.preferences())
            .map_err(|err| err.to_string())?;
        let changed = current.list_mode != normalized.list_mode;
        *current = normalized.clone();
        changed
    };
    if list_mode_changed {
        publish_rows(&app, &state)?;
    }
    Ok(normalized)
}

fn initialize_state(app: &AppHandle) -> Result<AppState, Box<dyn std::error::Error>> {
    let data_dir = app_root_path(app)?;
    let favicons_dir = data_dir.join(FAVICONS_DIR_NAME);
    fs::create_dir_all(&favicons_dir)?;
    app.asset_protocol_scope()
        .allow_directory(&favicons_dir, false)?;

    let prefs = PreferenceStore::open(&data_dir.join(DB_FILE_NAME))?;
    let settings = AppSettings::load(&prefs);
    let library = ScanLibrary::open(prefs);
    let resolver = FaviconResolver::new(HttpIconFetcher::new()?, favicons_dir);
    log::info!(
        "qrhub data in {}, favicons in {}",
        data_dir.display(),
        resolver.favicons_dir().display()
    );
    Ok(AppState::new(library, settings, resolver))
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let log_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().level(log_level).build())
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let state = initialize_state(app.handle())?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            load_records,
            set_list_mode,
            record_scan,
            edit_record_text,
            toggle_favorite,
            delete_record,
            request_delete_confirmation,
            confirm_delete,
            cancel_delete,
            open_record_url,
            scan_begin,
            scan_permission_status,
            scan_permission_result,
            scan_frame,
            scan_camera_failed,
            scan_cancel,
            get_settings,
            update_settings
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<AppState>() {
                    if let Ok(mut jobs) = state.icon_jobs.lock() {
                        jobs.cancel_all();
                    }
                }
            }
        });
}
