use metrics_exporter_prometheus::PrometheusHandle;
use ptw::config::AppConfig;
use ptw::error::AppError;
use ptw::workflows::permits::SqlitePermitStore;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Open the configured database, or `database` when the caller overrides it.
pub(crate) fn open_store(
    config: &AppConfig,
    database: Option<&Path>,
) -> Result<Arc<SqlitePermitStore>, AppError> {
    let path: PathBuf = database
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.database.path.clone());
    Ok(Arc::new(SqlitePermitStore::open(path)?))
}

/// Only JPEG and PNG uploads are accepted from the command line.
pub(crate) fn ensure_supported_photo(path: &Path) -> Result<(), AppError> {
    let guess = mime_guess::from_path(path).first();
    match guess {
        Some(mime) if mime == mime_guess::mime::IMAGE_JPEG || mime == mime_guess::mime::IMAGE_PNG => {
            Ok(())
        }
        _ => Err(AppError::InvalidInput(format!(
            "{} is not a JPG or PNG image",
            path.display()
        ))),
    }
}

pub(crate) fn read_photo(path: &Path) -> Result<Vec<u8>, AppError> {
    ensure_supported_photo(path)?;
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(bytes)
}
