use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use stock::PriceSource;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, instrument, warn};

use crate::{AppState, error::AppError};

#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    pub file: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("File not found".to_string())
}

/// Stream a previously written price table as an attachment. Only files that
/// resolve inside the data directory are served.
#[instrument(name = "download", skip_all)]
pub async fn download<S: PriceSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<DownloadParams>,
    request: Request,
) -> Result<Response, AppError> {
    let Some(requested) = params.file.filter(|f| !f.trim().is_empty()) else {
        return Err(not_found());
    };

    let root = tokio::fs::canonicalize(&state.config.data_dir)
        .await
        .map_err(|_| not_found())?;
    let path = tokio::fs::canonicalize(&requested)
        .await
        .map_err(|_| not_found())?;

    if !path.starts_with(&root) {
        warn!(path = %path.display(), "download outside data directory refused");
        return Err(not_found());
    }
    let meta = tokio::fs::metadata(&path).await.map_err(|_| not_found())?;
    if !meta.is_file() {
        return Err(not_found());
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("prices.csv")
        .replace('"', "");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))?;
    info!(file = %path.display(), bytes = meta.len(), "serving download");

    let mut res = match ServeFile::new(&path).oneshot(request).await {
        Ok(res) => res,
        Err(never) => match never {},
    };
    if res.status().is_success() {
        let headers = res.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(res.into_response())
}
