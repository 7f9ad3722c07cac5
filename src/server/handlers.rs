use super::types::{CSV_MEDIA_TYPE, CsvPredictions};
use crate::{
    Error, Result,
    model::{ModelLoader, Table},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<ModelLoader>,
}

impl AppState {
    pub fn new(loader: ModelLoader) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }
}

/// Healthy iff the model can be loaded. The first ping triggers the load.
pub async fn ping(State(state): State<AppState>) -> Response {
    let status = match state.loader.get_model().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!("Health check failed: {}", e);
            StatusCode::NOT_FOUND
        }
    };

    (status, [(header::CONTENT_TYPE, "application/json")], "\n").into_response()
}

pub async fn invocations(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<CsvPredictions> {
    if !is_csv(&headers) {
        return Err(Error::UnsupportedMediaType);
    }

    let table = Table::from_csv(&body)?;
    info!("Invoked with {} records", table.n_rows());
    debug!("Parsed input:\n{}", table);

    let model = state.loader.get_model().await?;
    let predictions = model.predict(&table)?;

    Ok(CsvPredictions(predictions))
}

/// Compares the media type only; parameters such as `charset` are ignored.
fn is_csv(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(CSV_MEDIA_TYPE))
}
