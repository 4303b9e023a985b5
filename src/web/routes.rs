//! HTTP routes: the page, the figure callback and the static export.

use crate::charts::{ChoroplethBuilder, RenderError, StaticMapRenderer};
use crate::web::error::ApiError;
use crate::web::layout;
use crate::web::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::path::Path;
use tower_http::trace::TraceLayer;

const DASHBOARD_JS: &str = include_str!("../../assets/dashboard.js");
const DASHBOARD_CSS: &str = include_str!("../../assets/dashboard.css");

const DEFAULT_SVG_SIZE: (u32, u32) = (960, 720);
const MAX_SVG_SIDE: u32 = 4096;

#[derive(Debug, Deserialize)]
pub struct ColumnQuery {
    pub column: Option<String>,
}

impl ColumnQuery {
    /// Selected column; an empty value counts as no selection.
    fn selected(&self) -> Option<&str> {
        self.column.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub column: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/api/figure", get(figure))
        .route("/api/summary", get(summary))
        .route("/api/map.svg", get(map_svg))
        .route("/assets/dashboard.js", get(dashboard_js))
        .route("/assets/dashboard.css", get(dashboard_css))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

async fn index(State(state): State<AppState>) -> Html<String> {
    match state.dashboard.dataset() {
        Some(dataset) => Html(layout::dashboard_page(dataset.index_columns())),
        None => Html(layout::error_page(
            &file_label(&state.config.boundaries_path),
            &file_label(&state.config.statistics_path),
        )),
    }
}

/// The dropdown callback.
async fn figure(
    State(state): State<AppState>,
    Query(query): Query<ColumnQuery>,
) -> Result<Response, ApiError> {
    let dataset = state.dashboard.dataset().ok_or(ApiError::Unavailable)?;
    let column = query.selected();
    if let Some(column) = column.filter(|c| !dataset.has_column(c)) {
        tracing::debug!("Column '{}' not in merged table, showing base map", column);
    }

    let figure = ChoroplethBuilder::update_map(dataset, column);
    tracing::debug!(colored = figure.is_colored(), "Figure updated");
    Ok(Json(figure).into_response())
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<ColumnQuery>,
) -> Result<Response, ApiError> {
    let dataset = state.dashboard.dataset().ok_or(ApiError::Unavailable)?;
    let column = query
        .selected()
        .ok_or_else(|| ApiError::BadRequest("missing 'column' parameter".to_string()))?;
    let summary = dataset
        .summary(column)
        .ok_or_else(|| ApiError::NotFound(format!("column '{}'", column)))?;
    Ok(Json(summary).into_response())
}

async fn map_svg(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    if state.dashboard.dataset().is_none() {
        return Err(ApiError::Unavailable);
    }

    let width = query.width.unwrap_or(DEFAULT_SVG_SIZE.0).min(MAX_SVG_SIDE);
    let height = query.height.unwrap_or(DEFAULT_SVG_SIZE.1).min(MAX_SVG_SIDE);
    let column = query
        .column
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let rendered = tokio::task::spawn_blocking(move || {
        let dataset = state.dashboard.dataset().ok_or(ApiError::Unavailable)?;
        StaticMapRenderer::render_svg(dataset, column.as_deref(), width, height).map_err(
            |e| match e {
                err @ RenderError::TooSmall(..) => ApiError::BadRequest(err.to_string()),
                RenderError::Drawing(msg) => ApiError::Internal(msg),
            },
        )
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], rendered).into_response())
}

async fn dashboard_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        DASHBOARD_JS,
    )
}

async fn dashboard_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], DASHBOARD_CSS)
}
