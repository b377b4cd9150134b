// 目录浏览

use axum::extract::{Query, State};
use axum::response::Html;
use serde::Deserialize;
use tracing::warn;

use super::run_blocking;
use crate::filesystem::FsError;
use crate::server::render;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub root: Option<String>,
    #[serde(default)]
    pub path: String,
}

/// GET /browse?root=internal&path=DCIM/Camera
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Html<String>, FsError> {
    let location = state.resolver.resolve(query.root.as_deref(), &query.path)?;

    let renderer = state.renderer.clone();
    let listing = run_blocking(move || renderer.list(&location))
        .await
        .map_err(|e| {
            warn!("目录浏览失败: {}", e);
            e.with_message("Directory not found or access denied")
        })?;

    Ok(Html(render::directory_page(&listing)))
}
