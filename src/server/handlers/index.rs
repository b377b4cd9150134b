// 首页

use axum::extract::State;
use axum::response::Html;

use crate::server::render;
use crate::server::state::AppState;

/// GET /
/// 列出所有存储根目录
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render::index_page(state.registry.roots()))
}
