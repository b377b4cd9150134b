// 批量删除

use axum::extract::State;
use axum::response::Redirect;
use axum::Form;

use super::{all_params, first_param, run_blocking};
use crate::filesystem::{remove_entries, FsError};
use crate::server::render::browse_url;
use crate::server::state::AppState;

/// POST /delete  (root, currentPath, paths...)
///
/// 删除失败的条目直接跳过，完成后回到当前目录
pub async fn delete_entries(
    State(state): State<AppState>,
    Form(params): Form<Vec<(String, String)>>,
) -> Result<Redirect, FsError> {
    let root = first_param(&params, "root").map(str::to_string);
    let current_path = first_param(&params, "currentPath").unwrap_or_default().to_string();
    let paths: Vec<String> = all_params(&params, "paths")
        .into_iter()
        .map(str::to_string)
        .collect();

    let resolver = state.resolver.clone();
    let task_root = root.clone();
    run_blocking(move || Ok(remove_entries(&resolver, task_root.as_deref(), &paths))).await?;

    let root_name = state
        .registry
        .lookup_or_primary(root.as_deref())
        .map(|r| r.name.clone())
        .unwrap_or_default();

    Ok(Redirect::to(&browse_url(&root_name, &current_path)))
}
