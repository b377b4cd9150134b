// 批量删除
//
// 尽力而为：单个条目失败只记录并跳过，不回滚已删除的条目

use std::fs;

use tracing::{info, warn};

use super::resolver::PathResolver;
use super::types::{FsError, FsErrorCode};

/// 删除结果汇总
#[derive(Debug, Default)]
pub struct DeleteSummary {
    /// 成功删除的条目数
    pub deleted: usize,
    /// 被跳过的条目及原因
    pub skipped: Vec<FsError>,
}

/// 删除同一根目录下的多个条目（目录递归删除）
pub fn remove_entries<S: AsRef<str>>(resolver: &PathResolver, root: Option<&str>, paths: &[S]) -> DeleteSummary {
    let mut summary = DeleteSummary::default();

    for path in paths {
        let path = path.as_ref();
        match remove_entry(resolver, root, path) {
            Ok(()) => summary.deleted += 1,
            Err(e) => {
                warn!("跳过删除: {}", e);
                summary.skipped.push(e);
            }
        }
    }

    info!(
        "删除完成: 成功 {} 个, 跳过 {} 个",
        summary.deleted,
        summary.skipped.len()
    );
    summary
}

fn remove_entry(resolver: &PathResolver, root: Option<&str>, path: &str) -> Result<(), FsError> {
    let resolved = resolver.resolve(root, path)?;

    // 根目录本身永远不删
    if resolved.is_root() {
        return Err(FsError::new(FsErrorCode::AccessDenied)
            .with_message("Refusing to delete a storage root")
            .with_path(resolved.root.name.clone()));
    }

    // symlink_metadata：删除链接本身而不是其目标
    let metadata = fs::symlink_metadata(&resolved.absolute_path)
        .map_err(|e| FsError::from_io(&e, resolved.relative_path.clone()))?;

    if metadata.permissions().readonly() {
        return Err(FsError::new(FsErrorCode::AccessDenied).with_path(resolved.relative_path.clone()));
    }

    let result = if metadata.is_dir() {
        fs::remove_dir_all(&resolved.absolute_path)
    } else {
        fs::remove_file(&resolved.absolute_path)
    };

    result.map_err(|e| FsError::from_io(&e, resolved.relative_path.clone()))?;
    info!("已删除: {}/{}", resolved.root.name, resolved.relative_path);
    Ok(())
}
