// 路径解析与安全守卫
//
// (根名称, 相对路径) -> 绝对路径，保证结果不会逃出根目录

use std::path::{is_separator, Component, Path};
use std::sync::Arc;

use tracing::warn;

use super::roots::RootRegistry;
use super::types::{FsError, FsErrorCode, ResolvedPath, Root};

/// 路径解析器
///
/// 所有访问磁盘的组件都必须经过这里拿到路径，不允许自行拼接
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<RootRegistry>,
}

impl PathResolver {
    pub fn new(registry: Arc<RootRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RootRegistry {
        &self.registry
    }

    /// 解析客户端提供的路径
    ///
    /// 根名称缺省或未知时使用主存储
    pub fn resolve(&self, root_name: Option<&str>, relative_path: &str) -> Result<ResolvedPath, FsError> {
        let root = self
            .registry
            .lookup_or_primary(root_name)
            .ok_or_else(|| {
                FsError::new(FsErrorCode::NotFound).with_message("No storage root is available")
            })?
            .clone();

        // 纯字符串层面的检查，失败时不触碰磁盘
        let segments = normalize_segments(relative_path)?;

        let mut absolute_path = root.base_path.clone();
        absolute_path.extend(segments.iter());

        ensure_contained(&root, &absolute_path, relative_path)?;

        Ok(ResolvedPath {
            relative_path: segments.join("/"),
            absolute_path,
            root,
        })
    }

    /// 在已解析目录下解析单个名称（上传落盘时使用）
    pub fn resolve_child(&self, parent: &ResolvedPath, name: &str) -> Result<ResolvedPath, FsError> {
        if name.is_empty() || name == "." || name == ".." || name.chars().any(is_separator) {
            return Err(FsError::new(FsErrorCode::InvalidPathFormat).with_path(name));
        }
        self.resolve(Some(&parent.root.name), &parent.child_relative(name))
    }
}

/// 规范化相对路径：去掉空段和 "."，".." 回退一级
///
/// 回退越过根目录时返回 PathEscape
pub fn normalize_segments(path: &str) -> Result<Vec<String>, FsError> {
    if path.contains('\0') {
        return Err(FsError::new(FsErrorCode::InvalidPathFormat).with_path(path.replace('\0', "")));
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in path.split(is_separator) {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    warn!("检测到路径穿越: {:?}", path);
                    return Err(FsError::new(FsErrorCode::PathEscape).with_path(path));
                }
            }
            other => {
                // Windows 盘符 / UNC 前缀会覆盖根目录
                if matches!(Path::new(other).components().next(), Some(Component::Prefix(_))) {
                    warn!("拒绝带盘符前缀的路径: {:?}", path);
                    return Err(FsError::new(FsErrorCode::PathEscape).with_path(path));
                }
                segments.push(other.to_string());
            }
        }
    }

    Ok(segments)
}

/// 规范化最深的已存在祖先，确认仍以根目录为前缀（防止符号链接逃逸）
fn ensure_contained(root: &Root, absolute_path: &Path, requested: &str) -> Result<(), FsError> {
    let mut probe: Option<&Path> = Some(absolute_path);

    while let Some(current) = probe {
        if !current.starts_with(&root.base_path) {
            break;
        }

        if let Ok(canonical) = dunce::canonicalize(current) {
            if canonical.starts_with(&root.base_path) {
                return Ok(());
            }
            warn!(
                "路径经符号链接逃出根目录: {:?} -> {:?} (root={})",
                requested, canonical, root.name
            );
            return Err(FsError::new(FsErrorCode::PathEscape).with_path(requested));
        }

        probe = current.parent();
    }

    // 根目录本身已不可访问
    Err(FsError::new(FsErrorCode::NotFound)
        .with_message(format!("Storage root '{}' is not accessible", root.name))
        .with_path(root.base_path.to_string_lossy().to_string()))
}
