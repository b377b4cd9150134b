// 目录浏览
//
// 只列出直接子条目；无法读取的条目直接忽略

use std::fs::{self, DirEntry, File};
use std::sync::Arc;

use tracing::debug;

use super::resolver::PathResolver;
use super::types::*;
use crate::config::FilesystemConfig;

/// 目录浏览服务
pub struct DirectoryRenderer {
    resolver: Arc<PathResolver>,
    config: FilesystemConfig,
}

impl DirectoryRenderer {
    pub fn new(resolver: Arc<PathResolver>, config: FilesystemConfig) -> Self {
        Self { resolver, config }
    }

    /// 列出目录内容
    pub fn list(&self, location: &ResolvedPath) -> Result<DirectoryListing, FsError> {
        let metadata = fs::metadata(&location.absolute_path)
            .map_err(|e| FsError::from_io(&e, location.relative_path.clone()))?;

        if !metadata.is_dir() {
            return Err(FsError::new(FsErrorCode::NotADirectory).with_path(location.relative_path.clone()));
        }

        let read_dir = fs::read_dir(&location.absolute_path).map_err(|e| {
            tracing::warn!("读取目录失败: {:?}, 错误: {}", location.absolute_path, e);
            FsError::from_io(&e, location.relative_path.clone())
        })?;

        let mut entries: Vec<DirectoryEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| self.to_directory_entry(location, &entry))
            .collect();

        sort_entries(&mut entries);

        Ok(DirectoryListing {
            location: location.clone(),
            parent: location.parent_relative(),
            entries,
        })
    }

    /// 将 DirEntry 转换为 DirectoryEntry，不可读或被过滤时返回 None
    fn to_directory_entry(&self, location: &ResolvedPath, entry: &DirEntry) -> Option<DirectoryEntry> {
        // 非 UTF-8 文件名无法编码进链接，也就无法再解析回来
        let Ok(name) = entry.file_name().into_string() else {
            debug!("跳过非 UTF-8 文件名: {:?}", entry.path());
            return None;
        };

        // 过滤隐藏文件
        if !self.config.show_hidden && name.starts_with('.') {
            return None;
        }

        let relative_path = location.child_relative(&name);
        let path = entry.path();
        let mut file_type = entry.file_type().ok()?;

        if file_type.is_symlink() {
            if !self.config.follow_symlinks {
                return None;
            }
            // 指向根目录之外的链接不展示
            if self.resolver.resolve(Some(&location.root.name), &relative_path).is_err() {
                debug!("跳过逃出根目录的符号链接: {:?}", path);
                return None;
            }
            file_type = fs::metadata(&path).ok()?.file_type();
        }

        let (is_directory, size) = if file_type.is_dir() {
            fs::read_dir(&path).ok()?;
            (true, None)
        } else if file_type.is_file() {
            let file = File::open(&path).ok()?;
            (false, file.metadata().ok().map(|m| m.len()))
        } else {
            // FIFO、套接字、设备文件：打开可能阻塞，只展示不探测
            (false, None)
        };

        Some(DirectoryEntry {
            icon: if is_directory {
                None
            } else {
                get_icon_for_extension(&path)
            },
            name,
            is_directory,
            relative_path,
            size,
        })
    }
}

/// 文件夹在前，同类按名称（忽略大小写）排序
fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}
