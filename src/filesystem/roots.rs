// 存储根目录发现
//
// 启动时枚举一次，服务运行期间不可变

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::types::Root;
use crate::config::StorageConfig;
use crate::platform::HostPlatform;

/// 主存储根目录的固定名称
pub const PRIMARY_ROOT: &str = "internal";

/// 可移动介质根目录的名称前缀
pub const REMOVABLE_ROOT_PREFIX: &str = "sdcard";

/// 与动态路由冲突的名称
const RESERVED_NAMES: &[&str] = &["browse", "download", "upload", "delete"];

/// 已注册的存储根目录（按注册顺序）
#[derive(Debug, Clone, Default)]
pub struct RootRegistry {
    roots: Vec<Root>,
}

impl RootRegistry {
    /// 根据配置和宿主能力发现所有可访问的根目录
    ///
    /// 主存储不可用时返回空注册表
    pub fn discover(storage: &StorageConfig, platform: &dyn HostPlatform) -> Self {
        let mut registry = Self::default();

        if !registry.register(PRIMARY_ROOT, &storage.primary_dir) {
            error!("主存储目录不可用: {:?}", storage.primary_dir);
            return Self::default();
        }

        if platform.has_broad_filesystem_access() {
            for elevated in &storage.elevated_roots {
                registry.register(&elevated.name, &elevated.path);
            }
        } else {
            debug!("未获得完整文件系统访问权限，跳过提权根目录");
        }

        for (index, dir) in platform
            .secondary_storage_mounts()
            .into_iter()
            .enumerate()
            .skip(1)
        {
            match derive_mount_root(&dir, &storage.app_private_marker) {
                Some(mount_root) => {
                    registry.register(&format!("{}{}", REMOVABLE_ROOT_PREFIX, index), &mount_root);
                }
                None => debug!("无法从辅助存储目录推导挂载根: {:?}", dir),
            }
        }

        info!(
            "发现 {} 个存储根目录: {:?}",
            registry.roots.len(),
            registry.roots.iter().map(|r| r.name.as_str()).collect::<Vec<_>>()
        );

        registry
    }

    /// 从显式的 (名称, 路径) 列表构建
    pub fn from_paths<I, S, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: AsRef<str>,
        P: AsRef<Path>,
    {
        let mut registry = Self::default();
        for (name, path) in paths {
            registry.register(name.as_ref(), path.as_ref());
        }
        registry
    }

    /// 注册根目录；路径不存在、不是目录或名称无效时忽略
    fn register(&mut self, name: &str, path: &Path) -> bool {
        if name.is_empty() || name.contains('/') || RESERVED_NAMES.contains(&name) {
            warn!("根目录名称无效，已忽略: {:?}", name);
            return false;
        }

        if self.get(name).is_some() {
            warn!("根目录名称重复，已忽略: {}", name);
            return false;
        }

        let base_path = match dunce::canonicalize(path) {
            Ok(p) if p.is_dir() => p,
            Ok(_) => {
                debug!("根目录不是目录，已忽略: {} -> {:?}", name, path);
                return false;
            }
            Err(e) => {
                debug!("根目录不存在，已忽略: {} -> {:?} ({})", name, path, e);
                return false;
            }
        };

        self.roots.push(Root {
            name: name.to_string(),
            base_path,
        });
        true
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    pub fn get(&self, name: &str) -> Option<&Root> {
        self.roots.iter().find(|root| root.name == name)
    }

    pub fn primary(&self) -> Option<&Root> {
        self.get(PRIMARY_ROOT)
    }

    /// 按名称查找，缺省或未知名称回退到主存储
    pub fn lookup_or_primary(&self, name: Option<&str>) -> Option<&Root> {
        name.and_then(|n| self.get(n)).or_else(|| self.primary())
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }
}

/// 剥离应用私有后缀，得到可移动介质的挂载根
///
/// 例如 `/storage/1234-ABCD/Android/data/pkg/files` -> `/storage/1234-ABCD`
pub fn derive_mount_root(dir: &Path, marker: &str) -> Option<PathBuf> {
    let raw = dir.to_string_lossy();
    if marker.is_empty() {
        return Some(dir.to_path_buf());
    }

    match raw.find(marker) {
        Some(0) => None,
        Some(pos) => Some(PathBuf::from(&raw[..pos])),
        None => Some(dir.to_path_buf()),
    }
}
