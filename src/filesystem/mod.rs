// 本地文件系统模块
//
// 根目录发现、路径解析（含越界防护）、目录浏览与批量删除

mod listing;
mod remove;
mod resolver;
mod roots;
mod types;

pub use listing::DirectoryRenderer;
pub use remove::{remove_entries, DeleteSummary};
pub use resolver::{normalize_segments, PathResolver};
pub use roots::{derive_mount_root, RootRegistry, PRIMARY_ROOT, REMOVABLE_ROOT_PREFIX};
pub use types::*;
