// 宿主平台协作接口
//
// 服务核心只依赖两类外部能力：
// - HostPlatform：权限标记、辅助存储目录、局域网地址
// - ServerListener：服务启动/停止通知

mod system;

use std::path::PathBuf;

pub use system::{LoggingListener, SystemPlatform};

/// 宿主平台提供的查询能力
pub trait HostPlatform: Send + Sync {
    /// 宿主是否已授予完整文件系统访问权限
    fn has_broad_filesystem_access(&self) -> bool;

    /// 辅助存储目录列表
    ///
    /// 下标 0 对应主存储，其余为可移动介质；路径可能带有应用私有后缀
    fn secondary_storage_mounts(&self) -> Vec<PathBuf>;

    /// 当前局域网地址（不含端口）
    fn current_lan_address(&self) -> Option<String>;
}

/// 服务状态通知
pub trait ServerListener: Send + Sync {
    fn on_server_started(&self, address: &str);

    fn on_server_stopped(&self);
}
