// 挂载点检测模块（用于发现 U 盘、SD 卡等可移动介质）

use std::collections::HashSet;
use std::path::PathBuf;

/// 挂载点信息
#[derive(Debug, Clone)]
pub struct MountPoint {
    /// 挂载点路径
    pub path: String,
    /// 文件系统类型
    pub fs_type: String,
    /// 设备名称
    pub device: String,
}

/// 系统路径（这些路径通常是系统自动挂载的）
const SYSTEM_PATHS: &[&str] = &[
    "/", "/proc", "/sys", "/dev", "/run", "/tmp", "/var", "/usr", "/bin", "/sbin", "/lib",
    "/lib64", "/boot", "/root", "/home", "/etc", "/opt", "/snap",
];

/// 伪文件系统类型
const SPECIAL_FS_TYPES: &[&str] = &[
    "proc",
    "sysfs",
    "devpts",
    "tmpfs",
    "cgroup",
    "cgroup2",
    "mqueue",
    "hugetlbfs",
    "devtmpfs",
    "securityfs",
    "pstore",
    "bpf",
    "tracefs",
    "debugfs",
    "fusectl",
    "configfs",
    "overlay",
    "squashfs",
    "autofs",
    "binfmt_misc",
    "nsfs",
];

/// 挂载点检测器
pub struct MountDetector;

impl MountDetector {
    /// 获取所有非系统挂载点
    ///
    /// 读取 /proc/mounts 文件并过滤系统挂载点，非 Linux 平台返回空列表
    pub fn get_mount_points() -> Vec<MountPoint> {
        #[cfg(target_os = "linux")]
        {
            match std::fs::read_to_string("/proc/mounts") {
                Ok(content) => Self::parse_mounts(&content),
                Err(e) => {
                    tracing::debug!("读取 /proc/mounts 失败: {}", e);
                    Vec::new()
                }
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            Vec::new()
        }
    }

    /// 可作为存储根目录的挂载路径
    pub fn removable_paths() -> Vec<PathBuf> {
        Self::get_mount_points()
            .into_iter()
            .map(|mount| PathBuf::from(mount.path))
            .collect()
    }

    /// 解析 /proc/mounts 格式的内容
    pub fn parse_mounts(content: &str) -> Vec<MountPoint> {
        let special: HashSet<&str> = SPECIAL_FS_TYPES.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut mounts = Vec::new();

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let device = parts[0];
            // /proc/mounts 中空格被转义为 \040
            let mount_point = parts[1].replace("\\040", " ");
            let fs_type = parts[2];

            let is_system_path = SYSTEM_PATHS.iter().any(|&sys_path| {
                mount_point == sys_path
                    || (sys_path != "/" && mount_point.starts_with(&format!("{}/", sys_path)))
            });

            if is_system_path || special.contains(fs_type) {
                continue;
            }

            // 同一路径可能被多次挂载，只保留第一条
            if !seen.insert(mount_point.clone()) {
                continue;
            }

            mounts.push(MountPoint {
                path: mount_point,
                fs_type: fs_type.to_string(),
                device: device.to_string(),
            });
        }

        mounts
    }
}
