// 路径验证模块（用于临时 ZIP 目录等服务端自用目录）

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 路径验证结果
#[derive(Debug, Clone)]
pub struct PathValidationResult {
    /// 路径是否完全可用
    pub valid: bool,
    /// 路径是否存在
    pub exists: bool,
    /// 路径是否可写
    pub is_writable: bool,
    /// 是否是目录
    pub is_directory: bool,
    /// 验证消息
    pub message: String,
}

impl PathValidationResult {
    fn success() -> Self {
        Self {
            valid: true,
            exists: true,
            is_writable: true,
            is_directory: true,
            message: "路径验证通过".to_string(),
        }
    }

    fn failure(exists: bool, is_directory: bool, message: &str) -> Self {
        Self {
            valid: false,
            exists,
            is_writable: false,
            is_directory,
            message: message.to_string(),
        }
    }
}

/// 路径验证器
pub struct PathValidator;

impl PathValidator {
    /// 验证路径是否为可写目录
    pub fn validate(path: &Path) -> PathValidationResult {
        if !path.exists() {
            return PathValidationResult::failure(false, false, "路径不存在");
        }

        if !path.is_dir() {
            return PathValidationResult::failure(true, false, "路径不是目录");
        }

        if !Self::check_writable(path) {
            return PathValidationResult::failure(true, true, "路径不可写");
        }

        PathValidationResult::success()
    }

    /// 通过创建临时文件的方式检测写入权限
    pub fn check_writable(path: &Path) -> bool {
        let test_file = path.join(format!(".write_test_{}", uuid::Uuid::new_v4()));

        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
                true
            }
            Err(_) => false,
        }
    }

    /// 自动创建目录（如果不存在）并确认可写
    pub fn prepare_writable_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("无法创建目录: {:?}", path))?;
            tracing::info!("自动创建目录: {:?}", path);
        }

        let result = Self::validate(path);
        if !result.valid {
            anyhow::bail!("{}: {:?}", result.message, path);
        }

        Ok(())
    }
}
