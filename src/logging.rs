//! 日志系统
//!
//! 控制台 + 可选的文件输出；文件按大小滚动，启动时清理过期日志

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LogConfig;

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "wifi-file-transfer.";
const LOG_FILE_SUFFIX: &str = ".log";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 按大小滚动的日志文件
///
/// 文件名：wifi-file-transfer.YYYY-MM-DD-HHMMSS[_N].log
struct RollingFile {
    log_dir: PathBuf,
    /// 启动时间戳，同一进程的所有滚动文件共用
    started_at: String,
    file: File,
    index: u32,
    written: u64,
    max_file_size: u64,
}

impl RollingFile {
    fn open(log_dir: PathBuf, max_file_size: u64) -> io::Result<Self> {
        let started_at = Local::now().format("%Y-%m-%d-%H%M%S").to_string();
        let file = open_append(&file_path(&log_dir, &started_at, 0))?;
        Ok(Self {
            log_dir,
            started_at,
            file,
            index: 0,
            written: 0,
            max_file_size,
        })
    }

    fn write_data(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 空文件不滚动，单条超长日志也要能写下
        if self.written > 0 && self.written + buf.len() as u64 > self.max_file_size {
            self.file.flush()?;
            self.index += 1;
            self.file = open_append(&file_path(&self.log_dir, &self.started_at, self.index))?;
            self.written = 0;
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

fn file_path(log_dir: &Path, started_at: &str, index: u32) -> PathBuf {
    let name = if index == 0 {
        format!("{}{}{}", LOG_FILE_PREFIX, started_at, LOG_FILE_SUFFIX)
    } else {
        format!("{}{}_{}{}", LOG_FILE_PREFIX, started_at, index, LOG_FILE_SUFFIX)
    };
    log_dir.join(name)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// 日志文件写入器（可克隆，供 non_blocking 工作线程使用）
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl LogFileWriter {
    pub fn new(log_dir: PathBuf, max_file_size: u64) -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RollingFile::open(log_dir, max_file_size)?)),
        })
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write_data(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().file.flush()
    }
}

/// 日志守卫，必须保持存活直到进程退出
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化日志系统
///
/// 日志目录或文件无法创建时退回到仅控制台输出；重复初始化时忽略
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(true);

    let (file_writer, file_guard) = match file_writer(config) {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };
    let file_enabled = file_writer.is_some();

    // 文件输出层（不带 ANSI 颜色）
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_target(true)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_ansi(false)
            .with_writer(writer)
    });

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        // 已有全局订阅器（例如测试中多次初始化）
        return LogGuard { _file_guard: None };
    }

    if file_enabled {
        info!(
            "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}, 单文件最大={:.1}MB",
            config.log_dir,
            config.retention_days,
            config.level,
            config.max_file_size as f64 / 1024.0 / 1024.0
        );
        cleanup_old_logs(&config.log_dir, config.retention_days);
    } else {
        info!("日志系统初始化完成（仅控制台输出）");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn file_writer(config: &LogConfig) -> Option<(NonBlocking, WorkerGuard)> {
    if !config.enabled {
        return None;
    }

    if let Err(e) = fs::create_dir_all(&config.log_dir) {
        eprintln!("创建日志目录失败: {:?}, 错误: {}，回退到仅控制台输出", config.log_dir, e);
        return None;
    }

    let writer = match LogFileWriter::new(config.log_dir.clone(), config.max_file_size) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("创建日志文件失败: {}，回退到仅控制台输出", e);
            return None;
        }
    };

    Some(tracing_appender::non_blocking(writer))
}

/// 删除超过保留天数的日志文件
///
/// 优先按文件名中的日期判断，解析失败时看修改时间
fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> usize {
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return 0;
        }
    };

    let today = Local::now().date_naive();
    let retention = chrono::Duration::days(i64::from(retention_days));
    let mut deleted = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !path.is_file() || !name.starts_with(LOG_FILE_PREFIX) || !name.ends_with(LOG_FILE_SUFFIX) {
            continue;
        }

        let expired = match date_from_filename(name) {
            Some(date) => today.signed_duration_since(date) > retention,
            None => expired_by_mtime(&entry, retention),
        };
        if !expired {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                deleted += 1;
                debug!("已删除过期日志文件: {:?}", path);
            }
            Err(e) => warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
        }
    }

    if deleted > 0 {
        info!("已清理 {} 个过期日志文件", deleted);
    }
    deleted
}

/// wifi-file-transfer.YYYY-MM-DD[-HHMMSS[_N]].log -> YYYY-MM-DD
fn date_from_filename(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(LOG_FILE_PREFIX)?.strip_suffix(LOG_FILE_SUFFIX)?;
    let date = stem.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn expired_by_mtime(entry: &fs::DirEntry, retention: chrono::Duration) -> bool {
    entry
        .metadata()
        .and_then(|m| m.modified())
        .map(|modified| {
            let modified: chrono::DateTime<chrono::Utc> = modified.into();
            chrono::Utc::now().signed_duration_since(modified) > retention
        })
        .unwrap_or(false)
}
