// 临时压缩包
//
// 文件的生命周期绑定在 TempArchive 上，Drop 时删除

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures::Stream;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const ARCHIVE_PREFIX: &str = "archive-";
const ARCHIVE_SUFFIX: &str = ".zip";

/// 临时压缩包句柄
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    /// 在 dir 下创建唯一命名的空文件，返回句柄和可写文件
    pub fn create(dir: &Path) -> io::Result<(Self, File)> {
        let path = dir.join(format!("{}{}{}", ARCHIVE_PREFIX, uuid::Uuid::new_v4(), ARCHIVE_SUFFIX));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        debug!("创建临时压缩包: {:?}", path);
        Ok((Self { path }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("已删除临时压缩包: {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("删除临时压缩包失败: {:?}, 错误: {}", self.path, e),
        }
    }
}

/// 响应体流：读完或客户端断开后随 Drop 删除临时文件
///
/// 字段按声明顺序析构，先关闭文件句柄再删除文件
pub struct ArchiveStream {
    inner: ReaderStream<tokio::fs::File>,
    _archive: TempArchive,
    len: u64,
}

impl ArchiveStream {
    pub async fn open(archive: TempArchive) -> io::Result<Self> {
        let file = tokio::fs::File::open(archive.path()).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            inner: ReaderStream::new(file),
            _archive: archive,
            len,
        })
    }

    /// 压缩包总字节数
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Stream for ArchiveStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// 清理进程异常退出后残留的临时压缩包
pub fn sweep_stale_archives(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("临时目录不可读，跳过清理: {:?} ({})", dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !(name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_SUFFIX)) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!("清理残留压缩包失败: {:?}, 错误: {}", entry.path(), e),
        }
    }

    if removed > 0 {
        info!("已清理 {} 个残留临时压缩包", removed);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_drop_removes_file() {
        let temp = TempDir::new().unwrap();
        let (archive, mut file) = TempArchive::create(temp.path()).unwrap();
        file.write_all(b"zip").unwrap();
        drop(file);

        let path = archive.path().to_path_buf();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("archive-") && name.ends_with(".zip"));

        drop(archive);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stream_reads_then_removes() {
        let temp = TempDir::new().unwrap();
        let (archive, mut file) = TempArchive::create(temp.path()).unwrap();
        file.write_all(b"hello archive").unwrap();
        drop(file);
        let path = archive.path().to_path_buf();

        let mut stream = ArchiveStream::open(archive).await.unwrap();
        assert_eq!(stream.len(), 13);

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hello archive");
        assert!(path.exists(), "响应发送期间文件必须保留");

        drop(stream);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_abandoned_stream_removes_file() {
        let temp = TempDir::new().unwrap();
        let (archive, mut file) = TempArchive::create(temp.path()).unwrap();
        file.write_all(&[0u8; 1024]).unwrap();
        drop(file);
        let path = archive.path().to_path_buf();

        // 模拟客户端中途断开：读一块后直接丢弃
        let mut stream = ArchiveStream::open(archive).await.unwrap();
        let _ = stream.next().await;
        drop(stream);
        assert!(!path.exists());
    }

    #[test]
    fn test_sweep_stale_archives() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("archive-old.zip"), "x").unwrap();
        fs::write(temp.path().join("archive-older.zip"), "x").unwrap();
        fs::write(temp.path().join("keep.zip"), "x").unwrap();

        assert_eq!(sweep_stale_archives(temp.path()), 2);
        assert!(temp.path().join("keep.zip").exists());
        assert_eq!(sweep_stale_archives(&temp.path().join("missing")), 0);
    }
}
