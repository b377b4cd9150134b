// multipart 上传落盘
//
// 每个文件分段先写入隐藏的临时文件，完整接收后再重命名为目标文件名

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::filesystem::{FsError, FsErrorCode, PathResolver, ResolvedPath};

/// 上传结果汇总
#[derive(Debug, Default)]
pub struct UploadSummary {
    /// 成功落盘的文件数
    pub files_written: usize,
    /// 失败的分段
    pub failures: Vec<FsError>,
}

/// 分段失败类型
enum PartError {
    /// 只影响当前分段，继续处理下一个
    Part(FsError),
    /// 请求体本身已损坏，无法继续读取
    Stream(FsError),
}

/// 未完成的临时文件，Drop 时删除
struct PartialUpload {
    path: PathBuf,
    committed: bool,
}

impl PartialUpload {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("删除未完成的上传文件失败: {:?}, 错误: {}", self.path, e);
            }
        }
    }
}

/// 上传接收器
#[derive(Debug, Clone)]
pub struct UploadIngestor {
    resolver: Arc<PathResolver>,
}

impl UploadIngestor {
    pub fn new(resolver: Arc<PathResolver>) -> Self {
        Self { resolver }
    }

    /// 接收 multipart 请求中的所有文件分段
    ///
    /// 没有文件名的分段（普通表单字段）直接忽略；同名文件直接覆盖
    pub async fn ingest(&self, multipart: &mut Multipart, target: &ResolvedPath) -> Result<UploadSummary, FsError> {
        fs::create_dir_all(&target.absolute_path)
            .await
            .map_err(|e| FsError::from_io(&e, target.relative_path.clone()))?;

        let mut summary = UploadSummary::default();

        loop {
            let mut field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    let err = FsError::new(FsErrorCode::UploadPartFailure)
                        .with_message(format!("Malformed multipart body: {}", e));
                    warn!("上传请求体解析中断: {}", err);
                    summary.failures.push(err);
                    break;
                }
            };

            let file_name = match field.file_name().map(sanitize_file_name) {
                Some(name) if !name.is_empty() => name,
                _ => {
                    debug!("跳过非文件分段: {:?}", field.name());
                    continue;
                }
            };

            match self.write_part(&mut field, target, &file_name).await {
                Ok(written) => {
                    summary.files_written += 1;
                    info!("上传完成: {}/{}", written.root.name, written.relative_path);
                }
                Err(PartError::Part(e)) => {
                    warn!("上传分段失败，继续处理后续分段: {}", e);
                    summary.failures.push(e);
                }
                Err(PartError::Stream(e)) => {
                    warn!("上传请求体中断: {}", e);
                    summary.failures.push(e);
                    break;
                }
            }
        }

        info!(
            "上传请求处理完毕: 写入 {} 个文件, 失败 {} 个",
            summary.files_written,
            summary.failures.len()
        );
        Ok(summary)
    }

    async fn write_part(
        &self,
        field: &mut Field<'_>,
        target: &ResolvedPath,
        file_name: &str,
    ) -> Result<ResolvedPath, PartError> {
        let destination = self
            .resolver
            .resolve_child(target, file_name)
            .map_err(|e| PartError::Part(e.reclassify(FsErrorCode::UploadPartFailure)))?;

        let part_path = target.absolute_path.join(part_file_name(file_name));
        let part_error = |e: std::io::Error| {
            PartError::Part(FsError::from_io(&e, destination.relative_path.clone()).reclassify(FsErrorCode::UploadPartFailure))
        };

        // 守卫先于文件句柄声明，析构时句柄先关闭
        let partial = PartialUpload::new(part_path.clone());
        let mut file = fs::File::create(&part_path).await.map_err(part_error)?;

        loop {
            match field.chunk().await {
                Ok(Some(bytes)) => file.write_all(&bytes).await.map_err(part_error)?,
                Ok(None) => break,
                Err(e) => {
                    return Err(PartError::Stream(
                        FsError::new(FsErrorCode::UploadPartFailure)
                            .with_message(format!("Upload stream interrupted: {}", e))
                            .with_path(destination.relative_path.clone()),
                    ));
                }
            }
        }

        file.flush().await.map_err(part_error)?;
        drop(file);

        // 覆盖同名文件（last-write-wins）
        fs::rename(&part_path, &destination.absolute_path)
            .await
            .map_err(part_error)?;
        partial.commit();

        Ok(destination)
    }
}

/// 临时文件名中保留的原文件名前缀上限（字节）
///
/// 加上 `.` `.<uuid>.part` 后仍远低于常见的 255 字节文件名上限
const PART_NAME_PREFIX_MAX: usize = 128;

/// `.<name 前缀>.<uuid>.part`
fn part_file_name(file_name: &str) -> String {
    let mut end = file_name.len().min(PART_NAME_PREFIX_MAX);
    while !file_name.is_char_boundary(end) {
        end -= 1;
    }
    format!(".{}.{}.part", &file_name[..end], uuid::Uuid::new_v4())
}

/// 只保留客户端声明文件名的最后一段
fn sanitize_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::RootRegistry;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};
    use tempfile::TempDir;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn file_part(name: &str, content: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{n}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n",
            b = BOUNDARY,
            n = name,
            c = content
        )
    }

    fn field_part(name: &str, value: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n",
            b = BOUNDARY,
            n = name,
            v = value
        )
    }

    fn closing() -> String {
        format!("--{}--\r\n", BOUNDARY)
    }

    async fn ingest(temp: &TempDir, path: &str, body: String) -> UploadSummary {
        let resolver = Arc::new(PathResolver::new(Arc::new(RootRegistry::from_paths([(
            "internal",
            temp.path(),
        )]))));
        let target = resolver.resolve(None, path).unwrap();
        let ingestor = UploadIngestor::new(resolver);

        let mut multipart = Multipart::from_request(multipart_request(body), &()).await.unwrap();
        ingestor.ingest(&mut multipart, &target).await.unwrap()
    }

    fn leftover_parts(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .count()
    }

    #[tokio::test]
    async fn test_file_part_written_and_plain_field_skipped() {
        let temp = TempDir::new().unwrap();
        let body = format!(
            "{}{}{}",
            file_part("photo.jpg", "JPEGDATA"),
            field_part("note", "not a file"),
            closing()
        );

        let summary = ingest(&temp, "", body).await;
        assert_eq!(summary.files_written, 1);
        assert!(summary.failures.is_empty());
        assert_eq!(std::fs::read(temp.path().join("photo.jpg")).unwrap(), b"JPEGDATA");
        assert_eq!(leftover_parts(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_filename_skipped() {
        let temp = TempDir::new().unwrap();
        let body = format!("{}{}{}", file_part("photo.jpg", "abc"), file_part("", ""), closing());

        let summary = ingest(&temp, "", body).await;
        assert_eq!(summary.files_written, 1);
    }

    #[tokio::test]
    async fn test_creates_target_and_overwrites() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("inbox")).unwrap();
        std::fs::write(temp.path().join("inbox/report.txt"), "old").unwrap();

        let body = format!(
            "{}{}{}",
            file_part("report.txt", "new"),
            file_part("C:\\Users\\me\\notes.md", "# notes"),
            closing()
        );
        let summary = ingest(&temp, "inbox", body).await;
        assert_eq!(summary.files_written, 2);
        assert_eq!(std::fs::read_to_string(temp.path().join("inbox/report.txt")).unwrap(), "new");
        assert!(temp.path().join("inbox/notes.md").exists());

        let body = format!("{}{}", file_part("a.txt", "a"), closing());
        let summary = ingest(&temp, "fresh/nested", body).await;
        assert_eq!(summary.files_written, 1);
        assert!(temp.path().join("fresh/nested/a.txt").exists());
    }

    #[tokio::test]
    async fn test_bad_part_does_not_abort_batch() {
        let temp = TempDir::new().unwrap();
        let body = format!(
            "{}{}{}",
            file_part("..", "escape"),
            file_part("good.txt", "ok"),
            closing()
        );

        let summary = ingest(&temp, "", body).await;
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].code, FsErrorCode::UploadPartFailure);
        assert!(temp.path().join("good.txt").exists());
    }

    #[tokio::test]
    async fn test_truncated_body_keeps_finished_files() {
        let temp = TempDir::new().unwrap();
        // 第二个分段没有结束边界
        let body = format!(
            "{}--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"big.bin\"\r\n\r\npartial data",
            file_part("done.txt", "done"),
            BOUNDARY
        );

        let summary = ingest(&temp, "", body).await;
        assert_eq!(summary.files_written, 1);
        assert!(!summary.failures.is_empty());
        assert!(temp.path().join("done.txt").exists());
        assert!(!temp.path().join("big.bin").exists());
        assert_eq!(leftover_parts(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_long_file_name_fits() {
        let temp = TempDir::new().unwrap();
        let name = format!("{}.txt", "n".repeat(246));
        assert_eq!(name.len(), 250);

        let body = format!("{}{}", file_part(&name, "long"), closing());
        let summary = ingest(&temp, "", body).await;
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert_eq!(summary.files_written, 1);
        assert_eq!(std::fs::read_to_string(temp.path().join(&name)).unwrap(), "long");
        assert_eq!(leftover_parts(temp.path()), 0);
    }

    #[test]
    fn test_part_file_name_bounded() {
        let short = part_file_name("photo.jpg");
        assert!(short.starts_with(".photo.jpg."));
        assert!(short.ends_with(".part"));

        // 多字节字符不会被截断在中间
        let long = part_file_name(&"照".repeat(100));
        assert!(long.len() <= 1 + PART_NAME_PREFIX_MAX + 1 + 36 + 5);
        assert!(long.starts_with(&format!(".{}.", "照".repeat(42))));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_file_name("a/b/c.txt"), "c.txt");
        assert_eq!(sanitize_file_name("C:\\dir\\d.txt"), "d.txt");
        assert_eq!(sanitize_file_name("dir/"), "");
        assert_eq!(sanitize_file_name("  "), "");
    }
}
