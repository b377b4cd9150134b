// ZIP 打包器
//
// 边遍历边写入，任何时刻只持有一个源文件的读缓冲

use std::collections::HashSet;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Local, Timelike};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::FilesystemConfig;
use crate::filesystem::{FsError, FsErrorCode, ResolvedPath};

/// 超过该大小的条目需要 ZIP64
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// 单次读取缓冲大小
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// 打包结果汇总
#[derive(Debug, Default)]
pub struct PackageSummary {
    /// 写入的条目数（文件 + 空目录）
    pub entries_written: usize,
    /// 被跳过的源路径及原因
    pub skipped: Vec<FsError>,
}

impl PackageSummary {
    fn skip(&mut self, err: FsError) {
        let err = if err.code == FsErrorCode::PackagingPartialFailure {
            err
        } else {
            err.reclassify(FsErrorCode::PackagingPartialFailure)
        };
        warn!("打包跳过: {}", err);
        self.skipped.push(err);
    }
}

/// 写入失败来源：源文件读取失败可以跳过，目标写入失败必须终止
enum CopyError {
    Source(io::Error),
    Sink(io::Error),
}

/// ZIP 打包器
#[derive(Debug, Clone)]
pub struct ZipPackager {
    follow_symlinks: bool,
}

impl ZipPackager {
    pub fn new(config: &FilesystemConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
        }
    }

    /// 将一组已解析路径打包写入 sink
    ///
    /// 单个源路径失败只跳过；只有写 sink 失败才返回错误
    pub fn package<W: Write + Seek>(&self, sources: &[ResolvedPath], sink: W) -> Result<PackageSummary, FsError> {
        let mut writer = ZipWriter::new(sink);
        let mut summary = PackageSummary::default();
        let mut written_names: HashSet<String> = HashSet::new();

        for source in sources {
            let metadata = match self.metadata(&source.absolute_path) {
                Ok(m) => m,
                Err(e) => {
                    summary.skip(FsError::from_io(&e, source.relative_path.clone()));
                    continue;
                }
            };

            let base_name = source.file_name();
            if metadata.is_dir() {
                self.add_directory_tree(&mut writer, source, &base_name, &mut written_names, &mut summary)?;
            } else if metadata.is_file() {
                self.add_file(
                    &mut writer,
                    &source.absolute_path,
                    &metadata,
                    base_name,
                    &source.relative_path,
                    &mut written_names,
                    &mut summary,
                )?;
            } else {
                debug!("跳过非常规文件: {:?}", source.absolute_path);
            }
        }

        writer.finish().map_err(sink_error)?;

        info!(
            "打包完成: 写入 {} 个条目, 跳过 {} 个",
            summary.entries_written,
            summary.skipped.len()
        );
        Ok(summary)
    }

    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        if self.follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
    }

    /// 深度优先遍历目录：文件写为 `base/<rel>`，空目录写为 `base/<rel>/`
    fn add_directory_tree<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        source: &ResolvedPath,
        base_name: &str,
        written_names: &mut HashSet<String>,
        summary: &mut PackageSummary,
    ) -> Result<(), FsError> {
        let mut walker = WalkDir::new(&source.absolute_path)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    // 权限不足或符号链接成环
                    let path = e
                        .path()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_else(|| source.relative_path.clone());
                    summary.skip(FsError::new(FsErrorCode::PackagingPartialFailure).with_message(e.to_string()).with_path(path));
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(&source.absolute_path) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let mut entry_name = base_name.to_string();
            for component in relative.components() {
                entry_name.push('/');
                entry_name.push_str(&component.as_os_str().to_string_lossy());
            }

            // 跟随的符号链接仍然不能指向根目录之外
            if self.follow_symlinks && entry.path_is_symlink() {
                let contained = dunce::canonicalize(entry.path())
                    .map(|target| target.starts_with(&source.root.base_path))
                    .unwrap_or(false);
                if !contained {
                    summary.skip(FsError::new(FsErrorCode::PathEscape).with_path(entry_name));
                    if entry.file_type().is_dir() {
                        walker.skip_current_dir();
                    }
                    continue;
                }
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                match is_empty_dir(entry.path()) {
                    Ok(true) => {
                        if written_names.insert(format!("{}/", entry_name)) {
                            writer
                                .add_directory(entry_name.as_str(), self.options(entry.metadata().ok().as_ref()))
                                .map_err(sink_error)?;
                            summary.entries_written += 1;
                        } else {
                            summary.skip(duplicate_entry(&entry_name));
                        }
                    }
                    Ok(false) => {}
                    Err(e) => summary.skip(FsError::from_io(&e, entry_name)),
                }
            } else if file_type.is_file() {
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        summary.skip(
                            FsError::new(FsErrorCode::PackagingPartialFailure)
                                .with_message(e.to_string())
                                .with_path(entry_name),
                        );
                        continue;
                    }
                };
                let display = entry_name.clone();
                self.add_file(writer, entry.path(), &metadata, entry_name, &display, written_names, summary)?;
            } else {
                debug!("跳过非常规条目: {:?}", entry.path());
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_file<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        path: &Path,
        metadata: &Metadata,
        entry_name: String,
        display_path: &str,
        written_names: &mut HashSet<String>,
        summary: &mut PackageSummary,
    ) -> Result<(), FsError> {
        if written_names.contains(&entry_name) {
            summary.skip(duplicate_entry(&entry_name));
            return Ok(());
        }

        // 先打开源文件，打不开就不产生条目
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                summary.skip(FsError::from_io(&e, display_path));
                return Ok(());
            }
        };

        self.write_entry(writer, &mut file, Some(metadata), entry_name, display_path, written_names, summary)
    }

    /// 写入一个文件条目；源读取中途失败时撤销该条目
    #[allow(clippy::too_many_arguments)]
    fn write_entry<W: Write + Seek, R: Read>(
        &self,
        writer: &mut ZipWriter<W>,
        reader: &mut R,
        metadata: Option<&Metadata>,
        entry_name: String,
        display_path: &str,
        written_names: &mut HashSet<String>,
        summary: &mut PackageSummary,
    ) -> Result<(), FsError> {
        writer
            .start_file(entry_name.as_str(), self.options(metadata))
            .map_err(sink_error)?;

        match copy_into(reader, writer) {
            Ok(_) => {
                written_names.insert(entry_name);
                summary.entries_written += 1;
                Ok(())
            }
            Err(CopyError::Source(e)) => {
                // 截断的条目不能留在压缩包里
                writer.abort_file().map_err(sink_error)?;
                summary.skip(FsError::from_io(&e, display_path));
                Ok(())
            }
            Err(CopyError::Sink(e)) => Err(FsError::new(FsErrorCode::Io)
                .with_message(format!("Failed to write archive: {}", e))
                .with_path(display_path)),
        }
    }

    fn options(&self, metadata: Option<&Metadata>) -> SimpleFileOptions {
        let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Some(metadata) = metadata {
            options = options.large_file(metadata.len() >= ZIP64_THRESHOLD);
            if let Some(time) = metadata.modified().ok().and_then(to_zip_time) {
                options = options.last_modified_time(time);
            }
        }

        options
    }
}

fn copy_into<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, CopyError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Source(e)),
        };
        writer.write_all(&buffer[..n]).map_err(CopyError::Sink)?;
        total += n as u64;
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// ZIP 时间只能表示 1980-2107，超出范围时使用默认值
fn to_zip_time(time: std::time::SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = time.into();
    let year = u16::try_from(local.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

fn duplicate_entry(name: &str) -> FsError {
    FsError::new(FsErrorCode::PackagingPartialFailure)
        .with_message("Duplicate archive entry name")
        .with_path(name)
}

fn sink_error(err: zip::result::ZipError) -> FsError {
    FsError::new(FsErrorCode::Io).with_message(format!("Failed to write archive: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{PathResolver, RootRegistry};
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn resolver_for(temp: &TempDir) -> PathResolver {
        PathResolver::new(Arc::new(RootRegistry::from_paths([("internal", temp.path())])))
    }

    /// tree/
    /// ├── a.txt
    /// ├── sub/
    /// │   └── b.txt
    /// └── sub2/      (空目录)
    fn create_tree(temp: &TempDir) {
        let tree = temp.path().join("tree");
        fs::create_dir_all(tree.join("sub")).unwrap();
        fs::create_dir_all(tree.join("sub2")).unwrap();
        fs::write(tree.join("a.txt"), "alpha").unwrap();
        fs::write(tree.join("sub/b.txt"), "bravo bravo").unwrap();
    }

    fn read_archive(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            entries.push((file.name().to_string(), content));
        }
        entries.sort();
        entries
    }

    fn package(temp: &TempDir, paths: &[&str]) -> (PackageSummary, Vec<(String, Vec<u8>)>) {
        let resolver = resolver_for(temp);
        let sources: Vec<ResolvedPath> = paths.iter().map(|p| resolver.resolve(None, p).unwrap()).collect();

        let packager = ZipPackager::new(&FilesystemConfig::default());
        let mut sink = Cursor::new(Vec::new());
        let summary = packager.package(&sources, &mut sink).unwrap();
        (summary, read_archive(sink.into_inner()))
    }

    #[test]
    fn test_round_trip_children() {
        let temp = TempDir::new().unwrap();
        create_tree(&temp);

        let (summary, entries) = package(&temp, &["tree/a.txt", "tree/sub", "tree/sub2"]);
        assert_eq!(summary.entries_written, 3);
        assert!(summary.skipped.is_empty());
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_string(), b"alpha".to_vec()),
                ("sub/b.txt".to_string(), b"bravo bravo".to_vec()),
                ("sub2/".to_string(), Vec::new()),
            ]
        );
    }

    #[test]
    fn test_round_trip_directory() {
        let temp = TempDir::new().unwrap();
        create_tree(&temp);

        let (summary, entries) = package(&temp, &["tree"]);
        assert_eq!(summary.entries_written, 3);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["tree/a.txt", "tree/sub/b.txt", "tree/sub2/"]);
    }

    #[test]
    fn test_missing_sources_and_duplicates_skipped() {
        let temp = TempDir::new().unwrap();
        create_tree(&temp);
        fs::write(temp.path().join("a.txt"), "other alpha").unwrap();

        let (summary, entries) = package(&temp, &["tree/a.txt", "missing.bin", "a.txt"]);
        assert_eq!(summary.entries_written, 1);
        assert_eq!(summary.skipped.len(), 2);
        assert!(summary
            .skipped
            .iter()
            .all(|e| e.code == FsErrorCode::PackagingPartialFailure));
        assert_eq!(entries, vec![("a.txt".to_string(), b"alpha".to_vec())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        create_tree(&temp);
        let locked = temp.path().join("tree/sub/locked.txt");
        fs::write(&locked, "secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if File::open(&locked).is_ok() {
            // root 用户
            return;
        }

        let (summary, entries) = package(&temp, &["tree"]);
        assert_eq!(summary.skipped.len(), 1);
        assert!(entries.iter().all(|(n, _)| n != "tree/sub/locked.txt"));
        assert!(entries.iter().any(|(n, _)| n == "tree/sub/b.txt"));
    }

    /// 先吐出一段数据，再报告读取错误
    struct FailingReader {
        sent: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
            }
            self.sent = true;
            let data = b"partial content";
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }
    }

    #[test]
    fn test_source_failing_mid_read_leaves_no_entry() {
        let packager = ZipPackager::new(&FilesystemConfig::default());
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut summary = PackageSummary::default();
        let mut names = HashSet::new();

        packager
            .write_entry(&mut writer, &mut &b"first"[..], None, "first.txt".to_string(), "first.txt", &mut names, &mut summary)
            .unwrap();
        packager
            .write_entry(
                &mut writer,
                &mut FailingReader { sent: false },
                None,
                "broken.bin".to_string(),
                "broken.bin",
                &mut names,
                &mut summary,
            )
            .unwrap();
        packager
            .write_entry(&mut writer, &mut &b"last"[..], None, "last.txt".to_string(), "last.txt", &mut names, &mut summary)
            .unwrap();
        let sink = writer.finish().unwrap();

        assert_eq!(summary.entries_written, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].code, FsErrorCode::PackagingPartialFailure);
        assert!(!names.contains("broken.bin"));
        assert_eq!(
            read_archive(sink.into_inner()),
            vec![
                ("first.txt".to_string(), b"first".to_vec()),
                ("last.txt".to_string(), b"last".to_vec()),
            ]
        );
    }

    #[test]
    fn test_to_zip_time_range() {
        let time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        assert!(to_zip_time(time).is_some());
        // 1970 年早于 ZIP 可表示的范围
        assert!(to_zip_time(std::time::UNIX_EPOCH).is_none());
    }
}
