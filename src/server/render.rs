// HTML 页面渲染
//
// 页面自包含（内联样式），局域网内的客户端可能无法访问外网 CDN

use std::fmt::Write;

use crate::filesystem::{DirectoryEntry, DirectoryListing, Root, REMOVABLE_ROOT_PREFIX};

/// 特殊根目录的展示名称
const ROOT_LABELS: &[(&str, &str, &str)] = &[
    ("internal", "📱", "Internal Storage"),
    ("root", "🔧", "Root Directory"),
    ("system", "⚙️", "System"),
];

const STYLE: &str = r#"<style>
body{font-family:-apple-system,"Segoe UI",Roboto,sans-serif;background:#f5f6f8;margin:0;padding:24px;color:#212529}
.container{max-width:960px;margin:0 auto}
.header{display:flex;justify-content:space-between;align-items:center;margin-bottom:24px}
.cards{display:grid;grid-template-columns:repeat(auto-fill,minmax(280px,1fr));gap:16px}
.card{background:#fff;border:1px solid #dee2e6;border-radius:8px;padding:16px}
.card small{color:#6c757d;word-break:break-all}
ul.entries{list-style:none;padding:0;margin:0 0 16px;background:#fff;border:1px solid #dee2e6;border-radius:8px}
ul.entries li{display:flex;align-items:center;gap:8px;padding:10px 16px;border-bottom:1px solid #dee2e6}
ul.entries li:last-child{border-bottom:none}
.size{margin-left:auto;color:#6c757d;font-size:.875em}
.btn{display:inline-block;padding:6px 14px;border-radius:6px;border:none;color:#fff;text-decoration:none;cursor:pointer;font-size:1em}
.btn-primary{background:#0d6efd}.btn-secondary{background:#6c757d}.btn-danger{background:#dc3545}.btn-success{background:#198754}
.actions{margin-bottom:24px;display:flex;gap:8px}
.empty{color:#6c757d}
</style>"#;

/// 根目录展示名称（不含图标）
pub fn root_display_name(name: &str) -> String {
    root_label(name).1
}

/// (图标, 展示名称)
fn root_label(name: &str) -> (&'static str, String) {
    if let Some((_, icon, label)) = ROOT_LABELS.iter().find(|(key, _, _)| *key == name) {
        return (*icon, label.to_string());
    }
    if name.starts_with(REMOVABLE_ROOT_PREFIX) {
        return ("💾", "SD Card".to_string());
    }
    ("📁", name.to_string())
}

/// HTML 转义
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 逐段百分号编码，保留 '/'
pub fn encode_path(relative_path: &str) -> String {
    relative_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// 浏览页链接
pub fn browse_url(root: &str, path: &str) -> String {
    format!(
        "/browse?root={}&path={}",
        urlencoding::encode(root),
        urlencoding::encode(path)
    )
}

/// 静态文件链接
pub fn file_url(root: &str, relative_path: &str) -> String {
    format!("/{}/{}", urlencoding::encode(root), encode_path(relative_path))
}

fn entry_icon(entry: &DirectoryEntry) -> &'static str {
    if entry.is_directory {
        return "📁";
    }
    match entry.icon {
        Some("image") => "🖼️",
        Some("video") => "🎬",
        Some("audio") => "🎵",
        Some("text") => "📝",
        Some("archive") => "🗜️",
        Some("executable") => "⚙️",
        _ => "📄",
    }
}

/// 人类可读的文件大小
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n<title>{}</title>\n{}\n</head>\n<body>\n<div class=\"container\">\n{}\n</div>\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

/// 首页：每个根目录一张卡片
pub fn index_page(roots: &[Root]) -> String {
    let mut body = String::from("<h1>📱 File Transfer Server</h1>\n<div class=\"cards\">\n");

    for root in roots {
        let (icon, label) = root_label(&root.name);
        let _ = write!(
            body,
            "<div class=\"card\"><h3>{} {}</h3><p><small>{}</small></p><a class=\"btn btn-primary\" href=\"{}\">Browse</a></div>\n",
            icon,
            escape_html(&label),
            escape_html(&root.base_path.to_string_lossy()),
            escape_html(&browse_url(&root.name, ""))
        );
    }

    if roots.is_empty() {
        body.push_str("<p class=\"empty\">No storage is available.</p>\n");
    }
    body.push_str("</div>");

    page("File Transfer Server", &body)
}

/// 目录浏览页
pub fn directory_page(listing: &DirectoryListing) -> String {
    let location = &listing.location;
    let root_name = &location.root.name;
    let title = if location.is_root() {
        root_display_name(root_name)
    } else {
        location.file_name()
    };

    let mut body = String::new();
    let _ = write!(
        body,
        "<div class=\"header\"><h1>📁 {}</h1><a class=\"btn btn-secondary\" href=\"/\">🏠 Home</a></div>\n",
        escape_html(&title)
    );

    // 勾选后可删除或打包下载；下载按钮以 GET 方式提交到 /download
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/delete\" data-root=\"{}\">\n<input type=\"hidden\" name=\"root\" value=\"{}\">\n<input type=\"hidden\" name=\"currentPath\" value=\"{}\">\n<ul class=\"entries\">\n",
        escape_html(root_name),
        escape_html(root_name),
        escape_html(&location.relative_path)
    );

    if let Some(parent) = &listing.parent {
        let _ = write!(
            body,
            "<li><a href=\"{}\">⬅️ .. (up)</a></li>\n",
            escape_html(&browse_url(root_name, parent))
        );
    }

    for entry in &listing.entries {
        let href = if entry.is_directory {
            browse_url(root_name, &entry.relative_path)
        } else {
            file_url(root_name, &entry.relative_path)
        };
        let suffix = if entry.is_directory { "/" } else { "" };
        let size = entry
            .size
            .map(|s| format!("<span class=\"size\">{}</span>", format_size(s)))
            .unwrap_or_default();

        let _ = write!(
            body,
            "<li><input type=\"checkbox\" name=\"paths\" value=\"{}\"><a href=\"{}\">{} {}{}</a>{}</li>\n",
            escape_html(&entry.relative_path),
            escape_html(&href),
            entry_icon(entry),
            escape_html(&entry.name),
            suffix,
            size
        );
    }

    if listing.entries.is_empty() {
        body.push_str("<li class=\"empty\">This folder is empty.</li>\n");
    }

    body.push_str(
        "</ul>\n<div class=\"actions\">\
         <button class=\"btn btn-danger\" type=\"submit\" onclick=\"return confirm('Delete the selected items?')\">🗑️ Delete Selected</button>\
         <button class=\"btn btn-primary\" type=\"submit\" formaction=\"/download\" formmethod=\"get\">⬇️ Download Selected</button>\
         </div>\n</form>\n",
    );

    let upload_action = format!(
        "/upload?root={}&path={}",
        urlencoding::encode(root_name),
        urlencoding::encode(&location.relative_path)
    );
    let _ = write!(
        body,
        "<form method=\"post\" action=\"{}\" enctype=\"multipart/form-data\">\n<input type=\"file\" name=\"files\" multiple>\n<button class=\"btn btn-success\" type=\"submit\">📤 Upload</button>\n</form>",
        escape_html(&upload_action)
    );

    page(&format!("File Browser - {}", root_display_name(root_name)), &body)
}
