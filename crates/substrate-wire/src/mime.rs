//! MIME inference for binary reads, by final path extension.

/// Infer the MIME type for a binary read response from the final
/// extension of `path`, case-insensitively. Unknown or missing extensions
/// fall back to `application/octet-stream`.
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_extensions() {
        assert_eq!(mime_for_path("a/b/c.PNG"), "image/png");
        assert_eq!(mime_for_path("index.html"), "text/html");
        assert_eq!(mime_for_path("data.json"), "application/json");
        assert_eq!(mime_for_path("module.mjs"), "application/javascript");
    }

    #[test]
    fn falls_back_for_unknown_or_missing_extension() {
        assert_eq!(mime_for_path("no_extension"), "application/octet-stream");
        assert_eq!(mime_for_path("archive.rar"), "application/octet-stream");
    }
}
