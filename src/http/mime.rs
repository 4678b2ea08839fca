//! MIME type detection module
//!
//! Returns the Content-Type for an origin path based on its extension.

/// Fallback for unknown or missing extensions
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Get MIME Content-Type for a request path
///
/// Only the last path segment is inspected, and the extension match is
/// case-insensitive.
///
/// # Examples
/// ```
/// use hap_range_proxy::http::mime::content_type_for_path;
/// assert_eq!(content_type_for_path("/hap/AppSigned.hap"), "application/octet-stream");
/// assert_eq!(content_type_for_path("/hap/manifest.json5"), "application/json; charset=utf-8");
/// assert_eq!(content_type_for_path("/asset/icon29.PNG"), "image/png");
/// ```
pub fn content_type_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    get_content_type(extension.as_deref())
}

/// Get MIME Content-Type based on a lowercase file extension
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Application bundles
        Some("hap" | "hsp" | "app" | "apk" | "ipa") => "application/octet-stream",

        // Manifests
        Some("json" | "json5") => "application/json; charset=utf-8",

        // Text
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("js" | "mjs") => "application/javascript",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",

        // Archives
        Some("zip") => "application/zip",
        Some("gz" | "gzip") => "application/gzip",
        Some("tar") => "application/x-tar",

        _ => DEFAULT_CONTENT_TYPE,
    }
}
