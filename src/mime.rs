//! Content types for stored resources.
//!
//! The table is fixed on purpose: scripts and stylesheets served with the wrong type are
//! refused by the rendering surface, so lookups must not depend on host configuration.

/// Content type constants used by the table.
pub mod types {
    pub const HTML: &str = "text/html";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "application/javascript";
    pub const JSON: &str = "application/json";
    pub const PLAIN: &str = "text/plain";
    pub const XML: &str = "application/xml";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";
    pub const WEBP: &str = "image/webp";

    pub const GLB: &str = "model/gltf-binary";
    pub const GLTF: &str = "model/gltf+json";
    pub const WASM: &str = "application/wasm";
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const MP3: &str = "audio/mpeg";
    pub const MP4: &str = "video/mp4";

    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Content type for a store path, chosen by its lowercase extension.
pub fn for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return types::OCTET_STREAM,
    };

    match extension.as_str() {
        "html" | "htm" => types::HTML,
        "css" => types::CSS,
        "js" | "mjs" => types::JAVASCRIPT,
        "json" => types::JSON,
        "txt" => types::PLAIN,
        "xml" => types::XML,

        "png" => types::PNG,
        "jpg" | "jpeg" => types::JPEG,
        "gif" => types::GIF,
        "svg" => types::SVG,
        "ico" => types::ICO,
        "webp" => types::WEBP,

        "glb" => types::GLB,
        "gltf" => types::GLTF,
        "wasm" => types::WASM,
        "woff" => types::WOFF,
        "woff2" => types::WOFF2,
        "mp3" => types::MP3,
        "mp4" => types::MP4,

        _ => types::OCTET_STREAM,
    }
}

/// Whether the content type is a document that navigation can render.
pub fn is_document(content_type: &str) -> bool {
    content_type == types::HTML
}
