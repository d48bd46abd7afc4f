//! Extension-derived MIME types and icon hints.
//!
//! Computed once when an entry snapshot is built; directories never carry a
//! mime type.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Coarse category a UI layer maps to a list icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconHint {
    Folder,
    Image,
    Audio,
    Video,
    Archive,
    Text,
    Package,
    Generic,
}

const MIME_TABLE: &[(&str, &str)] = &[
    ("apk", "application/vnd.android.package-archive"),
    ("avi", "video/x-msvideo"),
    ("bmp", "image/bmp"),
    ("bz2", "application/x-bzip2"),
    ("c", "text/x-csrc"),
    ("conf", "text/plain"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("flac", "audio/flac"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("h", "text/x-chdr"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("json", "application/json"),
    ("log", "text/plain"),
    ("m4a", "audio/mp4"),
    ("md", "text/markdown"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("rar", "application/x-rar-compressed"),
    ("sh", "application/x-sh"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("txt", "text/plain"),
    ("wav", "audio/x-wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("xml", "text/xml"),
    ("zip", "application/zip"),
];

/// MIME type for a path, from its extension alone. `None` when the extension
/// is missing or unknown.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MIME_TABLE
        .binary_search_by_key(&ext.as_str(), |(e, _)| e)
        .ok()
        .map(|i| MIME_TABLE[i].1)
}

pub fn icon_hint(is_dir: bool, path: &Path) -> IconHint {
    if is_dir {
        return IconHint::Folder;
    }
    let Some(mime) = mime_for_path(path) else {
        return IconHint::Generic;
    };
    match mime.split('/').next().unwrap_or("") {
        "image" => IconHint::Image,
        "audio" => IconHint::Audio,
        "video" => IconHint::Video,
        "text" => IconHint::Text,
        _ => match mime {
            "application/zip"
            | "application/gzip"
            | "application/x-tar"
            | "application/x-bzip2"
            | "application/x-rar-compressed" => IconHint::Archive,
            "application/vnd.android.package-archive" => IconHint::Package,
            "application/json" | "application/x-sh" => IconHint::Text,
            _ => IconHint::Generic,
        },
    }
}
