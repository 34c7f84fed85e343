//! Centralized file-name handling for everything the pipeline emits.
//!
//! Output names are always derived from the original upload name:
//! - `dress.png` → `dress_cropped.jpg` (crop output)
//! - `dress.png` → `dress.jpg` (compressed output)
//! - `dress_cropped.jpg` → `1718000000000-dress_cropped.jpg` (storage key)
//!
//! Only the *last* extension is stripped, and only when it is a real
//! extension: `archive.tar.gz` keeps `archive.tar`, `file.` and
//! `dir.v2/file` are left alone.

/// Strip the last extension: a dot followed by one or more characters
/// that are neither `.` nor `/`, at the end of the name.
///
/// - `"photo.jpg"` → `"photo"`
/// - `"archive.tar.gz"` → `"archive.tar"`
/// - `"noext"` → `"noext"`
/// - `"trailing."` → `"trailing."`
/// - `".hidden"` → `""`
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => {
            let ext = &name[dot + 1..];
            if ext.is_empty() || ext.contains('/') {
                name
            } else {
                &name[..dot]
            }
        }
        None => name,
    }
}

/// Name for a cropped raster: stem + `suffix` + `.jpg`.
pub fn cropped_file_name(original: &str, suffix: &str) -> String {
    format!("{}{suffix}.jpg", strip_extension(original))
}

/// Same stem, `.jpg` extension. Compression always emits JPEG.
pub fn force_jpeg_extension(name: &str) -> String {
    format!("{}.jpg", strip_extension(name))
}

/// Object-store key: upload time in Unix milliseconds, a dash, the name.
pub fn storage_key(unix_millis: i64, file_name: &str) -> String {
    format!("{unix_millis}-{file_name}")
}

/// Short name for preview cards: extension stripped, truncated to
/// `max_chars` characters with `...` appended when longer.
pub fn display_name(file_name: &str, max_chars: usize) -> String {
    let stem = strip_extension(file_name);
    if stem.chars().count() > max_chars {
        let truncated: String = stem.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        stem.to_string()
    }
}
