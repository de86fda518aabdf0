//! Shared key generation for storage backends.
//!
//! Key format: `disparos/{timestamp_millis}-{sanitized_stem}.{ext}`.

use disparo_core::sanitize;

/// Generate a storage key for one attachment.
///
/// The millisecond timestamp is prepended to the sanitized file-name base so
/// keys are never reused across assets. The extension is sanitized
/// separately and dropped when it sanitizes to nothing.
pub fn asset_key(timestamp_millis: i64, filename: &str) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let mut stem = sanitize(stem);
    if stem.is_empty() {
        stem = "file".to_string();
    }

    match ext.map(sanitize).filter(|e| !e.is_empty()) {
        Some(ext) => format!("disparos/{}-{}.{}", timestamp_millis, stem, ext),
        None => format!("disparos/{}-{}", timestamp_millis, stem),
    }
}
