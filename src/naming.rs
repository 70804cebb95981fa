//! Filename handling for stored assets.
//!
//! Uploaded files are renamed on the way in so that names are URL-safe and
//! never collide:
//!
//! ```text
//! "Keynote Día 1 (final).JPG", category "keynotes", t=1718000000000
//!   → keynotes-keynote-d-a-1-final-1718000000000.jpg
//! ```
//!
//! The base name is lowercased, every run of characters outside `[a-z0-9]`
//! becomes a single `-`, leading/trailing dashes are dropped, and the result
//! is cut to 30 characters.
//!
//! ## Display Titles
//!
//! When no title is supplied, one is derived from the original filename:
//! dashes and underscores become spaces (`team-photo_2024.jpg` → "team photo 2024").

/// Maximum length of the sanitized base name inside a generated filename.
pub const MAX_BASE_NAME_LEN: usize = 30;

/// Split `name` into stem and extension at the last dot.
///
/// A leading dot is part of the stem (`.hidden` has no extension), and only
/// the final path segment is considered.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    let segment_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[segment_start..].rfind('.') {
        Some(0) | None => (name, None),
        Some(dot) => {
            let dot = segment_start + dot;
            (&name[..dot], Some(&name[dot + 1..]))
        }
    }
}

/// Replace (or add) the extension of a path's final segment.
pub fn replace_extension(path: &str, ext: &str) -> String {
    let (stem, _) = split_name(path);
    format!("{stem}.{ext}")
}

/// Last `/`-separated segment of a store path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lowercase extension of `name`, if any.
pub fn extension_lowercase(name: &str) -> Option<String> {
    split_name(name).1.map(str::to_ascii_lowercase)
}

/// URL-safe base name: lowercase, `[^a-z0-9]+` → `-`, trimmed, ≤ 30 chars.
pub fn sanitize_base_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    let cut: String = trimmed.chars().take(MAX_BASE_NAME_LEN).collect();
    let cut = cut.trim_end_matches('-');
    if cut.is_empty() {
        "image".to_string()
    } else {
        cut.to_string()
    }
}

/// `{category}-{sanitized-base}-{millis}.{ext}`.
pub fn unique_filename(original_name: &str, category: &str, millis: i64, ext: &str) -> String {
    let (stem, _) = split_name(file_name(original_name));
    format!(
        "{category}-{}-{millis}.{}",
        sanitize_base_name(stem),
        ext.to_ascii_lowercase()
    )
}

/// Human title from a filename: extension dropped, `-`/`_` → spaces.
pub fn display_title(name: &str) -> String {
    let (stem, _) = split_name(file_name(name));
    stem.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
