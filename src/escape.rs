//! Quoting of filesystem paths for ffmpeg filter-graph option values.
//!
//! Filter options are `:`-separated and filters are `,`-separated, so a
//! Windows drive colon (`E:/...`) must be escaped as `E\:/...`. Only that
//! first colon is touched; the value is single-quoted so spaces, commas and
//! any later colons survive as literal characters.

use std::path::Path;

/// Escape `path` for use as e.g. `stats_file=<value>` inside `-lavfi`.
#[must_use]
pub fn escape_filter_path(path: &Path) -> String {
    escape_filter_value(&path.to_string_lossy())
}

/// String form of [`escape_filter_path`].
#[must_use]
pub fn escape_filter_value(raw: &str) -> String {
    let normalized = raw.replace('\\', "/");

    let mut escaped = String::with_capacity(normalized.len() + 4);
    let mut rest = normalized.as_str();
    if has_drive_prefix(rest) {
        escaped.push_str(&rest[..1]);
        escaped.push_str("\\:");
        rest = &rest[2..];
    }
    escaped.push_str(&rest.replace('\'', "\\'"));

    format!("'{escaped}'")
}

fn has_drive_prefix(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}
