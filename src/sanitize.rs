//! Filename sanitizing for downloaded codes.

/// Token returned when the input is not valid text.
pub const FALLBACK_FILENAME: &str = "invalid-filename";

/// Maximum length of a sanitized name, in characters.
pub const MAX_FILENAME_CHARS: usize = 50;

const RESERVED: [char; 10] = ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Turns arbitrary text into something safe to use as a file name stem.
///
/// Each of `/ \ ? % * : | " < >` becomes `-`, every run of whitespace becomes
/// a single `_`, and the result is cut to 50 characters.
///
/// # Example
///
/// ```rust
/// use qrbatch::sanitize::sanitize_filename;
///
/// assert_eq!(sanitize_filename("https://a.example/x?y"), "https---a.example-x-y");
/// assert_eq!(sanitize_filename("hello   big world"), "hello_big_world");
/// ```
pub fn sanitize_filename(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_FILENAME_CHARS * 4));
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        out.push(if RESERVED.contains(&c) { '-' } else { c });
    }
    match out.char_indices().nth(MAX_FILENAME_CHARS) {
        Some((cut, _)) => out[..cut].to_string(),
        None => out,
    }
}

/// Like [`sanitize_filename`], for raw bytes of unknown provenance.
///
/// Returns [`FALLBACK_FILENAME`] when the bytes are not valid UTF-8.
pub fn sanitize_filename_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => sanitize_filename(text),
        Err(_) => FALLBACK_FILENAME.to_string(),
    }
}

/// Name under which a code for `text` is downloaded.
pub fn download_filename(text: &str) -> String {
    let stem = if text.is_empty() { "qrcode" } else { text };
    format!("{}_qrcode.png", sanitize_filename(stem))
}
