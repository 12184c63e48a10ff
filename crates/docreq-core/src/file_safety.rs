//! Filename sanitization for object keys.

/// Maximum length of a sanitized filename, in bytes.
pub const MAX_FILENAME_LEN: usize = 200;

/// Sanitize a client-supplied filename for use inside an object key.
///
/// Strips path components, replaces characters that are unsafe in keys or
/// URLs, and truncates long names while keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '#' | '%' | '&' | '\0' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_');
    if sanitized.is_empty() {
        return "document".to_string();
    }

    if sanitized.len() > MAX_FILENAME_LEN {
        let cut = floor_char_boundary(sanitized, MAX_FILENAME_LEN);
        if let Some(dot_pos) = sanitized.rfind('.') {
            let ext = &sanitized[dot_pos..];
            if ext.len() < 16 {
                let head = floor_char_boundary(sanitized, MAX_FILENAME_LEN - ext.len());
                return format!("{}{}", &sanitized[..head], ext);
            }
        }
        return sanitized[..cut].to_string();
    }

    sanitized.to_string()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
