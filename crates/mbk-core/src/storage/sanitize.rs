//! Linux-safe file name sanitization for attachment names.

/// Sanitizes an attachment file name so it stays a single path component.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Trims leading/trailing spaces, dots and underscores
/// - Collapses consecutive underscores
/// - Limits length to 200 bytes (leaves room for the card prefix under NAME_MAX)
/// - Falls back to `attachment` when nothing is left
pub fn sanitize_file_name(name: &str) -> String {
    const MAX_LEN: usize = 200;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return "attachment".to_string();
    }

    if trimmed.len() > MAX_LEN {
        let mut take = MAX_LEN;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
