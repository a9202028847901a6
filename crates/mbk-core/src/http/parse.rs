//! Parse raw response header lines into name/value pairs.

/// Parse collected header lines into `(name, value)` pairs.
///
/// A status line (`HTTP/...`) starts a new header block, so after redirects
/// only the headers of the final response remain.
pub fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_lowercased() {
        let lines = [
            "HTTP/1.1 200 OK".to_string(),
            "Content-Type: application/xml".to_string(),
            "Content-Length: 12".to_string(),
        ];
        let h = parse_header_lines(&lines);
        assert_eq!(
            h,
            vec![
                ("content-type".to_string(), "application/xml".to_string()),
                ("content-length".to_string(), "12".to_string()),
            ]
        );
    }

    #[test]
    fn redirect_keeps_only_final_block() {
        let lines = [
            "HTTP/1.1 302 Found".to_string(),
            "Location: /other".to_string(),
            "".to_string(),
            "HTTP/1.1 200 OK".to_string(),
            "ETag: \"abc\"".to_string(),
        ];
        let h = parse_header_lines(&lines);
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].0, "etag");
    }
}
