use reqwest::header::{HeaderMap, LINK};

/// Extracts the `rel="next"` target from a `Link` response header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut parts = link.trim().split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| param.trim() == r#"rel="next""#);
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}

pub fn next_page(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_next_link)
}
