//! RFC 8288 `Link` header handling, just enough for GitHub pagination.

/// Extract the `rel="next"` target from a `Link` header value.
///
/// GitHub sends e.g.
/// `<https://api.github.com/...&page=2>; rel="next", <https://api.github.com/...&page=5>; rel="last"`.
pub fn parse_next_link(header: &str) -> Option<String> {
    let mut rest = header;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let end = after.find('>')?;
        let target = &after[..end];

        let tail = &after[end + 1..];
        let params_end = tail.find('<').unwrap_or(tail.len());
        if tail[..params_end].split(';').any(is_rel_next) {
            return Some(target.to_string());
        }
        rest = &tail[params_end..];
    }
    None
}

fn is_rel_next(param: &str) -> bool {
    let Some((key, value)) = param.split_once('=') else {
        return false;
    };
    let value = value.trim_matches(|c: char| c == '"' || c == ',' || c.is_whitespace());
    // rel may hold several space-separated relation types
    key.trim().eq_ignore_ascii_case("rel")
        && value.split_whitespace().any(|r| r.eq_ignore_ascii_case("next"))
}
