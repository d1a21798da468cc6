use ::url::Url;

/// Strips the `scheme://` prefix so links stay short in chat messages.
///
/// Strings that do not parse as URLs are returned unchanged.
pub fn trim_url_scheme(raw: &str) -> &str {
    match Url::parse(raw) {
        Ok(parsed) => {
            let prefix = format!("{}://", parsed.scheme());
            raw.strip_prefix(prefix.as_str()).unwrap_or(raw)
        }
        Err(_) => raw,
    }
}

/// Parses an absolute http(s) URL.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

pub fn is_allowed_url(url: &str, allowed_prefixes: &[String]) -> bool {
    allowed_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && url.starts_with(prefix.as_str()))
}
