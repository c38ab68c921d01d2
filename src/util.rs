use reqwest::Url;

/// Parse "true"/"false"/"1"/"0" style flags.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reads a boolean flag from the environment, falling back to `default` when
/// the variable is unset or unparsable.
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(default)
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    match parsed.host_str() {
        Some(host) => {
            let normalized = host
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_ascii_lowercase();
            normalized == "localhost"
                || normalized == "::1"
                || normalized == "0.0.0.0"
                || normalized.starts_with("127.")
        }
        None => false,
    }
}

/// Appends the part of `incoming` that extends `existing` and returns it.
///
/// `incoming` is the full re-derived text, so the common case is a pure
/// extension. When the derivation diverges (it should not, but a display
/// must never duplicate text) the whole of `incoming` replaces `existing` and
/// is returned.
pub fn append_incremental_suffix(existing: &mut String, incoming: &str) -> String {
    if let Some(suffix) = incoming.strip_prefix(existing.as_str()) {
        let suffix = suffix.to_string();
        existing.push_str(&suffix);
        return suffix;
    }
    if existing.starts_with(incoming) {
        return String::new();
    }
    existing.clear();
    existing.push_str(incoming);
    incoming.to_string()
}

/// Last slash-separated segment of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Directory part of a slash-separated path, `None` at the root.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}
