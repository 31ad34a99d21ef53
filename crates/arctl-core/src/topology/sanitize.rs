//! Deterministic, idempotent sanitizers for paths, tags and service names.

/// Map a version string onto a safe path / image-tag segment.
///
/// Characters outside `[A-Za-z0-9._-]` become `-`. Applying it twice is
/// the same as applying it once.
pub fn sanitize_version(version: &str) -> String {
    let sanitized: String = version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    match sanitized.as_str() {
        "" => "latest".to_string(),
        // "." and ".." are not usable path segments
        "." | ".." => sanitized.replace('.', "-"),
        _ => sanitized,
    }
}

/// Map a name onto an RFC 1123 DNS label: lowercase alphanumerics and `-`,
/// no leading or trailing `-`, at most 63 characters.
pub fn dns_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            label.push(c);
            last_dash = false;
        } else if !last_dash {
            label.push('-');
            last_dash = true;
        }
    }
    label.truncate(63);
    let trimmed = label.trim_matches('-');
    if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_version_replaces_unsafe_chars() {
        assert_eq!(sanitize_version("1.0.0"), "1.0.0");
        assert_eq!(sanitize_version("1.0.0+build/7"), "1.0.0-build-7");
        assert_eq!(sanitize_version("v2:rc 1"), "v2-rc-1");
        assert_eq!(sanitize_version(""), "latest");
        assert_eq!(sanitize_version(".."), "--");
    }

    #[test]
    fn test_sanitize_version_is_idempotent() {
        for input in [
            "1.0.0",
            "1.0.0+build/7",
            "../../etc",
            "",
            ".",
            "..",
            "ünïcode-1",
            "a b\tc",
            "latest",
        ] {
            let once = sanitize_version(input);
            assert_eq!(sanitize_version(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_dns_label() {
        assert_eq!(dns_label("Weather"), "weather");
        assert_eq!(dns_label("io.github.org/weather"), "io-github-org-weather");
        assert_eq!(dns_label("--dice--"), "dice");
        assert_eq!(dns_label("___"), "x");
        assert_eq!(dns_label(&"a".repeat(80)).len(), 63);
    }

    #[test]
    fn test_dns_label_is_idempotent() {
        for input in ["Weather", "io.github.org/weather", "a--b", "-x-", "", "1.0.0"] {
            let once = dns_label(input);
            assert_eq!(dns_label(&once), once, "input: {input:?}");
        }
    }
}
