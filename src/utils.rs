/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}

/// First seven characters of a commit id, or the whole id when shorter.
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Ensure a directory exists
pub fn ensure_dir(path: &std::path::Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(html_escape("\"quoted\""), "&#34;quoted&#34;");
        assert_eq!(html_escape("it's"), "it&#39;s");
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("deadbeefcafe"), "deadbee");
        assert_eq!(short_sha("dead123"), "dead123");
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha(""), "");
    }
}
