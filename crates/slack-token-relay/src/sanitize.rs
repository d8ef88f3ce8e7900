//! Sanitization of requester-supplied labels.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum length of a sanitized label, in characters.
pub const MAX_LABEL_CHARS: usize = 100;

/// Characters that could break HTML attribute or URL embedding, plus controls.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>"'&`\\\p{Cc}]"#).expect("valid label pattern"));

/// Clean an optional free-text label for storage and display.
///
/// Absent input becomes an empty string. Unsafe characters are removed,
/// surrounding whitespace is trimmed and the result is capped at
/// [`MAX_LABEL_CHARS`].
#[must_use]
pub fn sanitize_label(input: Option<&str>) -> String {
    let Some(raw) = input else {
        return String::new();
    };

    let stripped = UNSAFE_CHARS.replace_all(raw, "");
    let capped: String = stripped.trim().chars().take(MAX_LABEL_CHARS).collect();
    capped.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_empty() {
        assert_eq!(sanitize_label(None), "");
        assert_eq!(sanitize_label(Some("   ")), "");
    }

    #[test]
    fn test_strips_markup() {
        assert_eq!(sanitize_label(Some(r#" <b>Ada</b> "Lovelace" "#)), "bAda/b Lovelace");
        assert_eq!(sanitize_label(Some("a&b'c`d\\e")), "abcde");
        assert_eq!(sanitize_label(Some("line\nbreak\u{0}")), "linebreak");
    }

    #[test]
    fn test_caps_length_by_chars() {
        let long = "é".repeat(250);
        assert_eq!(sanitize_label(Some(&long)).chars().count(), MAX_LABEL_CHARS);
    }

    #[test]
    fn test_keeps_ordinary_text() {
        assert_eq!(sanitize_label(Some("U024BE7LH")), "U024BE7LH");
        assert_eq!(sanitize_label(Some("Grace Hopper")), "Grace Hopper");
    }
}
