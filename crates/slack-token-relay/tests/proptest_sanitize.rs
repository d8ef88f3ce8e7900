//! Property-based tests for requester label sanitization and state tokens.

use proptest::prelude::*;

use slack_token_relay::sanitize::{MAX_LABEL_CHARS, sanitize_label};
use slack_token_relay::state::{STATE_TOKEN_LEN, generate_state_token};

const STRIPPED: &[char] = &['<', '>', '"', '\'', '&', '`', '\\'];

proptest! {
    #[test]
    fn sanitized_labels_never_contain_unsafe_chars(input in any::<String>()) {
        let out = sanitize_label(Some(&input));
        prop_assert!(!out.chars().any(|c| STRIPPED.contains(&c) || c.is_control()));
    }

    #[test]
    fn sanitized_labels_are_bounded_and_trimmed(input in any::<String>()) {
        let out = sanitize_label(Some(&input));
        prop_assert!(out.chars().count() <= MAX_LABEL_CHARS);
        prop_assert_eq!(out.trim(), out.as_str());
    }

    #[test]
    fn sanitize_is_idempotent(input in any::<String>()) {
        let once = sanitize_label(Some(&input));
        let twice = sanitize_label(Some(&once));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn plain_labels_pass_through(input in "[a-zA-Z0-9_.-]{1,100}") {
        prop_assert_eq!(sanitize_label(Some(&input)), input);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn state_tokens_are_hex_of_fixed_length(_seed in any::<u8>()) {
        let token = generate_state_token();
        prop_assert_eq!(token.len(), STATE_TOKEN_LEN);
        prop_assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
