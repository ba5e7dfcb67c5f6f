//! Room rules shown to participants.

/// Rules of the Degen Chat room.
pub const CHAT_RULES: [&str; 5] = [
    "No spamming",
    "No NSFW content",
    "Respect others",
    "No FUD or shilling unrelated projects",
    "English only",
];

/// Numbered plain-text rendering of the rules.
pub fn format_rules() -> String {
    CHAT_RULES
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rules() {
        let text = format_rules();
        assert!(text.starts_with("1. No spamming"));
        assert!(text.ends_with("5. English only"));
        assert_eq!(text.lines().count(), CHAT_RULES.len());
    }
}
