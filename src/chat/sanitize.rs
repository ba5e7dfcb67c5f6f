//! Chat input sanitization.
//!
//! Allowed characters are ASCII letters and digits, whitespace, and the
//! punctuation in [`ALLOWED_PUNCTUATION`]. Complete HTML-like tags are
//! removed before the character filter runs, so markup never leaves its tag
//! names behind in the text.
//!
//! Tags are only recognised when the whole `<...>` is present in one
//! [`InputBuffer::set`] call. Typed one key at a time, `<`, `/` and `>` are
//! dropped as they arrive and the tag name stays: `"<b>gm</b>"` pasted reads
//! `"gm"`, typed it reads `"bgmb"`.

use std::sync::OnceLock;

use regex::Regex;

/// Punctuation accepted in chat messages.
pub const ALLOWED_PUNCTUATION: &str = "!@#$%^&*()_+-=[]{};':\"|,.?~";

/// Default maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 160;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^<>]*>").expect("tag pattern is valid"))
}

/// Check whether a single character is allowed in chat text.
pub fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(c)
}

/// Remove markup and every character outside the allow-list.
///
/// Idempotent: sanitizing already sanitized text returns it unchanged.
pub fn sanitize(raw: &str) -> String {
    tag_pattern()
        .replace_all(raw, "")
        .chars()
        .filter(|&c| is_allowed_char(c))
        .collect()
}

/// Why a message failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// Nothing left after trimming.
    Empty,
    /// Longer than the maximum length.
    TooLong,
}

impl ValidationReason {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::Empty => "empty",
            ValidationReason::TooLong => "too_long",
        }
    }
}

/// Sanitize and bound a message for submission.
///
/// Returns the trimmed text to store.
pub fn prepare_message(raw: &str, max_length: usize) -> Result<String, ValidationReason> {
    let sanitized = sanitize(raw);
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        return Err(ValidationReason::Empty);
    }
    if trimmed.chars().count() > max_length {
        return Err(ValidationReason::TooLong);
    }
    Ok(trimmed.to_string())
}

/// Text being typed into the chat box.
///
/// Every change goes through [`sanitize`] and is truncated to the maximum
/// length, so the buffer never holds disallowed characters.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    text: String,
    max_length: usize,
}

impl InputBuffer {
    /// Create an empty buffer.
    pub fn new(max_length: usize) -> Self {
        Self {
            text: String::new(),
            max_length,
        }
    }

    /// Replace the buffer contents with newly typed text.
    pub fn set(&mut self, raw: &str) -> &str {
        let mut sanitized = sanitize(raw);
        if let Some((cut, _)) = sanitized.char_indices().nth(self.max_length) {
            sanitized.truncate(cut);
        }
        self.text = sanitized;
        &self.text
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether there is anything to send.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Characters left before the limit.
    pub fn remaining(&self) -> usize {
        self.max_length.saturating_sub(self.text.chars().count())
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_LENGTH)
    }
}
