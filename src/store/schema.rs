//! SQLite schema and migrations for the message store.

/// Database migrations.
///
/// Each migration is applied once, in order. The `schema_version` table
/// records which ones have run.
pub const MIGRATIONS: &[&str] = &[
    // v1: chat messages
    r#"
CREATE TABLE chat_messages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    room          TEXT NOT NULL,
    text          TEXT NOT NULL,
    sender_id     TEXT NOT NULL,
    sender_name   TEXT NOT NULL,
    sender_avatar TEXT,
    sent_at       TEXT NOT NULL            -- RFC 3339, UTC, microseconds
);

CREATE INDEX idx_chat_messages_room_sent_at ON chat_messages(room, sent_at, id);
"#,
    // v2: reject empty or oversized text at the storage layer too
    r#"
CREATE TRIGGER chat_messages_text_bounds
BEFORE INSERT ON chat_messages
WHEN length(trim(NEW.text)) = 0 OR length(NEW.text) > 160
BEGIN
    SELECT RAISE(ABORT, 'message text out of bounds');
END;
"#,
];
