pub const SCHEMA: &str = r#"
-- one row per tracked feed identity
CREATE TABLE IF NOT EXISTS feed_schedule (
    normalized_id TEXT NOT NULL PRIMARY KEY,
    display_id TEXT NOT NULL,
    last_requested_at INTEGER NOT NULL,
    next_eligible_at INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_feed_schedule_next_eligible
    ON feed_schedule(next_eligible_at, last_requested_at);
"#;
