use std::time::Duration;

use chrono::Utc;

/// Case-folded feed identity used as the schedule's primary key.
pub fn normalize(id: &str) -> String {
    id.to_lowercase()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedScheduleEntry {
    pub normalized_id: String,
    pub display_id: String,
    pub last_requested_at: i64,
    pub next_eligible_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Not requested within the staleness window; never refreshed again
    /// until a client asks for it
    Stale,
    Waiting,
    Due,
}

impl FeedScheduleEntry {
    pub fn eligibility(&self, now: i64, staleness_window: Duration) -> Eligibility {
        if self.last_requested_at < now.saturating_sub(millis(staleness_window)) {
            Eligibility::Stale
        } else if self.next_eligible_at <= now {
            Eligibility::Due
        } else {
            Eligibility::Waiting
        }
    }
}
