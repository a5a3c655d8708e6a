mod schedule;

pub(crate) use schedule::millis;
pub use schedule::{normalize, now_millis, Eligibility, FeedScheduleEntry};
