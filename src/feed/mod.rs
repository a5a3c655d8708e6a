mod fetcher;
mod filter;
mod subscriptions;

pub use fetcher::{FeedFetcher, FetchError};
pub use filter::ContentFilter;
pub use subscriptions::parse_subscription_file;
