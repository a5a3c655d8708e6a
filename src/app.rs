use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{ProxyError, Result};
use crate::feed::{parse_subscription_file, ContentFilter, FeedFetcher};
use crate::models::{millis, now_millis};

/// State shared by every proxied request.
pub struct App {
    pub repository: Repository,
    fetcher: Arc<FeedFetcher>,
    filter: ContentFilter,
    success_interval: Duration,
}

impl App {
    pub fn new(config: &Config, repository: Repository, fetcher: Arc<FeedFetcher>) -> Result<Self> {
        let filter = ContentFilter::new(
            &config.filter.upstream_host,
            &config.filter.replacement_host,
        )?;

        Ok(Self {
            repository,
            fetcher,
            filter,
            success_interval: config.schedule.success_interval(),
        })
    }

    /// Fetch, filter and return the feed for `name`, then put it on the
    /// refresh schedule. Failed fetches are not scheduled.
    pub async fn handle_request(
        &self,
        name: &str,
        include_reshares: bool,
    ) -> std::result::Result<String, ProxyError> {
        if name.is_empty() {
            return Err(ProxyError::MissingName);
        }

        tracing::info!("requested. [{}]", name);

        let raw = self.fetcher.fetch(name).await.map_err(|e| {
            tracing::warn!("[{}] {}", name, e);
            ProxyError::from(e)
        })?;
        let body = self.filter.apply(&raw, include_reshares);

        let now = now_millis();
        self.repository
            .record_request(name, now, now + millis(self.success_interval))
            .await?;

        Ok(body)
    }

    /// Warm up the schedule from an OPML subscription list. Returns the
    /// number of feeds recorded.
    pub async fn import_subscriptions(&self, path: &Path, prefix: &str) -> Result<usize> {
        tracing::info!("reading subscriptions from {:?}", path);
        let names = parse_subscription_file(path, prefix)?;

        let now = now_millis();
        for name in &names {
            tracing::info!("record user {}", name);
            self.repository.seed(name, now).await?;
        }

        Ok(names.len())
    }

    /// Startup seeding: an unreadable or malformed subscription list is
    /// logged and skipped so the proxy still comes up.
    pub async fn seed_subscriptions(&self, path: &Path, prefix: &str) -> usize {
        match self.import_subscriptions(path, prefix).await {
            Ok(count) => {
                tracing::info!("seeded {} feeds from {:?}", count, path);
                count
            }
            Err(e) => {
                tracing::warn!("skipping subscriptions {:?}: {}", path, e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::test_support::FakeUpstream;

    const HOUR: i64 = 3_600_000;

    async fn app_for(fake: &FakeUpstream) -> App {
        let mut config = Config::default();
        config.upstream.url = fake.base_url.clone();
        let fetcher = Arc::new(FeedFetcher::new(&config.upstream, &HttpConfig::default()).unwrap());
        let repository = Repository::in_memory().await.unwrap();
        App::new(&config, repository, fetcher).unwrap()
    }

    #[tokio::test]
    async fn success_schedules_one_hour_ahead() {
        let fake = FakeUpstream::spawn(&[("Alice", 200, "<rss/>")]).await;
        let app = app_for(&fake).await;

        let before = now_millis();
        app.handle_request("Alice", false).await.unwrap();
        let after = now_millis();

        let entry = app.repository.get("alice").await.unwrap().unwrap();
        assert_eq!(entry.display_id, "Alice");
        assert!(entry.last_requested_at >= before && entry.last_requested_at <= after);
        assert_eq!(entry.next_eligible_at, entry.last_requested_at + HOUR);
    }

    #[tokio::test]
    async fn repeated_requests_keep_one_row() {
        let fake = FakeUpstream::spawn(&[("Alice", 200, "<rss/>"), ("ALICE", 200, "<rss/>")]).await;
        let app = app_for(&fake).await;

        app.handle_request("Alice", false).await.unwrap();
        app.handle_request("ALICE", true).await.unwrap();
        app.handle_request("Alice", false).await.unwrap();

        assert_eq!(app.repository.count().await.unwrap(), 1);
        let entry = app.repository.get("alice").await.unwrap().unwrap();
        assert_eq!(entry.next_eligible_at, entry.last_requested_at + HOUR);
    }

    #[tokio::test]
    async fn empty_name_touches_nothing() {
        let fake = FakeUpstream::spawn(&[]).await;
        let app = app_for(&fake).await;

        let result = app.handle_request("", false).await;
        assert!(matches!(result, Err(ProxyError::MissingName)));
        assert!(fake.requests().is_empty());
        assert_eq!(app.repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upstream_error_is_not_scheduled() {
        let fake = FakeUpstream::spawn(&[]).await;
        let app = app_for(&fake).await;

        match app.handle_request("ghost", false).await {
            Err(ProxyError::Upstream { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(app.repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn imports_subscriptions_as_due() {
        let fake = FakeUpstream::spawn(&[]).await;
        let app = app_for(&fake).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.opml");
        std::fs::write(
            &path,
            r#"<opml version="2.0"><head/><body>
<outline text="a" xmlUrl="https://nitter.juggler.jp/x/Alice/rss"/>
<outline text="b" xmlUrl="https://nitter.juggler.jp/x/alice/rss"/>
<outline text="c" xmlUrl="https://nitter.juggler.jp/x/Bob/rss"/>
</body></opml>"#,
        )
        .unwrap();

        let imported = app
            .import_subscriptions(&path, "https://nitter.juggler.jp/x/")
            .await
            .unwrap();
        assert_eq!(imported, 3);
        assert_eq!(app.repository.count().await.unwrap(), 2);

        let bob = app.repository.get("bob").await.unwrap().unwrap();
        assert_eq!(bob.display_id, "Bob");
        assert_eq!(bob.next_eligible_at, 0);
    }

    #[tokio::test]
    async fn malformed_subscriptions_are_skipped() {
        let fake = FakeUpstream::spawn(&[]).await;
        let app = app_for(&fake).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.opml");
        std::fs::write(&path, "<not-opml/>").unwrap();

        let prefix = "https://nitter.juggler.jp/x/";
        assert!(app.import_subscriptions(&path, prefix).await.is_err());
        assert_eq!(app.seed_subscriptions(&path, prefix).await, 0);
        assert_eq!(
            app.seed_subscriptions(&dir.path().join("missing.opml"), prefix).await,
            0
        );
        assert_eq!(app.repository.count().await.unwrap(), 0);
    }
}
