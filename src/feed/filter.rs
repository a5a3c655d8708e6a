use regex::{Captures, Regex};

use crate::error::Result;

/// Rewrites feed text fetched from the upstream before it is returned.
pub struct ContentFilter {
    host_re: Regex,
    replacement_host: String,
    reshare_re: Regex,
}

impl ContentFilter {
    pub fn new(upstream_host: &str, replacement_host: &str) -> Result<Self> {
        // Media under /pic/ is served by the upstream itself and keeps its host.
        let host_re = Regex::new(&format!("{}(/pic/)?", regex::escape(upstream_host)))
            .map_err(anyhow::Error::from)?;
        let reshare_re =
            Regex::new(r"(?s)<item>\s*<title>RT .+?</item>").map_err(anyhow::Error::from)?;

        Ok(Self {
            host_re,
            replacement_host: replacement_host.to_string(),
            reshare_re,
        })
    }

    pub fn apply(&self, raw: &str, include_reshares: bool) -> String {
        let rewritten = self.host_re.replace_all(raw, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                self.replacement_host.clone()
            }
        });

        if include_reshares {
            rewritten.into_owned()
        } else {
            self.reshare_re.replace_all(&rewritten, "").into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<rss><channel>
<link>https://nitter.juggler.jp/alice</link>
<item>
  <title>hello world</title>
  <link>https://nitter.juggler.jp/alice/status/1</link>
  <description><img src="https://nitter.juggler.jp/pic/media%2Fabc.jpg"/></description>
</item>
<item>
  <title>RT by @alice: something else</title>
  <link>https://nitter.juggler.jp/bob/status/2</link>
</item>
</channel></rss>"#;

    fn filter() -> ContentFilter {
        ContentFilter::new("nitter.juggler.jp", "twitter.com").unwrap()
    }

    #[test]
    fn rewrites_domain_but_not_media() {
        let out = filter().apply(FEED, true);
        assert!(out.contains("<link>https://twitter.com/alice</link>"));
        assert!(out.contains("https://twitter.com/alice/status/1"));
        assert!(out.contains("https://nitter.juggler.jp/pic/media%2Fabc.jpg"));
        assert_eq!(out.matches("nitter.juggler.jp").count(), 1);
    }

    #[test]
    fn strips_reshares_unless_requested() {
        let stripped = filter().apply(FEED, false);
        assert_eq!(stripped.matches("<title>RT ").count(), 0);
        assert!(stripped.contains("<title>hello world</title>"));
        assert!(!stripped.contains("twitter.com/bob/status/2"));

        let kept = filter().apply(FEED, true);
        assert_eq!(kept.matches("<title>RT ").count(), 1);
        assert!(kept.contains("https://twitter.com/bob/status/2"));
    }

    #[test]
    fn text_without_markers_is_unchanged() {
        let plain = "<rss><item><title>plain</title></item></rss>";
        assert_eq!(filter().apply(plain, true), plain);
        assert_eq!(filter().apply(plain, false), plain);
    }

    #[test]
    fn removes_every_reshare() {
        let text = "<item><title>RT a</title></item><item>\n<title>RT b</title>\n</item><item><title>keep</title></item>";
        let out = filter().apply(text, false);
        assert_eq!(out, "<item><title>keep</title></item>");
    }

    #[test]
    fn escapes_configured_host() {
        let filter = ContentFilter::new("a.b", "c.d").unwrap();
        assert_eq!(filter.apply("axb a.b", true), "axb c.d");
    }
}
