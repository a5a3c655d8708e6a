use std::path::Path;

use opml::{Outline, OPML};

use crate::error::Result;

/// Feed names of every subscription in an OPML document whose feed URL is
/// `<prefix><name>/rss`.
pub fn parse_subscriptions(xml: &str, prefix: &str) -> Result<Vec<String>> {
    let document = OPML::from_str(xml)?;

    let mut names = Vec::new();
    collect_names(&document.body.outlines, prefix, &mut names);
    Ok(names)
}

pub fn parse_subscription_file(path: &Path, prefix: &str) -> Result<Vec<String>> {
    let xml = std::fs::read_to_string(path)?;
    parse_subscriptions(&xml, prefix)
}

fn collect_names(outlines: &[Outline], prefix: &str, names: &mut Vec<String>) {
    for outline in outlines {
        if let Some(name) = outline
            .xml_url
            .as_deref()
            .and_then(|url| feed_name(url, prefix))
        {
            names.push(name.to_string());
        }
        collect_names(&outline.outlines, prefix, names);
    }
}

fn feed_name<'a>(url: &'a str, prefix: &str) -> Option<&'a str> {
    let (name, rest) = url.strip_prefix(prefix)?.split_once('/')?;
    if name.is_empty() || !rest.starts_with("rss") {
        return None;
    }
    Some(name)
}
