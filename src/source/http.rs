//! HTTP feed source.
//!
//! Fetches a document over HTTP and parses it as RSS 2.0 (via the [`rss`]
//! crate) or, failing that, as Atom (via [`atom_syndication`]).
//!
//! The parsing half is a set of pure functions so that tests can exercise
//! it without hitting the network.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{Feed, FeedItem, FeedSource};
use crate::error::FetchError;

/// A feed source backed by a blocking [`reqwest`] client.
pub struct HttpFeedSource {
    client: reqwest::blocking::Client,
}

impl HttpFeedSource {
    /// Create a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("feedfs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self, url: &str) -> Result<Feed, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = response.bytes()?;
        debug!(url, bytes = body.len(), "downloaded feed document");
        parse_document(body.as_ref())
    }
}

/// Parse a raw document, trying RSS first and Atom second.
pub fn parse_document(body: &[u8]) -> Result<Feed, FetchError> {
    match rss::Channel::read_from(body) {
        Ok(channel) => Ok(parse_channel(&channel)),
        Err(rss_err) => match atom_syndication::Feed::read_from(body) {
            Ok(feed) => Ok(parse_atom(&feed)),
            Err(atom_err) => Err(FetchError::Parse(format!(
                "rss: {rss_err}; atom: {atom_err}"
            ))),
        },
    }
}

/// Convert an already-parsed [`rss::Channel`].
pub fn parse_channel(channel: &rss::Channel) -> Feed {
    let items = channel
        .items()
        .iter()
        .map(|item| {
            // Parse RFC-2822 date; gracefully degrade to None on failure.
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|dt| dt.with_timezone(&Utc));

            FeedItem {
                title: item.title().unwrap_or_default().to_string(),
                link: item.link().unwrap_or_default().to_string(),
                published,
                content: item.content().map(String::from),
                summary: item.description().map(String::from),
            }
        })
        .collect();

    Feed {
        title: channel.title().to_string(),
        items,
    }
}

/// Convert an already-parsed Atom [`atom_syndication::Feed`].
pub fn parse_atom(feed: &atom_syndication::Feed) -> Feed {
    let items = feed
        .entries()
        .iter()
        .map(|entry| {
            // <updated> is mandatory in Atom, but lenient parsing fills in
            // the epoch when it is missing.
            let published = entry
                .published()
                .copied()
                .or_else(|| Some(*entry.updated()))
                .filter(|dt| dt.timestamp() != 0)
                .map(|dt| dt.with_timezone(&Utc));

            FeedItem {
                title: entry.title().value.clone(),
                link: entry
                    .links()
                    .first()
                    .map(|l| l.href().to_string())
                    .unwrap_or_default(),
                published,
                content: entry
                    .content()
                    .and_then(|c| c.value())
                    .map(String::from),
                summary: entry.summary().map(|s| s.value.clone()),
            }
        })
        .collect();

    Feed {
        title: feed.title().value.clone(),
        items,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
