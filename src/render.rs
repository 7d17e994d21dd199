//! Content synthesis: turns a feed item into the bytes of its file.

use chrono::{DateTime, Utc};

use crate::source::FeedItem;

/// Body used when an item has neither content nor summary.
pub const NO_CONTENT: &str = "no content available.";

/// Shown in place of the publish date when the item has none.
pub const UNKNOWN_DATE: &str = "unknown";

/// RFC 1123 style, e.g. `Mon, 01 Jan 2024 00:00:00 UTC`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S %Z").to_string()
}

/// Render `item` into the fixed text template.
pub fn render(item: &FeedItem) -> Vec<u8> {
    let published = item
        .published
        .as_ref()
        .map(format_date)
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());

    format!(
        "Title: {}\nLink: {}\nPublished: {}\n\n{}\n",
        item.title,
        item.link,
        published,
        item.body().unwrap_or(NO_CONTENT),
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_full_item() {
        let item = FeedItem {
            title: "Hello/World".to_string(),
            link: "http://x".to_string(),
            published: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            content: Some("Body text".to_string()),
            summary: Some("ignored".to_string()),
        };

        let text = String::from_utf8(render(&item)).unwrap();
        assert_eq!(
            text,
            "Title: Hello/World\nLink: http://x\nPublished: Mon, 01 Jan 2024 00:00:00 UTC\n\nBody text\n"
        );
    }

    #[test]
    fn summary_used_when_content_empty() {
        let item = FeedItem {
            title: "t".to_string(),
            content: Some(String::new()),
            summary: Some("just a summary".to_string()),
            ..FeedItem::default()
        };
        let text = String::from_utf8(render(&item)).unwrap();
        assert!(text.ends_with("\n\njust a summary\n"));
    }

    #[test]
    fn placeholder_when_no_body() {
        let item = FeedItem {
            title: "t".to_string(),
            ..FeedItem::default()
        };
        let text = String::from_utf8(render(&item)).unwrap();
        assert!(text.contains(NO_CONTENT));
        assert!(text.contains("Published: unknown\n"));
    }
}
