//! Section-level extraction passes for markdown tweet archives.
//!
//! An archive is a sequence of sections separated by `----`. Each section
//! holds one tweet as a blockquote plus a `[timestamp](status-url)` link.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

use tweetrag_shared::{MARKDOWN_FORMAT, Tweet};

/// Marker separating tweets in an archive.
pub(crate) const SECTION_SEPARATOR: &str = "----";

/// Timestamp layout used by Twitter exports, e.g. `Tue Aug 05 14:19:12 +0000 2008`.
const TWITTER_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Prefix for IDs of tweets that carry no status link.
const FALLBACK_ID_PREFIX: &str = "md_";

/// Metadata pulled from a section's status link.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct SectionMeta {
    pub timestamp: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub tweet_id: Option<String>,
}

/// Parse every tweet in `markdown`, tagging each with `source_file`.
pub(crate) fn parse_sections(markdown: &str, source_file: &str) -> Vec<Tweet> {
    markdown
        .split(SECTION_SEPARATOR)
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .filter_map(|section| parse_section(section, source_file))
        .collect()
}

/// Parse one section. Sections without quoted text are not tweets.
fn parse_section(section: &str, source_file: &str) -> Option<Tweet> {
    let content = extract_content(section)?;
    let meta = extract_metadata(section);

    let tweet_id = meta
        .tweet_id
        .unwrap_or_else(|| fallback_id(&content));
    let posted_at = meta.timestamp.as_deref().and_then(parse_timestamp);

    Some(Tweet {
        tweet_id,
        content,
        timestamp: meta.timestamp,
        posted_at,
        url: meta.url,
        author: meta.author,
        source_file: source_file.to_string(),
        format: MARKDOWN_FORMAT.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Pass 1: Blockquote text
// ---------------------------------------------------------------------------

/// Join the non-empty blockquote lines of a section with single spaces.
pub(crate) fn extract_content(section: &str) -> Option<String> {
    let lines: Vec<&str> = section
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('>'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Pass 2: Status link metadata
// ---------------------------------------------------------------------------

/// Extract timestamp, URL, author and ID from the first status link.
pub(crate) fn extract_metadata(section: &str) -> SectionMeta {
    static STATUS_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"\[([^\]]+)\]\((https://(?:www\.)?(?:twitter|x)\.com/([^/)]+)/status/(\d+))\)",
        )
        .expect("valid regex")
    });

    match STATUS_LINK_RE.captures(section) {
        Some(caps) => SectionMeta {
            timestamp: Some(caps[1].trim().to_string()),
            url: Some(caps[2].to_string()),
            author: Some(caps[3].to_string()),
            tweet_id: Some(caps[4].to_string()),
        },
        None => SectionMeta::default(),
    }
}

// ---------------------------------------------------------------------------
// Pass 3: Timestamp & fallback ID
// ---------------------------------------------------------------------------

/// Parse a Twitter export timestamp into UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), TWITTER_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Stable ID for link-less tweets, derived from the tweet text.
pub(crate) fn fallback_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex = format!("{digest:x}");
    format!("{FALLBACK_ID_PREFIX}{}", &hex[..16])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SECTION: &str = "![](https://pbs.twimg.com/a.jpg) [Tue Aug 05 14:19:12 +0000 2008](https://twitter.com/dammitandy/status/878282969)\n\n> Shipping code today.";

    #[test]
    fn extract_content_joins_quote_lines() {
        let section = "> first line\n>\n>   second line  \nnot quoted";
        assert_eq!(
            extract_content(section).as_deref(),
            Some("first line second line")
        );
    }

    #[test]
    fn extract_content_none_without_quote() {
        assert!(extract_content("just some text\n[link](https://x)").is_none());
        assert!(extract_content(">\n>   \n").is_none());
    }

    #[test]
    fn extract_content_handles_indented_quotes() {
        assert_eq!(extract_content("   > indented").as_deref(), Some("indented"));
    }

    #[test]
    fn extract_metadata_from_status_link() {
        let meta = extract_metadata(SECTION);
        assert_eq!(meta.timestamp.as_deref(), Some("Tue Aug 05 14:19:12 +0000 2008"));
        assert_eq!(
            meta.url.as_deref(),
            Some("https://twitter.com/dammitandy/status/878282969")
        );
        assert_eq!(meta.author.as_deref(), Some("dammitandy"));
        assert_eq!(meta.tweet_id.as_deref(), Some("878282969"));
    }

    #[test]
    fn extract_metadata_accepts_x_dot_com() {
        let meta = extract_metadata("[Mon Jan 01 00:00:00 +0000 2024](https://x.com/someone/status/17)");
        assert_eq!(meta.author.as_deref(), Some("someone"));
        assert_eq!(meta.tweet_id.as_deref(), Some("17"));
    }

    #[test]
    fn extract_metadata_ignores_image_and_other_links() {
        let meta = extract_metadata("![](https://pbs.twimg.com/a.jpg) [home](https://example.com)");
        assert_eq!(meta, SectionMeta::default());
    }

    #[test]
    fn parse_timestamp_twitter_format() {
        let dt = parse_timestamp("Tue Aug 05 14:19:12 +0000 2008").expect("parse");
        assert_eq!(dt.year(), 2008);
        assert_eq!(dt.month(), 8);
        assert_eq!(dt.day(), 5);
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn parse_timestamp_converts_offset_to_utc() {
        let dt = parse_timestamp("Wed Aug 06 09:00:00 +0200 2008").expect("parse");
        assert_eq!(dt.hour(), 7);
    }

    #[test]
    fn parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("2008-08-05T14:19:12Z").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn fallback_id_is_stable_and_content_derived() {
        let a = fallback_id("same text");
        let b = fallback_id("same text");
        let c = fallback_id("other text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("md_"));
        assert_eq!(a.len(), 3 + 16);
    }

    #[test]
    fn parse_sections_skips_empty_and_unquoted() {
        let md = "# Header\n\n----\n\n----\n\nno quote here\n\n----\n\n> only this one\n\n----\n";
        let tweets = parse_sections(md, "a.md");
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].content, "only this one");
        assert_eq!(tweets[0].source_file, "a.md");
        assert_eq!(tweets[0].format, "markdown");
        assert!(tweets[0].tweet_id.starts_with("md_"));
    }

    #[test]
    fn parse_section_populates_metadata() {
        let tweets = parse_sections(SECTION, "a.md");
        assert_eq!(tweets.len(), 1);
        let tweet = &tweets[0];
        assert_eq!(tweet.tweet_id, "878282969");
        assert_eq!(tweet.content, "Shipping code today.");
        assert!(tweet.posted_at.is_some());
        assert_eq!(tweet.author.as_deref(), Some("dammitandy"));
    }
}
