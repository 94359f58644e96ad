//! Markdown tweet-archive loading and parsing.
//!
//! Reads archive files (one tweet per `----`-separated section, text in a
//! blockquote, metadata in a `[timestamp](status-url)` link) and turns them
//! into [`Tweet`] records ready for embedding.

mod parser;

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use tweetrag_shared::{Result, Tweet, TweetRagError};

/// The only archive extension accepted.
const MARKDOWN_EXTENSION: &str = "md";

/// Default file pattern for directory loading.
pub const DEFAULT_FILE_PATTERN: &str = "*.md";

/// Parse an in-memory archive document.
///
/// Sections without blockquote text are skipped. Tweets without a status
/// link get a stable `md_<hash>` ID derived from their text.
pub fn parse_archive(markdown: &str, source_file: &str) -> Vec<Tweet> {
    parser::parse_sections(markdown, source_file)
}

/// Check that `path` exists and is a markdown file, without reading it.
pub fn check_markdown_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TweetRagError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "tweet file not found"),
        ));
    }

    if !is_markdown(path) {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "(none)".to_string());
        return Err(TweetRagError::validation(format!(
            "only markdown (.md) files are supported, got: {ext}"
        )));
    }
    Ok(())
}

/// Check that `dir` exists and is a directory.
pub fn check_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(TweetRagError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "directory not found"),
        ));
    }
    if !dir.is_dir() {
        return Err(TweetRagError::validation(format!(
            "not a directory: {}",
            dir.display()
        )));
    }
    Ok(())
}

/// Load tweets from a single markdown archive file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_tweets_from_file(path: &Path) -> Result<Vec<Tweet>> {
    check_markdown_file(path)?;

    let content = std::fs::read_to_string(path).map_err(|e| TweetRagError::io(path, e))?;
    let tweets = parse_archive(&content, &path.to_string_lossy());

    info!(count = tweets.len(), "loaded tweets from markdown file");
    Ok(tweets)
}

/// Load tweets from every file in `dir` whose relative path matches `pattern`.
///
/// Files are read in sorted order. A file that fails to load is logged and
/// skipped. Patterns containing `/` are matched against nested paths.
#[instrument(skip_all, fields(dir = %dir.display(), pattern = %pattern))]
pub fn load_tweets_from_directory(dir: &Path, pattern: &str) -> Result<Vec<Tweet>> {
    check_directory(dir)?;

    let matcher = glob_to_regex(pattern).ok_or_else(|| {
        TweetRagError::validation(format!("invalid file pattern: {pattern}"))
    })?;

    let files = matching_files(dir, &matcher, pattern.contains('/'))?;
    if files.is_empty() {
        warn!("no files found matching pattern");
        return Ok(Vec::new());
    }

    let mut all_tweets = Vec::new();
    for file in &files {
        match load_tweets_from_file(file) {
            Ok(tweets) => all_tweets.extend(tweets),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "failed to load archive file, skipping");
            }
        }
    }

    info!(
        files = files.len(),
        count = all_tweets.len(),
        "loaded tweets from directory"
    );
    Ok(all_tweets)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(MARKDOWN_EXTENSION))
        .unwrap_or(false)
}

/// Collect files under `dir` whose `/`-separated relative path matches.
fn matching_files(dir: &Path, matcher: &Regex, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| TweetRagError::io(&current, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
                continue;
            }

            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if matcher.is_match(&relative) {
                debug!(file = %relative, "matched archive file");
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Convert a glob-like pattern to a regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    Regex::new(&format!("^{escaped}$")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from("../../../fixtures/archive").join(name)
    }

    #[test]
    fn load_fixture_file() {
        let tweets = load_tweets_from_file(&fixture_path("tweets.md")).expect("load fixture");
        assert_eq!(tweets.len(), 3);

        assert_eq!(tweets[0].tweet_id, "878282969");
        assert_eq!(
            tweets[0].content,
            "Just set up my first Rails app on a VPS. Capistrano is magic."
        );
        assert_eq!(
            tweets[0].timestamp.as_deref(),
            Some("Tue Aug 05 14:19:12 +0000 2008")
        );
        assert!(tweets[0].source_file.ends_with("tweets.md"));

        assert_eq!(
            tweets[1].content,
            "Listening to Radiohead's In Rainbows on repeat. Still the best album of the year."
        );

        // Link-less tweet gets a content-derived ID
        assert!(tweets[2].tweet_id.starts_with("md_"));
        assert!(tweets[2].url.is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_tweets_from_file(Path::new("does/not/exist.md")).unwrap_err();
        assert!(matches!(err, TweetRagError::Io { .. }));
    }

    #[test]
    fn non_markdown_file_rejected() {
        let err = load_tweets_from_file(&fixture_path("more/notes.txt")).unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));
        assert!(err.to_string().contains(".txt"));
    }

    #[test]
    fn checks_do_not_need_valid_content() {
        let dir = std::env::temp_dir().join(format!("tweetrag_archive_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("big.md");
        std::fs::write(&path, [0xff_u8, 0xfe, 0x00]).unwrap();

        check_markdown_file(&path).expect("markdown file");
        check_directory(&dir).expect("directory");
        // Reading it is what fails
        assert!(load_tweets_from_file(&path).is_err());

        assert!(matches!(
            check_markdown_file(&fixture_path("more/notes.txt")).unwrap_err(),
            TweetRagError::Validation { .. }
        ));
        assert!(matches!(
            check_directory(&path).unwrap_err(),
            TweetRagError::Validation { .. }
        ));
        assert!(matches!(
            check_markdown_file(Path::new("does/not/exist.md")).unwrap_err(),
            TweetRagError::Io { .. }
        ));
    }

    #[test]
    fn uppercase_extension_accepted() {
        let dir = std::env::temp_dir().join(format!("tweetrag_archive_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("EXPORT.MD");
        std::fs::write(&path, "> hello\n").unwrap();

        let tweets = load_tweets_from_file(&path).expect("load");
        assert_eq!(tweets.len(), 1);
    }

    #[test]
    fn directory_default_pattern_is_not_recursive() {
        let tweets =
            load_tweets_from_directory(&fixture_path(""), DEFAULT_FILE_PATTERN).expect("load dir");
        assert_eq!(tweets.len(), 3);
    }

    #[test]
    fn directory_nested_pattern() {
        let tweets = load_tweets_from_directory(&fixture_path(""), "**/*.md").expect("load dir");
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].tweet_id, "1098765432");
    }

    #[test]
    fn directory_without_matches_is_empty() {
        let tweets = load_tweets_from_directory(&fixture_path(""), "*.json").expect("load dir");
        assert!(tweets.is_empty());
    }

    #[test]
    fn txt_pattern_files_are_skipped_not_fatal() {
        let tweets = load_tweets_from_directory(&fixture_path("more"), "*").expect("load dir");
        // notes.txt fails validation and is skipped; 2009.md still loads
        assert_eq!(tweets.len(), 1);
    }

    #[test]
    fn missing_directory_is_error() {
        assert!(load_tweets_from_directory(Path::new("no/such/dir"), "*.md").is_err());
    }

    #[test]
    fn glob_to_regex_matches() {
        let re = glob_to_regex("*.md").unwrap();
        assert!(re.is_match("tweets.md"));
        assert!(!re.is_match("more/2009.md"));
        assert!(!re.is_match("tweets.md.bak"));

        let re = glob_to_regex("tweets-200?.md").unwrap();
        assert!(re.is_match("tweets-2008.md"));
        assert!(!re.is_match("tweets-2010.md"));
    }
}
