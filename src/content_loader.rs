use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gray_matter::{engine::YAML, Matter};
use regex::Regex;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{ExcerptMode, LocaleConfig, SiteConfig};
use crate::error::{HookError, Result};
use crate::fence::RenderEnv;
use crate::markdown::{markdown_to_plain_text, MarkdownRenderer};
use crate::models::{FrontMatter, Post};

const EXCERPT_SEPARATOR: &str = "---";

/// A `dir/name-glob` pattern. Wildcards (`*`, `?`) are only understood in
/// the file name, so matching never recurses.
#[derive(Debug, Clone)]
pub struct PostsPattern {
    dir: PathBuf,
    file_name: Regex,
    match_hidden: bool,
}

impl PostsPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let (dir, name) = pattern.rsplit_once('/').unwrap_or(("", pattern));
        if dir.contains(['*', '?']) {
            return Err(HookError::Pattern(
                pattern.to_string(),
                "wildcards are only supported in the file name".to_string(),
            ));
        }

        let mut expr = String::from("^");
        for ch in name.chars() {
            match ch {
                '*' => expr.push_str("[^/]*"),
                '?' => expr.push_str("[^/]"),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        let file_name = Regex::new(&expr)
            .map_err(|e| HookError::Pattern(pattern.to_string(), e.to_string()))?;

        Ok(Self {
            dir: PathBuf::from(dir),
            file_name,
            match_hidden: name.starts_with('.'),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn matches(&self, file_name: &str) -> bool {
        (self.match_hidden || !file_name.starts_with('.')) && self.file_name.is_match(file_name)
    }
}

/// Loads every post of `locale`, newest first. Posts without a usable date
/// are skipped; front matter that fails to parse aborts the load.
pub async fn load_posts(
    config: &SiteConfig,
    locale: &LocaleConfig,
    renderer: &MarkdownRenderer,
) -> Result<Vec<Post>> {
    let pattern = PostsPattern::parse(&locale.posts_pattern())?;
    let posts_dir = config.src_dir.join(pattern.dir());

    let mut files = Vec::new();
    let mut entries = match fs::read_dir(&posts_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %posts_dir.display(), "Posts directory not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(HookError::Io(posts_dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HookError::Io(posts_dir.clone(), e))?
    {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !pattern.matches(name) || config.exclude.iter().any(|ex| ex == name) {
            continue;
        }
        if entry.file_type().await.map_or(false, |t| t.is_file()) {
            files.push(path);
        }
    }
    // read_dir order is platform dependent
    files.sort();

    let env = RenderEnv::new(locale.key.clone());
    let mut posts = Vec::with_capacity(files.len());
    for path in files {
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| HookError::Io(path.clone(), e))?;
        match parse_post(&path, &raw, locale, renderer, &env)? {
            Some(post) => {
                debug!(url = %post.url, "Loaded post");
                posts.push(post);
            }
            None => warn!(path = %path.display(), "Skipping post without a valid date"),
        }
    }

    sort_newest_first(&mut posts);
    info!(locale = %locale.key, count = posts.len(), "Loaded posts");
    Ok(posts)
}

pub fn parse_post(
    path: &Path,
    raw: &str,
    locale: &LocaleConfig,
    renderer: &MarkdownRenderer,
    env: &RenderEnv,
) -> Result<Option<Post>> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(raw)
        .map_err(|e| HookError::FrontMatter(path.to_path_buf(), e.to_string()))?;
    let front_matter = parsed.data.unwrap_or_default();

    let Some(date) = front_matter.date.as_deref().and_then(parse_date) else {
        return Ok(None);
    };

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(Post {
        url: post_url(&locale.url_prefix, &stem),
        title: front_matter.title.unwrap_or_default(),
        date,
        author: front_matter.author.unwrap_or_default(),
        x: front_matter.x,
        html: renderer.render(&parsed.content, env),
        excerpt: markdown_to_plain_text(excerpt_source(&parsed.content, &locale.excerpt)),
    }))
}

/// Clean URL of a post: no `.md` suffix, `index` maps to the directory.
pub fn post_url(url_prefix: &str, stem: &str) -> String {
    let prefix = url_prefix.trim_end_matches('/');
    if stem == "index" {
        format!("{prefix}/posts/")
    } else {
        format!("{prefix}/posts/{stem}")
    }
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Markdown the excerpt is taken from.
pub fn excerpt_source<'a>(body: &'a str, mode: &ExcerptMode) -> &'a str {
    match mode {
        ExcerptMode::Marker { marker } => body.find(marker.as_str()).map_or("", |at| &body[..at]),
        ExcerptMode::Auto => {
            let mut offset = 0;
            for line in body.split_inclusive('\n') {
                if line.trim() == EXCERPT_SEPARATOR && !body[..offset].trim().is_empty() {
                    return &body[..offset];
                }
                offset += line.len();
            }
            first_paragraph(body)
        }
    }
}

fn first_paragraph(body: &str) -> &str {
    let mut start = None;
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        match start {
            None if !trimmed.is_empty() && !trimmed.starts_with('#') => start = Some(offset),
            Some(at) if trimmed.is_empty() => return &body[at..offset],
            _ => {}
        }
        offset += line.len();
    }
    start.map_or("", |at| &body[at..])
}

/// Stable, so posts sharing a date keep their load order.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkdownConfig;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::for_site(&MarkdownConfig::default())
    }

    fn english() -> LocaleConfig {
        SiteConfig::default().locales[0].clone()
    }

    fn chinese() -> LocaleConfig {
        SiteConfig::default().locales[1].clone()
    }

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn pattern_matches_only_file_names() {
        let pattern = PostsPattern::parse("en/posts/*.md").unwrap();
        assert_eq!(pattern.dir(), Path::new("en/posts"));
        assert!(pattern.matches("hello.md"));
        assert!(!pattern.matches("hello.mdx"));
        assert!(!pattern.matches(".draft.md"));
        assert!(PostsPattern::parse("en/*/x.md").is_err());
    }

    #[test]
    fn parses_supported_date_forms() {
        let day = parse_date("2025-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        let offset = parse_date("2025-03-01T08:00:00+08:00").unwrap();
        assert_eq!(offset.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        assert!(parse_date("2025-03-01 10:30").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn urls_follow_clean_url_rules() {
        assert_eq!(post_url("", "hello"), "/posts/hello");
        assert_eq!(post_url("/en", "hello"), "/en/posts/hello");
        assert_eq!(post_url("/en/", "index"), "/en/posts/");
    }

    #[test]
    fn marker_excerpt_stops_at_marker() {
        let mode = ExcerptMode::Marker {
            marker: "<!-- end -->".to_string(),
        };
        assert_eq!(excerpt_source("intro\n<!-- end -->\nrest", &mode), "intro\n");
        assert_eq!(excerpt_source("no marker here", &mode), "");
    }

    #[test]
    fn auto_excerpt_prefers_separator_then_first_paragraph() {
        assert_eq!(excerpt_source("lead\n---\nrest\n", &ExcerptMode::Auto), "lead\n");
        assert_eq!(
            excerpt_source("# Heading\n\nfirst para\nline two\n\nsecond\n", &ExcerptMode::Auto),
            "first para\nline two\n"
        );
        assert_eq!(excerpt_source("", &ExcerptMode::Auto), "");
    }

    #[test]
    fn missing_fields_degrade_to_empty_strings() {
        let raw = "---\ndate: 2025-01-02\n---\nbody\n";
        let post = parse_post(Path::new("en/posts/bare.md"), raw, &english(), &renderer(), &RenderEnv::new("en"))
            .unwrap()
            .unwrap();
        assert_eq!(post.title, "");
        assert_eq!(post.author, "");
        assert_eq!(post.feed_author().link, None);
        assert_eq!(post.url, "/en/posts/bare");
    }

    #[test]
    fn undated_post_is_skipped() {
        let raw = "---\ntitle: Draft\n---\nbody\n";
        let post = parse_post(Path::new("draft.md"), raw, &english(), &renderer(), &RenderEnv::default()).unwrap();
        assert!(post.is_none());
    }

    #[test]
    fn social_handle_becomes_author_link() {
        let raw = "---\ntitle: T\ndate: 2025-01-02\nauthor: Wang\nx: wangqiyangx\n---\nbody\n";
        let post = parse_post(Path::new("t.md"), raw, &chinese(), &renderer(), &RenderEnv::default())
            .unwrap()
            .unwrap();
        let author = post.feed_author();
        assert_eq!(author.name, "Wang");
        assert_eq!(author.link.as_deref(), Some("https://x.com/wangqiyangx"));
    }

    #[tokio::test]
    async fn loads_sorted_posts_and_honours_exclusions() {
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "en/posts/old.md", "---\ntitle: Old\ndate: 2024-01-01\n---\nold\n");
        write(src.path(), "en/posts/new.md", "---\ntitle: New\ndate: 2025-06-01\n---\nnew\n");
        write(src.path(), "en/posts/README.md", "---\ntitle: Readme\ndate: 2030-01-01\n---\n");
        write(src.path(), "en/posts/notes.txt", "not a post");
        write(src.path(), "en/posts/nested/deep.md", "---\ntitle: Deep\ndate: 2026-01-01\n---\n");

        let config = SiteConfig {
            src_dir: src.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let posts = load_posts(&config, &english(), &renderer()).await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn equal_dates_keep_file_name_order() {
        let src = tempfile::tempdir().unwrap();
        for name in ["b", "a", "c"] {
            write(
                src.path(),
                &format!("zh/posts/{name}.md"),
                &format!("---\ntitle: {name}\ndate: 2025-01-01\n---\n"),
            );
        }
        let config = SiteConfig {
            src_dir: src.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let posts = load_posts(&config, &chinese(), &renderer()).await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn malformed_front_matter_aborts_the_load() {
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "en/posts/bad.md", "---\ntitle:\n  nested: 1\ndate: 2025-01-01\n---\n");
        let config = SiteConfig {
            src_dir: src.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let err = load_posts(&config, &english(), &renderer()).await.unwrap_err();
        assert!(matches!(err, HookError::FrontMatter(..)));
    }

    #[tokio::test]
    async fn loads_bundled_sample_content() {
        let config = SiteConfig {
            src_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("content"),
            ..SiteConfig::default()
        };

        let en = load_posts(&config, &english(), &renderer()).await.unwrap();
        let urls: Vec<_> = en.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/en/posts/swiftui-button-styles", "/en/posts/swiftui-sensory-feedback"]);
        assert_eq!(
            en[0].excerpt,
            "A walk through ButtonStyle and PrimitiveButtonStyle, and when to reach for each."
        );
        assert!(en[0].html.contains(r#"<button title="Copy code" class="copy"></button>"#));

        // README.md sits next to the posts but is excluded
        let zh = load_posts(&config, &chinese(), &renderer()).await.unwrap();
        assert_eq!(zh.len(), 1);
        assert_eq!(zh[0].url, "/posts/swiftui-button-styles");
        assert_eq!(zh[0].excerpt, "介绍 ButtonStyle 与 PrimitiveButtonStyle 的区别以及各自的适用场景。");
        assert!(zh[0].html.contains("[!code highlight]"));
    }

    #[tokio::test]
    async fn missing_posts_dir_yields_no_posts() {
        let src = tempfile::tempdir().unwrap();
        let config = SiteConfig {
            src_dir: src.path().to_path_buf(),
            ..SiteConfig::default()
        };
        assert!(load_posts(&config, &english(), &renderer()).await.unwrap().is_empty());
    }
}
