use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{HookError, Result};

pub const FEED_FILE_NAME: &str = "feed.rss";
const YEAR_PLACEHOLDER: &str = "{year}";

/// Settings read from `site.toml`. Every key is optional; the defaults
/// describe the notes site itself.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// File names never treated as posts.
    pub exclude: Vec<String>,
    pub markdown: MarkdownConfig,
    pub locales: Vec<LocaleConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MarkdownConfig {
    pub line_numbers: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LocaleConfig {
    /// Locale index as seen by the markdown renderer (`root`, `en`, ...).
    pub key: String,
    pub content_dir: String,
    pub url_prefix: String,
    pub output_subdir: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub copyright: String,
    pub excerpt: ExcerptMode,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExcerptMode {
    /// Everything before the first occurrence of `marker`.
    Marker { marker: String },
    /// Everything before the first `---` line, else the first paragraph.
    #[default]
    #[serde(rename = "default", alias = "auto")]
    Auto,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blog.wangqiyang.com".to_string(),
            src_dir: PathBuf::from("content"),
            out_dir: PathBuf::from(".vitepress/dist"),
            exclude: vec!["README.md".to_string(), "TODO.md".to_string()],
            markdown: MarkdownConfig::default(),
            locales: vec![LocaleConfig::english(), LocaleConfig::chinese()],
        }
    }
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { line_numbers: true }
    }
}

impl LocaleConfig {
    fn chinese() -> Self {
        Self {
            key: "root".to_string(),
            content_dir: "zh".to_string(),
            url_prefix: String::new(),
            output_subdir: String::new(),
            title: "编程手札".to_string(),
            description: "记录开发日常".to_string(),
            language: "zh".to_string(),
            copyright: "版权所有 © 2025 王启阳。".to_string(),
            excerpt: ExcerptMode::Marker {
                marker: "<!-- end -->".to_string(),
            },
        }
    }

    fn english() -> Self {
        Self {
            key: "en".to_string(),
            content_dir: "en".to_string(),
            url_prefix: "/en".to_string(),
            output_subdir: "en".to_string(),
            title: "Coding Notes".to_string(),
            description: "Some articles".to_string(),
            language: "en".to_string(),
            copyright: "Copyright © 2025 Wang Qiyang.".to_string(),
            excerpt: ExcerptMode::Auto,
        }
    }

    /// Glob selecting this locale's posts, relative to the source root.
    pub fn posts_pattern(&self) -> String {
        if self.content_dir.is_empty() {
            "posts/*.md".to_string()
        } else {
            format!("{}/posts/*.md", self.content_dir.trim_end_matches('/'))
        }
    }

    pub fn feed_path(&self, out_dir: &Path) -> PathBuf {
        if self.output_subdir.is_empty() {
            out_dir.join(FEED_FILE_NAME)
        } else {
            out_dir.join(&self.output_subdir).join(FEED_FILE_NAME)
        }
    }

    pub fn copyright_for_year(&self, year: i32) -> String {
        self.copyright.replace(YEAR_PLACEHOLDER, &year.to_string())
    }
}

impl SiteConfig {
    pub fn parse(raw: &str, path: &Path) -> Result<Self> {
        toml::from_str(raw).map_err(|e| HookError::Config(path.to_path_buf(), e))
    }

    /// Loads `path`, falling back to the built-in defaults when the file
    /// does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(raw) => {
                info!(path = %path.display(), "Loaded site config");
                Self::parse(&raw, path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Site config not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(HookError::Io(path.to_path_buf(), e)),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn favicon_url(&self) -> String {
        format!("{}/favicon.ico", self.base_url())
    }
}
