//! RSS 2.0 feed generation, one feed per locale.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use rss::extension::dublincore::DublinCoreExtensionBuilder;
use rss::validation::Validate;
use rss::{Channel, ChannelBuilder, GuidBuilder, ImageBuilder, Item, ItemBuilder};
use tokio::fs;
use tracing::info;

use crate::config::{LocaleConfig, SiteConfig};
use crate::content_loader::load_posts;
use crate::error::{HookError, Result};
use crate::markdown::MarkdownRenderer;
use crate::models::Post;

const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";
const ZERO_WIDTH_SPACE_ENTITY: &str = "&ZeroWidthSpace;";
const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Writes the feed of every configured locale, in order. Stops at the first
/// failure.
pub async fn generate_feeds(config: &SiteConfig) -> Result<Vec<PathBuf>> {
    let renderer = MarkdownRenderer::for_site(&config.markdown);
    let mut written = Vec::with_capacity(config.locales.len());
    for locale in &config.locales {
        written.push(generate_locale_feed(config, locale, &renderer).await?);
    }
    Ok(written)
}

pub async fn generate_locale_feed(
    config: &SiteConfig,
    locale: &LocaleConfig,
    renderer: &MarkdownRenderer,
) -> Result<PathBuf> {
    let posts = load_posts(config, locale, renderer).await?;
    let xml = render_feed(config, locale, &posts, Utc::now().year())?;
    let path = locale.feed_path(&config.out_dir);
    write_feed(&path, &xml).await?;
    info!(locale = %locale.key, items = posts.len(), path = %path.display(), "Wrote feed");
    Ok(path)
}

/// Validated RSS document for `posts`, which are expected newest first.
pub fn render_feed(config: &SiteConfig, locale: &LocaleConfig, posts: &[Post], year: i32) -> Result<String> {
    let channel = build_channel(config, locale, posts, year);
    channel
        .validate()
        .map_err(|e| HookError::Feed(locale.key.clone(), e.to_string()))?;
    Ok(channel.to_string())
}

pub fn build_channel(config: &SiteConfig, locale: &LocaleConfig, posts: &[Post], year: i32) -> Channel {
    let base_url = config.base_url();
    let items: Vec<Item> = posts.iter().map(|post| post_to_item(post, base_url)).collect();

    let image = ImageBuilder::default()
        .url(config.favicon_url())
        .title(locale.title.clone())
        .link(base_url.to_string())
        .build();

    let namespaces = BTreeMap::from([("content".to_string(), CONTENT_NAMESPACE.to_string())]);

    ChannelBuilder::default()
        .title(locale.title.clone())
        .link(base_url.to_string())
        .description(locale.description.clone())
        .language(Some(locale.language.clone()))
        .copyright(Some(locale.copyright_for_year(year)))
        .generator(Some(env!("CARGO_PKG_NAME").to_string()))
        .image(Some(image))
        .last_build_date(posts.iter().map(|p| p.date).max().map(|d| d.to_rfc2822()))
        .namespaces(namespaces)
        .items(items)
        .build()
}

fn post_to_item(post: &Post, base_url: &str) -> Item {
    let link = format!("{}{}", base_url, post.url);
    let author = post.feed_author();

    let dublin_core = (!author.name.is_empty())
        .then(|| DublinCoreExtensionBuilder::default().creators(vec![author.name.clone()]).build());

    ItemBuilder::default()
        .title(Some(post.title.clone()))
        .link(Some(link.clone()))
        .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
        .description((!post.excerpt.is_empty()).then(|| post.excerpt.clone()))
        .content(Some(strip_zero_width(&post.html)))
        .author(author.link.map(|link| format!("{link} ({})", author.name)))
        .dublin_core_ext(dublin_core)
        .pub_date(Some(post.date.to_rfc2822()))
        .build()
}

pub fn strip_zero_width(html: &str) -> String {
    html.replace(ZERO_WIDTH_SPACE_ENTITY, "").replace(ZERO_WIDTH_SPACE, "")
}

async fn write_feed(path: &Path, xml: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| HookError::Io(parent.to_path_buf(), e))?;
    }
    fs::write(path, xml)
        .await
        .map_err(|e| HookError::Io(path.to_path_buf(), e))
}
