use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Front matter keys read from a post. Missing keys stay `None` and degrade
/// to empty strings further down.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    /// Handle on x.com, without the `@`.
    pub x: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAuthor {
    pub name: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Post {
    /// Site-relative URL, e.g. `/en/posts/hello`.
    pub url: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub author: String,
    pub x: Option<String>,
    pub html: String,
    pub excerpt: String,
}

impl Post {
    pub fn feed_author(&self) -> FeedAuthor {
        FeedAuthor {
            name: self.author.clone(),
            link: self
                .x
                .as_deref()
                .filter(|handle| !handle.is_empty())
                .map(|handle| format!("https://x.com/{}", handle.trim_start_matches('@'))),
        }
    }
}
