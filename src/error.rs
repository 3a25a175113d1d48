use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("I/O error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse site config `{}`", .0.display())]
    Config(PathBuf, #[source] toml::de::Error),

    #[error("malformed front matter in `{}`: {}", .0.display(), .1)]
    FrontMatter(PathBuf, String),

    #[error("invalid posts pattern `{0}`: {1}")]
    Pattern(String, String),

    #[error("RSS validation failed for locale `{0}`: {1}")]
    Feed(String, String),

    #[error("content watcher failed")]
    Watch(#[from] notify_debouncer_full::notify::Error),
}

pub type Result<T> = std::result::Result<T, HookError>;
