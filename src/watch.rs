use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer, DebouncedEvent,
    notify::{Error as NotifyError, RecursiveMode, Watcher},
};
use tracing::{debug, error, info};

use crate::config::SiteConfig;
use crate::error::Result;
use crate::feed::generate_feeds;

const DEBOUNCE: Duration = Duration::from_millis(200);

/// Regenerates every feed whenever something under the source tree changes.
/// Runs until the watcher goes away; failed regenerations are logged only.
pub async fn watch_and_regenerate(config: &SiteConfig) -> Result<()> {
    info!(dir = %config.src_dir.display(), "Watching content for changes...");
    let (watcher_tx, mut watcher_rx) = tokio::sync::mpsc::channel(1);
    let out_dir = std::fs::canonicalize(&config.out_dir).unwrap_or_else(|_| config.out_dir.clone());

    let mut debouncer = new_debouncer(DEBOUNCE, None, move |res: std::result::Result<Vec<DebouncedEvent>, Vec<NotifyError>>| {
        match res {
            Ok(events) => {
                let changed: Vec<&PathBuf> = events
                    .iter()
                    .filter(|event| event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
                    .flat_map(|event| &event.event.paths)
                    .filter(|path| is_content_change(path, &out_dir))
                    .collect();

                if !changed.is_empty() {
                    debug!("Relevant file change detected: {:?}", changed.iter().map(|p| p.display()).collect::<Vec<_>>());
                    // A full channel means a regeneration is already queued.
                    let _ = watcher_tx.try_send(());
                }
            }
            Err(errors) => {
                for e in errors {
                    error!("Watcher error: {}", e);
                }
            }
        }
    })?;

    debouncer
        .watcher()
        .watch(&config.src_dir, RecursiveMode::Recursive)?;

    while watcher_rx.recv().await.is_some() {
        info!("Content change detected, regenerating feeds...");
        match generate_feeds(config).await {
            Ok(paths) => info!(feeds = paths.len(), "Feeds regenerated"),
            Err(e) => error!("Failed to regenerate feeds: {}", e),
        }
    }
    Ok(())
}

/// Ignores editor scratch files (Emacs `.#*`, `*~`) and anything written to
/// the output directory.
fn is_content_change(path: &Path, out_dir: &Path) -> bool {
    let is_temp_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |s| s.starts_with(".#") || s.ends_with('~'));

    !is_temp_file && !path.starts_with(out_dir)
}
