//! Snippet file watching for live re-rendering.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Extensions treated as component snippets.
pub const SNIPPET_EXTENSIONS: [&str; 4] = ["jsx", "tsx", "js", "ts"];

const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Snippet was created or modified
    Changed(PathBuf),

    /// Snippet was deleted
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Changed(path) | Self::Removed(path) => path,
        }
    }
}

pub fn is_snippet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SNIPPET_EXTENSIONS.contains(&ext))
}

/// Watches directories for snippet changes.
pub struct SnippetWatcher {
    _watcher: RecommendedWatcher,
}

impl SnippetWatcher {
    /// Start watching `paths` recursively.
    ///
    /// Returns the watcher, which must be kept alive, and the event channel.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            let mut last_sent: Option<(PathBuf, Instant)> = None;

            while let Ok(event) = sync_rx.recv() {
                for path in event.paths {
                    let Some(watch_event) = classify_event(&path, &event.kind) else {
                        continue;
                    };

                    // Editors often emit several writes per save.
                    let now = Instant::now();
                    if let Some((last_path, at)) = &last_sent {
                        if *last_path == path && now.duration_since(*at) < DEBOUNCE {
                            continue;
                        }
                    }
                    last_sent = Some((path, now));

                    if async_tx.blocking_send(watch_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

fn classify_event(path: &Path, kind: &EventKind) -> Option<WatchEvent> {
    if !is_snippet(path) {
        return None;
    }
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(WatchEvent::Changed(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Removed(path.to_path_buf())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn only_snippets_are_reported() {
        let create = EventKind::Create(CreateKind::File);
        assert_eq!(
            classify_event(Path::new("cards/Card.jsx"), &create),
            Some(WatchEvent::Changed(PathBuf::from("cards/Card.jsx")))
        );
        assert_eq!(classify_event(Path::new("README.md"), &create), None);
        assert_eq!(
            classify_event(Path::new("a.tsx"), &EventKind::Remove(RemoveKind::File)),
            Some(WatchEvent::Removed(PathBuf::from("a.tsx")))
        );
    }

    #[tokio::test]
    async fn watches_snippet_changes() {
        let temp = tempdir().unwrap();
        let snippet = temp.path().join("Button.jsx");

        let (watcher, mut rx) = SnippetWatcher::new(&[temp.path().to_path_buf()]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&snippet, "exports.default = () => <button/>;").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        let event = event.expect("timeout waiting for file watch event");
        assert!(event.is_some_and(|e| e.path().ends_with("Button.jsx")));
    }
}
