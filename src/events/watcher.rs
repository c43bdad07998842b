//! Filesystem watching for descriptor files.
//!
//! Changes are forwarded over a channel; the consumer decides how to
//! refresh the model and which events to publish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Events from the workspace watcher
#[derive(Debug)]
pub enum WatchEvent {
    DescriptorChanged(PathBuf),
    DescriptorRemoved(PathBuf),
    WatcherError(notify::Error),
}

/// Keeps the underlying watcher alive; dropping it stops watching
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
}

impl WorkspaceWatcher {
    /// Watch `root` recursively for files named `descriptor`
    pub fn start(
        root: &Path,
        descriptor: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let descriptor = descriptor.to_string();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for watch_event in classify(&event, &descriptor) {
                        let _ = tx.send(watch_event);
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::WatcherError(e));
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch workspace root: {}", root.display()))?;

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn classify(event: &notify::Event, descriptor: &str) -> Vec<WatchEvent> {
    let removal = match event.kind {
        EventKind::Create(_) => false,
        EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .filter(|p| is_descriptor(p, descriptor))
                .map(|p| {
                    if p.exists() {
                        WatchEvent::DescriptorChanged(p.clone())
                    } else {
                        WatchEvent::DescriptorRemoved(p.clone())
                    }
                })
                .collect();
        }
        EventKind::Modify(_) => false,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|p| is_descriptor(p, descriptor))
        .map(|p| {
            if removal {
                WatchEvent::DescriptorRemoved(p.clone())
            } else {
                WatchEvent::DescriptorChanged(p.clone())
            }
        })
        .collect()
}

fn is_descriptor(path: &Path, descriptor: &str) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some(descriptor)
}
