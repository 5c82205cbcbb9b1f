use std::path::{Path, PathBuf};

use anyhow::Context;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

/// Keeps the OS watch alive; arrivals stop once this is dropped.
pub struct InboxWatcher {
    _watcher: RecommendedWatcher,
}

impl InboxWatcher {
    /// Watches `inbox` (non-recursively) and sends the path of every file that
    /// is created in, or renamed into, it. Files already present are not
    /// reported.
    pub fn start(inbox: &Path) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for path in arrivals(&event) {
                        if sender.send(path).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "watch error"),
            }
        })
        .context("failed to create inbox watcher")?;

        watcher
            .watch(inbox, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", inbox.display()))?;

        Ok((Self { _watcher: watcher }, receiver))
    }
}

fn arrivals(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::File) => event.paths.clone(),
        EventKind::Create(CreateKind::Any) | EventKind::Create(CreateKind::Other) => {
            existing_files(event.paths.iter())
        }
        // A rename inside the inbox is also reported as `Name(Both)` after this
        // `Name(To)`; only the `To` half counts.
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        // Backends that cannot tell the two halves of a rename apart.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            existing_files(event.paths.iter())
        }
        _ => Vec::new(),
    }
}

fn existing_files<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    paths.filter(|path| path.is_file()).cloned().collect()
}
