// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::Context;
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::messages::{ChangeKind, Message, NodeId, PathChange};
use crate::errors::Result;

/// Spawn the watch task for one node.
///
/// The `notify` watcher is constructed synchronously so that setup failures
/// (unwatchable paths) surface before the event loop starts; the returned
/// task owns the watcher and forwards change batches into the orchestrator
/// inbox until it is cancelled.
pub fn spawn_watcher(
    id: NodeId,
    paths: Vec<PathBuf>,
    events: UnboundedSender<Message>,
) -> Result<JoinHandle<()>> {
    // Channel from the synchronous notify callback into the async task.
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| match result {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(err) => {
                eprintln!("synth: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;

    for path in paths.iter() {
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(path, mode)
            .with_context(|| format!("watching {} for node '{id}'", path.display()))?;
    }

    info!(node = %id, ?paths, "file watcher started");

    Ok(tokio::spawn(forward_changes(id, watcher, raw_rx, events)))
}

/// Consume raw notify events, coalesce bursts into batches, and push
/// `WatchPathChanged` into the inbox. Holds the watcher alive; dropping it
/// (on cancellation or channel close) stops watching.
async fn forward_changes(
    id: NodeId,
    _watcher: RecommendedWatcher,
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    events: UnboundedSender<Message>,
) {
    while let Some(event) = raw_rx.recv().await {
        let mut changes = Vec::new();
        collect_changes(&event, &mut changes);

        // Fold in whatever else already arrived; editors tend to produce
        // several events per save.
        while let Ok(event) = raw_rx.try_recv() {
            collect_changes(&event, &mut changes);
        }

        if changes.is_empty() {
            continue;
        }

        debug!(node = %id, count = changes.len(), "watched paths changed");

        if events
            .send(Message::WatchPathChanged {
                id: id.clone(),
                changes,
            })
            .is_err()
        {
            // Orchestrator gone; nothing left to notify.
            return;
        }
    }

    debug!(node = %id, "watcher loop ended");
}

fn collect_changes(event: &Event, changes: &mut Vec<PathChange>) {
    let Some(kind) = change_kind(&event.kind) else {
        return;
    };

    for path in event.paths.iter() {
        let change = PathChange {
            kind,
            path: path.clone(),
        };
        if !changes.contains(&change) {
            changes.push(change);
        }
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Added),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Any | EventKind::Other => Some(ChangeKind::Modified),
        EventKind::Access(_) => None,
    }
}
