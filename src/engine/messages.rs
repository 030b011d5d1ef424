// src/engine/messages.rs

use std::path::PathBuf;
use std::time::Duration;

/// Node identifier within a flow.
pub type NodeId = String;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One filesystem change observed by a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Events sent into the orchestrator's inbox.
///
/// Executions publish the three lifecycle events in order (Started, then any
/// Output, then Completed); watchers publish `WatchPathChanged`; restart
/// timers publish `RestartElapsed`; the heartbeat and the SIGINT handler
/// publish `Heartbeat` and `Quit`.
#[derive(Debug, Clone)]
pub enum Message {
    ExecutionStarted {
        id: NodeId,
        pid: u32,
    },
    ExecutionOutput {
        id: NodeId,
        text: String,
    },
    ExecutionCompleted {
        id: NodeId,
        pid: u32,
        /// OS exit code; negative values denote termination by signal.
        exit_code: i32,
        duration: Duration,
    },
    WatchPathChanged {
        id: NodeId,
        changes: Vec<PathChange>,
    },
    /// A Restart-trigger delay has elapsed for this node.
    RestartElapsed {
        id: NodeId,
    },
    Debug {
        id: Option<NodeId>,
        text: String,
    },
    Heartbeat,
    Quit,
}
