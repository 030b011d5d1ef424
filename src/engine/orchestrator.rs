// src/engine/orchestrator.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{ResolvedFlow, ResolvedNode};
use crate::engine::messages::{Message, NodeId};
use crate::errors::Result;
use crate::exec::{Execution, ExecutionWait};
use crate::flow::{FlowState, Status};
use crate::render::Renderer;
use crate::watch;

/// UI refresh tick.
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// The single-threaded event loop coordinating subprocess lifecycles,
/// trigger-driven re-runs, cancellation, and shutdown.
///
/// Owns the flow state and is the only writer to it. Executions, watchers,
/// restart timers, the heartbeat, and the signal handler all publish into one
/// inbox; dispatch is strictly sequential.
pub struct Orchestrator<R: Renderer> {
    flow: ResolvedFlow,
    state: FlowState,
    renderer: R,

    inbox_tx: UnboundedSender<Message>,
    inbox_rx: UnboundedReceiver<Message>,

    executions: HashMap<NodeId, Execution>,
    waiters: HashMap<NodeId, JoinHandle<()>>,
    watchers: HashMap<NodeId, JoinHandle<()>>,
    restarts: HashMap<NodeId, JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    signal_handler: Option<JoinHandle<()>>,
}

impl<R: Renderer> Orchestrator<R> {
    /// Build the flow state (failing on cyclic flows — no execution is ever
    /// spawned for one) and the inbox.
    pub fn new(flow: ResolvedFlow, renderer: R) -> Result<Self> {
        let state = FlowState::from_flow(&flow)?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Ok(Self {
            flow,
            state,
            renderer,
            inbox_tx,
            inbox_rx,
            executions: HashMap::new(),
            waiters: HashMap::new(),
            watchers: HashMap::new(),
            restarts: HashMap::new(),
            heartbeat: None,
            signal_handler: None,
        })
    }

    /// Handle for publishing into the inbox (used by the signal handler and
    /// by tests driving the loop externally).
    pub fn sender(&self) -> UnboundedSender<Message> {
        self.inbox_tx.clone()
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn state_summary(&self) -> String {
        self.renderer.state_summary(&self.state)
    }

    /// Run the flow to completion and return the process exit code.
    ///
    /// Cleanup (renderer stop, task cancellation, child termination, temp
    /// dir removal) happens on every exit path, including errors.
    pub async fn run(&mut self) -> Result<i32> {
        if self.flow.nodes.is_empty() {
            return Ok(0);
        }

        let tmp_dir = tempfile::Builder::new().prefix("synth-").tempdir()?;

        self.renderer.start();

        let result = self.drive(tmp_dir.path()).await;

        self.shutdown().await;
        self.renderer.stop();

        // Children have been awaited; now the script dir can go.
        drop(tmp_dir);

        result
    }

    async fn drive(&mut self, tmp_dir: &Path) -> Result<i32> {
        self.start_heartbeat();
        self.start_watchers()?;
        self.install_signal_handler();

        self.start_ready(tmp_dir).await?;

        self.event_loop(tmp_dir).await
    }

    /// Dequeue one event at a time, mutate the status table, then re-check
    /// the ready set and the termination predicate.
    async fn event_loop(&mut self, tmp_dir: &Path) -> Result<i32> {
        info!("flow started");

        loop {
            let Some(message) = self.inbox_rx.recv().await else {
                // Unreachable while we hold a sender, but don't spin.
                return Ok(1);
            };

            match &message {
                Message::ExecutionStarted { id, .. } => {
                    self.state.mark_running(id);
                }
                Message::ExecutionCompleted { id, exit_code, .. } => {
                    self.handle_completed(id, *exit_code);
                }
                Message::WatchPathChanged { id, .. } => {
                    if let Some(execution) = self.executions.get(id) {
                        execution.terminate();
                    }
                    self.state.mark_pending(id);
                }
                Message::RestartElapsed { id } => {
                    self.restarts.remove(id);
                    if self.state.status(id) == Status::Waiting {
                        self.state.mark_pending(id);
                    }
                }
                Message::Quit => {
                    info!("quit requested");
                    return Ok(0);
                }
                Message::ExecutionOutput { .. }
                | Message::Debug { .. }
                | Message::Heartbeat => {}
            }

            self.start_ready(tmp_dir).await?;

            self.renderer.handle_message(&message, &self.state);

            if self.state.no_more_work_possible() {
                return Ok(if self.state.all_succeeded() { 0 } else { 1 });
            }
        }
    }

    /// A child exited.
    ///
    /// A Pending status means the node was already invalidated (by a
    /// dependency re-run or a watch event) while the child was running: the
    /// completion changes no status, but pending-ness still propagates to the
    /// children so downstream graphs stay consistent with upstream re-runs.
    fn handle_completed(&mut self, id: &NodeId, exit_code: i32) {
        let status = self.state.status(id);

        if status != Status::Pending {
            match self.flow.nodes.get(id).and_then(ResolvedNode::restart_delay) {
                Some(delay) => {
                    if status != Status::Waiting {
                        self.state.mark_waiting(id);
                        self.schedule_restart(id, delay);
                    }
                }
                None => {
                    if exit_code == 0 {
                        self.state.mark_success(id);
                    } else {
                        self.state.mark_failure(id);
                    }
                }
            }
        }

        let children = self.state.children(id);
        self.state.mark(&children, Status::Pending);
    }

    fn schedule_restart(&mut self, id: &NodeId, delay: f64) {
        debug!(node = %id, delay, "scheduling restart");

        let tx = self.inbox_tx.clone();
        let node = id.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_secs_f64(delay)).await;
            let _ = tx.send(Message::RestartElapsed { id: node });
        });

        self.restarts.insert(id.clone(), handle);
    }

    /// Start an execution for every ready node that doesn't already have a
    /// live one (prevents double-start races with just-marked-Starting
    /// nodes).
    async fn start_ready(&mut self, tmp_dir: &Path) -> Result<()> {
        for id in self.state.ready_nodes() {
            if let Some(execution) = self.executions.get(&id) {
                if !execution.has_exited() {
                    continue;
                }
            }

            let Some(node) = self.flow.nodes.get(&id).cloned() else {
                continue;
            };

            self.state.mark_starting(&id);

            let width = self
                .renderer
                .console_width()
                .saturating_sub(self.renderer.prefix_width());

            let (execution, wait): (Execution, ExecutionWait) = Execution::start(
                &node,
                &self.flow.args,
                &self.flow.envs,
                tmp_dir,
                width,
                self.inbox_tx.clone(),
            )
            .await?;

            self.waiters.insert(id.clone(), tokio::spawn(wait.wait()));
            self.executions.insert(id, execution);
        }

        Ok(())
    }

    /// One watch task per node carrying a Watch trigger; setup failures
    /// surface here, before the event loop starts.
    fn start_watchers(&mut self) -> Result<()> {
        for node in self.flow.nodes.values() {
            let paths: Vec<PathBuf> = node
                .watches()
                .flat_map(|w| w.watch.iter().cloned())
                .collect();

            if paths.is_empty() {
                continue;
            }

            let handle = watch::spawn_watcher(node.id.clone(), paths, self.inbox_tx.clone())?;
            self.watchers.insert(node.id.clone(), handle);
        }

        Ok(())
    }

    fn start_heartbeat(&mut self) {
        let tx = self.inbox_tx.clone();
        self.heartbeat = Some(tokio::spawn(async move {
            loop {
                sleep(HEARTBEAT_INTERVAL).await;
                if tx.send(Message::Heartbeat).is_err() {
                    return;
                }
            }
        }));
    }

    /// SIGINT becomes a Quit event; the handler does nothing else, so the
    /// loop is never interrupted mid-transition.
    fn install_signal_handler(&mut self) {
        let tx = self.inbox_tx.clone();
        self.signal_handler = Some(tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                if tx.send(Message::Quit).is_err() {
                    return;
                }
            }
        }));
    }

    /// Tear everything down: cancel the periodic tasks and watchers, drop
    /// pending restart timers, terminate live children, and await every
    /// execution to completion. Never times out.
    async fn shutdown(&mut self) {
        self.renderer.handle_shutdown_start();

        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.signal_handler.take() {
            handle.abort();
        }

        let watchers: Vec<(NodeId, JoinHandle<()>)> = self.watchers.drain().collect();
        for (_, handle) in watchers.iter() {
            handle.abort();
        }
        for (_, handle) in watchers {
            let _ = handle.await;
        }

        for (_, handle) in self.restarts.drain() {
            handle.abort();
        }

        for execution in self.executions.values() {
            execution.terminate();
        }

        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.await;
        }

        self.renderer.handle_shutdown_end();

        info!("flow stopped");
    }
}
