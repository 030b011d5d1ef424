// src/exec/execution.rs

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{Args, Envs, ResolvedNode};
use crate::engine::messages::{Message, NodeId};
use crate::errors::Result;
use crate::exec::script;

/// Longest output line the reader will buffer before dropping it.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Signal handle for one run of a node's child process.
///
/// The orchestrator keeps this in its executions map; the paired
/// [`ExecutionWait`] owns the child and runs on its own task.
#[derive(Debug, Clone)]
pub struct Execution {
    id: NodeId,
    pid: u32,
    started_at: Instant,
    exited: Arc<AtomicBool>,
}

/// Owns the child process and its output reader; consumed by the wait task.
#[derive(Debug)]
pub struct ExecutionWait {
    id: NodeId,
    pid: u32,
    started_at: Instant,
    exited: Arc<AtomicBool>,
    child: Child,
    reader: JoinHandle<()>,
    events: UnboundedSender<Message>,
}

impl Execution {
    /// Materialize the node's script, spawn it in a new process group with
    /// the composed environment, start the output reader, and emit
    /// `ExecutionStarted` before returning.
    pub async fn start(
        node: &ResolvedNode,
        flow_args: &Args,
        flow_envs: &Envs,
        tmp_dir: &Path,
        width: usize,
        events: UnboundedSender<Message>,
    ) -> Result<(Execution, ExecutionWait)> {
        let path = script::materialize(node, flow_args, tmp_dir)?;

        let mut cmd = Command::new(&path);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&*flow_envs)
            .envs(&node.target.envs)
            .envs(&node.envs)
            .env("FORCE_COLOR", "1")
            .env("COLUMNS", width.to_string())
            .env("SYNTH_NODE_ID", &node.id);

        // Own process group so the whole subtree can be signalled.
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning script for node '{}'", node.id))?;

        let pid = child
            .id()
            .with_context(|| format!("child for node '{}' has no pid", node.id))?;

        // Started goes into the inbox before the reader task exists, so no
        // output event can ever precede it.
        let _ = events.send(Message::ExecutionStarted {
            id: node.id.clone(),
            pid,
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let reader = tokio::spawn(read_output(
            node.id.clone(),
            stdout,
            stderr,
            events.clone(),
        ));

        let started_at = Instant::now();
        let exited = Arc::new(AtomicBool::new(false));

        let execution = Execution {
            id: node.id.clone(),
            pid,
            started_at,
            exited: Arc::clone(&exited),
        };

        let wait = ExecutionWait {
            id: node.id.clone(),
            pid,
            started_at,
            exited,
            child,
            reader,
            events,
        };

        Ok((execution, wait))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// SIGTERM the child's process group. Idempotent; silent after exit.
    pub fn terminate(&self) {
        self.signal(Signal::SIGTERM);
    }

    /// SIGKILL the child's process group. Idempotent; silent after exit.
    pub fn kill(&self) {
        self.signal(Signal::SIGKILL);
    }

    fn signal(&self, signal: Signal) {
        if self.has_exited() {
            return;
        }

        // The group id equals the child pid because the child was spawned as
        // a group leader. ESRCH means the child exited between the status
        // check and the signal; that race is benign.
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(err) => {
                warn!(node = %self.id, pid = self.pid, %err, "failed to signal process group");
            }
        }
    }
}

impl ExecutionWait {
    /// Await child exit, drain the output reader, then emit
    /// `ExecutionCompleted`. Negative exit codes denote signal termination.
    pub async fn wait(mut self) {
        let status = self.child.wait().await;
        self.exited.store(true, Ordering::SeqCst);

        if let Err(err) = (&mut self.reader).await {
            debug!(node = %self.id, %err, "output reader task failed");
        }

        let exit_code = match status {
            Ok(status) => exit_code_of(status),
            Err(err) => {
                warn!(node = %self.id, %err, "failed to await child");
                -1
            }
        };

        let _ = self.events.send(Message::ExecutionCompleted {
            id: self.id,
            pid: self.pid,
            exit_code,
            duration: self.started_at.elapsed(),
        });
    }
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match status.code() {
        Some(code) => code,
        None => status.signal().map(|s| -s).unwrap_or(-1),
    }
}

/// Drain both child pipes into `ExecutionOutput` events, one event per
/// complete line with the trailing newline stripped.
async fn read_output(
    id: NodeId,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    events: UnboundedSender<Message>,
) {
    let out = async {
        if let Some(stream) = stdout {
            read_lines(&id, stream, &events).await;
        }
    };
    let err = async {
        if let Some(stream) = stderr {
            read_lines(&id, stream, &events).await;
        }
    };

    tokio::join!(out, err);
}

/// Line reader with a bounded buffer. A line longer than [`MAX_LINE_BYTES`]
/// is dropped: its buffered bytes are discarded, a Debug event names the
/// node, and reading resumes at the next newline.
async fn read_lines<R>(id: &NodeId, stream: R, events: &UnboundedSender<Message>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::new();
    let mut discarding = false;

    loop {
        let consumed;
        let mut completed_line = None;

        {
            let chunk = match reader.fill_buf().await {
                Ok(chunk) => chunk,
                Err(err) => {
                    debug!(node = %id, %err, "error reading child output");
                    return;
                }
            };

            if chunk.is_empty() {
                // EOF; flush a trailing unterminated line.
                if !discarding && !buf.is_empty() {
                    completed_line = Some(line_text(&buf));
                }
                if let Some(text) = completed_line {
                    let _ = events.send(Message::ExecutionOutput { id: id.clone(), text });
                }
                return;
            }

            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    if discarding {
                        discarding = false;
                    } else {
                        buf.extend_from_slice(&chunk[..newline]);
                        completed_line = Some(line_text(&buf));
                    }
                    buf.clear();
                    consumed = newline + 1;
                }
                None => {
                    if !discarding {
                        if buf.len() + chunk.len() > MAX_LINE_BYTES {
                            buf.clear();
                            discarding = true;
                            let _ = events.send(Message::Debug {
                                id: Some(id.clone()),
                                text: format!(
                                    "output line from '{id}' exceeded {MAX_LINE_BYTES} bytes; dropping it"
                                ),
                            });
                        } else {
                            buf.extend_from_slice(chunk);
                        }
                    }
                    consumed = chunk.len();
                }
            }
        }

        reader.consume(consumed);

        if let Some(text) = completed_line {
            let _ = events.send(Message::ExecutionOutput { id: id.clone(), text });
        }
    }
}

fn line_text(bytes: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    while text.ends_with('\r') || text.ends_with('\n') {
        text.pop();
    }
    text
}
