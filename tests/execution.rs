// tests/execution.rs

mod common;

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use synthesize::engine::Message;
use synthesize::errors::SynthError;
use synthesize::exec::Execution;

use crate::common::{node, node_with_triggers, once};

type TestResult = Result<(), Box<dyn Error>>;

fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Message> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn execution_lifecycle_in_order() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let n = node("foo", "echo 'hi'");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (execution, wait) = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        80,
        tx,
    )
    .await?;

    wait.wait().await;
    assert!(execution.has_exited());

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 3);

    match &messages[0] {
        Message::ExecutionStarted { id, pid } => {
            assert_eq!(id, "foo");
            assert_eq!(*pid, execution.pid());
        }
        other => panic!("expected ExecutionStarted, got {other:?}"),
    }

    match &messages[1] {
        Message::ExecutionOutput { id, text } => {
            assert_eq!(id, "foo");
            assert_eq!(text, "hi");
        }
        other => panic!("expected ExecutionOutput, got {other:?}"),
    }

    match &messages[2] {
        Message::ExecutionCompleted {
            id,
            pid,
            exit_code,
            duration,
        } => {
            assert_eq!(id, "foo");
            assert_eq!(*pid, execution.pid());
            assert_eq!(*exit_code, 0);
            assert!(*duration > Duration::ZERO);
        }
        other => panic!("expected ExecutionCompleted, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn terminate_before_completion_reports_sigterm() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let n = node("foo", "sleep 10 && echo 'hi'");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (execution, wait) = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        80,
        tx,
    )
    .await?;

    execution.terminate();
    wait.wait().await;

    assert!(execution.has_exited());

    let messages = drain(&mut rx);
    match messages.last() {
        Some(Message::ExecutionCompleted { exit_code, .. }) => {
            assert_eq!(*exit_code, -15);
        }
        other => panic!("expected ExecutionCompleted, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn kill_before_completion_reports_sigkill() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let n = node("foo", "sleep 10 && echo 'hi'");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (execution, wait) = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        80,
        tx,
    )
    .await?;

    execution.kill();
    wait.wait().await;

    let messages = drain(&mut rx);
    match messages.last() {
        Some(Message::ExecutionCompleted { exit_code, .. }) => {
            assert_eq!(*exit_code, -9);
        }
        other => panic!("expected ExecutionCompleted, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn signalling_after_exit_is_a_noop() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let n = node("foo", "echo 'hi'");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (execution, wait) = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        80,
        tx,
    )
    .await?;

    wait.wait().await;
    let before = drain(&mut rx).len();

    execution.terminate();
    execution.kill();

    assert_eq!(drain(&mut rx).len(), 0);
    assert_eq!(before, 3);

    Ok(())
}

#[tokio::test]
async fn environment_is_composed_with_node_over_target_over_flow() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let mut n = node("foo", "echo \"$A $B $C\"");
    n.target.envs.insert("A".into(), "2".into());
    n.target.envs.insert("B".into(), "2".into());
    n.envs.insert("A".into(), "1".into());

    let mut flow_envs = synthesize::config::Envs::new();
    flow_envs.insert("A".into(), "3".into());
    flow_envs.insert("B".into(), "3".into());
    flow_envs.insert("C".into(), "3".into());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_execution, wait) =
        Execution::start(&n, &Default::default(), &flow_envs, tmp.path(), 80, tx).await?;
    wait.wait().await;

    let outputs = drain(&mut rx)
        .into_iter()
        .filter_map(|m| match m {
            Message::ExecutionOutput { text, .. } => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(outputs, vec!["1 2 3"]);

    Ok(())
}

#[tokio::test]
async fn engine_environment_variables_are_set() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let n = node("foo", "echo \"$SYNTH_NODE_ID $FORCE_COLOR $COLUMNS\"");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_execution, wait) = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        111,
        tx,
    )
    .await?;
    wait.wait().await;

    let outputs = drain(&mut rx)
        .into_iter()
        .filter_map(|m| match m {
            Message::ExecutionOutput { text, .. } => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(outputs, vec!["foo 1 111"]);

    Ok(())
}

#[tokio::test]
async fn oversized_output_line_is_dropped_with_a_debug_event() -> TestResult {
    let tmp = tempfile::tempdir()?;
    // One 2 MiB line (no newline until `echo`), then a normal line.
    let n = node(
        "foo",
        "head -c 2097152 /dev/zero | tr '\\0' x\necho\necho done",
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_execution, wait) = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        80,
        tx,
    )
    .await?;
    wait.wait().await;

    let messages = drain(&mut rx);

    let debug_count = messages
        .iter()
        .filter(|m| matches!(m, Message::Debug { .. }))
        .count();
    assert_eq!(debug_count, 1);

    let outputs = messages
        .iter()
        .filter_map(|m| match m {
            Message::ExecutionOutput { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(outputs, vec!["done"]);

    Ok(())
}

#[tokio::test]
async fn missing_interpreter_fails_start() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut n = node_with_triggers("foo", "echo hi", vec![once()]);
    n.target.executable = "definitely-not-a-real-interpreter-xyz".to_string();

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = Execution::start(
        &n,
        &Default::default(),
        &Default::default(),
        tmp.path(),
        80,
        tx,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SynthError::ExecutableNotFound(_)));

    Ok(())
}
