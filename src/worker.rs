//! Worker transport: a typed message link between a controlling process and
//! a sandboxed child doing the long-running I/O
//!
//! The child's stdin carries one command message; its stdout carries tagged
//! progress/terminal messages as JSON lines. Lines that do not parse as
//! messages are diagnostics and are relayed to the log.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::error::{DisplayableError, LauncherError, Result};
use crate::repair::{FullRepairReceiver, FULL_REPAIR_RECEIVER_ID};

/// Parent-to-child command: which receiver runs, and with what
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    /// Registered receiver id
    pub receiver_id: String,
    /// Receiver-specific arguments
    pub args: Value,
}

/// Child-to-parent messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Byte or counter progress within a stage
    #[serde(rename_all = "camelCase")]
    Progress {
        /// Which stage is reporting
        stage_label: String,
        /// Units received so far
        received: u64,
        /// Expected total units
        total: u64,
    },
    /// A validation stage finished
    #[serde(rename_all = "camelCase")]
    StageComplete {
        /// 1-based stage number
        stage: usize,
        /// How many stages there are
        total_stages: usize,
    },
    /// Terminal success
    Complete {
        /// Receiver-specific result payload
        payload: Value,
    },
    /// Terminal failure
    Error {
        /// User-presentable rendition, when the receiver recognized the error
        displayable: Option<DisplayableError>,
    },
}

/// Outbound message channel handed to an executing receiver
#[derive(Debug, Clone)]
pub struct MessageSink {
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl MessageSink {
    /// Create a sink over a channel sender
    pub fn new(tx: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self { tx }
    }

    /// Send any message; delivery failures mean the parent is gone and are
    /// not interesting to the sender
    pub fn send(&self, message: WorkerMessage) {
        let _ = self.tx.send(message);
    }

    /// Send a progress message
    pub fn progress<S: Into<String>>(&self, stage_label: S, received: u64, total: u64) {
        self.send(WorkerMessage::Progress {
            stage_label: stage_label.into(),
            received,
            total,
        });
    }

    /// Send a stage-complete message
    pub fn stage_complete(&self, stage: usize, total_stages: usize) {
        self.send(WorkerMessage::StageComplete {
            stage,
            total_stages,
        });
    }
}

/// A long-running operation the worker can host
#[async_trait]
pub trait Receiver: Send + Sync {
    /// Registry id, the worker executable's first argument
    fn id(&self) -> &'static str;

    /// Run the operation, reporting through `sink`; the returned payload is
    /// sent as the terminal `Complete` message
    async fn execute(&self, args: Value, sink: &MessageSink) -> Result<Value>;

    /// Turn a recognized error into something a user can read
    fn display_error(&self, error: &LauncherError) -> Option<DisplayableError>;
}

/// Look a receiver up by its registry id
pub fn create_receiver(id: &str) -> Option<Box<dyn Receiver>> {
    match id {
        FULL_REPAIR_RECEIVER_ID => Some(Box::new(FullRepairReceiver)),
        _ => None,
    }
}

/// Parent-side handle to a spawned worker child
#[derive(Debug)]
pub struct Transmitter {
    child: Child,
    stdin: ChildStdin,
    receiver_id: String,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl Transmitter {
    /// Spawn the worker executable for the given receiver and wire up the
    /// message link.
    pub async fn spawn(worker_exe: &Path, receiver_id: &str) -> Result<Self> {
        let mut child = Command::new(worker_exe)
            .arg(receiver_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LauncherError::worker("worker stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LauncherError::worker("worker stdout unavailable"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<WorkerMessage>(&line) {
                    Ok(message) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    // Diagnostics (the failure breadcrumb) share the pipe
                    Err(_) => log::info!("worker: {line}"),
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            receiver_id: receiver_id.to_string(),
            rx,
        })
    }

    /// Send the command message that starts the receiver
    pub async fn send_command(&mut self, args: Value) -> Result<()> {
        let command = CommandMessage {
            receiver_id: self.receiver_id.clone(),
            args,
        };
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Receive the next message; `None` once the child is gone
    pub async fn next_message(&mut self) -> Option<WorkerMessage> {
        self.rx.recv().await
    }

    /// Close the link and wait for the child to exit.
    ///
    /// Closing stdin is the disconnect signal; a healthy child exits 0.
    pub async fn shutdown(mut self) -> Result<i32> {
        drop(self.stdin);
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Tear the child down without waiting for it to finish
    pub async fn kill(mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}

/// Child-side entry point; returns the process exit code.
///
/// Reads the command from stdin, dispatches to the named receiver, forwards
/// its messages to stdout and reports the terminal outcome. Stdin closing
/// before a command arrives is a clean parent disconnect.
pub async fn run_worker(receiver_id: &str) -> i32 {
    let Some(receiver) = create_receiver(receiver_id) else {
        println!("no receiver registered under {receiver_id}");
        emit(&WorkerMessage::Error { displayable: None });
        return 1;
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let command = loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<CommandMessage>(&line) {
                Ok(command) => break command,
                Err(e) => {
                    println!("unintelligible command: {e}");
                    emit(&WorkerMessage::Error { displayable: None });
                    return 1;
                }
            },
            // Parent disconnected before sending work
            Ok(None) => return 0,
            Err(_) => return 0,
        }
    };

    // Parent disconnect ends the worker cleanly, even mid-operation
    tokio::spawn(async move {
        let mut lines = lines;
        while let Ok(Some(_)) = lines.next_line().await {}
        std::process::exit(0);
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            emit(&message);
        }
    });

    let sink = MessageSink::new(tx);
    let result = receiver.execute(command.args, &sink).await;
    let code = match result {
        Ok(payload) => {
            sink.send(WorkerMessage::Complete { payload });
            0
        }
        Err(e) => {
            let displayable = receiver.display_error(&e);
            // Breadcrumb for the parent log before the terminal message
            println!("{e}");
            sink.send(WorkerMessage::Error { displayable });
            1
        }
    };

    drop(sink);
    let _ = forwarder.await;
    code
}

fn emit(message: &WorkerMessage) {
    if let Ok(line) = serde_json::to_string(message) {
        println!("{line}");
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn message_grammar_is_stable() {
        let progress = WorkerMessage::Progress {
            stage_label: "download".into(),
            received: 400,
            total: 1000,
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            serde_json::json!({
                "kind": "progress",
                "stageLabel": "download",
                "received": 400,
                "total": 1000
            })
        );

        let stage = WorkerMessage::StageComplete {
            stage: 1,
            total_stages: 2,
        };
        assert_eq!(
            serde_json::to_value(&stage).unwrap(),
            serde_json::json!({
                "kind": "stageComplete",
                "stage": 1,
                "totalStages": 2
            })
        );

        let error = WorkerMessage::Error {
            displayable: Some(DisplayableError::new("Download Failed", "Try again.")),
        };
        let round_tripped: WorkerMessage =
            serde_json::from_str(&serde_json::to_string(&error).unwrap()).unwrap();
        assert_eq!(round_tripped, error);
    }

    #[test]
    fn command_message_round_trips() {
        let command = CommandMessage {
            receiver_id: FULL_REPAIR_RECEIVER_ID.into(),
            args: serde_json::json!({ "serverId": "main-1.12.2" }),
        };
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("receiverId"));
        let parsed: CommandMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.receiver_id, command.receiver_id);
        assert_eq!(parsed.args, command.args);
    }

    #[test]
    fn registry_knows_the_full_repair_receiver() {
        assert!(create_receiver(FULL_REPAIR_RECEIVER_ID).is_some());
        assert!(create_receiver("no-such-receiver").is_none());
    }

    #[tokio::test]
    async fn sink_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = MessageSink::new(tx);
        sink.stage_complete(1, 3);
        sink.progress("download", 10, 100);
        sink.progress("download", 100, 100);
        drop(sink);

        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], WorkerMessage::StageComplete { stage: 1, .. }));
        assert!(
            matches!(messages[2], WorkerMessage::Progress { received: 100, total: 100, .. })
        );
    }
}
