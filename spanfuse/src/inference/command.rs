//! Tagger reached through a child process.
//!
//! The process is started once with the checkpoint path and then answers one
//! request per line:
//!
//! ```text
//! -> {"text": "...", "labels": ["drug", ...], "threshold": 0.01}
//! <- [{"start": 0, "end": 7, "text": "Aspirin", "label": "drug", "score": 0.93}]
//! ```
//!
//! A response of the form `{"error": "..."}` is reported as an inference error.

use super::{SpanTagger, TaggedSpan};
use crate::config::InferenceConfig;
use crate::{Result, SpanfuseError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

#[derive(Serialize)]
struct TagRequest<'a> {
    text: &'a str,
    labels: &'a [String],
    threshold: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagResponse {
    Spans(Vec<TaggedSpan>),
    Failed { error: String },
}

#[derive(Debug)]
struct TaggerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A [`SpanTagger`] backed by an external process.
#[derive(Debug)]
pub struct CommandTagger {
    checkpoint: PathBuf,
    labels: Vec<String>,
    min_score: f64,
    process: Mutex<TaggerProcess>,
}

impl CommandTagger {
    /// Start the tagger for `checkpoint`.
    pub async fn spawn(config: &InferenceConfig, checkpoint: impl AsRef<Path>) -> Result<Self> {
        let checkpoint = checkpoint.as_ref().to_path_buf();
        if !checkpoint.exists() {
            return Err(SpanfuseError::Configuration(format!(
                "checkpoint not found: {}",
                checkpoint.display()
            )));
        }

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .arg(&config.checkpoint_flag)
            .arg(&checkpoint)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SpanfuseError::Configuration(format!(
                    "failed to start tagger '{}': {}",
                    config.program, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpanfuseError::Inference("tagger stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpanfuseError::Inference("tagger stdout unavailable".to_string()))?;

        tracing::info!(
            program = %config.program,
            checkpoint = %checkpoint.display(),
            pid = ?child.id(),
            "started tagger"
        );

        Ok(Self {
            checkpoint,
            labels: config.labels.clone(),
            min_score: config.min_score,
            process: Mutex::new(TaggerProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
        })
    }

    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    /// Close the tagger's input and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        let TaggerProcess {
            mut child, stdin, ..
        } = self.process.into_inner();
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|e| SpanfuseError::Inference(format!("failed to wait for tagger: {e}")))?;
        if !status.success() {
            return Err(SpanfuseError::Inference(format!("tagger exited with {status}")));
        }
        tracing::debug!(checkpoint = %self.checkpoint.display(), "tagger stopped");
        Ok(())
    }
}

#[async_trait]
impl SpanTagger for CommandTagger {
    async fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>> {
        let request = TagRequest {
            text,
            labels: &self.labels,
            threshold: self.min_score,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| SpanfuseError::Inference(format!("failed to encode request: {e}")))?;
        line.push('\n');

        let mut process = self.process.lock().await;
        let io_failure = |e: std::io::Error| SpanfuseError::Inference(format!("tagger pipe: {e}"));
        process
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(io_failure)?;
        process.stdin.flush().await.map_err(io_failure)?;

        let reply = process
            .stdout
            .next_line()
            .await
            .map_err(io_failure)?
            .ok_or_else(|| SpanfuseError::Inference("tagger exited before answering".to_string()))?;

        match serde_json::from_str(&reply) {
            Ok(TagResponse::Spans(spans)) => Ok(spans),
            Ok(TagResponse::Failed { error }) => Err(SpanfuseError::Inference(error)),
            Err(e) => Err(SpanfuseError::Inference(format!(
                "unreadable tagger response: {e}"
            ))),
        }
    }
}
