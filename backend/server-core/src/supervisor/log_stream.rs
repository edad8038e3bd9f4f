//! Scan one output stream of the game server.
//!
//! Each line is appended to the console log, echoed to the manager log, and
//! run through the rule table. Matches are forwarded to the run's dispatcher
//! as [`LineEvent`]s; nothing here blocks on their outcome.

use crate::error::supervisor::SupervisorError;
use crate::supervisor::rules::{LineAction, LineEvent, LineRule, LogLine, evaluate};

use common::ErrorLocation;

use std::fmt;
use std::io::Error as IoError;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

pub struct LogStreamProcessor {
    kind: StreamKind,
    log_path: PathBuf,
    rules: &'static [LineRule],
    events_tx: UnboundedSender<LineEvent>,
}

impl LogStreamProcessor {
    pub fn new(
        kind: StreamKind,
        log_path: impl Into<PathBuf>,
        rules: &'static [LineRule],
        events_tx: UnboundedSender<LineEvent>,
    ) -> Self {
        Self {
            kind,
            log_path: log_path.into(),
            rules,
            events_tx,
        }
    }

    /// Run [`scan`](Self::scan) on its own task.
    pub fn spawn<R>(self, reader: R) -> JoinHandle<Result<u64, SupervisorError>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        TokioSpawn(async move { self.scan(reader).await })
    }

    /// Process lines until end-of-stream.
    ///
    /// Returns the number of lines seen. A read error ends the scan and is
    /// returned; it is not retried.
    pub async fn scan<R>(&self, reader: R) -> Result<u64, SupervisorError>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut lines = 0u64;

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await.map_err(|e| {
                error!("Failed to read Factorio server {}: {e}", self.kind);
                SupervisorError::Stream {
                    message: format!("Failed to read {}: {e}", self.kind),
                    location: ErrorLocation::from(Location::caller()),
                    source: Box::new(e),
                }
            })?;

            if read == 0 {
                debug!("Factorio server {} closed after {lines} lines", self.kind);
                return Ok(lines);
            }

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\r', '\n']);
            lines += 1;

            self.handle_line(line).await;
        }
    }

    async fn handle_line(&self, line: &str) {
        if let Err(e) = append_line(&self.log_path, line).await {
            warn!(
                "Failed to append to console log {}: {e}",
                self.log_path.display()
            );
        }

        info!("Factorio Server [{}]: {line}", self.kind);

        let parsed = LogLine::new(line);
        for action in evaluate(self.rules, &parsed) {
            let event = match action {
                LineAction::ClassifyError => LineEvent::ServerError {
                    stream: self.kind,
                    tokens: parsed.tokens.clone(),
                },
                LineAction::ConnectRcon => LineEvent::RconReady { stream: self.kind },
            };

            if self.events_tx.send(event).is_err() {
                debug!("Line dispatcher gone, dropping {action:?} from {}", self.kind);
            }
        }
    }
}

/// Append `line` and a newline to `path`, opening and closing the file
/// around the single write.
pub async fn append_line(path: &Path, line: &str) -> Result<(), IoError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');

    file.write_all(record.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
