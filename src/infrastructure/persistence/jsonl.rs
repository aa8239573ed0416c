//! Append-only JSON Lines files.
//!
//! Each record is one line, written with a single `write_all` on a file
//! opened in append mode. A crash can leave at most one torn line at the end
//! of the file; it is dropped (and truncated away when opened for writing).
//! A complete final record that lost only its newline is kept and the
//! newline restored on open.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::retry::WriteRetry;
use crate::domain::error::StorageError;

/// Writer half of a JSONL file. Callers serialize access.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    retry: WriteRetry,
}

impl JsonlWriter {
    /// Open (creating if needed) `path` for appending and replay its records.
    pub async fn open<T>(path: impl Into<PathBuf>, retry: WriteRetry) -> Result<(Self, Vec<T>), StorageError>
    where
        T: DeserializeOwned,
    {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::io(parent, 1, e))?;
            }
        }

        let replay = replay_file(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, 1, e))?;

        if let Some(valid_len) = replay.torn_at {
            warn!(
                path = %path.display(),
                valid_len,
                "truncating torn final line left by an interrupted write"
            );
            file.set_len(valid_len)
                .await
                .map_err(|e| StorageError::io(&path, 1, e))?;
        } else if replay.unterminated {
            warn!(path = %path.display(), "restoring newline after final record");
            write_line(&mut file, b"\n")
                .await
                .map_err(|e| StorageError::io(&path, 1, e))?;
        }

        Ok((Self { path, retry }, replay.records))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub async fn append<T: Serialize>(&mut self, record: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record).map_err(|source| StorageError::Encode {
            path: self.path.clone(),
            source,
        })?;
        line.push(b'\n');

        let path = self.path.as_path();
        let line = line.as_slice();
        self.retry
            .execute(path, move || async move {
                let mut file = OpenOptions::new().append(true).open(path).await?;
                append_line(&mut file, path, line).await
            })
            .await
    }
}

async fn append_line(file: &mut File, path: &Path, line: &[u8]) -> std::io::Result<()> {
    let start = file.metadata().await?.len();
    if let Err(e) = write_line(file, line).await {
        // Roll back a partial line so a retry cannot leave a torn record mid-file.
        if let Err(rollback) = file.set_len(start).await {
            warn!(path = %path.display(), error = %rollback, "failed to roll back partial line");
        }
        return Err(e);
    }
    Ok(())
}

async fn write_line(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

/// Read every record of a JSONL file without modifying it. A missing file is empty.
pub async fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let replay = replay_file(path).await?;
    if replay.torn_at.is_some() {
        warn!(path = %path.display(), "ignoring torn final line");
    }
    Ok(replay.records)
}

struct Replay<T> {
    records: Vec<T>,
    /// Byte length of the valid prefix when the last line is torn
    torn_at: Option<u64>,
    /// The last record parsed but has no trailing newline
    unterminated: bool,
}

async fn replay_file<T: DeserializeOwned>(path: &Path) -> Result<Replay<T>, StorageError> {
    let content = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Replay {
                records: Vec::new(),
                torn_at: None,
                unterminated: false,
            })
        }
        Err(e) => return Err(StorageError::io(path, 1, e)),
    };
    parse_lines(path, &content)
}

fn parse_lines<T: DeserializeOwned>(path: &Path, content: &[u8]) -> Result<Replay<T>, StorageError> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;
    let mut unterminated = false;

    while offset < content.len() {
        line_no += 1;
        let (line, next, terminated) = match content[offset..].iter().position(|b| *b == b'\n') {
            Some(pos) => (&content[offset..offset + pos], offset + pos + 1, true),
            None => (&content[offset..], content.len(), false),
        };

        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            continue;
        }

        match serde_json::from_slice::<T>(line) {
            Ok(record) => {
                records.push(record);
                unterminated = !terminated;
            }
            Err(_) if !terminated => {
                return Ok(Replay {
                    records,
                    torn_at: Some(offset as u64),
                    unterminated: false,
                });
            }
            Err(e) => {
                return Err(StorageError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!("line {line_no}: {e}"),
                });
            }
        }
        offset = next;
    }

    Ok(Replay {
        records,
        torn_at: None,
        unterminated,
    })
}
