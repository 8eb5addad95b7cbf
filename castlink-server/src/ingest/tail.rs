//! Relay log directory tailer
//!
//! The relay writes `room_<id>-<yyyymmdd>_<hhmmss>.txt` files into a log
//! directory, rolling to a new file on reconnect. This source scans for
//! today's files, fully reads every rolled-over file once, then tails the
//! newest one. Truncation rewinds to the start; a partial trailing line is
//! left in the file until its newline arrives.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ingest::RelaySource;

pub struct LogTailSource {
    room_id: u64,
    log_dir: PathBuf,
    poll_interval: Duration,
    /// Filenames already fully consumed; never re-read
    processed: HashSet<String>,
    current: Option<Tail>,
}

struct Tail {
    filename: String,
    path: PathBuf,
    offset: u64,
}

impl LogTailSource {
    pub fn new(room_id: u64, log_dir: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            room_id,
            log_dir: log_dir.into(),
            poll_interval,
            processed: HashSet::new(),
            current: None,
        }
    }

    fn prefix_for_today(&self) -> String {
        format!(
            "room_{}-{}_",
            self.room_id,
            Local::now().format("%Y%m%d")
        )
    }

    /// Today's unprocessed log files, sorted by filename (which embeds the
    /// creation time)
    async fn scan(&self) -> Vec<(String, PathBuf)> {
        let prefix = self.prefix_for_today();
        let mut files = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.log_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {e}", self.log_dir.display());
                return files;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix)
                && name.ends_with(".txt")
                && !self.processed.contains(&name)
            {
                files.push((name, entry.path()));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    /// Read complete lines starting at `offset`. Returns the lines and the
    /// offset just past the last newline consumed.
    async fn read_lines(path: &Path, mut offset: u64) -> std::io::Result<(Vec<String>, u64)> {
        let mut file = File::open(path).await?;
        let len = file.metadata().await?.len();
        if len < offset {
            debug!("{} truncated, rewinding", path.display());
            offset = 0;
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        // only consume up to the last newline; a partial tail line waits
        let consumed = match buf.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None => return Ok((Vec::new(), offset)),
        };

        let lines = String::from_utf8_lossy(&buf[..consumed])
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        Ok((lines, offset + consumed as u64))
    }

    /// Send the remaining content of a file and mark it processed.
    /// Returns false when the receiver is gone.
    async fn finish_file(
        &mut self,
        filename: String,
        path: &Path,
        offset: u64,
        tx: &mpsc::Sender<String>,
    ) -> bool {
        match Self::read_lines(path, offset).await {
            Ok((lines, _)) => {
                info!("finished relay file {filename} ({} lines)", lines.len());
                for line in lines {
                    if tx.send(line).await.is_err() {
                        return false;
                    }
                }
            }
            Err(e) => warn!("error draining {filename}: {e}"),
        }
        self.processed.insert(filename);
        true
    }
}

#[async_trait]
impl RelaySource for LogTailSource {
    async fn run(&mut self, lines: mpsc::Sender<String>) -> Result<()> {
        info!(
            room_id = self.room_id,
            dir = %self.log_dir.display(),
            "tailing relay chat logs"
        );

        loop {
            if lines.is_closed() {
                return Ok(());
            }

            let mut files = self.scan().await;

            // every file but the newest is rolled over: read it fully once
            let target = files.pop();
            for (filename, path) in files {
                let drained = match &self.current {
                    Some(tail) if tail.filename == filename => {
                        let offset = tail.offset;
                        self.current = None;
                        self.finish_file(filename, &path, offset, &lines).await
                    }
                    _ => self.finish_file(filename, &path, 0, &lines).await,
                };
                if !drained {
                    return Ok(());
                }
            }

            if let Some((filename, path)) = target {
                let switch = self
                    .current
                    .as_ref()
                    .map(|t| t.filename != filename)
                    .unwrap_or(true);
                if switch {
                    if let Some(old) = self.current.take() {
                        if !self
                            .finish_file(old.filename, &old.path, old.offset, &lines)
                            .await
                        {
                            return Ok(());
                        }
                    }
                    info!("tailing relay file {filename}");
                    self.current = Some(Tail {
                        filename,
                        path,
                        offset: 0,
                    });
                }
            }

            if let Some(tail) = &mut self.current {
                match Self::read_lines(&tail.path, tail.offset).await {
                    Ok((batch, new_offset)) => {
                        tail.offset = new_offset;
                        for line in batch {
                            if lines.send(line).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => {
                        warn!("tailing error on {}: {e}", tail.filename);
                        self.current = None;
                    }
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
