//! File-backed event log
//!
//! Layout of the log directory:
//! - `request-<n>`: raw request bytes of event `n`
//! - `response-<n>`: raw response bytes of event `n`
//! - `events.log`: one JSON line per event, in sequence order
//!
//! Opening an existing directory resumes numbering after the last entry.
//! A final index line left incomplete by a crash is cut off on open, and
//! lines that do not parse are skipped when reading.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CertificationEvent, EventLog, EventLogError, LoggedEvent};

const INDEX_FILE: &str = "events.log";

/// Directory-backed event log
#[derive(Debug)]
pub struct FileEventLog {
    dir: PathBuf,
    /// Last assigned sequence number; held while an event is written
    last_sequence: Mutex<u64>,
}

impl FileEventLog {
    /// Open (creating if needed) an event log directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, EventLogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let index_path = dir.join(INDEX_FILE);
        let last_sequence = match fs::read_to_string(&index_path).await {
            Ok(index) => {
                let (last_sequence, intact) = scan_index(&index);
                if intact < index.len() {
                    warn!(
                        path = %index_path.display(),
                        discarded_bytes = index.len() - intact,
                        "Truncating incomplete event index entry"
                    );
                    let file = OpenOptions::new().write(true).open(&index_path).await?;
                    file.set_len(intact as u64).await?;
                    file.sync_all().await?;
                } else if !index.is_empty() && !index.ends_with('\n') {
                    let mut file = OpenOptions::new().append(true).open(&index_path).await?;
                    file.write_all(b"\n").await?;
                }
                last_sequence
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        info!(dir = %dir.display(), last_sequence, "Opened event log");
        Ok(Self {
            dir,
            last_sequence: Mutex::new(last_sequence),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn request_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("request-{}", sequence))
    }

    fn response_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("response-{}", sequence))
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn record(&self, event: CertificationEvent) -> Result<u64, EventLogError> {
        let mut last_sequence = self.last_sequence.lock().await;
        let sequence = *last_sequence + 1;

        fs::write(self.request_path(sequence), &event.request).await?;
        fs::write(self.response_path(sequence), &event.response).await?;

        let mut line = serde_json::to_vec(&LoggedEvent { sequence, event })?;
        line.push(b'\n');
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(INDEX_FILE))
            .await?;
        index.write_all(&line).await?;
        index.flush().await?;

        *last_sequence = sequence;
        debug!(sequence, dir = %self.dir.display(), "Recorded event");
        Ok(sequence)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<LoggedEvent>, EventLogError> {
        let _guard = self.last_sequence.lock().await;
        let index = match fs::read_to_string(self.dir.join(INDEX_FILE)).await {
            Ok(index) => index,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<LoggedEvent> = index
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(logged) => Some(logged),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable event index entry");
                    None
                }
            })
            .collect();
        let start = entries.len().saturating_sub(limit);

        let mut events = Vec::with_capacity(entries.len() - start);
        for mut logged in entries.into_iter().skip(start) {
            logged.event.request = fs::read(self.request_path(logged.sequence)).await?;
            logged.event.response = fs::read(self.response_path(logged.sequence)).await?;
            events.push(logged);
        }
        Ok(events)
    }

    async fn count(&self) -> Result<u64, EventLogError> {
        Ok(*self.last_sequence.lock().await)
    }
}

/// Highest sequence in an index and the byte length of its prefix that
/// ends with the last parseable entry
fn scan_index(index: &str) -> (u64, usize) {
    let mut last_sequence = 0;
    let mut intact = 0;
    let mut offset = 0;

    for line in index.split_inclusive('\n') {
        offset += line.len();
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(logged) = serde_json::from_str::<LoggedEvent>(line) {
            last_sequence = last_sequence.max(logged.sequence);
            intact = offset;
        }
    }
    (last_sequence, intact)
}
