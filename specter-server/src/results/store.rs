//! On-disk store for finished-search result files.
//!
//! Files are named `{username}_{32 hex}.txt`, written once after the tool
//! exits, downloaded at most once, and reaped after a retention window if
//! never downloaded. The name pattern is the only thing the download
//! endpoint will accept, which keeps path traversal out without ever
//! touching the filesystem for invalid input.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

static RESULT_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+_[0-9a-f]{32}\.txt$").expect("result filename pattern is valid")
});

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `name` matches the generation pattern exactly. Checked before
    /// any path is built from client input.
    pub fn is_valid_filename(name: &str) -> bool {
        RESULT_FILENAME_RE.is_match(name)
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write the newline-joined positive hits to a fresh result file and
    /// return its name. Names embed 128 random bits, so they are never
    /// reused within a process lifetime.
    pub async fn write_results(&self, username: &str, hits: &[String]) -> io::Result<String> {
        let filename = format!("{}_{}.txt", username, Uuid::new_v4().simple());
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, hits.join("\n")).await?;
        debug!(path = %path.display(), count = hits.len(), "wrote result file");
        Ok(filename)
    }

    /// Delete every regular file whose last-modified age exceeds `max_age`.
    /// Per-file errors are logged and skipped so one bad entry can't stall
    /// the sweep. Returns the number of files removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %self.dir.display(), "failed to read results dir: {err}");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!("failed to read results dir entry: {err}");
                    break;
                }
            };

            let path = entry.path();
            let stale = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata
                    .modified()
                    .ok()
                    .and_then(|mtime| mtime.elapsed().ok())
                    .is_some_and(|age| age > max_age),
                Ok(_) => false,
                Err(err) => {
                    warn!(path = %path.display(), "failed to stat result file: {err}");
                    false
                }
            };
            if !stale {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed stale result file");
                    removed += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), "failed to remove stale file: {err}"),
            }
        }
        removed
    }
}
