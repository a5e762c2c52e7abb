//! Incremental log file tailing.
//!
//! [`LogTailer`] owns byte-offset progress into a single growing log file
//! and produces exactly the bytes appended since the last successful read.
//! Rotation/truncation is detected with a size-halved heuristic and answered
//! with a fresh baseline rather than a from-start re-read, so a replaced log
//! is never replayed as a burst of matches.
//!
//! Every failure path degrades to "no new content": a missing, locked, or
//! half-written file never interrupts the polling caller.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, trace};

const READ_CHUNK: usize = 8 * 1024;

/// Incremental reader over one append-mostly log file.
#[derive(Debug, Default)]
pub struct LogTailer {
    /// Byte offset already consumed; `None` until the first successful baseline.
    progress: Option<u64>,
    /// Modification stamp observed at the last baseline or successful read.
    last_modified: Option<SystemTime>,
}

impl LogTailer {
    /// Create a tailer with unknown progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset already consumed, when known.
    #[must_use]
    pub fn progress(&self) -> Option<u64> {
        self.progress
    }

    /// Read everything appended to `path` since the previous poll.
    ///
    /// Returns the new content decoded as (lossy) UTF-8, or an empty string
    /// when there is nothing new or the file is currently unreadable. The
    /// first poll, and the first poll after a detected reset, only baselines
    /// at the current end of file and reports nothing.
    pub fn poll_new_contents(&mut self, path: &Path) -> String {
        let Some(progress) = self.progress else {
            self.jump(path);
            return String::new();
        };

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                trace!(path = %path.display(), %err, "log file unreadable this poll");
                return String::new();
            }
        };

        let modified = match metadata.modified() {
            Ok(m) => m,
            Err(err) => {
                trace!(path = %path.display(), %err, "log mtime unavailable");
                return String::new();
            }
        };

        if Some(modified) == self.last_modified {
            // Unchanged since the last poll: skip the redundant read.
            return String::new();
        }

        if metadata.len() < progress / 2 {
            // The file shrank to well under the recorded offset: assume it
            // was rotated or replaced (e.g. a new session) and re-baseline
            // instead of replaying the new file from byte zero. Any shrink
            // below half the recorded offset counts, even a legitimate
            // partial truncation.
            debug!(
                path = %path.display(),
                size = metadata.len(),
                progress,
                "log shrank; resetting baseline"
            );
            self.jump(path);
            return String::new();
        }

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                trace!(path = %path.display(), %err, "log open failed");
                return String::new();
            }
        };
        if let Err(err) = file.seek(SeekFrom::Start(progress)) {
            trace!(path = %path.display(), %err, "log seek failed");
            return String::new();
        }

        let mut buf = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    // Advance per chunk: a later failure keeps the partial
                    // progress instead of rolling back and re-reading.
                    self.progress = Some(progress + buf.len() as u64);
                }
                Err(ref err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    debug!(path = %path.display(), %err, "log read failed mid-stream");
                    return String::new();
                }
            }
        }

        self.last_modified = Some(modified);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Baseline: record the current end of file and its modification stamp
    /// without consuming content. Failure leaves the previous state so the
    /// next poll retries.
    fn jump(&mut self, path: &Path) {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => match metadata.modified() {
                Ok(modified) => {
                    self.progress = Some(metadata.len());
                    self.last_modified = Some(modified);
                    debug!(path = %path.display(), offset = metadata.len(), "baselined log progress");
                }
                Err(err) => {
                    trace!(path = %path.display(), %err, "log mtime unavailable; baseline deferred");
                }
            },
            Ok(_) => {
                trace!(path = %path.display(), "log path is not a regular file");
            }
            Err(err) => {
                trace!(path = %path.display(), %err, "log missing; baseline deferred");
            }
        }
    }
}
