use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::Result;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug)]
struct TailedFile {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
}

/// Follows several log files and yields complete new lines.
///
/// Best effort: reads are not synchronized with the processes writing the
/// files, and a failed read is retried on the next poll.
#[derive(Debug)]
pub struct LogTailer {
    files: Vec<TailedFile>,
    interval: Duration,
}

impl LogTailer {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut files: Vec<TailedFile> = Vec::new();
        for path in paths {
            if files.iter().all(|f| f.path != path) {
                files.push(TailedFile {
                    path,
                    offset: 0,
                    partial: Vec::new(),
                });
            }
        }

        Self {
            files,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    /// Create missing files and skip what they already contain
    pub fn prepare(&mut self) -> Result<()> {
        for file in &mut self.files {
            if let Some(parent) = file.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let handle = OpenOptions::new().create(true).append(true).open(&file.path)?;
            file.offset = handle.metadata()?.len();
        }
        Ok(())
    }

    /// New complete lines since the last poll, file by file
    pub fn poll(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        for file in &mut self.files {
            if let Err(e) = read_new(file, &mut lines) {
                log::debug!("Cannot read {}: {}", file.path.display(), e);
            }
        }

        lines
    }

    /// Forward new lines to `out` until the task is dropped with the runtime
    pub fn spawn<W>(mut self, mut out: W) -> JoinHandle<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;

                let lines = self.poll();
                if lines.is_empty() {
                    continue;
                }

                for line in lines {
                    if out.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                        return;
                    }
                }
                let _ = out.flush().await;
            }
        })
    }
}

fn read_new(file: &mut TailedFile, lines: &mut Vec<String>) -> std::io::Result<()> {
    let mut handle = std::fs::File::open(&file.path)?;
    let len = handle.metadata()?.len();

    if len < file.offset {
        log::debug!("{} was truncated", file.path.display());
        file.offset = 0;
        file.partial.clear();
    }
    if len == file.offset {
        return Ok(());
    }

    handle.seek(SeekFrom::Start(file.offset))?;
    let mut buf = Vec::with_capacity((len - file.offset) as usize);
    handle.take(len - file.offset).read_to_end(&mut buf)?;
    file.offset += buf.len() as u64;

    file.partial.extend_from_slice(&buf);
    while let Some(pos) = file.partial.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = file.partial.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line[..line.len() - 1]);
        lines.push(line.trim_end_matches('\r').to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_prepare_creates_and_skips_existing() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("error.log");
        std::fs::write(&existing, "old line\n").unwrap();
        let missing = dir.path().join("logs/app.log");

        let mut tailer = LogTailer::new(vec![existing.clone(), missing.clone(), existing.clone()]);
        assert_eq!(tailer.paths().count(), 2);

        tailer.prepare().unwrap();
        assert!(missing.is_file());
        assert!(tailer.poll().is_empty());

        append(&existing, "new line\n");
        append(&missing, "first\nsecond\n");
        assert_eq!(tailer.poll(), vec!["new line", "first", "second"]);
    }

    #[test]
    fn test_partial_lines_wait_for_newline() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("php-fpm.log");

        let mut tailer = LogTailer::new(vec![log.clone()]);
        tailer.prepare().unwrap();

        append(&log, "WARNING: pool www ");
        assert!(tailer.poll().is_empty());

        append(&log, "seems busy\r\n");
        assert_eq!(tailer.poll(), vec!["WARNING: pool www seems busy"]);
    }

    #[test]
    fn test_truncated_file_restarts() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("access.log");
        std::fs::write(&log, "a long line that will be rotated away\n").unwrap();

        let mut tailer = LogTailer::new(vec![log.clone()]);
        tailer.prepare().unwrap();

        std::fs::write(&log, "fresh\n").unwrap();
        assert_eq!(tailer.poll(), vec!["fresh"]);
    }

    #[test]
    fn test_missing_file_is_retried() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("late.log");

        let mut tailer = LogTailer::new(vec![log.clone()]);
        assert!(tailer.poll().is_empty());

        std::fs::write(&log, "hello\n").unwrap();
        assert_eq!(tailer.poll(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_spawn_forwards_lines() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("error.log");

        let mut tailer = LogTailer::new(vec![log.clone()]).with_interval(Duration::from_millis(10));
        tailer.prepare().unwrap();

        let (writer, mut reader) = tokio::io::duplex(1024);
        let handle = tailer.spawn(writer);

        append(&log, "upstream timed out\n");

        let mut buf = vec![0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(5), tokio::io::AsyncReadExt::read(&mut reader, &mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"upstream timed out\n");

        handle.abort();
    }
}
