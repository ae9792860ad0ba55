//! Append-only audit log, one file per run.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

/// Writes `<sequence>. <summary>` lines to `<dir>/update_log_<timestamp>.txt`.
///
/// Nothing touches the file system until the first line is appended; the
/// directory is created then if absent. The file is opened in append mode,
/// so an existing log is extended, never truncated.
///
/// The handle numbers lines itself, starting at 1. Jobs that feed several
/// passes into one log therefore get one strictly increasing sequence. A
/// line that fails to write still uses up its number.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Option<File>,
    lines: usize,
    last_sequence: usize,
}

impl RunLog {
    /// A log stamped with the current UTC time.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_timestamp(dir, OffsetDateTime::now_utc())
    }

    pub fn with_timestamp(dir: impl AsRef<Path>, at: OffsetDateTime) -> Self {
        Self {
            path: dir.as_ref().join(log_file_name(at)),
            file: None,
            lines: 0,
            last_sequence: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines appended by this handle.
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Sequence number the next appended line will carry.
    pub fn next_sequence(&self) -> usize {
        self.last_sequence + 1
    }

    /// Append `summary` under the next sequence number and return that number.
    pub fn append(&mut self, summary: &str) -> io::Result<usize> {
        self.last_sequence += 1;
        let sequence = self.last_sequence;
        if self.file.is_none() {
            if let Some(dir) = self.path.parent() {
                fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{sequence}. {summary}")?;
            file.flush()?;
        }
        self.lines += 1;
        Ok(sequence)
    }
}

/// `update_log_2026-10-18T09-47-00Z.txt`: ISO 8601 with `-` for `:`.
pub fn log_file_name(at: OffsetDateTime) -> String {
    let stamp = at
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]-[minute]-[second]Z"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("update_log_{stamp}.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn file_name_is_filesystem_safe_iso_stamp() {
        let name = log_file_name(datetime!(2026-10-18 09:47:05 UTC));
        assert_eq!(name, "update_log_2026-10-18T09-47-05Z.txt");
    }

    #[test]
    fn nothing_written_before_first_line() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let log = RunLog::new(&dir);
        assert!(!dir.exists());
        assert_eq!(log.lines_written(), 0);
    }

    #[test]
    fn append_creates_directory_and_numbered_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let mut log = RunLog::with_timestamp(&dir, datetime!(2026-01-01 00:00:00 UTC));
        assert_eq!(log.append("skipped a (already exists)").unwrap(), 1);
        assert_eq!(log.append("created b").unwrap(), 2);

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text, "1. skipped a (already exists)\n2. created b\n");
        assert_eq!(log.lines_written(), 2);
    }

    #[test]
    fn second_run_with_same_stamp_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let at = datetime!(2026-01-01 00:00:00 UTC);
        let mut first = RunLog::with_timestamp(tmp.path(), at);
        first.append("first run").unwrap();
        drop(first);

        let mut second = RunLog::with_timestamp(tmp.path(), at);
        second.append("second run").unwrap();

        let text = fs::read_to_string(second.path()).unwrap();
        assert_eq!(text, "1. first run\n1. second run\n");
    }

    #[test]
    fn sequence_survives_a_failed_write() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let mut log = RunLog::new(blocker.join("logs"));
        assert!(log.append("lost").is_err());
        assert_eq!(log.next_sequence(), 2);
        assert_eq!(log.lines_written(), 0);
    }
}
