use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, IntoInnerError, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::HeartbeatRecord;

/// Names of the log columns, in the order in which they appear in each log line.
pub const LOG_COLUMNS: [&str; 19] = [
    "HB",
    "Tag",
    "Global_Work",
    "Window_Work",
    "Work",
    "Global_Time",
    "Window_Time",
    "Start_Time",
    "End_Time",
    "Global_Perf",
    "Window_Perf",
    "Instant_Perf",
    "Global_Energy",
    "Window_Energy",
    "Start_Energy",
    "End_Energy",
    "Global_Pwr",
    "Window_Pwr",
    "Instant_Pwr",
];

/// Minimum width of each column, so that the log lines up when viewed as text.
const COLUMN_WIDTHS: [usize; 19] = [
    6, 6, 12, 12, 8, 16, 16, 20, 20, 14, 14, 14, 14, 14, 16, 16, 12, 12, 12,
];

/// Owner read/write, group and others read.
#[cfg(unix)]
const LOG_FILE_MODE: u32 = 0o644;

/// An append-only heartbeat log file.
///
/// The log starts with a single header line naming the [`LOG_COLUMNS`], followed by one line per
/// heartbeat record. Cells are separated by whitespace.
pub struct HeartbeatLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HeartbeatLog {
    /// Creates the log file, truncating any existing file, and writes the header line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the header cannot be written.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        options.mode(LOG_FILE_MODE);

        let file = options.open(&path)?;

        let mut log = Self {
            path,
            writer: BufWriter::new(file),
        };

        write_line(&mut log.writer, LOG_COLUMNS)?;
        log.writer.flush()?;

        Ok(log)
    }

    /// The path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends records to the log and flushes them to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the file fails.
    pub fn write_records<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a HeartbeatRecord>,
    ) -> io::Result<()> {
        for record in records {
            write_line(&mut self.writer, record.to_cells())?;
        }

        self.writer.flush()
    }

    /// Flushes and closes the log file.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered data cannot be written to the file.
    pub fn close(self) -> io::Result<()> {
        let file = self.writer.into_inner().map_err(IntoInnerError::into_error)?;
        drop(file);
        Ok(())
    }
}

impl fmt::Debug for HeartbeatLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartbeatLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn write_line<S: AsRef<str>>(writer: &mut impl Write, cells: [S; 19]) -> io::Result<()> {
    let last = cells.len().saturating_sub(1);

    for (index, (cell, width)) in cells.iter().zip(COLUMN_WIDTHS).enumerate() {
        if index == last {
            // No padding after the final cell.
            writeln!(writer, "{}", cell.as_ref())?;
        } else {
            write!(writer, "{:<width$} ", cell.as_ref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn create_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heartbeat-test.log");

        HeartbeatLog::create(&path).unwrap().close().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].split_whitespace().collect::<Vec<_>>(),
            LOG_COLUMNS.to_vec()
        );
    }

    #[test]
    fn create_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heartbeat-test.log");
        fs::write(&path, "stale\nstale\nstale\n").unwrap();

        HeartbeatLog::create(&path).unwrap().close().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(!contents.contains("stale"));
    }

    #[cfg(unix)]
    #[test]
    fn create_sets_readable_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heartbeat-test.log");

        HeartbeatLog::create(&path).unwrap().close().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        // The process umask may remove bits but never adds any.
        assert_eq!(mode & 0o777 & !LOG_FILE_MODE, 0);
        assert_ne!(mode & 0o600, 0);
    }

    #[test]
    fn create_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();

        assert!(HeartbeatLog::create(dir.path().join("missing").join("x.log")).is_err());
    }

    #[test]
    fn line_has_one_cell_per_column() {
        let mut buffer = Vec::new();
        write_line(&mut buffer, LOG_COLUMNS).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.ends_with("Instant_Pwr\n"));
        assert_eq!(text.split_whitespace().count(), LOG_COLUMNS.len());
    }
}
