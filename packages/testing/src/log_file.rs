use std::fs;
use std::path::Path;

use heartbeat_window::LOG_COLUMNS;

/// A heartbeat log read back from disk, for asserting on what a profiler wrote.
#[derive(Clone, Debug)]
pub struct HeartbeatLogFile {
    /// The cells of the header line.
    pub header: Vec<String>,

    /// One entry per record line, in file order.
    pub rows: Vec<LogRow>,
}

/// The columns of one record line that tests care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[expect(missing_docs, reason = "fields are named after the log columns they hold")]
pub struct LogRow {
    pub beat: u64,
    pub tag: u64,
    pub work: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub start_energy: u64,
    pub end_energy: u64,
}

impl HeartbeatLogFile {
    /// Reads and parses the log at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read or is not a well-formed heartbeat log.
    #[must_use]
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("cannot read heartbeat log {}: {e}", path.display()));

        let mut lines = content.lines();

        let header: Vec<String> = lines
            .next()
            .unwrap_or_else(|| panic!("heartbeat log {} is empty", path.display()))
            .split_whitespace()
            .map(ToString::to_string)
            .collect();

        assert_eq!(header, LOG_COLUMNS, "unexpected header in {}", path.display());

        let rows = lines.map(|line| parse_row(path, line)).collect();

        Self { header, rows }
    }

    /// The tags of every record, in file order.
    #[must_use]
    pub fn tags(&self) -> Vec<u64> {
        self.rows.iter().map(|row| row.tag).collect()
    }
}

fn parse_row(path: &Path, line: &str) -> LogRow {
    let cells: Vec<&str> = line.split_whitespace().collect();
    assert_eq!(
        cells.len(),
        LOG_COLUMNS.len(),
        "record in {} has the wrong number of cells: {line}",
        path.display()
    );

    let cell = |name: &str| -> u64 {
        let index = LOG_COLUMNS
            .iter()
            .position(|column| *column == name)
            .unwrap_or_else(|| panic!("no column named {name}"));

        cells[index]
            .parse()
            .unwrap_or_else(|e| panic!("column {name} of '{line}' is not an integer: {e}"))
    };

    LogRow {
        beat: cell("HB"),
        tag: cell("Tag"),
        work: cell("Work"),
        start_time: cell("Start_Time"),
        end_time: cell("End_Time"),
        start_energy: cell("Start_Energy"),
        end_energy: cell("End_Energy"),
    }
}
