use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use super::channel::RecordChannel;
use super::checklist::ToggleEvent;
use super::constants::{LOG_FILE_EXTENSION, LOG_FILE_PREFIX, SETUP_LINE_SEPARATOR};
use super::error::SessionLogError;
use super::schedule::StepVoltages;
use super::timestamp;

const LOG_TITLE: &str = "# HV Ramp Log";
const COLUMN_HEADER: &str = "timestamp,step,channel,checked,Vgrid,Vanode,Vcathode,Note";

/// One row of the HV ramp log
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: OffsetDateTime,
    pub step: usize,
    pub channel: RecordChannel,
    pub checked: Option<bool>,
    pub voltages: StepVoltages,
    pub note: Option<String>,
}

impl LogRecord {
    /// Record for a checkbox toggle
    pub fn toggle(event: &ToggleEvent) -> Self {
        Self {
            timestamp: timestamp::now(),
            step: event.step,
            channel: event.channel.into(),
            checked: Some(event.checked),
            voltages: event.voltages,
            note: None,
        }
    }

    /// Record for a freeform operator note, attached to a step of the procedure
    pub fn note(step: usize, voltages: StepVoltages, text: &str) -> Self {
        Self {
            timestamp: timestamp::now(),
            step,
            channel: RecordChannel::Note,
            checked: None,
            voltages,
            note: Some(text.to_string()),
        }
    }

    /// Record for a fine-tuning entry. The step column holds the position of the entry
    /// in the fine-tune ledger (1-indexed).
    pub fn fine_tune(
        position: usize,
        timestamp: OffsetDateTime,
        voltages: StepVoltages,
        note: &str,
    ) -> Self {
        Self {
            timestamp,
            step: position,
            channel: RecordChannel::FineTune,
            checked: None,
            voltages,
            note: Some(note.to_string()),
        }
    }

    /// Format as a single CSV line (no line terminator)
    pub fn to_csv_row(&self) -> Result<String, SessionLogError> {
        let checked = match self.checked {
            Some(true) => "True",
            Some(false) => "False",
            None => "",
        };
        Ok(format!(
            "{},{:02},{},{},{},{},{},{}",
            timestamp::iso_seconds(&self.timestamp)?,
            self.step,
            self.channel,
            checked,
            self.voltages.grid,
            self.voltages.anode,
            self.voltages.cathode,
            escape_csv_field(self.note.as_deref().unwrap_or(""))
        ))
    }
}

/// Quote a field if it would otherwise break the CSV structure
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Setup descriptions are typed in a multi-line box but the header is one line per field
fn flatten_lines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\n', SETUP_LINE_SEPARATOR)
}

/// Details of the session currently being logged
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub path: PathBuf,
    pub started: OffsetDateTime,
    pub operator: String,
    pub setup: String,
}

/// SessionLog is the append-only CSV sink of the ramp procedure.
///
/// Records are only persisted between `start` and `stop`. Each append opens the file,
/// writes exactly one row and closes it again, so the file is always readable even if
/// the application dies mid-procedure.
#[derive(Debug, Default)]
pub struct SessionLog {
    active: Option<ActiveSession>,
    last_path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session in the given directory.
    ///
    /// Returns `Ok(Some(path))` with the new log file, or `Ok(None)` if a session was
    /// already active (in which case nothing happens).
    pub fn start(
        &mut self,
        log_dir: &Path,
        operator: &str,
        setup: &str,
    ) -> Result<Option<PathBuf>, SessionLogError> {
        if self.active.is_some() {
            spdlog::debug!("Start requested while a logging session is active; ignoring");
            return Ok(None);
        }

        std::fs::create_dir_all(log_dir)?;
        let started = timestamp::now();
        let (path, mut file) = Self::create_log_file(log_dir, &timestamp::file_stamp(&started)?)?;

        let header = format!(
            "{LOG_TITLE}\n# Start time: {}\n# Operator(s): {}\n# Setup: {}\n#\n{COLUMN_HEADER}\n",
            timestamp::iso_seconds(&started)?,
            flatten_lines(operator),
            flatten_lines(setup)
        );
        file.write_all(header.as_bytes())?;

        spdlog::info!("Logging started: {}", path.display());
        self.active = Some(ActiveSession {
            path: path.clone(),
            started,
            operator: operator.to_string(),
            setup: setup.to_string(),
        });
        self.last_path = Some(path.clone());
        Ok(Some(path))
    }

    /// Create the log file for a stamp. If two sessions are started within the same
    /// second the later one gets a numeric suffix instead of overwriting the first.
    fn create_log_file(log_dir: &Path, stamp: &str) -> Result<(PathBuf, File), SessionLogError> {
        let mut attempt: usize = 1;
        loop {
            let name = if attempt == 1 {
                format!("{LOG_FILE_PREFIX}{stamp}.{LOG_FILE_EXTENSION}")
            } else {
                format!("{LOG_FILE_PREFIX}{stamp}_{attempt}.{LOG_FILE_EXTENSION}")
            };
            let path = log_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(SessionLogError::IOError(e)),
            }
        }
    }

    /// Stop the active session. The log file is left on disk.
    ///
    /// Returns false if there was no active session.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(session) => {
                spdlog::info!("Logging stopped: {}", session.path.display());
                true
            }
            None => {
                spdlog::debug!("Stop requested without an active logging session; ignoring");
                false
            }
        }
    }

    /// Append a record to the active session.
    ///
    /// Records given while no session is active are dropped. Returns whether the record
    /// was written. IO errors are returned to the caller; the record is lost in that case.
    pub fn append(&self, record: &LogRecord) -> Result<bool, SessionLogError> {
        let session = match &self.active {
            Some(s) => s,
            None => {
                spdlog::debug!(
                    "Dropping {} record for step {:02}; logging is not active",
                    record.channel,
                    record.step
                );
                return Ok(false);
            }
        };

        let row = record.to_csv_row()?;
        let mut file = OpenOptions::new().append(true).open(&session.path)?;
        writeln!(file, "{row}")?;
        Ok(true)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Path of the most recent log file, even after the session has stopped
    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;

    fn toggle(step: usize, checked: bool) -> LogRecord {
        LogRecord::toggle(&ToggleEvent {
            step,
            channel: Channel::Grid,
            checked,
            voltages: StepVoltages::new(0.0, 0.0, 50.0),
        })
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new();
        let path = log
            .start(dir.path(), "Alice Bob", "WGW15-G6\nArDME8020")
            .unwrap()
            .unwrap();
        log.append(&toggle(1, true)).unwrap();
        log.append(&toggle(1, false)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "# HV Ramp Log");
        assert!(lines[1].starts_with("# Start time: "));
        assert_eq!(lines[2], "# Operator(s): Alice Bob");
        assert_eq!(lines[3], "# Setup: WGW15-G6 | ArDME8020");
        assert_eq!(lines[4], "#");
        assert_eq!(lines[5], COLUMN_HEADER);
        assert_eq!(lines.len(), 8);
        assert_eq!(contents.matches(COLUMN_HEADER).count(), 1);
        assert!(lines[6].ends_with(",01,CH3,True,0,0,50,"));
        assert!(lines[7].ends_with(",01,CH3,False,0,0,50,"));
    }

    #[test]
    fn test_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new();
        let path = log.start(dir.path(), "", "").unwrap().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("hv_log_"));
        assert!(name.ends_with(".csv"));
        // hv_log_YYYY-MM-DD_HH-MM-SS.csv
        assert_eq!(name.len(), "hv_log_2024-01-01_00-00-00.csv".len());
    }

    #[test]
    fn test_log_dir_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("hv_ramp_logs");
        let mut log = SessionLog::new();
        let path = log.start(&nested, "", "").unwrap().unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.exists());
    }

    #[test]
    fn test_double_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new();
        let first = log.start(dir.path(), "a", "").unwrap().unwrap();
        assert!(log.start(dir.path(), "b", "").unwrap().is_none());
        assert_eq!(log.active_session().unwrap().path, first);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_restart_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new();
        let first = log.start(dir.path(), "", "").unwrap().unwrap();
        log.append(&toggle(1, true)).unwrap();
        assert!(log.stop());
        let second = log.start(dir.path(), "", "").unwrap().unwrap();
        assert_ne!(first, second);
        let contents = std::fs::read_to_string(&first).unwrap();
        assert_eq!(contents.lines().count(), 7);
    }

    #[test]
    fn test_append_without_session_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new();
        assert!(!log.append(&toggle(1, true)).unwrap());

        let path = log.start(dir.path(), "", "").unwrap().unwrap();
        assert!(log.stop());
        let before = std::fs::read_to_string(&path).unwrap();
        assert!(!log.append(&toggle(1, true)).unwrap());
        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);
        assert_eq!(log.last_path(), Some(path.as_path()));
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let mut log = SessionLog::new();
        assert!(!log.stop());
        assert!(!log.is_active());
    }

    #[test]
    fn test_note_escaping() {
        let record = LogRecord::note(3, StepVoltages::new(100.0, 100.0, 150.0), "gas flow 2.5, \"stable\"");
        let row = record.to_csv_row().unwrap();
        assert!(row.ends_with(",03,NOTE,,100,100,150,\"gas flow 2.5, \"\"stable\"\"\""));
    }
}
