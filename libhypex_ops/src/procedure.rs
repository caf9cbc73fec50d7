use std::path::{Path, PathBuf};

use super::channel::Channel;
use super::checklist::{Checklist, FlagState, StepStatus, ToggleEvent};
use super::error::ProcedureError;
use super::fine_tune::{FineTuneEntry, FineTuneLedger};
use super::schedule::{StepVoltages, VoltageSchedule};
use super::session_log::{LogRecord, SessionLog};
use super::timestamp;

/// Direction of the procedure. Ramp-Down walks the schedule from the last step back to
/// the first; the logging is identical in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampMode {
    #[default]
    RampUp,
    RampDown,
}

impl RampMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RampUp => "Ramp-Up",
            Self::RampDown => "Ramp-Down",
        }
    }
}

/// The operating rules shown to the operator alongside the checklist
pub const PROCEDURE_RULES: [&str; 3] = [
    "Set CH3, CH2, CH1 in any order",
    "Step complete only when all 3 are checked",
    "Reverse order for Ramp-Down",
];

/// RampProcedure owns all of the state of the HV ramp: the schedule, the checklist, the
/// logging session and the fine-tune ledger.
///
/// Every operator interaction is one call on this struct. Because all mutation goes
/// through `&mut self` there is exactly one writer; embedding it somewhere with several
/// actors means wrapping it in a Mutex.
#[derive(Debug)]
pub struct RampProcedure {
    schedule: VoltageSchedule,
    checklist: Checklist,
    log: SessionLog,
    ledger: FineTuneLedger,
    log_dir: PathBuf,
    editing_enabled: bool,
    mode: RampMode,
}

impl RampProcedure {
    /// Create a procedure for a schedule. Log files will be written into log_dir.
    pub fn new(schedule: VoltageSchedule, log_dir: &Path) -> Self {
        Self {
            schedule,
            checklist: Checklist::new(),
            log: SessionLog::new(),
            ledger: FineTuneLedger::new(),
            log_dir: log_dir.to_path_buf(),
            editing_enabled: false,
            mode: RampMode::default(),
        }
    }

    pub fn schedule(&self) -> &VoltageSchedule {
        &self.schedule
    }

    /// Swap the voltage schedule before the procedure has recorded anything.
    ///
    /// Once a session has been started or the ledger holds entries, the schedule is fixed
    /// for the rest of the process. The checklist is reset since its flags belong to the
    /// old steps; the ledger, log directory, editing flag and mode are kept.
    pub fn replace_schedule(&mut self, schedule: VoltageSchedule) -> Result<(), ProcedureError> {
        if self.log.last_path().is_some() || !self.ledger.is_empty() {
            return Err(ProcedureError::ScheduleLocked);
        }
        self.schedule = schedule;
        self.checklist = Checklist::new();
        spdlog::info!("Voltage schedule replaced, {} steps", self.schedule.len());
        Ok(())
    }

    pub fn session_log(&self) -> &SessionLog {
        &self.log
    }

    pub fn ledger(&self) -> &FineTuneLedger {
        &self.ledger
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Change where future sessions are written. The active session (if any) is unaffected.
    pub fn set_log_dir(&mut self, log_dir: &Path) {
        self.log_dir = log_dir.to_path_buf();
    }

    pub fn editing_enabled(&self) -> bool {
        self.editing_enabled
    }

    pub fn set_editing(&mut self, enabled: bool) {
        if enabled != self.editing_enabled {
            spdlog::info!(
                "Editing {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.editing_enabled = enabled;
    }

    pub fn mode(&self) -> RampMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RampMode) {
        self.mode = mode;
    }

    pub fn is_logging(&self) -> bool {
        self.log.is_active()
    }

    /// Start a logging session. Does nothing (returns None) if one is already running.
    pub fn start_logging(
        &mut self,
        operator: &str,
        setup: &str,
    ) -> Result<Option<PathBuf>, ProcedureError> {
        Ok(self.log.start(&self.log_dir, operator, setup)?)
    }

    /// Stop the logging session. Returns false if none was running.
    pub fn stop_logging(&mut self) -> bool {
        self.log.stop()
    }

    /// Report the value of a checkbox.
    ///
    /// A change with respect to the previous observation is written to the log (if a
    /// session is active) and returned. The first observation of a flag only records it.
    pub fn set_flag(
        &mut self,
        step: usize,
        channel: Channel,
        value: bool,
    ) -> Result<Option<ToggleEvent>, ProcedureError> {
        let voltages = self.schedule.target_voltages(step)?;
        let event = self.checklist.set_flag(step, channel, value, voltages);
        if let Some(e) = &event {
            spdlog::info!(
                "Step {:02} {} -> {} ({} V)",
                e.step,
                e.channel,
                e.checked,
                e.voltages.for_channel(e.channel)
            );
            self.log.append(&LogRecord::toggle(e))?;
        }
        Ok(event)
    }

    /// Re-affirm every flag with its current value.
    ///
    /// This is what one evaluation pass of a front end does; unobserved flags become
    /// observed as unchecked without producing events, everything else is unchanged.
    pub fn evaluate_pass(&mut self) -> Result<(), ProcedureError> {
        let steps: Vec<usize> = self.schedule.iter().map(|(step, _)| step).collect();
        for step in steps {
            for channel in Channel::PROCEDURE_ORDER {
                let current = self.checklist.is_checked(step, channel);
                self.set_flag(step, channel, current)?;
            }
        }
        Ok(())
    }

    pub fn flag(&self, step: usize, channel: Channel) -> FlagState {
        self.checklist.flag(step, channel)
    }

    pub fn is_checked(&self, step: usize, channel: Channel) -> bool {
        self.checklist.is_checked(step, channel)
    }

    pub fn status(&self, step: usize) -> StepStatus {
        self.checklist.status(step)
    }

    pub fn target_voltages(&self, step: usize) -> Result<StepVoltages, ProcedureError> {
        Ok(self.schedule.target_voltages(step)?)
    }

    /// Step numbers in the order the current mode walks them
    pub fn ordered_steps(&self) -> Vec<usize> {
        let steps = self.schedule.iter().map(|(step, _)| step);
        match self.mode {
            RampMode::RampUp => steps.collect(),
            RampMode::RampDown => steps.rev().collect(),
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.schedule
            .iter()
            .filter(|(step, _)| self.status(*step).is_complete())
            .count()
    }

    /// First step (in the current mode's order) that is not yet complete
    pub fn next_step(&self) -> Option<usize> {
        self.ordered_steps()
            .into_iter()
            .find(|step| !self.status(*step).is_complete())
    }

    /// Write an operator note to the log, attached to a step.
    ///
    /// Unlike toggles, which are silently dropped when nothing is being logged, a note
    /// without an active session is an error the operator must see.
    pub fn log_note(&mut self, step: usize, text: &str) -> Result<(), ProcedureError> {
        if !self.log.is_active() {
            return Err(ProcedureError::NoActiveSession);
        }
        let voltages = self.schedule.target_voltages(step)?;
        self.log.append(&LogRecord::note(step, voltages, text))?;
        spdlog::info!("Logged note for step {:02}", step);
        Ok(())
    }

    /// Fine-tuning requires both editing and an active logging session
    pub fn fine_tune_enabled(&self) -> bool {
        self.editing_enabled && self.log.is_active()
    }

    /// Confirm a fine-tuning entry.
    ///
    /// The entry is written to the log with its ledger position as the step number and is
    /// only added to the ledger once that write succeeded.
    pub fn add_fine_tune(
        &mut self,
        grid: f64,
        anode: f64,
        cathode: f64,
        note: &str,
    ) -> Result<FineTuneEntry, ProcedureError> {
        if !self.editing_enabled {
            return Err(ProcedureError::EditingDisabled);
        }
        if !self.log.is_active() {
            return Err(ProcedureError::NoActiveSession);
        }

        let entry = FineTuneEntry {
            timestamp: timestamp::now(),
            voltages: StepVoltages::new(grid, anode, cathode),
            note: note.to_string(),
        };
        let position = self.ledger.len() + 1;
        self.log.append(&LogRecord::fine_tune(
            position,
            entry.timestamp,
            entry.voltages,
            &entry.note,
        ))?;
        self.ledger.push(entry.clone());
        spdlog::info!(
            "Fine tune FT{} confirmed: Vgrid {} V, Vanode {} V, Vcathode {} V",
            position,
            grid,
            anode,
            cathode
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScheduleError, SessionLogError};

    fn three_step_schedule() -> VoltageSchedule {
        VoltageSchedule::from_steps(vec![
            StepVoltages::new(0.0, 0.0, 50.0),
            StepVoltages::new(50.0, 50.0, 100.0),
            StepVoltages::new(100.0, 100.0, 150.0),
        ])
        .unwrap()
    }

    fn data_rows(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .skip(6)
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_three_step_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        let path = proc.start_logging("Alice", "").unwrap().unwrap();
        assert_eq!(data_rows(&path).len(), 0);

        assert!(proc.set_flag(1, Channel::Grid, true).unwrap().is_none());
        let event = proc.set_flag(1, Channel::Grid, false).unwrap().unwrap();
        assert_eq!(event.step, 1);
        assert_eq!(event.channel, Channel::Grid);
        assert!(!event.checked);
        assert_eq!(event.voltages, StepVoltages::new(0.0, 0.0, 50.0));
        assert!(proc.set_flag(1, Channel::Grid, false).unwrap().is_none());

        let rows = data_rows(&path);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ends_with(",01,CH3,False,0,0,50,"));

        assert!(proc.stop_logging());
        let before = std::fs::read_to_string(&path).unwrap();
        proc.set_flag(1, Channel::Anode, true).unwrap();
        proc.set_flag(1, Channel::Anode, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_step_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        assert!(matches!(
            proc.set_flag(4, Channel::Grid, true),
            Err(ProcedureError::ScheduleError(ScheduleError::StepOutOfRange(4, 3)))
        ));
    }

    #[test]
    fn test_evaluate_pass_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        let path = proc.start_logging("", "").unwrap().unwrap();
        proc.evaluate_pass().unwrap();
        proc.evaluate_pass().unwrap();
        assert_eq!(proc.flag(2, Channel::Cathode), FlagState::Off);
        assert!(proc.set_flag(2, Channel::Cathode, true).unwrap().is_some());
        proc.evaluate_pass().unwrap();
        assert_eq!(data_rows(&path).len(), 1);
    }

    #[test]
    fn test_note_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        assert!(matches!(
            proc.log_note(1, "hello"),
            Err(ProcedureError::NoActiveSession)
        ));
        let path = proc.start_logging("", "").unwrap().unwrap();
        proc.log_note(2, "spark at 100 V").unwrap();
        let rows = data_rows(&path);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ends_with(",02,NOTE,,50,50,100,spark at 100 V"));
    }

    #[test]
    fn test_fine_tune_gating() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        assert!(!proc.fine_tune_enabled());
        assert!(matches!(
            proc.add_fine_tune(1.0, 1.0, 1.0, ""),
            Err(ProcedureError::EditingDisabled)
        ));
        proc.set_editing(true);
        assert!(matches!(
            proc.add_fine_tune(1.0, 1.0, 1.0, ""),
            Err(ProcedureError::NoActiveSession)
        ));
        proc.start_logging("", "").unwrap();
        assert!(proc.fine_tune_enabled());
        assert!(proc.ledger().is_empty());
    }

    #[test]
    fn test_fine_tune_entries_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        proc.set_editing(true);
        let path = proc.start_logging("", "").unwrap().unwrap();

        let first = proc.add_fine_tune(105.0, 105.0, 160.0, "drift").unwrap();
        assert_eq!(proc.ledger().len(), 1);
        proc.add_fine_tune(110.0, 110.0, 165.0, "").unwrap();
        assert_eq!(proc.ledger().len(), 2);
        assert_eq!(proc.ledger().entries()[0], first);

        let rows = data_rows(&path);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with(",01,FINETUNE,,105,105,160,drift"));
        assert!(rows[1].ends_with(",02,FINETUNE,,110,110,165,"));
    }

    #[test]
    fn test_interleaved_records_keep_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        proc.set_editing(true);
        let path = proc.start_logging("", "").unwrap().unwrap();
        proc.evaluate_pass().unwrap();
        proc.set_flag(1, Channel::Grid, true).unwrap();
        proc.log_note(1, "first").unwrap();
        proc.add_fine_tune(1.0, 2.0, 3.0, "").unwrap();
        proc.set_flag(1, Channel::Grid, false).unwrap();

        let channels: Vec<String> = data_rows(&path)
            .iter()
            .map(|r| r.split(',').nth(2).unwrap().to_string())
            .collect();
        assert_eq!(channels, vec!["CH3", "NOTE", "FINETUNE", "CH3"]);
    }

    #[test]
    fn test_progress_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        assert_eq!(proc.ordered_steps(), vec![1, 2, 3]);
        assert_eq!(proc.next_step(), Some(1));
        for channel in Channel::PROCEDURE_ORDER {
            proc.set_flag(1, channel, true).unwrap();
        }
        assert_eq!(proc.completed_steps(), 1);
        assert_eq!(proc.next_step(), Some(2));

        proc.set_mode(RampMode::RampDown);
        assert_eq!(proc.ordered_steps(), vec![3, 2, 1]);
        assert_eq!(proc.next_step(), Some(3));
    }

    #[test]
    fn test_deleted_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        proc.set_editing(true);
        let path = proc.start_logging("", "").unwrap().unwrap();
        proc.evaluate_pass().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            proc.set_flag(1, Channel::Grid, true),
            Err(ProcedureError::SessionLogError(SessionLogError::IOError(_)))
        ));
        assert!(matches!(
            proc.log_note(1, "lost"),
            Err(ProcedureError::SessionLogError(SessionLogError::IOError(_)))
        ));
        assert!(matches!(
            proc.add_fine_tune(1.0, 2.0, 3.0, ""),
            Err(ProcedureError::SessionLogError(SessionLogError::IOError(_)))
        ));
        // The ledger only grows after a successful write, and the log is not recreated
        assert!(proc.ledger().is_empty());
        assert!(!path.exists());
        assert!(proc.is_logging());
    }

    #[test]
    fn test_replace_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(VoltageSchedule::new(None).unwrap(), dir.path());
        proc.set_mode(RampMode::RampDown);
        proc.set_flag(31, Channel::Grid, true).unwrap();
        proc.replace_schedule(three_step_schedule()).unwrap();
        assert_eq!(proc.schedule().len(), 3);
        assert_eq!(proc.mode(), RampMode::RampDown);
        assert_eq!(proc.flag(1, Channel::Grid), FlagState::Unobserved);
    }

    #[test]
    fn test_schedule_locked_after_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut proc = RampProcedure::new(three_step_schedule(), dir.path());
        proc.set_editing(true);
        proc.start_logging("", "").unwrap();
        proc.add_fine_tune(1.0, 2.0, 3.0, "").unwrap();
        proc.add_fine_tune(4.0, 5.0, 6.0, "").unwrap();
        assert!(proc.stop_logging());

        assert!(matches!(
            proc.replace_schedule(VoltageSchedule::new(None).unwrap()),
            Err(ProcedureError::ScheduleLocked)
        ));
        assert_eq!(proc.schedule().len(), 3);
        assert_eq!(proc.ledger().len(), 2);
    }
}
