use std::path::PathBuf;
use thiserror::Error;

use super::constants::{VTP_FINE_DAC_MAX, VTP_FINE_DAC_MIN};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Step {0} is outside of the voltage schedule (valid steps are 1 to {1})")]
    StepOutOfRange(usize, usize),
    #[error("VoltageSchedule failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("VoltageSchedule failed to parse a number: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("VoltageSchedule failed to parse a step number: {0}")]
    StepParsingError(#[from] std::num::ParseIntError),
    #[error("VoltageSchedule was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
    #[error("VoltageSchedule expected step {expected} but found step {found}; steps must be listed in order starting from 1")]
    StepOutOfOrder { expected: usize, found: usize },
    #[error("VoltageSchedule must contain at least one step")]
    EmptySchedule,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Found invalid HV channel keyword: {0}")]
    InvalidKeyword(String),
}

#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("SessionLog failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("SessionLog failed to format a timestamp: {0}")]
    TimeFormatError(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("No logging session is active; start logging before writing to the log")]
    NoActiveSession,
    #[error("Editing is disabled; enable editing before changing the procedure")]
    EditingDisabled,
    #[error("The voltage schedule cannot be changed once a logging session has been started or fine tuning entries exist")]
    ScheduleLocked,
    #[error("Procedure failed due to schedule error: {0}")]
    ScheduleError(#[from] ScheduleError),
    #[error("Procedure failed due to SessionLog error: {0}")]
    SessionLogError(#[from] SessionLogError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("Calculated VTP fine DAC value {0} out of range ({min}-{max}), consider changing the VTP coarse DAC value", min=VTP_FINE_DAC_MIN, max=VTP_FINE_DAC_MAX)]
    FineDacOutOfRange(i64),
    #[error("Calculated VTP fine DAC value is not a finite number, check the inputs")]
    NonFiniteFineDac,
    #[error("Input capacitance must be positive, got {0} fF")]
    BadCapacitance(f64),
    #[error("Threshold calibration slope must be non-zero")]
    ZeroSlope,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config failed to load the voltage schedule: {0}")]
    ScheduleError(#[from] ScheduleError),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A job named {0} is already queued or running")]
    AlreadyRunning(String),
    #[error("JobRunner failed to spawn a worker thread: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JobRunner state was poisoned by a panicking job")]
    Poisoned,
}
