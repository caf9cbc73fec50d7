// Physics
pub const E_CHARGE: f64 = 1.602e-19; // Charge of the electron in Coulombs
pub const VTP_DAC_STEP_MV: f64 = 2.5; // Test pulse DAC step in mV
pub const VTP_FINE_DAC_MIN: i64 = 0;
pub const VTP_FINE_DAC_MAX: i64 = 511;

// Calibration defaults for the front end
pub const DEFAULT_CAPACITANCE_FF: f64 = 3.0;
pub const DEFAULT_THL_SLOPE: f64 = 0.078; // THL DAC per electron
pub const DEFAULT_THL_INTERCEPT: f64 = 1289.0; // THL DAC at 0 electrons
pub const DEFAULT_VTP_COARSE_DAC: i64 = 100;

// HV ramp logging
pub const DEFAULT_LOG_DIR: &str = "hv_ramp_logs";
pub const LOG_FILE_PREFIX: &str = "hv_log_";
pub const LOG_FILE_EXTENSION: &str = "csv";
pub const SETUP_LINE_SEPARATOR: &str = " | ";

// Job runner
pub const MAX_JOB_LOG_LINES: usize = 300;
