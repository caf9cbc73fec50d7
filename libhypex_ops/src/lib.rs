//! # hypex_ops
//!
//! hypex_ops is the HypeX lab-operations toolkit, written in Rust. It provides the
//! calculators used when calibrating the charge-sensitive front end (DAC codes, test pulse
//! amplitudes, and electron counts) and a guided, checklist driven procedure for ramping
//! the detector high voltage (HV) up and down, with an append-only CSV audit log.
//!
//! The tool never talks to the HV supply. It records what the operator attests to have
//! done, step by step.
//!
//! ## Building & Install
//!
//! To build and install the GUI use `cargo install --path ./hypex_ops` from the top level
//! repository.
//!
//! To build and install the CLI use `cargo install --path ./hypex_ops_cli` from the top
//! level repository.
//!
//! ## HV Ramp Procedure
//!
//! The procedure walks a voltage schedule. Every step of the schedule has a target voltage
//! for each of the three HV channels:
//!
//! - CH3: grid
//! - CH2: anode
//! - CH1: cathode
//!
//! The operator sets the three channels in any order and confirms each one. A step is
//! complete once all three are confirmed. Ramp-Down walks the same schedule in reverse.
//! Checkboxes can only be changed while editing is enabled (HV operation in progress).
//!
//! Every confirmation and un-confirmation is logged, but only while a logging session is
//! running. Sessions are started and stopped explicitly. Operator notes and fine-tuning
//! entries (manual adjustments after the fixed sequence) go to the same log; these two
//! *require* a running session and are refused otherwise.
//!
//! ## Configuration
//!
//! Configurations are YAML files shared by the GUI and the CLI:
//!
//! ```yml
//! log_dir: hv_ramp_logs
//! schedule_path: null
//! capacitance_ff: 3.0
//! thl_slope: 0.078
//! thl_intercept: 1289.0
//! vtp_coarse_dac: 100
//! ```
//!
//! If `schedule_path` is `null`, the bundled 31 step schedule is used.
//!
//! ### Schedule Format
//!
//! A schedule is a CSV file with a header line and one row per step, steps numbered from 1:
//!
//! ```csv
//! step,Vgrid,Vanode,Vcathode
//! 1,0,0,50
//! 2,50,50,100
//! ```
//!
//! ## Output
//!
//! Each logging session writes one file `hv_log_<YYYY-MM-DD_HH-MM-SS>.csv` into the log
//! directory:
//!
//! ```text
//! # HV Ramp Log
//! # Start time: 2024-05-02T14:03:27
//! # Operator(s): Alice Bob
//! # Setup: WGW15-G6 | ArDME8020
//! #
//! timestamp,step,channel,checked,Vgrid,Vanode,Vcathode,Note
//! 2024-05-02T14:05:12,01,CH3,True,0,0,50,
//! 2024-05-02T14:06:40,02,NOTE,,50,50,100,spark on CH1
//! 2024-05-02T15:30:02,01,FINETUNE,,355,355,1330,
//! ```
//!
//! For FINETUNE rows the step column is the number of the fine-tuning entry.
pub mod channel;
pub mod checklist;
pub mod config;
pub mod constants;
pub mod dac_physics;
pub mod error;
pub mod fine_tune;
pub mod jobs;
pub mod procedure;
pub mod schedule;
pub mod session_log;
pub mod timestamp;
