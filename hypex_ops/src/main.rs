//! # hypex_ops
//!
//! Part of the hypex_ops crate family.
//!
//! This is the HypeX operations dashboard with a GUI using [egui](https://github.com/emilk/egui).
//!
//! ## Install
//!
//! Use `cargo install --path ./hypex_ops`
//!
//! ## Use
//!
//! To launch the application simply invoke it after it is installed
//!
//! ```bash
//! hypex_ops
//! ```
//!
//! The dashboard has two tabs:
//!
//! - Calculator: DAC / pulse amplitude / electron conversions. Enter the input capacitance
//!   and any one of the values to compute the rest. The VTP fine DAC table for the current
//!   coarse DAC can be exported to CSV; the export runs as a background job shown in the
//!   jobs panel at the bottom of the window.
//! - HV Ramp: the logbook (operator, setup, start/stop logging, notes), the step checklist
//!   and the fine tuning ledger.
//!
//! Configurations (log directory, schedule, calibration) can be saved using File->Save and
//! loaded using File->Open. They are compatible with `hypex_ops_cli`.

mod app;
use app::OpsApp;
use libhypex_ops::config::Config;
use std::path::PathBuf;
use std::sync::Arc;

fn build_file_logger() -> Result<Arc<spdlog::Logger>, spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./hypex_ops.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    Ok(Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    ))
}

/// The program entry point
fn main() {
    // Setup logging to a file
    match build_file_logger() {
        Ok(logger) => spdlog::set_default_logger(logger),
        Err(e) => eprintln!("Could not create the log file, logging to the terminal: {e}"),
    }
    spdlog::info!("Starting HypeX Operations UI");

    let schedule = match Config::default().load_schedule() {
        Ok(s) => s,
        Err(e) => {
            spdlog::error!("Could not load the default voltage schedule: {}", e);
            return;
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("HypeX Operations")
            .with_inner_size(eframe::epaint::vec2(1100.0, 800.0))
            .with_min_inner_size(eframe::epaint::vec2(800.0, 500.0)),
        ..Default::default()
    };
    match eframe::run_native(
        "hypex_ops",
        native_options,
        Box::new(move |cc| Ok(Box::new(OpsApp::new(cc, schedule)))),
    ) {
        Ok(()) => (),
        Err(e) => spdlog::error!("Eframe error: {}", e),
    }
}
