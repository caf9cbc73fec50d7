//! # hypex_ops_cli
//!
//! Part of the hypex_ops crate family.
//!
//! Command line access to the HypeX operations tools.
//!
//! ```bash
//! hypex_ops_cli -p config.yaml new              # write a template configuration
//! hypex_ops_cli -p config.yaml schedule         # print the voltage schedule
//! hypex_ops_cli convert --pulse-mv 10           # calculator
//! hypex_ops_cli convert --table vtp_table.csv   # export the VTP fine DAC table
//! hypex_ops_cli ramp --operator "Alice Bob" --setup "WGW15-G6|ArDME8020"
//! ```
//!
//! The config path is optional for everything except `new`; defaults are used without it.
mod shell;

use clap::{value_parser, Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};

use libhypex_ops::config::Config;
use libhypex_ops::dac_physics;
use libhypex_ops::jobs::JobRunner;
use shell::RampShell;

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("{e}"),
    }
}

fn load_config(path: Option<&PathBuf>) -> Option<Config> {
    let Some(path) = path else {
        log::info!("No config given, using defaults.");
        return Some(Config::default());
    };
    log::info!("Loading config from {}...", path.to_string_lossy());
    match Config::read_config_file(path) {
        Ok(c) => {
            log::info!("Config successfully loaded.");
            Some(c)
        }
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}

fn print_schedule(config: &Config) {
    let schedule = match config.load_schedule() {
        Ok(s) => s,
        Err(e) => return log::error!("{e}"),
    };
    log::info!("Step   Vgrid(CH3)  Vanode(CH2)  Vcathode(CH1)");
    for (step, v) in schedule.iter() {
        log::info!(
            "{step:02}     {:>10}  {:>11}  {:>13}",
            v.grid,
            v.anode,
            v.cathode
        );
    }
}

fn run_convert(config: &Config, matches: &clap::ArgMatches, pb_manager: &MultiProgress) {
    let mut inputs = config.calculator_inputs();
    if let Some(c) = matches.get_one::<f64>("capacitance") {
        inputs.capacitance_ff = *c;
    }
    if let Some(coarse) = matches.get_one::<i64>("coarse") {
        inputs.vtp_coarse_dac = *coarse;
    }
    log::info!(
        "Capacitance: {} fF, THL calibration: {} THLDAC/e- at intercept {}, VTP coarse DAC: {}",
        inputs.capacitance_ff,
        inputs.thl_slope,
        inputs.thl_intercept,
        inputs.vtp_coarse_dac
    );

    if let Some(mv) = matches.get_one::<f64>("pulse-mv") {
        log::info!(
            "Test pulse height {mv} mV is {:.1} electrons",
            dac_physics::pulse_height_to_electrons(*mv, inputs.capacitance_ff)
        );
    }
    if let Some(dac) = matches.get_one::<f64>("thl-dac") {
        match dac_physics::threshold_dac_to_electrons(*dac, inputs.thl_slope, inputs.thl_intercept)
        {
            Ok(e) => log::info!("THL combined DAC {dac} is {e:.1} electrons"),
            Err(e) => log::error!("{e}"),
        }
    }
    if let Some(fine) = matches.get_one::<i64>("fine-dac") {
        match dac_physics::test_pulse_dacs_to_electrons(
            *fine,
            inputs.vtp_coarse_dac,
            inputs.capacitance_ff,
        ) {
            Ok(e) => log::info!(
                "VTP fine DAC {fine} with coarse DAC {} is {e:.1} electrons",
                inputs.vtp_coarse_dac
            ),
            Err(e) => log::error!("{e}"),
        }
    }
    if let Some(electrons) = matches.get_one::<f64>("electrons") {
        match dac_physics::electrons_to_pulse_height(*electrons, inputs.capacitance_ff) {
            Ok(mv) => log::info!("{electrons} electrons is a test pulse height of {mv:.2} mV"),
            Err(e) => log::error!("{e}"),
        }
        log::info!(
            "{electrons} electrons is THL DAC {:.1}",
            dac_physics::electrons_to_threshold_dac(
                *electrons,
                inputs.thl_slope,
                inputs.thl_intercept
            )
        );
        match dac_physics::electrons_to_test_pulse_fine_dac(
            *electrons,
            inputs.vtp_coarse_dac,
            inputs.capacitance_ff,
        ) {
            Ok(fine) => log::info!("{electrons} electrons is VTP fine DAC {fine}"),
            Err(e) => log::error!("{e}"),
        }
    }

    if let Some(table_path) = matches.get_one::<PathBuf>("table") {
        let path = table_path.clone();
        let mut runner = JobRunner::new();
        let spinner = pb_manager.add(ProgressBar::new_spinner());
        spinner.set_message("Exporting VTP fine DAC table...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        if let Err(e) = runner.start("vtp_table_export", move || {
            dac_physics::export_fine_dac_table(&path, inputs.vtp_coarse_dac, inputs.capacitance_ff)
                .map(|rows| format!("{rows} rows written to {}", path.display()))
        }) {
            log::error!("{e}");
        }
        runner.wait_all();
        spinner.finish_and_clear();
        match runner.logs() {
            Ok(logs) => logs.iter().for_each(|l| log::info!("{l}")),
            Err(e) => log::error!("{e}"),
        }
        if let Ok(jobs) = runner.jobs() {
            for (name, info) in jobs.iter() {
                if let Some(result) = &info.result {
                    log::info!("{name}: {result}");
                }
            }
        }
    }
}

fn run_ramp(config: &Config, matches: &clap::ArgMatches, pb_manager: &MultiProgress) {
    let procedure = match config.build_procedure() {
        Ok(p) => p,
        Err(e) => return log::error!("{e}"),
    };
    let operator = matches
        .get_one::<String>("operator")
        .cloned()
        .unwrap_or_default();
    let setup = matches
        .get_one::<String>("setup")
        .cloned()
        .unwrap_or_default();
    log::info!("Log directory: {}", config.log_dir.to_string_lossy());
    log::info!("Steps in schedule: {}", procedure.schedule().len());

    let pb = pb_manager.add(ProgressBar::new(procedure.schedule().len() as u64));
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} steps complete")
    {
        pb.set_style(style);
    }
    pb.set_message(procedure.mode().label());

    let mut shell = RampShell::new(procedure, operator, setup, pb.clone());
    shell.run(std::io::stdin().lock());
    pb.finish();
}

fn main() {
    // Create a cli
    let matches = Command::new("hypex_ops_cli")
        .arg_required_else_help(true)
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the configuration file"),
        )
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("schedule").about("Print the HV voltage schedule"))
        .subcommand(
            Command::new("convert")
                .about("DAC / pulse amplitude / electrons calculator")
                .arg(Arg::new("pulse-mv").long("pulse-mv").value_parser(value_parser!(f64)).help("Test pulse height [mV]"))
                .arg(Arg::new("thl-dac").long("thl-dac").value_parser(value_parser!(f64)).help("Threshold DAC"))
                .arg(Arg::new("fine-dac").long("fine-dac").value_parser(value_parser!(i64)).help("VTP fine DAC"))
                .arg(Arg::new("electrons").long("electrons").value_parser(value_parser!(f64)).help("Number of electrons"))
                .arg(Arg::new("capacitance").long("capacitance").value_parser(value_parser!(f64)).help("Input capacitance [fF], overrides the config"))
                .arg(Arg::new("coarse").long("coarse").value_parser(value_parser!(i64)).help("VTP coarse DAC, overrides the config"))
                .arg(Arg::new("table").long("table").value_parser(value_parser!(PathBuf)).help("Export the VTP fine DAC table to this CSV file")),
        )
        .subcommand(
            Command::new("ramp")
                .about("Run the HV ramp procedure interactively")
                .arg(Arg::new("operator").long("operator").help("Operator name(s)"))
                .arg(Arg::new("setup").long("setup").help("Setup info")),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // The library reports through spdlog; only let it through when something is wrong
    spdlog::default_logger()
        .set_level_filter(spdlog::LevelFilter::MoreSevereEqual(spdlog::Level::Warn));

    let config_path = matches.get_one::<PathBuf>("path");

    match matches.subcommand() {
        Some(("new", _)) => {
            let Some(path) = config_path else {
                return log::error!("new requires a config path (-p)");
            };
            log::info!("Making a template config at {}...", path.to_string_lossy());
            make_template_config(path);
        }
        Some(("schedule", _)) => {
            if let Some(config) = load_config(config_path) {
                print_schedule(&config);
            }
        }
        Some(("convert", sub)) => {
            if let Some(config) = load_config(config_path) {
                run_convert(&config, sub, &pb_manager);
            }
        }
        Some(("ramp", sub)) => {
            if let Some(config) = load_config(config_path) {
                run_ramp(&config, sub, &pb_manager);
            }
        }
        _ => log::error!("Unknown command, see --help"),
    }
}
