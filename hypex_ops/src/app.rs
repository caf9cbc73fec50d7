use std::fmt::Display;
use std::path::Path;

use eframe::egui::{Checkbox, Color32, DragValue, RichText};
use rfd::FileDialog;

use libhypex_ops::channel::Channel;
use libhypex_ops::config::Config;
use libhypex_ops::constants::{VTP_DAC_STEP_MV, VTP_FINE_DAC_MAX, VTP_FINE_DAC_MIN};
use libhypex_ops::dac_physics::{self, CalculatorInputs};
use libhypex_ops::jobs::JobRunner;
use libhypex_ops::procedure::{RampMode, RampProcedure, PROCEDURE_RULES};
use libhypex_ops::schedule::VoltageSchedule;

const JOB_LOG_LINES_SHOWN: usize = 15;

fn render_error_dialog(show: &mut bool, message: &str, ctx: &eframe::egui::Context) {
    eframe::egui::Window::new("Error")
        .open(show)
        .show(ctx, |ui| {
            ui.label(message);
            ui.label("Check the log file hypex_ops.log for more information.");
        });
}

fn heading(ui: &mut eframe::egui::Ui, text: &str) {
    ui.label(RichText::new(text).color(Color32::LIGHT_BLUE).size(18.0));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Calculator,
    HvRamp,
}

/// The UI app which inherits the eframe::App trait.
///
/// Owns the ramp procedure; every frame is one evaluation pass over the checklist.
#[derive(Debug)]
pub struct OpsApp {
    config: Config,
    procedure: RampProcedure,
    runner: JobRunner,
    tab: Tab,
    calculator: CalculatorInputs,
    electrons_target: f64,
    fine_dac: i64,
    operator: String,
    setup: String,
    note_step: usize,
    note_text: String,
    ft_grid: f64,
    ft_anode: f64,
    ft_cathode: f64,
    ft_note: String,
    status_message: String,
    error_message: String,
    show_error_window: bool,
}

impl OpsApp {
    /// Create the application
    pub fn new(cc: &eframe::CreationContext<'_>, schedule: VoltageSchedule) -> Self {
        let mut visuals = eframe::egui::Visuals::dark();
        visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        cc.egui_ctx.set_visuals(visuals);
        let config = Config::default();
        OpsApp {
            calculator: config.calculator_inputs(),
            procedure: RampProcedure::new(schedule, &config.log_dir),
            config,
            runner: JobRunner::new(),
            tab: Tab::HvRamp,
            electrons_target: 1000.0,
            fine_dac: 300,
            operator: String::new(),
            setup: String::new(),
            note_step: 1,
            note_text: String::new(),
            ft_grid: 0.0,
            ft_anode: 0.0,
            ft_cathode: 0.0,
            ft_note: String::new(),
            status_message: String::new(),
            error_message: String::new(),
            show_error_window: false,
        }
    }

    fn report_error(&mut self, e: impl Display) {
        spdlog::error!("{}", e);
        self.error_message = e.to_string();
        self.show_error_window = true;
    }

    /// Write the current Config to a file
    fn write_config(&mut self, path: &Path) {
        match self.config.write_config_file(path) {
            Ok(()) => spdlog::info!("Wrote config to {}", path.display()),
            Err(e) => self.report_error(e),
        }
    }

    /// Read the Config from a file.
    ///
    /// A different schedule is only accepted before the first logging session.
    fn read_config(&mut self, path: &Path) {
        let conf = match Config::read_config_file(path) {
            Ok(conf) => conf,
            Err(e) => return self.report_error(e),
        };
        if conf.schedule_path != self.config.schedule_path {
            let schedule = match conf.load_schedule() {
                Ok(s) => s,
                Err(e) => return self.report_error(e),
            };
            if let Err(e) = self.procedure.replace_schedule(schedule) {
                return self.report_error(e);
            }
        }
        self.procedure.set_log_dir(&conf.log_dir);
        self.calculator = CalculatorInputs {
            pulse_height_mv: self.calculator.pulse_height_mv,
            thl_dac: self.calculator.thl_dac,
            ..conf.calculator_inputs()
        };
        self.config = conf;
        spdlog::info!("Loaded config from {}", path.display());
    }

    fn render_menu(&mut self, ui: &mut eframe::egui::Ui) {
        ui.menu_button("File", |ui| {
            if ui.button("Open...").clicked() {
                if let Some(path) = FileDialog::new()
                    .set_directory(std::env::current_dir().unwrap_or_default())
                    .add_filter("YAML file", &["yaml", "yml"])
                    .pick_file()
                {
                    self.read_config(&path);
                }
                ui.close_menu();
            }
            if ui.button("Save...").clicked() {
                if let Some(path) = FileDialog::new()
                    .set_directory(std::env::current_dir().unwrap_or_default())
                    .add_filter("YAML file", &["yaml", "yml"])
                    .save_file()
                {
                    self.write_config(&path);
                }
                ui.close_menu();
            }
        });
    }

    fn render_calculator(&mut self, ui: &mut eframe::egui::Ui) {
        heading(ui, "DAC / Pulse Amplitude / Electrons Converter");
        ui.label("Enter the input capacitance in fF and any one of the values below to compute the rest.");

        eframe::egui::Grid::new("CalculatorInputs").show(ui, |ui| {
            ui.label("Test pulse height [mV]");
            ui.add(DragValue::new(&mut self.calculator.pulse_height_mv).speed(VTP_DAC_STEP_MV));
            ui.label("Input capacitance [fF]");
            ui.add(
                DragValue::new(&mut self.calculator.capacitance_ff)
                    .speed(0.1)
                    .range(0.1..=f64::MAX),
            );
            ui.end_row();

            ui.label("Threshold DAC");
            ui.add(
                DragValue::new(&mut self.calculator.thl_dac)
                    .speed(1)
                    .range(0.0..=2911.0),
            );
            ui.label("VTP coarse DAC");
            ui.add(DragValue::new(&mut self.calculator.vtp_coarse_dac).speed(1));
            ui.end_row();

            ui.label("(THLCalib) Slope [THLDAC/e-]");
            ui.add(DragValue::new(&mut self.calculator.thl_slope).speed(0.001));
            ui.label("(THLCalib) Intercept [THLDAC at 0 e-]");
            ui.add(DragValue::new(&mut self.calculator.thl_intercept).speed(1));
            ui.end_row();
        });

        ui.separator();
        ui.label(RichText::new("Calculated values:").color(Color32::RED));
        let outputs = dac_physics::evaluate(&self.calculator);
        ui.label(format!(
            "Test pulse height {} mV is {:.1} electrons",
            self.calculator.pulse_height_mv, outputs.electrons_from_pulse
        ));
        match outputs.electrons_from_thl {
            Ok(e) => ui.label(format!(
                "THL combined DAC {} is {:.1} electrons",
                self.calculator.thl_dac, e
            )),
            Err(e) => ui.colored_label(Color32::RED, e.to_string()),
        };
        match outputs.vtp_fine_dac_for_pulse {
            Ok(fine) => ui.label(format!(
                "Test pulse height {} mV needs VTP fine DAC {} (coarse {})",
                self.calculator.pulse_height_mv, fine, self.calculator.vtp_coarse_dac
            )),
            Err(e) => ui.colored_label(Color32::RED, e.to_string()),
        };

        ui.separator();
        eframe::egui::Grid::new("CalculatorInverse").show(ui, |ui| {
            ui.label("Electrons");
            ui.add(DragValue::new(&mut self.electrons_target).speed(10));
            ui.end_row();
            ui.label("VTP fine DAC");
            ui.add(DragValue::new(&mut self.fine_dac).speed(1));
            ui.end_row();
        });
        let inputs = self.calculator;
        match dac_physics::electrons_to_pulse_height(self.electrons_target, inputs.capacitance_ff)
        {
            Ok(mv) => ui.label(format!(
                "{} electrons is a test pulse height of {:.2} mV",
                self.electrons_target, mv
            )),
            Err(e) => ui.colored_label(Color32::RED, e.to_string()),
        };
        ui.label(format!(
            "{} electrons is THL DAC {:.1}",
            self.electrons_target,
            dac_physics::electrons_to_threshold_dac(
                self.electrons_target,
                inputs.thl_slope,
                inputs.thl_intercept
            )
        ));
        match dac_physics::electrons_to_test_pulse_fine_dac(
            self.electrons_target,
            inputs.vtp_coarse_dac,
            inputs.capacitance_ff,
        ) {
            Ok(fine) => ui.label(format!(
                "{} electrons is VTP fine DAC {}",
                self.electrons_target, fine
            )),
            Err(e) => ui.colored_label(Color32::RED, e.to_string()),
        };
        match dac_physics::test_pulse_dacs_to_electrons(
            self.fine_dac,
            inputs.vtp_coarse_dac,
            inputs.capacitance_ff,
        ) {
            Ok(e) => ui.label(format!(
                "VTP fine DAC {} with coarse DAC {} is {:.1} electrons",
                self.fine_dac, inputs.vtp_coarse_dac, e
            )),
            Err(e) => ui.colored_label(Color32::RED, e.to_string()),
        };

        ui.separator();
        if ui
            .button(format!(
                "Export VTP fine DAC table ({VTP_FINE_DAC_MIN}-{VTP_FINE_DAC_MAX})"
            ))
            .clicked()
        {
            self.start_table_export();
        }
    }

    /// Writing the table is a background job so the UI keeps running
    fn start_table_export(&mut self) {
        let Some(path) = FileDialog::new()
            .set_directory(std::env::current_dir().unwrap_or_default())
            .add_filter("CSV file", &["csv"])
            .set_file_name(format!("vtp_table_coarse{}.csv", self.calculator.vtp_coarse_dac))
            .save_file()
        else {
            return;
        };
        let coarse = self.calculator.vtp_coarse_dac;
        let capacitance = self.calculator.capacitance_ff;
        let result = self.runner.start("vtp_table_export", move || {
            dac_physics::export_fine_dac_table(&path, coarse, capacitance)
                .map(|rows| format!("{rows} rows written to {}", path.display()))
        });
        if let Err(e) = result {
            self.report_error(e);
        }
    }

    fn render_logbook(&mut self, ui: &mut eframe::egui::Ui) {
        heading(ui, "HV Ramp Logbook");
        eframe::egui::Grid::new("LogbookGrid").show(ui, |ui| {
            ui.label("Operator name(s)");
            ui.add(
                eframe::egui::TextEdit::singleline(&mut self.operator)
                    .hint_text("Ex: Alice Bob, Dinkan Pankila"),
            );
            ui.end_row();
            ui.label("Setup info");
            ui.add(
                eframe::egui::TextEdit::multiline(&mut self.setup)
                    .hint_text("Ex: WGW15-G6|ArDME8020|160-40gcmm|1.1Bar")
                    .desired_rows(3),
            );
            ui.end_row();
            ui.label(format!("Log directory: {}", self.procedure.log_dir().display()));
            if ui
                .add_enabled(!self.procedure.is_logging(), eframe::egui::Button::new("Open..."))
                .clicked()
            {
                if let Some(path) = FileDialog::new()
                    .set_directory(std::env::current_dir().unwrap_or_default())
                    .pick_folder()
                {
                    self.procedure.set_log_dir(&path);
                    self.config.log_dir = path;
                }
            }
            ui.end_row();
        });

        ui.horizontal(|ui| {
            // Start is only possible when nothing is being logged, and the other way around
            if ui
                .add_enabled(
                    !self.procedure.is_logging(),
                    eframe::egui::Button::new("▶ Start logging"),
                )
                .clicked()
            {
                match self.procedure.start_logging(&self.operator, &self.setup) {
                    Ok(Some(path)) => {
                        self.status_message = format!("Logging started: {}", path.display())
                    }
                    Ok(None) => (),
                    Err(e) => self.report_error(e),
                }
            }
            if ui
                .add_enabled(
                    self.procedure.is_logging(),
                    eframe::egui::Button::new("■ Stop logging"),
                )
                .clicked()
                && self.procedure.stop_logging()
            {
                self.status_message = String::from("Logging stopped");
            }
        });
        if !self.status_message.is_empty() {
            ui.colored_label(Color32::LIGHT_GREEN, &self.status_message);
        }

        ui.horizontal(|ui| {
            ui.label("Note for step");
            let n_steps = self.procedure.schedule().len();
            ui.add(
                DragValue::new(&mut self.note_step)
                    .speed(1)
                    .range(1..=n_steps),
            );
            ui.text_edit_singleline(&mut self.note_text);
            if ui.button("Log note").clicked() {
                match self.procedure.log_note(self.note_step, &self.note_text) {
                    Ok(()) => self.note_text.clear(),
                    Err(e) => self.report_error(e),
                }
            }
        });
    }

    fn render_procedure(&mut self, ui: &mut eframe::egui::Ui) {
        heading(ui, "HV Ramp Procedure");

        let mut editing = self.procedure.editing_enabled();
        ui.checkbox(&mut editing, "🔓 Enable editing (HV operation in progress)");
        self.procedure.set_editing(editing);

        let mut mode = self.procedure.mode();
        ui.horizontal(|ui| {
            ui.label("Operation mode");
            ui.radio_value(&mut mode, RampMode::RampUp, RampMode::RampUp.label());
            ui.radio_value(&mut mode, RampMode::RampDown, RampMode::RampDown.label());
        });
        self.procedure.set_mode(mode);

        ui.label(RichText::new("Rule:").strong());
        for rule in PROCEDURE_RULES {
            ui.label(format!("- {rule}"));
        }
        ui.label(format!(
            "Completed steps: {} / {}{}",
            self.procedure.completed_steps(),
            self.procedure.schedule().len(),
            match self.procedure.next_step() {
                Some(step) => format!(", next step {step:02}"),
                None => String::from(", procedure complete"),
            }
        ));
        ui.separator();

        let steps = self.procedure.ordered_steps();
        eframe::egui::Grid::new("StepGrid")
            .striped(true)
            .show(ui, |ui| {
                ui.label(RichText::new("Step").strong());
                for channel in Channel::PROCEDURE_ORDER {
                    ui.label(
                        RichText::new(format!("{} ({})", channel, channel.electrode()))
                            .strong(),
                    );
                }
                ui.label(RichText::new("State").strong());
                ui.end_row();

                for step in steps {
                    let voltages = match self.procedure.target_voltages(step) {
                        Ok(v) => v,
                        Err(e) => {
                            self.report_error(e);
                            continue;
                        }
                    };
                    ui.label(RichText::new(format!("{step:02}")).strong());
                    for channel in Channel::PROCEDURE_ORDER {
                        let mut checked = self.procedure.is_checked(step, channel);
                        ui.add_enabled(
                            editing,
                            Checkbox::new(
                                &mut checked,
                                format!(
                                    "{} → {} V",
                                    channel,
                                    voltages.for_channel(channel)
                                ),
                            ),
                        );
                        if let Err(e) = self.procedure.set_flag(step, channel, checked) {
                            self.report_error(e);
                        }
                    }
                    ui.label(
                        RichText::new(self.procedure.status(step).indicator()).size(18.0),
                    );
                    ui.end_row();
                }
            });
    }

    fn render_fine_tune(&mut self, ui: &mut eframe::egui::Ui) {
        ui.separator();
        heading(ui, "Fine tuning");
        let enabled = self.procedure.fine_tune_enabled();
        if !enabled {
            ui.label("Fine tuning requires editing to be enabled and an active logging session.");
        }
        ui.add_enabled_ui(enabled, |ui| {
            ui.horizontal(|ui| {
                ui.label("CH3 Vgrid [V]");
                ui.add(DragValue::new(&mut self.ft_grid).speed(1));
                ui.label("CH2 Vanode [V]");
                ui.add(DragValue::new(&mut self.ft_anode).speed(1));
                ui.label("CH1 Vcathode [V]");
                ui.add(DragValue::new(&mut self.ft_cathode).speed(1));
            });
            ui.horizontal(|ui| {
                ui.label("Note");
                ui.text_edit_singleline(&mut self.ft_note);
                if ui.button("Confirm").clicked() {
                    match self.procedure.add_fine_tune(
                        self.ft_grid,
                        self.ft_anode,
                        self.ft_cathode,
                        &self.ft_note,
                    ) {
                        Ok(_) => self.ft_note.clear(),
                        Err(e) => self.report_error(e),
                    }
                }
            });
        });
        for (label, entry) in self.procedure.ledger().labelled() {
            ui.label(format!(
                "{label} ✓  CH3 {} V | CH2 {} V | CH1 {} V  {}",
                entry.voltages.grid, entry.voltages.anode, entry.voltages.cathode, entry.note
            ));
        }
    }

    fn render_jobs(&mut self, ui: &mut eframe::egui::Ui) {
        self.runner.reap();
        eframe::egui::CollapsingHeader::new("Background Jobs & Logs")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(RichText::new("Jobs").strong());
                match self.runner.jobs() {
                    Ok(jobs) if jobs.is_empty() => {
                        ui.label("No jobs running.");
                    }
                    Ok(jobs) => {
                        for (name, info) in jobs.iter() {
                            ui.label(format!("{name} → {}", info.status.label()));
                        }
                    }
                    Err(e) => {
                        ui.colored_label(Color32::RED, e.to_string());
                    }
                }
                ui.label(RichText::new("Logs").strong());
                match self.runner.logs() {
                    Ok(logs) if logs.is_empty() => {
                        ui.label("No logs yet.");
                    }
                    Ok(logs) => {
                        let start = logs.len().saturating_sub(JOB_LOG_LINES_SHOWN);
                        ui.code(logs[start..].join("\n"));
                    }
                    Err(e) => {
                        ui.colored_label(Color32::RED, e.to_string());
                    }
                }
            });
    }
}

impl eframe::App for OpsApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        render_error_dialog(&mut self.show_error_window, &self.error_message, ctx);
        eframe::egui::TopBottomPanel::bottom("JobsPanel").show(ctx, |ui| {
            self.render_jobs(ui);
        });
        eframe::egui::CentralPanel::default().show(ctx, |ui| {
            //Menus
            self.render_menu(ui);
            ui.separator();

            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::Calculator, "Calculator");
                ui.selectable_value(&mut self.tab, Tab::HvRamp, "HV Ramp-Up/Down procedure");
            });
            ui.separator();

            let tab = self.tab;
            match tab {
                Tab::Calculator => self.render_calculator(ui),
                Tab::HvRamp => {
                    eframe::egui::ScrollArea::vertical()
                        .id_source("HvRampScroll")
                        .show(ui, |ui| {
                            self.render_logbook(ui);
                            ui.separator();
                            self.render_procedure(ui);
                            self.render_fine_tune(ui);
                        });
                }
            }
        });

        // Jobs finish in the background
        if self.runner.any_alive() {
            ctx.request_repaint_after(std::time::Duration::from_millis(500));
        }
    }
}
