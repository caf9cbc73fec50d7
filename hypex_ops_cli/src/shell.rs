use indicatif::ProgressBar;
use std::io::BufRead;
use std::str::FromStr;

use libhypex_ops::channel::Channel;
use libhypex_ops::procedure::{RampMode, RampProcedure, PROCEDURE_RULES};

const HELP: &str = "commands:
  start                          start logging
  stop                           stop logging
  edit on|off                    enable/disable editing (HV operation in progress)
  mode up|down                   Ramp-Up or Ramp-Down
  set <step> <CH1|CH2|CH3> on|off  confirm or clear a channel
  note <step> <text>             write a note to the log
  ft <Vgrid> <Vanode> <Vcathode> [note]  confirm a fine tuning entry
  status                         show the checklist
  fts                            show the fine tuning entries
  quit";

/// A single line typed by the operator
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Edit(bool),
    Mode(RampMode),
    Set(usize, Channel, bool),
    Note(usize, String),
    FineTune(f64, f64, f64, String),
    Status,
    FineTunes,
    Help,
    Quit,
}

fn parse_switch(word: Option<&str>) -> Result<bool, String> {
    match word {
        Some("on") | Some("true") | Some("1") => Ok(true),
        Some("off") | Some("false") | Some("0") => Ok(false),
        _ => Err(String::from("expected on or off")),
    }
}

fn parse_number<T: FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    word.ok_or(format!("missing {what}"))?
        .parse()
        .map_err(|_| format!("invalid {what}"))
}

/// Everything after the first n words, with the original spacing
fn rest_of_line(line: &str, n: usize) -> String {
    let mut rest = line.trim();
    for _ in 0..n {
        rest = match rest.find(char::is_whitespace) {
            Some(idx) => rest[idx..].trim_start(),
            None => "",
        };
    }
    rest.to_string()
}

impl FromStr for Command {
    type Err = String;
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("start") => Ok(Self::Start),
            Some("stop") => Ok(Self::Stop),
            Some("edit") => Ok(Self::Edit(parse_switch(words.next())?)),
            Some("mode") => match words.next() {
                Some("up") => Ok(Self::Mode(RampMode::RampUp)),
                Some("down") => Ok(Self::Mode(RampMode::RampDown)),
                _ => Err(String::from("expected up or down")),
            },
            Some("set") => {
                let step = parse_number(words.next(), "step")?;
                let channel = Channel::from_str(words.next().ok_or("missing channel")?)
                    .map_err(|e| e.to_string())?;
                Ok(Self::Set(step, channel, parse_switch(words.next())?))
            }
            Some("note") => {
                let step = parse_number(words.next(), "step")?;
                Ok(Self::Note(step, rest_of_line(line, 2)))
            }
            Some("ft") => Ok(Self::FineTune(
                parse_number(words.next(), "Vgrid")?,
                parse_number(words.next(), "Vanode")?,
                parse_number(words.next(), "Vcathode")?,
                rest_of_line(line, 4),
            )),
            Some("status") => Ok(Self::Status),
            Some("fts") => Ok(Self::FineTunes),
            Some("help") => Ok(Self::Help),
            Some("quit") | Some("exit") => Ok(Self::Quit),
            Some(other) => Err(format!("unknown command {other}, try help")),
            None => Err(String::from("empty command")),
        }
    }
}

/// Line driven version of the HV ramp page
pub struct RampShell {
    procedure: RampProcedure,
    operator: String,
    setup: String,
    pb: ProgressBar,
}

impl RampShell {
    pub fn new(procedure: RampProcedure, operator: String, setup: String, pb: ProgressBar) -> Self {
        Self {
            procedure,
            operator,
            setup,
            pb,
        }
    }

    /// Read commands until quit or end of input
    pub fn run(&mut self, input: impl BufRead) {
        // First pass observes every checkbox as unchecked
        if let Err(e) = self.procedure.evaluate_pass() {
            log::error!("{e}");
            return;
        }
        log::info!("Rule:");
        for rule in PROCEDURE_RULES {
            log::info!("  - {rule}");
        }
        log::info!("Type help for the list of commands.");

        for line in input.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    log::error!("Failed to read input: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Command::from_str(&line) {
                Ok(Command::Quit) => break,
                Ok(cmd) => self.execute(cmd),
                Err(e) => log::warn!("{e}"),
            }
            self.pb.set_position(self.procedure.completed_steps() as u64);
        }

        if self.procedure.stop_logging() {
            log::info!("Logging stopped.");
        }
    }

    fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Start => match self.procedure.start_logging(&self.operator, &self.setup) {
                Ok(Some(path)) => log::info!("Logging started: {}", path.display()),
                Ok(None) => log::warn!("Logging is already active."),
                Err(e) => log::error!("{e}"),
            },
            Command::Stop => {
                if self.procedure.stop_logging() {
                    log::info!("Logging stopped.");
                } else {
                    log::warn!("Logging is not active.");
                }
            }
            Command::Edit(enabled) => {
                self.procedure.set_editing(enabled);
                log::info!("Editing {}.", if enabled { "enabled" } else { "disabled" });
            }
            Command::Mode(mode) => {
                self.procedure.set_mode(mode);
                self.pb.set_message(mode.label());
                log::info!("Operation mode: {}", mode.label());
            }
            Command::Set(step, channel, value) => {
                // Checkboxes are read-only while editing is off
                if !self.procedure.editing_enabled() {
                    log::warn!("Editing is disabled; use edit on first.");
                    return;
                }
                match self.procedure.set_flag(step, channel, value) {
                    Ok(Some(event)) => log::info!(
                        "Step {:02} {} → {} V {}{}",
                        event.step,
                        event.channel,
                        event.voltages.for_channel(event.channel),
                        if event.checked { "confirmed" } else { "cleared" },
                        if self.procedure.is_logging() { "" } else { " (not logged)" }
                    ),
                    Ok(None) => log::info!("Step {step:02} {channel} unchanged."),
                    Err(e) => log::error!("{e}"),
                }
            }
            Command::Note(step, text) => match self.procedure.log_note(step, &text) {
                Ok(()) => log::info!("Note logged."),
                Err(e) => log::error!("{e}"),
            },
            Command::FineTune(grid, anode, cathode, note) => {
                match self.procedure.add_fine_tune(grid, anode, cathode, &note) {
                    Ok(_) => log::info!("FT{} ✓", self.procedure.ledger().len()),
                    Err(e) => log::error!("{e}"),
                }
            }
            Command::Status => self.print_status(),
            Command::FineTunes => {
                if self.procedure.ledger().is_empty() {
                    log::info!("No fine tuning entries.");
                }
                for (label, entry) in self.procedure.ledger().labelled() {
                    log::info!(
                        "{label} ✓ CH3 {} V | CH2 {} V | CH1 {} V {}",
                        entry.voltages.grid,
                        entry.voltages.anode,
                        entry.voltages.cathode,
                        entry.note
                    );
                }
            }
            Command::Help => log::info!("{HELP}"),
            Command::Quit => (),
        }
    }

    fn print_status(&self) {
        log::info!(
            "{} | logging: {} | editing: {}",
            self.procedure.mode().label(),
            if self.procedure.is_logging() { "on" } else { "off" },
            if self.procedure.editing_enabled() { "on" } else { "off" }
        );
        for step in self.procedure.ordered_steps() {
            let voltages = match self.procedure.target_voltages(step) {
                Ok(v) => v,
                Err(e) => {
                    log::error!("{e}");
                    continue;
                }
            };
            let cells: Vec<String> = Channel::PROCEDURE_ORDER
                .iter()
                .map(|ch| {
                    format!(
                        "[{}] {} {:>5} V",
                        if self.procedure.is_checked(step, *ch) { "x" } else { " " },
                        ch,
                        voltages.for_channel(*ch)
                    )
                })
                .collect();
            log::info!(
                "{step:02}  {}  {}",
                cells.join("  "),
                self.procedure.status(step).indicator()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::from_str("start"), Ok(Command::Start));
        assert_eq!(Command::from_str("edit on"), Ok(Command::Edit(true)));
        assert_eq!(
            Command::from_str("mode down"),
            Ok(Command::Mode(RampMode::RampDown))
        );
        assert_eq!(
            Command::from_str("set 3 CH2 off"),
            Ok(Command::Set(3, Channel::Anode, false))
        );
        assert_eq!(
            Command::from_str("note 12  spark on  CH1"),
            Ok(Command::Note(12, String::from("spark on  CH1")))
        );
        assert_eq!(
            Command::from_str("ft 355 355 1330.5"),
            Ok(Command::FineTune(355.0, 355.0, 1330.5, String::new()))
        );
        assert!(Command::from_str("set x CH2 on").is_err());
        assert!(Command::from_str("set 1 CH5 on").is_err());
        assert!(Command::from_str("launch").is_err());
    }
}
