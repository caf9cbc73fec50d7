// The voltage schedule is the reference table of the ramp procedure. Each row is one step
// and holds the target voltage of all three HV channels. The table differs between
// hardware configurations (31 steps for the standard WGW stack, 63 for the long ramp),
// so it is read from a CSV file, with a bundled default for the standard stack.
//
// Steps are 1-indexed everywhere outside of this module.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::channel::Channel;
use super::error::ScheduleError;

const ENTRIES_PER_LINE: usize = 4; //step, Vgrid, Vanode, Vcathode

/// Load the default schedule for windows
#[cfg(target_family = "windows")]
fn load_default_schedule() -> String {
    String::from(include_str!("data\\default_hv_schedule.csv"))
}

/// Load the default schedule for macos and linux
#[cfg(target_family = "unix")]
fn load_default_schedule() -> String {
    String::from(include_str!("data/default_hv_schedule.csv"))
}

/// The target voltages (in volts) of a single step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepVoltages {
    pub grid: f64,
    pub anode: f64,
    pub cathode: f64,
}

impl StepVoltages {
    pub fn new(grid: f64, anode: f64, cathode: f64) -> Self {
        Self {
            grid,
            anode,
            cathode,
        }
    }

    /// Target voltage of a specific channel
    pub fn for_channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Grid => self.grid,
            Channel::Anode => self.anode,
            Channel::Cathode => self.cathode,
        }
    }
}

/// Ordered, immutable table of target voltages.
///
/// VoltageSchedule reads a CSV file where each row contains 4 elements: the step number
/// followed by the grid (CH3), anode (CH2), and cathode (CH1) voltages.
#[derive(Debug, Clone)]
pub struct VoltageSchedule {
    steps: Vec<StepVoltages>,
}

impl VoltageSchedule {
    /// Create a new VoltageSchedule
    /// If the path is None, we load the default that is bundled with the library
    pub fn new(path: Option<&Path>) -> Result<Self, ScheduleError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_schedule();
        }
        Self::parse(&contents)
    }

    /// Build a schedule directly from a list of steps (first element is step 1)
    pub fn from_steps(steps: Vec<StepVoltages>) -> Result<Self, ScheduleError> {
        if steps.is_empty() {
            return Err(ScheduleError::EmptySchedule);
        }
        let schedule = Self { steps };
        schedule.warn_if_decreasing();
        Ok(schedule)
    }

    fn parse(contents: &str) -> Result<Self, ScheduleError> {
        let mut steps: Vec<StepVoltages> = Vec::new();

        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split(',').map(|e| e.trim()).collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(ScheduleError::BadFileFormat);
            }

            let step: usize = entries[0].parse()?;
            if step != steps.len() + 1 {
                return Err(ScheduleError::StepOutOfOrder {
                    expected: steps.len() + 1,
                    found: step,
                });
            }
            steps.push(StepVoltages::new(
                entries[1].parse()?,
                entries[2].parse()?,
                entries[3].parse()?,
            ));
        }

        Self::from_steps(steps)
    }

    /// The reference tables ramp every channel monotonically. A table that doesn't is
    /// most likely a typo, but it is the operator's table so we only complain about it.
    fn warn_if_decreasing(&self) {
        for (idx, pair) in self.steps.windows(2).enumerate() {
            for channel in Channel::PROCEDURE_ORDER {
                if pair[1].for_channel(channel) < pair[0].for_channel(channel) {
                    spdlog::warn!(
                        "Voltage schedule decreases on {} between step {} and step {}",
                        channel,
                        idx + 1,
                        idx + 2
                    );
                }
            }
        }
    }

    /// Get the target voltages of a step.
    ///
    /// Returns an error if the step is outside of [1, N]
    pub fn target_voltages(&self, step: usize) -> Result<StepVoltages, ScheduleError> {
        if step == 0 || step > self.steps.len() {
            return Err(ScheduleError::StepOutOfRange(step, self.steps.len()));
        }
        Ok(self.steps[step - 1])
    }

    /// Number of steps in the schedule
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate over (step number, voltages) from the first step to the last
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &StepVoltages)> {
        self.steps.iter().enumerate().map(|(idx, v)| (idx + 1, v))
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let schedule = match VoltageSchedule::new(None) {
            Ok(s) => s,
            Err(_) => {
                panic!();
            }
        };
        assert_eq!(schedule.len(), 31);
        assert_eq!(
            schedule.target_voltages(1).unwrap(),
            StepVoltages::new(0.0, 0.0, 50.0)
        );
        assert_eq!(
            schedule.target_voltages(31).unwrap(),
            StepVoltages::new(355.0, 355.0, 1325.0)
        );
    }

    #[test]
    fn test_out_of_range() {
        let schedule = VoltageSchedule::new(None).unwrap();
        assert!(matches!(
            schedule.target_voltages(0),
            Err(ScheduleError::StepOutOfRange(0, 31))
        ));
        assert!(matches!(
            schedule.target_voltages(32),
            Err(ScheduleError::StepOutOfRange(32, 31))
        ));
    }

    #[test]
    fn test_custom_schedule_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        std::fs::write(
            &path,
            "step,Vgrid,Vanode,Vcathode\n1,0,0,50\n2,50,50,100\n3,100,100,150\n",
        )
        .unwrap();
        let schedule = VoltageSchedule::new(Some(&path)).unwrap();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.target_voltages(2).unwrap().for_channel(Channel::Cathode), 100.0);
    }

    #[test]
    fn test_bad_schedule_files() {
        assert!(matches!(
            VoltageSchedule::parse("step,Vgrid,Vanode,Vcathode\n1,0,0\n"),
            Err(ScheduleError::BadFileFormat)
        ));
        // A trailing comma is an extra, empty column
        assert!(matches!(
            VoltageSchedule::parse("step,Vgrid,Vanode,Vcathode\n1,0,0,50,\n"),
            Err(ScheduleError::BadFileFormat)
        ));
        assert!(matches!(
            VoltageSchedule::parse("step,Vgrid,Vanode,Vcathode\n2,0,0,50\n"),
            Err(ScheduleError::StepOutOfOrder {
                expected: 1,
                found: 2
            })
        ));
        assert!(matches!(
            VoltageSchedule::parse("step,Vgrid,Vanode,Vcathode\n"),
            Err(ScheduleError::EmptySchedule)
        ));
    }
}
