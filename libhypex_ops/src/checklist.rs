use fxhash::FxHashMap;

use super::channel::Channel;
use super::schedule::StepVoltages;

/// Last value seen for a single (step, channel) checkbox.
///
/// A flag starts out Unobserved. The first observation only records the value; every
/// later observation that differs from the recorded one is a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagState {
    #[default]
    Unobserved,
    Off,
    On,
}

impl FlagState {
    fn from_value(value: bool) -> Self {
        if value {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Observe a new value. Returns the next state and whether the observation was a toggle
    pub fn observe(self, value: bool) -> (Self, bool) {
        let next = Self::from_value(value);
        match self {
            Self::Unobserved => (next, false),
            current => (next, current != next),
        }
    }
}

/// A confirmed flag changed value. Carries everything needed to write the log record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToggleEvent {
    pub step: usize,
    pub channel: Channel,
    pub checked: bool,
    pub voltages: StepVoltages,
}

/// Completion of a single step, derived from its three flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    NotStarted,
    Partial(u8),
    Complete,
}

impl StepStatus {
    pub fn from_count(n_on: u8) -> Self {
        match n_on {
            0 => Self::NotStarted,
            1 | 2 => Self::Partial(n_on),
            _ => Self::Complete,
        }
    }

    pub fn n_on(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Partial(n) => *n,
            Self::Complete => 3,
        }
    }

    /// Bulb shown next to the step
    pub fn indicator(&self) -> &'static str {
        match self.n_on() {
            0 => "🔴",
            1 => "🟡",
            2 => "🟠",
            _ => "🟢",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Checklist holds the flag state of every (step, channel) pair the operator has touched
/// and turns value changes into ToggleEvents.
#[derive(Debug, Clone, Default)]
pub struct Checklist {
    flags: FxHashMap<(usize, Channel), FlagState>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value of a flag.
    ///
    /// Returns `Some(ToggleEvent)` only when the value differs from the previously observed
    /// value. The first observation of a flag never produces an event.
    pub fn set_flag(
        &mut self,
        step: usize,
        channel: Channel,
        value: bool,
        voltages: StepVoltages,
    ) -> Option<ToggleEvent> {
        let state = self.flags.entry((step, channel)).or_default();
        let (next, toggled) = state.observe(value);
        *state = next;
        if toggled {
            Some(ToggleEvent {
                step,
                channel,
                checked: value,
                voltages,
            })
        } else {
            None
        }
    }

    /// Current state of a flag
    pub fn flag(&self, step: usize, channel: Channel) -> FlagState {
        self.flags
            .get(&(step, channel))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_checked(&self, step: usize, channel: Channel) -> bool {
        self.flag(step, channel).is_on()
    }

    /// Derived status of a step
    pub fn status(&self, step: usize) -> StepStatus {
        let n_on = Channel::PROCEDURE_ORDER
            .iter()
            .filter(|ch| self.is_checked(step, **ch))
            .count();
        StepStatus::from_count(n_on as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volts() -> StepVoltages {
        StepVoltages::new(0.0, 0.0, 50.0)
    }

    #[test]
    fn test_first_observation_is_silent() {
        let mut list = Checklist::new();
        assert!(list.set_flag(1, Channel::Grid, true, volts()).is_none());
        let mut list = Checklist::new();
        assert!(list.set_flag(1, Channel::Grid, false, volts()).is_none());
    }

    #[test]
    fn test_edge_triggered() {
        let mut list = Checklist::new();
        let events: Vec<Option<ToggleEvent>> = [true, true, false, true]
            .into_iter()
            .map(|v| list.set_flag(4, Channel::Anode, v, volts()))
            .collect();
        assert!(events[0].is_none());
        assert!(events[1].is_none());
        assert_eq!(events[2].map(|e| e.checked), Some(false));
        assert_eq!(events[3].map(|e| e.checked), Some(true));
    }

    #[test]
    fn test_toggles_are_symmetric() {
        let mut list = Checklist::new();
        list.set_flag(2, Channel::Cathode, false, volts());
        let on = list.set_flag(2, Channel::Cathode, true, volts()).unwrap();
        let off = list.set_flag(2, Channel::Cathode, false, volts()).unwrap();
        assert_eq!(on.step, off.step);
        assert_eq!(on.channel, off.channel);
        assert_eq!(on.voltages, off.voltages);
        assert_ne!(on.checked, off.checked);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut list = Checklist::new();
        list.set_flag(1, Channel::Grid, false, volts());
        // A different channel on the same step is a fresh flag
        assert!(list.set_flag(1, Channel::Anode, true, volts()).is_none());
        assert!(list.set_flag(1, Channel::Grid, true, volts()).is_some());
    }

    #[test]
    fn test_step_status() {
        let mut list = Checklist::new();
        assert_eq!(list.status(3), StepStatus::NotStarted);
        list.set_flag(3, Channel::Grid, true, volts());
        assert_eq!(list.status(3), StepStatus::Partial(1));
        list.set_flag(3, Channel::Cathode, true, volts());
        assert_eq!(list.status(3), StepStatus::Partial(2));
        list.set_flag(3, Channel::Anode, true, volts());
        assert!(list.status(3).is_complete());
        assert_eq!(list.status(3).indicator(), "🟢");
        list.set_flag(3, Channel::Anode, false, volts());
        assert_eq!(list.status(3).indicator(), "🟠");
    }
}
