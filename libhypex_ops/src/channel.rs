use super::error::ChannelError;
use std::fmt::Display;
use std::str::FromStr;

/// One of the three HV supply lines of the detector.
///
/// The numbering follows the labels on the HV crate, which is why the grid is CH3 even
/// though it is the first column of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Cathode,
    Anode,
    Grid,
}

impl Channel {
    /// The channels in the order the procedure lists them (CH3, CH2, CH1)
    pub const PROCEDURE_ORDER: [Channel; 3] = [Channel::Grid, Channel::Anode, Channel::Cathode];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cathode => "CH1",
            Self::Anode => "CH2",
            Self::Grid => "CH3",
        }
    }

    pub fn electrode(&self) -> &'static str {
        match self {
            Self::Cathode => "Vcathode",
            Self::Anode => "Vanode",
            Self::Grid => "Vgrid",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Channel {
    type Err = ChannelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CH1" | "CATHODE" => Ok(Self::Cathode),
            "CH2" | "ANODE" => Ok(Self::Anode),
            "CH3" | "GRID" => Ok(Self::Grid),
            _ => Err(ChannelError::InvalidKeyword(s.to_string())),
        }
    }
}

/// The channel column of a log record. Besides the three HV channels, operator notes and
/// fine-tuning entries get their own sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChannel {
    Hv(Channel),
    Note,
    FineTune,
}

impl Display for RecordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hv(ch) => write!(f, "{ch}"),
            Self::Note => write!(f, "NOTE"),
            Self::FineTune => write!(f, "FINETUNE"),
        }
    }
}

impl From<Channel> for RecordChannel {
    fn from(value: Channel) -> Self {
        Self::Hv(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_keywords() {
        assert_eq!(Channel::from_str("CH1").unwrap(), Channel::Cathode);
        assert_eq!(Channel::from_str("ch2").unwrap(), Channel::Anode);
        assert_eq!(Channel::from_str("grid").unwrap(), Channel::Grid);
        assert!(Channel::from_str("CH4").is_err());
    }

    #[test]
    fn test_record_channel_labels() {
        assert_eq!(RecordChannel::from(Channel::Grid).to_string(), "CH3");
        assert_eq!(RecordChannel::Note.to_string(), "NOTE");
        assert_eq!(RecordChannel::FineTune.to_string(), "FINETUNE");
    }
}
