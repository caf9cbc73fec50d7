use time::OffsetDateTime;

use super::schedule::StepVoltages;

/// A manual voltage adjustment made after the fixed ramp sequence
#[derive(Debug, Clone, PartialEq)]
pub struct FineTuneEntry {
    pub timestamp: OffsetDateTime,
    pub voltages: StepVoltages,
    pub note: String,
}

/// Ordered, grow-only list of fine-tuning entries.
///
/// Entries are numbered from 1 (FT1, FT2, ...) in the order they were added. There is no
/// way to edit or remove an entry once it is in the ledger.
#[derive(Debug, Clone, Default)]
pub struct FineTuneLedger {
    entries: Vec<FineTuneEntry>,
}

impl FineTuneLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns its 1-based position in the ledger.
    pub fn push(&mut self, entry: FineTuneEntry) -> usize {
        self.entries.push(entry);
        self.entries.len()
    }

    pub fn entries(&self) -> &[FineTuneEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate as (label, entry), e.g. ("FT1", ...)
    pub fn labelled(&self) -> impl Iterator<Item = (String, &FineTuneEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (format!("FT{}", idx + 1), entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn entry(cathode: f64) -> FineTuneEntry {
        FineTuneEntry {
            timestamp: datetime!(2024-05-02 14:03:27 UTC),
            voltages: StepVoltages::new(355.0, 355.0, cathode),
            note: String::new(),
        }
    }

    #[test]
    fn test_ledger_only_grows() {
        let mut ledger = FineTuneLedger::new();
        assert_eq!(ledger.push(entry(1330.0)), 1);
        let first = ledger.entries()[0].clone();
        assert_eq!(ledger.push(entry(1335.0)), 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries()[0], first);
        let labels: Vec<String> = ledger.labelled().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["FT1", "FT2"]);
    }
}
