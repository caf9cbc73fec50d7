//! DAC / pulse amplitude / electron conversions for the charge-sensitive front end.
//!
//! All conversion functions are pure. Voltages are in mV, capacitances in fF.
use std::io::Write;
use std::path::Path;

use super::constants::*;
use super::error::ConversionError;

fn check_capacitance(capacitance_ff: f64) -> Result<(), ConversionError> {
    if capacitance_ff > 0.0 {
        Ok(())
    } else {
        Err(ConversionError::BadCapacitance(capacitance_ff))
    }
}

fn check_fine_dac(fine_dac: i64) -> Result<i64, ConversionError> {
    if (VTP_FINE_DAC_MIN..=VTP_FINE_DAC_MAX).contains(&fine_dac) {
        Ok(fine_dac)
    } else {
        Err(ConversionError::FineDacOutOfRange(fine_dac))
    }
}

/// Convert a test pulse height (mV) on an input capacitance (fF) to a number of electrons
pub fn pulse_height_to_electrons(height_mv: f64, capacitance_ff: f64) -> f64 {
    let height_v = height_mv * 1e-3;
    let capacitance_f = capacitance_ff * 1e-15;
    (height_v * capacitance_f) / E_CHARGE
}

/// Convert a number of electrons on an input capacitance (fF) to a test pulse height (mV)
pub fn electrons_to_pulse_height(
    electrons: f64,
    capacitance_ff: f64,
) -> Result<f64, ConversionError> {
    check_capacitance(capacitance_ff)?;
    let capacitance_f = capacitance_ff * 1e-15;
    let height_v = (electrons * E_CHARGE) / capacitance_f;
    Ok(height_v * 1e3)
}

/// Convert a threshold (THL) DAC value to a number of electrons using the calibration
pub fn threshold_dac_to_electrons(
    dac_value: f64,
    slope: f64,
    intercept: f64,
) -> Result<f64, ConversionError> {
    if slope == 0.0 {
        return Err(ConversionError::ZeroSlope);
    }
    Ok((dac_value - intercept) / slope)
}

/// Convert a number of electrons to a threshold (THL) DAC value using the calibration
pub fn electrons_to_threshold_dac(electrons: f64, slope: f64, intercept: f64) -> f64 {
    electrons * slope + intercept
}

/// Convert the VTP fine and coarse DAC codes to a number of electrons.
///
/// The fine DAC is a 9-bit code; anything outside of 0-511 is rejected.
pub fn test_pulse_dacs_to_electrons(
    fine_dac: i64,
    coarse_dac: i64,
    capacitance_ff: f64,
) -> Result<f64, ConversionError> {
    check_fine_dac(fine_dac)?;
    let total_mv =
        (fine_dac as f64 * VTP_DAC_STEP_MV) - (coarse_dac as f64 * 2.0 * VTP_DAC_STEP_MV);
    Ok(pulse_height_to_electrons(total_mv, capacitance_ff))
}

/// Convert a number of electrons to the VTP fine DAC code for a given coarse DAC code.
///
/// Fails if the required fine code does not fit in 0-511; a different coarse code is
/// needed in that case.
pub fn electrons_to_test_pulse_fine_dac(
    electrons: f64,
    coarse_dac: i64,
    capacitance_ff: f64,
) -> Result<i64, ConversionError> {
    let total_mv = electrons_to_pulse_height(electrons, capacitance_ff)?;
    let fine = (total_mv + (coarse_dac as f64 * 2.0 * VTP_DAC_STEP_MV)) / VTP_DAC_STEP_MV;
    // NaN would otherwise cast to 0 and pass the range check
    if !fine.is_finite() {
        return Err(ConversionError::NonFiniteFineDac);
    }
    check_fine_dac(fine.round_ties_even() as i64)
}

/// Everything the operator types into the calculator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculatorInputs {
    pub pulse_height_mv: f64,
    pub capacitance_ff: f64,
    pub thl_dac: f64,
    pub thl_slope: f64,
    pub thl_intercept: f64,
    pub vtp_coarse_dac: i64,
}

impl Default for CalculatorInputs {
    fn default() -> Self {
        Self {
            pulse_height_mv: 10.0,
            capacitance_ff: DEFAULT_CAPACITANCE_FF,
            thl_dac: 1500.0,
            thl_slope: DEFAULT_THL_SLOPE,
            thl_intercept: DEFAULT_THL_INTERCEPT,
            vtp_coarse_dac: DEFAULT_VTP_COARSE_DAC,
        }
    }
}

/// Derived values shown by the calculator
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorOutputs {
    pub electrons_from_pulse: f64,
    pub electrons_from_thl: Result<f64, ConversionError>,
    pub vtp_fine_dac_for_pulse: Result<i64, ConversionError>,
}

/// Evaluate every conversion for one set of calculator inputs
pub fn evaluate(inputs: &CalculatorInputs) -> CalculatorOutputs {
    let electrons_from_pulse =
        pulse_height_to_electrons(inputs.pulse_height_mv, inputs.capacitance_ff);
    CalculatorOutputs {
        electrons_from_pulse,
        electrons_from_thl: threshold_dac_to_electrons(
            inputs.thl_dac,
            inputs.thl_slope,
            inputs.thl_intercept,
        ),
        vtp_fine_dac_for_pulse: electrons_to_test_pulse_fine_dac(
            electrons_from_pulse,
            inputs.vtp_coarse_dac,
            inputs.capacitance_ff,
        ),
    }
}

/// Electron count for every valid fine DAC code at a given coarse code
pub fn fine_dac_table(coarse_dac: i64, capacitance_ff: f64) -> Vec<(i64, f64)> {
    (VTP_FINE_DAC_MIN..=VTP_FINE_DAC_MAX)
        .filter_map(|fine| {
            test_pulse_dacs_to_electrons(fine, coarse_dac, capacitance_ff)
                .ok()
                .map(|electrons| (fine, electrons))
        })
        .collect()
}

/// Write the fine DAC table for a coarse code to a CSV file. Returns the number of rows.
pub fn export_fine_dac_table(
    path: &Path,
    coarse_dac: i64,
    capacitance_ff: f64,
) -> Result<usize, std::io::Error> {
    let table = fine_dac_table(coarse_dac, capacitance_ff);
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# VTP coarse DAC: {coarse_dac}, capacitance: {capacitance_ff} fF")?;
    writeln!(file, "fine_dac,pulse_mV,electrons")?;
    for (fine, electrons) in table.iter() {
        let pulse_mv =
            (*fine as f64 * VTP_DAC_STEP_MV) - (coarse_dac as f64 * 2.0 * VTP_DAC_STEP_MV);
        writeln!(file, "{fine},{pulse_mv},{electrons:.1}")?;
    }
    Ok(table.len())
}
