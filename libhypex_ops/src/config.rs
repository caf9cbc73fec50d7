use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::dac_physics::CalculatorInputs;
use super::error::ConfigError;
use super::procedure::RampProcedure;
use super::schedule::VoltageSchedule;

/// Structure representing the application configuration. Contains pathing and calibration
/// information. Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_dir: PathBuf,
    pub schedule_path: Option<PathBuf>,
    pub capacitance_ff: f64,
    pub thl_slope: f64,
    pub thl_intercept: f64,
    pub vtp_coarse_dac: i64,
}

impl Default for Config {
    /// Generate a new Config object, using the bundled schedule and the standard calibration
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            schedule_path: None,
            capacitance_ff: DEFAULT_CAPACITANCE_FF,
            thl_slope: DEFAULT_THL_SLOPE,
            thl_intercept: DEFAULT_THL_INTERCEPT,
            vtp_coarse_dac: DEFAULT_VTP_COARSE_DAC,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Load the voltage schedule named by the config (bundled default if None)
    pub fn load_schedule(&self) -> Result<VoltageSchedule, ConfigError> {
        Ok(VoltageSchedule::new(self.schedule_path.as_deref())?)
    }

    /// Build a fresh ramp procedure from this config
    pub fn build_procedure(&self) -> Result<RampProcedure, ConfigError> {
        Ok(RampProcedure::new(self.load_schedule()?, &self.log_dir))
    }

    /// Calculator inputs seeded with the calibration of this config
    pub fn calculator_inputs(&self) -> CalculatorInputs {
        CalculatorInputs {
            capacitance_ff: self.capacitance_ff,
            thl_slope: self.thl_slope,
            thl_intercept: self.thl_intercept,
            vtp_coarse_dac: self.vtp_coarse_dac,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config {
            log_dir: dir.path().join("logs"),
            thl_slope: 0.08,
            ..Default::default()
        };
        config.write_config_file(&path).unwrap();
        assert_eq!(Config::read_config_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "log_dir: /tmp/hv\n").unwrap();
        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/tmp/hv"));
        assert_eq!(config.schedule_path, None);
        assert_eq!(config.vtp_coarse_dac, DEFAULT_VTP_COARSE_DAC);
        assert_eq!(config.load_schedule().unwrap().len(), 31);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/definitely/not/here.yaml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
