use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogConfig;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Where the recordings come from
    pub input: InputSettings,

    /// Windowing and phase labelling
    pub analysis: AnalysisSettings,

    /// Output artifact locations
    pub output: OutputSettings,

    /// Logging setup
    pub logging: LogConfig,
}

/// Input file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Merged time-series CSV
    pub data_path: PathBuf,

    /// Optional per-subject body mass / speed CSV
    pub metadata_path: Option<PathBuf>,
}

/// Steady-state analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Trailing steady-state window in seconds
    pub window_s: f64,

    /// Label used for the resting baseline phase
    pub rest_phase: String,

    /// Label used for the exercise phase
    pub run_phase: String,
}

/// Output artifact settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory every artifact is written under
    pub output_dir: PathBuf,

    /// Subject summary file name
    pub summary_file: String,

    /// Regression report file name
    pub regression_file: String,

    /// Render charts
    pub plots: bool,

    /// Chart directory, relative to `output_dir`
    pub plot_dir: PathBuf,
}

impl Default for InputSettings {
    fn default() -> Self {
        InputSettings {
            data_path: PathBuf::from("data/sample_raw_metabolic_data.csv"),
            metadata_path: None,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            window_s: 120.0,
            rest_phase: "rest".to_string(),
            run_phase: "run".to_string(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            output_dir: PathBuf::from("outputs"),
            summary_file: "example_summary.csv".to_string(),
            regression_file: "regression.json".to_string(),
            plots: true,
            plot_dir: PathBuf::from("plots"),
        }
    }
}

impl OutputSettings {
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_file)
    }

    pub fn regression_path(&self) -> PathBuf {
        self.output_dir.join(&self.regression_file)
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(&self.plot_dir)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Explicit path first, then the user config file, then built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Self::default_config_path();
        if default_path.exists() {
            tracing::debug!(path = %default_path.display(), "Loading user config");
            return Self::load(&default_path);
        }

        Ok(Self::default())
    }

    /// `<config dir>/runecon/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runecon")
            .join("config.toml")
    }

    /// Write configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.analysis.window_s.is_finite() && self.analysis.window_s > 0.0) {
            anyhow::bail!(
                "analysis.window_s must be a positive number of seconds, got {}",
                self.analysis.window_s
            );
        }

        let rest = self.analysis.rest_phase.trim();
        let run = self.analysis.run_phase.trim();
        if rest.is_empty() || run.is_empty() {
            anyhow::bail!("Phase labels must not be empty");
        }
        if rest.eq_ignore_ascii_case(run) {
            anyhow::bail!("Rest and run phase labels must differ, both are '{}'", rest);
        }

        if self.output.summary_file.trim().is_empty() {
            anyhow::bail!("output.summary_file must not be empty");
        }
        if self.output.regression_file.trim().is_empty() {
            anyhow::bail!("output.regression_file must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.window_s, 120.0);
        assert_eq!(
            config.output.summary_path(),
            PathBuf::from("outputs/example_summary.csv")
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.analysis.window_s = 90.0;
        config.input.metadata_path = Some(PathBuf::from("meta.csv"));
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[analysis]\nwindow_s = 60.0\n").unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.analysis.window_s, 60.0);
        assert_eq!(loaded.analysis.rest_phase, "rest");
        assert_eq!(loaded.output.summary_file, "example_summary.csv");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = AppConfig::default();
        config.analysis.window_s = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.run_phase = "REST".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.output.summary_file = " ".to_string();
        assert!(config.validate().is_err());
    }
}
