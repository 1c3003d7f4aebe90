/// Experiment configuration.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// num_queries = 2000
/// error_levels = [0.0, 0.5]
///
/// [generator]
/// participation_rate = 0.3
///
/// [generator.query_pattern]
/// skewed = { exponent = 1.1 }
/// ```

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::errors::{AllocError, Result};

/// How the query sequence samples keywords
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPattern {
    /// Every keyword equally likely
    Uniform,
    /// Keyword k drawn with weight 1 / (k+1)^exponent
    Skewed { exponent: f64 },
}

impl Default for QueryPattern {
    fn default() -> Self {
        QueryPattern::Uniform
    }
}

/// Distributions used to draw the advertiser/keyword universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub budget_min: f64,
    pub budget_max: f64,
    pub bid_min: f64,
    pub bid_max: f64,
    /// Relative Gaussian noise added on top of the uniform budget and bid draws
    pub noise_level: f64,
    /// Probability that an (advertiser, keyword) pair bids at all
    pub participation_rate: f64,
    pub query_pattern: QueryPattern,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            budget_min: 10000.0,
            budget_max: 15000.0,
            bid_min: 1.0,
            bid_max: 10.0,
            noise_level: 0.2,
            participation_rate: 1.0,
            query_pattern: QueryPattern::Uniform,
        }
    }
}

/// Knobs shared by all policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Shape s of the tradeoff function φ(f) = 1 - exp(s·(f - 1))
    pub tradeoff_shape: f64,
    /// Optimistic dismisses queries once their keyword exceeded its predicted volume
    pub cap_by_forecast_volume: bool,
    /// Optimistic only serves advertisers holding quota in the offline plan
    pub offline_plan: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            tradeoff_shape: 1.0,
            cap_by_forecast_volume: false,
            offline_plan: false,
        }
    }
}

/// Top-level experiment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub num_advertisers: usize,
    pub num_keywords: usize,
    pub num_queries: usize,
    pub error_levels: Vec<f64>,
    pub alphas: Vec<f64>,
    pub replications: usize,
    pub seed_base: u64,
    pub generator: GeneratorConfig,
    pub policy: PolicyConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_advertisers: 100,
            num_keywords: 100,
            num_queries: 1000,
            error_levels: vec![0.0, 0.25, 0.5],
            alphas: vec![1.0, 2.0, 4.0, 5.0, 10.0],
            replications: 10,
            seed_base: 0,
            generator: GeneratorConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Parse and validate configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: ExperimentConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AllocError::MissingConfig { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path).map_err(|e| AllocError::io(path, e))?;
        Self::from_toml(&content)
    }

    /// Reject configurations that cannot describe a meaningful experiment
    pub fn validate(&self) -> Result<()> {
        if self.num_advertisers == 0 {
            return Err(AllocError::invalid_config("num_advertisers must be at least 1"));
        }
        if self.num_keywords == 0 {
            return Err(AllocError::invalid_config("num_keywords must be at least 1"));
        }
        if self.replications == 0 {
            return Err(AllocError::invalid_config("replications must be at least 1"));
        }
        for &error_level in &self.error_levels {
            if !(0.0..=1.0).contains(&error_level) {
                return Err(AllocError::invalid_config(format!(
                    "error level {} is outside [0, 1]",
                    error_level
                )));
            }
        }
        for &alpha in &self.alphas {
            // NaN fails the comparison too
            if !(alpha > 0.0) {
                return Err(AllocError::invalid_config(format!("alpha {} must be positive", alpha)));
            }
        }
        self.generator.validate()?;
        self.policy.validate()
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("budget", self.budget_min, self.budget_max)?;
        check_range("bid", self.bid_min, self.bid_max)?;
        if !(self.noise_level >= 0.0) || !self.noise_level.is_finite() {
            return Err(AllocError::invalid_config(format!(
                "noise_level {} must be a non-negative number",
                self.noise_level
            )));
        }
        if !(0.0..=1.0).contains(&self.participation_rate) {
            return Err(AllocError::invalid_config(format!(
                "participation_rate {} is outside [0, 1]",
                self.participation_rate
            )));
        }
        if let QueryPattern::Skewed { exponent } = self.query_pattern {
            if !(exponent >= 0.0) || !exponent.is_finite() {
                return Err(AllocError::invalid_config(format!(
                    "skew exponent {} must be a non-negative number",
                    exponent
                )));
            }
        }
        Ok(())
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tradeoff_shape > 0.0) || !self.tradeoff_shape.is_finite() {
            return Err(AllocError::invalid_config(format!(
                "tradeoff_shape {} must be positive",
                self.tradeoff_shape
            )));
        }
        Ok(())
    }
}

fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
        return Err(AllocError::invalid_config(format!(
            "{} range [{}, {}] must be finite, non-negative and non-empty",
            name, min, max
        )));
    }
    Ok(())
}
