use crate::compliance::RegulatoryLimits;
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Acceptable range for one ratio. An open upper bound is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BenchmarkBand {
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

impl BenchmarkBand {
    pub fn new(min: f64, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn assess(&self, value: f64) -> RatioAssessment {
        if value < self.min {
            RatioAssessment::BelowBenchmark
        } else if self.max.is_some_and(|max| value > max) {
            RatioAssessment::AboveBenchmark
        } else {
            RatioAssessment::WithinBenchmark
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RatioAssessment {
    #[serde(rename = "Below Benchmark")]
    BelowBenchmark,
    #[serde(rename = "Within Benchmark")]
    WithinBenchmark,
    #[serde(rename = "Above Benchmark")]
    AboveBenchmark,
    #[serde(rename = "No Benchmark")]
    NoBenchmark,
}

impl std::fmt::Display for RatioAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::BelowBenchmark => "Below Benchmark",
            Self::WithinBenchmark => "Within Benchmark",
            Self::AboveBenchmark => "Above Benchmark",
            Self::NoBenchmark => "No Benchmark",
        };
        f.write_str(label)
    }
}

/// Industry benchmark bands keyed by ratio name.
pub fn default_benchmarks() -> BTreeMap<String, BenchmarkBand> {
    [
        ("current_ratio", BenchmarkBand::new(1.5, Some(3.0))),
        ("debt_to_equity", BenchmarkBand::new(0.3, Some(2.0))),
        ("debt_service_ratio", BenchmarkBand::new(1.5, None)),
        ("roe", BenchmarkBand::new(0.15, None)),
        ("roa", BenchmarkBand::new(0.05, None)),
    ]
    .into_iter()
    .map(|(name, band)| (name.to_string(), band))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RiskParameters {
    #[schemars(description = "Annual risk-free rate used by the structural default model (0.10 = 10%)")]
    pub risk_free_rate: f64,

    #[schemars(description = "Annualized volatility of the firm's asset value")]
    pub asset_volatility: f64,

    #[schemars(description = "Horizon of the structural default model in years")]
    pub horizon_years: f64,

    #[schemars(description = "Standard deviation of the multiplicative cash-flow shock per period")]
    pub monte_carlo_volatility: f64,

    pub monte_carlo_periods: usize,

    pub monte_carlo_simulations: usize,

    #[schemars(description = "Seed for the cash-flow simulation. A fixed seed gives identical output on every run.")]
    pub monte_carlo_seed: u64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.10,
            asset_volatility: 0.30,
            horizon_years: 1.0,
            monte_carlo_volatility: 0.15,
            monte_carlo_periods: 12,
            monte_carlo_simulations: 1000,
            monte_carlo_seed: 42,
        }
    }
}

/// Engine-wide settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(
        description = "Benchmark bands keyed by ratio name (current_ratio, debt_to_equity, debt_service_ratio, roe, roa). Ratios without an entry are reported as 'No Benchmark'."
    )]
    pub benchmarks: BTreeMap<String, BenchmarkBand>,

    pub regulatory_limits: RegulatoryLimits,

    pub risk: RiskParameters,

    #[schemars(description = "Number of projected years when the caller does not choose one")]
    pub projection_years: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            benchmarks: default_benchmarks(),
            regulatory_limits: RegulatoryLimits::default(),
            risk: RiskParameters::default(),
            projection_years: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn benchmark(&self, ratio: &str) -> Option<&BenchmarkBand> {
        self.benchmarks.get(ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.projection_years, 5);
        assert_eq!(config.risk.monte_carlo_seed, 42);
        assert_eq!(config.benchmarks.len(), 5);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "projection_years": 3,
            "risk": { "monte_carlo_simulations": 10 },
            "benchmarks": { "current_ratio": { "min": 1.0, "max": 2.0 } }
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.projection_years, 3);
        assert_eq!(config.risk.monte_carlo_simulations, 10);
        assert_eq!(config.risk.monte_carlo_periods, 12);
        assert_eq!(config.benchmarks.len(), 1);
        assert_eq!(config.benchmark("roe"), None);
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, EngineError::SerializationError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, EngineError::IoError(_)));
    }

    #[test]
    fn test_benchmark_band_assessment() {
        let band = BenchmarkBand::new(1.5, Some(3.0));
        assert_eq!(band.assess(1.0), RatioAssessment::BelowBenchmark);
        assert_eq!(band.assess(1.5), RatioAssessment::WithinBenchmark);
        assert_eq!(band.assess(3.0), RatioAssessment::WithinBenchmark);
        assert_eq!(band.assess(3.5), RatioAssessment::AboveBenchmark);

        let open = BenchmarkBand::new(0.05, None);
        assert_eq!(open.assess(100.0), RatioAssessment::WithinBenchmark);
    }

    #[test]
    fn test_assessment_serializes_as_label() {
        let json = serde_json::to_string(&RatioAssessment::NoBenchmark).unwrap();
        assert_eq!(json, "\"No Benchmark\"");
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = EngineConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("benchmarks"));
        assert!(schema_json.contains("regulatory_limits"));
        assert!(schema_json.contains("monte_carlo_seed"));
    }
}
