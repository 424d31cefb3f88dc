use crate::config::{default_benchmarks, BenchmarkBand, EngineConfig, RatioAssessment};
use crate::projections::{BalanceProjection, IncomeProjection};
use crate::schema::{Metric, MetricSet};
use crate::utils::ratio_or_zero;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Ratio {
    CurrentRatio,
    #[schemars(description = "Same as the current ratio: inventory is not subtracted")]
    QuickRatio,
    ReturnOnAssets,
    ReturnOnEquity,
    NetProfitMargin,
    DebtToEquity,
    DebtToAssets,
    AssetTurnover,
    ReceivablesTurnover,
}

impl Ratio {
    pub const ALL: [Ratio; 9] = [
        Ratio::CurrentRatio,
        Ratio::QuickRatio,
        Ratio::ReturnOnAssets,
        Ratio::ReturnOnEquity,
        Ratio::NetProfitMargin,
        Ratio::DebtToEquity,
        Ratio::DebtToAssets,
        Ratio::AssetTurnover,
        Ratio::ReceivablesTurnover,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Ratio::CurrentRatio => "current_ratio",
            Ratio::QuickRatio => "quick_ratio",
            Ratio::ReturnOnAssets => "return_on_assets",
            Ratio::ReturnOnEquity => "return_on_equity",
            Ratio::NetProfitMargin => "net_profit_margin",
            Ratio::DebtToEquity => "debt_to_equity",
            Ratio::DebtToAssets => "debt_to_assets",
            Ratio::AssetTurnover => "asset_turnover",
            Ratio::ReceivablesTurnover => "receivables_turnover",
        }
    }

    /// Computes this ratio from one period's metrics. A non-positive
    /// denominator yields 0.0.
    pub fn compute(&self, m: &MetricSet) -> f64 {
        let v = |metric| m.value(metric);
        match self {
            Ratio::CurrentRatio | Ratio::QuickRatio => {
                ratio_or_zero(v(Metric::CurrentAssets), v(Metric::CurrentLiabilities))
            }
            Ratio::ReturnOnAssets => ratio_or_zero(v(Metric::NetIncome), v(Metric::TotalAssets)),
            Ratio::ReturnOnEquity => ratio_or_zero(v(Metric::NetIncome), v(Metric::Equity)),
            Ratio::NetProfitMargin => ratio_or_zero(v(Metric::NetIncome), v(Metric::Revenue)),
            Ratio::DebtToEquity => ratio_or_zero(v(Metric::TotalLiabilities), v(Metric::Equity)),
            Ratio::DebtToAssets => {
                ratio_or_zero(v(Metric::TotalLiabilities), v(Metric::TotalAssets))
            }
            Ratio::AssetTurnover => ratio_or_zero(v(Metric::Revenue), v(Metric::TotalAssets)),
            Ratio::ReceivablesTurnover => {
                ratio_or_zero(v(Metric::Revenue), v(Metric::AccountsReceivable))
            }
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ratio values with a benchmark assessment for each, keyed identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioBundle {
    pub values: BTreeMap<Ratio, f64>,
    pub assessments: BTreeMap<Ratio, RatioAssessment>,
}

impl RatioBundle {
    pub fn get(&self, ratio: Ratio) -> Option<f64> {
        self.values.get(&ratio).copied()
    }

    pub fn value(&self, ratio: Ratio) -> f64 {
        self.get(ratio).unwrap_or(0.0)
    }

    pub fn assessment(&self, ratio: Ratio) -> Option<RatioAssessment> {
        self.assessments.get(&ratio).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YearRatios {
    pub year: u32,
    pub ratios: RatioBundle,
}

pub struct RatioAnalyzer {
    industry: String,
    benchmarks: BTreeMap<String, BenchmarkBand>,
}

impl RatioAnalyzer {
    pub fn new(industry: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            benchmarks: default_benchmarks(),
        }
    }

    pub fn with_config(industry: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            industry: industry.into(),
            benchmarks: config.benchmarks.clone(),
        }
    }

    /// Carried for segmentation; no formula depends on it yet.
    pub fn industry(&self) -> &str {
        &self.industry
    }

    pub fn analyze(&self, metrics: &MetricSet) -> RatioBundle {
        let values: BTreeMap<Ratio, f64> = Ratio::ALL
            .iter()
            .map(|ratio| (*ratio, ratio.compute(metrics)))
            .collect();
        let assessments = values
            .iter()
            .map(|(ratio, value)| (*ratio, self.assess(*ratio, *value)))
            .collect();

        RatioBundle {
            values,
            assessments,
        }
    }

    /// Compares a ratio with the benchmark stored under its key.
    pub fn assess(&self, ratio: Ratio, value: f64) -> RatioAssessment {
        self.benchmarks
            .get(ratio.key())
            .map_or(RatioAssessment::NoBenchmark, |band| band.assess(value))
    }

    /// One bundle per projected year, from that year's income and balance rows.
    pub fn analyze_projections(
        &self,
        income: &[IncomeProjection],
        balance: &[BalanceProjection],
    ) -> Vec<YearRatios> {
        income
            .iter()
            .zip(balance)
            .map(|(inc, bal)| {
                let metrics = MetricSet::new()
                    .with(Metric::Revenue, inc.revenue)
                    .with(Metric::NetIncome, inc.net_income)
                    .with(Metric::TotalAssets, bal.total_assets)
                    .with(Metric::TotalLiabilities, bal.total_liabilities)
                    .with(Metric::Equity, bal.equity)
                    .with(Metric::CurrentAssets, bal.current_assets)
                    .with(Metric::CurrentLiabilities, bal.current_liabilities);
                YearRatios {
                    year: inc.year,
                    ratios: self.analyze(&metrics),
                }
            })
            .collect()
    }
}

pub fn comprehensive_ratio_analysis(metrics: &MetricSet, industry: &str) -> RatioBundle {
    RatioAnalyzer::new(industry).analyze(metrics)
}
