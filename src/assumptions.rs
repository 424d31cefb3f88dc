use crate::error::{EngineError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Economic drivers behind a projection. Rates are fractions (0.05 = 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AssumptionSet {
    #[schemars(description = "Annual revenue growth. May be negative, not below -1.")]
    pub revenue_growth: f64,

    #[schemars(description = "Cost of goods sold as a share of revenue")]
    pub cogs_percentage: f64,

    #[schemars(description = "Operating expenses as a share of revenue")]
    pub opex_percentage: f64,

    pub tax_rate: f64,

    #[schemars(description = "Annual growth of total assets. May be negative, not below -1.")]
    pub asset_growth: f64,

    #[schemars(description = "Annual growth of existing liabilities. May be negative, not below -1.")]
    pub debt_growth: f64,

    #[schemars(description = "Capital expenditure as a share of projected total assets")]
    pub capex_percentage: f64,

    #[schemars(description = "Months over which the new loan is written down on the projected balance sheet")]
    pub repayment_period: u32,

    #[schemars(description = "Carried for the presentation layer; no projection reads it")]
    pub inflation_rate: f64,

    #[schemars(description = "Carried for the presentation layer; no projection reads it")]
    pub dividend_payout: f64,

    #[schemars(description = "Carried for the presentation layer; no projection reads it or validates it")]
    pub days_receivable: u32,

    #[schemars(description = "Carried for the presentation layer; no projection reads it or validates it")]
    pub days_payable: u32,
}

impl Default for AssumptionSet {
    fn default() -> Self {
        Self {
            revenue_growth: 0.05,
            cogs_percentage: 0.60,
            opex_percentage: 0.25,
            tax_rate: 0.30,
            asset_growth: 0.05,
            debt_growth: 0.03,
            capex_percentage: 0.10,
            repayment_period: 60,
            inflation_rate: 0.065,
            dividend_payout: 0.30,
            days_receivable: 45,
            days_payable: 30,
        }
    }
}

impl AssumptionSet {
    pub fn validate(&self) -> Result<()> {
        let shares = [
            ("cogs_percentage", self.cogs_percentage),
            ("opex_percentage", self.opex_percentage),
            ("tax_rate", self.tax_rate),
            ("capex_percentage", self.capex_percentage),
            ("inflation_rate", self.inflation_rate),
            ("dividend_payout", self.dividend_payout),
        ];
        for (field, value) in shares {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidAssumption {
                    field: field.into(),
                    reason: format!("must be between 0 and 1, got {}", value),
                });
            }
        }

        let growth = [
            ("revenue_growth", self.revenue_growth),
            ("asset_growth", self.asset_growth),
            ("debt_growth", self.debt_growth),
        ];
        for (field, value) in growth {
            if !value.is_finite() || value < -1.0 {
                return Err(EngineError::InvalidAssumption {
                    field: field.into(),
                    reason: format!("must be a finite rate of at least -1, got {}", value),
                });
            }
        }

        if self.repayment_period == 0 {
            return Err(EngineError::InvalidAssumption {
                field: "repayment_period".into(),
                reason: "must be at least 1 month".into(),
            });
        }

        Ok(())
    }

    /// Overwrites the revenue and cost drivers with an industry's typical values.
    pub fn with_preset(&self, preset: IndustryPreset) -> Self {
        let (revenue_growth, cogs_percentage, opex_percentage) = preset.drivers();
        Self {
            revenue_growth,
            cogs_percentage,
            opex_percentage,
            ..self.clone()
        }
    }

    pub fn with_scenario(&self, scenario: Scenario) -> Self {
        scenario.apply(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum IndustryPreset {
    Agriculture,
    Manufacturing,
    #[serde(rename = "Building & Construction")]
    BuildingAndConstruction,
    Services,
    Trade,
}

impl IndustryPreset {
    pub const ALL: [IndustryPreset; 5] = [
        IndustryPreset::Agriculture,
        IndustryPreset::Manufacturing,
        IndustryPreset::BuildingAndConstruction,
        IndustryPreset::Services,
        IndustryPreset::Trade,
    ];

    /// `(revenue_growth, cogs_percentage, opex_percentage)`
    pub fn drivers(&self) -> (f64, f64, f64) {
        match self {
            Self::Agriculture => (0.08, 0.65, 0.20),
            Self::Manufacturing => (0.12, 0.70, 0.18),
            Self::BuildingAndConstruction => (0.15, 0.75, 0.15),
            Self::Services => (0.10, 0.40, 0.35),
            Self::Trade => (0.09, 0.80, 0.12),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Agriculture => "Agriculture",
            Self::Manufacturing => "Manufacturing",
            Self::BuildingAndConstruction => "Building & Construction",
            Self::Services => "Services",
            Self::Trade => "Trade",
        }
    }

    /// Resolves an industry label such as "Agriculture - Tea" by its sector
    /// prefix. Unknown sectors give `None`.
    pub fn from_industry(industry: &str) -> Option<Self> {
        let sector = industry.split(" - ").next().unwrap_or(industry).trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(sector))
    }
}

impl fmt::Display for IndustryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Scenario {
    #[default]
    BaseCase,
    Optimistic,
    Pessimistic,
    StressTest,
}

impl Scenario {
    pub fn apply(&self, base: &AssumptionSet) -> AssumptionSet {
        let mut adjusted = base.clone();
        match self {
            Scenario::BaseCase => {}
            Scenario::Optimistic => adjusted.revenue_growth *= 1.5,
            Scenario::Pessimistic => adjusted.revenue_growth *= 0.7,
            Scenario::StressTest => {
                adjusted.revenue_growth *= 0.5;
                adjusted.cogs_percentage *= 1.2;
            }
        }
        adjusted
    }
}
