use crate::compliance::DEFAULT_DEBT_SERVICE_RATIO;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::projections::{DscrRow, ProjectionSet};
use crate::ratios::{Ratio, RatioBundle};
use crate::schema::LoanTerms;
use crate::utils::{mean, std_dev};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;
use std::fmt;

const Z_SAFE: f64 = 2.99;
const Z_DISTRESS: f64 = 1.81;

/// Credit score used when no historical ratios are available.
pub const DEFAULT_CREDIT_SCORE: u32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AltmanZone {
    #[serde(rename = "Safe Zone")]
    Safe,
    #[serde(rename = "Grey Zone")]
    Grey,
    #[serde(rename = "Distress Zone")]
    Distress,
}

impl AltmanZone {
    /// z > 2.99 is safe, 1.81 < z <= 2.99 is grey, anything lower is distress.
    pub fn from_score(z: f64) -> Self {
        if z > Z_SAFE {
            AltmanZone::Safe
        } else if z > Z_DISTRESS {
            AltmanZone::Grey
        } else {
            AltmanZone::Distress
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            AltmanZone::Safe => "Low bankruptcy risk",
            AltmanZone::Grey => "Moderate bankruptcy risk",
            AltmanZone::Distress => "High bankruptcy risk",
        }
    }
}

impl fmt::Display for AltmanZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltmanZone::Safe => write!(f, "Safe Zone"),
            AltmanZone::Grey => write!(f, "Grey Zone"),
            AltmanZone::Distress => write!(f, "Distress Zone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AltmanInputs {
    pub working_capital: f64,
    pub retained_earnings: f64,
    pub ebit: f64,
    pub market_value_equity: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
}

/// Z = 1.2·X1 + 1.4·X2 + 3.3·X3 + 0.6·X4 + 1.0·X5, with X5 taken as total
/// assets itself rather than a sales/assets ratio. Zero assets give exactly 0.
pub fn altman_z_score(inputs: &AltmanInputs) -> f64 {
    let ta = inputs.total_assets;
    if ta == 0.0 {
        return 0.0;
    }

    let x1 = inputs.working_capital / ta;
    let x2 = inputs.retained_earnings / ta;
    let x3 = inputs.ebit / ta;
    let x4 = if inputs.total_liabilities > 0.0 {
        inputs.market_value_equity / inputs.total_liabilities
    } else {
        0.0
    };
    let x5 = ta;

    1.2 * x1 + 1.4 * x2 + 3.3 * x3 + 0.6 * x4 + 1.0 * x5
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuralOutcome {
    pub default_probability: f64,
    pub distance_to_default: f64,
    #[schemars(description = "True when the inputs could not be evaluated and the neutral default (0.5, 0) was returned")]
    pub fallback: bool,
}

impl StructuralOutcome {
    fn fallback() -> Self {
        Self {
            default_probability: 0.5,
            distance_to_default: 0.0,
            fallback: true,
        }
    }
}

/// Merton-style default probability `N(-d2)` with distance to default `d2`.
/// Inputs that cannot be evaluated fall back to probability 0.5, distance 0.
pub fn structural_default(
    company_value: f64,
    debt_face_value: f64,
    risk_free_rate: f64,
    volatility: f64,
    horizon_years: f64,
) -> StructuralOutcome {
    if !(company_value > 0.0 && debt_face_value > 0.0 && volatility > 0.0 && horizon_years > 0.0)
    {
        warn!(
            "Structural model inputs out of range (V={}, D={}, sigma={}, T={}); using fallback",
            company_value, debt_face_value, volatility, horizon_years
        );
        return StructuralOutcome::fallback();
    }

    let sigma_sqrt_t = volatility * horizon_years.sqrt();
    let d1 = ((company_value / debt_face_value).ln()
        + (risk_free_rate + 0.5 * volatility.powi(2)) * horizon_years)
        / sigma_sqrt_t;
    let d2 = d1 - sigma_sqrt_t;

    let normal = match statrs::distribution::Normal::new(0.0, 1.0) {
        Ok(n) => n,
        Err(_) => return StructuralOutcome::fallback(),
    };
    let probability = normal.cdf(-d2);

    if !probability.is_finite() || !d2.is_finite() {
        warn!("Structural model produced a non-finite result; using fallback");
        return StructuralOutcome::fallback();
    }

    StructuralOutcome {
        default_probability: probability,
        distance_to_default: d2,
        fallback: false,
    }
}

/// Simulates `periods × simulations` cash flows. Each period applies
/// `N(0, volatility)` shocks multiplicatively to the current base, and the
/// next period's base is the mean of this period's draws.
pub fn monte_carlo_cashflow(
    base_cashflow: f64,
    volatility: f64,
    periods: usize,
    simulations: usize,
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    let shock = rand_distr::Normal::new(0.0, volatility)
        .map_err(|e| EngineError::Simulation(format!("invalid volatility {}: {}", volatility, e)))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut matrix = Vec::with_capacity(periods);
    let mut current = base_cashflow;
    for _ in 0..periods {
        let row: Vec<f64> = (0..simulations)
            .map(|_| current * (1.0 + shock.sample(&mut rng)))
            .collect();
        if !row.is_empty() {
            current = mean(&row);
        }
        matrix.push(row);
    }

    Ok(matrix)
}

/// Four 25-point rules on current ratio, leverage, ROA and margin.
pub fn credit_score(ratios: &RatioBundle) -> u32 {
    let rules = [
        ratios.value(Ratio::CurrentRatio) > 1.5,
        ratios.value(Ratio::DebtToEquity) < 2.0,
        ratios.value(Ratio::ReturnOnAssets) > 0.05,
        ratios.value(Ratio::NetProfitMargin) > 0.1,
    ];
    let score = rules.iter().filter(|passed| **passed).count() as u32 * 25;
    score.min(100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CreditRating {
    Good,
    Fair,
    Poor,
}

impl CreditRating {
    pub fn from_score(score: u32) -> Self {
        if score >= 70 {
            CreditRating::Good
        } else if score >= 50 {
            CreditRating::Fair
        } else {
            CreditRating::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskAssessment {
    pub altman_z_score: f64,
    pub altman_zone: AltmanZone,
    pub altman_interpretation: String,
    pub default_probability: f64,
    pub distance_to_default: f64,
    pub structural_fallback: bool,
    pub ml_credit_score: u32,
    pub ml_rating: CreditRating,
    #[schemars(description = "Standard deviation of the simulated cash-flow matrix. Null without a cash-flow projection.")]
    pub cashflow_volatility: Option<f64>,
    pub dscr_series: Vec<DscrRow>,
    pub min_dscr: Option<f64>,
    pub cbk_violations: Vec<String>,
    pub compliant: bool,
}

impl RiskAssessment {
    /// Recomputes the whole assessment from the first projected year.
    pub fn assess(
        projections: &ProjectionSet,
        ratios: Option<&RatioBundle>,
        loan: Option<&LoanTerms>,
        core_capital: f64,
        config: &EngineConfig,
    ) -> Result<Self> {
        let balance = projections.balance.first();
        let total_assets = balance.map_or(0.0, |b| b.total_assets);
        let total_liabilities = balance.map_or(0.0, |b| b.total_liabilities);
        let equity = balance.map_or(0.0, |b| b.equity);

        let inputs = AltmanInputs {
            working_capital: balance.map_or(0.0, |b| b.current_assets - b.current_liabilities),
            retained_earnings: equity * 0.5,
            ebit: projections.income.first().map_or(0.0, |i| i.ebit),
            market_value_equity: equity * 1.5,
            total_assets,
            total_liabilities,
        };
        let altman_z_score = altman_z_score(&inputs);
        let altman_zone = AltmanZone::from_score(altman_z_score);

        let params = &config.risk;
        let structural = structural_default(
            total_assets,
            total_liabilities,
            params.risk_free_rate,
            params.asset_volatility,
            params.horizon_years,
        );

        let ml_credit_score = ratios.map_or(DEFAULT_CREDIT_SCORE, credit_score);

        let cashflow_volatility = if projections.cash_flow.is_empty() {
            None
        } else {
            let operating: Vec<f64> = projections
                .cash_flow
                .iter()
                .map(|c| c.operating_cashflow)
                .collect();
            let matrix = monte_carlo_cashflow(
                mean(&operating),
                params.monte_carlo_volatility,
                params.monte_carlo_periods,
                params.monte_carlo_simulations,
                params.monte_carlo_seed,
            )?;
            let flat: Vec<f64> = matrix.into_iter().flatten().collect();
            Some(std_dev(&flat))
        };

        // the minimum DSCR stands in for the debt service ratio
        let min_dscr = projections.min_dscr();
        let loan_amount = loan.map_or(0.0, |l| l.principal);
        let cbk_violations = config.regulatory_limits.compliance_violations(
            loan_amount,
            core_capital,
            min_dscr.unwrap_or(DEFAULT_DEBT_SERVICE_RATIO),
        );

        debug!(
            "Altman inputs {:?}; structural outcome {:?}",
            inputs, structural
        );
        info!(
            "Risk assessment: Z={:.2} ({}), PD={:.4}, score={}, violations={}",
            altman_z_score,
            altman_zone,
            structural.default_probability,
            ml_credit_score,
            cbk_violations.len()
        );

        Ok(Self {
            altman_z_score,
            altman_zone,
            altman_interpretation: altman_zone.interpretation().to_string(),
            default_probability: structural.default_probability,
            distance_to_default: structural.distance_to_default,
            structural_fallback: structural.fallback,
            ml_credit_score,
            ml_rating: CreditRating::from_score(ml_credit_score),
            cashflow_volatility,
            dscr_series: projections.dscr.clone(),
            min_dscr,
            compliant: cbk_violations.is_empty(),
            cbk_violations,
        })
    }
}
