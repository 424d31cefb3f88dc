use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SINGLE_OBLIGOR_VIOLATION: &str = "Exceeds single obligor limit (25% of core capital)";
pub const DEBT_SERVICE_VIOLATION: &str = "Debt service ratio exceeds 50%";

/// Debt service ratio assumed when no DSCR series is available.
pub const DEFAULT_DEBT_SERVICE_RATIO: f64 = 0.35;

/// Prudential lending limits, expressed as fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RegulatoryLimits {
    #[schemars(description = "Largest single loan as a fraction of the lender's core capital")]
    pub single_obligor_limit: f64,

    #[schemars(description = "Largest sector exposure as a fraction of the total portfolio")]
    pub sector_exposure_limit: f64,

    #[schemars(
        description = "Upper bound on the debt service ratio. The risk assessment feeds it the minimum DSCR, a coverage multiple, so any loan covered more than 0.5 times is flagged."
    )]
    pub max_debt_service_ratio: f64,

    pub min_liquidity_ratio: f64,

    pub min_capital_adequacy: f64,
}

impl Default for RegulatoryLimits {
    fn default() -> Self {
        Self {
            single_obligor_limit: 0.25,
            sector_exposure_limit: 0.30,
            max_debt_service_ratio: 0.50,
            min_liquidity_ratio: 0.20,
            min_capital_adequacy: 0.14,
        }
    }
}

impl RegulatoryLimits {
    pub fn within_single_obligor_limit(&self, loan_amount: f64, core_capital: f64) -> bool {
        loan_amount <= core_capital * self.single_obligor_limit
    }

    pub fn within_sector_exposure(&self, sector_exposure: f64, total_portfolio: f64) -> bool {
        sector_exposure <= total_portfolio * self.sector_exposure_limit
    }

    pub fn within_debt_service_ratio(&self, debt_service_ratio: f64) -> bool {
        debt_service_ratio <= self.max_debt_service_ratio
    }

    pub fn meets_liquidity_ratio(&self, liquidity_ratio: f64) -> bool {
        liquidity_ratio >= self.min_liquidity_ratio
    }

    pub fn meets_capital_adequacy(&self, capital_adequacy: f64) -> bool {
        capital_adequacy >= self.min_capital_adequacy
    }

    /// Human-readable list of breached limits for one loan. Empty means compliant.
    ///
    /// `debt_service_ratio` is checked against `max_debt_service_ratio` as an
    /// upper bound. `RiskAssessment::assess` passes the minimum DSCR here, which
    /// is a coverage multiple rather than a share of income: a loan covered
    /// 3 times over still reports the debt service violation.
    pub fn compliance_violations(
        &self,
        loan_amount: f64,
        core_capital: f64,
        debt_service_ratio: f64,
    ) -> Vec<String> {
        let mut violations = Vec::new();

        if !self.within_single_obligor_limit(loan_amount, core_capital) {
            violations.push(SINGLE_OBLIGOR_VIOLATION.to_string());
        }
        if !self.within_debt_service_ratio(debt_service_ratio) {
            violations.push(DEBT_SERVICE_VIOLATION.to_string());
        }

        violations
    }
}
