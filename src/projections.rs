use crate::amortization::AmortizationSchedule;
use crate::assumptions::AssumptionSet;
use crate::error::Result;
use crate::schema::{LoanTerms, Metric, MetricSet};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum DSCR for debt service to count as adequately covered.
pub const DSCR_THRESHOLD: f64 = 1.25;

/// Share of projected total assets treated as current.
const CURRENT_ASSET_SHARE: f64 = 0.6;
/// Share of projected total liabilities treated as current.
const CURRENT_LIABILITY_SHARE: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeProjection {
    pub year: u32,
    pub revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub operating_expenses: f64,
    pub ebitda: f64,
    #[schemars(description = "Existing interest expense plus the flat interest on the new loan")]
    pub interest_expense: f64,
    pub ebit: f64,
    pub tax: f64,
    pub net_income: f64,
    #[schemars(description = "Additional annual interest caused by the new loan")]
    pub loan_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceProjection {
    pub year: u32,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub equity: f64,
    pub current_assets: f64,
    pub current_liabilities: f64,
    pub loan_balance: f64,
    pub existing_debt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowProjection {
    pub year: u32,
    pub operating_cashflow: f64,
    pub investing_cashflow: f64,
    pub financing_cashflow: f64,
    pub net_cashflow: f64,
    pub loan_impact: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DscrStatus {
    Adequate,
    Inadequate,
}

impl DscrStatus {
    pub fn from_dscr(dscr: Option<f64>) -> Self {
        match dscr {
            Some(value) if value < DSCR_THRESHOLD => DscrStatus::Inadequate,
            Some(value) if value.is_nan() => DscrStatus::Inadequate,
            _ => DscrStatus::Adequate,
        }
    }
}

impl fmt::Display for DscrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DscrStatus::Adequate => write!(f, "Adequate"),
            DscrStatus::Inadequate => write!(f, "Inadequate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DscrRow {
    pub year: u32,
    pub ebitda: f64,
    pub total_debt_service: f64,
    #[schemars(description = "EBITDA over total debt service. Null when there is no debt service.")]
    pub dscr: Option<f64>,
    pub status: DscrStatus,
}

/// Everything produced by one projection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectionSet {
    pub income: Vec<IncomeProjection>,
    pub balance: Vec<BalanceProjection>,
    pub cash_flow: Vec<CashFlowProjection>,
    pub repayment_schedule: Option<AmortizationSchedule>,
    pub dscr: Vec<DscrRow>,
}

impl ProjectionSet {
    /// Lowest finite DSCR across the projected years.
    pub fn min_dscr(&self) -> Option<f64> {
        self.dscr
            .iter()
            .filter_map(|row| row.dscr)
            .filter(|d| d.is_finite())
            .reduce(f64::min)
    }
}

/// Projects statements forward from one historical period under a fixed set
/// of assumptions.
pub struct ProjectionEngine {
    historical: MetricSet,
    assumptions: AssumptionSet,
}

impl ProjectionEngine {
    pub fn new(historical: MetricSet, assumptions: AssumptionSet) -> Self {
        Self {
            historical,
            assumptions,
        }
    }

    pub fn historical(&self) -> &MetricSet {
        &self.historical
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }

    /// Income statement for years `1..=periods`. The new loan adds a flat
    /// `principal × rate` interest charge to every year.
    pub fn project_income_statement(
        &self,
        periods: u32,
        loan: Option<&LoanTerms>,
    ) -> Vec<IncomeProjection> {
        let a = &self.assumptions;
        let base_revenue = self.historical.value(Metric::Revenue);
        let base_interest = self.historical.value(Metric::InterestExpense);

        let additional_interest = match loan {
            Some(l) if l.principal > 0.0 && l.annual_interest_rate > 0.0 => {
                l.principal * l.annual_interest_rate / 100.0
            }
            _ => 0.0,
        };

        (1..=periods)
            .map(|year| {
                let revenue = base_revenue * (1.0 + a.revenue_growth).powi(year as i32);
                let cogs = revenue * a.cogs_percentage;
                let gross_profit = revenue - cogs;
                let operating_expenses = revenue * a.opex_percentage;
                let ebitda = gross_profit - operating_expenses;
                let interest_expense = base_interest + additional_interest;
                let ebit = ebitda - interest_expense;
                let tax = ebit * a.tax_rate;

                IncomeProjection {
                    year,
                    revenue,
                    cogs,
                    gross_profit,
                    operating_expenses,
                    ebitda,
                    interest_expense,
                    ebit,
                    tax,
                    net_income: ebit - tax,
                    loan_impact: additional_interest,
                }
            })
            .collect()
    }

    /// Balance sheet aligned with `income`. The loan is written down straight
    /// line over `repayment_period` months; equity adds `net_income × year`.
    pub fn project_balance_sheet(
        &self,
        income: &[IncomeProjection],
        loan: Option<&LoanTerms>,
    ) -> Vec<BalanceProjection> {
        let a = &self.assumptions;
        let base_assets = self.historical.value(Metric::TotalAssets);
        let base_liabilities = self.historical.value(Metric::TotalLiabilities);
        let base_equity = self.historical.value(Metric::Equity);

        income
            .iter()
            .map(|row| {
                let year = row.year;
                let total_assets = base_assets * (1.0 + a.asset_growth).powi(year as i32);
                let existing_debt = base_liabilities * (1.0 + a.debt_growth).powi(year as i32);
                let loan_balance = loan
                    .filter(|l| l.principal > 0.0)
                    .map_or(0.0, |l| {
                        straight_line_balance(l.principal, year, a.repayment_period)
                    });
                let total_liabilities = existing_debt + loan_balance;

                BalanceProjection {
                    year,
                    total_assets,
                    total_liabilities,
                    equity: base_equity + row.net_income * year as f64,
                    current_assets: total_assets * CURRENT_ASSET_SHARE,
                    current_liabilities: total_liabilities * CURRENT_LIABILITY_SHARE,
                    loan_balance,
                    existing_debt,
                }
            })
            .collect()
    }

    /// Cash flow aligned with `income` and `balance`. Financing is the loan
    /// drawdown in year 1 and that year's scheduled payments afterwards.
    pub fn project_cash_flow(
        &self,
        income: &[IncomeProjection],
        balance: &[BalanceProjection],
        schedule: Option<&AmortizationSchedule>,
    ) -> Vec<CashFlowProjection> {
        income
            .iter()
            .zip(balance)
            .map(|(inc, bal)| {
                let operating_cashflow = inc.net_income + inc.interest_expense;
                let investing_cashflow = -bal.total_assets * self.assumptions.capex_percentage;
                let financing_cashflow = match schedule {
                    Some(s) if s.terms.principal > 0.0 => {
                        if inc.year == 1 {
                            s.terms.principal
                        } else {
                            -s.annual_payment(inc.year)
                        }
                    }
                    _ => 0.0,
                };

                CashFlowProjection {
                    year: inc.year,
                    operating_cashflow,
                    investing_cashflow,
                    financing_cashflow,
                    net_cashflow: operating_cashflow + investing_cashflow + financing_cashflow,
                    loan_impact: financing_cashflow,
                }
            })
            .collect()
    }

    pub fn debt_service_coverage(
        &self,
        income: &[IncomeProjection],
        schedule: Option<&AmortizationSchedule>,
    ) -> Vec<DscrRow> {
        income
            .iter()
            .map(|row| {
                let annual_payment = schedule.map_or(0.0, |s| s.annual_payment(row.year));
                let total_debt_service = row.interest_expense + annual_payment;
                let dscr = if total_debt_service > 0.0 {
                    Some(row.ebitda / total_debt_service)
                } else {
                    None
                };

                DscrRow {
                    year: row.year,
                    ebitda: row.ebitda,
                    total_debt_service,
                    dscr,
                    status: DscrStatus::from_dscr(dscr),
                }
            })
            .collect()
    }

    /// Runs the full pipeline in order: schedule, income, balance, cash flow,
    /// DSCR. Loan terms are validated before anything is computed.
    pub fn project_all(&self, periods: u32, loan: Option<&LoanTerms>) -> Result<ProjectionSet> {
        let schedule = loan.map(AmortizationSchedule::build).transpose()?;

        let income = self.project_income_statement(periods, loan);
        let balance = self.project_balance_sheet(&income, loan);
        let cash_flow = self.project_cash_flow(&income, &balance, schedule.as_ref());
        let dscr = self.debt_service_coverage(&income, schedule.as_ref());

        info!(
            "Generated {} years of projections (loan: {})",
            periods,
            loan.is_some()
        );
        for row in &dscr {
            debug!("Year {} DSCR {:?} ({})", row.year, row.dscr, row.status);
        }

        Ok(ProjectionSet {
            income,
            balance,
            cash_flow,
            repayment_schedule: schedule,
            dscr,
        })
    }
}

/// Outstanding principal at the start of `year` under straight-line repayment
/// over `repayment_months`; zero once the term has elapsed.
fn straight_line_balance(principal: f64, year: u32, repayment_months: u32) -> f64 {
    let term_years = repayment_months as f64 / 12.0;
    if year as f64 > term_years || term_years <= 0.0 {
        return 0.0;
    }
    let annual_repayment = principal / term_years;
    (principal - annual_repayment * (year as f64 - 1.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(historical: MetricSet) -> ProjectionEngine {
        let assumptions = AssumptionSet {
            revenue_growth: 0.10,
            cogs_percentage: 0.6,
            opex_percentage: 0.25,
            tax_rate: 0.30,
            asset_growth: 0.05,
            debt_growth: 0.03,
            capex_percentage: 0.10,
            repayment_period: 36,
            ..Default::default()
        };
        ProjectionEngine::new(historical, assumptions)
    }

    fn historical() -> MetricSet {
        MetricSet::new()
            .with(Metric::Revenue, 10_000_000.0)
            .with(Metric::TotalAssets, 20_000_000.0)
            .with(Metric::TotalLiabilities, 8_000_000.0)
            .with(Metric::Equity, 12_000_000.0)
    }

    #[test]
    fn test_income_projection_without_loan() {
        let income = engine(historical()).project_income_statement(2, None);
        assert_eq!(income.len(), 2);

        let y1 = &income[0];
        assert!((y1.revenue - 11_000_000.0).abs() < 1e-6);
        assert!((y1.cogs - 6_600_000.0).abs() < 1e-6);
        assert!((y1.ebitda - 1_650_000.0).abs() < 1e-6);
        assert_eq!(y1.interest_expense, 0.0);
        assert!((y1.net_income - 1_155_000.0).abs() < 1e-6);

        assert!((income[1].revenue - 12_100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_loan_interest_every_year() {
        let loan = LoanTerms::new(5_000_000.0, 12.5, 36);
        let income = engine(historical()).project_income_statement(3, Some(&loan));
        for row in &income {
            assert!((row.loan_impact - 625_000.0).abs() < 1e-9);
            assert!((row.interest_expense - 625_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_existing_interest_is_carried() {
        let hist = historical().with(Metric::InterestExpense, 100_000.0);
        let income = engine(hist).project_income_statement(1, None);
        assert_eq!(income[0].interest_expense, 100_000.0);
    }

    #[test]
    fn test_balance_sheet_loan_balance_and_equity() {
        let loan = LoanTerms::new(3_000_000.0, 10.0, 36);
        let e = engine(historical());
        let income = e.project_income_statement(4, Some(&loan));
        let balance = e.project_balance_sheet(&income, Some(&loan));

        // 36-month write-down: 3m, 2m, 1m, then paid off
        assert!((balance[0].loan_balance - 3_000_000.0).abs() < 1e-6);
        assert!((balance[1].loan_balance - 2_000_000.0).abs() < 1e-6);
        assert!((balance[2].loan_balance - 1_000_000.0).abs() < 1e-6);
        assert_eq!(balance[3].loan_balance, 0.0);

        let y2 = &balance[1];
        assert!((y2.equity - (12_000_000.0 + income[1].net_income * 2.0)).abs() < 1e-6);
        assert!((y2.current_assets - y2.total_assets * 0.6).abs() < 1e-9);
        assert!((y2.current_liabilities - y2.total_liabilities * 0.4).abs() < 1e-9);
        assert!((y2.total_liabilities - (y2.existing_debt + y2.loan_balance)).abs() < 1e-9);
    }

    #[test]
    fn test_cash_flow_financing() {
        let loan = LoanTerms::new(1_200_000.0, 0.0, 24);
        let e = engine(historical());
        let income = e.project_income_statement(3, Some(&loan));
        let balance = e.project_balance_sheet(&income, Some(&loan));
        let schedule = AmortizationSchedule::build(&loan).unwrap();
        let cash = e.project_cash_flow(&income, &balance, Some(&schedule));

        assert_eq!(cash[0].financing_cashflow, 1_200_000.0);
        assert!((cash[1].financing_cashflow + 600_000.0).abs() < 1e-6);
        assert_eq!(cash[2].financing_cashflow, 0.0);

        let y1 = &cash[0];
        assert!((y1.investing_cashflow + balance[0].total_assets * 0.10).abs() < 1e-6);
        assert!(
            (y1.net_cashflow - (y1.operating_cashflow + y1.investing_cashflow + y1.financing_cashflow))
                .abs()
                < 1e-6
        );

        let without_loan = e.project_cash_flow(&income, &balance, None);
        assert!(without_loan.iter().all(|row| row.financing_cashflow == 0.0));
    }

    #[test]
    fn test_dscr_year_one_uses_first_twelve_payments() {
        let loan = LoanTerms::new(5_000_000.0, 12.5, 36);
        let set = engine(historical()).project_all(5, Some(&loan)).unwrap();

        let schedule = set.repayment_schedule.as_ref().unwrap();
        assert!(schedule.monthly_payment > 0.0);
        assert!(schedule.rows[35].remaining_balance.abs() < 0.01);

        let first_year: f64 = schedule.rows[..12].iter().map(|r| r.payment).sum();
        let y1 = &set.dscr[0];
        let expected = set.income[0].ebitda / (set.income[0].interest_expense + first_year);
        assert!((y1.dscr.unwrap() - expected).abs() < 1e-9);

        // beyond the term only the flat interest remains
        assert!((set.dscr[3].total_debt_service - 625_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_dscr_status_boundary() {
        assert_eq!(DscrStatus::from_dscr(Some(1.25)), DscrStatus::Adequate);
        assert_eq!(DscrStatus::from_dscr(Some(1.2499)), DscrStatus::Inadequate);
        assert_eq!(DscrStatus::from_dscr(None), DscrStatus::Adequate);
        assert_eq!(DscrStatus::from_dscr(Some(-3.0)), DscrStatus::Inadequate);
    }

    #[test]
    fn test_no_debt_service_is_unbounded() {
        let set = engine(historical()).project_all(2, None).unwrap();
        assert!(set.repayment_schedule.is_none());
        assert!(set.dscr.iter().all(|row| row.dscr.is_none()));
        assert_eq!(set.min_dscr(), None);
    }

    #[test]
    fn test_invalid_loan_rejected_before_projection() {
        let loan = LoanTerms::new(-5.0, 10.0, 12);
        assert!(engine(historical()).project_all(3, Some(&loan)).is_err());
    }

    #[test]
    fn test_straight_line_balance() {
        assert_eq!(straight_line_balance(600.0, 1, 60), 600.0);
        assert!((straight_line_balance(600.0, 5, 60) - 120.0).abs() < 1e-9);
        assert_eq!(straight_line_balance(600.0, 6, 60), 0.0);
        // 18 months is 1.5 years, so year 2 is already past the term
        assert_eq!(straight_line_balance(600.0, 1, 18), 600.0);
        assert_eq!(straight_line_balance(600.0, 2, 18), 0.0);
    }
}
