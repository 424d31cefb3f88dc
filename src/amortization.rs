use crate::error::Result;
use crate::schema::LoanTerms;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One month of a fixed-payment loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepaymentRow {
    pub month: u32,
    pub payment: f64,
    pub principal_component: f64,
    pub interest_component: f64,
    #[schemars(description = "Balance after this month's payment, never below zero")]
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AmortizationSchedule {
    pub terms: LoanTerms,
    pub monthly_payment: f64,
    pub rows: Vec<RepaymentRow>,
}

impl AmortizationSchedule {
    /// Builds the month-by-month schedule. With a zero rate the principal is
    /// repaid in equal instalments.
    pub fn build(terms: &LoanTerms) -> Result<Self> {
        terms.validate()?;

        let n = terms.term_months;
        let r = terms.monthly_rate();
        let monthly_payment = level_payment(terms.principal, r, n);

        let mut balance = terms.principal;
        let mut rows = Vec::with_capacity(n as usize);
        for month in 1..=n {
            let interest = balance * r;
            let principal = monthly_payment - interest;
            balance = (balance - principal).max(0.0);

            rows.push(RepaymentRow {
                month,
                payment: monthly_payment,
                principal_component: principal,
                interest_component: interest,
                remaining_balance: balance,
            });
        }

        debug!(
            "Built {}-month schedule for principal {:.2}: payment {:.2}",
            n, terms.principal, monthly_payment
        );

        Ok(Self {
            terms: terms.clone(),
            monthly_payment,
            rows,
        })
    }

    /// Sum of the payments falling in months `(year-1)*12+1 ..= year*12`.
    /// Years past the term contribute nothing.
    pub fn annual_payment(&self, year: u32) -> f64 {
        if year == 0 {
            return 0.0;
        }
        let first = (year - 1) * 12 + 1;
        let last = year * 12;
        self.rows
            .iter()
            .filter(|row| (first..=last).contains(&row.month))
            .map(|row| row.payment)
            .sum()
    }

    pub fn total_interest(&self) -> f64 {
        self.rows.iter().map(|r| r.interest_component).sum()
    }

    pub fn total_principal(&self) -> f64 {
        self.rows.iter().map(|r| r.principal_component).sum()
    }

    pub fn final_balance(&self) -> f64 {
        self.rows.last().map_or(self.terms.principal, |r| r.remaining_balance)
    }
}

fn level_payment(principal: f64, monthly_rate: f64, months: u32) -> f64 {
    if monthly_rate == 0.0 {
        return principal / months as f64;
    }
    // discount form keeps the factor in (0, 1) for any term
    let discount = (1.0 + monthly_rate).powf(-(months as f64));
    principal * monthly_rate / (1.0 - discount)
}

pub fn calculate_loan_repayment_schedule(terms: &LoanTerms) -> Result<AmortizationSchedule> {
    AmortizationSchedule::build(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_schedule_pays_off_loan() {
        let schedule = AmortizationSchedule::build(&LoanTerms::new(5_000_000.0, 12.5, 36)).unwrap();

        assert_eq!(schedule.rows.len(), 36);
        assert!(schedule.monthly_payment > 0.0);
        assert!(schedule.final_balance().abs() < 0.01);
        assert!((schedule.total_principal() - 5_000_000.0).abs() < 0.01);

        for pair in schedule.rows.windows(2) {
            assert!(pair[1].remaining_balance <= pair[0].remaining_balance);
        }
    }

    #[test]
    fn test_known_payment() {
        // 100,000 at 12% over 12 months
        let schedule = AmortizationSchedule::build(&LoanTerms::new(100_000.0, 12.0, 12)).unwrap();
        assert!((schedule.monthly_payment - 8884.88).abs() < 0.01);
        assert!((schedule.rows[0].interest_component - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        let schedule = AmortizationSchedule::build(&LoanTerms::new(1200.0, 0.0, 12)).unwrap();
        assert_eq!(schedule.monthly_payment, 100.0);
        assert_eq!(schedule.total_interest(), 0.0);
        assert!(schedule.final_balance().abs() < 1e-9);
    }

    #[test]
    fn test_annual_payment_windows() {
        let schedule = AmortizationSchedule::build(&LoanTerms::new(1_000_000.0, 10.0, 18)).unwrap();
        let p = schedule.monthly_payment;
        assert!((schedule.annual_payment(1) - 12.0 * p).abs() < 1e-6);
        assert!((schedule.annual_payment(2) - 6.0 * p).abs() < 1e-6);
        assert_eq!(schedule.annual_payment(3), 0.0);
        assert_eq!(schedule.annual_payment(0), 0.0);
    }

    #[test]
    fn test_single_month_term() {
        let schedule = AmortizationSchedule::build(&LoanTerms::new(1000.0, 12.0, 1)).unwrap();
        assert!((schedule.monthly_payment - 1010.0).abs() < 1e-9);
        assert!(schedule.final_balance().abs() < 1e-9);
    }

    #[test]
    fn test_invalid_terms_rejected() {
        let err = AmortizationSchedule::build(&LoanTerms::new(1000.0, 12.0, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidLoanTerms { .. }));

        let err = AmortizationSchedule::build(&LoanTerms::new(1_000_000.0, 12.0, 100_000))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidLoanTerms { ref field, .. } if field == "term_months"));
    }

    #[test]
    fn test_longest_term_stays_finite() {
        let schedule = AmortizationSchedule::build(&LoanTerms::new(1_000_000.0, 12.0, 600)).unwrap();

        assert_eq!(schedule.rows.len(), 600);
        assert!(schedule.monthly_payment.is_finite());
        // interest alone is 10,000 a month, so the payment sits just above it
        assert!(schedule.monthly_payment > 10_000.0 && schedule.monthly_payment < 10_100.0);
        assert!(schedule
            .rows
            .iter()
            .all(|r| r.payment.is_finite() && r.principal_component.is_finite()));
        assert!((schedule.total_principal() - 1_000_000.0).abs() < 0.01);
        assert!(schedule.final_balance().abs() < 0.01);
    }
}
