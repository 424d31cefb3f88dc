use crate::error::{EngineError, Result};
use crate::normalizer::primary_synonym;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The canonical metric vocabulary every source column is normalized into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[schemars(description = "Top-line sales / turnover for the period")]
    Revenue,
    #[schemars(description = "Profit after tax")]
    NetIncome,
    TotalAssets,
    TotalLiabilities,
    CurrentAssets,
    CurrentLiabilities,
    #[schemars(description = "Shareholders' equity (assets minus liabilities)")]
    Equity,
    GrossProfit,
    OperatingExpenses,
    #[schemars(description = "Earnings before interest and tax")]
    Ebit,
    #[schemars(description = "Cost of goods sold / cost of sales")]
    Cogs,
    CashFlowOperating,
    CashFlowInvesting,
    CashFlowFinancing,
    #[schemars(description = "Existing interest expense (supplied by the caller, never mapped from columns)")]
    InterestExpense,
    #[schemars(description = "Trade receivables (supplied by the caller, never mapped from columns)")]
    AccountsReceivable,
}

impl Metric {
    /// Metrics read from the most recent period row during extraction.
    pub const CORE: [Metric; 11] = [
        Metric::Revenue,
        Metric::NetIncome,
        Metric::TotalAssets,
        Metric::TotalLiabilities,
        Metric::CurrentAssets,
        Metric::CurrentLiabilities,
        Metric::Equity,
        Metric::GrossProfit,
        Metric::OperatingExpenses,
        Metric::Ebit,
        Metric::Cogs,
    ];

    /// Columns coerced to numbers during cleaning.
    pub const NUMERIC: [Metric; 14] = [
        Metric::Revenue,
        Metric::NetIncome,
        Metric::TotalAssets,
        Metric::TotalLiabilities,
        Metric::CurrentAssets,
        Metric::CurrentLiabilities,
        Metric::Equity,
        Metric::GrossProfit,
        Metric::OperatingExpenses,
        Metric::Ebit,
        Metric::Cogs,
        Metric::CashFlowOperating,
        Metric::CashFlowInvesting,
        Metric::CashFlowFinancing,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::NetIncome => "net_income",
            Metric::TotalAssets => "total_assets",
            Metric::TotalLiabilities => "total_liabilities",
            Metric::CurrentAssets => "current_assets",
            Metric::CurrentLiabilities => "current_liabilities",
            Metric::Equity => "equity",
            Metric::GrossProfit => "gross_profit",
            Metric::OperatingExpenses => "operating_expenses",
            Metric::Ebit => "ebit",
            Metric::Cogs => "cogs",
            Metric::CashFlowOperating => "cash_flow_operating",
            Metric::CashFlowInvesting => "cash_flow_investing",
            Metric::CashFlowFinancing => "cash_flow_financing",
            Metric::InterestExpense => "interest_expense",
            Metric::AccountsReceivable => "accounts_receivable",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Self::NUMERIC
            .iter()
            .chain([Metric::InterestExpense, Metric::AccountsReceivable].iter())
            .find(|m| m.key() == key)
            .copied()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One period's canonical metrics. A metric that is absent means "no data";
/// extraction never stores a zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<Metric, f64>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.0.insert(metric, value);
        self
    }

    pub(crate) fn insert(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, value);
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    /// The metric's value, or 0.0 when absent.
    pub fn value(&self, metric: Metric) -> f64 {
        self.get(metric).unwrap_or(0.0)
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.0.contains_key(&metric)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Returns a new set holding every metric of `self` plus the metrics of
    /// `other` that `self` lacks.
    pub fn merged_with(&self, other: &MetricSet) -> MetricSet {
        let mut merged = self.clone();
        for (metric, value) in other.iter() {
            merged.0.entry(metric).or_insert(value);
        }
        merged
    }
}

impl FromIterator<(Metric, f64)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Types a raw textual cell: blank → `Empty`, numeric → `Number`, else `Text`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Empty => Ok(()),
        }
    }
}

/// A table as it arrives from ingestion. Column labels only need to be unique
/// by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding with `Empty` or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn with_row(mut self, row: Vec<CellValue>) -> Self {
        self.push_row(row);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMapping {
    pub original: String,
    pub canonical: Option<Metric>,
}

/// A normalized table: canonical columns renamed to their metric key and
/// coerced to numbers, stray rows and empty columns removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CleanTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub mapping: Vec<ColumnMapping>,
}

impl CleanTable {
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    /// Every column mapped to `metric`, in table order.
    pub fn metric_columns(&self, metric: Metric) -> Vec<usize> {
        self.mapping
            .iter()
            .enumerate()
            .filter(|(_, m)| m.canonical == Some(metric))
            .map(|(col, _)| col)
            .collect()
    }

    /// The column read for `metric`. When several columns map to it, the one
    /// whose source label carries the metric's primary synonym wins ("Total
    /// Assets" over "Current Assets"); failing that, the leftmost.
    pub fn metric_index(&self, metric: Metric) -> Option<usize> {
        let candidates = self.metric_columns(metric);
        if candidates.len() > 1 {
            if let Some(primary) = primary_synonym(metric) {
                let preferred = candidates.iter().copied().find(|&col| {
                    self.mapping
                        .get(col)
                        .is_some_and(|m| m.original.to_lowercase().contains(primary))
                });
                if preferred.is_some() {
                    return preferred;
                }
            }
        }
        candidates.first().copied()
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// A column is numeric when it is a coerced canonical column, or when every
    /// non-blank cell already holds a number.
    pub fn is_numeric_column(&self, col: usize) -> bool {
        if self
            .mapping
            .get(col)
            .and_then(|m| m.canonical)
            .is_some_and(|m| Metric::NUMERIC.contains(&m))
        {
            return true;
        }
        let mut saw_number = false;
        for row in &self.rows {
            match row.get(col) {
                Some(CellValue::Number(_)) => saw_number = true,
                Some(cell) if cell.is_blank() => {}
                _ => return false,
            }
        }
        saw_number
    }

    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&c| self.is_numeric_column(c))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncomeStatement => write!(f, "Income Statement"),
            Self::BalanceSheet => write!(f, "Balance Sheet"),
            Self::CashFlow => write!(f, "Cash Flow"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Longest repayment term accepted, in months (50 years).
pub const MAX_TERM_MONTHS: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoanTerms {
    #[schemars(description = "Amount borrowed. Must be positive.")]
    pub principal: f64,

    #[schemars(description = "Nominal annual interest rate in percent (12.5 means 12.5%). Must not be negative.")]
    pub annual_interest_rate: f64,

    #[schemars(description = "Repayment term in months, from 1 to 600.")]
    pub term_months: u32,
}

impl LoanTerms {
    pub fn new(principal: f64, annual_interest_rate: f64, term_months: u32) -> Self {
        Self {
            principal,
            annual_interest_rate,
            term_months,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_finite() || self.principal <= 0.0 {
            return Err(EngineError::InvalidLoanTerms {
                field: "principal".into(),
                reason: format!("must be positive, got {}", self.principal),
            });
        }
        if !self.annual_interest_rate.is_finite() || self.annual_interest_rate < 0.0 {
            return Err(EngineError::InvalidLoanTerms {
                field: "annual_interest_rate".into(),
                reason: format!("must not be negative, got {}", self.annual_interest_rate),
            });
        }
        if self.term_months == 0 || self.term_months > MAX_TERM_MONTHS {
            return Err(EngineError::InvalidLoanTerms {
                field: "term_months".into(),
                reason: format!(
                    "must be between 1 and {}, got {}",
                    MAX_TERM_MONTHS, self.term_months
                ),
            });
        }
        Ok(())
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_interest_rate / 12.0 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_keys_round_trip() {
        for metric in Metric::NUMERIC {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Metric::from_key("interest_expense"), Some(Metric::InterestExpense));
        assert_eq!(Metric::from_key("inventory"), None);
        assert_eq!(Metric::from_key("long_term_debt"), None);
    }

    #[test]
    fn test_metric_set_serializes_as_snake_case_map() {
        let set = MetricSet::new()
            .with(Metric::Revenue, 100.0)
            .with(Metric::NetIncome, 10.0);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"revenue":100.0,"net_income":10.0}"#);
    }

    #[test]
    fn test_merged_with_keeps_existing_values() {
        let first = MetricSet::new().with(Metric::Revenue, 100.0);
        let second = MetricSet::new()
            .with(Metric::Revenue, 999.0)
            .with(Metric::TotalAssets, 50.0);
        let merged = first.merged_with(&second);
        assert_eq!(merged.get(Metric::Revenue), Some(100.0));
        assert_eq!(merged.get(Metric::TotalAssets), Some(50.0));
    }

    #[test]
    fn test_cell_value_from_raw() {
        assert_eq!(CellValue::from_raw("  "), CellValue::Empty);
        assert_eq!(CellValue::from_raw("12.5"), CellValue::Number(12.5));
        assert_eq!(
            CellValue::from_raw("1,000"),
            CellValue::Text("1,000".to_string())
        );
        assert_eq!(CellValue::from_raw("nan"), CellValue::Text("nan".to_string()));
    }

    #[test]
    fn test_push_row_pads_to_column_count() {
        let mut table = RawTable::new(vec!["a".into(), "b".into(), "c".into()]);
        table.push_row(vec![CellValue::Number(1.0)]);
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], CellValue::Empty);
    }

    #[test]
    fn test_loan_terms_validation() {
        assert!(LoanTerms::new(5_000_000.0, 12.5, 36).validate().is_ok());
        assert!(LoanTerms::new(0.0, 12.5, 36).validate().is_err());
        assert!(LoanTerms::new(1000.0, -1.0, 36).validate().is_err());
        assert!(LoanTerms::new(1000.0, 0.0, 0).validate().is_err());
        assert!(LoanTerms::new(1000.0, 12.0, MAX_TERM_MONTHS).validate().is_ok());
        assert!(LoanTerms::new(1000.0, 12.0, MAX_TERM_MONTHS + 1).validate().is_err());
    }
}
