use crate::schema::StatementType;
use crate::utils::normalize_label;

pub const INCOME_INDICATORS: &[&str] = &[
    "revenue",
    "sales",
    "cogs",
    "gross profit",
    "operating income",
    "net income",
    "ebit",
    "ebitda",
];

pub const BALANCE_INDICATORS: &[&str] = &[
    "assets",
    "liabilities",
    "equity",
    "current assets",
    "fixed assets",
    "inventory",
];

pub const CASH_FLOW_INDICATORS: &[&str] = &[
    "operating cash flow",
    "investing cash flow",
    "financing cash flow",
    "cash flow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorScores {
    pub income: usize,
    pub balance: usize,
    pub cash_flow: usize,
}

impl IndicatorScores {
    pub fn max(&self) -> usize {
        self.income.max(self.balance).max(self.cash_flow)
    }
}

/// Infers the statement type from column labels alone.
pub struct StatementClassifier;

impl StatementClassifier {
    pub fn score<S: AsRef<str>>(columns: &[S]) -> IndicatorScores {
        let labels = normalized(columns);
        IndicatorScores {
            income: count_hits(INCOME_INDICATORS, &labels),
            balance: count_hits(BALANCE_INDICATORS, &labels),
            cash_flow: count_hits(CASH_FLOW_INDICATORS, &labels),
        }
    }

    /// Highest indicator score wins. Ties go to cash flow if any label says
    /// "cash flow", then to balance sheet if labels mention both assets and
    /// liabilities, then to income statement. No hits at all is `Unknown`.
    pub fn classify<S: AsRef<str>>(columns: &[S]) -> StatementType {
        let scores = Self::score(columns);
        let max = scores.max();
        if max == 0 {
            return StatementType::Unknown;
        }

        let leaders: Vec<StatementType> = [
            (StatementType::IncomeStatement, scores.income),
            (StatementType::BalanceSheet, scores.balance),
            (StatementType::CashFlow, scores.cash_flow),
        ]
        .into_iter()
        .filter(|(_, score)| *score == max)
        .map(|(kind, _)| kind)
        .collect();

        if let [only] = leaders.as_slice() {
            return *only;
        }

        let labels = normalized(columns);
        let any_label = |needle: &str| labels.iter().any(|l| l.contains(needle));

        if any_label("cash flow") {
            StatementType::CashFlow
        } else if any_label("assets") && any_label("liabilities") {
            StatementType::BalanceSheet
        } else {
            StatementType::IncomeStatement
        }
    }
}

fn normalized<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    columns.iter().map(|c| normalize_label(c.as_ref())).collect()
}

fn count_hits(indicators: &[&str], labels: &[String]) -> usize {
    indicators
        .iter()
        .filter(|indicator| labels.iter().any(|label| label.contains(*indicator)))
        .count()
}

pub fn detect_financial_statement_type<S: AsRef<str>>(columns: &[S]) -> StatementType {
    StatementClassifier::classify(columns)
}
