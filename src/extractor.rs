use crate::schema::{CellValue, CleanTable, Metric, MetricSet, StatementType};
use crate::utils::parse_period_cell;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const ACCOUNTING_IDENTITY_TOLERANCE: f64 = 0.01;

/// Terms whose presence makes a column a signed delta that may go negative.
const SIGNED_COLUMN_TERMS: &[&str] = &["change", "flow", "difference"];

const FINANCIAL_TERMS: &[&str] = &[
    "revenue",
    "income",
    "assets",
    "liabilities",
    "equity",
    "profit",
    "cash",
];

/// Reduces a cleaned, classified table to the metrics of its most recent period.
pub struct MetricExtractor;

impl MetricExtractor {
    /// Index of the row treated as the most recent period.
    ///
    /// With several rows, the first column labelled "date" or "year" decides:
    /// the row with the latest parseable period wins. Without such a column, or
    /// if nothing in it parses, the last row is used.
    pub fn latest_row_index(table: &CleanTable) -> Option<usize> {
        match table.rows.len() {
            0 => None,
            1 => Some(0),
            n => {
                let period_col = table.columns.iter().position(|c| {
                    let lower = c.to_lowercase();
                    lower.contains("date") || lower.contains("year")
                });

                let by_period = period_col.and_then(|col| {
                    let mut best: Option<(usize, chrono::NaiveDate)> = None;
                    for row in 0..n {
                        if let Some(period) = parse_period_cell(table.cell(row, col)) {
                            if best.map_or(true, |(_, d)| period > d) {
                                best = Some((row, period));
                            }
                        }
                    }
                    best.map(|(row, _)| row)
                });

                Some(by_period.unwrap_or(n - 1))
            }
        }
    }

    pub fn extract(table: &CleanTable, statement_type: StatementType) -> MetricSet {
        let mut metrics = MetricSet::new();

        let Some(row) = Self::latest_row_index(table) else {
            return metrics;
        };
        debug!("Extracting metrics from row {}", row);

        for metric in Metric::CORE {
            if let Some(col) = table.metric_index(metric) {
                if let CellValue::Number(value) = table.cell(row, col) {
                    if *value != 0.0 && value.is_finite() {
                        metrics.insert(metric, *value);
                    }
                }
            }
        }

        match statement_type {
            StatementType::IncomeStatement => {
                if let (Some(revenue), Some(cogs)) =
                    (metrics.get(Metric::Revenue), metrics.get(Metric::Cogs))
                {
                    metrics.insert(Metric::GrossProfit, revenue - cogs);
                }
                if let (Some(gross), Some(opex)) = (
                    metrics.get(Metric::GrossProfit),
                    metrics.get(Metric::OperatingExpenses),
                ) {
                    metrics.insert(Metric::Ebit, gross - opex);
                }
            }
            StatementType::BalanceSheet => {
                if let (Some(assets), Some(liabilities)) = (
                    metrics.get(Metric::TotalAssets),
                    metrics.get(Metric::TotalLiabilities),
                ) {
                    let computed = assets - liabilities;
                    let consistent = metrics
                        .get(Metric::Equity)
                        .is_some_and(|e| (computed - e).abs() <= ACCOUNTING_IDENTITY_TOLERANCE);
                    if !consistent {
                        metrics.insert(Metric::Equity, computed);
                    }
                }
            }
            StatementType::CashFlow | StatementType::Unknown => {}
        }

        metrics
    }

    /// Data-quality checks. Only an empty table invalidates; everything else is
    /// a warning.
    pub fn validate(table: &CleanTable, statement_type: StatementType) -> ValidationReport {
        let mut report = ValidationReport::default();

        if table.is_empty() {
            report.is_valid = false;
            report.errors.push("Table is empty".to_string());
            return report;
        }

        let lower: Vec<String> = table.columns.iter().map(|c| c.to_lowercase()).collect();

        let required: &[&[&str]] = match statement_type {
            StatementType::IncomeStatement => &[&["revenue"], &["net_income"]],
            StatementType::BalanceSheet => &[&["total_assets"], &["total_liabilities"]],
            StatementType::CashFlow => &[&["cash_flow_operating"]],
            StatementType::Unknown => &[],
        };

        if statement_type == StatementType::Unknown {
            let recognizable = lower
                .iter()
                .any(|col| FINANCIAL_TERMS.iter().any(|term| col.contains(term)));
            if !recognizable {
                report
                    .warnings
                    .push("No recognizable financial columns found".to_string());
            }
        } else {
            let missing: Vec<String> = required
                .iter()
                .filter(|group| !group.iter().any(|name| lower.iter().any(|c| c == name)))
                .map(|group| format!("one of {:?}", group))
                .collect();
            if !missing.is_empty() {
                report.warnings.push(format!(
                    "Missing recommended columns for {}: {}",
                    statement_type,
                    missing.join(", ")
                ));
            }
        }

        if statement_type != StatementType::CashFlow {
            for col in table.numeric_columns() {
                let has_negative = table
                    .rows
                    .iter()
                    .any(|row| matches!(row.get(col), Some(CellValue::Number(n)) if *n < 0.0));
                let signed = SIGNED_COLUMN_TERMS.iter().any(|t| lower[col].contains(t));
                if has_negative && !signed {
                    report.warnings.push(format!(
                        "Column {} contains negative values",
                        table.columns[col]
                    ));
                }
            }
        }

        if statement_type == StatementType::BalanceSheet {
            let assets_col = table.metric_index(Metric::TotalAssets);
            let liabilities_col = table.metric_index(Metric::TotalLiabilities);
            if let (Some(a), Some(l)) = (assets_col, liabilities_col) {
                let underwater = (0..table.rows.len()).any(|row| {
                    match (table.cell(row, a), table.cell(row, l)) {
                        (CellValue::Number(assets), CellValue::Number(liabilities)) => {
                            assets < liabilities
                        }
                        _ => false,
                    }
                });
                if underwater {
                    report.warnings.push(
                        "Total assets less than total liabilities in some periods".to_string(),
                    );
                }
            }
        }

        for metric in Metric::NUMERIC {
            let columns = table.metric_columns(metric);
            if columns.len() < 2 {
                continue;
            }
            let labels: Vec<String> = columns
                .iter()
                .map(|&c| format!("'{}'", table.mapping[c].original))
                .collect();
            let chosen = table
                .metric_index(metric)
                .map_or_else(String::new, |c| table.mapping[c].original.clone());
            report.warnings.push(format!(
                "Columns {} all map to {}; reading '{}'",
                labels.join(", "),
                metric,
                chosen
            ));
        }

        report
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

pub fn extract_financial_metrics(table: &CleanTable, statement_type: StatementType) -> MetricSet {
    MetricExtractor::extract(table, statement_type)
}

pub fn validate_financial_data(table: &CleanTable, statement_type: StatementType) -> ValidationReport {
    MetricExtractor::validate(table, statement_type)
}
