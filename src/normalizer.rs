use crate::error::{EngineError, Result};
use crate::schema::{CellValue, CleanTable, ColumnMapping, Metric, RawTable};
use log::debug;

/// Accepted label fragments per canonical metric. A column is assigned to the
/// first metric whose list matches it, so specific line items come before the
/// generic words they contain ("cost of sales" before "sales", "net income"
/// before "income").
pub const COLUMN_SYNONYMS: &[(Metric, &[&str])] = &[
    (
        Metric::CashFlowOperating,
        &[
            "operating cash flow",
            "cash from operations",
            "net cash from operating activities",
        ],
    ),
    (
        Metric::CashFlowInvesting,
        &["investing cash flow", "cash from investing activities"],
    ),
    (
        Metric::CashFlowFinancing,
        &["financing cash flow", "cash from financing activities"],
    ),
    (Metric::Cogs, &["cost of goods sold", "cogs", "cost of sales"]),
    (
        Metric::Ebit,
        &["ebit", "operating profit", "profit before interest and tax"],
    ),
    (
        Metric::OperatingExpenses,
        &[
            "operating expenses",
            "administrative expenses",
            "selling expenses",
        ],
    ),
    (Metric::GrossProfit, &["gross profit", "gross margin"]),
    (
        Metric::NetIncome,
        &[
            "net income",
            "net profit",
            "profit after tax",
            "pat",
            "net profit after tax",
        ],
    ),
    (
        Metric::Revenue,
        &[
            "revenue",
            "sales",
            "turnover",
            "gross revenue",
            "total revenue",
            "income",
        ],
    ),
    (
        Metric::TotalAssets,
        &[
            "total assets",
            "assets",
            "non-current assets",
            "current assets",
            "fixed assets",
        ],
    ),
    (
        Metric::TotalLiabilities,
        &[
            "total liabilities",
            "liabilities",
            "non-current liabilities",
            "current liabilities",
        ],
    ),
    (
        Metric::CurrentAssets,
        &[
            "current assets",
            "inventories",
            "receivables",
            "cash and cash equivalents",
        ],
    ),
    (
        Metric::CurrentLiabilities,
        &["current liabilities", "payables", "short term debt"],
    ),
    (
        Metric::Equity,
        &[
            "equity",
            "shareholders equity",
            "share capital",
            "retained earnings",
        ],
    ),
];

/// The first synonym listed for `metric`, which names the line item itself
/// ("total assets" for total_assets).
pub fn primary_synonym(metric: Metric) -> Option<&'static str> {
    COLUMN_SYNONYMS
        .iter()
        .find(|(m, _)| *m == metric)
        .and_then(|(_, names)| names.first().copied())
}

/// Characters stripped from numeric cells before parsing.
pub const CURRENCY_SYMBOLS: &[char] = &['₦', '$', '£', '€', ','];

pub struct ColumnNormalizer {
    synonyms: &'static [(Metric, &'static [&'static str])],
}

impl Default for ColumnNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnNormalizer {
    pub fn new() -> Self {
        Self {
            synonyms: COLUMN_SYNONYMS,
        }
    }

    /// Bidirectional substring match of the lowercased label against each
    /// metric's synonyms; first metric in table order wins.
    pub fn canonical_for(&self, label: &str) -> Option<Metric> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }

        self.synonyms
            .iter()
            .find(|(_, names)| {
                names
                    .iter()
                    .any(|name| label.contains(name) || name.contains(label.as_str()))
            })
            .map(|(metric, _)| *metric)
    }

    /// Coerces a cell to a number, degrading anything unparseable to 0.0.
    pub fn clean_currency(&self, cell: &CellValue) -> f64 {
        match cell {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Number(_) | CellValue::Empty => 0.0,
            CellValue::Text(s) => {
                let stripped: String = s.chars().filter(|c| !CURRENCY_SYMBOLS.contains(c)).collect();
                match stripped.trim().parse::<f64>() {
                    Ok(n) if n.is_finite() => n,
                    _ => 0.0,
                }
            }
        }
    }

    pub fn clean(&self, raw: &RawTable) -> Result<CleanTable> {
        let (columns, rows) = trim_structure(raw);
        if columns.is_empty() || rows.is_empty() {
            return Err(EngineError::EmptyInput(
                "table has no data after removing empty rows and columns".into(),
            ));
        }

        let mapping: Vec<ColumnMapping> = columns
            .iter()
            .map(|label| ColumnMapping {
                original: label.clone(),
                canonical: self.canonical_for(label),
            })
            .collect();

        for m in mapping.iter().filter(|m| m.canonical.is_some()) {
            debug!("Mapped column '{}' -> {:?}", m.original, m.canonical);
        }

        let renamed: Vec<String> = mapping
            .iter()
            .map(|m| match m.canonical {
                Some(metric) => metric.key().to_string(),
                None => m.original.clone(),
            })
            .collect();

        let coerced: Vec<Vec<CellValue>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&mapping)
                    .map(|(cell, m)| match m.canonical {
                        Some(metric) if Metric::NUMERIC.contains(&metric) => {
                            CellValue::Number(self.clean_currency(&cell))
                        }
                        _ => cell,
                    })
                    .collect()
            })
            .collect();

        let mut table = CleanTable {
            columns: renamed,
            rows: coerced,
            mapping,
        };

        let numeric = table.numeric_columns();
        if !numeric.is_empty() {
            let before = table.rows.len();
            table.rows.retain(|row| {
                numeric
                    .iter()
                    .any(|&c| matches!(row.get(c), Some(CellValue::Number(n)) if *n != 0.0))
            });
            let dropped = before - table.rows.len();
            if dropped > 0 {
                debug!("Dropped {} all-zero rows", dropped);
            }
        }

        Ok(table)
    }
}

/// Drops rows and columns whose cells are all blank.
fn trim_structure(raw: &RawTable) -> (Vec<String>, Vec<Vec<CellValue>>) {
    let rows: Vec<&Vec<CellValue>> = raw
        .rows
        .iter()
        .filter(|row| !row.iter().all(CellValue::is_blank))
        .collect();

    let kept_columns: Vec<usize> = (0..raw.columns.len())
        .filter(|&c| {
            rows.iter()
                .any(|row| row.get(c).is_some_and(|cell| !cell.is_blank()))
        })
        .collect();

    let columns = kept_columns
        .iter()
        .map(|&c| raw.columns[c].clone())
        .collect();

    let rows = rows
        .into_iter()
        .map(|row| {
            kept_columns
                .iter()
                .map(|&c| row.get(c).cloned().unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    (columns, rows)
}

/// Normalizes a raw table with the default synonym table.
pub fn clean_financial_data(raw: &RawTable) -> Result<CleanTable> {
    ColumnNormalizer::new().clean(raw)
}
