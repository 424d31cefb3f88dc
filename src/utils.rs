use crate::schema::CellValue;
use chrono::{Datelike, Days, NaiveDate};

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d %b %Y",
];

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Reads a period label out of a date/year cell.
///
/// Accepts full dates in common layouts, `YYYY-MM` (month end), bare years and
/// fiscal-year labels such as `FY2023` (year end). Numeric cells are read as
/// years when they fall in 1000..=9999.
pub fn parse_period_cell(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(n) => {
            if n.fract() == 0.0 && (1000.0..=9999.0).contains(n) {
                last_day_of_month(*n as i32, 12)
            } else {
                None
            }
        }
        CellValue::Text(s) => parse_period_text(s),
        CellValue::Empty => None,
    }
}

fn parse_period_text(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    // "2023-06" -> month end
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d") {
        return last_day_of_month(date.year(), date.month());
    }

    let year_digits = text
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c.is_whitespace());
    if year_digits.len() == 4 {
        if let Ok(year) = year_digits.parse::<i32>() {
            return last_day_of_month(year, 12);
        }
    }

    None
}

/// Lowercased, trimmed label with underscores read as spaces.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace('_', " ")
}

/// `numerator / denominator`, or 0.0 when the denominator is not positive.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Compound annual growth rate between two values over `periods` years.
/// Returns 0.0 when the starting value is zero or there are no periods.
pub fn compound_growth_rate(initial: f64, final_value: f64, periods: u32) -> f64 {
    if initial == 0.0 || periods == 0 {
        return 0.0;
    }
    (final_value / initial).powf(1.0 / periods as f64) - 1.0
}

/// Largest monthly loan payment a borrower can afford: 40% of disposable income.
pub fn loan_affordability(
    monthly_income: f64,
    monthly_expenses: f64,
    existing_debt_payments: f64,
) -> f64 {
    let disposable_income = monthly_income - monthly_expenses - existing_debt_payments;
    disposable_income * 0.4
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2023, 2), Some(date(2023, 2, 28)));
        assert_eq!(last_day_of_month(2024, 2), Some(date(2024, 2, 29)));
        assert_eq!(last_day_of_month(2023, 12), Some(date(2023, 12, 31)));
    }

    #[test]
    fn test_parse_period_cell_variants() {
        assert_eq!(
            parse_period_cell(&CellValue::Number(2022.0)),
            Some(date(2022, 12, 31))
        );
        assert_eq!(
            parse_period_cell(&CellValue::Text("2023-06-30".into())),
            Some(date(2023, 6, 30))
        );
        assert_eq!(
            parse_period_cell(&CellValue::Text("31/03/2021".into())),
            Some(date(2021, 3, 31))
        );
        assert_eq!(
            parse_period_cell(&CellValue::Text("2023-06".into())),
            Some(date(2023, 6, 30))
        );
        assert_eq!(
            parse_period_cell(&CellValue::Text("FY2020".into())),
            Some(date(2020, 12, 31))
        );
        assert_eq!(parse_period_cell(&CellValue::Text("n/a".into())), None);
        assert_eq!(parse_period_cell(&CellValue::Number(12.5)), None);
        assert_eq!(parse_period_cell(&CellValue::Empty), None);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Net_Income "), "net income");
    }

    #[test]
    fn test_ratio_or_zero() {
        assert_eq!(ratio_or_zero(10.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(10.0, -5.0), 0.0);
        assert_eq!(ratio_or_zero(10.0, 4.0), 2.5);
    }

    #[test]
    fn test_compound_growth_rate() {
        let cagr = compound_growth_rate(100.0, 121.0, 2);
        assert!((cagr - 0.10).abs() < 1e-12);
        assert_eq!(compound_growth_rate(0.0, 121.0, 2), 0.0);
    }

    #[test]
    fn test_loan_affordability() {
        let max_payment = loan_affordability(100_000.0, 40_000.0, 10_000.0);
        assert!((max_payment - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_std_dev_is_population() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-12);
    }
}
