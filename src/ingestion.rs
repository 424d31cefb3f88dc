use crate::error::{EngineError, Result};
use crate::schema::{CellValue, RawTable};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Header terms that mark a workbook sheet as holding financial data.
const SHEET_FINANCIAL_TERMS: &[&str] = &[
    "revenue",
    "income",
    "profit",
    "assets",
    "liabilities",
    "equity",
    "cash",
    "debt",
];

/// Header hits needed before a sheet is preferred over the first one.
const MIN_SHEET_TERM_HITS: usize = 2;

const DOCUMENT_FINANCIAL_TERMS: &[&str] = &[
    "revenue",
    "sales",
    "income",
    "profit",
    "loss",
    "assets",
    "liabilities",
    "equity",
    "cash",
    "debt",
    "loan",
    "interest",
    "tax",
    "ebitda",
    "ebit",
    "current ratio",
    "debt to equity",
    "return on equity",
    "net margin",
];

const EXCERPT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Sheet {
    pub name: String,
    pub table: RawTable,
}

/// File payload as handed over by the upload layer. Spreadsheets arrive
/// already decoded into sheets and documents as per-page text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum FileContent {
    Delimited(Vec<u8>),
    Workbook(Vec<Sheet>),
    Document(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadedFile {
    pub name: String,
    pub content: FileContent,
}

impl UploadedFile {
    pub fn delimited(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: FileContent::Delimited(bytes.into()),
        }
    }

    pub fn workbook(name: impl Into<String>, sheets: Vec<Sheet>) -> Self {
        Self {
            name: name.into(),
            content: FileContent::Workbook(sheets),
        }
    }

    pub fn document(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            content: FileContent::Document(pages),
        }
    }

    /// Lowercased text after the last dot, or empty when there is none.
    pub fn extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Csv,
    Excel,
    Pdf,
}

impl SourceKind {
    pub fn from_extension(file: &str, extension: &str) -> Result<Self> {
        match extension {
            "csv" => Ok(SourceKind::Csv),
            "xlsx" | "xls" => Ok(SourceKind::Excel),
            "pdf" => Ok(SourceKind::Pdf),
            other => Err(EngineError::UnsupportedSource {
                file: file.to_string(),
                extension: other.to_string(),
            }),
        }
    }
}

/// What a document yields instead of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedText {
    #[schemars(description = "First 2000 characters of the document text")]
    pub excerpt: String,
    pub page_count: usize,
    pub financial_terms_found: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestedContent {
    Table(RawTable),
    Text(ExtractedText),
}

pub struct StatementIngestor;

impl StatementIngestor {
    pub fn ingest(file: &UploadedFile) -> Result<IngestedContent> {
        let kind = SourceKind::from_extension(&file.name, &file.extension())?;

        let content = match (kind, &file.content) {
            (SourceKind::Csv, FileContent::Delimited(bytes)) => {
                IngestedContent::Table(Self::parse_delimited(&file.name, bytes)?)
            }
            (SourceKind::Excel, FileContent::Workbook(sheets)) => {
                let sheet = Self::select_sheet(sheets).ok_or_else(|| EngineError::Ingestion {
                    file: file.name.clone(),
                    details: "workbook has no sheets".into(),
                })?;
                info!("Processed workbook {}, sheet: {}", file.name, sheet.name);
                IngestedContent::Table(sheet.table.clone())
            }
            (SourceKind::Pdf, FileContent::Document(pages)) => {
                let text = Self::extract_text(pages);
                info!("Processed document {}, pages: {}", file.name, text.page_count);
                IngestedContent::Text(text)
            }
            (kind, _) => {
                return Err(EngineError::Ingestion {
                    file: file.name.clone(),
                    details: format!("content does not match a {:?} file", kind),
                })
            }
        };

        Ok(content)
    }

    /// Parses header-first delimited text. Bytes that are not valid UTF-8 are
    /// read as Latin-1.
    pub fn parse_delimited(name: &str, bytes: &[u8]) -> Result<RawTable> {
        let text = decode_text(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut table = RawTable::new(columns);

        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(CellValue::from_raw).collect());
        }

        debug!(
            "Parsed {}: {} columns, {} rows",
            name,
            table.columns.len(),
            table.rows.len()
        );
        Ok(table)
    }

    /// First sheet whose headers carry at least two financial terms, else the
    /// first sheet.
    pub fn select_sheet(sheets: &[Sheet]) -> Option<&Sheet> {
        sheets
            .iter()
            .find(|sheet| looks_like_financial_data(&sheet.table))
            .or_else(|| sheets.first())
    }

    pub fn extract_text(pages: &[String]) -> ExtractedText {
        let text: String = pages.concat();
        let lower = text.to_lowercase();

        ExtractedText {
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
            page_count: pages.len(),
            financial_terms_found: DOCUMENT_FINANCIAL_TERMS
                .iter()
                .filter(|term| lower.contains(*term))
                .map(|term| term.to_string())
                .collect(),
        }
    }
}

fn looks_like_financial_data(table: &RawTable) -> bool {
    if table.is_empty() {
        return false;
    }
    let headers: Vec<String> = table.columns.iter().map(|c| c.to_lowercase()).collect();
    let hits = SHEET_FINANCIAL_TERMS
        .iter()
        .filter(|term| headers.iter().any(|h| h.contains(*term)))
        .count();
    hits >= MIN_SHEET_TERM_HITS
}

/// UTF-8 when valid, otherwise each byte taken as a Latin-1 code point.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_csv_types_cells() {
        let csv = "Year,Total Revenue,Notes\n2022,\"1,000\",ok\n2023,1500,\n";
        let table = StatementIngestor::parse_delimited("fs.csv", csv.as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["Year", "Total Revenue", "Notes"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], CellValue::Number(2022.0));
        assert_eq!(table.rows[0][1], CellValue::Text("1,000".into()));
        assert_eq!(table.rows[1][1], CellValue::Number(1500.0));
        assert_eq!(table.rows[1][2], CellValue::Empty);
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xA3 is a pound sign in Latin-1 and invalid on its own in UTF-8
        let bytes = b"Revenue \xa3,Year\n100,2023\n";
        let table = StatementIngestor::parse_delimited("fs.csv", bytes).unwrap();
        assert_eq!(table.columns[0], "Revenue £");
        assert_eq!(table.rows[0][0], CellValue::Number(100.0));
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let csv = "a,b,c\n1\n1,2,3,4\n";
        let table = StatementIngestor::parse_delimited("x.csv", csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = UploadedFile::delimited("notes.docx", "x");
        match StatementIngestor::ingest(&file) {
            Err(EngineError::UnsupportedSource { extension, .. }) => assert_eq!(extension, "docx"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_content_must_match_extension() {
        let file = UploadedFile::document("statement.csv", vec!["page".into()]);
        let err = StatementIngestor::ingest(&file).unwrap_err();
        assert!(matches!(err, EngineError::Ingestion { .. }));
    }

    #[test]
    fn test_sheet_selection_prefers_financial_headers() {
        let cover = Sheet {
            name: "Cover".into(),
            table: RawTable::new(vec!["Company".into(), "Prepared by".into()])
                .with_row(vec![CellValue::Text("Acme".into()), CellValue::Empty]),
        };
        let pnl = Sheet {
            name: "P&L".into(),
            table: RawTable::new(vec!["Revenue".into(), "Net Profit".into()])
                .with_row(vec![CellValue::Number(1.0), CellValue::Number(2.0)]),
        };
        let sheets = vec![cover.clone(), pnl];
        assert_eq!(StatementIngestor::select_sheet(&sheets).unwrap().name, "P&L");

        let only_cover = vec![cover];
        assert_eq!(
            StatementIngestor::select_sheet(&only_cover).unwrap().name,
            "Cover"
        );
        assert!(StatementIngestor::select_sheet(&[]).is_none());
    }

    #[test]
    fn test_document_extraction() {
        let pages = vec![
            "Annual Report. Revenue grew; EBITDA margin improved.".to_string(),
            "Loan covenants: Debt to Equity below 2.".to_string(),
        ];
        let file = UploadedFile::document("report.PDF", pages);
        let IngestedContent::Text(text) = StatementIngestor::ingest(&file).unwrap() else {
            panic!("expected text");
        };
        assert_eq!(text.page_count, 2);
        assert_eq!(
            text.financial_terms_found,
            vec!["revenue", "equity", "debt", "loan", "ebitda", "ebit", "debt to equity"]
        );
    }

    #[test]
    fn test_excerpt_is_truncated_on_char_boundary() {
        let pages = vec!["₦".repeat(3000)];
        let text = StatementIngestor::extract_text(&pages);
        assert_eq!(text.excerpt.chars().count(), 2000);
    }
}
