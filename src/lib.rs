//! # Credit Risk Engine
//!
//! A library for turning uploaded financial statements into a credit-risk
//! view of a borrower: normalized metrics, ratio analysis, loan-aware
//! projections, debt service coverage and default-risk indicators.
//!
//! ## Core Concepts
//!
//! - **Ingestion**: CSV bytes, decoded workbooks and document text become raw tables or text records
//! - **Normalization**: Free-form column labels are mapped onto a fixed metric vocabulary
//! - **Classification**: Each table is recognized as an income statement, balance sheet or cash flow
//! - **Projection**: Historical metrics are rolled forward under an assumption set and a new loan
//! - **Risk**: Altman Z, a structural default model, a seeded Monte Carlo and regulatory limits
//!
//! Every stage is a pure function of its inputs. The caller carries state
//! between stages in an [`AnalysisContext`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use credit_risk_engine::*;
//!
//! let files = vec![UploadedFile::delimited(
//!     "income_2023.csv",
//!     "Year,Total Revenue,Cost of Sales,Net Profit\n2023,10000000,6000000,900000\n",
//! )];
//! let batch = process_uploaded_files(&files);
//!
//! let ctx = AnalysisContext::new(batch.historical_metrics())
//!     .with_loan(LoanTerms::new(5_000_000.0, 12.5, 36))
//!     .with_core_capital(40_000_000.0)
//!     .with_industry("Manufacturing - Food Processing");
//!
//! let report = run_credit_analysis(&ctx, &EngineConfig::default()).unwrap();
//! println!("Z-score: {:.2}", report.risk.altman_z_score);
//! ```

pub mod amortization;
pub mod assumptions;
pub mod classifier;
pub mod compliance;
pub mod config;
pub mod error;
pub mod extractor;
pub mod ingestion;
pub mod normalizer;
pub mod projections;
pub mod ratios;
pub mod risk;
pub mod schema;
pub mod utils;

pub use amortization::{calculate_loan_repayment_schedule, AmortizationSchedule, RepaymentRow};
pub use assumptions::{AssumptionSet, IndustryPreset, Scenario};
pub use classifier::{detect_financial_statement_type, StatementClassifier};
pub use compliance::RegulatoryLimits;
pub use config::{BenchmarkBand, EngineConfig, RatioAssessment, RiskParameters};
pub use error::{EngineError, Result};
pub use extractor::{
    extract_financial_metrics, validate_financial_data, MetricExtractor, ValidationReport,
};
pub use ingestion::*;
pub use normalizer::{clean_financial_data, ColumnNormalizer};
pub use projections::*;
pub use ratios::{comprehensive_ratio_analysis, Ratio, RatioAnalyzer, RatioBundle, YearRatios};
pub use risk::*;
pub use schema::*;
pub use utils::{compound_growth_rate, loan_affordability};

use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of running one table through cleaning, classification,
/// validation and extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementAnalysis {
    pub statement_type: StatementType,
    pub validation: ValidationReport,
    pub metrics: MetricSet,
    /// Cleaned table; its `mapping` records which source column became which metric
    pub table: CleanTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Statement(StatementAnalysis),
    Document(ExtractedText),
    Failed { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchOutcome {
    pub files: BTreeMap<String, FileOutcome>,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    /// One historical metric set across every analysed file. Files are
    /// visited in name order and the first value seen for a metric wins.
    pub fn historical_metrics(&self) -> MetricSet {
        self.files
            .values()
            .filter_map(|outcome| match outcome {
                FileOutcome::Statement(analysis) => Some(&analysis.metrics),
                _ => None,
            })
            .fold(MetricSet::new(), |merged, metrics| merged.merged_with(metrics))
    }

    pub fn succeeded(&self) -> usize {
        self.files
            .values()
            .filter(|o| !matches!(o, FileOutcome::Failed { .. }))
            .count()
    }
}

pub struct StatementProcessor;

impl StatementProcessor {
    pub fn analyze(raw: &RawTable) -> Result<StatementAnalysis> {
        let table = ColumnNormalizer::new().clean(raw)?;
        let statement_type = StatementClassifier::classify(&table.columns);
        let validation = MetricExtractor::validate(&table, statement_type);
        let metrics = MetricExtractor::extract(&table, statement_type);

        if statement_type == StatementType::Unknown {
            warn!(
                "Could not determine statement type from columns {:?}",
                table.columns
            );
        }
        for warning in &validation.warnings {
            debug!("Data quality warning: {}", warning);
        }

        Ok(StatementAnalysis {
            statement_type,
            validation,
            metrics,
            table,
        })
    }

    pub fn process_file(file: &UploadedFile) -> Result<FileOutcome> {
        match StatementIngestor::ingest(file)? {
            IngestedContent::Table(raw) => {
                let analysis = Self::analyze(&raw)?;
                info!(
                    "Processed {} as {} ({} metrics)",
                    file.name,
                    analysis.statement_type,
                    analysis.metrics.len()
                );
                Ok(FileOutcome::Statement(analysis))
            }
            IngestedContent::Text(text) => Ok(FileOutcome::Document(text)),
        }
    }

    /// Processes each file on its own; a failing file is recorded and the
    /// rest of the batch carries on.
    pub fn process_batch(files: &[UploadedFile]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for file in files {
            let result = Self::process_file(file).unwrap_or_else(|e| {
                let error = format!("Error processing {}: {}", file.name, e);
                warn!("{}", error);
                outcome.errors.push(error.clone());
                FileOutcome::Failed { error }
            });
            outcome.files.insert(file.name.clone(), result);
        }

        info!(
            "Processed {} files ({} failed)",
            files.len(),
            outcome.errors.len()
        );
        outcome
    }
}

pub fn process_uploaded_files(files: &[UploadedFile]) -> BatchOutcome {
    StatementProcessor::process_batch(files)
}

/// Caller-held state threaded between pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisContext {
    pub historical: MetricSet,
    #[serde(default)]
    pub assumptions: AssumptionSet,
    #[serde(default)]
    pub loan: Option<LoanTerms>,
    #[schemars(description = "Years to project. Falls back to the engine config when absent.")]
    #[serde(default)]
    pub projection_years: Option<u32>,
    #[schemars(description = "Lender's core capital, used for the single obligor limit")]
    #[serde(default)]
    pub core_capital: f64,
    #[serde(default)]
    pub industry: String,
}

impl AnalysisContext {
    pub fn new(historical: MetricSet) -> Self {
        Self {
            historical,
            assumptions: AssumptionSet::default(),
            loan: None,
            projection_years: None,
            core_capital: 0.0,
            industry: String::new(),
        }
    }

    pub fn with_assumptions(mut self, assumptions: AssumptionSet) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn with_loan(mut self, loan: LoanTerms) -> Self {
        self.loan = Some(loan);
        self
    }

    pub fn with_projection_years(mut self, years: u32) -> Self {
        self.projection_years = Some(years);
        self
    }

    pub fn with_core_capital(mut self, core_capital: f64) -> Self {
        self.core_capital = core_capital;
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub ratios: RatioBundle,
    pub projections: ProjectionSet,
    pub projection_ratios: Vec<YearRatios>,
    pub risk: RiskAssessment,
}

pub struct CreditAnalysisProcessor;

impl CreditAnalysisProcessor {
    pub fn run(ctx: &AnalysisContext, config: &EngineConfig) -> Result<AnalysisReport> {
        if ctx.historical.is_empty() {
            return Err(EngineError::EmptyInput(
                "no historical metrics to analyse".into(),
            ));
        }
        ctx.assumptions.validate()?;
        if let Some(loan) = &ctx.loan {
            loan.validate()?;
        }

        let years = ctx.projection_years.unwrap_or(config.projection_years);
        info!(
            "Running credit analysis for industry '{}' over {} years",
            ctx.industry, years
        );

        let analyzer = RatioAnalyzer::with_config(ctx.industry.clone(), config);
        let ratios = analyzer.analyze(&ctx.historical);

        let engine = ProjectionEngine::new(ctx.historical.clone(), ctx.assumptions.clone());
        let projections = engine.project_all(years, ctx.loan.as_ref())?;
        let projection_ratios = analyzer.analyze_projections(&projections.income, &projections.balance);

        let risk = RiskAssessment::assess(
            &projections,
            Some(&ratios),
            ctx.loan.as_ref(),
            ctx.core_capital,
            config,
        )?;

        Ok(AnalysisReport {
            ratios,
            projections,
            projection_ratios,
            risk,
        })
    }
}

pub fn run_credit_analysis(ctx: &AnalysisContext, config: &EngineConfig) -> Result<AnalysisReport> {
    CreditAnalysisProcessor::run(ctx, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(name: &str, body: &str) -> UploadedFile {
        UploadedFile::delimited(name, body)
    }

    #[test]
    fn test_batch_isolates_failures() {
        let files = vec![
            csv("a_income.csv", "Year,Revenue,Net Income\n2023,1000,100\n"),
            csv("b_empty.csv", "Revenue\n\n"),
            UploadedFile::delimited("c_notes.txt", "hello"),
            csv("d_balance.csv", "Total Assets,Total Liabilities\n5000,2000\n"),
        ];

        let batch = process_uploaded_files(&files);

        assert_eq!(batch.files.len(), 4);
        assert_eq!(batch.errors.len(), 2);
        assert_eq!(batch.succeeded(), 2);
        assert!(matches!(batch.files["b_empty.csv"], FileOutcome::Failed { .. }));
        assert!(matches!(batch.files["c_notes.txt"], FileOutcome::Failed { .. }));

        match &batch.files["d_balance.csv"] {
            FileOutcome::Statement(analysis) => {
                assert_eq!(analysis.statement_type, StatementType::BalanceSheet);
                assert_eq!(analysis.metrics.get(Metric::Equity), Some(3000.0));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_historical_metrics_first_file_wins() {
        let files = vec![
            csv("2_later.csv", "Revenue,Net Income\n999,99\n"),
            csv("1_first.csv", "Revenue,Cost of Sales\n1000,600\n"),
        ];
        let merged = process_uploaded_files(&files).historical_metrics();
        assert_eq!(merged.get(Metric::Revenue), Some(1000.0));
        assert_eq!(merged.get(Metric::Cogs), Some(600.0));
        assert_eq!(merged.get(Metric::NetIncome), Some(99.0));
    }

    #[test]
    fn test_document_outcome() {
        let files = vec![UploadedFile::document(
            "audit.pdf",
            vec!["Net margin and interest cover".into()],
        )];
        let batch = process_uploaded_files(&files);
        match &batch.files["audit.pdf"] {
            FileOutcome::Document(text) => assert_eq!(text.page_count, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(batch.historical_metrics().is_empty());
    }

    #[test]
    fn test_run_requires_history() {
        let ctx = AnalysisContext::new(MetricSet::new());
        let err = run_credit_analysis(&ctx, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput(_)));
    }

    #[test]
    fn test_run_validates_boundary_inputs() {
        let historical = MetricSet::new().with(Metric::Revenue, 1000.0);
        let bad_loan = AnalysisContext::new(historical.clone()).with_loan(LoanTerms::new(100.0, 5.0, 0));
        assert!(matches!(
            run_credit_analysis(&bad_loan, &EngineConfig::default()),
            Err(EngineError::InvalidLoanTerms { .. })
        ));

        let bad_assumptions = AnalysisContext::new(historical).with_assumptions(AssumptionSet {
            tax_rate: 1.5,
            ..Default::default()
        });
        assert!(matches!(
            run_credit_analysis(&bad_assumptions, &EngineConfig::default()),
            Err(EngineError::InvalidAssumption { .. })
        ));
    }

    #[test]
    fn test_projection_years_default_from_config() {
        let ctx = AnalysisContext::new(MetricSet::new().with(Metric::Revenue, 1000.0));
        let report = run_credit_analysis(&ctx, &EngineConfig::default()).unwrap();
        assert_eq!(report.projections.income.len(), 5);
        assert_eq!(report.projection_ratios.len(), 5);

        let report = run_credit_analysis(&ctx.with_projection_years(2), &EngineConfig::default())
            .unwrap();
        assert_eq!(report.projections.income.len(), 2);
    }
}
