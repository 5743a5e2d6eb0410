//! End-to-end preparation of a VOC batch.
//!
//! ```text
//! validate -> filter -> (infer types) -> validate type -> filter -> map
//! ```
//!
//! Nothing here talks to the remote application; the resulting
//! [`PreparedBatch`] is handed to [`crate::http::submit_all`].
//!
//! # Example
//!
//! ```rust,ignore
//! use vocload::transform::pipeline::{find_data_file, load_batch, PipelineContext};
//!
//! let context = PipelineContext::load(&settings, &directory_source).await?;
//! let batch = load_batch(&find_data_file(&settings.data_dir)?)?;
//! let prepared = context.prepare(batch);
//! println!("{} records ready", prepared.records.len());
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::filter::filter_rows;
use super::mapper::map_to_form_records;
use crate::ai::{EnrichmentSummary, TypeEnricher, TypeInferrer};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::{Settings, WorkerContext};
use crate::directory::{DirectoryIndex, DirectorySource};
use crate::error::{DirectoryError, PipelineError, PipelineResult};
use crate::models::{FormRecord, VocBatch, VocField};
use crate::parser::{parse_csv_file_auto, ParseResult};
use crate::reference::{load_code_tables, CodeTables};
use crate::validation::{validate, validate_type_only, ValidationReport};

/// Lookup tables and constants shared by every batch of a run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub tables: CodeTables,
    pub directory: DirectoryIndex,
    pub required: Vec<VocField>,
    pub worker: WorkerContext,
}

/// A row dropped by one of the validation passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedRow {
    /// Spreadsheet line (header is line 1).
    pub line: usize,
    pub requester: Option<String>,
    pub pass: &'static str,
    pub reasons: Vec<String>,
}

/// Output of [`PipelineContext::prepare`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedBatch {
    pub input_count: usize,
    pub records: Vec<FormRecord>,
    pub excluded: Vec<ExcludedRow>,
    pub inference: Option<EnrichmentSummary>,
    pub first_pass: ValidationReport,
    pub type_pass: ValidationReport,
}

impl PreparedBatch {
    /// Print the excluded-row report.
    pub fn log_excluded(&self) {
        if self.excluded.is_empty() {
            log_success("No rows excluded");
            return;
        }
        log_warning(format!("{} rows excluded:", self.excluded.len()));
        for row in &self.excluded {
            log_info_indent(
                format!(
                    "line {} ({}) [{}]: {}",
                    row.line,
                    row.requester.as_deref().unwrap_or("-"),
                    row.pass,
                    row.reasons.join("; ")
                ),
                1,
            );
        }
    }
}

impl PipelineContext {
    /// Fetch the directory and load the code tables described by `settings`.
    pub async fn load<S: DirectorySource>(settings: &Settings, source: &S) -> PipelineResult<Self> {
        log_info("Loading personnel directory...");
        let records = source.fetch_directory().await?;
        let directory = DirectoryIndex::build(&records);
        if directory.is_empty() {
            return Err(DirectoryError::Empty.into());
        }
        directory.log_summary();

        log_info("Loading code tables...");
        let tables = load_code_tables(&settings.references)?;

        Ok(Self {
            tables,
            directory,
            required: settings.required_fields.clone(),
            worker: settings.worker.clone(),
        })
    }

    /// Validate, filter and map without type inference.
    pub fn prepare(&self, batch: VocBatch) -> PreparedBatch {
        let input_count = batch.len();
        let (batch, first_pass, excluded) = self.first_stage(batch);
        self.second_stage(batch, input_count, first_pass, excluded, None)
    }

    /// Same as [`Self::prepare`], filling blank VOC types between the two passes.
    pub async fn prepare_with_inference<I: TypeInferrer>(
        &self,
        batch: VocBatch,
        enricher: &TypeEnricher<I>,
    ) -> PreparedBatch {
        let input_count = batch.len();
        let (mut batch, first_pass, excluded) = self.first_stage(batch);
        let summary = enricher.enrich(&mut batch, &self.tables.voc_type).await;
        self.second_stage(batch, input_count, first_pass, excluded, Some(summary))
    }

    fn first_stage(&self, batch: VocBatch) -> (VocBatch, ValidationReport, Vec<ExcludedRow>) {
        let report = validate(&batch, &self.required, &self.tables, &self.directory);
        report.log();

        let excluded = excluded_rows(&batch, &report);
        let kept = filter_rows(batch, &report.invalid_ids());
        (kept, report, excluded)
    }

    fn second_stage(
        &self,
        batch: VocBatch,
        input_count: usize,
        first_pass: ValidationReport,
        mut excluded: Vec<ExcludedRow>,
        inference: Option<EnrichmentSummary>,
    ) -> PreparedBatch {
        let type_pass = validate_type_only(&batch, &self.tables.voc_type);
        type_pass.log();

        excluded.extend(excluded_rows(&batch, &type_pass));
        let batch = filter_rows(batch, &type_pass.invalid_ids());

        let records = map_to_form_records(&batch, &self.tables, &self.directory, &self.worker);
        log_success(format!("{} of {} rows mapped to VOC form records", records.len(), input_count));

        PreparedBatch {
            input_count,
            records,
            excluded,
            inference,
            first_pass,
            type_pass,
        }
    }
}

fn excluded_rows(batch: &VocBatch, report: &ValidationReport) -> Vec<ExcludedRow> {
    report
        .rejected
        .iter()
        .map(|verdict| ExcludedRow {
            line: verdict.line,
            requester: batch.get(verdict.row).and_then(|r| r.requester.clone()),
            pass: report.pass,
            reasons: verdict.violations.iter().map(ToString::to_string).collect(),
        })
        .collect()
}

/// The single `.csv` file in `dir`.
pub fn find_data_file(dir: &Path) -> PipelineResult<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();

    match found.len() {
        0 => Err(PipelineError::NoDataFile(dir.to_path_buf())),
        1 => Ok(found.remove(0)),
        count => Err(PipelineError::MultipleDataFiles {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

/// Read a VOC spreadsheet export into a batch.
pub fn load_batch(path: &Path) -> PipelineResult<VocBatch> {
    log_info(format!("Reading {}", path.display()));
    let parsed = parse_csv_file_auto(path)?;
    Ok(batch_from_parsed(&parsed))
}

/// Build a batch from parsed records, logging what was detected.
pub fn batch_from_parsed(parsed: &ParseResult) -> VocBatch {
    log_success(format!(
        "Detected encoding {} and separator '{}'",
        parsed.encoding,
        format_delimiter(parsed.delimiter)
    ));

    let absent: Vec<&str> = VocField::ALL
        .iter()
        .map(VocField::header)
        .filter(|header| !parsed.has_column(header))
        .collect();
    if !absent.is_empty() {
        log_warning(format!("Columns not found in the file: {}", absent.join(", ")));
    }

    let batch = VocBatch::from_records(&parsed.records, &parsed.lines);
    log_success(format!("Read {} VOC rows", batch.len()));
    batch
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
