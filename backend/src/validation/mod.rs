//! Row validation for VOC batches.
//!
//! Two passes run over a batch:
//!
//! ## First pass ([`validate`])
//! Three rule families are evaluated for every row, without short-circuit,
//! so each row's diagnostics are complete:
//! 1. required fields must be present and not blank
//! 2. receipt type, service and VOC type labels must exist in their code
//!    tables (a blank label is left to rule 1; a blank VOC type is allowed)
//! 3. the requester, when present, must be in the personnel directory
//!
//! ## Type-only pass ([`validate_type_only`])
//! Runs after the optional type inference. The VOC type must now be present
//! and mapped.
//!
//! Both passes return a [`ValidationReport`]; a row is invalid iff it has at
//! least one [`Violation`]. Diagnostics are grouped by [`RuleFamily`] for
//! reporting, in declaration order.
//!
//! # Example
//!
//! ```rust,ignore
//! let report = validate(&batch, &settings.required_fields, &tables, &directory);
//! report.log();
//! let batch = filter_rows(batch, &report.invalid_ids());
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::api::logs::{log_info, log_success, log_warning, log_warning_indent};
use crate::directory::DirectoryIndex;
use crate::models::{RowId, VocBatch, VocField, VocRow};
use crate::reference::{CodeMapping, CodeTables};

/// Rule families, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleFamily {
    MissingField,
    InvalidCode,
    UnknownRequester,
}

impl RuleFamily {
    pub const ALL: [RuleFamily; 3] = [
        RuleFamily::MissingField,
        RuleFamily::InvalidCode,
        RuleFamily::UnknownRequester,
    ];

    fn heading(&self) -> &'static str {
        match self {
            RuleFamily::MissingField => "Missing required values",
            RuleFamily::InvalidCode => "Invalid codes",
            RuleFamily::UnknownRequester => "Requesters not found in the directory",
        }
    }

    fn all_clear(&self) -> &'static str {
        match self {
            RuleFamily::MissingField => "All required values are present",
            RuleFamily::InvalidCode => "All codes are valid",
            RuleFamily::UnknownRequester => "All requesters exist in the directory",
        }
    }
}

/// One broken rule on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    /// Every required field that is absent or blank, in configured order.
    MissingFields { fields: Vec<VocField> },
    /// A label that is not in its code table.
    InvalidCode { field: VocField, value: String },
    /// A requester name that is not in the directory.
    UnknownRequester { name: String },
}

impl Violation {
    pub fn family(&self) -> RuleFamily {
        match self {
            Violation::MissingFields { .. } => RuleFamily::MissingField,
            Violation::InvalidCode { .. } => RuleFamily::InvalidCode,
            Violation::UnknownRequester { .. } => RuleFamily::UnknownRequester,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingFields { fields } => {
                let names: Vec<&str> = fields.iter().map(VocField::header).collect();
                write!(f, "missing -> {}", names.join(", "))
            }
            Violation::InvalidCode { field, value } => write!(f, "{} '{}' is not a valid code", field, value),
            Violation::UnknownRequester { name } => write!(f, "requester '{}' is not in the directory", name),
        }
    }
}

/// Outcome for one invalid row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowVerdict {
    #[serde(skip)]
    pub row: RowId,
    /// Spreadsheet line of the row.
    pub line: usize,
    pub violations: Vec<Violation>,
}

impl RowVerdict {
    pub fn has_family(&self, family: RuleFamily) -> bool {
        self.violations.iter().any(|v| v.family() == family)
    }

    /// Violations of one family, joined for display.
    pub fn describe(&self, family: RuleFamily) -> String {
        self.violations
            .iter()
            .filter(|v| v.family() == family)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Result of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Name of the pass, for logs.
    pub pass: &'static str,
    /// Number of rows checked.
    pub checked: usize,
    /// Invalid rows only, in input order.
    pub rejected: Vec<RowVerdict>,
    #[serde(skip)]
    families: Vec<RuleFamily>,
}

impl ValidationReport {
    /// Identifiers of every row with at least one violation.
    pub fn invalid_ids(&self) -> BTreeSet<RowId> {
        self.rejected.iter().map(|v| v.row).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.checked - self.rejected.len()
    }

    pub fn verdict(&self, row: RowId) -> Option<&RowVerdict> {
        self.rejected.iter().find(|v| v.row == row)
    }

    /// Rows with violations of `family`: (line, joined details).
    pub fn diagnostics(&self, family: RuleFamily) -> Vec<(usize, String)> {
        self.rejected
            .iter()
            .filter(|v| v.has_family(family))
            .map(|v| (v.line, v.describe(family)))
            .collect()
    }

    /// Families this pass checks, in reporting order.
    pub fn families(&self) -> &[RuleFamily] {
        &self.families
    }

    /// Diagnostics of every checked family, in reporting order. Families
    /// without violations are kept with an empty list.
    pub fn grouped(&self) -> Vec<(RuleFamily, Vec<(usize, String)>)> {
        self.families
            .iter()
            .map(|family| (*family, self.diagnostics(*family)))
            .collect()
    }

    /// Log diagnostics grouped by family.
    pub fn log(&self) {
        log_info(format!("{}: {} rows checked", self.pass, self.checked));

        for (family, entries) in self.grouped() {
            if entries.is_empty() {
                log_success(family.all_clear());
                continue;
            }
            log_warning(format!("{} ({} rows):", family.heading(), entries.len()));
            for (line, details) in entries {
                log_warning_indent(format!("line {}: {}", line, details), 1);
            }
        }

        if self.is_clean() {
            log_success(format!("{}: all {} rows valid", self.pass, self.checked));
        } else {
            log_warning(format!(
                "{}: {} valid, {} invalid",
                self.pass,
                self.valid_count(),
                self.rejected.len()
            ));
        }
    }
}

/// First-pass validator.
pub struct RowValidator<'a> {
    pub required: &'a [VocField],
    pub tables: &'a CodeTables,
    pub directory: &'a DirectoryIndex,
}

impl<'a> RowValidator<'a> {
    pub fn new(required: &'a [VocField], tables: &'a CodeTables, directory: &'a DirectoryIndex) -> Self {
        Self {
            required,
            tables,
            directory,
        }
    }

    /// Every violation of one row. Pure: depends on nothing but the row.
    pub fn check_row(&self, row: &VocRow) -> Vec<Violation> {
        let mut violations = Vec::new();

        let missing: Vec<VocField> = self.required.iter().copied().filter(|f| row.is_blank(*f)).collect();
        if !missing.is_empty() {
            violations.push(Violation::MissingFields { fields: missing });
        }

        let lookups = [
            (VocField::ReceiptType, &self.tables.receipt_type),
            (VocField::Service, &self.tables.service),
            (VocField::VocType, &self.tables.voc_type),
        ];
        for (field, mapping) in lookups {
            if let Some(violation) = check_code(row, field, mapping) {
                violations.push(violation);
            }
        }

        if let Some(name) = present(row, VocField::Requester) {
            if !self.directory.contains(name) {
                violations.push(Violation::UnknownRequester { name: name.to_string() });
            }
        }

        violations
    }

    pub fn validate(&self, batch: &VocBatch) -> ValidationReport {
        run_pass(
            "VOC data validation",
            batch,
            RuleFamily::ALL.to_vec(),
            |row| self.check_row(row),
        )
    }
}

/// First pass: required fields, code lookups and directory membership.
pub fn validate(
    batch: &VocBatch,
    required: &[VocField],
    tables: &CodeTables,
    directory: &DirectoryIndex,
) -> ValidationReport {
    RowValidator::new(required, tables, directory).validate(batch)
}

/// Second pass: the VOC type must be present and mapped.
pub fn validate_type_only(batch: &VocBatch, voc_types: &CodeMapping) -> ValidationReport {
    run_pass(
        "VOC type validation",
        batch,
        vec![RuleFamily::MissingField, RuleFamily::InvalidCode],
        |row| match check_code(row, VocField::VocType, voc_types) {
            Some(invalid) => vec![invalid],
            None if row.is_blank(VocField::VocType) => vec![Violation::MissingFields {
                fields: vec![VocField::VocType],
            }],
            None => Vec::new(),
        },
    )
}

fn run_pass<F>(pass: &'static str, batch: &VocBatch, families: Vec<RuleFamily>, check: F) -> ValidationReport
where
    F: Fn(&VocRow) -> Vec<Violation>,
{
    let rejected = batch
        .iter()
        .filter_map(|(id, row)| {
            let violations = check(row);
            (!violations.is_empty()).then(|| RowVerdict {
                row: id,
                line: row.line,
                violations,
            })
        })
        .collect();

    ValidationReport {
        pass,
        checked: batch.len(),
        rejected,
        families,
    }
}

/// Trimmed, non-blank value of a field.
fn present(row: &VocRow, field: VocField) -> Option<&str> {
    row.get(field).map(str::trim).filter(|v| !v.is_empty())
}

fn check_code(row: &VocRow, field: VocField, mapping: &CodeMapping) -> Option<Violation> {
    let label = present(row, field)?;
    if mapping.contains(label) {
        return None;
    }
    Some(Violation::InvalidCode {
        field,
        value: label.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryEntry;

    fn tables() -> CodeTables {
        CodeTables {
            voc_type: CodeMapping::from_pairs([("B", "30")]),
            receipt_type: CodeMapping::from_pairs([("A", "10")]),
            service: CodeMapping::from_pairs([("S1", "20")]),
        }
    }

    fn directory() -> DirectoryIndex {
        DirectoryIndex::from_entries([DirectoryEntry {
            name: "Kim".into(),
            employee_code: "E1".into(),
            ..Default::default()
        }])
    }

    fn valid_row() -> VocRow {
        VocRow {
            line: 2,
            requester: Some("Kim".into()),
            receipt_type: Some("A".into()),
            service: Some("S1".into()),
            voc_type: None,
            content: Some("printer is broken".into()),
            action: Some("replaced toner".into()),
            requested_at: Some("2024-01-05T10:30:00".into()),
            completed_at: Some("2024-01-05T11:00:00".into()),
            work_minutes: Some("30".into()),
            ..Default::default()
        }
    }

    fn first_pass(rows: Vec<VocRow>) -> (VocBatch, ValidationReport) {
        let batch = VocBatch::new(rows);
        let report = validate(&batch, &VocField::default_required(), &tables(), &directory());
        (batch, report)
    }

    #[test]
    fn test_complete_row_is_valid() {
        let (_, report) = first_pass(vec![valid_row()]);
        assert!(report.is_clean());
        assert!(report.invalid_ids().is_empty());
        assert_eq!(report.valid_count(), 1);
    }

    #[test]
    fn test_missing_fields_named_exactly() {
        let mut row = valid_row();
        row.service = None;
        row.work_minutes = Some("   ".into());

        let (batch, report) = first_pass(vec![row]);
        let (id, _) = batch.iter().next().unwrap();

        assert!(report.invalid_ids().contains(&id));
        let verdict = report.verdict(id).unwrap();
        assert_eq!(
            verdict.violations,
            vec![Violation::MissingFields {
                fields: vec![VocField::Service, VocField::WorkMinutes]
            }]
        );
    }

    #[test]
    fn test_absent_voc_type_passes_first_pass_only() {
        let (batch, report) = first_pass(vec![valid_row()]);
        assert!(report.is_clean());

        let type_report = validate_type_only(&batch, &tables().voc_type);
        let verdict = &type_report.rejected[0];
        assert_eq!(
            verdict.violations,
            vec![Violation::MissingFields {
                fields: vec![VocField::VocType]
            }]
        );
    }

    #[test]
    fn test_unmapped_voc_type_fails_both_passes() {
        let mut row = valid_row();
        row.voc_type = Some("Z".into());

        let (batch, report) = first_pass(vec![row]);
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].has_family(RuleFamily::InvalidCode));

        let type_report = validate_type_only(&batch, &tables().voc_type);
        assert_eq!(
            type_report.rejected[0].violations,
            vec![Violation::InvalidCode {
                field: VocField::VocType,
                value: "Z".into()
            }]
        );
    }

    #[test]
    fn test_mapped_voc_type_passes_type_only() {
        let mut row = valid_row();
        row.voc_type = Some("B".into());

        let batch = VocBatch::new(vec![row]);
        assert!(validate_type_only(&batch, &tables().voc_type).is_clean());
    }

    #[test]
    fn test_unknown_requester() {
        let mut row = valid_row();
        row.requester = Some("Unknown".into());

        let (batch, report) = first_pass(vec![row]);
        let (id, _) = batch.iter().next().unwrap();

        assert_eq!(report.invalid_ids(), BTreeSet::from([id]));
        assert_eq!(
            report.diagnostics(RuleFamily::UnknownRequester),
            vec![(2, "requester 'Unknown' is not in the directory".to_string())]
        );
    }

    #[test]
    fn test_all_families_evaluated_without_short_circuit() {
        let row = VocRow {
            line: 7,
            requester: Some("Nobody".into()),
            receipt_type: Some("X".into()),
            service: Some("Y".into()),
            voc_type: Some("Z".into()),
            ..Default::default()
        };

        let (_, report) = first_pass(vec![row]);
        let verdict = &report.rejected[0];

        assert!(verdict.has_family(RuleFamily::MissingField));
        assert!(verdict.has_family(RuleFamily::UnknownRequester));
        let codes = report.diagnostics(RuleFamily::InvalidCode);
        assert_eq!(codes.len(), 1);
        assert_eq!(
            codes[0].1,
            "접수유형 'X' is not a valid code; 소분류 'Y' is not a valid code; VOC유형 'Z' is not a valid code"
        );
    }

    #[test]
    fn test_grouped_diagnostics_follow_family_order() {
        let row = VocRow {
            line: 4,
            requester: Some("Nobody".into()),
            receipt_type: Some("X".into()),
            ..Default::default()
        };

        let (_, report) = first_pass(vec![row]);
        let grouped = report.grouped();

        let families: Vec<RuleFamily> = grouped.iter().map(|(family, _)| *family).collect();
        assert_eq!(families, RuleFamily::ALL.to_vec());
        assert!(grouped.iter().all(|(_, entries)| entries.len() == 1 && entries[0].0 == 4));
        assert!(grouped[0].1[0].1.starts_with("missing -> "));
        assert_eq!(grouped[1].1[0].1, "접수유형 'X' is not a valid code");
        assert_eq!(grouped[2].1[0].1, "requester 'Nobody' is not in the directory");
    }

    #[test]
    fn test_type_only_pass_reports_two_families() {
        let batch = VocBatch::new(vec![valid_row()]);
        let report = validate_type_only(&batch, &tables().voc_type);

        assert_eq!(report.families(), &[RuleFamily::MissingField, RuleFamily::InvalidCode]);
        let grouped = report.grouped();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].1, vec![(2, "missing -> VOC유형".to_string())]);
        assert!(grouped[1].1.is_empty());
    }

    #[test]
    fn test_absent_code_label_reported_once() {
        let mut row = valid_row();
        row.receipt_type = None;

        let (_, report) = first_pass(vec![row]);
        let verdict = &report.rejected[0];
        assert!(verdict.has_family(RuleFamily::MissingField));
        assert!(!verdict.has_family(RuleFamily::InvalidCode));
    }

    #[test]
    fn test_absent_requester_is_not_a_directory_miss() {
        let mut row = valid_row();
        row.requester = None;

        let (_, report) = first_pass(vec![row]);
        let verdict = &report.rejected[0];
        assert!(!verdict.has_family(RuleFamily::UnknownRequester));
    }

    #[test]
    fn test_result_independent_of_row_order() {
        let mut bad = valid_row();
        bad.requester = Some("Unknown".into());
        bad.line = 3;

        let (_, forward) = first_pass(vec![valid_row(), bad.clone()]);
        let (_, backward) = first_pass(vec![bad, valid_row()]);

        let lines = |r: &ValidationReport| r.rejected.iter().map(|v| v.line).collect::<Vec<_>>();
        assert_eq!(lines(&forward), vec![3]);
        assert_eq!(lines(&backward), vec![3]);
        assert_eq!(forward.invalid_ids().iter().next().unwrap().position(), 1);
        assert_eq!(backward.invalid_ids().iter().next().unwrap().position(), 0);
    }

    #[test]
    fn test_labels_are_trimmed_before_lookup() {
        let mut row = valid_row();
        row.receipt_type = Some(" A ".into());
        row.requester = Some("Kim ".into());

        let (_, report) = first_pass(vec![row]);
        assert!(report.is_clean());
    }
}
