//! Form mapper: validated VOC rows -> [`FormRecord`]s.
//!
//! Nothing here fails. Unmapped labels, unknown requesters and unparsable
//! timestamps all degrade to empty strings.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::api::logs::log_warning;
use crate::config::WorkerContext;
use crate::directory::{DirectoryEntry, DirectoryIndex};
use crate::models::{FormRecord, VocBatch, VocRow};
use crate::reference::{CodeMapping, CodeTables};

/// Canonical timestamp format of the VOC application.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y.%m.%d %H:%M",
    "%Y. %m. %d. %H:%M:%S",
    "%Y. %m. %d. %H:%M",
    "%Y-%m-%d %p %I:%M:%S",
    "%Y-%m-%d %p %I:%M",
    "%Y. %m. %d. %p %I:%M:%S",
    "%Y. %m. %d. %p %I:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y%m%d%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y. %m. %d.", "%m/%d/%Y", "%Y%m%d"];

/// Parse a timestamp written in any of the common spreadsheet layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim().replace("오전", "AM").replace("오후", "PM");
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `YYYY-MM-DD HH:MM:SS`, or an empty string when absent or unparsable.
pub fn normalize_timestamp(raw: Option<&str>) -> String {
    raw.and_then(parse_timestamp)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Map every row, stamping each record with the current time.
pub fn map_to_form_records(
    batch: &VocBatch,
    tables: &CodeTables,
    directory: &DirectoryIndex,
    worker: &WorkerContext,
) -> Vec<FormRecord> {
    batch
        .rows()
        .iter()
        .map(|row| map_row(row, tables, directory, worker, Local::now().naive_local()))
        .collect()
}

/// Map one row. `now` fills `update_date`.
pub fn map_row(
    row: &VocRow,
    tables: &CodeTables,
    directory: &DirectoryIndex,
    worker: &WorkerContext,
    now: NaiveDateTime,
) -> FormRecord {
    let requester = text(row.requester.as_deref());
    let unknown = DirectoryEntry::default();
    let contact = directory.get(&requester).unwrap_or(&unknown);
    if directory.is_ambiguous(&requester) {
        log_warning(format!(
            "line {}: requester '{}' matches several employees, using employee {}",
            row.line, requester, contact.employee_code
        ));
    }

    let requested_at = timestamp_field(row, row.requested_at.as_deref(), "requested at");
    let completed_at = timestamp_field(row, row.completed_at.as_deref(), "completed at");

    FormRecord {
        voc_no: String::new(),
        voc_date: String::new(),
        voc_seq: String::new(),
        service_cd: code(&tables.service, row.service.as_deref()),
        receive_cd: code(&tables.receipt_type, row.receipt_type.as_deref()),
        voc_cd: code(&tables.voc_type, row.voc_type.as_deref()),
        request_empno: contact.employee_code.clone(),
        request_empnm: requester,
        request_deptcd: contact.dept_code.clone(),
        request_deptnm: contact.dept_name.clone(),
        request_office_phone: contact.office_phone.clone(),
        request_mobile_phone: contact.mobile_phone.clone(),
        register_empno: worker.employee_code.clone(),
        register_empnm: worker.name.clone(),
        register_deptcd: worker.dept_code.clone(),
        register_deptnm: worker.dept_name.clone(),
        register_office_phone: worker.office_phone.clone(),
        register_mobile_phone: worker.mobile_phone.clone(),
        work_empno: worker.employee_code.clone(),
        work_empnm: worker.name.clone(),
        work_deptcd: worker.dept_code.clone(),
        work_deptnm: worker.dept_name.clone(),
        work_office_phone: worker.office_phone.clone(),
        work_mobile_phone: worker.mobile_phone.clone(),
        work_yn: text_or(row.actionable.as_deref(), "Y"),
        work_status: text_or(row.action_taken.as_deref(), "Y"),
        work_minute: text_or(row.work_minutes.as_deref(), "0"),
        fail_minute: "0".to_string(),
        insert_date: requested_at.clone(),
        request_date: requested_at,
        finish_date: completed_at,
        update_date: now.format(TIMESTAMP_FORMAT).to_string(),
        voc_contents: paragraph(row.content.as_deref()),
        work_contents: paragraph(row.action.as_deref()),
    }
}

fn timestamp_field(row: &VocRow, raw: Option<&str>, what: &str) -> String {
    let normalized = normalize_timestamp(raw);
    if normalized.is_empty() {
        if let Some(value) = raw.filter(|v| !v.trim().is_empty()) {
            log_warning(format!(
                "line {}: {} '{}' is not a recognizable date, sent empty",
                row.line, what, value
            ));
        }
    }
    normalized
}

fn code(mapping: &CodeMapping, label: Option<&str>) -> String {
    mapping.get(&text(label)).unwrap_or_default().to_string()
}

fn text(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn text_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

fn paragraph(value: Option<&str>) -> String {
    format!("<p>{}</p>", text(value))
}
