//! Domain models for the VOC import pipeline.
//!
//! - [`VocField`] - the spreadsheet columns the pipeline understands
//! - [`VocRow`] - one complaint record with typed, optional fields
//! - [`VocBatch`] - rows of one input batch, addressed by [`RowId`]
//! - [`FormRecord`] - the flat form posted to the VOC application

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Spreadsheet Columns
// =============================================================================

/// A column of the VOC spreadsheet.
///
/// Headers are the ones used by the exported VOC sheet; they are also the
/// names accepted in `REQUIRED_FIELDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VocField {
    Requester,
    ReceiptType,
    Service,
    VocType,
    Content,
    Action,
    RequestedAt,
    CompletedAt,
    WorkMinutes,
    Actionable,
    ActionTaken,
}

impl VocField {
    pub const ALL: [VocField; 11] = [
        VocField::Requester,
        VocField::ReceiptType,
        VocField::Service,
        VocField::VocType,
        VocField::Content,
        VocField::Action,
        VocField::RequestedAt,
        VocField::CompletedAt,
        VocField::WorkMinutes,
        VocField::Actionable,
        VocField::ActionTaken,
    ];

    /// Column header in the VOC spreadsheet.
    pub fn header(&self) -> &'static str {
        match self {
            VocField::Requester => "제기자",
            VocField::ReceiptType => "접수유형",
            VocField::Service => "소분류",
            VocField::VocType => "VOC유형",
            VocField::Content => "VOC내용",
            VocField::Action => "조치계획 및 진행상황",
            VocField::RequestedAt => "요청일시/등록일시",
            VocField::CompletedAt => "완료일시",
            VocField::WorkMinutes => "작업시간",
            VocField::Actionable => "조치가능여부",
            VocField::ActionTaken => "조치여부",
        }
    }

    /// Fields that must be filled unless `REQUIRED_FIELDS` says otherwise.
    pub fn default_required() -> Vec<VocField> {
        vec![
            VocField::Requester,
            VocField::ReceiptType,
            VocField::Service,
            VocField::RequestedAt,
            VocField::CompletedAt,
            VocField::WorkMinutes,
            VocField::Content,
        ]
    }
}

impl fmt::Display for VocField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for VocField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        VocField::ALL
            .into_iter()
            .find(|f| f.header() == name)
            .ok_or_else(|| format!("unknown VOC column '{}'", name))
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One VOC record. Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocRow {
    /// Spreadsheet line number (header is line 1). Survives filtering.
    pub line: usize,
    pub requester: Option<String>,
    pub receipt_type: Option<String>,
    pub service: Option<String>,
    pub voc_type: Option<String>,
    pub content: Option<String>,
    pub action: Option<String>,
    pub requested_at: Option<String>,
    pub completed_at: Option<String>,
    pub work_minutes: Option<String>,
    pub actionable: Option<String>,
    pub action_taken: Option<String>,
}

impl VocRow {
    /// Build a row from a parsed record (column header -> cell).
    pub fn from_record(record: &serde_json::Map<String, Value>, line: usize) -> Self {
        let cell = |field: VocField| -> Option<String> {
            match record.get(field.header()) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(Value::String(_)) => None,
                Some(other) => Some(other.to_string()),
            }
        };

        Self {
            line,
            requester: cell(VocField::Requester),
            receipt_type: cell(VocField::ReceiptType),
            service: cell(VocField::Service),
            voc_type: cell(VocField::VocType),
            content: cell(VocField::Content),
            action: cell(VocField::Action),
            requested_at: cell(VocField::RequestedAt),
            completed_at: cell(VocField::CompletedAt),
            work_minutes: cell(VocField::WorkMinutes),
            actionable: cell(VocField::Actionable),
            action_taken: cell(VocField::ActionTaken),
        }
    }

    /// Raw value of a field.
    pub fn get(&self, field: VocField) -> Option<&str> {
        let value = match field {
            VocField::Requester => &self.requester,
            VocField::ReceiptType => &self.receipt_type,
            VocField::Service => &self.service,
            VocField::VocType => &self.voc_type,
            VocField::Content => &self.content,
            VocField::Action => &self.action,
            VocField::RequestedAt => &self.requested_at,
            VocField::CompletedAt => &self.completed_at,
            VocField::WorkMinutes => &self.work_minutes,
            VocField::Actionable => &self.actionable,
            VocField::ActionTaken => &self.action_taken,
        };
        value.as_deref()
    }

    /// A field is blank when absent or whitespace only.
    pub fn is_blank(&self, field: VocField) -> bool {
        self.get(field).map_or(true, |v| v.trim().is_empty())
    }
}

// =============================================================================
// Batches and Row Identity
// =============================================================================

/// Identity of one input batch. A new one is minted by every filter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BatchId(Uuid);

impl BatchId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Opaque row identifier, only meaningful for the batch that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId {
    batch: BatchId,
    position: usize,
}

impl RowId {
    pub fn batch(&self) -> BatchId {
        self.batch
    }

    /// Zero-based position inside the issuing batch.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.position)
    }
}

/// The rows of one pipeline stage.
#[derive(Debug, Clone)]
pub struct VocBatch {
    id: BatchId,
    rows: Vec<VocRow>,
}

impl VocBatch {
    pub fn new(rows: Vec<VocRow>) -> Self {
        Self {
            id: BatchId::new(),
            rows,
        }
    }

    /// Build a batch from parsed records and the lines they were read from.
    /// A record without a known line is numbered by position, from 2.
    pub fn from_records(records: &[Value], lines: &[usize]) -> Self {
        let rows = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                let line = lines.get(i).copied().unwrap_or(i + 2);
                record.as_object().map(|obj| VocRow::from_record(obj, line))
            })
            .collect();
        Self::new(rows)
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[VocRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<VocRow> {
        self.rows
    }

    /// Rows with their identifiers, in input order.
    pub fn iter(&self) -> impl Iterator<Item = (RowId, &VocRow)> + '_ {
        let batch = self.id;
        self.rows
            .iter()
            .enumerate()
            .map(move |(position, row)| (RowId { batch, position }, row))
    }

    /// Mutable access for enrichment; identity is unchanged.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RowId, &mut VocRow)> + '_ {
        let batch = self.id;
        self.rows
            .iter_mut()
            .enumerate()
            .map(move |(position, row)| (RowId { batch, position }, row))
    }

    /// Look up a row; identifiers from another batch resolve to `None`.
    pub fn get(&self, id: RowId) -> Option<&VocRow> {
        if id.batch != self.id {
            return None;
        }
        self.rows.get(id.position)
    }

    /// Rows whose identifiers are in `ids`, in input order.
    pub fn select<'a>(&'a self, ids: &'a BTreeSet<RowId>) -> impl Iterator<Item = (RowId, &'a VocRow)> + 'a {
        self.iter().filter(move |(id, _)| ids.contains(id))
    }
}

// =============================================================================
// Form Record
// =============================================================================

/// The flat form expected by the VOC registration endpoint.
///
/// Field names are the form keys, so the struct serializes straight into an
/// `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub voc_no: String,
    pub voc_date: String,
    pub voc_seq: String,
    pub service_cd: String,
    pub receive_cd: String,
    pub voc_cd: String,
    pub request_empno: String,
    pub request_empnm: String,
    pub request_deptcd: String,
    pub request_deptnm: String,
    pub request_office_phone: String,
    pub request_mobile_phone: String,
    pub register_empno: String,
    pub register_empnm: String,
    pub register_deptcd: String,
    pub register_deptnm: String,
    pub register_office_phone: String,
    pub register_mobile_phone: String,
    pub work_empno: String,
    pub work_empnm: String,
    pub work_deptcd: String,
    pub work_deptnm: String,
    pub work_office_phone: String,
    pub work_mobile_phone: String,
    pub work_yn: String,
    pub work_status: String,
    pub work_minute: String,
    pub fail_minute: String,
    pub insert_date: String,
    pub request_date: String,
    pub finish_date: String,
    pub update_date: String,
    pub voc_contents: String,
    pub work_contents: String,
}
