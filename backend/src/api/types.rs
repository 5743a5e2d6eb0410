//! REST API types for the validation endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{PipelineError, ServerError};
use crate::models::FormRecord;
use crate::parser::ParseResult;
use crate::transform::pipeline::{ExcludedRow, PreparedBatch};

/// Response to a dry-run upload: the records that would be submitted and
/// the rows that would be left out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub job_id: String,

    /// "ready" when every row survived, "warning" otherwise
    pub status: String,

    pub records: Vec<FormRecord>,

    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub input_rows: usize,
    pub valid_rows: usize,
    pub excluded_rows: usize,
    pub csv_info: CsvMetadata,
    pub excluded: Vec<ExcludedRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl ValidateResponse {
    pub fn new(parsed: &ParseResult, prepared: PreparedBatch) -> Self {
        let status = if prepared.excluded.is_empty() { "ready" } else { "warning" };

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: ResponseMetadata {
                input_rows: prepared.input_count,
                valid_rows: prepared.records.len(),
                excluded_rows: prepared.excluded.len(),
                csv_info: CsvMetadata {
                    encoding: parsed.encoding.clone(),
                    delimiter: parsed.delimiter.to_string(),
                    row_count: parsed.records.len(),
                    columns: parsed.headers.clone(),
                },
                excluded: prepared.excluded,
            },
            records: prepared.records,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
        "metadata": {
            "inputRows": 0,
            "validRows": 0,
            "excludedRows": 0
        }
    })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) | ServerError::Pipeline(PipelineError::Csv(_)) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}
