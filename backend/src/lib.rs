//! # vocload - VOC spreadsheet validation and registration
//!
//! vocload checks a spreadsheet export of customer complaints (VOC) against
//! code tables and the personnel directory, maps the surviving rows to the
//! VOC application's form and submits them one by one.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐
//! │ VOC CSV  │──▶│  Parser  │──▶│ Validation │──▶│  Mapper  │──▶│  Submit  │
//! │(EUC-KR..)│   │(auto-enc)│   │ (2 passes) │   │(FormRec.)│   │  (HTTP)  │
//! └──────────┘   └──────────┘   └────────────┘   └──────────┘   └──────────┘
//!                                ▲          ▲
//!                          code tables   directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vocload::{load_batch, PipelineContext, Settings};
//! use vocload::directory::AnyDirectorySource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let source = AnyDirectorySource::connect(&settings.directory).await?;
//!     let context = PipelineContext::load(&settings, &source).await?;
//!     let prepared = context.prepare(load_batch("voc.csv".as_ref())?);
//!     println!("{} records ready", prepared.records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Settings from the environment
//! - [`models`] - VOC rows, batches, row ids and form records
//! - [`parser`] - CSV parsing with auto-detection
//! - [`reference`] - Code tables
//! - [`directory`] - Personnel directory and its sources
//! - [`validation`] - Row and VOC-type validation
//! - [`transform`] - Filtering, mapping and the pipeline
//! - [`ai`] - Optional VOC type inference
//! - [`http`] - Sessions, login and submission
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Inputs
pub mod directory;
pub mod parser;
pub mod reference;

// Validation and transformation
pub mod transform;
pub mod validation;

// Collaborators
pub mod ai;
pub mod http;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors and settings
// =============================================================================

pub use config::{Settings, WorkerContext};
pub use error::{
    AiError, ConfigError, CsvError, DirectoryError, HttpError, PipelineError, ReferenceError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{BatchId, FormRecord, RowId, VocBatch, VocField, VocRow};

// =============================================================================
// Re-exports - Lookups
// =============================================================================

pub use directory::{DirectoryEntry, DirectoryIndex};
pub use reference::{CodeMapping, CodeTables};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto, ParseResult,
};

// =============================================================================
// Re-exports - Validation and pipeline
// =============================================================================

pub use validation::{validate, validate_type_only, RuleFamily, ValidationReport, Violation};

pub use transform::{filter_rows, map_to_form_records, normalize_timestamp};
pub use transform::pipeline::{find_data_file, load_batch, ExcludedRow, PipelineContext, PreparedBatch};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
