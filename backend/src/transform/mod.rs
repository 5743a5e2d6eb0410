//! Transformation module.
//!
//! - Filter: drop invalid rows, re-identify the rest
//! - Mapper: VOC rows to form records
//! - Pipeline: both validation passes, filtering and mapping in order

pub mod filter;
pub mod mapper;
pub mod pipeline;

pub use filter::filter_rows;
pub use mapper::{map_row, map_to_form_records, normalize_timestamp, parse_timestamp};
pub use pipeline::*;
