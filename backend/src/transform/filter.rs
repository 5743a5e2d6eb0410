//! Row filter: drop invalid rows and start a new batch.

use std::collections::BTreeSet;

use crate::api::logs::log_info;
use crate::models::{RowId, VocBatch, VocRow};

/// Remove the rows in `invalid` and return the rest as a new batch.
///
/// The result has a fresh identity with dense positions, so identifiers of
/// the input batch no longer resolve. Identifiers issued by any other batch
/// are ignored.
pub fn filter_rows(batch: VocBatch, invalid: &BTreeSet<RowId>) -> VocBatch {
    let dropped: BTreeSet<usize> = invalid
        .iter()
        .filter(|id| id.batch() == batch.id())
        .map(RowId::position)
        .collect();

    let before = batch.len();
    let rows: Vec<VocRow> = batch
        .into_rows()
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !dropped.contains(position))
        .map(|(_, row)| row)
        .collect();

    log_info(format!("Kept {} of {} VOC rows", rows.len(), before));
    VocBatch::new(rows)
}
