//! Admission control for new batches
//!
//! Bounds the total number of records that are accepted but not yet written.

/// Decide whether a batch fits under the pending record ceiling
///
/// A ceiling of zero or less disables the check and every batch is
/// admitted. Otherwise the batch is admitted when
/// `pending_records + batch_size <= max_pending_records`.
///
/// # Example
///
/// ```
/// use writepool::admit;
///
/// assert!(admit(800, 200, 1000));
/// assert!(!admit(800, 300, 1000));
/// assert!(admit(800, 300, 0));
/// ```
pub fn admit(pending_records: usize, batch_size: usize, max_pending_records: i64) -> bool {
    if max_pending_records <= 0 {
        return true;
    }

    (pending_records as u64).saturating_add(batch_size as u64) <= max_pending_records as u64
}
