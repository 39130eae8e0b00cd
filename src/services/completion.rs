/// An upload is complete when every declared sequence has arrived.
/// Counts are distinct sequences, so duplicates never get us here early.
pub fn is_complete(received_count: u32, total_chunks: u32) -> bool {
    total_chunks > 0 && received_count >= total_chunks
}

/// Progress in percent, for retention decisions and logs.
pub fn completion_percent(received: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (received as f64 / total as f64) * 100.0
}
