/// Errors from writing to a key-value backend.
///
/// Reads never fail: unreadable or malformed data is reported as absent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}
