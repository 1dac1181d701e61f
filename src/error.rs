/// Capture-server errors.
/// These represent failures in request capture, history ingestion and configuration.
#[derive(thiserror::Error, Debug)]
pub enum PutterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("body read failed after {consumed} bytes: {source}")]
    BodyRead {
        consumed: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("history consumer is gone")]
    HistoryClosed,

    #[error("invalid history capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("invalid {name}: {value} ({reason})")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("unknown chaos field: {0}")]
    UnknownChaosField(String),

    #[error("lock poisoned")]
    LockPoisoned,
}
