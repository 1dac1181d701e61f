/// Request capture
///
/// - record: the captured-request type and its text rendering
/// - digest: streaming and buffered SHA-256 of request bodies
/// - history: bounded newest-first store fed by a single consumer
pub mod digest;
pub mod history;
pub mod record;
