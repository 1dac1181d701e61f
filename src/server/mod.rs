/// HTTP surface
///
/// - listener: accept loop, one task per connection
/// - pipeline: routing and the per-request capture state machine
/// - body: HTTP body to byte-stream adapter for the digest engine
pub mod body;
pub mod listener;
pub mod pipeline;
