/// Failure and latency injection
///
/// - policy: probabilistic response stall with variance, runtime-tunable
/// - admission: in-flight ceiling that refuses excess requests
pub mod admission;
pub mod policy;
