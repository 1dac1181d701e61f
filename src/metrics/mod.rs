/// Process-wide counters with Prometheus text export.
pub mod registry;
