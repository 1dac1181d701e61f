pub mod capture;
pub mod chaos;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
