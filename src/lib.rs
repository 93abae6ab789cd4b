//! Library exports for the trainer binary, benchmarks and tests.
/// Application directory resolution.
pub mod app_dirs;
/// Trainer configuration loading and validation.
pub mod config;
/// Feature extraction and data-quality gating.
pub mod features;
mod http_client;
/// Logging setup.
pub mod logging;
/// Logistic regression, metrics and cross-validation.
pub mod ml;
/// Training orchestration.
pub mod pipeline;
/// Request parsing, authorization and status mapping.
pub mod request;
/// Data access gateway.
pub mod store;
/// Weight versioning and activation.
pub mod versioning;
