//! Chronos - Video Analysis Pipeline
//!
//! Hexagonal Architecture:
//! - domain/: Pure logic (clips, planner, segments, analysis, credentials, jobs)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Generic services
//! - config: Environment configuration
//!
//! # Features
//! - `local`: Local/monolith deployment (filesystem storage, Redis, HTTP API)
//! - `aws`: AWS deployment (S3, SQS, DynamoDB)
//! - `full`: All features

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod ports;

#[cfg(test)]
mod testing;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};

#[cfg(feature = "aws")]
pub use config::AwsConfig;

#[cfg(feature = "local")]
pub use config::LocalConfig;
