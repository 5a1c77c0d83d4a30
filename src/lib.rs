pub mod bucket;
pub mod config;
pub mod engine;
pub mod era;
pub mod error;
pub mod escalation;
pub mod metrics;
pub mod model;
pub mod percentile;
pub mod store;
