//! Handlers 模块

pub mod analyzers;
pub mod errors;
pub mod health;
pub mod mappings;
pub mod messages;
pub mod metrics;

pub use analyzers::*;
pub use errors::*;
pub use health::*;
pub use mappings::*;
pub use messages::*;
pub use metrics::*;

#[derive(serde::Deserialize)]
pub struct AnalyzerPath {
    pub analyzer_id: String,
}

#[derive(serde::Deserialize)]
pub struct ErrorPath {
    pub error_id: String,
}
