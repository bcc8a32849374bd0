//! Configuration, prompt assembly, and the query pipeline that ties the
//! other crates together.

pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod prompt;

pub use config::Config;
pub use engine::{Engine, Health, SessionSnapshot};
pub use orchestrator::{QueryError, QueryRequest, QueryResult, SourceRef, Stage};
