//! planchain core - plan/result types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    EngineConfig, HistoryConfig, OpsConfig, PlanchainConfig, PlannerConfig, RepairConfig,
    ResolverConfig,
};
pub use error::{Error, Result};
pub use types::*;
