//! planchain operations: the registry plus the builtin operation library
//!
//! Each operation lives in src/ops/ grouped by category.

mod params;
pub mod ops;
pub mod registry;

pub use params::Workspace;
pub use registry::{Operation, OperationRegistry};

use planchain_core::{OpsConfig, Result};
use std::sync::Arc;

/// Every builtin operation, in registration order.
fn builtin_operations(config: &OpsConfig) -> Vec<Arc<dyn Operation>> {
    let ws = Workspace::new(&config.workspace_root);
    vec![
        // --- data_processing ---
        Arc::new(ops::data::ReadCsv::new(ws.clone())),
        Arc::new(ops::data::FilterData::new()),
        Arc::new(ops::data::SummarizeData::new()),
        Arc::new(ops::data::SortData::new()),
        Arc::new(ops::data::GroupBy::new()),
        // --- file_operations ---
        Arc::new(ops::file::ReadFile::new(ws.clone())),
        Arc::new(ops::file::WriteFile::new(ws.clone())),
        Arc::new(ops::file::ReadJson::new(ws.clone())),
        Arc::new(ops::file::WriteJson::new(ws.clone())),
        Arc::new(ops::file::ListDirectory::new(ws.clone())),
        Arc::new(ops::file::CopyFile::new(ws.clone())),
        Arc::new(ops::file::DeleteFile::new(ws.clone())),
        Arc::new(ops::file::CreateDirectory::new(ws.clone())),
        Arc::new(ops::file::GetFileInfo::new(ws.clone())),
        // --- math_operations ---
        Arc::new(ops::math::Calculate::new()),
        Arc::new(ops::math::CalculateStatistics::new()),
        // --- text_operations ---
        Arc::new(ops::text::AnalyzeText::new()),
        Arc::new(ops::text::FindReplace::new()),
        Arc::new(ops::text::ExtractPatterns::new()),
        Arc::new(ops::text::FormatText::new()),
        Arc::new(ops::text::GenerateHash::new()),
        Arc::new(ops::text::SplitText::new()),
        Arc::new(ops::text::JoinText::new()),
        // --- datetime_operations ---
        Arc::new(ops::datetime::GetCurrentTime::new()),
        Arc::new(ops::datetime::ParseDatetime::new()),
        Arc::new(ops::datetime::AddTime::new()),
        Arc::new(ops::datetime::CalculateDateDifference::new()),
        // --- web_operations ---
        Arc::new(ops::web::FetchWebPage::new()),
        Arc::new(ops::web::CheckWebsiteStatus::new()),
        Arc::new(ops::web::ExtractLinks::new()),
        // --- system_operations ---
        Arc::new(ops::system::ExecuteCommand::new(
            ws.clone(),
            config.command_timeout_secs,
        )),
        Arc::new(ops::system::GetSystemInfo::new()),
        // --- communication ---
        Arc::new(ops::comm::SendEmail::new(ws, config.outbox_dir.clone())),
    ]
}

/// Create the registry with every builtin operation.
pub fn create_default_registry(config: &OpsConfig) -> Result<OperationRegistry> {
    let mut registry = OperationRegistry::new();
    for op in builtin_operations(config) {
        registry.register_arc(op)?;
    }
    Ok(registry)
}

/// Create a registry holding only the named builtins.
///
/// Unknown names are logged and skipped, repeated names are registered once.
/// A plan that calls an operation left out here fails validation instead of
/// running.
pub fn create_scoped_registry(config: &OpsConfig, allowed: &[&str]) -> Result<OperationRegistry> {
    let mut registry = OperationRegistry::new();
    let builtins = builtin_operations(config);
    for name in allowed {
        if registry.contains(name) {
            continue;
        }
        match builtins.iter().find(|op| op.name() == *name) {
            Some(op) => registry.register_arc(op.clone())?,
            None => tracing::warn!("Unknown operation in scope list: {}", name),
        }
    }
    Ok(registry)
}
