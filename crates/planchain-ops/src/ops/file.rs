//! File operations under the workspace: text, JSON, copies, deletes, directories, metadata

use crate::params::{bool_or, optional_str, require, require_str, u64_or, Workspace};
use crate::registry::Operation;
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

const CATEGORY: &str = "file_operations";

pub struct ReadFile {
    schema: OperationSchema,
    workspace: Workspace,
}

impl ReadFile {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new("read_file", CATEGORY, "Read the contents of a text file")
                .param(ParamDef::required("file_path", ParamType::String, "Path to the file"))
                .returns("content, size, lines")
                .example("read_file('notes.txt')"),
            workspace,
        }
    }
}

#[async_trait::async_trait]
impl Operation for ReadFile {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("read_file", &params, "file_path")?;
        let resolved = self.workspace.resolve(path);
        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => {
                let size = content.len();
                let lines = content.lines().count();
                debug!("read_file: {} ({} bytes)", path, size);
                Ok(OperationOutput::data(content.clone())
                    .with("content", content)
                    .with("size", size)
                    .with("lines", lines))
            }
            Err(e) => Ok(OperationOutput::failure(format!(
                "Failed to read file {}: {}",
                path, e
            ))),
        }
    }
}

pub struct WriteFile {
    schema: OperationSchema,
    workspace: Workspace,
}

impl WriteFile {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new("write_file", CATEGORY, "Write text content to a file")
                .param(ParamDef::required("file_path", ParamType::String, "Destination path"))
                .param(ParamDef::required("content", ParamType::Any, "Content to write"))
                .param(ParamDef::optional(
                    "append",
                    ParamType::Boolean,
                    "Append instead of overwrite",
                    false,
                ))
                .returns("file_path, bytes_written"),
            workspace,
        }
    }
}

/// Non-string content (e.g. a chained result) is written as pretty JSON.
fn content_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[async_trait::async_trait]
impl Operation for WriteFile {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        use tokio::io::AsyncWriteExt;

        let path = require_str("write_file", &params, "file_path")?;
        let content = content_text(require("write_file", &params, "content")?);
        let append = bool_or(&params, "append", false);
        let resolved = self.workspace.resolve(path);

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Ok(OperationOutput::failure(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    )));
                }
            }
        }

        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(&resolved)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        }
        .await;

        match written {
            Ok(()) => Ok(OperationOutput::ok()
                .with("file_path", path)
                .with("bytes_written", content.len())),
            Err(e) => Ok(OperationOutput::failure(format!(
                "Failed to write file {}: {}",
                path, e
            ))),
        }
    }
}

pub struct ReadJson {
    schema: OperationSchema,
    workspace: Workspace,
}

impl ReadJson {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new("read_json", CATEGORY, "Read and parse a JSON file")
                .param(ParamDef::required("file_path", ParamType::String, "Path to the JSON file"))
                .returns("data: parsed JSON value"),
            workspace,
        }
    }
}

#[async_trait::async_trait]
impl Operation for ReadJson {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("read_json", &params, "file_path")?;
        let resolved = self.workspace.resolve(path);
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(OperationOutput::failure(format!(
                    "Failed to read JSON file {}: {}",
                    path, e
                )))
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(data) => Ok(OperationOutput::data(data)),
            Err(e) => Ok(OperationOutput::failure(format!(
                "Invalid JSON in {}: {}",
                path, e
            ))),
        }
    }
}

pub struct WriteJson {
    schema: OperationSchema,
    workspace: Workspace,
}

impl WriteJson {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new("write_json", CATEGORY, "Write a value to a JSON file")
                .param(ParamDef::required("file_path", ParamType::String, "Destination path"))
                .param(ParamDef::required("data", ParamType::Any, "Value to serialize"))
                .param(ParamDef::optional(
                    "indent",
                    ParamType::Integer,
                    "Spaces per indentation level",
                    2,
                ))
                .returns("file_path, bytes_written"),
            workspace,
        }
    }
}

fn to_json_indented(value: &Value, indent: usize) -> serde_json::Result<Vec<u8>> {
    let pad = vec![b' '; indent];
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&pad);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

#[async_trait::async_trait]
impl Operation for WriteJson {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("write_json", &params, "file_path")?;
        let data = require("write_json", &params, "data")?;
        let indent = u64_or(&params, "indent", 2) as usize;
        let bytes = to_json_indented(data, indent)?;

        let resolved = self.workspace.resolve(path);
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
        match tokio::fs::write(&resolved, &bytes).await {
            Ok(()) => Ok(OperationOutput::ok()
                .with("file_path", path)
                .with("bytes_written", bytes.len())),
            Err(e) => Ok(OperationOutput::failure(format!(
                "Failed to write JSON file {}: {}",
                path, e
            ))),
        }
    }
}

pub struct ListDirectory {
    schema: OperationSchema,
    workspace: Workspace,
}

impl ListDirectory {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new(
                "list_directory",
                CATEGORY,
                "List files and directories at a path",
            )
            .param(ParamDef::optional(
                "directory_path",
                ParamType::String,
                "Directory to list",
                ".",
            ))
            .param(ParamDef::optional(
                "include_hidden",
                ParamType::Boolean,
                "Include dot-files",
                false,
            ))
            .returns("items: entries with name, type, size; count"),
            workspace,
        }
    }
}

#[derive(Serialize)]
struct DirEntry {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    size: u64,
}

#[async_trait::async_trait]
impl Operation for ListDirectory {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = optional_str(&params, "directory_path").unwrap_or(".");
        let include_hidden = bool_or(&params, "include_hidden", false);
        let resolved = self.workspace.resolve(path);

        let mut reader = match tokio::fs::read_dir(&resolved).await {
            Ok(r) => r,
            Err(e) => {
                return Ok(OperationOutput::failure(format!(
                    "Failed to list directory {}: {}",
                    path, e
                )))
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !include_hidden && name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            entries.push(DirEntry {
                name,
                kind: if meta.is_dir() { "directory" } else { "file" },
                size: if meta.is_dir() { 0 } else { meta.len() },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let count = entries.len();
        let items = serde_json::to_value(&entries)?;
        Ok(OperationOutput::data(items.clone())
            .with("items", items)
            .with("count", count))
    }
}

pub struct CopyFile {
    schema: OperationSchema,
    workspace: Workspace,
}

impl CopyFile {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new(
                "copy_file",
                CATEGORY,
                "Copy a file from source to destination",
            )
            .param(ParamDef::required("source_path", ParamType::String, "File to copy"))
            .param(ParamDef::required(
                "destination_path",
                ParamType::String,
                "Target path; parent directories are created",
            ))
            .returns("source_path, destination_path, bytes_copied"),
            workspace,
        }
    }
}

#[async_trait::async_trait]
impl Operation for CopyFile {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let source = require_str("copy_file", &params, "source_path")?;
        let destination = require_str("copy_file", &params, "destination_path")?;
        let from = self.workspace.resolve(source);
        let to = self.workspace.resolve(destination);

        if let Some(parent) = to.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
        match tokio::fs::copy(&from, &to).await {
            Ok(bytes) => Ok(OperationOutput::ok()
                .with("source_path", source)
                .with("destination_path", destination)
                .with("bytes_copied", bytes)),
            Err(e) => Ok(OperationOutput::failure(format!(
                "Failed to copy {} to {}: {}",
                source, destination, e
            ))),
        }
    }
}

pub struct DeleteFile {
    schema: OperationSchema,
    workspace: Workspace,
}

impl DeleteFile {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new("delete_file", CATEGORY, "Delete a file (not a directory)")
                .param(ParamDef::required("file_path", ParamType::String, "File to delete"))
                .returns("file_path"),
            workspace,
        }
    }
}

#[async_trait::async_trait]
impl Operation for DeleteFile {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("delete_file", &params, "file_path")?;
        let resolved = self.workspace.resolve(path);
        match tokio::fs::metadata(&resolved).await {
            Err(_) => return Ok(OperationOutput::failure(format!("File {} not found", path))),
            Ok(meta) if meta.is_dir() => {
                return Ok(OperationOutput::failure(format!(
                    "{} is a directory, not a file",
                    path
                )))
            }
            Ok(_) => {}
        }
        match tokio::fs::remove_file(&resolved).await {
            Ok(()) => Ok(OperationOutput::ok().with("file_path", path)),
            Err(e) => Ok(OperationOutput::failure(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }
}

pub struct CreateDirectory {
    schema: OperationSchema,
    workspace: Workspace,
}

impl CreateDirectory {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new("create_directory", CATEGORY, "Create a new directory")
                .param(ParamDef::required(
                    "directory_path",
                    ParamType::String,
                    "Directory to create",
                ))
                .param(ParamDef::optional(
                    "parents",
                    ParamType::Boolean,
                    "Create missing parents; an existing directory is fine",
                    true,
                ))
                .returns("directory_path"),
            workspace,
        }
    }
}

#[async_trait::async_trait]
impl Operation for CreateDirectory {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("create_directory", &params, "directory_path")?;
        let resolved = self.workspace.resolve(path);
        let created = if bool_or(&params, "parents", true) {
            tokio::fs::create_dir_all(&resolved).await
        } else {
            tokio::fs::create_dir(&resolved).await
        };
        match created {
            Ok(()) => Ok(OperationOutput::ok().with("directory_path", path)),
            Err(e) => Ok(OperationOutput::failure(format!(
                "Failed to create directory {}: {}",
                path, e
            ))),
        }
    }
}

pub struct GetFileInfo {
    schema: OperationSchema,
    workspace: Workspace,
}

impl GetFileInfo {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new(
                "get_file_info",
                CATEGORY,
                "Get detailed information about a file",
            )
            .param(ParamDef::required("file_path", ParamType::String, "File or directory"))
            .returns("info: name, path, size, created, modified, accessed, is_file, extension"),
            workspace,
        }
    }
}

/// RFC 3339 in UTC; `None` where the platform doesn't record the time.
fn rfc3339(time: std::io::Result<std::time::SystemTime>) -> Option<String> {
    time.ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
}

#[async_trait::async_trait]
impl Operation for GetFileInfo {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("get_file_info", &params, "file_path")?;
        let resolved = self.workspace.resolve(path);
        let meta = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(_) => return Ok(OperationOutput::failure(format!("File {} not found", path))),
        };

        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = resolved
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let info = serde_json::json!({
            "name": name,
            "path": resolved.display().to_string(),
            "size": meta.len(),
            "created": rfc3339(meta.created()),
            "modified": rfc3339(meta.modified()),
            "accessed": rfc3339(meta.accessed()),
            "is_file": meta.is_file(),
            "is_directory": meta.is_dir(),
            "extension": extension,
        });
        Ok(OperationOutput::data(info.clone()).with("info", info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn indent_is_respected() {
        let bytes = to_json_indented(&json!({"a": 1}), 4).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n    \"a\": 1\n}");
    }

    #[tokio::test]
    async fn write_then_read_text() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let out = WriteFile::new(ws.clone())
            .invoke(params(json!({"file_path": "nested/out.txt", "content": "a\nb\n"})))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.fields["bytes_written"], 4);

        let read = ReadFile::new(ws)
            .invoke(params(json!({"file_path": "nested/out.txt"})))
            .await
            .unwrap();
        assert_eq!(read.fields["content"], "a\nb\n");
        assert_eq!(read.fields["lines"], 2);
    }

    #[tokio::test]
    async fn append_mode_extends_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let op = WriteFile::new(ws);
        op.invoke(params(json!({"file_path": "log.txt", "content": "one\n"})))
            .await
            .unwrap();
        op.invoke(params(json!({"file_path": "log.txt", "content": "two\n", "append": true})))
            .await
            .unwrap();
        let text = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(text, "one\ntwo\n");
    }

    #[tokio::test]
    async fn missing_file_is_a_failed_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = ReadFile::new(Workspace::new(dir.path()))
            .invoke(params(json!({"file_path": "absent.txt"})))
            .await
            .unwrap();
        assert!(out.is_error());
        assert!(out.error.unwrap().contains("absent.txt"));
    }

    #[tokio::test]
    async fn list_directory_sorted_with_types() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "xy").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        let out = ListDirectory::new(Workspace::new(dir.path()))
            .invoke(params(json!({})))
            .await
            .unwrap();
        assert_eq!(out.fields["count"], 2);
        assert_eq!(out.fields["items"][0]["name"], "a");
        assert_eq!(out.fields["items"][0]["type"], "directory");
        assert_eq!(out.fields["items"][1]["size"], 2);
    }

    #[tokio::test]
    async fn copy_creates_destination_parents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "payload").unwrap();
        let out = CopyFile::new(Workspace::new(dir.path()))
            .invoke(params(json!({
                "source_path": "src.txt",
                "destination_path": "backup/2024/src.txt"
            })))
            .await
            .unwrap();
        assert!(out.success, "{:?}", out.error);
        assert_eq!(out.fields["bytes_copied"], 7);
        let copied = std::fs::read_to_string(dir.path().join("backup/2024/src.txt")).unwrap();
        assert_eq!(copied, "payload");
        assert!(dir.path().join("src.txt").exists());
    }

    #[tokio::test]
    async fn copy_of_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = CopyFile::new(Workspace::new(dir.path()))
            .invoke(params(json!({"source_path": "nope", "destination_path": "x"})))
            .await
            .unwrap();
        assert!(out.is_error());
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn delete_removes_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.log"), "x").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();
        let op = DeleteFile::new(Workspace::new(dir.path()));

        let out = op.invoke(params(json!({"file_path": "old.log"}))).await.unwrap();
        assert!(out.success);
        assert!(!dir.path().join("old.log").exists());

        let again = op.invoke(params(json!({"file_path": "old.log"}))).await.unwrap();
        assert_eq!(again.error.as_deref(), Some("File old.log not found"));

        let on_dir = op.invoke(params(json!({"file_path": "keep"}))).await.unwrap();
        assert!(on_dir.error.unwrap().contains("is a directory"));
        assert!(dir.path().join("keep").is_dir());
    }

    #[tokio::test]
    async fn create_directory_with_and_without_parents() {
        let dir = tempfile::tempdir().unwrap();
        let op = CreateDirectory::new(Workspace::new(dir.path()));

        let strict = op
            .invoke(params(json!({"directory_path": "a/b", "parents": false})))
            .await
            .unwrap();
        assert!(strict.is_error());

        let out = op
            .invoke(params(json!({"directory_path": "a/b"})))
            .await
            .unwrap();
        assert!(out.success);
        assert!(dir.path().join("a/b").is_dir());

        // Existing directories are accepted when parents is on.
        let twice = op
            .invoke(params(json!({"directory_path": "a/b"})))
            .await
            .unwrap();
        assert!(twice.success);
    }

    #[tokio::test]
    async fn file_info_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.csv"), "a,b\n").unwrap();
        let op = GetFileInfo::new(Workspace::new(dir.path()));

        let out = op
            .invoke(params(json!({"file_path": "report.csv"})))
            .await
            .unwrap();
        let info = &out.fields["info"];
        assert_eq!(info["name"], "report.csv");
        assert_eq!(info["size"], 4);
        assert_eq!(info["extension"], ".csv");
        assert_eq!(info["is_file"], true);
        assert!(info["modified"].as_str().unwrap().contains('T'));

        let on_dir = op.invoke(params(json!({"file_path": "."}))).await.unwrap();
        assert_eq!(on_dir.fields["info"]["is_directory"], true);
        assert_eq!(on_dir.fields["info"]["extension"], "");

        let missing = op.invoke(params(json!({"file_path": "gone"}))).await.unwrap();
        assert!(missing.is_error());
    }
}
