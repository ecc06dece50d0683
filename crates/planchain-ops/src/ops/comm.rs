//! Communication: outgoing mail is spooled to an outbox directory for a
//! separate transport to pick up.

use crate::params::{optional_str, require, require_str, Workspace};
use crate::registry::Operation;
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Serialize)]
struct OutboxMessage<'a> {
    id: String,
    to: Vec<String>,
    from: Option<&'a str>,
    subject: &'a str,
    body: &'a str,
    queued_at: String,
}

pub struct SendEmail {
    schema: OperationSchema,
    workspace: Workspace,
    outbox_dir: String,
}

impl SendEmail {
    pub fn new(workspace: Workspace, outbox_dir: impl Into<String>) -> Self {
        Self {
            schema: OperationSchema::new(
                "send_email",
                "communication",
                "Send an email to one or more recipients",
            )
            .param(ParamDef::required(
                "to_email",
                ParamType::Any,
                "Recipient address or list of addresses",
            ))
            .param(ParamDef::required("subject", ParamType::String, "Subject line"))
            .param(ParamDef::required("body", ParamType::String, "Message body"))
            .param(ParamDef::optional("from_email", ParamType::String, "Sender address", ""))
            .returns("message, message_id, outbox_path")
            .example("send_email('team@example.com', 'Report', 'Monthly report attached')"),
            workspace,
            outbox_dir: outbox_dir.into(),
        }
    }
}

/// Accepts a single address, a comma-separated string, or an array.
fn recipients(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait::async_trait]
impl Operation for SendEmail {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let to = recipients(require("send_email", &params, "to_email")?);
        let subject = require_str("send_email", &params, "subject")?;
        let body = require_str("send_email", &params, "body")?;
        let from = optional_str(&params, "from_email").filter(|s| !s.is_empty());

        if to.is_empty() {
            return Ok(OperationOutput::failure("No recipients given"));
        }
        if let Some(bad) = to.iter().find(|addr| !addr.contains('@')) {
            return Ok(OperationOutput::failure(format!(
                "Invalid email address: {}",
                bad
            )));
        }

        let message = OutboxMessage {
            id: uuid::Uuid::new_v4().to_string(),
            to: to.clone(),
            from,
            subject,
            body,
            queued_at: chrono::Utc::now().to_rfc3339(),
        };

        let dir = self.workspace.resolve(&self.outbox_dir);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            return Ok(OperationOutput::failure(format!(
                "Failed to create outbox {}: {}",
                dir.display(),
                e
            )));
        }
        let path = dir.join(format!("{}.json", message.id));
        let bytes = serde_json::to_vec_pretty(&message)?;
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            return Ok(OperationOutput::failure(format!(
                "Failed to spool message: {}",
                e
            )));
        }

        info!("Queued email {} to {}", message.id, to.join(", "));
        Ok(OperationOutput::ok()
            .with("message", format!("Email queued for {}", to.join(", ")))
            .with("message_id", message.id)
            .with("outbox_path", path.display().to_string()))
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
    fn recipient_forms() {
        assert_eq!(recipients(&json!("a@x.io, b@x.io")), vec!["a@x.io", "b@x.io"]);
        assert_eq!(recipients(&json!(["a@x.io"])), vec!["a@x.io"]);
        assert!(recipients(&json!(42)).is_empty());
    }

    #[tokio::test]
    async fn spools_message_file() {
        let dir = tempfile::tempdir().unwrap();
        let op = SendEmail::new(Workspace::new(dir.path()), "outbox");
        let out = op
            .invoke(params(json!({
                "to_email": "team@example.com",
                "subject": "Report",
                "body": "Totals attached"
            })))
            .await
            .unwrap();
        assert!(out.success);

        let path = out.fields["outbox_path"].as_str().unwrap();
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["to"], json!(["team@example.com"]));
        assert_eq!(saved["subject"], "Report");
    }

    #[tokio::test]
    async fn rejects_bad_address() {
        let dir = tempfile::tempdir().unwrap();
        let op = SendEmail::new(Workspace::new(dir.path()), "outbox");
        let out = op
            .invoke(params(json!({"to_email": "nobody", "subject": "s", "body": "b"})))
            .await
            .unwrap();
        assert!(out.is_error());
    }
}
