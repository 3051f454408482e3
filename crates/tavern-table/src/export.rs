//! Message log export.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tavern_protocol::{Message, MessageRole, ProtocolError, Session, SessionId};

use crate::TableError;

/// Output format of [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A pretty-printed document with session metadata.
    #[default]
    Json,
    /// A readable transcript.
    Txt,
    /// `timestamp,role,content,author` rows with a header.
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Txt => "txt",
            Self::Csv => "csv",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            _ => Err(ProtocolError::InvalidValue {
                field: "format",
                value: s.to_owned(),
            }),
        }
    }
}

/// How a message's role reads in a transcript.
pub fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "Player",
        MessageRole::Model => "Game Master",
        MessageRole::System => "System",
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    session_id: SessionId,
    session_title: &'a str,
    exported_at: DateTime<Utc>,
    message_count: usize,
    messages: &'a [Message],
}

/// Renders `messages` (in creation order) of `session`.
pub fn render(
    format: ExportFormat,
    session: &Session,
    messages: &[Message],
    now: DateTime<Utc>,
) -> Result<String, TableError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&JsonExport {
            session_id: session.id,
            session_title: &session.title,
            exported_at: now,
            message_count: messages.len(),
            messages,
        })?),
        ExportFormat::Txt => Ok(render_txt(session, messages, now)),
        ExportFormat::Csv => Ok(render_csv(messages)),
    }
}

fn render_txt(session: &Session, messages: &[Message], now: DateTime<Utc>) -> String {
    let mut out = format!(
        "Session: {}\nExported on: {}\n{}\n\n",
        session.title,
        now.to_rfc3339(),
        "=".repeat(50)
    );
    for message in messages {
        out.push_str(&format!(
            "[{}] {}:\n{}\n\n",
            message.created_at.to_rfc3339(),
            role_label(message.role),
            message.content
        ));
    }
    out
}

fn render_csv(messages: &[Message]) -> String {
    let mut out = String::from("timestamp,role,content,author\r\n");
    for message in messages {
        let author = message.author.map(|a| a.0.to_string()).unwrap_or_default();
        let row = [
            message.created_at.to_rfc3339(),
            message.role.to_string(),
            message.content.clone(),
            author,
        ];
        let row: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Quotes a field when it holds a separator, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tavern_protocol::{IdentityId, MessageId, SessionStatus};

    use super::*;

    fn session() -> Session {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        Session {
            id: SessionId(9),
            token: "0".repeat(32),
            title: "The Sunken Crypt".into(),
            description: None,
            status: SessionStatus::Active,
            max_players: 4,
            creator: IdentityId(1),
            created_at: at,
            updated_at: at,
        }
    }

    fn message(id: u64, author: Option<u64>, role: MessageRole, content: &str) -> Message {
        Message {
            id: MessageId(id),
            session_id: SessionId(9),
            author: author.map(IdentityId),
            content: content.into(),
            role,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, id as u32).unwrap(),
        }
    }

    fn log() -> Vec<Message> {
        vec![
            message(1, Some(2), MessageRole::User, "I open the door"),
            message(2, Some(1), MessageRole::Model, "It creaks, \"loudly\", then stops"),
            message(3, None, MessageRole::System, "Rolled 1d20: [12] = 12"),
        ]
    }

    #[test]
    fn test_export_format_from_str_case_insensitive() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(" txt ".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert_eq!("Csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_render_json_carries_metadata_and_messages() {
        let out = render(ExportFormat::Json, &session(), &log(), Utc::now()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["session_id"], 9);
        assert_eq!(doc["session_title"], "The Sunken Crypt");
        assert_eq!(doc["message_count"], 3);
        assert_eq!(doc["messages"][1]["role"], "model");
        assert_eq!(doc["messages"][2]["author"], serde_json::Value::Null);
    }

    #[test]
    fn test_render_txt_uses_role_labels() {
        let out = render(ExportFormat::Txt, &session(), &log(), Utc::now()).unwrap();
        assert!(out.starts_with("Session: The Sunken Crypt\nExported on: "));
        assert!(out.contains(&"=".repeat(50)));
        assert!(out.contains("Player:\nI open the door\n"));
        assert!(out.contains("Game Master:\nIt creaks"));
        assert!(out.contains("System:\nRolled 1d20"));
    }

    #[test]
    fn test_render_csv_quotes_special_fields() {
        let out = render(ExportFormat::Csv, &session(), &log(), Utc::now()).unwrap();
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert_eq!(lines[0], "timestamp,role,content,author");
        assert!(lines[1].ends_with(",user,I open the door,2"));
        assert!(lines[2].ends_with(",model,\"It creaks, \"\"loudly\"\", then stops\",1"));
        assert!(lines[3].ends_with(",system,Rolled 1d20: [12] = 12,"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_render_empty_log() {
        let out = render(ExportFormat::Csv, &session(), &[], Utc::now()).unwrap();
        assert_eq!(out, "timestamp,role,content,author\r\n");
    }
}
