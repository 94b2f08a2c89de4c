//! Queue job payloads and states

use serde::{Deserialize, Serialize};

use super::order::ChatMessage;

/// Extraction job payload, discriminated by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionJobPayload {
    SingleMessage {
        org_id: String,
        correlation_id: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        webhook_url: Option<String>,
    },
    ChatLog {
        org_id: String,
        correlation_id: String,
        messages: Vec<ChatMessage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        webhook_url: Option<String>,
    },
}

impl ExtractionJobPayload {
    pub fn org_id(&self) -> &str {
        match self {
            Self::SingleMessage { org_id, .. } | Self::ChatLog { org_id, .. } => org_id,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::SingleMessage { correlation_id, .. } | Self::ChatLog { correlation_id, .. } => {
                correlation_id
            }
        }
    }

    pub fn webhook_url(&self) -> Option<&str> {
        match self {
            Self::SingleMessage { webhook_url, .. } | Self::ChatLog { webhook_url, .. } => {
                webhook_url.as_deref()
            }
        }
    }

    /// Single messages run ahead of chat logs
    pub fn priority(&self) -> u8 {
        match self {
            Self::SingleMessage { .. } => 1,
            Self::ChatLog { .. } => 2,
        }
    }
}

/// Webhook delivery job payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJobPayload {
    pub webhook_url: String,
    pub payload: serde_json::Value,
    pub correlation_id: String,
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Delayed => "delayed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tag_roundtrip() {
        let job = ExtractionJobPayload::SingleMessage {
            org_id: "org_1".into(),
            correlation_id: "cid-1".into(),
            message: "5 kg rice".into(),
            webhook_url: None,
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "single_message");

        let back: ExtractionJobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.org_id(), "org_1");
        assert_eq!(back.priority(), 1);
    }

    #[test]
    fn test_chat_log_priority() {
        let job = ExtractionJobPayload::ChatLog {
            org_id: "org_2".into(),
            correlation_id: "cid-2".into(),
            messages: vec![ChatMessage {
                sender: "A".into(),
                text: "hello".into(),
                timestamp: None,
            }],
            webhook_url: Some("https://example.com/hook".into()),
        };
        assert_eq!(job.priority(), 2);
        assert_eq!(job.webhook_url(), Some("https://example.com/hook"));
    }
}
