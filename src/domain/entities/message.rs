use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One segment of a chat message (`{"type": "text", "data": {...}}`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Segment {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text", json!({ "text": text.into() }))
    }

    pub fn reply(message_id: i64) -> Self {
        Self::new("reply", json!({ "id": message_id.to_string() }))
    }

    pub fn at(user_id: i64) -> Self {
        Self::new("at", json!({ "qq": user_id.to_string() }))
    }

    /// Render segments as plain text, mostly for console output and logs
    pub fn plain_text(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|segment| match segment.kind.as_str() {
                "text" => segment.data["text"].as_str().unwrap_or_default().to_string(),
                "at" => format!("@{}", segment.data["qq"].as_str().unwrap_or_default()),
                "reply" => format!("[reply:{}]", segment.data["id"].as_str().unwrap_or_default()),
                other => format!("[{}]", other),
            })
            .collect()
    }
}

/// A node of a forwarded message bundle
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ForwardNode {
    pub user_id: i64,
    pub nickname: String,
    pub content: Vec<Segment>,
}

/// Inbound chat message
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageEvent {
    pub message_id: i64,
    /// `private` or `group`
    pub message_type: String,
    pub sub_type: String,
    pub user_id: i64,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub raw_message: String,
    #[serde(default)]
    pub message: Vec<Segment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageEvent {
    pub fn private(message_id: i64, user_id: i64, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message_id,
            message_type: "private".to_string(),
            sub_type: "friend".to_string(),
            user_id,
            group_id: None,
            message: vec![Segment::text(text.clone())],
            raw_message: text,
            extra: Map::new(),
        }
    }

    pub fn group(message_id: i64, group_id: i64, user_id: i64, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message_id,
            message_type: "group".to_string(),
            sub_type: "normal".to_string(),
            user_id,
            group_id: Some(group_id),
            message: vec![Segment::text(text.clone())],
            raw_message: text,
            extra: Map::new(),
        }
    }

    /// Mark the message as quoting an earlier one
    pub fn with_reply_to(mut self, message_id: i64) -> Self {
        self.message.insert(0, Segment::reply(message_id));
        self
    }

    pub fn end_point(&self) -> String {
        format!("message.{}.{}", self.message_type, self.sub_type)
    }

    pub fn is_reply(&self) -> bool {
        self.message
            .first()
            .map(|segment| segment.kind == "reply")
            .unwrap_or(false)
    }

    pub fn is_group(&self) -> bool {
        self.message_type == "group"
    }
}

/// Inbound notice (group changes, pokes, input status, ...)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NoticeEvent {
    pub notice_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoticeEvent {
    pub fn new(notice_type: impl Into<String>, sub_type: Option<&str>) -> Self {
        Self {
            notice_type: notice_type.into(),
            sub_type: sub_type.map(str::to_string),
            group_id: None,
            user_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// `notify` notices are ambiguous between chats, so they get a
    /// `.group` / `.friend` suffix.
    pub fn end_point(&self) -> String {
        let sub_type = self.sub_type.as_deref().unwrap_or_default();
        let mut end_point = format!("notice.{}.{}", self.notice_type, sub_type);

        if self.notice_type == "notify" {
            let in_group = match sub_type {
                // input_status carries group_id 0 for friend chats
                "input_status" => Some(matches!(self.group_id, Some(id) if id != 0)),
                "poke" => Some(self.group_id.is_some()),
                _ => None,
            };
            if let Some(in_group) = in_group {
                end_point.push_str(if in_group { ".group" } else { ".friend" });
            }
        }

        end_point
    }
}

/// Inbound friend / group request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestEvent {
    pub request_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    pub user_id: i64,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub flag: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestEvent {
    pub fn end_point(&self) -> String {
        format!(
            "request.{}.{}",
            self.request_type,
            self.sub_type.as_deref().unwrap_or_default()
        )
    }
}

/// Raw events delivered by a transport subscription
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(MessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
}
