use serde::{Deserialize, Serialize};
use std::fmt;

/// A friend of the bot account, as listed by the transport
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FriendInfo {
    pub user_id: i64,
    pub nickname: String,
    #[serde(default)]
    pub remark: Option<String>,
}

impl FriendInfo {
    pub fn new(user_id: i64, nickname: impl Into<String>) -> Self {
        Self {
            user_id,
            nickname: nickname.into(),
            remark: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.remark.as_deref().unwrap_or(&self.nickname)
    }
}

impl fmt::Display for FriendInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Profile of a user looked up by id (group member or stranger)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub nickname: String,
    #[serde(default)]
    pub card: Option<String>,
}
