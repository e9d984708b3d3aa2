use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }

    /// Sender tag used in the durable record.
    pub fn sender(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "bot",
        }
    }

    pub fn from_sender(sender: &str) -> Self {
        if sender == "user" { Role::User } else { Role::Assistant }
    }
}

/// One conversation turn. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Shape of a message inside the `chatMessages` durable record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub text: String,
    pub sender: String,
    pub timestamp: i64,
}

impl From<&Message> for StoredMessage {
    fn from(msg: &Message) -> Self {
        Self {
            text: msg.text.clone(),
            sender: msg.role.sender().to_string(),
            timestamp: msg.timestamp,
        }
    }
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Self {
            role: Role::from_sender(&stored.sender),
            text: stored.text,
            timestamp: stored.timestamp,
        }
    }
}
