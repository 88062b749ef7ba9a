//! Chat thread and message models of the community module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ThreadType {
    Supplier,
    Buyer,
    Support,
    Enquiry,
}

impl ThreadType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "supplier" => Some(ThreadType::Supplier),
            "buyer" => Some(ThreadType::Buyer),
            "support" => Some(ThreadType::Support),
            "enquiry" => Some(ThreadType::Enquiry),
            _ => None,
        }
    }
}

impl std::str::FromStr for ThreadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown thread type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Voice,
    System,
}

/// Delivery state of a message, in the order it advances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

/// A conversation with one or more participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: String,
    pub name: String,
    pub participants: Vec<String>,
    #[serde(rename = "type")]
    pub thread_type: ThreadType,
    pub unread_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A single message inside a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub thread_id: String,
    pub sender: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
}
