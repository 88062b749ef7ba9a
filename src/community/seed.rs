//! Demo conversations the community screen starts with.

use chrono::{DateTime, Duration, Utc};

use crate::models::{ChatMessage, ChatThread, DeliveryStatus, MessageKind, ThreadType};

fn thread(
    id: &str,
    name: &str,
    participants: &[&str],
    thread_type: ThreadType,
    unread_count: u32,
) -> ChatThread {
    ChatThread {
        id: id.to_string(),
        name: name.to_string(),
        participants: participants.iter().map(|p| p.to_string()).collect(),
        thread_type,
        unread_count,
        last_message: None,
        last_message_at: None,
    }
}

fn message(
    thread_id: &str,
    n: u32,
    sender: &str,
    content: &str,
    status: DeliveryStatus,
    sent_at: DateTime<Utc>,
) -> ChatMessage {
    ChatMessage {
        id: format!("{}-m{}", thread_id, n),
        thread_id: thread_id.to_string(),
        sender: sender.to_string(),
        content: content.to_string(),
        kind: MessageKind::Text,
        status,
        sent_at,
    }
}

/// Threads and their messages, timestamped relative to `now`.
///
/// Thread last-message fields are filled from the final message of each thread.
pub fn conversations(now: DateTime<Utc>) -> (Vec<ChatThread>, Vec<ChatMessage>) {
    let mut threads = vec![
        thread("rajesh", "Rajesh Kumar", &["Rajesh Kumar"], ThreadType::Supplier, 2),
        thread("priya", "Priya Sharma", &["Priya Sharma"], ThreadType::Buyer, 0),
        thread(
            "mehta",
            "Mehta Textiles",
            &["Anil Mehta", "Sunita Mehta"],
            ThreadType::Enquiry,
            1,
        ),
        thread("support", "Bizdesk Support", &["Support Team"], ThreadType::Support, 0),
    ];

    let mins = Duration::minutes;
    let messages = vec![
        message("rajesh", 1, "me", "Can you confirm the cotton order?", DeliveryStatus::Read, now - mins(95)),
        message("rajesh", 2, "Rajesh Kumar", "Confirmed, 40 bales.", DeliveryStatus::Delivered, now - mins(50)),
        message("rajesh", 3, "Rajesh Kumar", "Consignment leaves tomorrow morning.", DeliveryStatus::Delivered, now - mins(12)),
        message("priya", 1, "Priya Sharma", "Please share the revised invoice.", DeliveryStatus::Read, now - mins(300)),
        message("priya", 2, "me", "Sent it over email just now.", DeliveryStatus::Read, now - mins(280)),
        message("mehta", 1, "Anil Mehta", "Do you stock 60s count yarn?", DeliveryStatus::Delivered, now - mins(30)),
        message("support", 1, "Support Team", "Your GST export is ready to download.", DeliveryStatus::Read, now - mins(1_440)),
    ];

    for thread in &mut threads {
        if let Some(last) = messages.iter().rev().find(|m| m.thread_id == thread.id) {
            thread.last_message = Some(last.content.clone());
            thread.last_message_at = Some(last.sent_at);
        }
    }
    (threads, messages)
}
