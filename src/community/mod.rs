//! Community chat held entirely in memory.
//!
//! Threads and messages live in a shared [`CommunityState`]. Sending appends a `sent` message
//! right away and a timer task later promotes it to `delivered`. There is no transport behind
//! it.

mod seed;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::client::{ErrorKind, ServiceError, ServiceResult};
use crate::models::{ChatMessage, ChatThread, DeliveryStatus, MessageKind, ThreadType};
use crate::query::{compare_text, Filter, ListState, ListView, Page, SortDirection};

/// Delay before a sent message shows as delivered.
pub const DELIVERY_DELAY: Duration = Duration::from_secs(1);

/// Sender name of messages written by the local user.
pub const LOCAL_SENDER: &str = "me";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadFilters {
    pub thread_type: Filter<ThreadType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadSortKey {
    #[default]
    LastActivity,
    Unread,
    Name,
}

/// Search, filter and sort rules for the thread list.
pub struct ThreadView;

impl ListView for ThreadView {
    type Item = ChatThread;
    type Filters = ThreadFilters;
    type SortKey = ThreadSortKey;

    fn search_fields(thread: &ChatThread) -> Vec<&str> {
        let mut fields = vec![thread.name.as_str()];
        fields.extend(thread.participants.iter().map(String::as_str));
        fields.extend(thread.last_message.as_deref());
        fields
    }

    fn matches_filters(filters: &ThreadFilters, thread: &ChatThread) -> bool {
        filters.thread_type.matches(&thread.thread_type)
    }

    fn compare(key: ThreadSortKey, a: &ChatThread, b: &ChatThread) -> Ordering {
        match key {
            ThreadSortKey::LastActivity => a.last_message_at.cmp(&b.last_message_at),
            ThreadSortKey::Unread => a.unread_count.cmp(&b.unread_count),
            ThreadSortKey::Name => compare_text(&a.name, &b.name),
        }
    }

    fn default_direction(key: ThreadSortKey) -> SortDirection {
        match key {
            ThreadSortKey::LastActivity | ThreadSortKey::Unread => SortDirection::Desc,
            ThreadSortKey::Name => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    threads: Vec<ChatThread>,
    messages: HashMap<String, Vec<ChatMessage>>,
    selected: Option<String>,
}

impl Inner {
    fn thread_mut(&mut self, id: &str) -> ServiceResult<&mut ChatThread> {
        self.threads
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ServiceError::new(ErrorKind::NotFound, format!("Thread {} not found", id)))
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages
            .values_mut()
            .flat_map(|messages| messages.iter_mut())
            .find(|m| m.id == id)
    }
}

/// Shared chat state. Clones refer to the same threads.
#[derive(Clone)]
pub struct CommunityState {
    inner: Arc<RwLock<Inner>>,
    delivery_delay: Duration,
}

impl CommunityState {
    pub fn new(threads: Vec<ChatThread>, messages: Vec<ChatMessage>) -> Self {
        let mut by_thread: HashMap<String, Vec<ChatMessage>> = HashMap::new();
        for message in messages {
            by_thread
                .entry(message.thread_id.clone())
                .or_default()
                .push(message);
        }
        Self {
            inner: Arc::new(RwLock::new(Inner {
                threads,
                messages: by_thread,
                selected: None,
            })),
            delivery_delay: DELIVERY_DELAY,
        }
    }

    /// State populated with the demo conversations.
    pub fn seeded() -> Self {
        let (threads, messages) = seed::conversations(Utc::now());
        Self::new(threads, messages)
    }

    pub fn with_delivery_delay(mut self, delay: Duration) -> Self {
        self.delivery_delay = delay;
        self
    }

    pub async fn threads(&self) -> Vec<ChatThread> {
        self.inner.read().await.threads.clone()
    }

    pub async fn thread(&self, id: &str) -> Option<ChatThread> {
        self.inner
            .read()
            .await
            .threads
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Threads matching the search and filters of `list`, sorted and paged.
    pub async fn visible_threads(&self, list: &ListState<ThreadView>) -> Page<ChatThread> {
        list.apply(&self.inner.read().await.threads)
    }

    pub async fn messages(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.inner
            .read()
            .await
            .messages
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn selected(&self) -> Option<String> {
        self.inner.read().await.selected.clone()
    }

    pub async fn total_unread(&self) -> u32 {
        self.inner
            .read()
            .await
            .threads
            .iter()
            .map(|t| t.unread_count)
            .sum()
    }

    /// Open a thread: its unread counter drops to zero and incoming messages become read.
    pub async fn select_thread(&self, id: &str) -> ServiceResult<Vec<ChatMessage>> {
        let mut inner = self.inner.write().await;
        inner.thread_mut(id)?.unread_count = 0;
        inner.selected = Some(id.to_string());

        let messages = inner.messages.entry(id.to_string()).or_default();
        for message in messages.iter_mut() {
            if message.sender != LOCAL_SENDER {
                message.status = DeliveryStatus::Read;
            }
        }
        Ok(messages.clone())
    }

    /// Append a message from the local user with status `sent`.
    ///
    /// After the delivery delay the message moves to `delivered`, unless it has already
    /// advanced further.
    pub async fn send_message(&self, thread_id: &str, content: &str) -> ServiceResult<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::validation("Message cannot be empty"));
        }

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            sender: LOCAL_SENDER.to_string(),
            content: content.to_string(),
            kind: MessageKind::Text,
            status: DeliveryStatus::Sent,
            sent_at: Utc::now(),
        };

        {
            let mut inner = self.inner.write().await;
            let thread = inner.thread_mut(thread_id)?;
            thread.last_message = Some(message.content.clone());
            thread.last_message_at = Some(message.sent_at);
            inner
                .messages
                .entry(thread_id.to_string())
                .or_default()
                .push(message.clone());
        }

        let inner = Arc::clone(&self.inner);
        let delay = self.delivery_delay;
        let message_id = message.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = inner.write().await;
            if let Some(message) = inner.message_mut(&message_id) {
                if message.status == DeliveryStatus::Sent {
                    message.status = DeliveryStatus::Delivered;
                    tracing::debug!(message_id = %message_id, "Message delivered");
                }
            }
        });

        Ok(message)
    }

    /// Record a message from another participant. Unread counts grow unless the thread is open.
    pub async fn receive_message(
        &self,
        thread_id: &str,
        sender: &str,
        content: &str,
    ) -> ServiceResult<ChatMessage> {
        let mut inner = self.inner.write().await;
        let is_open = inner.selected.as_deref() == Some(thread_id);

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            kind: MessageKind::Text,
            status: if is_open {
                DeliveryStatus::Read
            } else {
                DeliveryStatus::Delivered
            },
            sent_at: Utc::now(),
        };

        let thread = inner.thread_mut(thread_id)?;
        thread.last_message = Some(message.content.clone());
        thread.last_message_at = Some(message.sent_at);
        if !is_open {
            thread.unread_count += 1;
        }
        inner
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Advance a message's delivery status. Statuses never move backwards.
    pub async fn acknowledge(&self, message_id: &str, status: DeliveryStatus) -> ServiceResult<()> {
        let mut inner = self.inner.write().await;
        let message = inner.message_mut(message_id).ok_or_else(|| {
            ServiceError::new(ErrorKind::NotFound, format!("Message {} not found", message_id))
        })?;
        message.status = message.status.max(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: &str, name: &str, thread_type: ThreadType, unread: u32) -> ChatThread {
        ChatThread {
            id: id.to_string(),
            name: name.to_string(),
            participants: vec![name.to_string()],
            thread_type,
            unread_count: unread,
            last_message: None,
            last_message_at: None,
        }
    }

    #[tokio::test]
    async fn test_search_kumar_finds_only_rajesh() {
        let state = CommunityState::new(
            vec![
                thread("a", "Rajesh Kumar", ThreadType::Supplier, 0),
                thread("b", "Priya Sharma", ThreadType::Buyer, 0),
            ],
            Vec::new(),
        );
        let mut list = ListState::<ThreadView>::default();
        list.set_search("kumar");

        let page = state.visible_threads(&list).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Rajesh Kumar");
    }

    #[tokio::test]
    async fn test_seeded_threads_sort_by_activity_and_filter_by_type() {
        let state = CommunityState::seeded();
        let mut list = ListState::<ThreadView>::default();

        let names: Vec<_> = state
            .visible_threads(&list)
            .await
            .items
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            ["Rajesh Kumar", "Mehta Textiles", "Priya Sharma", "Bizdesk Support"]
        );

        list.update_filters(|f| f.thread_type = Filter::Only(ThreadType::Enquiry));
        let page = state.visible_threads(&list).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "mehta");

        list.update_filters(|f| f.thread_type = Filter::All);
        list.set_sort(ThreadSortKey::Unread);
        assert_eq!(state.visible_threads(&list).await.items[0].id, "rajesh");
        assert_eq!(state.total_unread().await, 3);
    }

    #[tokio::test]
    async fn test_select_thread_clears_unread() {
        let state = CommunityState::seeded();
        let messages = state.select_thread("rajesh").await.unwrap();

        assert_eq!(state.thread("rajesh").await.unwrap().unread_count, 0);
        assert_eq!(state.selected().await.as_deref(), Some("rajesh"));
        assert!(messages
            .iter()
            .filter(|m| m.sender != LOCAL_SENDER)
            .all(|m| m.status == DeliveryStatus::Read));
        assert_eq!(state.total_unread().await, 1);

        let err = state.select_thread("nobody").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_receive_counts_unread_only_when_closed() {
        let state = CommunityState::seeded();
        state.select_thread("priya").await.unwrap();

        let open = state.receive_message("priya", "Priya Sharma", "Thanks!").await.unwrap();
        assert_eq!(open.status, DeliveryStatus::Read);
        assert_eq!(state.thread("priya").await.unwrap().unread_count, 0);

        state
            .receive_message("support", "Support Team", "Scheduled maintenance tonight")
            .await
            .unwrap();
        let support = state.thread("support").await.unwrap();
        assert_eq!(support.unread_count, 1);
        assert_eq!(
            support.last_message.as_deref(),
            Some("Scheduled maintenance tonight")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sent_message_is_delivered_after_delay() {
        let state = CommunityState::seeded();
        let before = state.messages("priya").await.len();

        let sent = state.send_message("priya", "  Invoice attached  ").await.unwrap();
        assert_eq!(sent.status, DeliveryStatus::Sent);
        assert_eq!(sent.content, "Invoice attached");

        let messages = state.messages("priya").await;
        assert_eq!(messages.len(), before + 1);
        assert_eq!(messages.last().unwrap().status, DeliveryStatus::Sent);
        assert_eq!(
            state.thread("priya").await.unwrap().last_message.as_deref(),
            Some("Invoice attached")
        );

        tokio::time::sleep(DELIVERY_DELAY - Duration::from_millis(100)).await;
        assert_eq!(
            state.messages("priya").await.last().unwrap().status,
            DeliveryStatus::Sent
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        let messages = state.messages("priya").await;
        assert_eq!(messages.len(), before + 1);
        assert_eq!(messages.last().unwrap().status, DeliveryStatus::Delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_never_downgrades_a_read_message() {
        let state = CommunityState::seeded();
        let sent = state.send_message("rajesh", "Noted").await.unwrap();
        state.acknowledge(&sent.id, DeliveryStatus::Read).await.unwrap();

        tokio::time::sleep(DELIVERY_DELAY * 2).await;
        let last = state.messages("rajesh").await.pop().unwrap();
        assert_eq!(last.id, sent.id);
        assert_eq!(last.status, DeliveryStatus::Read);

        state.acknowledge(&sent.id, DeliveryStatus::Sent).await.unwrap();
        assert_eq!(
            state.messages("rajesh").await.pop().unwrap().status,
            DeliveryStatus::Read
        );
    }

    #[tokio::test]
    async fn test_blank_or_unknown_sends_are_rejected() {
        let state = CommunityState::seeded();
        let err = state.send_message("priya", "   ").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err = state.send_message("nobody", "hello").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(state.messages("nobody").await.is_empty());
    }
}
