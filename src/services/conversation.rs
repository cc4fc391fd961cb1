use tokio::sync::broadcast;

use crate::models::{Conversation, Message, Role};
use crate::services::storage::Storage;

pub const CONVERSATIONS_KEY: &str = "conversations";

const TITLE_MAX_CHARS: usize = 30;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Optional fields supplied at conversation creation.
#[derive(Debug, Clone, Default)]
pub struct ConversationSeed {
    pub title: Option<String>,
    pub model: Option<String>,
}

/// Partial update merged into an existing conversation. The id and the
/// message list are not reachable through this path; messages change
/// only via [`ConversationStore::add_message`].
#[derive(Debug, Clone, Default)]
pub struct ConversationUpdate {
    pub title: Option<String>,
    pub model: Option<String>,
}

/// Change notification emitted after every store mutation. Presentation
/// subscribes and re-renders on receipt instead of re-deriving state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Created(String),
    MessageAdded(String),
    Updated(String),
    Deleted(String),
    Cleared,
    ActiveChanged(Option<String>),
}

/// Authoritative in-memory state of all conversations and the active
/// pointer. Sole mutator of conversation state; every mutation is
/// followed by a flush of the whole collection to storage.
///
/// Collection order is newest first: new conversations are inserted at
/// the front, and the front is what "most recent" means everywhere.
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    max_conversations: usize,
    storage: Storage,
    events: broadcast::Sender<StoreEvent>,
}

impl ConversationStore {
    /// Load prior state from storage. A missing or corrupt blob starts
    /// empty. The newest conversation, if any, becomes active.
    pub fn new(storage: Storage, max_conversations: usize) -> Self {
        let conversations: Vec<Conversation> =
            storage.load(CONVERSATIONS_KEY).unwrap_or_default();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut store = Self {
            conversations,
            active_id: None,
            max_conversations,
            storage,
            events,
        };
        if store.enforce_retention() {
            store.flush();
        }
        store.active_id = store.conversations.first().map(|c| c.id.clone());
        store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// The conversation the active pointer refers to; `None` when the
    /// pointer is unset or refers to an id no longer in the collection.
    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Allocate a new conversation at the front of the collection and
    /// make it active. Returns the new id.
    pub fn create_conversation(&mut self, seed: ConversationSeed) -> String {
        let conversation = Conversation::new(seed.title, seed.model);
        let id = conversation.id.clone();

        self.conversations.insert(0, conversation);
        self.enforce_retention();
        self.active_id = Some(id.clone());
        self.flush();

        self.emit(StoreEvent::Created(id.clone()));
        self.emit(StoreEvent::ActiveChanged(Some(id.clone())));
        id
    }

    /// Append a message to the active conversation, creating one first
    /// if none is active. The first user message also fixes the title.
    pub fn add_message(&mut self, content: &str, role: Role) -> Message {
        if self.active_conversation().is_none() {
            self.create_conversation(ConversationSeed::default());
        }

        let message = Message::new(role, content);

        let active_id = self.active_id.clone();
        let Some(conv) = self
            .conversations
            .iter_mut()
            .find(|c| Some(c.id.as_str()) == active_id.as_deref())
        else {
            // Unreachable: create_conversation above always establishes
            // an active conversation.
            return message;
        };

        if conv.messages.is_empty() && role == Role::User {
            conv.title = derive_title(content);
        }
        conv.messages.push(message.clone());
        conv.touch();

        let id = conv.id.clone();
        self.flush();
        self.emit(StoreEvent::MessageAdded(id));
        message
    }

    /// Merge a partial update into the conversation matching `id`.
    /// Refreshes the timestamp; no-op when the id is unknown.
    pub fn update_conversation(&mut self, id: &str, updates: ConversationUpdate) {
        let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) else {
            return;
        };

        if let Some(title) = updates.title {
            conv.title = title;
        }
        if let Some(model) = updates.model {
            conv.model = Some(model);
        }
        conv.touch();

        self.flush();
        self.emit(StoreEvent::Updated(id.to_string()));
    }

    /// Remove the conversation matching `id`. Deleting the active one
    /// promotes the most recent remaining conversation, or clears the
    /// pointer when the collection is empty. No-op on unknown ids.
    pub fn delete_conversation(&mut self, id: &str) {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return;
        }

        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.conversations.first().map(|c| c.id.clone());
            self.emit(StoreEvent::ActiveChanged(self.active_id.clone()));
        }

        self.flush();
        self.emit(StoreEvent::Deleted(id.to_string()));
    }

    /// Point the active pointer at `id` directly. Callers normally pass
    /// an id picked from the known collection; an unknown id is allowed
    /// structurally and simply makes `active_conversation()` yield None.
    pub fn set_active(&mut self, id: &str) {
        self.active_id = Some(id.to_string());
        self.emit(StoreEvent::ActiveChanged(self.active_id.clone()));
    }

    pub fn clear_all(&mut self) {
        self.conversations.clear();
        self.active_id = None;
        self.flush();
        self.emit(StoreEvent::Cleared);
        self.emit(StoreEvent::ActiveChanged(None));
    }

    /// Apply a new retention cap (settings change) and trim immediately.
    pub fn set_max_conversations(&mut self, max: usize) {
        self.max_conversations = max;
        if self.enforce_retention() {
            self.flush();
        }
    }

    /// Trim the oldest conversations past the retention cap. Repairs the
    /// active pointer if its target was trimmed. Returns whether
    /// anything was dropped.
    fn enforce_retention(&mut self) -> bool {
        if self.conversations.len() <= self.max_conversations {
            return false;
        }
        self.conversations.truncate(self.max_conversations);

        let active_gone = match self.active_id.as_deref() {
            Some(id) => !self.conversations.iter().any(|c| c.id == id),
            None => false,
        };
        if active_gone {
            self.active_id = self.conversations.first().map(|c| c.id.clone());
            self.emit(StoreEvent::ActiveChanged(self.active_id.clone()));
        }
        true
    }

    fn flush(&self) {
        if let Err(e) = self.storage.save(CONVERSATIONS_KEY, &self.conversations) {
            tracing::error!("Failed to persist conversations: {}", e);
        }
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

/// Derive a conversation title from its first user message: the first
/// line, truncated to a bounded length with an ellipsis when longer.
pub fn derive_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text).trim();
    if first_line.is_empty() {
        return crate::models::conversation::DEFAULT_TITLE.to_string();
    }
    if first_line.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(max: usize) -> (tempfile::TempDir, ConversationStore) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::at(dir.path().join("data")).unwrap();
        let store = ConversationStore::new(storage, max);
        (dir, store)
    }

    fn assert_active_is_valid(store: &ConversationStore) {
        match store.active_id() {
            None => assert!(store.conversations().is_empty()),
            Some(id) => assert!(store.conversations().iter().any(|c| c.id == id)),
        }
    }

    #[test]
    fn test_create_sets_active_and_orders_newest_first() {
        let (_dir, mut store) = temp_store(50);

        let first = store.create_conversation(ConversationSeed::default());
        let second = store.create_conversation(ConversationSeed::default());

        assert_eq!(store.conversations().len(), 2);
        assert_eq!(store.conversations()[0].id, second);
        assert_eq!(store.conversations()[1].id, first);
        assert_eq!(store.active_id(), Some(second.as_str()));
        assert_eq!(store.conversations()[0].title, "New Chat");
        assert_active_is_valid(&store);
    }

    #[test]
    fn test_create_with_seed() {
        let (_dir, mut store) = temp_store(50);

        let id = store.create_conversation(ConversationSeed {
            title: Some("Planning".to_string()),
            model: Some("m1".to_string()),
        });

        let conv = store.active_conversation().unwrap();
        assert_eq!(conv.id, id);
        assert_eq!(conv.title, "Planning");
        assert_eq!(conv.model.as_deref(), Some("m1"));
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn test_add_message_on_empty_store_synthesizes_one_conversation() {
        let (_dir, mut store) = temp_store(50);

        let msg = store.add_message("Hello", Role::User);

        assert_eq!(store.conversations().len(), 1);
        let conv = store.active_conversation().unwrap();
        assert_eq!(conv.title, "Hello");
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].role, Role::User);
        assert_eq!(conv.messages[0].content, "Hello");
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_title_derived_from_first_user_message_only() {
        let (_dir, mut store) = temp_store(50);

        store.add_message("First question", Role::User);
        store.add_message("An answer", Role::Assistant);
        store.add_message("Second question", Role::User);

        let conv = store.active_conversation().unwrap();
        assert_eq!(conv.title, "First question");
        assert_eq!(conv.messages.len(), 3);
    }

    #[test]
    fn test_assistant_first_message_keeps_placeholder_title() {
        let (_dir, mut store) = temp_store(50);

        store.add_message("Welcome aboard", Role::Assistant);

        let conv = store.active_conversation().unwrap();
        assert_eq!(conv.title, "New Chat");
    }

    #[test]
    fn test_long_title_is_truncated_with_ellipsis() {
        let (_dir, mut store) = temp_store(50);

        let long = "This is a very long first message that keeps going";
        store.add_message(long, Role::User);

        let conv = store.active_conversation().unwrap();
        let expected: String = long.chars().take(30).collect();
        assert_eq!(conv.title, format!("{}...", expected));
    }

    #[test]
    fn test_short_title_is_verbatim() {
        let (_dir, mut store) = temp_store(50);
        store.add_message("Short enough", Role::User);
        assert_eq!(store.active_conversation().unwrap().title, "Short enough");
    }

    #[test]
    fn test_title_uses_first_line() {
        let (_dir, mut store) = temp_store(50);
        store.add_message("Line one\nand a second line", Role::User);
        assert_eq!(store.active_conversation().unwrap().title, "Line one");
    }

    #[test]
    fn test_derive_title_respects_char_boundaries() {
        let long: String = "é".repeat(40);
        let title = derive_title(&long);
        assert_eq!(title, format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn test_update_conversation_merges_fields() {
        let (_dir, mut store) = temp_store(50);
        let id = store.create_conversation(ConversationSeed::default());

        store.update_conversation(&id, ConversationUpdate {
            model: Some("m1".to_string()),
            ..Default::default()
        });

        let conv = store.active_conversation().unwrap();
        assert_eq!(conv.model.as_deref(), Some("m1"));
        assert_eq!(conv.title, "New Chat");
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let (_dir, mut store) = temp_store(50);
        let id = store.create_conversation(ConversationSeed::default());
        let before = store.conversations()[0].timestamp;

        store.update_conversation("missing", ConversationUpdate {
            model: Some("m1".to_string()),
            ..Default::default()
        });

        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.conversations()[0].id, id);
        assert_eq!(store.conversations()[0].model, None);
        assert_eq!(store.conversations()[0].timestamp, before);
    }

    #[test]
    fn test_delete_active_promotes_most_recent_remaining() {
        let (_dir, mut store) = temp_store(50);
        let _oldest = store.create_conversation(ConversationSeed::default());
        let middle = store.create_conversation(ConversationSeed::default());
        let newest = store.create_conversation(ConversationSeed::default());

        assert_eq!(store.active_id(), Some(newest.as_str()));
        store.delete_conversation(&newest);

        assert_eq!(store.conversations().len(), 2);
        assert_eq!(store.active_id(), Some(middle.as_str()));
        assert_active_is_valid(&store);
    }

    #[test]
    fn test_delete_inactive_keeps_active_pointer() {
        let (_dir, mut store) = temp_store(50);
        let first = store.create_conversation(ConversationSeed::default());
        let second = store.create_conversation(ConversationSeed::default());

        store.delete_conversation(&first);

        assert_eq!(store.active_id(), Some(second.as_str()));
    }

    #[test]
    fn test_delete_only_conversation_clears_active() {
        let (_dir, mut store) = temp_store(50);
        let id = store.create_conversation(ConversationSeed::default());

        store.delete_conversation(&id);

        assert!(store.conversations().is_empty());
        assert_eq!(store.active_id(), None);
        assert!(store.active_conversation().is_none());
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let (_dir, mut store) = temp_store(50);
        store.create_conversation(ConversationSeed::default());

        store.delete_conversation("missing");

        assert_eq!(store.conversations().len(), 1);
        assert_active_is_valid(&store);
    }

    #[test]
    fn test_set_active_to_unknown_id_yields_no_active_conversation() {
        let (_dir, mut store) = temp_store(50);
        store.create_conversation(ConversationSeed::default());

        store.set_active("missing");

        assert_eq!(store.active_id(), Some("missing"));
        assert!(store.active_conversation().is_none());

        // A send in this state falls back to creating a fresh conversation.
        store.add_message("Hi", Role::User);
        assert_eq!(store.conversations().len(), 2);
        assert_active_is_valid(&store);
    }

    #[test]
    fn test_clear_all() {
        let (_dir, mut store) = temp_store(50);
        store.create_conversation(ConversationSeed::default());
        store.create_conversation(ConversationSeed::default());

        store.clear_all();

        assert!(store.conversations().is_empty());
        assert_eq!(store.active_id(), None);
    }

    #[test]
    fn test_retention_trims_oldest_on_create() {
        let (_dir, mut store) = temp_store(3);

        let first = store.create_conversation(ConversationSeed::default());
        for _ in 0..3 {
            store.create_conversation(ConversationSeed::default());
        }

        assert_eq!(store.conversations().len(), 3);
        assert!(!store.conversations().iter().any(|c| c.id == first));
        assert_active_is_valid(&store);
    }

    #[test]
    fn test_retention_applies_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::at(dir.path().join("data")).unwrap();

        let mut store = ConversationStore::new(storage.clone(), 50);
        for _ in 0..5 {
            store.create_conversation(ConversationSeed::default());
        }
        drop(store);

        let reloaded = ConversationStore::new(storage, 2);
        assert_eq!(reloaded.conversations().len(), 2);
        assert_active_is_valid(&reloaded);
    }

    #[test]
    fn test_lower_cap_via_settings_change() {
        let (_dir, mut store) = temp_store(50);
        for _ in 0..5 {
            store.create_conversation(ConversationSeed::default());
        }

        store.set_max_conversations(2);

        assert_eq!(store.conversations().len(), 2);
        assert_active_is_valid(&store);
    }

    #[test]
    fn test_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::at(dir.path().join("data")).unwrap();

        let mut store = ConversationStore::new(storage.clone(), 50);
        store.add_message("Hello there", Role::User);
        store.add_message("Hi! How can I help?", Role::Assistant);
        let id = store.active_id().unwrap().to_string();
        drop(store);

        let reloaded = ConversationStore::new(storage, 50);
        assert_eq!(reloaded.conversations().len(), 1);
        assert_eq!(reloaded.active_id(), Some(id.as_str()));
        let conv = reloaded.active_conversation().unwrap();
        assert_eq!(conv.title, "Hello there");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_mutations_emit_events() {
        let (_dir, mut store) = temp_store(50);
        let mut rx = store.subscribe();

        let id = store.create_conversation(ConversationSeed::default());
        store.add_message("Hello", Role::User);
        store.delete_conversation(&id);

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Created(id.clone()));
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::ActiveChanged(Some(id.clone()))
        );
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::MessageAdded(id.clone()));
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::ActiveChanged(None));
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Deleted(id));
    }
}
