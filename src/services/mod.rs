pub mod chat;
pub mod conversation;
pub mod markdown;
pub mod settings;
pub mod storage;

pub use chat::ChatInterface;
pub use conversation::ConversationStore;
pub use settings::SettingsService;
pub use storage::Storage;
