pub mod completion;
pub mod models;
pub mod types;

pub use completion::CompletionClient;
pub use models::WireMessage;
pub use types::{ClientError, CompletionApi, ModelInfo};
