mod app;
mod client;
mod config;
mod models;
mod services;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use app::App;
use client::CompletionClient;
use config::Config;
use services::{ChatInterface, ConversationStore, SettingsService, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let storage = Storage::new()?;
    let settings = SettingsService::load(&storage);

    let store = ConversationStore::new(storage.clone(), settings.max_conversations);
    let client = Arc::new(CompletionClient::new(
        config.api_base.clone(),
        config.api_key.clone(),
    ));
    let chat = ChatInterface::new(store, client, config.default_model.clone());

    App::new(chat, settings, storage).run().await
}
