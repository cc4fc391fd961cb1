use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::storage::Storage;

pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub compact_mode: bool,
    pub font_size: FontSize,
    pub auto_scroll: bool,
    pub send_on_enter: bool,
    pub max_conversations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            compact_mode: false,
            font_size: FontSize::Medium,
            auto_scroll: true,
            send_on_enter: true,
            max_conversations: 50,
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub fn load(storage: &Storage) -> AppSettings {
        storage.load(SETTINGS_KEY).unwrap_or_default()
    }

    pub fn save(storage: &Storage, settings: &AppSettings) -> Result<()> {
        storage.save(SETTINGS_KEY, settings)
    }
}
