use anyhow::Result;
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::broadcast;

use crate::services::chat::ChatInterface;
use crate::services::conversation::{ConversationSeed, StoreEvent};
use crate::services::markdown::{self, InlineSpan, MessageBlock};
use crate::services::settings::{AppSettings, FontSize, SettingsService};
use crate::services::storage::Storage;

const MODEL_LIST_LIMIT: usize = 50;

/// Interactive terminal session: a readline loop plus slash commands
/// standing in for the sidebar, model picker, and settings panel. Pure
/// glue over the store and the chat interface.
pub struct App {
    chat: ChatInterface,
    settings: AppSettings,
    storage: Storage,
    events: broadcast::Receiver<StoreEvent>,
}

impl App {
    pub fn new(chat: ChatInterface, settings: AppSettings, storage: Storage) -> Self {
        let events = chat.store().subscribe();
        Self {
            chat,
            settings,
            storage,
            events,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        println!("{}", "banter".bold());
        println!("{}", "Type a message to chat, /help for commands.".dim());

        loop {
            let prompt = self.prompt();
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(&line);

                    if let Some(command) = line.strip_prefix('/') {
                        if !self.handle_command(command).await {
                            break;
                        }
                    } else {
                        self.send(&line).await;
                    }
                    self.drain_events();
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    fn prompt(&self) -> String {
        match self.chat.store().active_conversation() {
            Some(conv) => format!("{} > ", conv.title),
            None => "banter > ".to_string(),
        }
    }

    async fn send(&mut self, text: &str) {
        println!("{}", "Thinking...".dim());
        if let Some(reply) = self.chat.send_message(text).await {
            self.render_reply(&reply.content);
        }
    }

    /// Returns false when the session should end.
    async fn handle_command(&mut self, command: &str) -> bool {
        let mut parts = command.splitn(2, ' ');
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        match name {
            "new" => {
                self.chat
                    .store_mut()
                    .create_conversation(ConversationSeed::default());
            }
            "list" => self.print_conversations(),
            "open" => match self.conversation_id_at(arg) {
                Some(id) => self.chat.store_mut().set_active(&id),
                None => println!("Usage: /open <number from /list>"),
            },
            "delete" => match self.conversation_id_at(arg) {
                Some(id) => self.chat.store_mut().delete_conversation(&id),
                None => println!("Usage: /delete <number from /list>"),
            },
            "clear" => self.chat.store_mut().clear_all(),
            "models" => self.print_models().await,
            "model" => {
                if arg.is_empty() {
                    println!("Current model: {}", self.chat.selected_model());
                } else {
                    self.chat.set_selected_model(arg);
                    println!("Model set to {}", arg);
                }
            }
            "settings" => self.print_settings(),
            "set" => self.apply_setting(arg),
            "help" => self.print_help(),
            "quit" | "exit" => return false,
            _ => println!("Unknown command: /{} (try /help)", name),
        }
        true
    }

    /// Observer side of the store: pending change events become short
    /// notices instead of the loop re-deriving what changed.
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                StoreEvent::ActiveChanged(Some(id)) => {
                    let title = self
                        .chat
                        .store()
                        .conversations()
                        .iter()
                        .find(|c| c.id == id)
                        .map(|c| c.title.clone());
                    if let Some(title) = title {
                        println!("{}", format!("* {}", title).dim());
                    }
                }
                StoreEvent::ActiveChanged(None) => {
                    println!("{}", "* no active conversation".dim());
                }
                StoreEvent::Cleared => println!("Cleared all conversations."),
                StoreEvent::Deleted(_) => println!("Deleted conversation."),
                StoreEvent::Created(_) | StoreEvent::MessageAdded(_) | StoreEvent::Updated(_) => {}
            }
        }
    }

    fn conversation_id_at(&self, arg: &str) -> Option<String> {
        let index: usize = arg.parse().ok()?;
        self.chat
            .store()
            .conversations()
            .get(index.checked_sub(1)?)
            .map(|c| c.id.clone())
    }

    fn print_conversations(&self) {
        let conversations = self.chat.store().conversations();
        if conversations.is_empty() {
            println!("No conversations yet.");
            return;
        }
        for (i, conv) in conversations.iter().enumerate() {
            let marker = if Some(conv.id.as_str()) == self.chat.store().active_id() {
                "*"
            } else {
                " "
            };
            println!(
                "{} {:>2}. {}  {}",
                marker,
                i + 1,
                conv.title,
                conv.timestamp
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
                    .dim()
            );
        }
    }

    async fn print_models(&self) {
        let models = self.chat.list_models().await;
        if models.is_empty() {
            println!("No models available.");
            return;
        }
        for model in models.iter().take(MODEL_LIST_LIMIT) {
            match &model.description {
                Some(desc) => println!("{}  {}", model.id, desc.as_str().dim()),
                None => println!("{}", model.id),
            }
        }
        if models.len() > MODEL_LIST_LIMIT {
            println!("(+{} more)", models.len() - MODEL_LIST_LIMIT);
        }
    }

    fn print_settings(&self) {
        let s = &self.settings;
        println!("compact    = {}", s.compact_mode);
        println!("font       = {:?}", s.font_size);
        println!("autoscroll = {}", s.auto_scroll);
        println!("enter      = {}", s.send_on_enter);
        println!("max        = {}", s.max_conversations);
    }

    fn apply_setting(&mut self, arg: &str) {
        let mut parts = arg.splitn(2, ' ');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().map(str::trim).unwrap_or_default();

        let applied = match key {
            "compact" => value
                .parse()
                .map(|v| self.settings.compact_mode = v)
                .is_ok(),
            "font" => match value {
                "small" => {
                    self.settings.font_size = FontSize::Small;
                    true
                }
                "medium" => {
                    self.settings.font_size = FontSize::Medium;
                    true
                }
                "large" => {
                    self.settings.font_size = FontSize::Large;
                    true
                }
                _ => false,
            },
            "autoscroll" => value.parse().map(|v| self.settings.auto_scroll = v).is_ok(),
            "enter" => value
                .parse()
                .map(|v| self.settings.send_on_enter = v)
                .is_ok(),
            "max" => match value.parse() {
                Ok(max) => {
                    self.settings.max_conversations = max;
                    self.chat.store_mut().set_max_conversations(max);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };

        if applied {
            if let Err(e) = SettingsService::save(&self.storage, &self.settings) {
                tracing::error!("Failed to save settings: {}", e);
            }
            self.print_settings();
        } else {
            println!("Usage: /set <compact|font|autoscroll|enter|max> <value>");
        }
    }

    fn print_help(&self) {
        println!("/new              start a new conversation");
        println!("/list             list conversations");
        println!("/open <n>         switch to conversation n");
        println!("/delete <n>       delete conversation n");
        println!("/clear            delete all conversations");
        println!("/models           list available models");
        println!("/model [id]       show or set the model for new chats");
        println!("/settings         show settings");
        println!("/set <key> <val>  change a setting");
        println!("/quit             exit");
    }

    fn render_reply(&self, content: &str) {
        let blocks = markdown::parse_markdown(content);
        let mut need_gap = false;

        for block in blocks {
            if need_gap && !self.settings.compact_mode {
                println!();
            }
            need_gap = true;

            match block {
                MessageBlock::Paragraph(spans) => println!("{}", render_spans(&spans)),
                MessageBlock::Heading { level: _, spans } => {
                    println!("{}", render_spans(&spans).bold().underlined());
                }
                MessageBlock::CodeBlock { language, code } => {
                    if let Some(lang) = language {
                        println!("{}", lang.dim());
                    }
                    for line in code.lines() {
                        println!("  {}", line.dark_grey());
                    }
                }
                MessageBlock::UnorderedList(items) => {
                    for item in items {
                        println!("  - {}", render_spans(&item));
                    }
                }
                MessageBlock::OrderedList(items) => {
                    for (i, item) in items.iter().enumerate() {
                        println!("  {}. {}", i + 1, render_spans(item));
                    }
                }
                MessageBlock::Rule => println!("{}", "----".dim()),
            }
        }
    }
}

fn render_spans(spans: &[InlineSpan]) -> String {
    let mut out = String::new();
    for span in spans {
        let styled = if span.code {
            span.text.clone().yellow().to_string()
        } else if span.bold {
            span.text.clone().bold().to_string()
        } else if span.italic {
            span.text.clone().italic().to_string()
        } else {
            span.text.clone()
        };
        out.push_str(&styled);
    }
    out
}
