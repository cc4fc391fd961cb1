use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Renderable block of an assistant message. The store never looks at
/// message content; this is strictly presentation-side.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBlock {
    Paragraph(Vec<InlineSpan>),
    Heading { level: u8, spans: Vec<InlineSpan> },
    CodeBlock { language: Option<String>, code: String },
    UnorderedList(Vec<Vec<InlineSpan>>),
    OrderedList(Vec<Vec<InlineSpan>>),
    Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineSpan {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

impl InlineSpan {
    fn new(text: String) -> Self {
        Self {
            text,
            bold: false,
            italic: false,
            code: false,
        }
    }
}

pub fn parse_markdown(input: &str) -> Vec<MessageBlock> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = Parser::new_ext(input, options);

    let mut ctx = ParseContext::new();
    for event in parser {
        ctx.handle_event(event);
    }
    ctx.finish()
}

struct ParseContext {
    blocks: Vec<MessageBlock>,
    current_spans: Vec<InlineSpan>,
    bold: bool,
    italic: bool,
    in_code_block: bool,
    code_block_lang: Option<String>,
    code_block_content: String,
    heading_level: Option<u8>,
    // Flat list state: nested lists are flattened into their parent
    list: Option<ListState>,
    list_depth: u32,
    in_item: bool,
    item_spans: Vec<InlineSpan>,
}

struct ListState {
    ordered: bool,
    items: Vec<Vec<InlineSpan>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current_spans: Vec::new(),
            bold: false,
            italic: false,
            in_code_block: false,
            code_block_lang: None,
            code_block_content: String::new(),
            heading_level: None,
            list: None,
            list_depth: 0,
            in_item: false,
            item_spans: Vec::new(),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.handle_start(tag),
            Event::End(tag) => self.handle_end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_block_content.push_str(&text);
                } else {
                    self.push_span(text.to_string(), false);
                }
            }
            Event::Code(code) => self.push_span(code.to_string(), true),
            Event::SoftBreak | Event::HardBreak => self.push_span(" ".to_string(), false),
            Event::Rule => {
                self.flush_paragraph();
                self.blocks.push(MessageBlock::Rule);
            }
            _ => {}
        }
    }

    fn handle_start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_paragraph();
                self.heading_level = Some(heading_level_to_u8(level));
            }
            Tag::Strong => self.bold = true,
            Tag::Emphasis => self.italic = true,
            Tag::CodeBlock(kind) => {
                self.flush_paragraph();
                self.in_code_block = true;
                self.code_block_content.clear();
                self.code_block_lang = match kind {
                    pulldown_cmark::CodeBlockKind::Fenced(lang) => {
                        let lang = lang.trim().to_string();
                        if lang.is_empty() {
                            None
                        } else {
                            Some(lang)
                        }
                    }
                    pulldown_cmark::CodeBlockKind::Indented => None,
                };
            }
            Tag::List(start) => {
                self.flush_paragraph();
                self.list_depth += 1;
                if self.list.is_none() {
                    self.list = Some(ListState {
                        ordered: start.is_some(),
                        items: Vec::new(),
                    });
                }
            }
            Tag::Item => {
                self.in_item = true;
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if !self.in_item {
                    self.flush_paragraph();
                }
            }
            TagEnd::Heading(_) => {
                let level = self.heading_level.take().unwrap_or(1);
                let spans = std::mem::take(&mut self.current_spans);
                self.blocks.push(MessageBlock::Heading { level, spans });
            }
            TagEnd::Strong => self.bold = false,
            TagEnd::Emphasis => self.italic = false,
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                let code = std::mem::take(&mut self.code_block_content)
                    .trim_end_matches('\n')
                    .to_string();
                self.blocks.push(MessageBlock::CodeBlock {
                    language: self.code_block_lang.take(),
                    code,
                });
            }
            TagEnd::Item => {
                self.in_item = false;
                let spans = std::mem::take(&mut self.item_spans);
                if !spans.is_empty() {
                    if let Some(list) = self.list.as_mut() {
                        list.items.push(spans);
                    }
                }
            }
            TagEnd::List(_) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    if let Some(list) = self.list.take() {
                        self.blocks.push(if list.ordered {
                            MessageBlock::OrderedList(list.items)
                        } else {
                            MessageBlock::UnorderedList(list.items)
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn push_span(&mut self, text: String, code: bool) {
        let mut span = InlineSpan::new(text);
        span.bold = self.bold;
        span.italic = self.italic;
        span.code = code;
        if self.in_item {
            self.item_spans.push(span);
        } else {
            self.current_spans.push(span);
        }
    }

    fn flush_paragraph(&mut self) {
        if !self.current_spans.is_empty() {
            let spans = std::mem::take(&mut self.current_spans);
            self.blocks.push(MessageBlock::Paragraph(spans));
        }
    }

    fn finish(mut self) -> Vec<MessageBlock> {
        self.flush_paragraph();
        self.blocks
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
