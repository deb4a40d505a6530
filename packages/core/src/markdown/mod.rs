//! Markdown conversion for editor blocks
//!
//! The assistant streams markdown; finished answers are parsed back into
//! blocks with [`markdown_to_blocks`]. [`blocks_to_markdown`] goes the other
//! way for prompts and exports and is lossy (colors and alignment are
//! dropped).

use crate::models::{
    block_types, Block, BlockContent, InlineContent, StyledText, Styles, TableContent, TableRow,
};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde_json::Value;

const INDENT: &str = "  ";

/// Render inline items with markdown markers
fn inline_to_markdown(items: &[InlineContent]) -> String {
    let mut out = String::new();
    for item in items {
        match item {
            InlineContent::Text(run) => out.push_str(&styled_to_markdown(run)),
            InlineContent::Link { href, content } => {
                out.push('[');
                out.push_str(&inline_to_markdown(content));
                out.push_str("](");
                out.push_str(href);
                out.push(')');
            }
        }
    }
    out
}

fn styled_to_markdown(run: &StyledText) -> String {
    if run.text.trim().is_empty() {
        return run.text.clone();
    }

    // Markers cannot hug whitespace, so keep it outside
    let body = run.text.trim();
    let lead = &run.text[..run.text.len() - run.text.trim_start().len()];
    let trail = &run.text[run.text.trim_end().len()..];

    let styles = &run.styles;
    let mut text = body.to_string();
    if styles.is_code() {
        text = format!("`{}`", text);
    }
    if styles.is_strike() {
        text = format!("~~{}~~", text);
    }
    if styles.is_italic() {
        text = format!("*{}*", text);
    }
    if styles.is_bold() {
        text = format!("**{}**", text);
    }
    format!("{}{}{}", lead, text, trail)
}

fn table_to_markdown(table: &TableContent) -> String {
    let mut lines = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| inline_to_markdown(cell).replace('|', "\\|"))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            let separator = vec!["---"; row.cells.len().max(1)];
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }
    lines.join("\n")
}

fn prop_str<'a>(block: &'a Block, key: &str) -> &'a str {
    block.props.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn block_to_markdown(block: &Block, number: usize) -> String {
    let text = block.inline().map(inline_to_markdown).unwrap_or_default();

    let own = match block.block_type.as_str() {
        block_types::HEADING => {
            let level = block.heading_level().unwrap_or(1) as usize;
            format!("{} {}", "#".repeat(level), text)
        }
        block_types::BULLET_LIST_ITEM => format!("- {}", text),
        block_types::NUMBERED_LIST_ITEM => format!("{}. {}", number, text),
        block_types::CHECK_LIST_ITEM => {
            let checked = block
                .props
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            format!("- [{}] {}", if checked { "x" } else { " " }, text)
        }
        block_types::QUOTE => format!("> {}", text),
        block_types::CODE_BLOCK => {
            let code = block
                .inline()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| match item {
                            InlineContent::Text(run) => Some(run.text.as_str()),
                            _ => None,
                        })
                        .collect::<String>()
                })
                .unwrap_or_default();
            format!("```{}\n{}\n```", prop_str(block, "language"), code)
        }
        block_types::DIVIDER => "---".to_string(),
        block_types::IMAGE => format!("![{}]({})", prop_str(block, "caption"), prop_str(block, "url")),
        block_types::TABLE => match &block.content {
            Some(BlockContent::Table(table)) => table_to_markdown(table),
            _ => String::new(),
        },
        _ => text,
    };

    if block.children.is_empty() {
        return own;
    }

    let children = blocks_to_markdown(&block.children);
    let indented: Vec<String> = children
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", INDENT, line)
            }
        })
        .collect();
    format!("{}\n\n{}", own, indented.join("\n"))
}

/// Render blocks as markdown, separated by blank lines
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    let mut parts = Vec::with_capacity(blocks.len());
    let mut number = 0;
    for block in blocks {
        if block.block_type == block_types::NUMBERED_LIST_ITEM {
            number += 1;
        } else {
            number = 0;
        }
        parts.push(block_to_markdown(block, number));
    }
    parts.join("\n\n")
}

#[derive(Default)]
struct TableBuild {
    rows: Vec<TableRow>,
    row: Vec<Vec<InlineContent>>,
}

/// Event-driven block builder
#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    /// Open container blocks (list items and quotes)
    stack: Vec<Block>,
    /// Ordered flag of each open list
    lists: Vec<bool>,
    inline: Vec<InlineContent>,
    styles: Vec<Styles>,
    link: Option<(String, Vec<InlineContent>)>,
    image: Option<(String, String)>,
    pending_images: Vec<Block>,
    code: Option<(String, String)>,
    table: Option<TableBuild>,
}

impl BlockBuilder {
    fn current_styles(&self) -> Styles {
        self.styles.last().cloned().unwrap_or_default()
    }

    fn push_style(&mut self, apply: impl FnOnce(Styles) -> Styles) {
        let next = apply(self.current_styles());
        self.styles.push(next);
    }

    fn push_run(&mut self, text: &str, styles: Styles) {
        let target = match &mut self.link {
            Some((_, content)) => content,
            None => &mut self.inline,
        };
        if let Some(InlineContent::Text(last)) = target.last_mut() {
            if last.styles == styles {
                last.text.push_str(text);
                return;
            }
        }
        target.push(InlineContent::Text(StyledText::styled(text, styles)));
    }

    fn text(&mut self, text: &str) {
        if let Some((_, code)) = &mut self.code {
            code.push_str(text);
        } else if let Some((_, alt)) = &mut self.image {
            alt.push_str(text);
        } else {
            let styles = self.current_styles();
            self.push_run(text, styles);
        }
    }

    fn attach(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(block),
            None => self.blocks.push(block),
        }
    }

    fn flush_images(&mut self) {
        for image in std::mem::take(&mut self.pending_images) {
            self.attach(image);
        }
    }

    /// Give pending inline text to the open container, or to a paragraph
    fn flush_inline(&mut self) {
        let inline = std::mem::take(&mut self.inline);
        if !inline.is_empty() {
            let absorbed = match self.stack.last_mut() {
                Some(container)
                    if container.inline().map_or(true, |i| i.is_empty())
                        && container.children.is_empty() =>
                {
                    container.set_inline(inline.clone());
                    true
                }
                _ => false,
            };
            if !absorbed {
                let mut paragraph = Block::paragraph("");
                paragraph.set_inline(inline);
                self.attach(paragraph);
            }
        }
        self.flush_images();
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::Heading { .. } => self.inline.clear(),
            Tag::BlockQuote { .. } => {
                self.flush_inline();
                self.stack.push(Block::new(block_types::QUOTE));
            }
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((language, String::new()));
            }
            Tag::List(start) => {
                self.flush_inline();
                self.lists.push(start.is_some());
            }
            Tag::Item => {
                let block_type = if self.lists.last().copied().unwrap_or(false) {
                    block_types::NUMBERED_LIST_ITEM
                } else {
                    block_types::BULLET_LIST_ITEM
                };
                self.stack.push(Block::new(block_type));
            }
            Tag::Table(_) => self.table = Some(TableBuild::default()),
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.row.clear();
                }
            }
            Tag::TableCell => self.inline.clear(),
            Tag::Emphasis => self.push_style(Styles::with_italic),
            Tag::Strong => self.push_style(Styles::with_bold),
            Tag::Strikethrough => self.push_style(Styles::with_strike),
            Tag::Link { dest_url, .. } => self.link = Some((dest_url.to_string(), Vec::new())),
            Tag::Image { dest_url, .. } => self.image = Some((dest_url.to_string(), String::new())),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_inline(),
            TagEnd::Heading(level) => {
                let mut heading = Block::heading(level as u8, "");
                heading.set_inline(std::mem::take(&mut self.inline));
                self.attach(heading);
                self.flush_images();
            }
            TagEnd::BlockQuote { .. } | TagEnd::Item => {
                self.flush_inline();
                if let Some(block) = self.stack.pop() {
                    self.attach(block);
                }
            }
            TagEnd::CodeBlock => {
                if let Some((language, code)) = self.code.take() {
                    let mut block = Block::new(block_types::CODE_BLOCK)
                        .with_prop("language", language.as_str());
                    block.set_plain_text(code.trim_end_matches('\n'));
                    self.attach(block);
                }
            }
            TagEnd::List { .. } => {
                self.lists.pop();
            }
            TagEnd::TableCell => {
                let cell = std::mem::take(&mut self.inline);
                if let Some(table) = &mut self.table {
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let cells = std::mem::take(&mut table.row);
                    table.rows.push(TableRow { cells });
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let mut block = Block::new(block_types::TABLE);
                    block.content = Some(BlockContent::Table(TableContent::new(table.rows)));
                    self.attach(block);
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                if let Some((href, content)) = self.link.take() {
                    self.inline.push(InlineContent::Link { href, content });
                }
            }
            TagEnd::Image => {
                if let Some((url, caption)) = self.image.take() {
                    let mut block = Block::new(block_types::IMAGE)
                        .with_prop("url", url.as_str())
                        .with_prop("caption", caption.as_str());
                    block.content = None;
                    self.pending_images.push(block);
                }
            }
            _ => {}
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let styles = self.current_styles().with_code();
                self.push_run(&code, styles);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak | Event::HardBreak => self.text("\n"),
            Event::Rule => {
                self.flush_inline();
                let mut divider = Block::new(block_types::DIVIDER);
                divider.content = None;
                self.attach(divider);
            }
            Event::TaskListMarker(checked) => {
                if let Some(item) = self.stack.last_mut() {
                    item.block_type = block_types::CHECK_LIST_ITEM.to_string();
                    item.props.insert("checked".to_string(), Value::from(checked));
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_inline();
        while let Some(block) = self.stack.pop() {
            self.attach(block);
        }
        self.blocks
    }
}

/// Parse markdown into blocks with fresh ids
pub fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut builder = BlockBuilder::default();
    for event in Parser::new_ext(markdown, options) {
        builder.event(event);
    }
    builder.finish()
}
