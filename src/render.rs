//! Collaborator-facing output: segments paired with resolved visibility, and
//! a terminal renderer for the supported markdown subset.
//!
//! Supported: ATX headers, bullets, numbered lists, bold/italic, pipe
//! tables, embedded base64 images and collapsible code boxes. Anything else
//! passes through as plain text.

use base64::Engine;
use colored::*;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::Serialize;

use crate::config::AssemblerConfig;
use crate::error::Result;
use crate::segment::{parse_message, Segment};
use crate::toggle::{ToggleStore, Visibility};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSegment {
    #[serde(flatten)]
    pub segment: Segment,
    /// `None` for text, which has no collapsible affordance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBlock {
    pub segments: Vec<RenderedSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub message_id: String,
    pub streaming: bool,
    pub blocks: Vec<RenderedBlock>,
}

/// Re-parse `content` from scratch and resolve every code block's visibility.
pub fn render_message(
    message_id: &str,
    content: &str,
    is_streaming: bool,
    store: &ToggleStore,
    config: &AssemblerConfig,
) -> RenderedMessage {
    let blocks = parse_message(message_id, content, is_streaming, config)
        .into_iter()
        .map(|block| RenderedBlock {
            segments: block
                .segments
                .into_iter()
                .map(|segment| {
                    let visibility = match (segment.id(), segment.language()) {
                        (Some(id), Some(lang)) => Some(store.resolve_visibility(id, lang)),
                        _ => None,
                    };
                    RenderedSegment { segment, visibility }
                })
                .collect(),
        })
        .collect();

    RenderedMessage { message_id: message_id.to_string(), streaming: is_streaming, blocks }
}

impl RenderedMessage {
    pub fn segments(&self) -> impl Iterator<Item = &RenderedSegment> {
        self.blocks.iter().flat_map(|b| b.segments.iter())
    }

    /// Pretty-printed JSON of the blocks, segments and visibilities.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Terminal rendition, logic blocks joined by `divider`. Blocks and text
    /// segments that render to nothing are skipped.
    pub fn to_terminal(&self, divider: &str) -> String {
        let mut out = Vec::new();
        for block in &self.blocks {
            let parts: Vec<String> = block
                .segments
                .iter()
                .map(|seg| match &seg.segment {
                    Segment::Text { content } => render_markdown(content),
                    Segment::Code { language, content, id } => {
                        render_code(language, content, id, seg.visibility, false)
                    }
                    Segment::StreamingCode { language, content, id } => {
                        render_code(language, content, id, seg.visibility, true)
                    }
                })
                .filter(|part| !part.is_empty())
                .collect();
            if parts.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(divider.bright_black().to_string());
            }
            out.extend(parts);
        }
        out.join("\n")
    }
}

fn render_code(
    language: &str,
    content: &str,
    id: &str,
    visibility: Option<Visibility>,
    streaming: bool,
) -> String {
    let lines = content.lines().count();
    let state = if streaming { " (streaming)" } else { "" };
    match visibility {
        Some(Visibility::Collapsed) => format!(
            "{} {}",
            format!("▸ {language} code, {lines} lines{state}").bright_black(),
            format!("[{id}]").dimmed()
        ),
        _ => {
            let mut out = vec![format!(
                "{} {}",
                format!("▾ {language}{state}").bright_blue(),
                format!("[{id}]").dimmed()
            )];
            out.extend(content.lines().map(|l| format!("{} {}", "│".bright_black(), l.cyan())));
            out.join("\n")
        }
    }
}

// ---------------------------------------------------------------------------
// Markdown subset
// ---------------------------------------------------------------------------

/// Render one text segment for the terminal.
pub fn render_markdown(text: &str) -> String {
    let mut writer = TerminalWriter::default();
    for event in Parser::new_ext(text, Options::ENABLE_TABLES) {
        writer.handle(event);
    }
    writer.finish()
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

/// Folds parser events into colored terminal lines.
#[derive(Default)]
struct TerminalWriter {
    lines: Vec<String>,
    line: String,
    strong: usize,
    emphasis: usize,
    heading: Option<HeadingLevel>,
    /// One entry per open list: the next item number, `None` for bullets.
    lists: Vec<Option<u64>>,
    code_block: bool,
    /// Destination URL and alt text of the image being read.
    image: Option<(String, String)>,
    table: Option<TableState>,
}

impl TerminalWriter {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::Html(html) => {
                self.flush();
                self.lines.extend(html.lines().map(str::to_string));
            }
            Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push("─".repeat(40).bright_black().to_string());
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(level);
            }
            Tag::List(first) => {
                self.flush();
                self.lists.push(first);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}.");
                        *n += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.line = format!("{}  {} ", "  ".repeat(depth), marker.yellow());
            }
            Tag::Strong => self.strong += 1,
            Tag::Emphasis => self.emphasis += 1,
            Tag::CodeBlock(_) => {
                self.flush();
                self.code_block = true;
            }
            Tag::Image { dest_url, .. } => self.image = Some((dest_url.to_string(), String::new())),
            Tag::Table(_) => {
                self.flush();
                self.table = Some(TableState::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.flush();
                self.heading = None;
            }
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::CodeBlock => self.code_block = false,
            TagEnd::Image => {
                if let Some((url, alt)) = self.image.take() {
                    let placeholder = image_placeholder(&alt, &url);
                    match self.table.as_mut() {
                        Some(table) => table.cell.push_str(&placeholder),
                        None => self.line.push_str(&placeholder.magenta().to_string()),
                    }
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    if !row.is_empty() {
                        table.rows.push(row);
                    }
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.lines.extend(render_table(&table.rows));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, alt)) = self.image.as_mut() {
            alt.push_str(text);
        } else if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
        } else if self.code_block {
            self.lines.extend(text.lines().map(|l| format!("    {}", l.cyan())));
        } else {
            let styled = self.style(text);
            self.line.push_str(&styled);
        }
    }

    fn inline_code(&mut self, code: &str) {
        match self.table.as_mut() {
            Some(table) => table.cell.push_str(code),
            None => self.line.push_str(&code.cyan().to_string()),
        }
    }

    fn style(&self, text: &str) -> String {
        let mut styled = match self.heading {
            Some(HeadingLevel::H1) => text.bright_white().bold().underline(),
            Some(HeadingLevel::H2) => text.bright_white().bold(),
            Some(_) => text.bold(),
            None => text.normal(),
        };
        if self.strong > 0 {
            styled = styled.bold();
        }
        if self.emphasis > 0 {
            styled = styled.italic();
        }
        styled.to_string()
    }

    fn flush(&mut self) {
        if !self.line.is_empty() {
            self.lines.push(std::mem::take(&mut self.line));
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.lines.join("\n")
    }
}

/// Alt text plus, for base64 data URLs, the decoded size.
fn image_placeholder(alt: &str, url: &str) -> String {
    let size = url
        .split_once(";base64,")
        .and_then(|(_, b64)| base64::engine::general_purpose::STANDARD.decode(b64).ok())
        .map(|bytes| bytes.len());
    match size {
        Some(n) => format!("[image: {alt}, {n} bytes]"),
        None => format!("[image: {alt}]"),
    }
}

fn render_table(rows: &[Vec<String>]) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            let cells: Vec<String> = (0..columns)
                .map(|i| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    let pad = " ".repeat(widths[i] - cell.chars().count());
                    let text = if r == 0 { cell.bold().to_string() } else { cell.to_string() };
                    format!("{text}{pad}")
                })
                .collect();
            format!("{} {} {}", "│".bright_black(), cells.join(" │ "), "│".bright_black())
        })
        .collect()
}
