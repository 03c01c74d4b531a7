use serde_json::Value;

use crate::domain::blocks::{Block, BlockKind, Inline};

use super::inline::render_inline;

const LIST_INDENT: &str = "   ";

/// Render a block forest to MDX.
///
/// Total and deterministic: every input yields output, identical input yields
/// byte-identical output.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut renderer = MarkupRenderer::default();
    renderer.forest(blocks, 0);
    let mut output = renderer.output.trim_end().to_string();
    if !output.is_empty() {
        output.push('\n');
    }
    output
}

#[derive(Default)]
struct MarkupRenderer {
    output: String,
    /// Running numbered-list counter per depth.
    counters: Vec<usize>,
}

impl MarkupRenderer {
    fn forest(&mut self, blocks: &[Block], depth: usize) {
        // A fresh sibling list: deeper counters never leak between parents.
        self.counters.truncate(depth);
        for block in blocks {
            self.block(block, depth);
        }
    }

    fn block(&mut self, block: &Block, depth: usize) {
        match &block.kind {
            BlockKind::NumberedListItem => {
                let number = self.next_number(depth);
                self.list_line(depth, &format!("{number}. "), &block.content);
            }
            BlockKind::BulletListItem => {
                self.reset_counter(depth);
                self.list_line(depth, "- ", &block.content);
            }
            BlockKind::CheckListItem { checked } => {
                self.reset_counter(depth);
                let marker = if *checked { "- [x] " } else { "- [ ] " };
                self.list_line(depth, marker, &block.content);
            }
            BlockKind::Heading { level } => {
                self.reset_counter(depth);
                if (1..=6).contains(level) {
                    let hashes = "#".repeat(*level as usize);
                    self.chunk(&format!("{hashes} {}", render_inline(&block.content)));
                }
            }
            BlockKind::Paragraph => {
                self.reset_counter(depth);
                self.wrapped("Paragraph", block, &render_inline(&block.content));
            }
            BlockKind::Alert => {
                self.reset_counter(depth);
                self.wrapped("Alert", block, &render_inline(&block.content));
            }
            BlockKind::Code { language } => {
                self.reset_counter(depth);
                let source = plain_text(&block.content);
                let fence = fence_for(&source);
                let body = format!(
                    "{fence}{}\n{source}\n{fence}",
                    language.as_deref().unwrap_or_default()
                );
                self.wrapped("CodeBlock", block, &body);
            }
            BlockKind::Table { rows } => {
                self.reset_counter(depth);
                self.wrapped("Table", block, &markdown_table(rows));
            }
            BlockKind::Image => {
                self.reset_counter(depth);
                self.wrapped("Image", block, "");
            }
            BlockKind::Video => {
                self.reset_counter(depth);
                self.wrapped("Video", block, "");
            }
            BlockKind::Audio => {
                self.reset_counter(depth);
                self.wrapped("Audio", block, "");
            }
            BlockKind::File => {
                self.reset_counter(depth);
                self.wrapped("File", block, "");
            }
            BlockKind::Unknown { .. } => {
                self.reset_counter(depth);
                return;
            }
        }

        if !block.children.is_empty() {
            self.forest(&block.children, depth + 1);
        }
    }

    fn next_number(&mut self, depth: usize) -> usize {
        if self.counters.len() <= depth {
            self.counters.resize(depth + 1, 0);
        }
        self.counters[depth] += 1;
        self.counters[depth]
    }

    fn reset_counter(&mut self, depth: usize) {
        if let Some(counter) = self.counters.get_mut(depth) {
            *counter = 0;
        }
    }

    fn list_line(&mut self, depth: usize, marker: &str, content: &[Inline]) {
        self.output.push_str(&LIST_INDENT.repeat(depth));
        self.output.push_str(marker);
        self.output.push_str(&render_inline(content));
        self.output.push('\n');
    }

    fn chunk(&mut self, text: &str) {
        if !self.output.is_empty() && !self.output.ends_with("\n\n") {
            self.output.push('\n');
        }
        self.output.push_str(text);
        self.output.push_str("\n\n");
    }

    fn wrapped(&mut self, tag: &str, block: &Block, body: &str) {
        let data = block_data(&block.raw);
        if body.is_empty() {
            self.chunk(&format!("<{tag} block={{{data}}} />"));
        } else {
            self.chunk(&format!("<{tag} block={{{data}}}>\n\n{body}\n\n</{tag}>"));
        }
    }
}

/// The node's stored data without its children, which render on their own.
fn block_data(raw: &Value) -> String {
    let mut data = raw.clone();
    if let Value::Object(object) = &mut data {
        object.remove("children");
    }
    serde_json::to_string(&data).unwrap_or_else(|_| "null".to_string())
}

fn plain_text(runs: &[Inline]) -> String {
    let mut text = String::new();
    for run in runs {
        match run {
            Inline::Text { text: value, .. } => text.push_str(value),
            Inline::Link { content, .. } => text.push_str(&plain_text(content)),
            Inline::Unsupported => {}
        }
    }
    text
}

fn fence_for(source: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for ch in source.chars() {
        if ch == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn markdown_table(rows: &[Vec<Vec<Inline>>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if rows.is_empty() || columns == 0 {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..columns)
            .map(|column| row.get(column).map(|cell| table_cell(cell)).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            lines.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    lines.join("\n")
}

fn table_cell(cell: &[Inline]) -> String {
    render_inline(cell)
        .replace('|', "\\|")
        .replace(['\r', '\n'], " ")
}
