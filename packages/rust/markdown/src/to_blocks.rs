//! AST → block tree (forward conversion).

use tracing::debug;

use dochub_shared::{ConversionOptions, DocHubError, UnsupportedBlockPolicy};

use crate::annotations::{Annotations, merge_spans};
use crate::ast::{List, MarkdownDocument, Node, Span, Table};
use crate::blocks::{
    Block, CalloutBlock, CodeBlock, FRONT_MATTER_CAPTION, ImageBlock, MAX_NESTING_DEPTH,
    MAX_TEXT_LENGTH, RichText, TableBlock, TableRowBlock, TextBlock, ToDoBlock,
};
use crate::collector::{Collector, ConversionResult};
use crate::languages::{PLAIN_TEXT, canonical_language};

/// Split text into pieces of at most `limit` characters.
///
/// Each cut lands just after the last whitespace inside the window, or hard
/// at the limit when the window has none. Concatenating the pieces gives back
/// the input.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some((cut, _)) = rest.char_indices().nth(limit) {
        let window = &rest[..cut];
        let split = window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(cut, |(i, c)| i + c.len_utf8());
        parts.push(rest[..split].to_string());
        rest = &rest[split..];
    }
    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Whether a link target is an absolute http(s) URL.
pub(crate) fn is_absolute_url(target: &str) -> bool {
    url::Url::parse(target).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Convert a parsed document into blocks.
pub(crate) fn map_document(
    doc: &MarkdownDocument,
    opts: &ConversionOptions,
) -> ConversionResult<Vec<Block>> {
    let mut collector = Collector::new();
    for warning in &doc.warnings {
        collector.warn(warning.clone());
    }

    let mut mapper = ForwardMapper {
        opts,
        collector: &mut collector,
    };
    let mut blocks = Vec::new();
    if opts.include_metadata && !doc.metadata.is_empty() {
        mapper.map_metadata(doc, &mut blocks);
    }
    mapper.map_nodes(&doc.content, 1, &mut blocks);

    debug!(blocks = blocks.len(), "mapped markdown to blocks");
    collector.finish(blocks)
}

struct ForwardMapper<'a> {
    opts: &'a ConversionOptions,
    collector: &'a mut Collector,
}

impl ForwardMapper<'_> {
    fn emit(&mut self, out: &mut Vec<Block>, block: Block) {
        let rows = match &block {
            Block::Table(t) => t.rows.len(),
            _ => 0,
        };
        self.collector.converted(1 + rows);
        out.push(block);
    }

    /// Map nodes whose blocks will sit at `depth` (top level is 1).
    fn map_nodes(&mut self, nodes: &[Node], depth: usize, out: &mut Vec<Block>) {
        for node in nodes {
            self.map_node(node, depth, out);
        }
    }

    fn map_node(&mut self, node: &Node, depth: usize, out: &mut Vec<Block>) {
        if !matches!(node, Node::List(_)) {
            self.collector.visited();
        }

        match node {
            Node::Heading { level, children } => self.map_heading(*level, children, out),
            Node::Paragraph { children } => {
                if let Some(rich_text) = self.rich_text(children, "paragraph") {
                    self.emit(out, Block::paragraph(rich_text));
                }
            }
            Node::List(list) => self.map_list(list, depth, out),
            Node::Code { language, value } => self.map_code(language.as_deref(), value, out),
            Node::Quote { callout, children } => {
                let (first, rest) = split_lead_paragraph(children);
                match callout {
                    Some(kind) if self.opts.convert_callouts => {
                        let Some(rich_text) = self.rich_text(first, "callout") else {
                            return;
                        };
                        let block = Block::Callout(CalloutBlock {
                            rich_text,
                            icon: Some(kind.icon().to_string()),
                            children: Vec::new(),
                        });
                        self.attach_children(block, rest, depth, out);
                    }
                    Some(_) if !self.unsupported_as("callout", "quote") => {}
                    _ => {
                        let mut lead = Vec::new();
                        if let Some(kind) = callout {
                            lead.push(Span::plain(format!("[!{}]", kind.marker())));
                            if !first.is_empty() {
                                lead.push(Span::plain("\n"));
                            }
                        }
                        lead.extend(first.iter().cloned());
                        let lead = merge_spans(lead);
                        let Some(rich_text) = self.rich_text(&lead, "quote") else {
                            return;
                        };
                        let block = Block::Quote(TextBlock::new(rich_text));
                        self.attach_children(block, rest, depth, out);
                    }
                }
            }
            Node::Toggle { summary, children } => {
                if self.opts.convert_toggles {
                    let Some(rich_text) = self.rich_text(summary, "toggle") else {
                        return;
                    };
                    self.attach_children(Block::Toggle(TextBlock::new(rich_text)), children, depth, out);
                } else if self.unsupported("toggle") {
                    let bold: Vec<Span> = summary
                        .iter()
                        .map(|s| Span {
                            annotations: Annotations { bold: true, ..s.annotations },
                            ..s.clone()
                        })
                        .collect();
                    if let Some(rich_text) = self.rich_text(&bold, "paragraph") {
                        self.emit(out, Block::paragraph(rich_text));
                    }
                    self.map_nodes(children, depth, out);
                }
            }
            Node::Table(table) => self.map_table(table, out),
            Node::Image { url, alt, .. } => {
                if is_absolute_url(url) {
                    let caption = if alt.is_empty() {
                        Vec::new()
                    } else {
                        vec![RichText::plain(alt.clone())]
                    };
                    self.emit(
                        out,
                        Block::Image(ImageBlock {
                            url: url.clone(),
                            caption,
                        }),
                    );
                } else if self.unsupported("image") {
                    let text = if alt.is_empty() { url } else { alt };
                    self.emit(out, Block::paragraph(vec![RichText::plain(text.clone())]));
                }
            }
            Node::Divider => self.emit(out, Block::Divider),
            Node::Html { value } => {
                if !self.unsupported("html") {
                    return;
                }
                if let Some(rich_text) = self.rich_text(&[Span::plain(value.clone())], "paragraph") {
                    self.emit(out, Block::paragraph(rich_text));
                }
            }
        }
    }

    fn map_heading(&mut self, level: u8, children: &[Span], out: &mut Vec<Block>) {
        let max = self.opts.max_heading_level;
        let mut level = level;
        if level > max {
            self.collector
                .warn(format!("heading level {level} clamped to {max}"));
            level = max;
        }

        let Some(rich_text) = self.rich_text(children, "heading") else {
            return;
        };
        match Block::heading(level, rich_text.clone()) {
            Some(block) => self.emit(out, block),
            None => {
                self.collector.warn(format!(
                    "heading level {level} has no block type; converted to a bold paragraph"
                ));
                let bold = rich_text
                    .into_iter()
                    .map(|mut run| {
                        run.annotations.bold = true;
                        run
                    })
                    .collect();
                self.emit(out, Block::paragraph(bold));
            }
        }
    }

    fn map_list(&mut self, list: &List, depth: usize, out: &mut Vec<Block>) {
        for item in &list.items {
            self.collector.visited();
            let block_type = match (item.checked, list.ordered) {
                (Some(_), _) => "to_do",
                (None, true) => "numbered_list_item",
                (None, false) => "bulleted_list_item",
            };
            let Some(rich_text) = self.rich_text(&item.children, block_type) else {
                continue;
            };
            let block = match (item.checked, list.ordered) {
                (Some(checked), _) => Block::ToDo(ToDoBlock {
                    rich_text,
                    checked,
                    children: Vec::new(),
                }),
                (None, true) => Block::NumberedListItem(TextBlock::new(rich_text)),
                (None, false) => Block::BulletedListItem(TextBlock::new(rich_text)),
            };
            self.attach_children(block, &item.blocks, depth, out);
        }
    }

    fn map_code(&mut self, language: Option<&str>, value: &str, out: &mut Vec<Block>) {
        let info = language.unwrap_or("");
        let language = match canonical_language(info) {
            Some(lang) => lang,
            None => {
                self.collector.warn(format!(
                    "unknown code language `{info}`, using {PLAIN_TEXT}"
                ));
                PLAIN_TEXT
            }
        };
        // Over-long code becomes consecutive code blocks rather than one
        // block with many runs.
        let segments = if self.may_split() && value.chars().count() > MAX_TEXT_LENGTH {
            split_text(value, MAX_TEXT_LENGTH)
        } else {
            vec![value.to_string()]
        };
        for segment in &segments {
            if let Some(rich_text) = self.rich_text(&[Span::plain(segment.as_str())], "code") {
                self.emit(
                    out,
                    Block::Code(CodeBlock {
                        rich_text,
                        language: language.to_string(),
                        caption: Vec::new(),
                    }),
                );
            }
        }
    }

    fn map_table(&mut self, table: &Table, out: &mut Vec<Block>) {
        let mut rows = Vec::with_capacity(table.rows.len() + 1);
        for row in std::iter::once(&table.header).chain(&table.rows) {
            self.collector.visited();
            let mut cells = Vec::with_capacity(row.cells.len());
            for cell in &row.cells {
                let Some(rich_text) = self.rich_text(&cell.children, "table_row") else {
                    return;
                };
                cells.push(rich_text);
            }
            rows.push(TableRowBlock { cells });
        }

        let block = Block::Table(TableBlock {
            table_width: table.width(),
            has_column_header: true,
            has_row_header: false,
            column_alignments: table.alignments.clone(),
            rows,
        });
        self.emit(out, block);
    }

    fn map_metadata(&mut self, doc: &MarkdownDocument, out: &mut Vec<Block>) {
        self.collector.visited();
        match serde_yaml::to_string(&doc.metadata) {
            Ok(yaml) => {
                let yaml = yaml.trim_end().to_string();
                if let Some(rich_text) = self.rich_text(&[Span::plain(yaml)], "code") {
                    self.emit(
                        out,
                        Block::Code(CodeBlock {
                            rich_text,
                            language: "yaml".to_string(),
                            caption: vec![RichText::plain(FRONT_MATTER_CAPTION)],
                        }),
                    );
                }
            }
            Err(e) => self
                .collector
                .warn(format!("front matter could not be written as YAML: {e}")),
        }
    }

    /// Attach mapped children, hoisting any that would exceed the depth cap.
    fn attach_children(&mut self, mut block: Block, children: &[Node], depth: usize, out: &mut Vec<Block>) {
        if children.is_empty() {
            self.emit(out, block);
            return;
        }

        if depth < MAX_NESTING_DEPTH && block.children_mut().is_some() {
            let mut mapped = Vec::new();
            self.map_nodes(children, depth + 1, &mut mapped);
            if let Some(slot) = block.children_mut() {
                *slot = mapped;
            }
            self.emit(out, block);
            return;
        }

        self.emit(out, block);
        for child in children {
            let hoisted = match child {
                Node::List(list) => list.items.len(),
                _ => 1,
            };
            for _ in 0..hoisted {
                self.collector.warn(format!(
                    "nested {} exceeds maximum depth {MAX_NESTING_DEPTH}; moved up a level",
                    child.kind()
                ));
            }
            self.map_node(child, depth, out);
        }
    }

    /// Apply the unsupported-construct policy. Returns true when the caller
    /// should emit a fallback block.
    fn unsupported(&mut self, kind: &str) -> bool {
        self.unsupported_as(kind, "paragraph")
    }

    fn unsupported_as(&mut self, kind: &str, fallback: &str) -> bool {
        self.collector.unsupported(kind);
        match self.opts.handle_unsupported_blocks {
            UnsupportedBlockPolicy::Ignore => {
                self.collector.skipped();
                false
            }
            UnsupportedBlockPolicy::Error => {
                self.collector.error(DocHubError::unsupported(kind));
                false
            }
            UnsupportedBlockPolicy::Convert => {
                self.collector
                    .warn(format!("unsupported {kind} converted to {fallback}"));
                true
            }
        }
    }

    /// Long text is split unless splitting is off or the policy is `error`.
    fn may_split(&self) -> bool {
        self.opts.split_long_text
            && self.opts.handle_unsupported_blocks != UnsupportedBlockPolicy::Error
    }

    /// Spans → rich-text runs, applying annotation, link, and length rules.
    ///
    /// Returns `None` when a run is too long and may not be split; the
    /// error is recorded and the block must be omitted.
    fn rich_text(&mut self, spans: &[Span], block_type: &str) -> Option<Vec<RichText>> {
        let mut runs = Vec::with_capacity(spans.len());
        for span in spans {
            let mut span = span.clone();

            if span.annotations.has_extended() && !self.opts.preserve_colors {
                self.collector.warn(format!(
                    "dropped underline/color formatting from \"{}\"",
                    excerpt(&span.text)
                ));
                span.annotations = span.annotations.without_extended();
            }

            if span.link.as_deref().is_some_and(|link| !is_absolute_url(link)) {
                let link = span.link.take().unwrap_or_default();
                self.collector
                    .warn(format!("dropped relative link `{link}`"));
            }

            let length = span.text.chars().count();
            if length <= MAX_TEXT_LENGTH {
                runs.push(RichText::from(span));
                continue;
            }
            if !self.may_split() {
                self.collector.error(DocHubError::ContentLengthExceeded {
                    block_type: block_type.to_string(),
                    length,
                    limit: MAX_TEXT_LENGTH,
                });
                return None;
            }
            for piece in split_text(&span.text, MAX_TEXT_LENGTH) {
                runs.push(RichText {
                    text: piece,
                    annotations: span.annotations,
                    link: span.link.clone(),
                });
            }
        }
        Some(runs)
    }
}

/// Split a quote's children into its leading paragraph text and the rest.
fn split_lead_paragraph(children: &[Node]) -> (&[Span], &[Node]) {
    match children.split_first() {
        Some((Node::Paragraph { children: spans }, rest)) => (spans, rest),
        _ => (&[], children),
    }
}

fn excerpt(text: &str) -> String {
    const MAX: usize = 40;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
