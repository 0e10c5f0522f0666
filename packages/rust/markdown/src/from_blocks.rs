//! Block tree → AST (reverse conversion).

use tracing::debug;

use dochub_shared::{ConversionOptions, DocHubError, UnsupportedBlockPolicy};

use crate::annotations::merge_spans;
use crate::ast::{
    Alignment, CalloutKind, List, ListItem, MarkdownDocument, Metadata, Node, Span, Table,
    TableCell, TableRow,
};
use crate::blocks::{Block, RichText, TableBlock, TableRowBlock};
use crate::collector::Collector;
use crate::languages::fence_language;

/// Convert blocks into a document, recording issues on `collector`.
pub(crate) fn map_blocks(
    blocks: &[Block],
    opts: &ConversionOptions,
    collector: &mut Collector,
) -> MarkdownDocument {
    let mut mapper = ReverseMapper { opts, collector };

    let mut blocks = blocks;
    let mut metadata = Metadata::new();
    if opts.include_metadata {
        if let Some((Block::Code(code), rest)) = blocks.split_first() {
            if code.is_front_matter() {
                if let Some(parsed) = mapper.front_matter(&code.rich_text) {
                    metadata = parsed;
                    blocks = rest;
                }
            }
        }
    }

    let content = mapper.map_blocks(blocks);
    debug!(nodes = content.len(), "mapped blocks to markdown AST");

    MarkdownDocument {
        content,
        metadata,
        ..Default::default()
    }
}

struct ReverseMapper<'a> {
    opts: &'a ConversionOptions,
    collector: &'a mut Collector,
}

/// Which markdown list a run of list-item blocks belongs to.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
}

fn list_kind(block: &Block) -> Option<ListKind> {
    match block {
        Block::BulletedListItem(_) | Block::ToDo(_) => Some(ListKind::Bulleted),
        Block::NumberedListItem(_) => Some(ListKind::Numbered),
        _ => None,
    }
}

impl ReverseMapper<'_> {
    fn map_blocks(&mut self, blocks: &[Block]) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut i = 0;
        while i < blocks.len() {
            if let Some(kind) = list_kind(&blocks[i]) {
                let run = blocks[i..]
                    .iter()
                    .take_while(|b| list_kind(b) == Some(kind))
                    .count();
                nodes.push(self.map_list(&blocks[i..i + run], kind));
                i += run;
            } else {
                self.map_block(&blocks[i], &mut nodes);
                i += 1;
            }
        }
        nodes
    }

    fn map_list(&mut self, blocks: &[Block], kind: ListKind) -> Node {
        let items = blocks
            .iter()
            .map(|block| {
                self.collector.visited();
                self.collector.converted(1);
                let checked = match block {
                    Block::ToDo(todo) => Some(todo.checked),
                    _ => None,
                };
                ListItem {
                    checked,
                    children: self.spans(block.rich_text()),
                    blocks: self.map_blocks(block.children()),
                }
            })
            .collect();

        Node::List(List {
            ordered: kind == ListKind::Numbered,
            start: 1,
            items,
        })
    }

    fn map_block(&mut self, block: &Block, out: &mut Vec<Node>) {
        // List items count themselves in `map_list`.
        if list_kind(block).is_none() {
            self.collector.visited();
        }

        let node = match block {
            Block::Heading1(b) => heading(1, self.spans(&b.rich_text)),
            Block::Heading2(b) => heading(2, self.spans(&b.rich_text)),
            Block::Heading3(b) => heading(3, self.spans(&b.rich_text)),
            Block::Paragraph(b) => {
                out.push(Node::paragraph(self.spans(&b.rich_text)));
                self.collector.converted(1);
                // Paragraph children have no markdown nesting; keep them in order.
                let children = self.map_blocks(&b.children);
                out.extend(children);
                return;
            }
            Block::Quote(b) => Node::Quote {
                callout: None,
                children: self.with_lead(&b.rich_text, &b.children),
            },
            Block::Callout(b) => Node::Quote {
                callout: self
                    .opts
                    .convert_callouts
                    .then(|| CalloutKind::from_icon(b.icon.as_deref())),
                children: self.with_lead(&b.rich_text, &b.children),
            },
            Block::Toggle(b) => {
                if self.opts.convert_toggles {
                    Node::Toggle {
                        summary: self.spans(&b.rich_text),
                        children: self.map_blocks(&b.children),
                    }
                } else {
                    if self.unsupported("toggle") {
                        let summary = self
                            .spans(&b.rich_text)
                            .into_iter()
                            .map(|mut span| {
                                span.annotations.bold = true;
                                span
                            })
                            .collect();
                        out.push(Node::paragraph(summary));
                        self.collector.converted(1);
                        let children = self.map_blocks(&b.children);
                        out.extend(children);
                    }
                    return;
                }
            }
            Block::Code(b) => Node::Code {
                language: fence_language(&b.language).map(str::to_string),
                value: b.rich_text.iter().map(|r| r.text.as_str()).collect(),
            },
            Block::Divider => Node::Divider,
            Block::Image(b) => Node::Image {
                url: b.url.clone(),
                alt: b.caption.iter().map(|r| r.text.as_str()).collect(),
                title: None,
            },
            Block::Table(table) => match self.table(table) {
                Some(node) => node,
                None => return,
            },
            Block::TableRow(row) => {
                if self.unsupported("table_row") {
                    let text = row
                        .cells
                        .iter()
                        .map(|cell| cell.iter().map(|r| r.text.as_str()).collect::<String>())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    out.push(Node::paragraph(vec![Span::plain(text)]));
                    self.collector.converted(1);
                }
                return;
            }
            Block::Unsupported(b) => {
                if self.unsupported(&b.block_type) && !b.rich_text.is_empty() {
                    out.push(Node::paragraph(self.spans(&b.rich_text)));
                    self.collector.converted(1);
                }
                return;
            }
            Block::BulletedListItem(_) | Block::NumberedListItem(_) | Block::ToDo(_) => {
                let kind = list_kind(block).unwrap_or(ListKind::Bulleted);
                out.push(self.map_list(std::slice::from_ref(block), kind));
                return;
            }
        };

        self.collector.converted(1);
        out.push(node);
    }

    /// A quote's own text as its first paragraph, then its children.
    fn with_lead(&mut self, rich_text: &[RichText], children: &[Block]) -> Vec<Node> {
        let mut nodes = Vec::new();
        let lead = self.spans(rich_text);
        if !lead.is_empty() {
            nodes.push(Node::paragraph(lead));
        }
        nodes.extend(self.map_blocks(children));
        nodes
    }

    fn table(&mut self, table: &TableBlock) -> Option<Node> {
        let width = table
            .rows
            .iter()
            .map(|r| r.cells.len())
            .max()
            .unwrap_or(0)
            .max(table.table_width);
        let Some((first, rest)) = table.rows.split_first() else {
            self.collector.warn("table has no rows; dropped");
            self.collector.skipped();
            return None;
        };

        let (header, body) = if table.has_column_header {
            (self.table_row(first, width), rest)
        } else {
            self.collector
                .warn("table has no column header; an empty header row was added");
            let empty = TableRow {
                cells: vec![TableCell::default(); width],
            };
            (empty, table.rows.as_slice())
        };

        let mut alignments = table.column_alignments.clone();
        alignments.resize(width, Alignment::None);
        let rows = body.iter().map(|r| self.table_row(r, width)).collect();

        Some(Node::Table(Table {
            alignments,
            header,
            rows,
        }))
    }

    fn table_row(&mut self, row: &TableRowBlock, width: usize) -> TableRow {
        let mut cells: Vec<TableCell> = row
            .cells
            .iter()
            .map(|cell| TableCell {
                align: Alignment::None,
                children: self.spans(cell),
            })
            .collect();
        cells.resize(width, TableCell::default());
        TableRow { cells }
    }

    fn front_matter(&mut self, rich_text: &[RichText]) -> Option<Metadata> {
        let yaml: String = rich_text.iter().map(|r| r.text.as_str()).collect();
        match serde_yaml::from_str::<Metadata>(&yaml) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                self.collector
                    .warn(format!("front matter block is not valid YAML: {e}"));
                None
            }
        }
    }

    /// Apply the unsupported-construct policy. Returns true when the caller
    /// should emit a fallback node.
    fn unsupported(&mut self, kind: &str) -> bool {
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
                    .warn(format!("unsupported {kind} block converted to paragraph"));
                true
            }
        }
    }

    /// Rich-text runs → merged spans.
    fn spans(&mut self, rich_text: &[RichText]) -> Vec<Span> {
        let spans = rich_text
            .iter()
            .cloned()
            .map(|run| {
                let mut span = Span::from(run);
                if span.annotations.has_extended() && !self.opts.preserve_colors {
                    self.collector.warn(format!(
                        "dropped underline/color formatting from \"{}\"",
                        span.text
                    ));
                    span.annotations = span.annotations.without_extended();
                }
                span
            })
            .collect();
        merge_spans(spans)
    }
}

fn heading(level: u8, children: Vec<Span>) -> Node {
    Node::Heading { level, children }
}
