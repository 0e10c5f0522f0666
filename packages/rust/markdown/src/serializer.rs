//! AST → markdown text.
//!
//! Output is deterministic for a given document and option set: blocks are
//! separated by one blank line, the file ends with a single newline, and line
//! endings follow [`LineBreaks`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use dochub_shared::{CodeBlockStyle, ConversionOptions, LineBreaks};

use crate::annotations::{RenderOptions, escape_text, render_spans};
use crate::ast::{Alignment, List, MarkdownDocument, Node, Span, Table, TableRow};

/// Ordered-list look-alikes (`1. `, `2) `) at the start of a line.
static ORDERED_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,9})([.)])(\s|$)").expect("ordered start regex"));

/// Render a document as markdown.
pub fn serialize(doc: &MarkdownDocument, opts: &ConversionOptions) -> String {
    let writer = Writer { opts };
    let mut out = String::new();
    let mut front_matter = false;

    if !doc.metadata.is_empty() {
        match serde_yaml::to_string(&doc.metadata) {
            Ok(yaml) => {
                out.push_str("---\n");
                out.push_str(&yaml);
                if !yaml.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("---\n");
                front_matter = true;
                if !doc.content.is_empty() {
                    out.push('\n');
                }
            }
            Err(e) => warn!(error = %e, "front matter could not be written; skipped"),
        }
    }

    let body = writer.blocks(&doc.content);
    match body.strip_prefix("---") {
        // A leading `---` would open front matter on the way back in.
        Some(rest) if !front_matter && matches!(doc.content.first(), Some(Node::Divider)) => {
            out.push_str("***");
            out.push_str(rest);
        }
        _ => out.push_str(&body),
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }

    match opts.line_breaks {
        LineBreaks::Lf => out,
        LineBreaks::Crlf => out.replace('\n', opts.line_breaks.as_str()),
    }
}

struct Writer<'a> {
    opts: &'a ConversionOptions,
}

impl Writer<'_> {
    fn inline(&self, spans: &[Span]) -> String {
        render_spans(
            spans,
            RenderOptions {
                emphasis: self.opts.emphasis_marker,
                preserve_colors: self.opts.preserve_colors,
            },
        )
    }

    /// Inline text whose lines may otherwise be read as block syntax.
    fn text_lines(&self, spans: &[Span]) -> String {
        self.inline(spans)
            .split('\n')
            .map(escape_line_start)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn blocks(&self, nodes: &[Node]) -> String {
        let mut out = String::new();
        for (idx, node) in nodes.iter().enumerate() {
            if idx > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&self.node(node));
        }
        out
    }

    fn node(&self, node: &Node) -> String {
        match node {
            Node::Heading { level, children } => {
                let text = self.inline(children).replace('\n', " ");
                format!("{} {text}", "#".repeat(usize::from(*level)))
            }
            Node::Paragraph { children } => self.text_lines(children),
            Node::List(list) => self.list(list),
            Node::Code { language, value } => self.code(language.as_deref(), value),
            Node::Quote { callout, children } => {
                let mut inner = self.blocks(children);
                if let Some(kind) = callout {
                    let marker = format!("[!{}]", kind.marker());
                    inner = if inner.is_empty() {
                        marker
                    } else {
                        format!("{marker}\n{inner}")
                    };
                }
                inner
                    .split('\n')
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Node::Toggle { summary, children } => {
                let summary = self.inline(summary).replace('\n', " ");
                let inner = self.blocks(children);
                if inner.is_empty() {
                    format!("<details>\n<summary>{summary}</summary>\n</details>")
                } else {
                    format!("<details>\n<summary>{summary}</summary>\n\n{inner}\n\n</details>")
                }
            }
            Node::Table(table) => self.table(table),
            Node::Image { url, alt, title } => match title {
                Some(title) => format!("![{}]({url} \"{}\")", escape_text(alt), title.replace('"', "'")),
                None => format!("![{}]({url})", escape_text(alt)),
            },
            Node::Divider => "---".to_string(),
            Node::Html { value } => value.clone(),
        }
    }

    fn list(&self, list: &List) -> String {
        let mut out = String::new();
        for (idx, item) in list.items.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }

            let marker = if list.ordered {
                format!("{}.", list.start + idx as u64)
            } else {
                self.opts.list_marker.as_char().to_string()
            };
            let width = self.opts.indent_size.max(marker.len() + 1);
            let pad = " ".repeat(width);

            let mut text = self.text_lines(&item.children);
            if let Some(checked) = item.checked {
                let task = if checked { "[x]" } else { "[ ]" };
                text = if text.is_empty() {
                    task.to_string()
                } else {
                    format!("{task} {text}")
                };
            }
            let text = indent_lines(&text, &pad);
            out.push_str(&format!("{marker:<width$}{}", text.trim_start()));

            for (child_idx, child) in item.blocks.iter().enumerate() {
                // A leading sub-list stays tight; anything else gets a blank line.
                let tight = matches!(child, Node::List(_))
                    && (child_idx == 0 || matches!(item.blocks[child_idx - 1], Node::List(_)));
                out.push_str(if tight { "\n" } else { "\n\n" });
                out.push_str(&indent_block(&self.node(child), &pad));
            }
        }
        out
    }

    fn code(&self, language: Option<&str>, value: &str) -> String {
        match self.opts.code_block_style {
            CodeBlockStyle::Indented if !value.is_empty() => value
                .split('\n')
                .map(|line| {
                    if line.is_empty() {
                        String::new()
                    } else {
                        format!("    {line}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => {
                let longest = value
                    .split(|c| c != '`')
                    .map(str::len)
                    .max()
                    .unwrap_or(0);
                let fence = "`".repeat(longest.max(2) + 1);
                let info = language.unwrap_or("");
                if value.is_empty() {
                    format!("{fence}{info}\n{fence}")
                } else {
                    format!("{fence}{info}\n{value}\n{fence}")
                }
            }
        }
    }

    fn table(&self, table: &Table) -> String {
        let mut lines = Vec::with_capacity(table.rows.len() + 2);
        lines.push(self.table_row(&table.header));
        let separator = table
            .alignments
            .iter()
            .map(|align| match align {
                Alignment::None => "---",
                Alignment::Left => ":---",
                Alignment::Center => ":---:",
                Alignment::Right => "---:",
            })
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(format!("| {separator} |"));
        for row in &table.rows {
            lines.push(self.table_row(row));
        }
        lines.join("\n")
    }

    fn table_row(&self, row: &TableRow) -> String {
        let cells = row
            .cells
            .iter()
            .map(|cell| {
                self.inline(&cell.children)
                    .replace('\n', " ")
                    .replace('|', "\\|")
            })
            .collect::<Vec<_>>()
            .join(" | ");
        format!("| {cells} |")
    }
}

/// Indent every non-empty line after the first.
fn indent_lines(text: &str, pad: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every non-empty line.
fn indent_block(text: &str, pad: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape a character that would turn a text line into block syntax.
fn escape_line_start(line: &str) -> String {
    let body = line.trim_start();
    let lead = &line[..line.len() - body.len()];

    if let Some(caps) = ORDERED_START_RE.captures(body) {
        let digits = caps[1].len();
        return format!("{lead}{}\\{}", &body[..digits], &body[digits..]);
    }

    let first = body.chars().next();
    let second = body.chars().nth(1);
    let needs_escape = match first {
        Some('#' | '>') => true,
        Some('-' | '+') => second.is_none_or(char::is_whitespace) || body.chars().all(|c| c == '-'),
        Some('=') => body.chars().all(|c| c == '='),
        _ => false,
    };
    if needs_escape {
        format!("{lead}\\{body}")
    } else {
        line.to_string()
    }
}
