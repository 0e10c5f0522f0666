//! Markdown text → AST.
//!
//! A line-oriented parser for the markdown subset found in generated
//! documentation:
//! - YAML front matter between `---` fences
//! - ATX headings, paragraphs, thematic breaks
//! - Fenced and indented code blocks
//! - Blockquotes, including `> [!NOTE]` style callouts
//! - Nested bullet, ordered, and task lists
//! - Pipe tables with alignment rows
//! - `<details>` toggles and raw HTML blocks
//!
//! Only unterminated code fences and truncated tables are hard errors.
//! Everything else degrades to a warning on the returned document.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use dochub_shared::{DocHubError, ParseErrorKind, Result};

use crate::annotations::parse_inline;
use crate::ast::{
    Alignment, CalloutKind, List, ListItem, MarkdownDocument, Metadata, Node, Table, TableCell,
    TableRow,
};

/// Options controlling the parser.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Pull a leading front matter block into [`MarkdownDocument::metadata`].
    pub extract_metadata: bool,
    /// Run extra lint-style checks (heading jumps, unbalanced backticks).
    pub validate_syntax: bool,
    /// Keep trailing whitespace on paragraph lines.
    pub preserve_whitespace: bool,
    /// Recognize HTML blocks, `<details>` toggles, and inline tags.
    pub allow_html: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            extract_metadata: true,
            validate_syntax: false,
            preserve_whitespace: false,
            allow_html: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `# Heading` with optional closing hashes.
static ATX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$").expect("ATX regex")
});

/// Matches a `#Heading` missing its space.
static BAD_ATX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}#{1,6}[^#\s]").expect("bad ATX regex"));

/// Matches an opening code fence and its info string.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( {0,3})(`{3,}|~{3,})[ \t]*([^`\s]*)[^`]*$").expect("fence regex")
});

/// Matches `---`, `***`, `___` thematic breaks.
static HR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:(?:\*[ \t]*){3,}|(?:-[ \t]*){3,}|(?:_[ \t]*){3,})$").expect("HR regex")
});

/// Matches a bullet or ordered list item.
static LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( *)([-*+]|\d{1,9}[.)])(?:( +)(.*))?$").expect("list regex")
});

/// Matches a task marker at the start of a list item.
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([ xX])\](?:[ \t]+(.*))?$").expect("task regex"));

/// Matches a table separator row such as `| :--- | ---: |`.
static TABLE_SEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*\|?[ \t]*:?-+:?[ \t]*(?:\|[ \t]*:?-+:?[ \t]*)*\|?[ \t]*$")
        .expect("table separator regex")
});

/// Matches a paragraph consisting of a single image.
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^!\[([^\]]*)\]\(\s*<?([^\s)>]+)>?(?:\s+"([^"]*)")?\s*\)$"#).expect("image regex")
});

/// Matches the `[!NOTE]` marker opening a callout quote.
static CALLOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[!([A-Za-z]+)\][ \t]*$").expect("callout regex"));

/// A `key:` line, the usual first line of front matter.
static FRONT_MATTER_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w-]*\s*:(?:\s|$)").expect("front matter key regex"));

/// Matches the start of an HTML block.
static HTML_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:<!--|</?[A-Za-z][A-Za-z0-9-]*(?:[\s/>]|$))").expect("HTML block regex")
});

static DETAILS_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*<details[^>]*>").expect("details regex"));

static DETAILS_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</details>\s*$").expect("details close regex"));

static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<summary[^>]*>(.*?)</summary>").expect("summary regex"));

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse markdown text into a document.
#[instrument(skip_all, fields(len = text.len()))]
pub fn parse(text: &str, opts: &ParserOptions) -> Result<MarkdownDocument> {
    let normalized = text.replace("\r\n", "\n");
    let mut warnings = Vec::new();

    let (metadata, body, first_line) = if opts.extract_metadata {
        extract_front_matter(&normalized, &mut warnings)
    } else {
        (Metadata::new(), normalized.as_str(), 1)
    };

    let lines: Vec<Line> = body
        .lines()
        .enumerate()
        .map(|(idx, text)| Line {
            text: expand_leading_tabs(text),
            number: first_line + idx,
        })
        .collect();

    let mut parser = BlockParser {
        opts,
        warnings,
        last_line: lines.last().map_or(0, |l| l.number),
        last_heading: 0,
    };
    let content = parser.parse_blocks(&lines)?;

    debug!(
        blocks = content.len(),
        metadata_keys = metadata.len(),
        warnings = parser.warnings.len(),
        "parsed markdown"
    );

    Ok(MarkdownDocument {
        content,
        metadata,
        size: text.len(),
        last_modified: None,
        warnings: parser.warnings,
    })
}

/// Split off a leading `---` front matter block.
///
/// Returns the metadata, the remaining body, and the body's first line number.
/// A fenced region that is not a YAML mapping is left in the body, since a
/// document may simply open with a divider.
fn extract_front_matter<'a>(text: &'a str, warnings: &mut Vec<String>) -> (Metadata, &'a str, usize) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return (Metadata::new(), text, 1);
    };

    let mut offset = 0;
    for (idx, line) in rest.split_inclusive('\n').enumerate() {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return match parse_front_matter(yaml, warnings) {
                // Opening fence, YAML lines, closing fence.
                Some(metadata) => (metadata, body, idx + 3),
                None => (Metadata::new(), text, 1),
            };
        }
        offset += line.len();
    }

    // No closing fence: not front matter after all.
    (Metadata::new(), text, 1)
}

fn parse_front_matter(yaml: &str, warnings: &mut Vec<String>) -> Option<Metadata> {
    if yaml.is_empty() {
        return Some(Metadata::new());
    }
    if yaml.trim().is_empty() {
        return None;
    }
    match serde_yaml::from_str::<Metadata>(yaml) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            // Only warn when the block was plainly meant as metadata.
            let meant_as_metadata = yaml
                .lines()
                .find(|l| !l.trim().is_empty())
                .is_some_and(|l| FRONT_MATTER_KEY_RE.is_match(l));
            if meant_as_metadata {
                warnings.push(warning(
                    ParseErrorKind::Content,
                    e.location().map_or(2, |l| l.line() + 1),
                    format!("front matter is not a YAML mapping, parsed as content: {e}"),
                ));
            }
            None
        }
    }
}

fn warning(kind: ParseErrorKind, line: usize, message: impl std::fmt::Display) -> String {
    format!("{kind} warning at line {line}: {message}")
}

// ---------------------------------------------------------------------------
// Block parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Line {
    text: String,
    /// 1-based line number in the source.
    number: usize,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

struct BlockParser<'a> {
    opts: &'a ParserOptions,
    warnings: Vec<String>,
    /// Number of the final source line.
    last_line: usize,
    /// Level of the previous heading, for jump detection.
    last_heading: u8,
}

impl BlockParser<'_> {
    fn parse_blocks(&mut self, lines: &[Line]) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() {
                i += 1;
                continue;
            }
            let text = line.text.as_str();
            let trimmed = text.trim_start();

            i = if indent_of(text) >= 4 {
                self.parse_indented_code(lines, i, &mut nodes)
            } else if FENCE_RE.is_match(text) {
                self.parse_fence(lines, i, &mut nodes)?
            } else if HR_RE.is_match(text) {
                nodes.push(Node::Divider);
                i + 1
            } else if let Some(caps) = ATX_RE.captures(text) {
                let level = caps[1].len() as u8;
                let content = caps.get(2).map_or("", |m| m.as_str());
                self.check_heading_jump(level, line.number);
                nodes.push(Node::Heading {
                    level,
                    children: parse_inline(content, self.opts.allow_html),
                });
                i + 1
            } else if trimmed.starts_with('>') {
                self.parse_quote(lines, i, &mut nodes)?
            } else if self.opts.allow_html && DETAILS_OPEN_RE.is_match(text) {
                self.parse_details(lines, i, &mut nodes)?
            } else if self.opts.allow_html && HTML_BLOCK_RE.is_match(text) {
                self.parse_html_block(lines, i, &mut nodes)
            } else if LIST_RE.is_match(text) {
                self.parse_list(lines, i, &mut nodes)?
            } else if is_table_start(lines, i) {
                self.parse_table(lines, i, &mut nodes)?
            } else {
                self.parse_paragraph(lines, i, &mut nodes)
            };
        }

        Ok(nodes)
    }

    fn parse_indented_code(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> usize {
        let mut end = start;
        while end < lines.len() && (lines[end].is_blank() || indent_of(&lines[end].text) >= 4) {
            end += 1;
        }
        // Trailing blank lines belong to whatever follows.
        let mut last = end;
        while last > start && lines[last - 1].is_blank() {
            last -= 1;
        }
        let value = lines[start..last]
            .iter()
            .map(|l| strip_indent(&l.text, 4))
            .collect::<Vec<_>>()
            .join("\n");
        nodes.push(Node::Code {
            language: None,
            value,
        });
        end
    }

    fn parse_fence(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> Result<usize> {
        let opening = &lines[start];
        let caps = FENCE_RE
            .captures(&opening.text)
            .ok_or_else(|| DocHubError::parse(ParseErrorKind::Syntax, opening.number, "malformed code fence"))?;
        let fence_indent = caps[1].len();
        let fence = &caps[2];
        let fence_char = fence.chars().next().unwrap_or('`');
        let fence_len = fence.len();
        let info = caps[3].trim();
        let language = (!info.is_empty()).then(|| info.to_string());

        let mut body = Vec::new();
        for (offset, line) in lines[start + 1..].iter().enumerate() {
            let trimmed = line.text.trim();
            let run = trimmed.chars().take_while(|&c| c == fence_char).count();
            let is_close = indent_of(&line.text) < 4
                && run >= fence_len
                && trimmed.chars().all(|c| c == fence_char);
            if is_close {
                nodes.push(Node::Code {
                    language,
                    value: body.join("\n"),
                });
                return Ok(start + offset + 2);
            }
            body.push(strip_indent(&line.text, fence_indent));
        }

        Err(DocHubError::parse(
            ParseErrorKind::Syntax,
            opening.number,
            "unterminated code fence",
        ))
    }

    fn parse_quote(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> Result<usize> {
        let mut end = start;
        let mut inner = Vec::new();
        while end < lines.len() {
            let trimmed = lines[end].text.trim_start();
            let Some(rest) = trimmed.strip_prefix('>') else {
                break;
            };
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            inner.push(Line {
                text: rest.to_string(),
                number: lines[end].number,
            });
            end += 1;
        }

        let marker = inner.iter().position(|l| !l.is_blank()).and_then(|idx| {
            let caps = CALLOUT_RE.captures(inner[idx].text.trim())?;
            CalloutKind::from_marker(&caps[1]).map(|kind| (idx, kind))
        });
        let callout = marker.map(|(idx, kind)| {
            inner.remove(idx);
            kind
        });

        let children = self.parse_blocks(&inner)?;
        nodes.push(Node::Quote { callout, children });
        Ok(end)
    }

    fn parse_details(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> Result<usize> {
        let mut depth = 0usize;
        let mut end = None;
        for (idx, line) in lines.iter().enumerate().skip(start) {
            let lower = line.text.to_ascii_lowercase();
            depth += lower.matches("<details").count();
            depth = depth.saturating_sub(lower.matches("</details>").count());
            if depth == 0 {
                end = Some(idx);
                break;
            }
        }
        let end = match end {
            Some(end) => end,
            None => {
                self.warnings.push(warning(
                    ParseErrorKind::Structure,
                    lines[start].number,
                    "unterminated <details> block",
                ));
                lines.len() - 1
            }
        };

        let raw = lines[start..=end]
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let raw = DETAILS_OPEN_RE.replace(&raw, "");
        let raw = DETAILS_CLOSE_RE.replace(&raw, "");

        let summary_text = SUMMARY_RE
            .captures(&raw)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        let body = SUMMARY_RE.replace(&raw, "");

        let base = lines[start].number;
        let inner: Vec<Line> = body
            .lines()
            .enumerate()
            .map(|(idx, text)| Line {
                text: text.to_string(),
                number: base + idx,
            })
            .collect();

        let children = self.parse_blocks(&inner)?;
        nodes.push(Node::Toggle {
            summary: parse_inline(&summary_text, self.opts.allow_html),
            children,
        });
        Ok(end + 1)
    }

    fn parse_html_block(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> usize {
        let mut end = start;
        while end < lines.len() && !lines[end].is_blank() {
            end += 1;
        }
        let value = lines[start..end]
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        nodes.push(Node::Html { value });
        end
    }

    fn parse_list(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> Result<usize> {
        let Some(first) = LIST_RE.captures(&lines[start].text) else {
            return Ok(start + 1);
        };
        let ordered = first[2].starts_with(|c: char| c.is_ascii_digit());
        let start_number = if ordered {
            first[2]
                .trim_end_matches(['.', ')'])
                .parse()
                .unwrap_or(1)
        } else {
            1
        };

        let mut items = Vec::new();
        let mut i = start;

        while i < lines.len() {
            let Some(caps) = LIST_RE.captures(&lines[i].text) else {
                break;
            };
            if caps[2].starts_with(|c: char| c.is_ascii_digit()) != ordered {
                break;
            }

            let indent = caps[1].len();
            let marker_width = caps[2].len();
            let spacing = caps.get(3).map_or(0, |m| m.len());
            let first_text = caps.get(4).map_or("", |m| m.as_str());
            let content_offset = if spacing == 0 || spacing > 4 {
                indent + marker_width + 1
            } else {
                indent + marker_width + spacing
            };
            let first_text = if spacing > 4 {
                format!("{}{first_text}", " ".repeat(spacing - 1))
            } else {
                first_text.to_string()
            };

            let task = TASK_RE.captures(&first_text).map(|task| {
                let rest = task.get(2).map_or("", |m| m.as_str()).to_string();
                (&task[1] != " ", rest)
            });
            let (checked, first_text) = match task {
                Some((checked, rest)) => (Some(checked), rest),
                None => (None, first_text),
            };

            let mut body = vec![Line {
                text: first_text,
                number: lines[i].number,
            }];
            let mut j = i + 1;
            while j < lines.len() {
                let line = &lines[j];
                if line.is_blank() {
                    let next = lines[j..].iter().position(|l| !l.is_blank()).map(|p| j + p);
                    match next {
                        Some(k) if indent_of(&lines[k].text) >= content_offset => {
                            body.extend(lines[j..k].iter().cloned());
                            j = k;
                            continue;
                        }
                        _ => break,
                    }
                }
                if indent_of(&line.text) >= content_offset {
                    body.push(Line {
                        text: strip_indent(&line.text, content_offset),
                        number: line.number,
                    });
                    j += 1;
                    continue;
                }
                let lazy = body.last().is_some_and(|l| !l.is_blank())
                    && !LIST_RE.is_match(&line.text)
                    && !self.is_block_start(&line.text);
                if lazy {
                    body.push(Line {
                        text: line.text.trim_start().to_string(),
                        number: line.number,
                    });
                    j += 1;
                    continue;
                }
                break;
            }

            let mut blocks = self.parse_blocks(&body)?;
            let children = match blocks.first() {
                Some(Node::Paragraph { .. }) => match blocks.remove(0) {
                    Node::Paragraph { children } => children,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            items.push(ListItem {
                checked,
                children,
                blocks,
            });

            // Blank lines between items keep the list going.
            i = j;
            let next = lines[i..].iter().position(|l| !l.is_blank()).map(|p| i + p);
            match next {
                Some(k) if LIST_RE.is_match(&lines[k].text) => i = k,
                _ => break,
            }
        }

        nodes.push(Node::List(List {
            ordered,
            start: start_number,
            items,
        }));
        Ok(i)
    }

    fn parse_table(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> Result<usize> {
        let header_line = &lines[start];
        let header_cells = split_row(&header_line.text);
        let width = header_cells.len();
        let pipe_closed = header_line.text.trim_end().ends_with('|');

        let mut alignments: Vec<Alignment> = split_row(&lines[start + 1].text)
            .iter()
            .map(|cell| alignment_of(cell))
            .collect();
        if alignments.len() != width {
            self.warnings.push(warning(
                ParseErrorKind::Structure,
                lines[start + 1].number,
                format!(
                    "table separator has {} columns, expected {width}",
                    alignments.len()
                ),
            ));
            alignments.resize(width, Alignment::None);
        }

        let header = self.table_row(header_cells, &alignments);
        let mut rows = Vec::new();
        let mut i = start + 2;
        while i < lines.len() && !lines[i].is_blank() && lines[i].text.contains('|') {
            let line = &lines[i];
            let trimmed = line.text.trim();
            if pipe_closed
                && trimmed.starts_with('|')
                && !trimmed.ends_with('|')
                && line.number == self.last_line
            {
                return Err(DocHubError::parse(
                    ParseErrorKind::Syntax,
                    line.number,
                    "unterminated table row",
                ));
            }

            let mut cells = split_row(&line.text);
            if cells.len() != width {
                self.warnings.push(warning(
                    ParseErrorKind::Structure,
                    line.number,
                    format!("table row has {} columns, expected {width}", cells.len()),
                ));
                cells.resize(width, String::new());
            }
            rows.push(self.table_row(cells, &alignments));
            i += 1;
        }

        nodes.push(Node::Table(Table {
            alignments,
            header,
            rows,
        }));
        Ok(i)
    }

    fn table_row(&self, cells: Vec<String>, alignments: &[Alignment]) -> TableRow {
        TableRow {
            cells: cells
                .iter()
                .zip(alignments)
                .map(|(text, align)| TableCell {
                    align: *align,
                    children: parse_inline(text, self.opts.allow_html),
                })
                .collect(),
        }
    }

    fn parse_paragraph(&mut self, lines: &[Line], start: usize, nodes: &mut Vec<Node>) -> usize {
        let mut end = start;
        while end < lines.len() && !lines[end].is_blank() {
            if end > start && (self.is_block_start(&lines[end].text) || is_table_start(lines, end)) {
                break;
            }
            end += 1;
        }

        let text = lines[start..end]
            .iter()
            .map(|l| {
                let line = l.text.trim_start();
                if self.opts.preserve_whitespace {
                    line.to_string()
                } else {
                    let line = line.trim_end();
                    line.strip_suffix('\\').unwrap_or(line).to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        if self.opts.validate_syntax {
            self.check_paragraph(&lines[start..end], &text);
        }

        if let Some(caps) = IMAGE_RE.captures(&text) {
            nodes.push(Node::Image {
                alt: caps[1].to_string(),
                url: caps[2].to_string(),
                title: caps.get(3).map(|m| m.as_str().to_string()),
            });
        } else {
            nodes.push(Node::paragraph(parse_inline(&text, self.opts.allow_html)));
        }
        end
    }

    /// Whether a line starts a block that interrupts a paragraph.
    fn is_block_start(&self, text: &str) -> bool {
        let trimmed = text.trim_start();
        FENCE_RE.is_match(text)
            || HR_RE.is_match(text)
            || ATX_RE.is_match(text)
            || trimmed.starts_with('>')
            || LIST_RE.is_match(text)
            || (self.opts.allow_html && HTML_BLOCK_RE.is_match(text))
    }

    fn check_heading_jump(&mut self, level: u8, line: usize) {
        if self.opts.validate_syntax && self.last_heading > 0 && level > self.last_heading + 1 {
            self.warnings.push(warning(
                ParseErrorKind::Structure,
                line,
                format!("heading level jumps from {} to {level}", self.last_heading),
            ));
        }
        self.last_heading = level;
    }

    fn check_paragraph(&mut self, lines: &[Line], text: &str) {
        for line in lines {
            if BAD_ATX_RE.is_match(&line.text) {
                self.warnings.push(warning(
                    ParseErrorKind::Syntax,
                    line.number,
                    "heading marker is missing a space",
                ));
            }
        }
        if text.matches('`').count() % 2 == 1 {
            self.warnings.push(warning(
                ParseErrorKind::Syntax,
                lines[0].number,
                "unbalanced backticks",
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_table_start(lines: &[Line], i: usize) -> bool {
    lines[i].text.contains('|')
        && lines
            .get(i + 1)
            .is_some_and(|next| next.text.contains(['|', '-']) && TABLE_SEP_RE.is_match(&next.text))
        && !HR_RE.is_match(&lines[i + 1].text)
}

/// Split a table row into trimmed cell texts. Escaped pipes stay in the cell.
fn split_row(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        &trimmed[..trimmed.len() - 1]
    } else {
        trimmed
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('\\');
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn alignment_of(cell: &str) -> Alignment {
    let cell = cell.trim();
    match (cell.starts_with(':'), cell.ends_with(':')) {
        (true, true) => Alignment::Center,
        (true, false) => Alignment::Left,
        (false, true) => Alignment::Right,
        (false, false) => Alignment::None,
    }
}

/// Width of leading whitespace, counting tabs as four columns.
fn indent_of(text: &str) -> usize {
    text.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Remove up to `n` leading spaces.
fn strip_indent(text: &str, n: usize) -> String {
    let strip = text.chars().take(n).take_while(|c| *c == ' ').count();
    text[strip..].to_string()
}

fn expand_leading_tabs(text: &str) -> String {
    if !text.starts_with('\t') && !text.trim_start_matches(' ').starts_with('\t') {
        return text.to_string();
    }
    let rest = text.trim_start_matches([' ', '\t']);
    let indent = indent_of(text);
    format!("{}{rest}", " ".repeat(indent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Annotations;
    use crate::ast::Span;

    fn parse_default(text: &str) -> MarkdownDocument {
        parse(text, &ParserOptions::default()).expect("parse")
    }

    #[test]
    fn parses_heading_and_paragraph() {
        let doc = parse_default("# Title\n\nSome *italic* and **bold** text.");
        assert_eq!(doc.content.len(), 2);
        assert_eq!(
            doc.content[0],
            Node::Heading {
                level: 1,
                children: vec![Span::plain("Title")],
            }
        );
        let Node::Paragraph { children } = &doc.content[1] else {
            panic!("expected paragraph");
        };
        assert_eq!(children.len(), 5);
        assert_eq!(children[1], Span::styled("italic", Annotations::italic()));
    }

    #[test]
    fn extracts_front_matter() {
        let doc = parse_default("---\ntitle: Guide\ntags: [a, b]\n---\n# Body\n");
        assert_eq!(doc.metadata["title"], "Guide");
        assert_eq!(doc.metadata["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(doc.content.len(), 1);
    }

    #[test]
    fn invalid_front_matter_is_a_warning_and_kept_as_content() {
        let doc = parse_default("---\ntitle: [unclosed\n---\ntext\n");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].starts_with("content warning"));
        assert_eq!(doc.content[0], Node::Divider);
    }

    #[test]
    fn leading_divider_is_not_front_matter() {
        let doc = parse_default("---\n\nHello world\n\n---\n\nAfter\n");
        assert!(doc.metadata.is_empty());
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.content.len(), 4);
        assert_eq!(doc.content[0], Node::Divider);
        assert_eq!(doc.content[2], Node::Divider);
    }

    #[test]
    fn yaml_list_between_dividers_stays_content() {
        let doc = parse_default("---\n- just\n- a list\n---\ntext\n");
        assert!(doc.metadata.is_empty());
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.content[0], Node::Divider);
    }

    #[test]
    fn front_matter_left_alone_when_not_extracting() {
        let opts = ParserOptions {
            extract_metadata: false,
            ..Default::default()
        };
        let doc = parse("---\ntitle: Guide\n---\n", &opts).expect("parse");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.content[0], Node::Divider);
    }

    #[test]
    fn parses_fenced_code() {
        let doc = parse_default("```js\nconsole.log(1)\n```\n");
        assert_eq!(
            doc.content,
            vec![Node::Code {
                language: Some("js".into()),
                value: "console.log(1)".into(),
            }]
        );
    }

    #[test]
    fn unterminated_fence_is_a_syntax_error() {
        let err = parse("intro\n\n```rust\nfn main() {}\n", &ParserOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DocHubError::Parse {
                kind: ParseErrorKind::Syntax,
                line: 3,
                ..
            }
        ));
    }

    #[test]
    fn parses_indented_code() {
        let doc = parse_default("para\n\n    let x = 1;\n    let y = 2;\n\nafter");
        assert_eq!(
            doc.content[1],
            Node::Code {
                language: None,
                value: "let x = 1;\nlet y = 2;".into(),
            }
        );
    }

    #[test]
    fn parses_nested_lists() {
        let doc = parse_default("- one\n  - two\n    - three\n- four\n");
        let Node::List(list) = &doc.content[0] else {
            panic!("expected list");
        };
        assert!(!list.ordered);
        assert_eq!(list.items.len(), 2);
        let Node::List(inner) = &list.items[0].blocks[0] else {
            panic!("expected nested list");
        };
        assert_eq!(inner.items[0].children, vec![Span::plain("two")]);
        assert!(matches!(&inner.items[0].blocks[0], Node::List(_)));
    }

    #[test]
    fn list_item_code_fence_is_a_child() {
        let doc = parse_default("1. Install:\n\n   ```sh\n   cargo install dochub\n   ```\n2. Run\n");
        let Node::List(list) = &doc.content[0] else {
            panic!("expected list");
        };
        assert!(list.ordered);
        assert_eq!(list.items.len(), 2);
        assert!(matches!(
            &list.items[0].blocks[0],
            Node::Code { value, .. } if value == "cargo install dochub"
        ));
    }

    #[test]
    fn parses_task_items() {
        let doc = parse_default("- [x] done\n- [ ] todo\n");
        let Node::List(list) = &doc.content[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items[0].checked, Some(true));
        assert_eq!(list.items[1].checked, Some(false));
        assert_eq!(list.items[1].children, vec![Span::plain("todo")]);
    }

    #[test]
    fn parses_table_with_alignment() {
        let doc = parse_default("| a | b | c |\n| :-- | :-: | --: |\n| 1 | 2 | 3 |\n");
        let Node::Table(table) = &doc.content[0] else {
            panic!("expected table");
        };
        assert_eq!(
            table.alignments,
            vec![Alignment::Left, Alignment::Center, Alignment::Right]
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cells[2].children, vec![Span::plain("3")]);
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn malformed_table_rows_are_repaired() {
        let doc = parse_default("| a | b |\n| --- | --- |\n| 1 |\n| 1 | 2 | 3 |\n");
        let Node::Table(table) = &doc.content[0] else {
            panic!("expected table");
        };
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.rows[1].cells.len(), 2);
        assert_eq!(doc.warnings.len(), 2);
        assert!(doc.warnings[0].starts_with("structure warning at line 3"));
    }

    #[test]
    fn truncated_table_is_a_syntax_error() {
        let err = parse("| a | b |\n| --- | --- |\n| 1 | 2", &ParserOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DocHubError::Parse {
                kind: ParseErrorKind::Syntax,
                ..
            }
        ));
    }

    #[test]
    fn parses_callout_quote() {
        let doc = parse_default("> [!WARNING]\n> Mind the gap.\n");
        assert_eq!(
            doc.content[0],
            Node::Quote {
                callout: Some(CalloutKind::Warning),
                children: vec![Node::paragraph(vec![Span::plain("Mind the gap.")])],
            }
        );
    }

    #[test]
    fn parses_details_toggle() {
        let doc = parse_default(
            "<details>\n<summary>More info</summary>\n\nHidden *text*.\n\n</details>\n\nAfter.",
        );
        let Node::Toggle { summary, children } = &doc.content[0] else {
            panic!("expected toggle, got {:?}", doc.content[0]);
        };
        assert_eq!(summary, &vec![Span::plain("More info")]);
        assert_eq!(children.len(), 1);
        assert_eq!(doc.content.len(), 2);
    }

    #[test]
    fn html_blocks_are_kept_verbatim() {
        let doc = parse_default("<div class=\"note\">\nhello\n</div>\n\ntext");
        assert_eq!(
            doc.content[0],
            Node::Html {
                value: "<div class=\"note\">\nhello\n</div>".into(),
            }
        );

        let opts = ParserOptions {
            allow_html: false,
            ..Default::default()
        };
        let doc = parse("<div>hello</div>", &opts).expect("parse");
        assert!(matches!(doc.content[0], Node::Paragraph { .. }));
    }

    #[test]
    fn parses_standalone_image() {
        let doc = parse_default("![Diagram](https://example.com/d.png \"Flow\")");
        assert_eq!(
            doc.content[0],
            Node::Image {
                url: "https://example.com/d.png".into(),
                alt: "Diagram".into(),
                title: Some("Flow".into()),
            }
        );
    }

    #[test]
    fn paragraph_lines_join_with_newlines() {
        let doc = parse_default("first line\nsecond line\n- list");
        assert_eq!(
            doc.content[0],
            Node::paragraph(vec![Span::plain("first line\nsecond line")])
        );
        assert!(matches!(doc.content[1], Node::List(_)));
    }

    #[test]
    fn validation_checks_report_warnings() {
        let opts = ParserOptions {
            validate_syntax: true,
            ..Default::default()
        };
        let doc = parse("# One\n\n### Three\n\n#NoSpace and `tick\n", &opts).expect("parse");
        assert_eq!(doc.warnings.len(), 3);
    }

    #[test]
    fn crlf_input_is_normalized() {
        let doc = parse_default("# Title\r\n\r\nBody\r\n");
        assert_eq!(doc.content.len(), 2);
        assert_eq!(doc.size, "# Title\r\n\r\nBody\r\n".len());
    }
}
