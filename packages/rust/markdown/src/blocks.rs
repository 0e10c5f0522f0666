//! Structured-document block model.
//!
//! One variant per block type, each carrying only the fields that type has.
//! Serializes with an internal `type` tag, e.g.
//! `{"type": "heading_1", "rich_text": [...]}`.

use serde::{Deserialize, Serialize};

use crate::annotations::Annotations;
use crate::ast::{Alignment, Span};

/// Hard limit on the text length of one rich-text run, in characters.
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Deepest block nesting the service accepts.
pub const MAX_NESTING_DEPTH: usize = 2;

/// Caption on the yaml code block that carries a document's front matter.
pub const FRONT_MATTER_CAPTION: &str = "front matter";

/// A contiguous span of text sharing one annotation set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    pub text: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RichText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<Span> for RichText {
    fn from(span: Span) -> Self {
        Self {
            text: span.text,
            annotations: span.annotations,
            link: span.link,
        }
    }
}

impl From<RichText> for Span {
    fn from(run: RichText) -> Self {
        Self {
            text: run.text,
            annotations: run.annotations,
            link: run.link,
        }
    }
}

/// Shared shape of text blocks that may nest children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl TextBlock {
    pub fn new(rich_text: Vec<RichText>) -> Self {
        Self {
            rich_text,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToDoBlock {
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub rich_text: Vec<RichText>,
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption: Vec<RichText>,
}

impl CodeBlock {
    /// True for the block written from front matter, not for any yaml code.
    pub fn is_front_matter(&self) -> bool {
        self.language.eq_ignore_ascii_case("yaml")
            && self.caption.iter().map(|r| r.text.as_str()).collect::<String>() == FRONT_MATTER_CAPTION
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalloutBlock {
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

/// Table configuration plus its rows.
///
/// Column alignment lives here rather than on cells; the service has no
/// per-cell alignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    pub table_width: usize,
    #[serde(default)]
    pub has_column_header: bool,
    #[serde(default)]
    pub has_row_header: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_alignments: Vec<Alignment>,
    #[serde(default)]
    pub rows: Vec<TableRowBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRowBlock {
    /// One rich-text group per column.
    pub cells: Vec<Vec<RichText>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption: Vec<RichText>,
}

/// A block type the converter has no mapping for, as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedBlock {
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rich_text: Vec<RichText>,
}

/// A typed unit of structured-document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    #[serde(rename = "heading_1")]
    Heading1(TextBlock),
    #[serde(rename = "heading_2")]
    Heading2(TextBlock),
    #[serde(rename = "heading_3")]
    Heading3(TextBlock),
    Paragraph(TextBlock),
    BulletedListItem(TextBlock),
    NumberedListItem(TextBlock),
    ToDo(ToDoBlock),
    Code(CodeBlock),
    Quote(TextBlock),
    Callout(CalloutBlock),
    Toggle(TextBlock),
    Divider,
    Table(TableBlock),
    TableRow(TableRowBlock),
    Image(ImageBlock),
    Unsupported(UnsupportedBlock),
}

impl Block {
    /// The block's type name as the service spells it.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Heading1(_) => "heading_1",
            Self::Heading2(_) => "heading_2",
            Self::Heading3(_) => "heading_3",
            Self::Paragraph(_) => "paragraph",
            Self::BulletedListItem(_) => "bulleted_list_item",
            Self::NumberedListItem(_) => "numbered_list_item",
            Self::ToDo(_) => "to_do",
            Self::Code(_) => "code",
            Self::Quote(_) => "quote",
            Self::Callout(_) => "callout",
            Self::Toggle(_) => "toggle",
            Self::Divider => "divider",
            Self::Table(_) => "table",
            Self::TableRow(_) => "table_row",
            Self::Image(_) => "image",
            Self::Unsupported(b) => &b.block_type,
        }
    }

    /// Build a heading block for levels 1–3.
    pub fn heading(level: u8, rich_text: Vec<RichText>) -> Option<Self> {
        let content = TextBlock::new(rich_text);
        match level {
            1 => Some(Self::Heading1(content)),
            2 => Some(Self::Heading2(content)),
            3 => Some(Self::Heading3(content)),
            _ => None,
        }
    }

    pub fn paragraph(rich_text: Vec<RichText>) -> Self {
        Self::Paragraph(TextBlock::new(rich_text))
    }

    /// Primary rich text, where the block type has one.
    pub fn rich_text(&self) -> &[RichText] {
        match self {
            Self::Heading1(b)
            | Self::Heading2(b)
            | Self::Heading3(b)
            | Self::Paragraph(b)
            | Self::BulletedListItem(b)
            | Self::NumberedListItem(b)
            | Self::Quote(b)
            | Self::Toggle(b) => &b.rich_text,
            Self::ToDo(b) => &b.rich_text,
            Self::Code(b) => &b.rich_text,
            Self::Callout(b) => &b.rich_text,
            Self::Unsupported(b) => &b.rich_text,
            Self::Image(b) => &b.caption,
            Self::Divider | Self::Table(_) | Self::TableRow(_) => &[],
        }
    }

    /// Nested child blocks.
    pub fn children(&self) -> &[Block] {
        match self {
            Self::Paragraph(b)
            | Self::BulletedListItem(b)
            | Self::NumberedListItem(b)
            | Self::Quote(b)
            | Self::Toggle(b)
            | Self::Heading1(b)
            | Self::Heading2(b)
            | Self::Heading3(b) => &b.children,
            Self::ToDo(b) => &b.children,
            Self::Callout(b) => &b.children,
            Self::Code(_)
            | Self::Divider
            | Self::Table(_)
            | Self::TableRow(_)
            | Self::Image(_)
            | Self::Unsupported(_) => &[],
        }
    }

    /// Mutable access to nested children, for block types that can nest.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Self::Paragraph(b)
            | Self::BulletedListItem(b)
            | Self::NumberedListItem(b)
            | Self::Quote(b)
            | Self::Toggle(b) => Some(&mut b.children),
            Self::ToDo(b) => Some(&mut b.children),
            Self::Callout(b) => Some(&mut b.children),
            Self::Heading1(_)
            | Self::Heading2(_)
            | Self::Heading3(_)
            | Self::Code(_)
            | Self::Divider
            | Self::Table(_)
            | Self::TableRow(_)
            | Self::Image(_)
            | Self::Unsupported(_) => None,
        }
    }

    /// Depth of the block tree rooted here (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(Block::depth).max().unwrap_or(0)
    }
}
