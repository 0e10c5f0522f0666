//! Markdown abstract syntax tree.
//!
//! Block-level nodes own their children outright; inline content is a flat
//! sequence of [`Span`]s, each carrying the full annotation set that applies
//! to it after nested emphasis has been resolved.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotations::Annotations;

/// Front matter key/value pairs, sorted for deterministic output.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A parsed markdown document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDocument {
    /// Block-level nodes in document order.
    pub content: Vec<Node>,
    /// Front matter (empty when absent or not extracted).
    pub metadata: Metadata,
    /// Size of the source text in bytes.
    pub size: usize,
    /// Modification time of the source file, when parsed from disk.
    pub last_modified: Option<DateTime<Utc>>,
    /// Irregularities the parser repaired instead of failing on.
    pub warnings: Vec<String>,
}

/// A block-level markdown node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Heading {
        level: u8,
        children: Vec<Span>,
    },
    Paragraph {
        children: Vec<Span>,
    },
    List(List),
    Code {
        language: Option<String>,
        value: String,
    },
    Quote {
        /// Set when the quote opens with an alert marker such as `[!NOTE]`.
        callout: Option<CalloutKind>,
        children: Vec<Node>,
    },
    Toggle {
        summary: Vec<Span>,
        children: Vec<Node>,
    },
    Table(Table),
    Image {
        url: String,
        alt: String,
        title: Option<String>,
    },
    Divider,
    /// Raw HTML block, carried verbatim.
    Html {
        value: String,
    },
}

impl Node {
    /// Name of the construct, as reported in statistics and warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::Paragraph { .. } => "paragraph",
            Self::List(_) => "list",
            Self::Code { .. } => "code",
            Self::Quote { callout: Some(_), .. } => "callout",
            Self::Quote { .. } => "quote",
            Self::Toggle { .. } => "toggle",
            Self::Table(_) => "table",
            Self::Image { .. } => "image",
            Self::Divider => "divider",
            Self::Html { .. } => "html",
        }
    }

    pub fn paragraph(children: Vec<Span>) -> Self {
        Self::Paragraph { children }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    /// First number of an ordered list.
    pub start: u64,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListItem {
    /// `Some` for task items (`- [ ]` / `- [x]`).
    pub checked: Option<bool>,
    /// The item's own text.
    pub children: Vec<Span>,
    /// Nested block content (sub-lists, code fences, further paragraphs).
    pub blocks: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Per-column alignment from the separator row.
    pub alignments: Vec<Alignment>,
    pub header: TableRow,
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.alignments.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub align: Alignment,
    pub children: Vec<Span>,
}

/// Column alignment from a table separator row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

/// Alert kinds recognized in `> [!KIND]` quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl CalloutKind {
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.to_ascii_uppercase().as_str() {
            "NOTE" => Some(Self::Note),
            "TIP" => Some(Self::Tip),
            "IMPORTANT" => Some(Self::Important),
            "WARNING" => Some(Self::Warning),
            "CAUTION" => Some(Self::Caution),
            _ => None,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Self::Note => "NOTE",
            Self::Tip => "TIP",
            Self::Important => "IMPORTANT",
            Self::Warning => "WARNING",
            Self::Caution => "CAUTION",
        }
    }

    /// Icon shown on the callout block.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Note => "ℹ️",
            Self::Tip => "💡",
            Self::Important => "❗",
            Self::Warning => "⚠️",
            Self::Caution => "🚨",
        }
    }

    /// Inverse of [`CalloutKind::icon`]; unknown icons read as notes.
    pub fn from_icon(icon: Option<&str>) -> Self {
        match icon {
            Some("💡") => Self::Tip,
            Some("❗") => Self::Important,
            Some("⚠️") => Self::Warning,
            Some("🚨") => Self::Caution,
            _ => Self::Note,
        }
    }
}

/// An inline text node: a run of text sharing one annotation set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub annotations: Annotations,
    pub link: Option<String>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn styled(text: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            text: text.into(),
            annotations,
            link: None,
        }
    }

    /// Whether two spans can be merged into one.
    pub fn same_style(&self, other: &Span) -> bool {
        self.annotations == other.annotations && self.link == other.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callout_icons_roundtrip() {
        for kind in [
            CalloutKind::Note,
            CalloutKind::Tip,
            CalloutKind::Important,
            CalloutKind::Warning,
            CalloutKind::Caution,
        ] {
            assert_eq!(CalloutKind::from_icon(Some(kind.icon())), kind);
            assert_eq!(CalloutKind::from_marker(kind.marker()), Some(kind));
        }
        assert_eq!(CalloutKind::from_icon(Some("🦀")), CalloutKind::Note);
        assert_eq!(CalloutKind::from_marker("todo"), None);
    }

    #[test]
    fn node_kinds() {
        let quote = Node::Quote {
            callout: Some(CalloutKind::Tip),
            children: vec![],
        };
        assert_eq!(quote.kind(), "callout");
        assert_eq!(Node::Divider.kind(), "divider");
    }
}
