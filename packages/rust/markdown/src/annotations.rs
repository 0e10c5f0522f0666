//! Inline emphasis markers ⇄ annotation records.
//!
//! Parsing resolves nested emphasis into flat [`Span`]s. Rendering goes the
//! other way with one canonical nesting: link, color, underline,
//! strikethrough, bold, italic, code, from outermost to innermost. Bold and
//! italic together render as `**_text_**` (or `__*text*__` with the `_`
//! marker), and the parser reads that form back to the same annotations.
//!
//! Code spans win over everything else: their content is never scanned for
//! emphasis.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use dochub_shared::EmphasisMarker;

use crate::ast::Span;

// ---------------------------------------------------------------------------
// Annotation record
// ---------------------------------------------------------------------------

/// Text colors supported by the structured-document service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    #[default]
    Default,
    Gray,
    Brown,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Red,
    GrayBackground,
    BrownBackground,
    OrangeBackground,
    YellowBackground,
    GreenBackground,
    BlueBackground,
    PurpleBackground,
    PinkBackground,
    RedBackground,
}

impl Color {
    const ALL: [Color; 19] = [
        Color::Default,
        Color::Gray,
        Color::Brown,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Purple,
        Color::Pink,
        Color::Red,
        Color::GrayBackground,
        Color::BrownBackground,
        Color::OrangeBackground,
        Color::YellowBackground,
        Color::GreenBackground,
        Color::BlueBackground,
        Color::PurpleBackground,
        Color::PinkBackground,
        Color::RedBackground,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Gray => "gray",
            Self::Brown => "brown",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Red => "red",
            Self::GrayBackground => "gray_background",
            Self::BrownBackground => "brown_background",
            Self::OrangeBackground => "orange_background",
            Self::YellowBackground => "yellow_background",
            Self::GreenBackground => "green_background",
            Self::BlueBackground => "blue_background",
            Self::PurpleBackground => "purple_background",
            Self::PinkBackground => "pink_background",
            Self::RedBackground => "red_background",
        }
    }

    /// Parse a color name as written in a `style="color: …"` attribute.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// Formatting flags attached to a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: Color,
}

impl Annotations {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Default::default()
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Default::default()
        }
    }

    /// Annotations with no standard markdown syntax (underline, color).
    pub fn has_extended(&self) -> bool {
        self.underline || self.color != Color::Default
    }

    /// Copy with underline and color cleared.
    pub fn without_extended(self) -> Self {
        Self {
            underline: false,
            color: Color::Default,
            ..self
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Matches an opening `<span style="color: …">` tag.
static COLOR_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<span\s+style\s*=\s*["']\s*color\s*:\s*([A-Za-z_-]+)\s*;?\s*["']\s*>"#)
        .expect("color span regex")
});

/// Simple paired HTML tags recognized inline.
const PAIRED_TAGS: &[(&str, &str)] = &[
    ("<u>", "</u>"),
    ("<strong>", "</strong>"),
    ("<b>", "</b>"),
    ("<em>", "</em>"),
    ("<i>", "</i>"),
    ("<del>", "</del>"),
    ("<s>", "</s>"),
];

fn apply_tag(open: &str, annotations: &mut Annotations) {
    match open {
        "<u>" => annotations.underline = true,
        "<strong>" | "<b>" => annotations.bold = true,
        "<em>" | "<i>" => annotations.italic = true,
        _ => annotations.strikethrough = true,
    }
}

const LINE_BREAK_TAGS: &[&str] = &["<br>", "<br/>", "<br />"];

/// Parse inline markdown into merged spans.
pub fn parse_inline(text: &str, allow_html: bool) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let mut parser = InlineParser {
        chars: &chars,
        allow_html,
        out: Vec::new(),
    };
    parser.parse_range(0, chars.len(), Annotations::default(), None);
    merge_spans(parser.out)
}

struct InlineParser<'a> {
    chars: &'a [char],
    allow_html: bool,
    out: Vec<Span>,
}

impl InlineParser<'_> {
    fn parse_range(&mut self, start: usize, end: usize, base: Annotations, link: Option<&str>) {
        let chars = self.chars;
        let mut buf = String::new();
        let mut i = start;

        while i < end {
            let c = chars[i];
            match c {
                '\\' if i + 1 < end && chars[i + 1].is_ascii_punctuation() => {
                    buf.push(chars[i + 1]);
                    i += 2;
                }
                '`' => {
                    let n = run_length(chars, i, end, '`');
                    match find_code_close(chars, i + n, end, n) {
                        Some(close) => {
                            self.flush(&mut buf, base, link);
                            let content = trim_code_padding(&chars[i + n..close]);
                            let mut annotations = base;
                            annotations.code = true;
                            self.push(content, annotations, link);
                            i = close + n;
                        }
                        None => {
                            buf.extend(&chars[i..i + n]);
                            i += n;
                        }
                    }
                }
                '!' if i + 1 < end && chars[i + 1] == '[' => match parse_link(chars, i + 1, end) {
                    Some(parsed) => {
                        // Inline images keep their alt text, linked to the image.
                        self.flush(&mut buf, base, link);
                        let alt: String = chars[parsed.text_start..parsed.text_end].iter().collect();
                        let target = link.map(str::to_string).unwrap_or(parsed.url);
                        self.push(alt, base, Some(&target));
                        i = parsed.next;
                    }
                    None => {
                        buf.push(c);
                        i += 1;
                    }
                },
                '[' => match parse_link(chars, i, end) {
                    Some(parsed) => {
                        self.flush(&mut buf, base, link);
                        let target = link.map(str::to_string).unwrap_or(parsed.url);
                        self.parse_range(parsed.text_start, parsed.text_end, base, Some(&target));
                        i = parsed.next;
                    }
                    None => {
                        buf.push(c);
                        i += 1;
                    }
                },
                '<' if self.allow_html => match self.parse_html(i, end, base, link, &mut buf) {
                    Some(next) => i = next,
                    None => {
                        buf.push(c);
                        i += 1;
                    }
                },
                '*' | '_' => {
                    let n = run_length(chars, i, end, c);
                    match self.parse_emphasis(i, n, end, c) {
                        Some((count, close)) => {
                            self.flush(&mut buf, base, link);
                            let mut annotations = base;
                            match count {
                                1 => annotations.italic = true,
                                2 => annotations.bold = true,
                                _ => {
                                    annotations.bold = true;
                                    annotations.italic = true;
                                }
                            }
                            self.parse_range(i + count, close, annotations, link);
                            i = close + count;
                        }
                        None => {
                            buf.extend(&chars[i..i + n]);
                            i += n;
                        }
                    }
                }
                '~' => {
                    let n = run_length(chars, i, end, '~');
                    let opens = n == 2 && i + 2 < end && !chars[i + 2].is_whitespace();
                    match opens.then(|| find_closer(chars, i + 2, end, '~', 2)).flatten() {
                        Some(close) => {
                            self.flush(&mut buf, base, link);
                            let mut annotations = base;
                            annotations.strikethrough = true;
                            self.parse_range(i + 2, close, annotations, link);
                            i = close + 2;
                        }
                        None => {
                            buf.extend(&chars[i..i + n]);
                            i += n;
                        }
                    }
                }
                _ => {
                    buf.push(c);
                    i += 1;
                }
            }
        }

        self.flush(&mut buf, base, link);
    }

    /// Find the closer for an emphasis run of `n` markers at `i`.
    ///
    /// Tries the longest usable delimiter first. Returns the delimiter
    /// length used and the position of its closer.
    fn parse_emphasis(&self, i: usize, n: usize, end: usize, marker: char) -> Option<(usize, usize)> {
        let chars = self.chars;
        let after = i + n;
        if after >= end || chars[after].is_whitespace() {
            return None;
        }
        if marker == '_' && i > 0 && chars[i - 1].is_alphanumeric() {
            return None;
        }
        (1..=n.min(3))
            .rev()
            .find_map(|count| find_closer(chars, i + count, end, marker, count).map(|close| (count, close)))
    }

    /// Try to consume an HTML construct at `i`. Returns the index after it.
    fn parse_html(
        &mut self,
        i: usize,
        end: usize,
        base: Annotations,
        link: Option<&str>,
        buf: &mut String,
    ) -> Option<usize> {
        let chars = self.chars;
        let rest: String = chars[i..end].iter().collect();

        for tag in LINE_BREAK_TAGS {
            if starts_with_ignore_case(&rest, tag) {
                buf.push('\n');
                return Some(i + tag.chars().count());
            }
        }

        // Autolink: <https://example.com>
        if let Some(close) = rest.find('>') {
            let inner = &rest[1..close];
            if inner.contains("://") && !inner.contains(char::is_whitespace) {
                self.flush(buf, base, link);
                let target = link.unwrap_or(inner).to_string();
                self.push(inner.to_string(), base, Some(&target));
                return Some(i + rest[..=close].chars().count());
            }
        }

        for (open, close) in PAIRED_TAGS {
            if starts_with_ignore_case(&rest, open) {
                let inner_start = i + open.chars().count();
                let close_at = find_str(chars, inner_start, end, close)?;
                self.flush(buf, base, link);
                let mut annotations = base;
                apply_tag(open, &mut annotations);
                self.parse_range(inner_start, close_at, annotations, link);
                return Some(close_at + close.chars().count());
            }
        }

        if let Some(caps) = COLOR_SPAN_RE.captures(&rest) {
            let color = Color::from_name(&caps[1])?;
            let inner_start = i + caps[0].chars().count();
            let close_at = find_str(chars, inner_start, end, "</span>")?;
            self.flush(buf, base, link);
            let mut annotations = base;
            annotations.color = color;
            self.parse_range(inner_start, close_at, annotations, link);
            return Some(close_at + "</span>".len());
        }

        None
    }

    fn flush(&mut self, buf: &mut String, annotations: Annotations, link: Option<&str>) {
        if !buf.is_empty() {
            let text = std::mem::take(buf);
            self.push(text, annotations, link);
        }
    }

    fn push(&mut self, text: String, annotations: Annotations, link: Option<&str>) {
        if text.is_empty() {
            return;
        }
        self.out.push(Span {
            text,
            annotations,
            link: link.map(str::to_string),
        });
    }
}

/// Result of parsing `[text](url "title")` starting at an opening bracket.
struct ParsedLink {
    text_start: usize,
    text_end: usize,
    url: String,
    next: usize,
}

fn parse_link(chars: &[char], open: usize, end: usize) -> Option<ParsedLink> {
    let mut depth = 0usize;
    let mut k = open;
    let close_bracket = loop {
        if k >= end {
            return None;
        }
        match chars[k] {
            '\\' => k += 1,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    break k;
                }
            }
            _ => {}
        }
        k += 1;
    };

    if close_bracket + 1 >= end || chars[close_bracket + 1] != '(' {
        return None;
    }

    let mut parens = 0usize;
    let mut k = close_bracket + 1;
    let close_paren = loop {
        if k >= end {
            return None;
        }
        match chars[k] {
            '\\' => k += 1,
            '(' => parens += 1,
            ')' => {
                parens -= 1;
                if parens == 0 {
                    break k;
                }
            }
            _ => {}
        }
        k += 1;
    };

    let dest: String = chars[close_bracket + 2..close_paren].iter().collect();
    let dest = dest.trim();
    let url = dest.split_whitespace().next().unwrap_or("");
    let url = url.trim_start_matches('<').trim_end_matches('>');

    Some(ParsedLink {
        text_start: open + 1,
        text_end: close_bracket,
        url: url.to_string(),
        next: close_paren + 1,
    })
}

fn run_length(chars: &[char], start: usize, end: usize, c: char) -> usize {
    chars[start..end].iter().take_while(|&&ch| ch == c).count()
}

/// Find a closing backtick run of exactly `n`.
fn find_code_close(chars: &[char], from: usize, end: usize, n: usize) -> Option<usize> {
    let mut k = from;
    while k < end {
        if chars[k] == '`' {
            let r = run_length(chars, k, end, '`');
            if r == n {
                return Some(k);
            }
            k += r;
        } else {
            k += 1;
        }
    }
    None
}

/// Find a closing delimiter run of exactly `count` markers.
///
/// Skips escapes and code spans, so markers inside code never close.
fn find_closer(chars: &[char], from: usize, end: usize, marker: char, count: usize) -> Option<usize> {
    let mut k = from;
    while k < end {
        let ch = chars[k];
        if ch == '\\' {
            k += 2;
            continue;
        }
        if ch == '`' {
            let r = run_length(chars, k, end, '`');
            k = match find_code_close(chars, k + r, end, r) {
                Some(close) => close + r,
                None => k + r,
            };
            continue;
        }
        if ch == marker {
            let r = run_length(chars, k, end, marker);
            let preceded_by_text = k > from && !chars[k - 1].is_whitespace();
            let intraword = marker == '_' && k + r < end && chars[k + r].is_alphanumeric();
            if r == count && preceded_by_text && !intraword {
                return Some(k);
            }
            k += r;
            continue;
        }
        k += 1;
    }
    None
}

fn find_str(chars: &[char], from: usize, end: usize, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    (from..end.saturating_sub(needle.len() - 1)).find(|&k| {
        chars[k..k + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Strip one space of padding from both ends of a code span.
fn trim_code_padding(content: &[char]) -> String {
    let text: String = content.iter().collect();
    if text.len() >= 2 && text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty() {
        text[1..text.len() - 1].to_string()
    } else {
        text
    }
}

/// Merge adjacent spans with identical annotations and link; drop empty spans.
pub fn merge_spans(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.same_style(&span) => last.text.push_str(&span.text),
            _ => merged.push(span),
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Options that affect inline rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub emphasis: EmphasisMarker,
    /// Emit underline and color as inline HTML instead of dropping them.
    pub preserve_colors: bool,
}

/// Render spans back into inline markdown.
///
/// Each span sees the character rendered just before it and the one its
/// neighbour will open with, so delimiters of touching spans never run
/// together into a different marker run.
pub fn render_spans(spans: &[Span], opts: RenderOptions) -> String {
    let mut out = String::new();
    for (idx, span) in spans.iter().enumerate() {
        let prev = out.chars().last();
        let next = spans.get(idx + 1).and_then(|s| leading_char(s, opts));
        out.push_str(&render_span(span, opts, prev, next));
    }
    out
}

/// The character a span's rendering starts with. Emphasis is reported as
/// `*` whichever marker ends up used; callers only ask whether it is a word
/// character or a tilde.
fn leading_char(span: &Span, opts: RenderOptions) -> Option<char> {
    let a = span.annotations;
    let first = span.text.chars().next()?;
    if span.link.is_some() {
        return Some('[');
    }
    if opts.preserve_colors && a.has_extended() {
        return Some('<');
    }
    if first.is_whitespace() && !a.code {
        return Some(first);
    }
    if a.strikethrough {
        Some('~')
    } else if a.bold || a.italic {
        Some('*')
    } else if a.code {
        Some('`')
    } else {
        Some(first)
    }
}

fn render_span(span: &Span, opts: RenderOptions, prev: Option<char>, next: Option<char>) -> String {
    let a = span.annotations;
    let html_wrapped = opts.preserve_colors && a.has_extended();
    if !(a.bold || a.italic || a.strikethrough || a.code || html_wrapped || span.link.is_some()) {
        return escape_between(&span.text, prev, next);
    }

    let (lead, core, trail) = if a.code {
        ("", render_code_span(&span.text), "")
    } else {
        // Markers must hug non-whitespace, so surrounding whitespace moves outside.
        let trimmed = span.text.trim_matches(|c: char| c.is_whitespace());
        if trimmed.is_empty() {
            return escape_between(&span.text, prev, next);
        }
        let lead = &span.text[..span.text.len() - span.text.trim_start().len()];
        let trail = &span.text[span.text.trim_end().len()..];
        let inner = if a.bold || a.italic {
            Some('*')
        } else if a.strikethrough {
            Some('~')
        } else {
            None
        };
        (lead, escape_between(trimmed, inner, inner), trail)
    };

    let before = lead.chars().last().or(prev);
    let after = trail.chars().next().or(next);

    // `_` delimiters cannot touch a word; fall back to `*` there.
    let touches_word =
        before.is_some_and(char::is_alphanumeric) || after.is_some_and(char::is_alphanumeric);
    let mut emphasis = if touches_word {
        EmphasisMarker::Asterisk
    } else {
        opts.emphasis
    };

    // An opening delimiter right after the same character would extend the
    // previous span's closer. Switch markers, or use tags when neither fits.
    let outermost = !html_wrapped && span.link.is_none();
    let mut emphasis_tags = false;
    if outermost && !a.strikethrough && (a.bold || a.italic) && before == Some(emphasis.as_char()) {
        let other = emphasis.alternate();
        if other == EmphasisMarker::Underscore && touches_word {
            emphasis_tags = true;
        } else {
            emphasis = other;
        }
    }
    let strike_tag = outermost && a.strikethrough && before == Some('~');

    let mut text = core;
    if emphasis_tags {
        if a.italic {
            text = format!("<em>{text}</em>");
        }
        if a.bold {
            text = format!("<strong>{text}</strong>");
        }
    } else {
        if a.italic {
            let marker = if a.bold {
                emphasis.alternate()
            } else {
                emphasis
            };
            let m = marker.as_char();
            text = format!("{m}{text}{m}");
        }
        if a.bold {
            let m = emphasis.as_char();
            text = format!("{m}{m}{text}{m}{m}");
        }
    }
    if a.strikethrough {
        text = if strike_tag {
            format!("<del>{text}</del>")
        } else {
            format!("~~{text}~~")
        };
    }

    format!("{lead}{}{trail}", wrap_outer(text, span, opts))
}

/// Apply the wrappers outside emphasis: underline, color, link.
fn wrap_outer(mut text: String, span: &Span, opts: RenderOptions) -> String {
    let a = span.annotations;
    if opts.preserve_colors {
        if a.underline {
            text = format!("<u>{text}</u>");
        }
        if a.color != Color::Default {
            text = format!("<span style=\"color: {}\">{text}</span>", a.color.as_str());
        }
    }
    if let Some(url) = &span.link {
        text = format!("[{text}]({url})");
    }
    text
}

fn render_code_span(text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// Escape characters that would otherwise be read as inline syntax.
pub fn escape_text(text: &str) -> String {
    escape_between(text, None, None)
}

/// Escape `text` given the characters rendered on either side of it.
fn escape_between(text: &str, before: Option<char>, after: Option<char>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]).or(before);
        let next = chars.get(i + 1).copied().or(after);
        let escape = match c {
            '\\' | '`' | '*' | '[' | ']' => true,
            '_' => {
                !(prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphanumeric))
            }
            '~' => prev == Some('~') || next == Some('~'),
            '<' => next.is_some_and(|n| n.is_ascii_alphabetic() || n == '/' || n == '!'),
            '!' => next == Some('['),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn render(spans: &[Span]) -> String {
        render_spans(
            spans,
            RenderOptions {
                emphasis: EmphasisMarker::Asterisk,
                preserve_colors: false,
            },
        )
    }

    #[test]
    fn parses_basic_emphasis() {
        let spans = parse_inline("Some *italic* and **bold** text.", true);
        assert_eq!(
            spans,
            vec![
                Span::plain("Some "),
                Span::styled("italic", Annotations::italic()),
                Span::plain(" and "),
                Span::styled("bold", Annotations::bold()),
                Span::plain(" text."),
            ]
        );
    }

    #[test]
    fn parses_nested_bold_italic() {
        let both = Annotations {
            bold: true,
            italic: true,
            ..Default::default()
        };
        assert_eq!(parse_inline("**_both_**", true), vec![Span::styled("both", both)]);
        assert_eq!(parse_inline("_**both**_", true), vec![Span::styled("both", both)]);
        assert_eq!(parse_inline("***both***", true), vec![Span::styled("both", both)]);
    }

    #[test]
    fn code_spans_are_not_emphasis_parsed() {
        let spans = parse_inline("run `**not bold**` now", true);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].text, "**not bold**");
        assert!(spans[1].annotations.code);
        assert!(!spans[1].annotations.bold);
    }

    #[test]
    fn emphasis_closer_skips_code_spans() {
        let spans = parse_inline("*a `b*` c*", true);
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.annotations.italic));
        assert!(spans[1].annotations.code);
    }

    #[test]
    fn intraword_underscores_are_literal() {
        let spans = parse_inline("call snake_case_name here", true);
        assert_eq!(spans, vec![Span::plain("call snake_case_name here")]);
    }

    #[test]
    fn unmatched_markers_are_literal() {
        assert_eq!(parse_inline("2 * 3 = 6", true), vec![Span::plain("2 * 3 = 6")]);
        assert_eq!(parse_inline("**open", true), vec![Span::plain("**open")]);
    }

    #[test]
    fn parses_links_and_strikethrough() {
        let spans = parse_inline("see [the **docs**](https://example.com) ~~old~~", true);
        assert_eq!(spans[0], Span::plain("see "));
        assert_eq!(spans[1].text, "the ");
        assert_eq!(spans[1].link.as_deref(), Some("https://example.com"));
        assert_eq!(spans[2].text, "docs");
        assert!(spans[2].annotations.bold);
        assert_eq!(spans[2].link.as_deref(), Some("https://example.com"));
        assert_eq!(spans[4].text, "old");
        assert!(spans[4].annotations.strikethrough);
    }

    #[test]
    fn parses_inline_html() {
        let spans = parse_inline(
            "<u>under</u> and <span style=\"color: red\">red</span><br>next",
            true,
        );
        assert!(spans[0].annotations.underline);
        assert_eq!(spans[2].annotations.color, Color::Red);
        assert_eq!(spans[3].text, "\nnext");

        let spans = parse_inline("<u>under</u>", false);
        assert_eq!(spans, vec![Span::plain("<u>under</u>")]);
    }

    #[test]
    fn parses_autolinks() {
        let spans = parse_inline("<https://example.com/x>", true);
        assert_eq!(spans[0].text, "https://example.com/x");
        assert_eq!(spans[0].link.as_deref(), Some("https://example.com/x"));
    }

    #[test]
    fn escapes_are_unescaped() {
        assert_eq!(parse_inline(r"\*not italic\*", true), vec![Span::plain("*not italic*")]);
    }

    #[test]
    fn merge_combines_identical_neighbours() {
        let merged = merge_spans(vec![
            Span::styled("a", Annotations::bold()),
            Span::styled("b", Annotations::bold()),
            Span::plain(""),
            Span::plain("c"),
        ]);
        assert_eq!(
            merged,
            vec![Span::styled("ab", Annotations::bold()), Span::plain("c")]
        );
    }

    #[test]
    fn renders_canonical_ordering() {
        let both = Annotations {
            bold: true,
            italic: true,
            ..Default::default()
        };
        assert_eq!(render(&[Span::styled("x", both)]), "**_x_**");

        let underscore = render_spans(
            &[Span::styled("x", both)],
            RenderOptions {
                emphasis: EmphasisMarker::Underscore,
                preserve_colors: false,
            },
        );
        assert_eq!(underscore, "__*x*__");
    }

    #[test]
    fn rendering_hoists_whitespace_outside_markers() {
        let spans = vec![
            Span::plain("a"),
            Span::styled(" bold ", Annotations::bold()),
            Span::plain("b"),
        ];
        assert_eq!(render(&spans), "a **bold** b");
    }

    #[test]
    fn rendering_drops_colors_unless_preserved() {
        let colored = Annotations {
            color: Color::Blue,
            underline: true,
            ..Default::default()
        };
        let spans = vec![Span::styled("hue", colored)];
        assert_eq!(render(&spans), "hue");

        let kept = render_spans(
            &spans,
            RenderOptions {
                emphasis: EmphasisMarker::Asterisk,
                preserve_colors: true,
            },
        );
        assert_eq!(kept, "<span style=\"color: blue\"><u>hue</u></span>");
        assert_eq!(parse_inline(&kept, true), spans);
    }

    #[test]
    fn render_then_parse_preserves_spans() {
        let spans = vec![
            Span::plain("use "),
            Span::styled("cargo *run*", Annotations {
                code: true,
                ..Default::default()
            }),
            Span::plain(" with "),
            Span::styled("care", Annotations::italic()),
            Span::plain(" [1] a*b"),
        ];
        let md = render(&spans);
        assert_eq!(parse_inline(&md, true), spans);
    }

    #[test]
    fn adjacent_runs_keep_their_delimiters_apart() {
        let spans = vec![
            Span::styled("a", Annotations::bold()),
            Span::styled("b", Annotations::italic()),
        ];
        let md = render(&spans);
        assert_eq!(md, "**a**_b_");
        assert_eq!(parse_inline(&md, true), spans);

        let spans = vec![
            Span::styled("a", Annotations::italic()),
            Span::styled("b", Annotations::bold()),
            Span::plain("c"),
        ];
        let md = render(&spans);
        assert_eq!(md, "*a*<strong>b</strong>c");
        assert_eq!(parse_inline(&md, true), spans);

        let struck = Annotations {
            strikethrough: true,
            ..Default::default()
        };
        let spans = vec![
            Span::styled("a", struck),
            Span::styled("b", Annotations { bold: true, ..struck }),
        ];
        let md = render(&spans);
        assert_eq!(md, "~~a~~<del>**b**</del>");
        assert_eq!(parse_inline(&md, true), spans);
    }

    #[test]
    fn code_keeps_surrounding_emphasis() {
        let bold_code = Annotations {
            code: true,
            ..Annotations::bold()
        };
        let spans = vec![
            Span::plain("Run "),
            Span::styled("cargo test", bold_code),
            Span::plain(" now"),
        ];
        let md = render(&spans);
        assert_eq!(md, "Run **`cargo test`** now");
        assert_eq!(parse_inline(&md, true), spans);

        let struck_code = Annotations {
            code: true,
            strikethrough: true,
            italic: true,
            ..Default::default()
        };
        let md = render(&[Span::styled("x", struck_code)]);
        assert_eq!(md, "~~*`x`*~~");
    }

    fn arb_annotations() -> impl Strategy<Value = Annotations> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(bold, italic, strikethrough, code)| Annotations {
                bold,
                italic,
                strikethrough,
                code,
                ..Default::default()
            },
        )
    }

    fn arb_spans() -> impl Strategy<Value = Vec<Span>> {
        prop::collection::vec(
            ("[a-z]{1,3}( [a-z]{1,3})?", arb_annotations())
                .prop_map(|(text, annotations)| Span::styled(text, annotations)),
            1..5,
        )
        .prop_map(merge_spans)
    }

    proptest! {
        #[test]
        fn rendered_runs_parse_back(spans in arb_spans(), underscore in any::<bool>()) {
            let emphasis = if underscore {
                EmphasisMarker::Underscore
            } else {
                EmphasisMarker::Asterisk
            };
            let md = render_spans(&spans, RenderOptions { emphasis, preserve_colors: false });
            prop_assert_eq!(parse_inline(&md, true), spans, "rendered as {:?}", md);
        }
    }

    #[test]
    fn color_names() {
        assert_eq!(Color::from_name("Red"), Some(Color::Red));
        assert_eq!(Color::from_name("blue-background"), Some(Color::BlueBackground));
        assert_eq!(Color::from_name("chartreuse"), None);
    }
}
