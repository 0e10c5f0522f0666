//! Markdown ⇄ structured-document block conversion.
//!
//! Forward conversion parses markdown into an AST ([`ast`]) and maps it onto
//! typed blocks ([`blocks`]). Reverse conversion maps blocks back onto the
//! AST and serializes it. Both directions report what they could not carry
//! over in a [`ConversionResult`] instead of failing.

pub mod annotations;
pub mod ast;
pub mod blocks;
mod collector;
mod from_blocks;
pub mod languages;
pub mod parser;
pub mod serializer;
mod to_blocks;

use tracing::{debug, instrument};

use dochub_shared::{ConversionOptions, Result};

pub use annotations::{Annotations, Color};
pub use ast::{MarkdownDocument, Metadata, Node, Span};
pub use blocks::{Block, FRONT_MATTER_CAPTION, MAX_NESTING_DEPTH, MAX_TEXT_LENGTH, RichText};
pub use collector::{ConversionResult, ConversionStatistics, ValidationResult};
pub use parser::ParserOptions;
pub use to_blocks::split_text;

use collector::Collector;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse markdown into a document without mapping it.
pub fn parse_markdown(text: &str, opts: &ParserOptions) -> Result<MarkdownDocument> {
    parser::parse(text, opts)
}

/// Convert markdown text into blocks.
///
/// Returns `Err` only for invalid options or a syntax error (unterminated
/// code fence or table). Every other problem lands in the result's warnings
/// and errors.
#[instrument(skip_all, fields(len = markdown.len()))]
pub fn markdown_to_blocks(
    markdown: &str,
    options: &ConversionOptions,
) -> Result<ConversionResult<Vec<Block>>> {
    options.validate()?;

    let doc = parser::parse(markdown, &ParserOptions::default())?;
    let result = to_blocks::map_document(&doc, options);

    debug!(summary = %result.summary(), "markdown to blocks complete");
    Ok(result)
}

/// Convert blocks into a markdown document (AST), without serializing.
#[instrument(skip_all, fields(blocks = blocks.len()))]
pub fn blocks_to_document(
    blocks: &[Block],
    options: &ConversionOptions,
) -> Result<ConversionResult<MarkdownDocument>> {
    options.validate()?;

    let mut collector = Collector::new();
    let doc = from_blocks::map_blocks(blocks, options, &mut collector);
    Ok(collector.finish(doc))
}

/// Convert blocks into markdown text.
#[instrument(skip_all, fields(blocks = blocks.len()))]
pub fn blocks_to_markdown(
    blocks: &[Block],
    options: &ConversionOptions,
) -> Result<ConversionResult<String>> {
    options.validate()?;

    let mut collector = Collector::new();
    let doc = from_blocks::map_blocks(blocks, options, &mut collector);
    let markdown = serializer::serialize(&doc, options);
    let result = collector.finish(markdown);

    debug!(summary = %result.summary(), "blocks to markdown complete");
    Ok(result)
}

/// Check markdown for problems without converting it.
///
/// Never fails: a syntax error is reported as an invalid result.
#[instrument(skip_all, fields(len = content.len()))]
pub fn validate_markdown(content: &str) -> ValidationResult {
    let opts = ParserOptions {
        validate_syntax: true,
        ..Default::default()
    };
    match parser::parse(content, &opts) {
        Ok(doc) => ValidationResult {
            valid: true,
            errors: Vec::new(),
            block_count: doc.content.len(),
            warnings: doc.warnings,
        },
        Err(e) => ValidationResult {
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
            block_count: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks::{CodeBlock, TextBlock};
    use dochub_shared::{DocHubError, UnsupportedBlockPolicy};

    fn texts(runs: &[RichText]) -> Vec<(&str, bool, bool)> {
        runs.iter()
            .map(|r| (r.text.as_str(), r.annotations.italic, r.annotations.bold))
            .collect()
    }

    #[test]
    fn heading_and_emphasis_paragraph() {
        let result = markdown_to_blocks(
            "# Title\n\nSome *italic* and **bold** text.",
            &ConversionOptions::default(),
        )
        .expect("convert");

        assert_eq!(result.content.len(), 2);
        assert_eq!(result.content[0].type_name(), "heading_1");
        assert_eq!(result.content[0].rich_text()[0].text, "Title");
        assert_eq!(result.content[1].type_name(), "paragraph");
        assert_eq!(
            texts(result.content[1].rich_text()),
            vec![
                ("Some ", false, false),
                ("italic", true, false),
                (" and ", false, false),
                ("bold", false, true),
                (" text.", false, false),
            ]
        );
        assert!(result.warnings.is_empty());
        assert_eq!(result.statistics.total_blocks, 2);
        assert_eq!(result.statistics.converted_blocks, 2);
    }

    #[test]
    fn code_language_alias() {
        let result = markdown_to_blocks("```js\nconsole.log(1)\n```", &ConversionOptions::default())
            .expect("convert");
        let Block::Code(code) = &result.content[0] else {
            panic!("expected code block");
        };
        assert_eq!(code.language, "javascript");
        assert_eq!(code.rich_text.len(), 1);
        assert_eq!(code.rich_text[0].text, "console.log(1)");
    }

    #[test]
    fn oversized_paragraph_with_error_policy() {
        let opts = ConversionOptions {
            handle_unsupported_blocks: UnsupportedBlockPolicy::Error,
            split_long_text: false,
            ..Default::default()
        };
        let result = markdown_to_blocks(&"q".repeat(5000), &opts).expect("convert");
        assert!(!result.errors.is_empty());
        assert!(result.content.is_empty());
        assert_eq!(result.statistics.error_blocks, 1);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let opts = ConversionOptions {
            max_heading_level: 0,
            ..Default::default()
        };
        let err = markdown_to_blocks("# x", &opts).unwrap_err();
        assert!(matches!(err, DocHubError::Config { .. }));
    }

    #[test]
    fn syntax_errors_are_returned() {
        let err = markdown_to_blocks("```\nnever closed", &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, DocHubError::Parse { .. }));
    }

    #[test]
    fn round_trip_preserves_structure() {
        let source = "# Title\n\nSome *italic* and **bold** text.\n\n- one\n  - two\n- three\n\n```js\nconsole.log(1)\n```\n";
        let opts = ConversionOptions::default();

        let forward = markdown_to_blocks(source, &opts).expect("forward");
        let reverse = blocks_to_markdown(&forward.content, &opts).expect("reverse");
        assert!(reverse.is_ok());
        assert_eq!(
            reverse.content,
            "# Title\n\nSome *italic* and **bold** text.\n\n- one\n  - two\n- three\n\n```javascript\nconsole.log(1)\n```\n"
        );

        let again = markdown_to_blocks(&reverse.content, &opts).expect("forward again");
        assert_eq!(again.content, forward.content);
    }

    #[test]
    fn round_trip_of_rich_documents_is_stable() {
        let source = "---\ntitle: Guide\n---\n\n## Steps\n\n1. Install\n2. Run `dochub`\n\n> [!WARNING]\n> Back up first.\n\n| key | value |\n| :-- | --: |\n| a | 1 |\n\n- [x] done\n- [ ] todo\n\n---\n\n![Diagram](https://example.com/d.png)\n";
        let opts = ConversionOptions {
            include_metadata: true,
            ..Default::default()
        };

        let forward = markdown_to_blocks(source, &opts).expect("forward");
        assert!(forward.warnings.is_empty(), "{:?}", forward.warnings);
        let reverse = blocks_to_markdown(&forward.content, &opts).expect("reverse");
        let again = markdown_to_blocks(&reverse.content, &opts).expect("forward again");
        assert_eq!(again.content, forward.content);
        assert!(reverse.content.starts_with("---\ntitle: Guide\n---\n"));
    }

    #[test]
    fn leading_yaml_code_is_not_mistaken_for_front_matter() {
        let opts = ConversionOptions {
            include_metadata: true,
            ..Default::default()
        };
        let source = "```yaml\nkey: value\n```\n\nAfter\n";
        let forward = markdown_to_blocks(source, &opts).expect("forward");
        let reverse = blocks_to_markdown(&forward.content, &opts).expect("reverse");
        assert_eq!(reverse.content, source);

        let document = blocks_to_document(&forward.content, &opts).expect("document");
        assert!(document.content.metadata.is_empty());
    }

    #[test]
    fn documents_opening_with_a_divider_keep_their_text() {
        let opts = ConversionOptions::default();
        let forward =
            markdown_to_blocks("---\n\nHello world\n\n---\n\nAfter\n", &opts).expect("forward");
        let kinds: Vec<_> = forward.content.iter().map(Block::type_name).collect();
        assert_eq!(kinds, vec!["divider", "paragraph", "divider", "paragraph"]);
        assert!(forward.warnings.is_empty());

        let reverse = blocks_to_markdown(&forward.content, &opts).expect("reverse");
        assert_eq!(reverse.content, "***\n\nHello world\n\n---\n\nAfter\n");
        let again = markdown_to_blocks(&reverse.content, &opts).expect("forward again");
        assert_eq!(again.content, forward.content);
    }

    #[test]
    fn bold_code_survives_the_round_trip() {
        let opts = ConversionOptions::default();
        let forward = markdown_to_blocks("Run **`cargo test`** now\n", &opts).expect("forward");
        let runs = forward.content[0].rich_text();
        assert_eq!(runs[1].text, "cargo test");
        assert!(runs[1].annotations.bold && runs[1].annotations.code);

        let reverse = blocks_to_markdown(&forward.content, &opts).expect("reverse");
        assert_eq!(reverse.content, "Run **`cargo test`** now\n");
    }

    #[test]
    fn adjacent_runs_with_same_annotations_merge() {
        let blocks = vec![Block::paragraph(vec![
            RichText {
                text: "bold ".into(),
                annotations: Annotations::bold(),
                link: None,
            },
            RichText {
                text: "still bold".into(),
                annotations: Annotations::bold(),
                link: None,
            },
            RichText::plain(" plain"),
        ])];
        let result = blocks_to_document(&blocks, &ConversionOptions::default()).expect("reverse");
        let Node::Paragraph { children } = &result.content.content[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text, "bold still bold");
    }

    #[test]
    fn reverse_colors_are_dropped_with_warning() {
        let blocks = vec![Block::paragraph(vec![RichText {
            text: "alert".into(),
            annotations: Annotations {
                color: Color::Red,
                ..Default::default()
            },
            link: None,
        }])];
        let result = blocks_to_markdown(&blocks, &ConversionOptions::default()).expect("reverse");
        assert_eq!(result.content, "alert\n");
        assert_eq!(result.warnings.len(), 1);

        let opts = ConversionOptions {
            preserve_colors: true,
            ..Default::default()
        };
        let result = blocks_to_markdown(&blocks, &opts).expect("reverse");
        assert_eq!(result.content, "<span style=\"color: red\">alert</span>\n");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn reverse_unsupported_blocks_follow_the_policy() {
        let json = r#"[
            {"type": "paragraph", "rich_text": [{"text": "kept"}]},
            {"type": "unsupported", "block_type": "bookmark", "rich_text": [{"text": "https://example.com"}]}
        ]"#;
        let blocks: Vec<Block> = serde_json::from_str(json).expect("blocks");

        let result = blocks_to_markdown(&blocks, &ConversionOptions::default()).expect("reverse");
        assert_eq!(result.content, "kept\n\nhttps://example.com\n");
        assert_eq!(result.statistics.unsupported_blocks, vec!["bookmark".to_string()]);

        let opts = ConversionOptions {
            handle_unsupported_blocks: UnsupportedBlockPolicy::Ignore,
            ..Default::default()
        };
        let result = blocks_to_markdown(&blocks, &opts).expect("reverse");
        assert_eq!(result.content, "kept\n");
        assert_eq!(result.statistics.skipped_blocks, 1);
        assert_eq!(result.statistics.total_blocks, 2);
    }

    #[test]
    fn reverse_groups_list_items_and_nests_children() {
        let mut parent = TextBlock::new(vec![RichText::plain("step")]);
        parent.children.push(Block::Code(CodeBlock {
            rich_text: vec![RichText::plain("make")],
            language: "plain text".into(),
            ..Default::default()
        }));
        let blocks = vec![
            Block::NumberedListItem(parent),
            Block::NumberedListItem(TextBlock::new(vec![RichText::plain("next")])),
            Block::paragraph(vec![RichText::plain("after")]),
        ];
        let result = blocks_to_markdown(&blocks, &ConversionOptions::default()).expect("reverse");
        assert_eq!(
            result.content,
            "1. step\n\n   ```\n   make\n   ```\n2. next\n\nafter\n"
        );
    }

    #[test]
    fn validation_reports_without_converting() {
        let ok = validate_markdown("# One\n\n### Three\n");
        assert!(ok.valid);
        assert_eq!(ok.block_count, 2);
        assert_eq!(ok.warnings.len(), 1);

        let bad = validate_markdown("```\nopen");
        assert!(!bad.valid);
        assert_eq!(bad.errors.len(), 1);
    }
}
