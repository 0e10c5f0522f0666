//! Markdown source files on disk.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use dochub_markdown::{MarkdownDocument, ParserOptions, parse_markdown};
use dochub_shared::{DocHubError, Result};

/// Reads and writes markdown files relative to a workspace root.
#[derive(Debug, Clone)]
pub struct MarkdownFiles {
    root: PathBuf,
}

impl MarkdownFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a workspace-relative path. Paths may not climb out of the root.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            return Ok(relative.to_path_buf());
        }
        if relative.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(DocHubError::validation(format!(
                "path {} escapes the workspace",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub async fn read(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.resolve(relative)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DocHubError::io(&path, e))
    }

    /// Write a file, creating parent directories. Returns the full path.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub async fn write(
        &self,
        relative: impl AsRef<Path>,
        content: &str,
    ) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocHubError::io(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DocHubError::io(&path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "wrote file");
        Ok(path)
    }

    /// Read and parse a workspace-relative markdown file.
    pub async fn parse(
        &self,
        relative: impl AsRef<Path>,
        opts: &ParserOptions,
    ) -> Result<MarkdownDocument> {
        let path = self.resolve(relative)?;
        parse_markdown_file_with(&path, opts).await
    }
}

/// Read and parse a markdown file with default parser options.
pub async fn parse_markdown_file(path: impl AsRef<Path>) -> Result<MarkdownDocument> {
    parse_markdown_file_with(path.as_ref(), &ParserOptions::default()).await
}

/// Read and parse a markdown file, filling in its size and modification time.
#[instrument(skip(opts), fields(path = %path.display()))]
pub async fn parse_markdown_file_with(path: &Path, opts: &ParserOptions) -> Result<MarkdownDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DocHubError::io(path, e))?;
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| DocHubError::io(path, e))?;

    let mut doc = parse_markdown(&text, opts)?;
    doc.size = text.len();
    doc.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    debug!(
        blocks = doc.content.len(),
        warnings = doc.warnings.len(),
        "parsed markdown file"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_file_with_size_and_mtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("guide.md");
        std::fs::write(&path, "---\ntitle: Guide\n---\n# Guide\n\nBody.\n").expect("write");

        let doc = parse_markdown_file(&path).await.expect("parse");
        assert_eq!(doc.metadata["title"], "Guide");
        assert_eq!(doc.content.len(), 2);
        assert_eq!(doc.size, 36);
        assert!(doc.last_modified.is_some());
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = parse_markdown_file(dir.path().join("nope.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocHubError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn write_then_read_relative() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = MarkdownFiles::new(dir.path());

        let written = files
            .write("out/nested/page.md", "# Page\n")
            .await
            .expect("write");
        assert!(written.ends_with("out/nested/page.md"));
        assert_eq!(files.read("out/nested/page.md").await.expect("read"), "# Page\n");

        let doc = files
            .parse("out/nested/page.md", &ParserOptions::default())
            .await
            .expect("parse");
        assert_eq!(doc.content.len(), 1);
    }

    #[test]
    fn resolve_rejects_parent_components() {
        let files = MarkdownFiles::new("/workspace");
        assert!(files.resolve("../secrets.md").is_err());
        assert_eq!(
            files.resolve("docs/a.md").expect("resolve"),
            PathBuf::from("/workspace/docs/a.md")
        );
    }
}
