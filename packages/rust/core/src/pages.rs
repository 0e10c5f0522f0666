//! Page-level flows against a structured-document service.
//!
//! The service itself sits behind [`DocumentClient`]; these functions only
//! sequence conversion and client calls, and clean up after partial failure.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use dochub_markdown::{Block, ConversionResult, blocks_to_markdown, markdown_to_blocks};
use dochub_shared::{ConversionOptions, DocHubError, PageId, Result, UnsupportedBlockPolicy};

/// Most blocks the service accepts in one append call.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Title used when neither the caller nor the document supplies one.
const UNTITLED: &str = "Untitled";

/// Operations the page flows need from the service.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    async fn create_page(&self, parent: &PageId, title: &str) -> Result<PageId>;
    async fn append_blocks(&self, page: &PageId, blocks: &[Block]) -> Result<()>;
    /// Replace all content of a page.
    async fn replace_blocks(&self, page: &PageId, blocks: &[Block]) -> Result<()>;
    async fn fetch_blocks(&self, page: &PageId) -> Result<Vec<Block>>;
    async fn archive_page(&self, page: &PageId) -> Result<()>;
}

/// Outcome of writing converted markdown to a page.
#[derive(Debug, Clone)]
pub struct PageConversion {
    pub page: PageId,
    pub result: ConversionResult<Vec<Block>>,
}

/// Convert markdown and create a new page under `parent` holding it.
///
/// The title defaults to the first heading. If appending fails after the
/// page exists, the page is archived before the error is returned.
#[instrument(skip_all, fields(parent = %parent))]
pub async fn create_page_from_markdown<C: DocumentClient + ?Sized>(
    client: &C,
    parent: &PageId,
    title: Option<&str>,
    markdown: &str,
    options: &ConversionOptions,
) -> Result<PageConversion> {
    let result = convert_for_page(markdown, options)?;
    let title = title
        .map(str::to_string)
        .or_else(|| first_heading(&result.content))
        .unwrap_or_else(|| UNTITLED.to_string());

    let page = client.create_page(parent, &title).await?;
    info!(page = %page, %title, "page created");

    for chunk in result.content.chunks(MAX_BLOCKS_PER_REQUEST) {
        if let Err(e) = client.append_blocks(&page, chunk).await {
            warn!(page = %page, error = %e, "append failed; archiving partial page");
            if let Err(archive_err) = client.archive_page(&page).await {
                warn!(page = %page, error = %archive_err, "could not archive partial page");
            }
            return Err(e);
        }
    }

    info!(page = %page, summary = %result.summary(), "page populated");
    Ok(PageConversion { page, result })
}

/// Convert markdown and replace the content of an existing page.
#[instrument(skip_all, fields(page = %page))]
pub async fn update_page_from_markdown<C: DocumentClient + ?Sized>(
    client: &C,
    page: &PageId,
    markdown: &str,
    options: &ConversionOptions,
) -> Result<PageConversion> {
    let result = convert_for_page(markdown, options)?;
    client.replace_blocks(page, &result.content).await?;
    info!(summary = %result.summary(), "page updated");
    Ok(PageConversion {
        page: page.clone(),
        result,
    })
}

/// Fetch a page's blocks and convert them to markdown.
#[instrument(skip_all, fields(page = %page))]
pub async fn export_page_to_markdown<C: DocumentClient + ?Sized>(
    client: &C,
    page: &PageId,
    options: &ConversionOptions,
) -> Result<ConversionResult<String>> {
    let blocks = client.fetch_blocks(page).await?;
    let result = blocks_to_markdown(&blocks, options)?;
    info!(summary = %result.summary(), "page exported");
    Ok(result)
}

#[instrument(skip_all, fields(page = %page))]
pub async fn archive_page<C: DocumentClient + ?Sized>(client: &C, page: &PageId) -> Result<()> {
    client.archive_page(page).await?;
    info!("page archived");
    Ok(())
}

/// Convert markdown, refusing to touch the service when the `error` policy
/// recorded conversion errors.
fn convert_for_page(
    markdown: &str,
    options: &ConversionOptions,
) -> Result<ConversionResult<Vec<Block>>> {
    let result = markdown_to_blocks(markdown, options)?;
    if !result.is_ok() && options.handle_unsupported_blocks == UnsupportedBlockPolicy::Error {
        return Err(DocHubError::Conversion(result.errors.join("; ")));
    }
    Ok(result)
}

fn first_heading(blocks: &[Block]) -> Option<String> {
    blocks.iter().find_map(|block| match block {
        Block::Heading1(b) | Block::Heading2(b) | Block::Heading3(b) => {
            let text: String = b.rich_text.iter().map(|r| r.text.as_str()).collect();
            (!text.trim().is_empty()).then(|| text.trim().to_string())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MockClient {
        pages: Mutex<HashMap<String, (String, Vec<Block>)>>,
        archived: Mutex<Vec<String>>,
        append_calls: Mutex<usize>,
        fail_append_on: Option<usize>,
    }

    #[async_trait]
    impl DocumentClient for MockClient {
        async fn create_page(&self, parent: &PageId, title: &str) -> Result<PageId> {
            let mut pages = self.pages.lock().unwrap();
            let id = format!("{}-{}", parent, pages.len() + 1);
            pages.insert(id.clone(), (title.to_string(), Vec::new()));
            Ok(PageId::new(id))
        }

        async fn append_blocks(&self, page: &PageId, blocks: &[Block]) -> Result<()> {
            let call = {
                let mut calls = self.append_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_append_on == Some(call) {
                return Err(DocHubError::Network("service unavailable".into()));
            }
            let mut pages = self.pages.lock().unwrap();
            let (_, content) = pages
                .get_mut(page.as_str())
                .ok_or_else(|| DocHubError::Network("no such page".into()))?;
            content.extend_from_slice(blocks);
            Ok(())
        }

        async fn replace_blocks(&self, page: &PageId, blocks: &[Block]) -> Result<()> {
            let mut pages = self.pages.lock().unwrap();
            let (_, content) = pages
                .get_mut(page.as_str())
                .ok_or_else(|| DocHubError::Network("no such page".into()))?;
            *content = blocks.to_vec();
            Ok(())
        }

        async fn fetch_blocks(&self, page: &PageId) -> Result<Vec<Block>> {
            let pages = self.pages.lock().unwrap();
            pages
                .get(page.as_str())
                .map(|(_, content)| content.clone())
                .ok_or_else(|| DocHubError::Network("no such page".into()))
        }

        async fn archive_page(&self, page: &PageId) -> Result<()> {
            self.archived.lock().unwrap().push(page.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_then_export_round_trips() {
        let client = MockClient::default();
        let parent = PageId::new("root");
        let opts = ConversionOptions::default();

        let created = create_page_from_markdown(
            &client,
            &parent,
            None,
            "# Release notes\n\n- fixed bugs\n",
            &opts,
        )
        .await
        .expect("create");
        assert_eq!(created.result.content.len(), 2);
        {
            let pages = client.pages.lock().unwrap();
            assert_eq!(pages[created.page.as_str()].0, "Release notes");
        }

        let exported = export_page_to_markdown(&client, &created.page, &opts)
            .await
            .expect("export");
        assert_eq!(exported.content, "# Release notes\n\n- fixed bugs\n");
    }

    #[tokio::test]
    async fn large_documents_append_in_batches() {
        let client = MockClient::default();
        let markdown: String = (0..250).map(|i| format!("Paragraph {i}\n\n")).collect();

        let created = create_page_from_markdown(
            &client,
            &PageId::new("root"),
            Some("Big"),
            &markdown,
            &ConversionOptions::default(),
        )
        .await
        .expect("create");

        assert_eq!(*client.append_calls.lock().unwrap(), 3);
        let pages = client.pages.lock().unwrap();
        assert_eq!(pages[created.page.as_str()].1.len(), 250);
    }

    #[tokio::test]
    async fn failed_append_archives_the_partial_page() {
        let client = MockClient {
            fail_append_on: Some(2),
            ..Default::default()
        };
        let markdown: String = (0..150).map(|i| format!("Line {i}\n\n")).collect();

        let err = create_page_from_markdown(
            &client,
            &PageId::new("root"),
            Some("Doomed"),
            &markdown,
            &ConversionOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DocHubError::Network(_)));
        assert_eq!(*client.archived.lock().unwrap(), vec!["root-1".to_string()]);
    }

    #[tokio::test]
    async fn error_policy_blocks_page_creation() {
        let client = MockClient::default();
        let opts = ConversionOptions {
            handle_unsupported_blocks: UnsupportedBlockPolicy::Error,
            ..Default::default()
        };

        let err = create_page_from_markdown(
            &client,
            &PageId::new("root"),
            None,
            "<div>raw html</div>\n",
            &opts,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DocHubError::Conversion(_)));
        assert!(client.pages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_content() {
        let client = MockClient::default();
        let opts = ConversionOptions::default();
        let created = create_page_from_markdown(&client, &PageId::new("root"), None, "old", &opts)
            .await
            .expect("create");

        update_page_from_markdown(&client, &created.page, "new\n\n---\n", &opts)
            .await
            .expect("update");
        let blocks = client.fetch_blocks(&created.page).await.expect("fetch");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].rich_text()[0].text, "new");

        archive_page(&client, &created.page).await.expect("archive");
        assert_eq!(client.archived.lock().unwrap().len(), 1);
    }
}
