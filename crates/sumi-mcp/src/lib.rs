//! MCP server exposing the Notion page bridge.
//!
//! Provides tools for creating, writing, appending, searching, and reading
//! Notion pages with markdown content, so agents can manipulate hosted
//! pages without speaking the nested block schema.
//!
//! ## Module Structure
//!
//! - `models`: request types for the MCP tools
//! - `helpers`: parsing, title lookup, and response shaping

mod helpers;
mod models;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde_json::json;
use tracing::info;

use sumi_blocks::{ConvertOptions, Limits, render_markdown};
use sumi_notion::{NotionClient, PageApi, PageSync, SyncMode};

use helpers::{find_page_by_title, page_url, parse_mode, sync_failure};
// Re-export public types
pub use models::*;

/// MCP server bridging markdown content into Notion pages.
#[derive(Clone)]
pub struct SumiMcp {
    client: NotionClient,
    limits: Limits,
    options: ConvertOptions,
    tool_router: ToolRouter<Self>,
}

impl SumiMcp {
    /// Create a server around a configured client.
    pub fn new(client: NotionClient) -> Self {
        Self {
            client,
            limits: Limits::default(),
            options: ConvertOptions::default(),
            tool_router: Self::tool_router(),
        }
    }

    fn page_sync(&self) -> PageSync<'_, NotionClient> {
        PageSync::new(&self.client)
            .with_limits(self.limits)
            .with_options(self.options)
    }

    fn parent_for<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit.unwrap_or_else(|| self.client.parent_page_id())
    }

    /// Create a page and append the converted content to it.
    async fn create_and_fill(
        &self,
        parent_id: Option<&str>,
        title: &str,
        content: &str,
    ) -> String {
        let parent = self.parent_for(parent_id);
        let page = match self.client.create_page(parent, title).await {
            Ok(page) => page,
            Err(e) => return format!("Error: {e}"),
        };
        info!(page = %page.page_id, title, "created page");
        match self
            .page_sync()
            .sync(&page.page_id, content, SyncMode::Append)
            .await
        {
            Ok(report) => {
                let url = page.url.unwrap_or_else(|| page_url(&page.page_id));
                json!({
                    "status": "created",
                    "page_id": page.page_id,
                    "page_url": url,
                    "created_block_ids": report.created_block_ids,
                })
                .to_string()
            }
            Err(e) => sync_failure(&e),
        }
    }
}

#[tool_router]
impl SumiMcp {
    #[tool(
        description = "Create a new Notion page under the configured parent (or an explicit parent_id) and fill it with the given markdown content."
    )]
    async fn create_page(&self, Parameters(req): Parameters<CreatePageRequest>) -> String {
        self.create_and_fill(req.parent_id.as_deref(), &req.title, &req.content)
            .await
    }

    #[tool(
        description = "Write markdown content to the Notion page with the given title. Creates the page when it does not exist; otherwise replaces its content (mode 'replace', the default) or appends after it (mode 'append')."
    )]
    async fn write_page(&self, Parameters(req): Parameters<WritePageRequest>) -> String {
        let Some(mode) = parse_mode(&req.mode) else {
            return format!("Error: invalid mode '{}'. Use: replace or append", req.mode);
        };
        let existing = match find_page_by_title(&self.client, &req.title).await {
            Ok(existing) => existing,
            Err(e) => return format!("Error: {e}"),
        };
        match existing {
            Some(hit) => match self.page_sync().sync(&hit.page_id, &req.content, mode).await {
                Ok(report) => {
                    let url = hit.url.unwrap_or_else(|| page_url(&hit.page_id));
                    json!({
                        "status": match mode {
                            SyncMode::Replace => "replaced",
                            SyncMode::Append => "appended",
                        },
                        "page_id": hit.page_id,
                        "page_url": url,
                        "created_block_ids": report.created_block_ids,
                        "deleted_block_ids": report.deleted_block_ids,
                    })
                    .to_string()
                }
                Err(e) => sync_failure(&e),
            },
            None => {
                self.create_and_fill(req.parent_id.as_deref(), &req.title, &req.content)
                    .await
            }
        }
    }

    #[tool(
        description = "Append markdown content to the Notion page with the given title, creating the page when it does not exist. Never deletes existing content."
    )]
    async fn append_page(&self, Parameters(req): Parameters<AppendPageRequest>) -> String {
        let existing = match find_page_by_title(&self.client, &req.title).await {
            Ok(existing) => existing,
            Err(e) => return format!("Error: {e}"),
        };
        match existing {
            Some(hit) => match self
                .page_sync()
                .sync(&hit.page_id, &req.content, SyncMode::Append)
                .await
            {
                Ok(report) => {
                    let url = hit.url.unwrap_or_else(|| page_url(&hit.page_id));
                    json!({
                        "status": "appended",
                        "page_id": hit.page_id,
                        "page_url": url,
                        "created_block_ids": report.created_block_ids,
                    })
                    .to_string()
                }
                Err(e) => sync_failure(&e),
            },
            None => {
                self.create_and_fill(req.parent_id.as_deref(), &req.title, &req.content)
                    .await
            }
        }
    }

    #[tool(description = "Search Notion pages by title text. Returns matching pages with ids and URLs.")]
    async fn search_pages(&self, Parameters(req): Parameters<SearchPagesRequest>) -> String {
        match self.client.search_pages(&req.query).await {
            Ok(hits) => json!({
                "query": req.query,
                "total_results": hits.len(),
                "pages": hits.iter().map(|hit| json!({
                    "page_id": hit.page_id,
                    "title": hit.title,
                    "url": hit.url,
                })).collect::<Vec<_>>(),
            })
            .to_string(),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(
        description = "Read a Notion page by id and return its content rendered back to markdown."
    )]
    async fn read_page(&self, Parameters(req): Parameters<ReadPageRequest>) -> String {
        let page = match self.client.retrieve_page(&req.page_id).await {
            Ok(page) => page,
            Err(e) => return format!("Error: {e}"),
        };

        // Follow continuation cursors until the listing is exhausted;
        // unsupported block types are skipped, like the other direction.
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            match self
                .client
                .list_children(&req.page_id, cursor.as_deref())
                .await
            {
                Ok(listing) => {
                    blocks.extend(listing.children.into_iter().filter_map(|child| child.block));
                    match listing.next_cursor {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                Err(e) => return format!("Error: {e}"),
            }
        }

        json!({
            "page_id": page.page_id,
            "title": page.title,
            "url": page.url,
            "content": render_markdown(&blocks),
        })
        .to_string()
    }

    #[tool(description = "Verify the MCP connection is working.")]
    fn ping(&self) -> String {
        "MCP connection is working. The Notion bridge is ready for tool calls.".to_string()
    }
}

#[tool_handler]
impl ServerHandler for SumiMcp {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.instructions = Some(
            "Notion page bridge MCP server. Converts markdown into Notion blocks and keeps page content in sync: create_page, write_page (replace/append), append_page, search_pages, read_page.".into()
        );
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info
    }
}
